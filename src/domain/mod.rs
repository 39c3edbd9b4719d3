// Domain layer - Pure encoding, partitioning and data models
pub mod color_scale;
pub mod intervals;
pub mod measure_map;
pub mod measurement;
pub mod sample;
pub mod temporal_fader;
pub mod usage;
pub mod value_encoder;
