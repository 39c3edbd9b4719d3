// Lookup from management-measure ids to their descriptions
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MeasureMap(BTreeMap<i64, String>);

impl MeasureMap {
    /// Parse `id;description` lines. Blank lines are skipped.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut measures = BTreeMap::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (id, description) = line
                .split_once(';')
                .ok_or_else(|| anyhow::anyhow!("line {}: expected `id;description`", lineno + 1))?;
            let id: i64 = id
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("line {}: invalid measure id {:?}: {}", lineno + 1, id, e))?;

            measures.insert(id, description.trim().to_string());
        }

        Ok(Self(measures))
    }

    #[cfg(test)]
    pub fn get(&self, id: i64) -> Option<&str> {
        self.0.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
