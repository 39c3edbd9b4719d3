// Credentials for the external stores, resolved from the environment
use crate::error::{DashboardError, Result};

fn require<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DashboardError::MissingCredential(name.to_string()))
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[derive(Clone)]
pub struct Db2Credentials {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub database: String,
}

impl Db2Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        Ok(Self {
            username: require(&lookup, "DB2_USERNAME")?,
            password: require(&lookup, "DB2_PASSWORD")?,
            host: require(&lookup, "DB2_HOST")?,
            port: require(&lookup, "DB2_PORT")?,
            database: require(&lookup, "DB2_DATABASE")?,
        })
    }

    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for Db2Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db2Credentials")
            .field("username", &self.username)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// Username/password pair for services using HTTP basic auth.
#[derive(Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    pub fn from_env(user_var: &str, password_var: &str) -> Result<Self> {
        Self::from_lookup(env_lookup, user_var, password_var)
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(
        lookup: F,
        user_var: &str,
        password_var: &str,
    ) -> Result<Self> {
        Ok(Self {
            username: require(&lookup, user_var)?,
            password: require(&lookup, password_var)?,
        })
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Read a single required variable, e.g. a service URL.
pub fn require_env(name: &str) -> Result<String> {
    require(&env_lookup, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_db2_credentials() {
        let creds = Db2Credentials::from_lookup(lookup_from(&[
            ("DB2_USERNAME", "analyst"),
            ("DB2_PASSWORD", "p@ss;word"),
            ("DB2_HOST", "db2.example.net"),
            ("DB2_PORT", "50001"),
            ("DB2_DATABASE", "BLUDB"),
        ]))
        .unwrap();

        assert_eq!(creds.base_url(), "https://db2.example.net:50001");
        assert_eq!(creds.database, "BLUDB");
        assert!(!format!("{:?}", creds).contains("p@ss"));
    }

    #[test]
    fn test_missing_variable() {
        let err = Db2Credentials::from_lookup(lookup_from(&[("DB2_USERNAME", "analyst")]))
            .unwrap_err();
        assert!(matches!(err, DashboardError::MissingCredential(name) if name == "DB2_PASSWORD"));

        let err = BasicCredentials::from_lookup(
            lookup_from(&[("CLOUDANT_USERNAME", "u"), ("CLOUDANT_PASSWORD", "")]),
            "CLOUDANT_USERNAME",
            "CLOUDANT_PASSWORD",
        )
        .unwrap_err();
        assert!(matches!(err, DashboardError::MissingCredential(_)));
    }
}
