// Cloudant document store client for parcel documents
use crate::application::nitrate_repository::ParcelStore;
use crate::infrastructure::config::CloudantSettings;
use crate::infrastructure::connection::LazyHandle;
use crate::infrastructure::credentials::{require_env, BasicCredentials};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

pub struct CloudantClient {
    http: reqwest::Client,
    url: String,
    credentials: BasicCredentials,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    docs: Vec<serde_json::Value>,
    #[serde(default)]
    warning: Option<String>,
}

impl CloudantClient {
    /// Build a client from `CLOUDANT_URL`, `CLOUDANT_USERNAME` and
    /// `CLOUDANT_PASSWORD`.
    pub async fn connect() -> crate::error::Result<Self> {
        let credentials = BasicCredentials::from_env("CLOUDANT_USERNAME", "CLOUDANT_PASSWORD")?;
        let url = require_env("CLOUDANT_URL")?;

        let client = Self {
            http: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            credentials,
        };
        client.check_session().await?;

        tracing::info!("Connected to Cloudant at {}", client.url);
        Ok(client)
    }

    async fn check_session(&self) -> Result<()> {
        self.http
            .get(format!("{}/_session", self.url))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .context("Failed to reach Cloudant")?
            .error_for_status()
            .context("Cloudant rejected the credentials")?;
        Ok(())
    }

    /// Run a Mango query and return the matching documents.
    pub async fn find(
        &self,
        database: &str,
        selector: serde_json::Value,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}/{}/_find", self.url, urlencoding::encode(database));
        tracing::debug!("Cloudant query on {}: {}", database, selector);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(&serde_json::json!({ "selector": selector, "limit": limit }))
            .send()
            .await
            .context("Failed to send request to Cloudant")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Cloudant query failed with status {}: {}", status, body);
        }

        let found = response
            .json::<FindResponse>()
            .await
            .context("Failed to parse Cloudant response")?;

        if let Some(warning) = found.warning {
            tracing::warn!("Cloudant query on {}: {}", database, warning);
        }

        Ok(found.docs)
    }
}

pub struct CloudantParcelStore {
    connection: Arc<LazyHandle<CloudantClient>>,
    settings: CloudantSettings,
}

impl CloudantParcelStore {
    pub fn new(connection: Arc<LazyHandle<CloudantClient>>, settings: CloudantSettings) -> Self {
        Self {
            connection,
            settings,
        }
    }
}

pub fn parcel_selector(parcel_id: i64) -> serde_json::Value {
    serde_json::json!({ "properties.OBJECTID": { "$eq": parcel_id } })
}

#[async_trait]
impl ParcelStore for CloudantParcelStore {
    async fn find_parcel(&self, parcel_id: i64) -> Result<Option<serde_json::Value>> {
        let client = self.connection.get_or_try_init(CloudantClient::connect).await?;

        let docs = client
            .find(&self.settings.database, parcel_selector(parcel_id), 1)
            .await?;
        Ok(docs.into_iter().next())
    }
}
