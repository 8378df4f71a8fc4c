use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use super::{Conversion, LeadBackend, RemoteBackend, RemoteError};
use crate::config::AppConfig;
use crate::model::{Entity, Lead};

/// HTTP client for the name-based CRM operation endpoints
/// (`createLead`, `searchOpportunity`, `convertLead`, ...).
pub struct RemoteClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl RemoteClient {
    pub fn new(config: &AppConfig) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn call<B, T>(&self, op: &str, body: &B) -> Result<T, RemoteError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/api/{}", self.base_url, op);

        let mut request = self.http.post(&url).json(body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            log::debug!("{} returned 404", op);
            return Err(RemoteError::NotFound);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl<T: Entity> RemoteBackend<T> for RemoteClient {
    async fn create(&self, draft: &T::Draft) -> Result<T, RemoteError> {
        self.call(&format!("create{}", T::KIND.op_suffix()), draft).await
    }

    async fn search(&self) -> Result<Vec<T>, RemoteError> {
        self.call(&format!("search{}", T::KIND.op_suffix()), &Map::new()).await
    }

    async fn update(&self, id: &str, patch: &Map<String, Value>) -> Result<T, RemoteError> {
        let mut body = patch.clone();
        body.insert("id".to_string(), Value::String(id.to_string()));
        self.call(&format!("update{}", T::KIND.op_suffix()), &body).await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let _: Value = self
            .call(
                &format!("delete{}", T::KIND.op_suffix()),
                &serde_json::json!({ "id": id }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LeadBackend for RemoteClient {
    async fn convert(&self, id: &str, value: Option<f64>) -> Result<Conversion, RemoteError> {
        self.call("convertLead", &serde_json::json!({ "id": id, "value": value }))
            .await
    }
}
