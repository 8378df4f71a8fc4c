pub mod client;

pub use client::RemoteClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Account, Entity, Lead, Opportunity};

/// Outcome classification for remote calls. `NotFound` is the only variant
/// that triggers the local fallback; everything else is a hard failure of
/// the operation.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote endpoint not found")]
    NotFound,
    #[error("remote API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("remote request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound)
    }
}

/// Account + Opportunity pair produced by a lead conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub account: Account,
    pub opportunity: Opportunity,
}

/// CRUD surface of the remote system of record for one entity type.
/// Production uses [`RemoteClient`]; tests substitute in-memory mocks.
#[async_trait]
pub trait RemoteBackend<T: Entity>: Send + Sync {
    async fn create(&self, draft: &T::Draft) -> Result<T, RemoteError>;
    async fn search(&self) -> Result<Vec<T>, RemoteError>;
    async fn update(&self, id: &str, patch: &Map<String, Value>) -> Result<T, RemoteError>;
    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// Leads additionally support server-side conversion.
#[async_trait]
pub trait LeadBackend: RemoteBackend<Lead> {
    async fn convert(&self, id: &str, value: Option<f64>) -> Result<Conversion, RemoteError>;
}
