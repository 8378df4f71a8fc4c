//! Offline-tolerant sync core for a CRM: remote-first CRUD over leads,
//! accounts, and opportunities, with a local fallback store, opportunistic
//! mirroring, lead conversion, and a bounded activity log.

pub mod activity;
pub mod config;
pub mod model;
pub mod remote;
pub mod store;
pub mod sync;

pub use activity::{Activity, ActivityAction, ActivityLog, FieldChange};
pub use config::AppConfig;
pub use model::{
    Account, AccountDraft, Entity, EntityKind, Lead, LeadDraft, LeadStatus, Opportunity,
    OpportunityDraft, OpportunityStage,
};
pub use remote::{Conversion, LeadBackend, RemoteBackend, RemoteClient, RemoteError};
pub use store::{LocalStore, StoreError};
pub use sync::{HealthMonitor, RemoteHealth, Repository, SyncError};

use std::sync::Arc;

/// Everything wired together: one store, one remote client, one health
/// monitor, one activity log, and a repository per entity type.
pub struct CrmSync {
    leads: Repository<Lead, RemoteClient>,
    opportunities: Repository<Opportunity, RemoteClient>,
    accounts: Repository<Account, RemoteClient>,
    activities: ActivityLog,
    health: Arc<HealthMonitor>,
}

impl CrmSync {
    pub fn new(config: &AppConfig) -> Result<Self, SyncError> {
        let store = match config.resolve_db_path() {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).ok();
                }
                LocalStore::open(&path)?
            }
            None => {
                log::warn!("no data directory available, fallback store is in-memory only");
                LocalStore::open_in_memory()?
            }
        };
        Self::with_store(config, store)
    }

    /// In-memory fallback store; nothing survives the process. Used by tests.
    pub fn in_memory(config: &AppConfig) -> Result<Self, SyncError> {
        Self::with_store(config, LocalStore::open_in_memory()?)
    }

    fn with_store(config: &AppConfig, store: LocalStore) -> Result<Self, SyncError> {
        let store = Arc::new(store);
        let remote = Arc::new(RemoteClient::new(config)?);
        let health = Arc::new(HealthMonitor::new());
        let activities = ActivityLog::new(store.clone());

        Ok(Self {
            leads: Repository::new(
                remote.clone(),
                store.clone(),
                activities.clone(),
                health.clone(),
                config.user_id.clone(),
                config.user_name.clone(),
            ),
            opportunities: Repository::new(
                remote.clone(),
                store.clone(),
                activities.clone(),
                health.clone(),
                config.user_id.clone(),
                config.user_name.clone(),
            ),
            accounts: Repository::new(
                remote,
                store,
                activities.clone(),
                health.clone(),
                config.user_id.clone(),
                config.user_name.clone(),
            ),
            activities,
            health,
        })
    }

    pub fn leads(&self) -> &Repository<Lead, RemoteClient> {
        &self.leads
    }

    pub fn opportunities(&self) -> &Repository<Opportunity, RemoteClient> {
        &self.opportunities
    }

    pub fn accounts(&self) -> &Repository<Account, RemoteClient> {
        &self.accounts
    }

    pub fn activities(&self) -> &ActivityLog {
        &self.activities
    }

    pub fn health(&self) -> RemoteHealth {
        self.health.current()
    }
}
