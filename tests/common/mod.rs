#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;

use crmlink::{
    ActivityLog, Conversion, Entity, HealthMonitor, Lead, LeadBackend, LocalStore, Opportunity,
    OpportunityStage, RemoteBackend, RemoteError, Repository,
};

/// How the scripted remote answers every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Operations succeed.
    Up,
    /// Everything 404s — the record/endpoint is missing.
    Missing,
    /// Everything fails with a 500.
    Down,
}

fn remote_err(mode: Mode) -> RemoteError {
    match mode {
        Mode::Missing => RemoteError::NotFound,
        _ => RemoteError::Api {
            status: 500,
            message: "internal server error".to_string(),
        },
    }
}

/// In-memory stand-in for the remote CRM API. `search_result` is what a
/// successful search returns; successful updates patch against it.
pub struct MockRemote<T> {
    pub mode: Mutex<Mode>,
    pub search_result: Mutex<Vec<T>>,
    created: Mutex<u32>,
}

impl<T> MockRemote<T> {
    pub fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            search_result: Mutex::new(Vec::new()),
            created: Mutex::new(0),
        })
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock() = mode;
    }
}

#[async_trait]
impl<T: Entity> RemoteBackend<T> for MockRemote<T> {
    async fn create(&self, draft: &T::Draft) -> Result<T, RemoteError> {
        let mode = *self.mode.lock();
        if mode != Mode::Up {
            return Err(remote_err(mode));
        }
        let mut counter = self.created.lock();
        *counter += 1;
        Ok(T::from_draft(
            draft.clone(),
            format!("{}_remote_{}", T::KIND.id_prefix(), counter),
            Utc::now(),
        ))
    }

    async fn search(&self) -> Result<Vec<T>, RemoteError> {
        let mode = *self.mode.lock();
        if mode != Mode::Up {
            return Err(remote_err(mode));
        }
        Ok(self.search_result.lock().clone())
    }

    async fn update(&self, id: &str, patch: &Map<String, Value>) -> Result<T, RemoteError> {
        let mode = *self.mode.lock();
        if mode != Mode::Up {
            return Err(remote_err(mode));
        }
        let existing = self
            .search_result
            .lock()
            .iter()
            .find(|e| e.id() == id)
            .cloned()
            .ok_or(RemoteError::NotFound)?;

        let mut fields = match serde_json::to_value(&existing).unwrap() {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        for (k, v) in patch {
            fields.insert(k.clone(), v.clone());
        }
        Ok(serde_json::from_value(Value::Object(fields)).unwrap())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let mode = *self.mode.lock();
        if mode != Mode::Up {
            return Err(remote_err(mode));
        }
        self.search_result.lock().retain(|e| e.id() != id);
        Ok(())
    }
}

#[async_trait]
impl LeadBackend for MockRemote<Lead> {
    async fn convert(&self, id: &str, value: Option<f64>) -> Result<Conversion, RemoteError> {
        let mode = *self.mode.lock();
        if mode != Mode::Up {
            return Err(remote_err(mode));
        }
        let lead = self
            .search_result
            .lock()
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(RemoteError::NotFound)?;

        let account = crmlink::Account {
            id: "account_remote_1".to_string(),
            name: lead.name.clone(),
            email: Some(lead.email.clone()),
            phone: lead.phone.clone(),
            company: lead.company.clone(),
            created_at: Utc::now(),
            updated_at: None,
        };
        let opportunity = Opportunity {
            id: "opportunity_remote_1".to_string(),
            name: format!("{} Opportunity", lead.name),
            value: value.unwrap_or(0.0),
            stage: OpportunityStage::Prospect,
            account_id: account.id.clone(),
            account_name: Some(account.name.clone()),
            lead_id: Some(lead.id.clone()),
            probability: None,
            expected_close_date: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        Ok(Conversion {
            account,
            opportunity,
        })
    }
}

pub struct Harness {
    pub store: Arc<LocalStore>,
    pub log: ActivityLog,
    pub health: Arc<HealthMonitor>,
}

impl Harness {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let log = ActivityLog::new(store.clone());
        Self {
            store,
            log,
            health: Arc::new(HealthMonitor::new()),
        }
    }

    pub fn repo<T: Entity>(&self, remote: Arc<MockRemote<T>>) -> Repository<T, MockRemote<T>> {
        Repository::new(
            remote,
            self.store.clone(),
            self.log.clone(),
            self.health.clone(),
            "local",
            "Local User",
        )
    }

    pub fn seed<T: Entity>(&self, items: &[T]) {
        self.store
            .write_collection(T::KIND.collection_key(), items)
            .unwrap();
    }

    pub fn local<T: Entity>(&self) -> Vec<T> {
        self.store.read_collection(T::KIND.collection_key()).unwrap()
    }
}

pub fn lead(id: &str, name: &str) -> Lead {
    Lead {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", id),
        phone: None,
        company: None,
        notes: None,
        status: crmlink::LeadStatus::New,
        created_at: Utc::now(),
        updated_at: None,
    }
}

pub fn opportunity(id: &str, name: &str, value: f64) -> Opportunity {
    Opportunity {
        id: id.to_string(),
        name: name.to_string(),
        value,
        stage: OpportunityStage::Prospect,
        account_id: "account_1".to_string(),
        account_name: None,
        lead_id: None,
        probability: None,
        expected_close_date: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}
