pub mod convert;
pub mod repository;

pub use repository::Repository;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::activity::FieldChange;
use crate::model::Entity;
use crate::remote::RemoteError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("lead {0} is already converted")]
    AlreadyConverted(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid update payload: {0}")]
    InvalidPatch(serde_json::Error),
}

// ─── Identifier Synthesis ────────────────────────────────────────────────────

/// Offline identifier: `{prefix}_{epochMillis}_{9-char base36 suffix}`.
/// The suffix draws from a v4 UUID, so ids stay unique even when many are
/// minted within the same millisecond.
pub fn synth_id(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        Utc::now().timestamp_millis(),
        random_base36(9)
    )
}

fn random_base36(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = uuid::Uuid::new_v4().as_u128();
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        out.push(ALPHABET[(n % 36) as usize] as char);
        n /= 36;
    }
    out
}

// ─── Patch Merge + Diff ──────────────────────────────────────────────────────

/// Merge a partial update into `record` and report, per patch key, the
/// old/new pair for every value that actually changed. Stamps `updatedAt`.
pub(crate) fn apply_patch<T: Entity>(
    record: &T,
    patch: &Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<(T, BTreeMap<String, FieldChange>), SyncError> {
    let mut fields = match serde_json::to_value(record).map_err(SyncError::InvalidPatch)? {
        Value::Object(map) => map,
        other => {
            return Err(SyncError::InvalidPatch(serde::de::Error::custom(format!(
                "entity serialized to non-object: {}",
                other
            ))))
        }
    };

    let mut changes = BTreeMap::new();
    for (key, new) in patch {
        let old = fields.get(key).cloned().unwrap_or(Value::Null);
        if old != *new {
            changes.insert(
                key.clone(),
                FieldChange {
                    old,
                    new: new.clone(),
                },
            );
        }
        fields.insert(key.clone(), new.clone());
    }

    fields.insert(
        "updatedAt".to_string(),
        serde_json::to_value(now).map_err(SyncError::InvalidPatch)?,
    );

    let updated = serde_json::from_value(Value::Object(fields)).map_err(SyncError::InvalidPatch)?;
    Ok((updated, changes))
}

// ─── Remote Health ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteHealth {
    #[default]
    Unknown,
    Healthy,
    Degraded,
}

#[derive(Default)]
struct HealthState {
    health: RemoteHealth,
    last_error: Option<String>,
    since: Option<DateTime<Utc>>,
}

/// Explicit record of the remote system's reachability, updated on every
/// remote call outcome. Observational only: fallback decisions key off the
/// typed error of the call at hand, so a recovered remote is picked up
/// immediately rather than after a probe interval.
#[derive(Default)]
pub struct HealthMonitor {
    state: Mutex<HealthState>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark_ok(&self) {
        let mut state = self.state.lock();
        if state.health != RemoteHealth::Healthy {
            log::info!("remote API is reachable");
            state.health = RemoteHealth::Healthy;
            state.since = Some(Utc::now());
        }
        state.last_error = None;
    }

    pub(crate) fn mark_failed(&self, err: &RemoteError) {
        let mut state = self.state.lock();
        if state.health != RemoteHealth::Degraded {
            log::info!("remote API is degraded: {}", err);
            state.health = RemoteHealth::Degraded;
            state.since = Some(Utc::now());
        }
        state.last_error = Some(err.to_string());
    }

    pub fn current(&self) -> RemoteHealth {
        self.state.lock().health
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    /// When the monitor last changed state, if it ever has.
    pub fn since(&self) -> Option<DateTime<Utc>> {
        self.state.lock().since
    }
}
