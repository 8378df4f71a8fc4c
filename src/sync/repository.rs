use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use super::{apply_patch, synth_id, HealthMonitor, RemoteHealth, SyncError};
use crate::activity::{describe, ActivityAction, ActivityLog, FieldChange, NewActivity};
use crate::model::{Entity, EntityKind};
use crate::remote::{RemoteBackend, RemoteError};
use crate::store::LocalStore;

/// Remote-first CRUD for one entity type, with the local store as fallback.
///
/// Every remote outcome feeds the shared [`HealthMonitor`]; the fallback
/// decision itself is made per call from the typed [`RemoteError`]:
/// `create` falls back on any remote failure, the remaining operations only
/// when the remote reports the record or endpoint missing. Mutations taken
/// through the fallback path are recorded in the activity log.
pub struct Repository<T: Entity, R: RemoteBackend<T>> {
    pub(super) remote: Arc<R>,
    pub(super) store: Arc<LocalStore>,
    pub(super) activities: ActivityLog,
    pub(super) health: Arc<HealthMonitor>,
    pub(super) user_id: String,
    pub(super) user_name: String,
    pub(super) _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, R: RemoteBackend<T>> Repository<T, R> {
    pub fn new(
        remote: Arc<R>,
        store: Arc<LocalStore>,
        activities: ActivityLog,
        health: Arc<HealthMonitor>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            store,
            activities,
            health,
            user_id: user_id.into(),
            user_name: user_name.into(),
            _entity: PhantomData,
        }
    }

    pub fn health(&self) -> RemoteHealth {
        self.health.current()
    }

    pub(super) fn observe<V>(&self, result: Result<V, RemoteError>) -> Result<V, RemoteError> {
        match &result {
            Ok(_) => self.health.mark_ok(),
            Err(e) => self.health.mark_failed(e),
        }
        result
    }

    fn read_local(&self) -> Result<Vec<T>, SyncError> {
        Ok(self.store.read_collection(T::KIND.collection_key())?)
    }

    fn write_local(&self, items: &[T]) -> Result<(), SyncError> {
        Ok(self.store.write_collection(T::KIND.collection_key(), items)?)
    }

    fn upsert_local(&self, record: &T) -> Result<(), SyncError> {
        let mut items = self.read_local()?;
        match items.iter_mut().find(|e| e.id() == record.id()) {
            Some(slot) => *slot = record.clone(),
            None => items.push(record.clone()),
        }
        self.write_local(&items)
    }

    /// Best-effort audit record. A failed log write degrades the audit
    /// trail, not the mutation that triggered it.
    pub(super) fn audit(
        &self,
        entity_type: EntityKind,
        entity_id: &str,
        entity_name: &str,
        action: ActivityAction,
        description: String,
        changes: Option<BTreeMap<String, FieldChange>>,
    ) {
        let result = self.activities.record(NewActivity {
            entity_type,
            entity_id: entity_id.to_string(),
            entity_name: entity_name.to_string(),
            action,
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            description,
            changes,
        });
        if let Err(e) = result {
            log::warn!(
                "failed to record {:?} activity for {}: {}",
                action,
                entity_id,
                e
            );
        }
    }

    /// Create remotely; on success mirror the record into the local
    /// collection. On any remote failure, synthesize the record locally
    /// and log a `created` activity.
    pub async fn create(&self, draft: T::Draft) -> Result<T, SyncError> {
        match self.observe(self.remote.create(&draft).await) {
            Ok(created) => {
                self.upsert_local(&created)?;
                Ok(created)
            }
            Err(e) => {
                log::info!(
                    "remote create failed, writing {} locally: {}",
                    T::KIND.noun(),
                    e
                );
                let record = T::from_draft(draft, synth_id(T::KIND.id_prefix()), Utc::now());
                let mut items = self.read_local()?;
                items.push(record.clone());
                self.write_local(&items)?;
                self.audit(
                    T::KIND,
                    record.id(),
                    record.display_name(),
                    ActivityAction::Created,
                    describe(ActivityAction::Created, record.display_name(), None),
                    None,
                );
                Ok(record)
            }
        }
    }

    /// Remote search, with the local collection merged in or standing in
    /// according to the entity's read policy (see [`Entity::MERGE_LOCAL`]).
    pub async fn get_all(&self) -> Result<Vec<T>, SyncError> {
        match self.observe(self.remote.search().await) {
            Ok(remote_items) if T::MERGE_LOCAL => {
                let mut by_id: HashMap<String, T> = remote_items
                    .into_iter()
                    .map(|e| (e.id().to_string(), e))
                    .collect();
                // local entries win: they hold whatever the remote has not
                // absorbed yet
                for item in self.read_local()? {
                    by_id.insert(item.id().to_string(), item);
                }
                Ok(by_id.into_values().collect())
            }
            Ok(remote_items) => Ok(remote_items),
            Err(e) if T::MERGE_LOCAL => {
                log::info!("remote search failed, serving local {}s: {}", T::KIND.id_prefix(), e);
                self.read_local()
            }
            Err(e) if e.is_not_found() => self.read_local(),
            Err(e) => Err(e.into()),
        }
    }

    /// Remote update. A missing remote record falls through to the local
    /// collection: the patch is merged, diffed field by field, and (for
    /// audited entities) logged. Any other remote failure propagates with
    /// the local collection untouched.
    pub async fn update(&self, id: &str, patch: Map<String, Value>) -> Result<T, SyncError> {
        match self.observe(self.remote.update(id, &patch).await) {
            Ok(updated) => Ok(updated),
            Err(e) if e.is_not_found() => self.update_local(id, &patch),
            Err(e) => Err(e.into()),
        }
    }

    fn update_local(&self, id: &str, patch: &Map<String, Value>) -> Result<T, SyncError> {
        let mut items = self.read_local()?;
        let idx = items
            .iter()
            .position(|e| e.id() == id)
            .ok_or(SyncError::NotFound(T::KIND.noun()))?;

        let (updated, changes) = apply_patch(&items[idx], patch, Utc::now())?;
        items[idx] = updated.clone();
        self.write_local(&items)?;

        if T::AUDITED {
            let action = if changes.contains_key("status") {
                ActivityAction::StatusChanged
            } else {
                ActivityAction::Updated
            };
            // description always reflects the changed-field count, even
            // when the action is a status change
            let description = describe(ActivityAction::Updated, updated.display_name(), Some(&changes));
            self.audit(
                T::KIND,
                updated.id(),
                updated.display_name(),
                action,
                description,
                Some(changes),
            );
        }

        Ok(updated)
    }

    /// Remote delete; a missing remote record falls through to removing the
    /// local copy. Deleting an id absent from both sides succeeds silently.
    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        match self.observe(self.remote.delete(id).await) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => self.delete_local(id),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_local(&self, id: &str) -> Result<(), SyncError> {
        let mut items = self.read_local()?;
        let Some(idx) = items.iter().position(|e| e.id() == id) else {
            return Ok(());
        };
        let removed = items.remove(idx);
        self.write_local(&items)?;

        if T::AUDITED {
            self.audit(
                T::KIND,
                removed.id(),
                removed.display_name(),
                ActivityAction::Deleted,
                describe(ActivityAction::Deleted, removed.display_name(), None),
                None,
            );
        }
        Ok(())
    }
}
