use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::EntityKind;
use crate::store::{LocalStore, StoreError, ACTIVITIES_KEY};
use crate::sync::synth_id;

/// The log never holds more than this many records; oldest are dropped first.
const MAX_ACTIVITIES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    Converted,
    EmailSent,
    StatusChanged,
    StageChanged,
}

/// Old/new snapshot of one field touched by an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub entity_name: String,
    pub action: ActivityAction,
    pub user_id: String,
    pub user_name: String,
    pub description: String,
    pub changes: Option<BTreeMap<String, FieldChange>>,
    pub timestamp: DateTime<Utc>,
}

/// Everything the caller supplies; id and timestamp are assigned on record.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub entity_name: String,
    pub action: ActivityAction,
    pub user_id: String,
    pub user_name: String,
    pub description: String,
    pub changes: Option<BTreeMap<String, FieldChange>>,
}

/// Append-only, bounded audit trail of every mutation the sync layer
/// performs through the fallback path. Backed by the `crmActivities`
/// collection in the local store.
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<LocalStore>,
}

impl ActivityLog {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Assign an id and timestamp, append, and truncate to the newest
    /// [`MAX_ACTIVITIES`]. Persistence failures surface as an explicit
    /// error so callers can decide whether a degraded audit trail matters.
    pub fn record(&self, entry: NewActivity) -> Result<Activity, StoreError> {
        let activity = Activity {
            id: synth_id("activity"),
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            entity_name: entry.entity_name,
            action: entry.action,
            user_id: entry.user_id,
            user_name: entry.user_name,
            description: entry.description,
            changes: entry.changes,
            timestamp: Utc::now(),
        };

        let mut all: Vec<Activity> = self.store.read_collection(ACTIVITIES_KEY)?;
        all.push(activity.clone());
        if all.len() > MAX_ACTIVITIES {
            let excess = all.len() - MAX_ACTIVITIES;
            all.drain(..excess);
        }
        self.store.write_collection(ACTIVITIES_KEY, &all)?;
        Ok(activity)
    }

    /// All stored records in insertion order. An unreadable store yields an
    /// empty list; history display must never crash the app.
    pub fn get_all(&self) -> Vec<Activity> {
        match self.store.read_collection(ACTIVITIES_KEY) {
            Ok(all) => all,
            Err(e) => {
                log::warn!("activity log unreadable: {}", e);
                Vec::new()
            }
        }
    }

    pub fn for_entity(&self, kind: EntityKind, entity_id: &str) -> Vec<Activity> {
        self.get_all()
            .into_iter()
            .filter(|a| a.entity_type == kind && a.entity_id == entity_id)
            .collect()
    }

    pub fn for_user(&self, user_id: &str) -> Vec<Activity> {
        self.get_all()
            .into_iter()
            .filter(|a| a.user_id == user_id)
            .collect()
    }

    pub fn for_action(&self, action: ActivityAction) -> Vec<Activity> {
        self.get_all()
            .into_iter()
            .filter(|a| a.action == action)
            .collect()
    }

    /// The last `limit` records, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<Activity> {
        let all = self.get_all();
        all.into_iter().rev().take(limit).collect()
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.delete_collection(ACTIVITIES_KEY)
    }
}

/// Human-readable description for an activity record.
pub fn describe(
    action: ActivityAction,
    name: &str,
    changes: Option<&BTreeMap<String, FieldChange>>,
) -> String {
    match action {
        ActivityAction::Created => format!("Created {}", name),
        ActivityAction::Deleted => format!("Deleted {}", name),
        ActivityAction::Converted => format!("Converted {} to Account and Opportunity", name),
        ActivityAction::EmailSent => format!("Sent email to {}", name),
        ActivityAction::StatusChanged => format!("Changed status of {}", name),
        ActivityAction::StageChanged => format!("Changed stage of {}", name),
        ActivityAction::Updated => match changes {
            Some(c) if c.len() == 1 => {
                let field = c.keys().next().map(String::as_str).unwrap_or_default();
                format!("Updated {} of {}", field, name)
            }
            Some(c) if c.len() > 1 => format!("Updated {} fields of {}", c.len(), name),
            _ => format!("Updated {}", name),
        },
    }
}

/// Same table keyed by a raw action string, for consumers rendering log
/// entries that may carry actions this build does not know about.
pub fn describe_action_str(action: &str, name: &str) -> String {
    match serde_json::from_value::<ActivityAction>(Value::String(action.to_string())) {
        Ok(known) => describe(known, name, None),
        Err(_) => format!("Performed action on {}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> ActivityLog {
        ActivityLog::new(Arc::new(LocalStore::open_in_memory().unwrap()))
    }

    fn entry(n: usize) -> NewActivity {
        NewActivity {
            entity_type: EntityKind::Lead,
            entity_id: format!("lead_{}", n),
            entity_name: format!("Lead {}", n),
            action: ActivityAction::Created,
            user_id: "local".into(),
            user_name: "Local User".into(),
            description: format!("Created Lead {}", n),
            changes: None,
        }
    }

    #[test]
    fn record_assigns_id_and_timestamp() {
        let log = log();
        let stored = log.record(entry(1)).unwrap();
        assert!(stored.id.starts_with("activity_"));
        assert_eq!(log.get_all().len(), 1);
    }

    #[test]
    fn log_is_capped_and_recent_is_newest_first() {
        let log = log();
        for n in 0..1005 {
            log.record(entry(n)).unwrap();
        }
        let all = log.get_all();
        assert_eq!(all.len(), 1000);
        // oldest five were dropped
        assert_eq!(all[0].entity_id, "lead_5");

        let recent = log.recent(5);
        assert_eq!(recent.len(), 5);
        let ids: Vec<&str> = recent.iter().map(|a| a.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["lead_1004", "lead_1003", "lead_1002", "lead_1001", "lead_1000"]);
    }

    #[test]
    fn filters_are_pure_views_over_get_all() {
        let log = log();
        log.record(entry(1)).unwrap();
        let mut other = entry(2);
        other.entity_type = EntityKind::Account;
        other.action = ActivityAction::Updated;
        other.user_id = "someone-else".into();
        log.record(other).unwrap();

        assert_eq!(log.for_entity(EntityKind::Lead, "lead_1").len(), 1);
        assert_eq!(log.for_user("someone-else").len(), 1);
        assert_eq!(log.for_action(ActivityAction::Updated).len(), 1);
        assert_eq!(log.for_action(ActivityAction::Deleted).len(), 0);
    }

    #[test]
    fn clear_empties_the_log() {
        let log = log();
        log.record(entry(1)).unwrap();
        log.clear().unwrap();
        assert!(log.get_all().is_empty());
    }

    #[test]
    fn description_templates() {
        assert_eq!(describe(ActivityAction::Created, "Acme", None), "Created Acme");
        assert_eq!(describe(ActivityAction::Deleted, "Acme", None), "Deleted Acme");
        assert_eq!(
            describe(ActivityAction::Converted, "Acme", None),
            "Converted Acme to Account and Opportunity"
        );
        assert_eq!(describe(ActivityAction::EmailSent, "Acme", None), "Sent email to Acme");
        assert_eq!(
            describe(ActivityAction::StatusChanged, "Acme", None),
            "Changed status of Acme"
        );
        assert_eq!(
            describe(ActivityAction::StageChanged, "Acme", None),
            "Changed stage of Acme"
        );
        assert_eq!(describe(ActivityAction::Updated, "Acme", None), "Updated Acme");

        let mut one = BTreeMap::new();
        one.insert(
            "notes".to_string(),
            FieldChange {
                old: Value::Null,
                new: Value::String("called".into()),
            },
        );
        assert_eq!(
            describe(ActivityAction::Updated, "Acme", Some(&one)),
            "Updated notes of Acme"
        );

        let mut many = one.clone();
        many.insert(
            "status".to_string(),
            FieldChange {
                old: Value::String("NEW".into()),
                new: Value::String("CONTACTED".into()),
            },
        );
        assert_eq!(
            describe(ActivityAction::Updated, "Acme", Some(&many)),
            "Updated 2 fields of Acme"
        );
    }

    #[test]
    fn unknown_action_string_gets_the_generic_template() {
        assert_eq!(describe_action_str("created", "Acme"), "Created Acme");
        assert_eq!(
            describe_action_str("teleported", "Acme"),
            "Performed action on Acme"
        );
    }
}
