use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ─── Entity Kinds ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Lead,
    Opportunity,
    Account,
}

impl EntityKind {
    /// Key of the fallback collection in the local store.
    pub fn collection_key(self) -> &'static str {
        match self {
            EntityKind::Lead => "localLeads",
            EntityKind::Opportunity => "localOpportunities",
            EntityKind::Account => "localAccounts",
        }
    }

    /// Prefix used when synthesizing identifiers offline.
    pub fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::Lead => "lead",
            EntityKind::Opportunity => "opportunity",
            EntityKind::Account => "account",
        }
    }

    /// Suffix of the remote operation names ("createLead", "searchAccount", ...).
    pub fn op_suffix(self) -> &'static str {
        match self {
            EntityKind::Lead => "Lead",
            EntityKind::Opportunity => "Opportunity",
            EntityKind::Account => "Account",
        }
    }

    pub fn noun(self) -> &'static str {
        self.op_suffix()
    }
}

/// A record the sync layer can hold in both the remote system and the local
/// fallback store. `Draft` is the caller-suppliable subset used by `create`.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: EntityKind;

    /// Whether fallback edits and deletes of this entity are written to the
    /// activity log. Only leads carry that audit trail.
    const AUDITED: bool = false;

    /// Leads read offline-first: the local collection is merged over the
    /// remote result (local wins on id conflicts) and stands in for it on
    /// any remote failure. Other entities only use the local collection
    /// when the remote search endpoint is missing.
    const MERGE_LOCAL: bool = false;

    type Draft: Clone + Serialize + Send + Sync + Default;

    fn id(&self) -> &str;
    fn display_name(&self) -> &str;

    /// Build a record from a draft when the remote create is unreachable.
    /// Missing required strings default to empty, enums to their initial value.
    fn from_draft(draft: Self::Draft, id: String, now: DateTime<Utc>) -> Self;
}

// ─── Lead ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDraft {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub status: Option<LeadStatus>,
}

impl Entity for Lead {
    const KIND: EntityKind = EntityKind::Lead;
    const AUDITED: bool = true;
    const MERGE_LOCAL: bool = true;

    type Draft = LeadDraft;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn from_draft(draft: LeadDraft, id: String, now: DateTime<Utc>) -> Self {
        Lead {
            id,
            name: draft.name.unwrap_or_default(),
            email: draft.email.unwrap_or_default(),
            phone: draft.phone,
            company: draft.company,
            notes: draft.notes,
            status: draft.status.unwrap_or(LeadStatus::New),
            created_at: now,
            updated_at: None,
        }
    }
}

// ─── Account ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDraft {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
}

impl Entity for Account {
    const KIND: EntityKind = EntityKind::Account;

    type Draft = AccountDraft;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn from_draft(draft: AccountDraft, id: String, now: DateTime<Utc>) -> Self {
        Account {
            id,
            name: draft.name.unwrap_or_default(),
            email: draft.email,
            phone: draft.phone,
            company: draft.company,
            created_at: now,
            updated_at: None,
        }
    }
}

// ─── Opportunity ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityStage {
    Prospect,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub stage: OpportunityStage,
    pub account_id: String,
    pub account_name: Option<String>,
    pub lead_id: Option<String>,
    pub probability: Option<u8>,
    pub expected_close_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityDraft {
    pub name: Option<String>,
    pub value: Option<f64>,
    pub stage: Option<OpportunityStage>,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub lead_id: Option<String>,
    pub probability: Option<u8>,
    pub expected_close_date: Option<NaiveDate>,
}

impl Entity for Opportunity {
    const KIND: EntityKind = EntityKind::Opportunity;

    type Draft = OpportunityDraft;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn from_draft(draft: OpportunityDraft, id: String, now: DateTime<Utc>) -> Self {
        Opportunity {
            id,
            name: draft.name.unwrap_or_default(),
            value: draft.value.unwrap_or(0.0).max(0.0),
            stage: draft.stage.unwrap_or(OpportunityStage::Prospect),
            account_id: draft.account_id.unwrap_or_default(),
            account_name: draft.account_name,
            lead_id: draft.lead_id,
            probability: draft.probability,
            expected_close_date: draft.expected_close_date,
            created_at: now,
            updated_at: None,
        }
    }
}
