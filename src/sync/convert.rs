use chrono::Utc;

use super::{synth_id, Repository, SyncError};
use crate::activity::{describe, ActivityAction};
use crate::model::{Account, Entity, EntityKind, Lead, LeadStatus, Opportunity, OpportunityStage};
use crate::remote::{Conversion, LeadBackend};

impl<R: LeadBackend> Repository<Lead, R> {
    /// Convert a lead into an account plus an initial opportunity.
    ///
    /// The remote conversion endpoint is preferred; when it is missing, the
    /// conversion runs entirely against the local collections: one account
    /// copied from the lead, one PROSPECT opportunity linked to both, and
    /// the lead itself marked CONVERTED, with three audit records in that
    /// order.
    pub async fn convert_lead(
        &self,
        id: &str,
        value: Option<f64>,
    ) -> Result<Conversion, SyncError> {
        match self.observe(self.remote.convert(id, value).await) {
            Ok(conversion) => Ok(conversion),
            Err(e) if e.is_not_found() => self.convert_local(id, value),
            Err(e) => Err(e.into()),
        }
    }

    fn convert_local(&self, id: &str, value: Option<f64>) -> Result<Conversion, SyncError> {
        let mut leads: Vec<Lead> = self.store.read_collection(Lead::KIND.collection_key())?;
        let idx = leads
            .iter()
            .position(|l| l.id == id)
            .ok_or(SyncError::NotFound(Lead::KIND.noun()))?;

        let lead = leads[idx].clone();
        // a converted lead already owns its account/opportunity pair
        if lead.status == LeadStatus::Converted {
            return Err(SyncError::AlreadyConverted(lead.id));
        }
        let now = Utc::now();

        let account = Account {
            id: synth_id(Account::KIND.id_prefix()),
            name: lead.name.clone(),
            email: (!lead.email.is_empty()).then(|| lead.email.clone()),
            phone: lead.phone.clone(),
            company: lead.company.clone(),
            created_at: now,
            updated_at: None,
        };
        let mut accounts: Vec<Account> =
            self.store.read_collection(Account::KIND.collection_key())?;
        accounts.push(account.clone());
        self.store
            .write_collection(Account::KIND.collection_key(), &accounts)?;

        let opportunity = Opportunity {
            id: synth_id(Opportunity::KIND.id_prefix()),
            name: format!("{} Opportunity", lead.name),
            value: value.unwrap_or(0.0),
            stage: OpportunityStage::Prospect,
            account_id: account.id.clone(),
            account_name: Some(account.name.clone()),
            lead_id: Some(lead.id.clone()),
            probability: None,
            expected_close_date: None,
            created_at: now,
            updated_at: None,
        };
        let mut opportunities: Vec<Opportunity> =
            self.store.read_collection(Opportunity::KIND.collection_key())?;
        opportunities.push(opportunity.clone());
        self.store
            .write_collection(Opportunity::KIND.collection_key(), &opportunities)?;

        leads[idx].status = LeadStatus::Converted;
        leads[idx].updated_at = Some(now);
        self.store
            .write_collection(Lead::KIND.collection_key(), &leads)?;

        self.audit(
            EntityKind::Lead,
            &lead.id,
            &lead.name,
            ActivityAction::Converted,
            describe(ActivityAction::Converted, &lead.name, None),
            None,
        );
        self.audit(
            EntityKind::Account,
            &account.id,
            &account.name,
            ActivityAction::Created,
            describe(ActivityAction::Created, &account.name, None),
            None,
        );
        self.audit(
            EntityKind::Opportunity,
            &opportunity.id,
            &opportunity.name,
            ActivityAction::Created,
            describe(ActivityAction::Created, &opportunity.name, None),
            None,
        );

        log::info!("converted {} locally into {} / {}", lead.id, account.id, opportunity.id);

        Ok(Conversion {
            account,
            opportunity,
        })
    }
}
