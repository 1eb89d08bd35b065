use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    checked_total, AppliedOptional, ClientProfile, InsuredAffiliate, PaymentPeriod, PersistedOptional, PlanId,
    PlanKind, PlanPricingSummary,
};

/// Finalized quotation handed to the document backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationPayload {
    pub user: String,
    pub client: ClientProfile,
    pub payment_period: PaymentPeriod,
    pub prepared_on: NaiveDate,
    pub plans: Vec<PlanPayload>,
}

impl QuotationPayload {
    /// Monthly total across plans, `None` when it overflows.
    pub fn total_due(&self) -> Option<Decimal> {
        checked_total(self.plans.iter().map(|plan| plan.pricing_summary.total_due))
    }

    /// Saved optional lines per plan, ready for reconciliation when the quotation is edited.
    pub fn persisted_optionals(&self) -> BTreeMap<PlanId, Vec<PersistedOptional>> {
        self.plans
            .iter()
            .map(|plan| {
                let lines = plan
                    .applied_optionals
                    .iter()
                    .map(PersistedOptional::from)
                    .collect();
                (plan.plan.id.clone(), lines)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReference {
    pub id: PlanId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPayload {
    pub plan: PlanReference,
    pub affiliates: Vec<InsuredAffiliate>,
    pub applied_optionals: Vec<AppliedOptional>,
    pub pricing_summary: PlanPricingSummary,
    pub affiliate_count: u32,
    pub plan_kind: PlanKind,
    /// Total billed per payment period.
    pub period_total: Decimal,
}

/// Receipt returned once the backend generated the quotation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationReceipt {
    pub document_id: String,
    pub reference: String,
}

/// Persistence boundary for finalized quotations.
pub trait QuotationStore: Send + Sync {
    fn submit(&self, payload: QuotationPayload) -> Result<QuotationReceipt, StoreError>;
    fn fetch(&self, document_id: &str) -> Result<Option<QuotationPayload>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("quotation already exists")]
    Conflict,
    #[error("quotation not found")]
    NotFound,
    #[error("quotation store unavailable: {0}")]
    Unavailable(String),
}
