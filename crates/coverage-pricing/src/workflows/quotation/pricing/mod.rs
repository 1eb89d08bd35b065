mod config;
mod rules;

pub use config::{CopayPolicy, DentalFallback, PricingConfig};

use serde::{Deserialize, Serialize};

use super::catalog::ResolvedCatalogs;
use super::domain::{
    AppliedOptional, ClientProfile, FamilyFilters, PersistedOptional, PlanId, PlanPricingSummary,
    PricingIssue, QuotedPlan,
};
use super::reconcile::{rebuild_selection, Reconciliation};
use super::selection::PlanSelection;
use rules::{price_plan, PricingInputs};

/// Stateless engine pricing plan optionals and rebuilding selections from saved quotations.
#[derive(Debug, Clone, Default)]
pub struct PremiumReconciler {
    config: PricingConfig,
}

impl PremiumReconciler {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Prices every active family of `plan` from scratch. Identical inputs give identical
    /// output; missing catalog data degrades to an issue, never an error.
    pub fn compute_plan_optionals(
        &self,
        plan: &QuotedPlan,
        selection: &PlanSelection,
        catalogs: &ResolvedCatalogs,
        client: &ClientProfile,
        filters: &FamilyFilters,
    ) -> PlanQuote {
        let inputs = PricingInputs {
            client,
            filters,
            config: &self.config,
        };
        let (applied_optionals, summary, issues) = price_plan(plan, selection, catalogs, &inputs);

        PlanQuote {
            plan_id: plan.id.clone(),
            applied_optionals,
            summary,
            issues,
        }
    }

    /// Maps saved optional lines back onto a selection for `plan`. Does not touch filters;
    /// the caller activates [`Reconciliation::active_families`].
    pub fn reconcile_from_persisted(
        &self,
        persisted: &[PersistedOptional],
        catalogs: &ResolvedCatalogs,
        plan: &QuotedPlan,
        client: &ClientProfile,
    ) -> Reconciliation {
        rebuild_selection(persisted, catalogs, plan, client.category, &self.config)
    }
}

/// Pricing result for one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanQuote {
    pub plan_id: PlanId,
    pub applied_optionals: Vec<AppliedOptional>,
    pub summary: PlanPricingSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<PricingIssue>,
}

impl PlanQuote {
    pub fn persisted_optionals(&self) -> Vec<PersistedOptional> {
        self.applied_optionals
            .iter()
            .map(PersistedOptional::from)
            .collect()
    }
}
