mod dental;
mod table;

pub use dental::{dental_tier, dental_tiers, highest_dental_tier, DentalTier};
pub use table::{CatalogImportError, CatalogTable};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{
    CatalogOption, ClientCategory, ClientProfile, CopayOption, CoverageFamily, FamilyFilters,
    PlanCoverageRecord, PricingIssue, QuotedPlan,
};
use super::pricing::CopayPolicy;

/// Failure reported by a catalog source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable for family {family:?}: {reason}")]
    Unavailable {
        family: CoverageFamily,
        reason: String,
    },
    #[error("plan records unavailable for {plan_name}: {reason}")]
    PlanRecordsUnavailable { plan_name: String, reason: String },
}

/// Data-fetching boundary for coverage catalogs. Transport is up to the implementor.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(
        &self,
        family: CoverageFamily,
        plan_type_id: u32,
    ) -> Result<Vec<CatalogOption>, CatalogError>;

    async fn fetch_copay_options(
        &self,
        family: CoverageFamily,
        category: ClientCategory,
    ) -> Result<Vec<CopayOption>, CatalogError>;

    async fn fetch_plan_records(
        &self,
        plan_name: &str,
        plan_type_id: u32,
        category: ClientCategory,
    ) -> Result<Vec<PlanCoverageRecord>, CatalogError>;
}

/// Which families a resolution pass fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Only families the client has activated.
    ActiveOnly,
    /// Every dynamic family, regardless of filters. Used when resuming a saved quotation.
    Eager,
}

/// Catalog snapshot for one client plan type. Families never fetched have no entry; families
/// whose fetch failed are recorded as unavailable and behave as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCatalogs {
    #[serde(default)]
    options: BTreeMap<CoverageFamily, Vec<CatalogOption>>,
    #[serde(default)]
    copays: BTreeMap<CoverageFamily, Vec<CopayOption>>,
    #[serde(default)]
    unavailable: BTreeSet<CoverageFamily>,
}

impl ResolvedCatalogs {
    pub fn with_options(mut self, family: CoverageFamily, options: Vec<CatalogOption>) -> Self {
        self.insert_options(family, options);
        self
    }

    pub fn with_copays(mut self, family: CoverageFamily, copays: Vec<CopayOption>) -> Self {
        self.copays.insert(family, copays);
        self
    }

    pub fn insert_options(&mut self, family: CoverageFamily, options: Vec<CatalogOption>) {
        self.unavailable.remove(&family);
        self.options.insert(family, options);
    }

    pub fn insert_copays(&mut self, family: CoverageFamily, copays: Vec<CopayOption>) {
        self.copays.insert(family, copays);
    }

    pub fn mark_unavailable(&mut self, family: CoverageFamily) {
        self.options.remove(&family);
        self.copays.remove(&family);
        self.unavailable.insert(family);
    }

    pub fn options(&self, family: CoverageFamily) -> &[CatalogOption] {
        self.options
            .get(&family)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn copays(&self, family: CoverageFamily) -> &[CopayOption] {
        self.copays
            .get(&family)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn find_option(&self, family: CoverageFamily, id: u32) -> Option<&CatalogOption> {
        self.options(family).iter().find(|option| option.id == id)
    }

    pub fn find_copay(&self, family: CoverageFamily, id: u32) -> Option<&CopayOption> {
        self.copays(family).iter().find(|copay| copay.id == id)
    }

    pub fn is_unavailable(&self, family: CoverageFamily) -> bool {
        self.unavailable.contains(&family)
    }

    /// True once a fetch for `family` completed, successfully or not.
    pub fn is_resolved(&self, family: CoverageFamily) -> bool {
        self.options.contains_key(&family) || self.unavailable.contains(&family)
    }
}

/// Fetches the catalogs a quotation needs from a [`CatalogSource`].
pub struct CatalogResolver<S> {
    source: Arc<S>,
    copay_policy: CopayPolicy,
}

impl<S> CatalogResolver<S>
where
    S: CatalogSource + 'static,
{
    pub fn new(source: Arc<S>, copay_policy: CopayPolicy) -> Self {
        Self {
            source,
            copay_policy,
        }
    }

    /// Resolves a fresh catalog snapshot for the client.
    pub async fn resolve(
        &self,
        client: &ClientProfile,
        filters: &FamilyFilters,
        mode: FetchMode,
    ) -> (ResolvedCatalogs, Vec<PricingIssue>) {
        let mut catalogs = ResolvedCatalogs::default();
        let issues = self
            .resolve_missing(client, filters, mode, &mut catalogs)
            .await;
        (catalogs, issues)
    }

    /// Fetches the wanted families that `catalogs` does not hold yet. The three dynamic
    /// families and their copay catalogs are requested concurrently.
    pub async fn resolve_missing(
        &self,
        client: &ClientProfile,
        filters: &FamilyFilters,
        mode: FetchMode,
        catalogs: &mut ResolvedCatalogs,
    ) -> Vec<PricingIssue> {
        let wanted = |family: CoverageFamily| {
            let requested = match mode {
                FetchMode::Eager => true,
                FetchMode::ActiveOnly => filters.is_active(client.category, family),
            };
            requested && !catalogs.is_resolved(family)
        };
        let [high_cost, medication, room] = CoverageFamily::dynamic().map(wanted);
        let copays_allowed = self.copay_policy.allows(client);

        let (
            high_cost_options,
            medication_options,
            room_options,
            high_cost_copays,
            medication_copays,
            room_copays,
        ) = tokio::join!(
            self.fetch_options(CoverageFamily::HighCost, client.plan_type_id, high_cost),
            self.fetch_options(CoverageFamily::Medication, client.plan_type_id, medication),
            self.fetch_options(CoverageFamily::Room, client.plan_type_id, room),
            self.fetch_copays(
                CoverageFamily::HighCost,
                client.category,
                high_cost && copays_allowed
            ),
            self.fetch_copays(
                CoverageFamily::Medication,
                client.category,
                medication && copays_allowed
            ),
            self.fetch_copays(CoverageFamily::Room, client.category, room && copays_allowed),
        );

        let mut issues = Vec::new();
        let fetched = [
            (CoverageFamily::HighCost, high_cost_options, high_cost_copays),
            (CoverageFamily::Medication, medication_options, medication_copays),
            (CoverageFamily::Room, room_options, room_copays),
        ];

        for (family, options, copays) in fetched {
            match options {
                Some(Ok(options)) => {
                    debug!(?family, count = options.len(), "catalog resolved");
                    catalogs.insert_options(family, options);
                }
                Some(Err(err)) => {
                    warn!(
                        ?family,
                        plan_type_id = client.plan_type_id,
                        error = %err,
                        "catalog unavailable"
                    );
                    catalogs.mark_unavailable(family);
                    issues.push(PricingIssue::CatalogUnavailable { family });
                    continue;
                }
                None => continue,
            }

            match copays {
                Some(Ok(copays)) => catalogs.insert_copays(family, copays),
                Some(Err(err)) => {
                    warn!(?family, error = %err, "copay catalog unavailable");
                    catalogs.insert_copays(family, Vec::new());
                }
                None => {}
            }
        }

        issues
    }

    /// Attaches the plan's bundled coverage records. Only individual clients price from them.
    pub async fn hydrate_plan(
        &self,
        client: &ClientProfile,
        plan: &mut QuotedPlan,
    ) -> Option<PricingIssue> {
        if client.category != ClientCategory::Individual || !plan.coverage_records.is_empty() {
            return None;
        }

        match self
            .source
            .fetch_plan_records(&plan.name, client.plan_type_id, client.category)
            .await
        {
            Ok(records) => {
                plan.coverage_records = records;
                None
            }
            Err(err) => {
                warn!(plan = %plan.id, error = %err, "plan coverage records unavailable");
                Some(PricingIssue::PlanRecordsUnavailable {
                    plan: plan.id.clone(),
                })
            }
        }
    }

    async fn fetch_options(
        &self,
        family: CoverageFamily,
        plan_type_id: u32,
        wanted: bool,
    ) -> Option<Result<Vec<CatalogOption>, CatalogError>> {
        if !wanted {
            return None;
        }
        Some(self.source.fetch_catalog(family, plan_type_id).await)
    }

    async fn fetch_copays(
        &self,
        family: CoverageFamily,
        category: ClientCategory,
        wanted: bool,
    ) -> Option<Result<Vec<CopayOption>, CatalogError>> {
        if !wanted {
            return None;
        }
        Some(self.source.fetch_copay_options(family, category).await)
    }
}
