use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::catalog::{CatalogResolver, CatalogSource, FetchMode, ResolvedCatalogs};
use super::domain::{
    ClientCategory, ClientProfile, PaymentPeriod, PersistedOptional, PlanId, PricingIssue,
    QuotedPlan,
};
use super::pricing::{PlanQuote, PremiumReconciler, PricingConfig};
use super::repository::{
    PlanPayload, PlanReference, QuotationPayload, QuotationReceipt, QuotationStore, StoreError,
};
use super::selection::{Recompute, SelectionChange, SelectionState};

/// Working state of one quotation being edited.
#[derive(Debug, Clone)]
pub struct QuoteSession {
    pub client: ClientProfile,
    pub plans: Vec<QuotedPlan>,
    pub selection: SelectionState,
    catalogs: ResolvedCatalogs,
    issues: Vec<PricingIssue>,
}

impl QuoteSession {
    pub fn catalogs(&self) -> &ResolvedCatalogs {
        &self.catalogs
    }

    /// Issues raised while resolving catalogs and reconciling saved lines.
    pub fn issues(&self) -> &[PricingIssue] {
        &self.issues
    }

    pub fn plan(&self, id: &PlanId) -> Option<&QuotedPlan> {
        self.plans.iter().find(|plan| &plan.id == id)
    }
}

/// Service composing the catalog resolver, the pricing engine and the quotation store.
pub struct QuotationService<S, Q> {
    resolver: CatalogResolver<S>,
    store: Arc<Q>,
    reconciler: PremiumReconciler,
}

impl<S, Q> QuotationService<S, Q>
where
    S: CatalogSource + 'static,
    Q: QuotationStore + 'static,
{
    pub fn new(source: Arc<S>, store: Arc<Q>, config: PricingConfig) -> Self {
        let resolver = CatalogResolver::new(source, config.copay_policy);
        Self {
            resolver,
            store,
            reconciler: PremiumReconciler::new(config),
        }
    }

    /// Opens a session for a new quotation, or for a selection snapshot sent back by a client.
    /// Only active families are fetched.
    pub async fn start(
        &self,
        client: ClientProfile,
        plans: Vec<QuotedPlan>,
        selection: Option<SelectionState>,
    ) -> Result<QuoteSession, QuotationServiceError> {
        let (plans, mut issues) = self.prepare_plans(&client, plans).await?;

        let mut selection = selection.unwrap_or_else(|| SelectionState::new(client.category));
        selection.rebind(client.category);
        for plan in &plans {
            selection.ensure_plan(&plan.id);
        }

        let (catalogs, catalog_issues) = self
            .resolver
            .resolve(&client, selection.filters(), FetchMode::ActiveOnly)
            .await;
        issues.extend(catalog_issues);

        info!(
            client = %client.name,
            category = client.category.label(),
            plans = plans.len(),
            "quotation session started"
        );

        Ok(QuoteSession {
            client,
            plans,
            selection,
            catalogs,
            issues,
        })
    }

    /// Reopens a saved quotation: every family is fetched, each plan's saved lines are
    /// reconciled into a selection, and families with a recovered choice are switched on.
    /// Pricing must only run on the returned session.
    pub async fn resume(
        &self,
        client: ClientProfile,
        plans: Vec<QuotedPlan>,
        persisted: &BTreeMap<PlanId, Vec<PersistedOptional>>,
    ) -> Result<QuoteSession, QuotationServiceError> {
        let (plans, mut issues) = self.prepare_plans(&client, plans).await?;

        let (catalogs, catalog_issues) = self
            .resolver
            .resolve(&client, &Default::default(), FetchMode::Eager)
            .await;
        issues.extend(catalog_issues);

        let mut selection = SelectionState::new(client.category);
        for plan in &plans {
            let lines = persisted.get(&plan.id).map(Vec::as_slice).unwrap_or_default();
            let reconciliation =
                self.reconciler
                    .reconcile_from_persisted(lines, &catalogs, plan, &client);

            debug!(
                plan = %plan.id,
                lines = lines.len(),
                matched = reconciliation.matched.len(),
                "saved optionals reconciled"
            );

            selection.replace_plan(plan.id.clone(), reconciliation.selection);
            if client.category == ClientCategory::Collective {
                for family in reconciliation.active_families {
                    selection.toggle_family_filter(family, true);
                }
            }
            for issue in reconciliation.issues {
                if !issues.contains(&issue) {
                    issues.push(issue);
                }
            }
        }

        info!(
            client = %client.name,
            plans = plans.len(),
            issues = issues.len(),
            "saved quotation resumed"
        );

        Ok(QuoteSession {
            client,
            plans,
            selection,
            catalogs,
            issues,
        })
    }

    /// Reopens a quotation previously accepted by the store.
    pub async fn resume_document(
        &self,
        document_id: &str,
    ) -> Result<QuoteSession, QuotationServiceError> {
        let payload = self
            .store
            .fetch(document_id)?
            .ok_or(StoreError::NotFound)?;
        let persisted = payload.persisted_optionals();
        let plans = payload
            .plans
            .iter()
            .map(PlanPayload::to_quoted_plan)
            .collect();
        self.resume(payload.client, plans, &persisted).await
    }

    /// Applies one user action and returns fresh quotes for the plans it affected.
    pub async fn apply_change(
        &self,
        session: &mut QuoteSession,
        change: SelectionChange,
    ) -> Vec<PlanQuote> {
        let activates_family = matches!(change, SelectionChange::Filter { active: true, .. });

        match session.selection.apply(change) {
            Recompute::Nothing => Vec::new(),
            Recompute::Plan(plan_id) => self.quote_plan(session, &plan_id).into_iter().collect(),
            Recompute::AllPlans => {
                if activates_family {
                    self.refresh_catalogs(session).await;
                }
                self.quote(session)
            }
        }
    }

    /// Fetches catalogs for families that became active since the session started.
    pub async fn refresh_catalogs(&self, session: &mut QuoteSession) {
        let issues = self
            .resolver
            .resolve_missing(
                &session.client,
                session.selection.filters(),
                FetchMode::ActiveOnly,
                &mut session.catalogs,
            )
            .await;
        session.issues.extend(issues);
    }

    pub fn quote(&self, session: &QuoteSession) -> Vec<PlanQuote> {
        session
            .plans
            .iter()
            .map(|plan| self.price(session, plan))
            .collect()
    }

    pub fn quote_plan(&self, session: &QuoteSession, plan_id: &PlanId) -> Option<PlanQuote> {
        session.plan(plan_id).map(|plan| self.price(session, plan))
    }

    /// Builds the payload the document backend expects.
    pub fn finalize(
        &self,
        session: &QuoteSession,
        user: &str,
        payment_period: PaymentPeriod,
        prepared_on: NaiveDate,
    ) -> Result<QuotationPayload, QuotationServiceError> {
        let category = session.client.category;
        let plans = session
            .plans
            .iter()
            .map(|plan| {
                let quote = self.price(session, plan);
                let period_total = payment_period
                    .period_total(quote.summary.total_due)
                    .ok_or(QuotationServiceError::AmountOverflow)?;
                Ok(PlanPayload {
                    plan: PlanReference {
                        id: plan.id.clone(),
                        name: plan.name.clone(),
                    },
                    affiliates: plan.affiliates.clone(),
                    period_total,
                    applied_optionals: quote.applied_optionals,
                    pricing_summary: quote.summary,
                    affiliate_count: plan.multiplier(category),
                    plan_kind: session.client.plan_kind(),
                })
            })
            .collect::<Result<Vec<_>, QuotationServiceError>>()?;

        Ok(QuotationPayload {
            user: user.to_string(),
            client: session.client.clone(),
            payment_period,
            prepared_on,
            plans,
        })
    }

    pub fn submit(
        &self,
        payload: QuotationPayload,
    ) -> Result<QuotationReceipt, QuotationServiceError> {
        if payload.plans.is_empty() {
            return Err(QuotationServiceError::NothingToPrice);
        }
        let client = payload.client.name.clone();
        let total_due = payload
            .total_due()
            .ok_or(QuotationServiceError::AmountOverflow)?;
        let receipt = self.store.submit(payload)?;
        info!(
            %client,
            %total_due,
            document_id = %receipt.document_id,
            "quotation submitted"
        );
        Ok(receipt)
    }

    fn price(&self, session: &QuoteSession, plan: &QuotedPlan) -> PlanQuote {
        let selection = session.selection.plan_or_default(&plan.id);
        self.reconciler.compute_plan_optionals(
            plan,
            &selection,
            &session.catalogs,
            &session.client,
            session.selection.filters(),
        )
    }

    async fn prepare_plans(
        &self,
        client: &ClientProfile,
        mut plans: Vec<QuotedPlan>,
    ) -> Result<(Vec<QuotedPlan>, Vec<PricingIssue>), QuotationServiceError> {
        if plans.is_empty() {
            return Err(QuotationServiceError::NothingToPrice);
        }

        let mut issues = Vec::new();
        for plan in &mut plans {
            if let Some(issue) = self.resolver.hydrate_plan(client, plan).await {
                issues.push(issue);
            }
        }
        Ok((plans, issues))
    }
}

impl PlanPayload {
    /// Plan as it was quoted, rebuilt from a stored payload.
    pub fn to_quoted_plan(&self) -> QuotedPlan {
        QuotedPlan {
            id: self.plan.id.clone(),
            name: self.plan.name.clone(),
            headcount: self.affiliate_count,
            affiliates: self.affiliates.clone(),
            affiliate_subtotal: self.pricing_summary.affiliate_subtotal,
            coverage_records: Vec::new(),
        }
    }
}

/// Error raised by the quotation service.
#[derive(Debug, thiserror::Error)]
pub enum QuotationServiceError {
    #[error("nothing to price: the quotation has no plans")]
    NothingToPrice,
    #[error("quotation totals exceed the supported amount range")]
    AmountOverflow,
    #[error(transparent)]
    Store(#[from] StoreError),
}
