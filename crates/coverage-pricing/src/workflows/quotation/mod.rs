//! Coverage pricing for insurance quotations.
//!
//! A quotation prices optional coverage families (high cost, medication, room, dental) on
//! top of each plan's base premium. Catalogs are resolved per client plan type, the user's
//! picks live in a [`SelectionState`], and [`PremiumReconciler`] turns both into priced
//! lines. Saved quotations are mapped back onto a selection before they can be edited.

pub mod catalog;
pub mod domain;
pub mod pricing;
pub mod reconcile;
pub mod repository;
pub mod router;
pub mod selection;
pub mod service;

#[cfg(test)]
mod tests;

pub use catalog::{
    dental_tiers, CatalogError, CatalogImportError, CatalogResolver, CatalogSource, CatalogTable,
    DentalTier, FetchMode, ResolvedCatalogs,
};
pub use domain::{
    AppliedOptional, CatalogOption, ClientCategory, ClientProfile, CopayOption, CoverageFamily,
    FamilyFilters, InsuredAffiliate, OptionalKind, PaymentPeriod, PersistedOptional,
    PlanCoverageRecord, PlanId, PlanKind, PlanPricingSummary, PricingIssue, QuotedPlan,
};
pub use pricing::{CopayPolicy, DentalFallback, PlanQuote, PremiumReconciler, PricingConfig};
pub use reconcile::{MatchStrategy, ReconciledLine, Reconciliation};
pub use repository::{
    PlanPayload, PlanReference, QuotationPayload, QuotationReceipt, QuotationStore, StoreError,
};
pub use router::{quotation_router, QuoteView};
pub use selection::{
    FamilySelection, FamilyState, PlanSelection, Recompute, SelectionChange, SelectionState,
};
pub use service::{QuotationService, QuotationServiceError, QuoteSession};
