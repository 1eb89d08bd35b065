//! Rebuilds a live selection from the optional lines of a saved quotation.
//!
//! Saved lines reference catalog ids that may have drifted since the quotation was stored.
//! Lines carrying their original catalog id map directly. Older lines fall back to
//! heuristics (coverage terms parsed from the description, nearest copay price, dental
//! premium per affiliate), and each heuristic hit is logged so drift can be spotted.

mod description;

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use super::catalog::{dental_tier, dental_tiers, highest_dental_tier, ResolvedCatalogs};
use super::domain::{
    ClientCategory, CoverageFamily, OptionalKind, PersistedOptional, PricingIssue, QuotedPlan,
};
use super::pricing::{DentalFallback, PricingConfig};
use super::selection::PlanSelection;
use description::parse_coverage_terms;

/// How a saved line was mapped back to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ExplicitId,
    DescriptionTerms,
    NearestCopayPrice,
    DentalPremium,
    DentalHighestTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconciledLine {
    pub family: CoverageFamily,
    pub kind: OptionalKind,
    pub selected_id: u32,
    pub strategy: MatchStrategy,
}

/// Outcome of reconciling one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub selection: PlanSelection,
    /// Families the caller should switch on so the rebuilt selection is priced.
    pub active_families: BTreeSet<CoverageFamily>,
    pub matched: Vec<ReconciledLine>,
    pub issues: Vec<PricingIssue>,
}

pub(crate) fn rebuild_selection(
    persisted: &[PersistedOptional],
    catalogs: &ResolvedCatalogs,
    plan: &QuotedPlan,
    category: ClientCategory,
    config: &PricingConfig,
) -> Reconciliation {
    let mut state = ReconcileState {
        plan,
        multiplier: plan.multiplier(category),
        catalogs,
        config,
        selection: PlanSelection::default(),
        decided: BTreeSet::new(),
        matched: Vec::new(),
        issues: Vec::new(),
    };

    // Copays need their coverage in place, so they go last.
    for record in persisted {
        match record.resolved_kind() {
            OptionalKind::Coverage => state.coverage(record),
            OptionalKind::Dental => state.dental(record),
            OptionalKind::Copay => {}
            OptionalKind::Bundled => {
                debug!(plan = %plan.id, family_id = record.family_id, "bundled line regenerates from plan data");
            }
        }
    }
    for record in persisted {
        if record.resolved_kind() == OptionalKind::Copay {
            state.copay(record);
        }
    }

    let active_families = state.selection.selected_families();
    Reconciliation {
        selection: state.selection,
        active_families,
        matched: state.matched,
        issues: state.issues,
    }
}

struct ReconcileState<'a> {
    plan: &'a QuotedPlan,
    multiplier: u32,
    catalogs: &'a ResolvedCatalogs,
    config: &'a PricingConfig,
    selection: PlanSelection,
    decided: BTreeSet<(CoverageFamily, bool)>,
    matched: Vec<ReconciledLine>,
    issues: Vec<PricingIssue>,
}

impl ReconcileState<'_> {
    fn family_of(&self, record: &PersistedOptional) -> Option<CoverageFamily> {
        let family = record.family();
        if family.is_none() {
            warn!(plan = %self.plan.id, family_id = record.family_id, "saved line has an unknown family");
        }
        family
    }

    /// First saved line per family (and per copay slot) wins.
    fn claim(&mut self, family: CoverageFamily, copay: bool) -> bool {
        self.decided.insert((family, copay))
    }

    /// Families whose catalog failed to load stay unselected.
    fn unavailable(&mut self, family: CoverageFamily) -> bool {
        if !self.catalogs.is_unavailable(family) {
            return false;
        }
        let issue = PricingIssue::CatalogUnavailable { family };
        if !self.issues.contains(&issue) {
            warn!(plan = %self.plan.id, ?family, "saved line left unselected, catalog unavailable");
            self.issues.push(issue);
        }
        true
    }

    fn ambiguous(&mut self, family: CoverageFamily) {
        self.issues.push(PricingIssue::ReconciliationAmbiguous {
            family,
            plan: self.plan.id.clone(),
        });
    }

    fn record_match(
        &mut self,
        family: CoverageFamily,
        kind: OptionalKind,
        selected_id: u32,
        strategy: MatchStrategy,
    ) {
        self.matched.push(ReconciledLine {
            family,
            kind,
            selected_id,
            strategy,
        });
    }

    /// Per-affiliate amount behind a saved premium.
    fn unit_amount(&self, premium: Decimal) -> Decimal {
        match self.multiplier {
            0 => premium,
            multiplier => premium / Decimal::from(multiplier),
        }
    }

    fn coverage(&mut self, record: &PersistedOptional) {
        let Some(family) = self.family_of(record) else {
            return;
        };
        if !family.is_dynamic() {
            self.dental(record);
            return;
        }
        if !self.claim(family, false) || self.unavailable(family) {
            return;
        }

        if let Some(id) = record.original_catalog_id {
            self.selection.select(family, Some(id));
            self.record_match(family, OptionalKind::Coverage, id, MatchStrategy::ExplicitId);
            return;
        }

        let Some(terms) = parse_coverage_terms(&record.description) else {
            warn!(plan = %self.plan.id, ?family, description = %record.description, "legacy coverage line without recognisable terms");
            self.ambiguous(family);
            return;
        };

        let candidates: Vec<u32> = self
            .catalogs
            .options(family)
            .iter()
            .filter(|option| parse_coverage_terms(&option.description) == Some(terms))
            .map(|option| option.id)
            .collect();

        match candidates.as_slice() {
            [id] => {
                warn!(
                    plan = %self.plan.id,
                    ?family,
                    catalog_id = id,
                    amount = %terms.amount,
                    percentage = %terms.percentage,
                    "legacy coverage line matched by description"
                );
                self.selection.select(family, Some(*id));
                self.record_match(
                    family,
                    OptionalKind::Coverage,
                    *id,
                    MatchStrategy::DescriptionTerms,
                );
            }
            _ => {
                warn!(
                    plan = %self.plan.id,
                    ?family,
                    candidates = candidates.len(),
                    "legacy coverage line left unselected"
                );
                self.ambiguous(family);
            }
        }
    }

    fn copay(&mut self, record: &PersistedOptional) {
        let Some(family) = self.family_of(record) else {
            return;
        };
        if !family.is_dynamic() || !self.claim(family, true) || self.unavailable(family) {
            return;
        }
        if self.selection.family(family).catalog_option_id().is_none() {
            warn!(plan = %self.plan.id, ?family, "copay line without a matching coverage");
            self.ambiguous(family);
            return;
        }

        if let Some(id) = record.copay_id {
            self.selection.select_copay(family, Some(id));
            self.record_match(family, OptionalKind::Copay, id, MatchStrategy::ExplicitId);
            return;
        }

        let unit = self.unit_amount(record.premium);
        let tolerance = self.config.copay_price_tolerance;
        let mut nearest: Vec<(Decimal, u32)> = self
            .catalogs
            .copays(family)
            .iter()
            .filter_map(|copay| Some((copay.unit_price.checked_sub(unit)?.abs(), copay.id)))
            .filter(|(distance, _)| *distance <= tolerance)
            .collect();
        nearest.sort();

        match nearest.as_slice() {
            [(best, id), rest @ ..] if rest.first().map_or(true, |(next, _)| next > best) => {
                warn!(
                    plan = %self.plan.id,
                    ?family,
                    copay_id = id,
                    unit_price = %unit,
                    distance = %best,
                    "copay line matched by nearest price"
                );
                self.selection.select_copay(family, Some(*id));
                self.record_match(
                    family,
                    OptionalKind::Copay,
                    *id,
                    MatchStrategy::NearestCopayPrice,
                );
            }
            _ => {
                warn!(plan = %self.plan.id, ?family, unit_price = %unit, "copay line left unselected");
                self.ambiguous(family);
            }
        }
    }

    fn dental(&mut self, record: &PersistedOptional) {
        let family = CoverageFamily::Dental;
        if !self.claim(family, false) {
            return;
        }

        if let Some(tier) = record.original_catalog_id.and_then(dental_tier) {
            self.selection.select(family, Some(tier.id));
            self.record_match(family, OptionalKind::Dental, tier.id, MatchStrategy::ExplicitId);
            return;
        }

        let unit = self.unit_amount(record.premium);
        let tolerance = self.config.dental_price_tolerance;
        let matched = dental_tiers()
            .iter()
            .filter_map(|tier| Some((tier.premium.checked_sub(unit)?.abs(), tier)))
            .filter(|(distance, _)| *distance <= tolerance)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, tier)| tier);

        if let Some(tier) = matched {
            self.selection.select(family, Some(tier.id));
            self.record_match(family, OptionalKind::Dental, tier.id, MatchStrategy::DentalPremium);
            return;
        }

        self.ambiguous(family);
        match self.config.dental_fallback {
            DentalFallback::HighestTier => {
                let tier = highest_dental_tier();
                warn!(
                    plan = %self.plan.id,
                    unit_price = %unit,
                    tier = tier.name,
                    "dental premium matched no tier, falling back to highest tier"
                );
                self.selection.select(family, Some(tier.id));
                self.record_match(
                    family,
                    OptionalKind::Dental,
                    tier.id,
                    MatchStrategy::DentalHighestTier,
                );
            }
            DentalFallback::NoSelection => {
                warn!(plan = %self.plan.id, unit_price = %unit, "dental premium matched no tier");
            }
        }
    }
}
