use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{ClientCategory, CoverageFamily, FamilyFilters, PlanId};

/// Choice for one dynamic family of one plan. A copay is only ever held alongside a
/// catalog option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FamilySelectionRecord")]
pub struct FamilySelection {
    catalog_option_id: Option<u32>,
    copay_option_id: Option<u32>,
}

#[derive(Deserialize)]
struct FamilySelectionRecord {
    #[serde(default)]
    catalog_option_id: Option<u32>,
    #[serde(default)]
    copay_option_id: Option<u32>,
}

impl From<FamilySelectionRecord> for FamilySelection {
    fn from(record: FamilySelectionRecord) -> Self {
        let mut selection = FamilySelection::default();
        selection.select(record.catalog_option_id);
        selection.select_copay(record.copay_option_id);
        selection
    }
}

/// Per-family state machine view of a [`FamilySelection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyState {
    Inactive,
    Selected(u32),
    SelectedWithCopay { option: u32, copay: u32 },
}

impl FamilySelection {
    pub fn catalog_option_id(&self) -> Option<u32> {
        self.catalog_option_id
    }

    pub fn copay_option_id(&self) -> Option<u32> {
        self.copay_option_id
    }

    pub fn state(&self) -> FamilyState {
        match (self.catalog_option_id, self.copay_option_id) {
            (None, _) => FamilyState::Inactive,
            (Some(option), None) => FamilyState::Selected(option),
            (Some(option), Some(copay)) => FamilyState::SelectedWithCopay { option, copay },
        }
    }

    fn select(&mut self, option: Option<u32>) {
        self.catalog_option_id = option;
        if option.is_none() {
            self.copay_option_id = None;
        }
    }

    fn select_copay(&mut self, copay: Option<u32>) -> bool {
        if self.catalog_option_id.is_none() {
            return false;
        }
        self.copay_option_id = copay;
        true
    }
}

/// Everything the user picked for one plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSelection {
    #[serde(default)]
    families: BTreeMap<CoverageFamily, FamilySelection>,
    #[serde(default)]
    dental_tier: Option<u32>,
}

impl PlanSelection {
    pub fn family(&self, family: CoverageFamily) -> FamilySelection {
        self.families.get(&family).copied().unwrap_or_default()
    }

    pub fn dental_tier(&self) -> Option<u32> {
        self.dental_tier
    }

    /// Families holding a non-"none" choice, dental included.
    pub fn selected_families(&self) -> BTreeSet<CoverageFamily> {
        let mut selected: BTreeSet<CoverageFamily> = self
            .families
            .iter()
            .filter(|(_, selection)| selection.catalog_option_id.is_some())
            .map(|(family, _)| *family)
            .collect();
        if self.dental_tier.is_some() {
            selected.insert(CoverageFamily::Dental);
        }
        selected
    }

    pub(crate) fn select(&mut self, family: CoverageFamily, option: Option<u32>) {
        if family == CoverageFamily::Dental {
            self.dental_tier = option;
            return;
        }
        let entry = self.families.entry(family).or_default();
        entry.select(option);
        if option.is_none() {
            self.families.remove(&family);
        }
    }

    pub(crate) fn select_copay(&mut self, family: CoverageFamily, copay: Option<u32>) -> bool {
        match self.families.get_mut(&family) {
            Some(selection) => selection.select_copay(copay),
            None => false,
        }
    }

    pub(crate) fn clear(&mut self, family: CoverageFamily) {
        self.select(family, None);
    }
}

/// User action on the quotation, dispatched through [`SelectionState::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SelectionChange {
    Family {
        plan: PlanId,
        family: CoverageFamily,
        option: Option<u32>,
    },
    Copay {
        plan: PlanId,
        family: CoverageFamily,
        copay: Option<u32>,
    },
    DentalTier {
        plan: PlanId,
        tier: Option<u32>,
    },
    Filter {
        family: CoverageFamily,
        active: bool,
    },
}

/// Plans whose pricing is stale after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recompute {
    Nothing,
    Plan(PlanId),
    AllPlans,
}

/// Session-scoped selections for every plan, plus the collective family filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    category: ClientCategory,
    #[serde(default)]
    filters: FamilyFilters,
    #[serde(default)]
    plans: BTreeMap<PlanId, PlanSelection>,
}

impl SelectionState {
    pub fn new(category: ClientCategory) -> Self {
        Self {
            category,
            filters: FamilyFilters::default(),
            plans: BTreeMap::new(),
        }
    }

    pub fn category(&self) -> ClientCategory {
        self.category
    }

    pub fn filters(&self) -> &FamilyFilters {
        &self.filters
    }

    pub fn is_family_active(&self, family: CoverageFamily) -> bool {
        self.filters.is_active(self.category, family)
    }

    pub fn plan(&self, plan: &PlanId) -> Option<&PlanSelection> {
        self.plans.get(plan)
    }

    pub fn plan_or_default(&self, plan: &PlanId) -> PlanSelection {
        self.plans.get(plan).cloned().unwrap_or_default()
    }

    pub fn plans(&self) -> impl Iterator<Item = (&PlanId, &PlanSelection)> {
        self.plans.iter()
    }

    /// Rebinds the state to the client's category, keeping selections and filters.
    pub(crate) fn rebind(&mut self, category: ClientCategory) {
        self.category = category;
    }

    pub fn ensure_plan(&mut self, plan: &PlanId) {
        self.plans.entry(plan.clone()).or_default();
    }

    /// Sets the catalog option for a family. Choosing "none" drops the family's copay.
    /// Dental choices are routed to the dental tier.
    pub fn set_family_selection(
        &mut self,
        plan: &PlanId,
        family: CoverageFamily,
        option: Option<u32>,
    ) {
        self.plans
            .entry(plan.clone())
            .or_default()
            .select(family, option);
    }

    /// Sets the copay for a family. Ignored while the family has no catalog option.
    pub fn set_copay_selection(
        &mut self,
        plan: &PlanId,
        family: CoverageFamily,
        copay: Option<u32>,
    ) -> bool {
        let applied = self
            .plans
            .get_mut(plan)
            .map(|selection| selection.select_copay(family, copay))
            .unwrap_or(false);
        if !applied {
            debug!(%plan, ?family, ?copay, "copay ignored without a coverage selection");
        }
        applied
    }

    pub fn set_dental_tier(&mut self, plan: &PlanId, tier: Option<u32>) {
        self.set_family_selection(plan, CoverageFamily::Dental, tier);
    }

    /// Flips a collective family filter. Turning a family off clears it on every plan.
    pub fn toggle_family_filter(&mut self, family: CoverageFamily, active: bool) {
        if self.category == ClientCategory::Individual {
            debug!(?family, "family filters do not apply to individual clients");
            return;
        }

        self.filters.set(family, active);
        if !active {
            for selection in self.plans.values_mut() {
                selection.clear(family);
            }
        }
    }

    /// Replaces a plan's selection wholesale, as done when resuming a saved quotation.
    pub fn replace_plan(&mut self, plan: PlanId, selection: PlanSelection) {
        self.plans.insert(plan, selection);
    }

    pub fn apply(&mut self, change: SelectionChange) -> Recompute {
        match change {
            SelectionChange::Family {
                plan,
                family,
                option,
            } => {
                self.set_family_selection(&plan, family, option);
                Recompute::Plan(plan)
            }
            SelectionChange::Copay { plan, family, copay } => {
                if self.set_copay_selection(&plan, family, copay) {
                    Recompute::Plan(plan)
                } else {
                    Recompute::Nothing
                }
            }
            SelectionChange::DentalTier { plan, tier } => {
                self.set_dental_tier(&plan, tier);
                Recompute::Plan(plan)
            }
            SelectionChange::Filter { family, active } => {
                if self.category == ClientCategory::Individual {
                    return Recompute::Nothing;
                }
                self.toggle_family_filter(family, active);
                Recompute::AllPlans
            }
        }
    }
}
