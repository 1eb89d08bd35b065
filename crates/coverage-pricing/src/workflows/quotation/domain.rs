use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for a plan quoted inside a quotation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub String);

impl PlanId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Governs whether coverage families are bundled automatically or opted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCategory {
    Individual,
    Collective,
}

impl ClientCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Collective => "collective",
        }
    }
}

/// Commercial flavour of the quoted plan, derived from the client category and plan type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Individual,
    Voluntary,
    Complementary,
}

impl PlanKind {
    pub const COMPLEMENTARY_PLAN_TYPE: u32 = 2;

    pub const fn for_client(category: ClientCategory, plan_type_id: u32) -> Self {
        match category {
            ClientCategory::Individual => Self::Individual,
            ClientCategory::Collective if plan_type_id == Self::COMPLEMENTARY_PLAN_TYPE => {
                Self::Complementary
            }
            ClientCategory::Collective => Self::Voluntary,
        }
    }
}

/// The quoted client as far as pricing is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub name: String,
    pub category: ClientCategory,
    pub plan_type_id: u32,
}

impl ClientProfile {
    pub fn plan_kind(&self) -> PlanKind {
        PlanKind::for_client(self.category, self.plan_type_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageFamily {
    HighCost,
    Medication,
    Room,
    Dental,
}

impl CoverageFamily {
    pub const fn ordered() -> [Self; 4] {
        [Self::HighCost, Self::Medication, Self::Room, Self::Dental]
    }

    /// Families whose catalogs are fetched per plan type. Dental is a static table.
    pub const fn dynamic() -> [Self; 3] {
        [Self::HighCost, Self::Medication, Self::Room]
    }

    pub const fn is_dynamic(self) -> bool {
        !matches!(self, Self::Dental)
    }

    pub const fn family_id(self) -> u32 {
        match self {
            Self::HighCost => 1,
            Self::Medication => 2,
            Self::Room => 3,
            Self::Dental => 4,
        }
    }

    pub fn from_family_id(id: u32) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|family| family.family_id() == id)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::HighCost => "High Cost",
            Self::Medication => "Medication",
            Self::Room => "Room",
            Self::Dental => "Dental",
        }
    }

    pub fn copay_label(self) -> String {
        format!("{} Copay", self.label())
    }
}

/// Global opt-in switches collective clients use to activate a coverage family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyFilters {
    #[serde(default)]
    pub high_cost: bool,
    #[serde(default)]
    pub medication: bool,
    #[serde(default)]
    pub room: bool,
    #[serde(default)]
    pub dental: bool,
}

impl FamilyFilters {
    pub const fn all_active() -> Self {
        Self {
            high_cost: true,
            medication: true,
            room: true,
            dental: true,
        }
    }

    pub const fn is_on(&self, family: CoverageFamily) -> bool {
        match family {
            CoverageFamily::HighCost => self.high_cost,
            CoverageFamily::Medication => self.medication,
            CoverageFamily::Room => self.room,
            CoverageFamily::Dental => self.dental,
        }
    }

    pub fn set(&mut self, family: CoverageFamily, active: bool) {
        match family {
            CoverageFamily::HighCost => self.high_cost = active,
            CoverageFamily::Medication => self.medication = active,
            CoverageFamily::Room => self.room = active,
            CoverageFamily::Dental => self.dental = active,
        }
    }

    /// Whether `family` is priced for a client of `category`. Individual clients always
    /// receive every family.
    pub const fn is_active(&self, category: ClientCategory, family: CoverageFamily) -> bool {
        match category {
            ClientCategory::Individual => true,
            ClientCategory::Collective => self.is_on(family),
        }
    }
}

/// One purchasable coverage tier within a dynamic family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogOption {
    pub id: u32,
    pub description: String,
    pub unit_premium: Decimal,
    pub percentage_covered: Decimal,
}

/// Supplemental charge layered onto a selected coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopayOption {
    pub id: u32,
    pub description: String,
    pub unit_price: Decimal,
}

/// Coverage premium bundled into the plan itself, used when an individual client has not
/// picked a catalog option for the family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCoverageRecord {
    pub family: CoverageFamily,
    pub catalog_id: u32,
    pub description: String,
    pub unit_premium: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuredAffiliate {
    pub name: String,
    pub premium: Decimal,
}

/// A plan being quoted, with its headcount and the base premium already computed upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedPlan {
    pub id: PlanId,
    pub name: String,
    /// Affiliate headcount used as the multiplier for collective clients.
    #[serde(default)]
    pub headcount: u32,
    #[serde(default)]
    pub affiliates: Vec<InsuredAffiliate>,
    pub affiliate_subtotal: Decimal,
    #[serde(default)]
    pub coverage_records: Vec<PlanCoverageRecord>,
}

impl QuotedPlan {
    /// Premium multiplier for this plan. Individual family plans price every insured member,
    /// with the holder counted even when no affiliate was listed.
    pub fn multiplier(&self, category: ClientCategory) -> u32 {
        match category {
            ClientCategory::Collective => self.headcount,
            ClientCategory::Individual => u32::try_from(self.affiliates.len())
                .unwrap_or(u32::MAX)
                .max(1),
        }
    }

    pub fn coverage_record(&self, family: CoverageFamily) -> Option<&PlanCoverageRecord> {
        self.coverage_records
            .iter()
            .find(|record| record.family == family)
    }
}

/// Which rule produced an applied optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalKind {
    Coverage,
    Copay,
    Dental,
    Bundled,
}

/// Priced optional coverage line for a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOptional {
    /// Catalog id the line was priced from, kept so a saved quotation maps back to the catalog.
    pub source_catalog_id: u32,
    pub name: String,
    pub description: String,
    pub premium: Decimal,
    pub family_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copay_id: Option<u32>,
    pub kind: OptionalKind,
}

impl AppliedOptional {
    pub fn family(&self) -> Option<CoverageFamily> {
        CoverageFamily::from_family_id(self.family_id)
    }
}

/// Optional line as read back from a saved quotation. Older quotations may lack the
/// original catalog id, the copay id and the kind tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedOptional {
    #[serde(default)]
    pub original_catalog_id: Option<u32>,
    pub family_id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub premium: Decimal,
    #[serde(default)]
    pub copay_id: Option<u32>,
    #[serde(default)]
    pub kind: Option<OptionalKind>,
}

impl PersistedOptional {
    pub fn family(&self) -> Option<CoverageFamily> {
        CoverageFamily::from_family_id(self.family_id)
    }

    /// Tag carried by the record, or the best reading of an untagged legacy record.
    pub fn resolved_kind(&self) -> OptionalKind {
        if let Some(kind) = self.kind {
            return kind;
        }
        if self.family() == Some(CoverageFamily::Dental) {
            return OptionalKind::Dental;
        }
        let name = self.name.to_ascii_lowercase();
        if self.copay_id.is_some() || name.contains("copay") || name.contains("copago") {
            OptionalKind::Copay
        } else {
            OptionalKind::Coverage
        }
    }
}

impl From<&AppliedOptional> for PersistedOptional {
    fn from(value: &AppliedOptional) -> Self {
        Self {
            original_catalog_id: Some(value.source_catalog_id),
            family_id: value.family_id,
            name: value.name.clone(),
            description: value.description.clone(),
            premium: value.premium,
            copay_id: value.copay_id,
            kind: Some(value.kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPricingSummary {
    pub affiliate_subtotal: Decimal,
    pub optional_subtotal: Decimal,
    pub total_due: Decimal,
}

/// Billing frequency picked in the last step of a quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPeriod {
    #[default]
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl PaymentPeriod {
    pub const fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Semiannual => 6,
            Self::Annual => 12,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Semiannual => "semiannual",
            Self::Annual => "annual",
        }
    }

    /// Amount billed per period for a monthly total, or `None` when it overflows.
    pub fn period_total(self, monthly_total: Decimal) -> Option<Decimal> {
        monthly_total
            .checked_mul(Decimal::from(self.months()))
            .map(round_currency)
    }
}

/// Non-fatal pricing problems. They are collected next to results and never abort pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum PricingIssue {
    #[error("catalog unavailable for family {family:?}")]
    CatalogUnavailable { family: CoverageFamily },
    #[error("selection references catalog id {id} no longer offered for family {family:?}")]
    InvalidSelectionReference { family: CoverageFamily, id: u32 },
    #[error("saved {family:?} coverage for plan {plan} could not be matched to the catalog")]
    ReconciliationAmbiguous { family: CoverageFamily, plan: PlanId },
    #[error("bundled coverage records unavailable for plan {plan}")]
    PlanRecordsUnavailable { plan: PlanId },
    #[error("premiums for plan {plan} exceed the supported amount range")]
    AmountOverflow { plan: PlanId },
}

/// Currency rounding applied once per priced line. Results always carry two decimals.
pub fn round_currency(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Rounded premium for `multiplier` insured members, or `None` when it cannot be represented.
pub(crate) fn line_premium(unit: Decimal, multiplier: u32) -> Option<Decimal> {
    unit.checked_mul(Decimal::from(multiplier)).map(round_currency)
}

/// Sum of `amounts`, or `None` on overflow.
pub fn checked_total(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
}
