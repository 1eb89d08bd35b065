use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::super::domain::{ClientCategory, ClientProfile, PlanKind};

/// Which clients may add copays to a selected coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopayPolicy {
    /// Collective clients on a complementary plan (plan type 2).
    #[default]
    ComplementaryOnly,
    AnyCollective,
    Disabled,
}

impl CopayPolicy {
    pub fn allows(self, client: &ClientProfile) -> bool {
        match self {
            CopayPolicy::ComplementaryOnly => client.plan_kind() == PlanKind::Complementary,
            CopayPolicy::AnyCollective => client.category == ClientCategory::Collective,
            CopayPolicy::Disabled => false,
        }
    }
}

/// What to select when a saved dental premium matches no tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DentalFallback {
    #[default]
    HighestTier,
    NoSelection,
}

/// Rules and tolerances for pricing and reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub copay_policy: CopayPolicy,
    /// Absolute unit-price distance accepted when matching a saved copay.
    pub copay_price_tolerance: Decimal,
    /// Absolute unit-price distance accepted when matching a saved dental premium.
    pub dental_price_tolerance: Decimal,
    pub dental_fallback: DentalFallback,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            copay_policy: CopayPolicy::default(),
            copay_price_tolerance: Decimal::ONE,
            dental_price_tolerance: Decimal::new(1, 2),
            dental_fallback: DentalFallback::default(),
        }
    }
}
