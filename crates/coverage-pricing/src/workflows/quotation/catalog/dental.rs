use rust_decimal::Decimal;
use serde::Serialize;

/// Fixed dental tier with its per-affiliate premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DentalTier {
    pub id: u32,
    pub name: &'static str,
    pub premium: Decimal,
}

const DENTAL_TIERS: [DentalTier; 3] = [
    DentalTier {
        id: 1,
        name: "Nivel I",
        premium: Decimal::from_parts(175, 0, 0, false, 0),
    },
    DentalTier {
        id: 2,
        name: "Nivel II",
        premium: Decimal::from_parts(350, 0, 0, false, 0),
    },
    DentalTier {
        id: 3,
        name: "Nivel III",
        premium: Decimal::from_parts(700, 0, 0, false, 0),
    },
];

/// Tiers ordered from cheapest to most expensive.
pub fn dental_tiers() -> &'static [DentalTier] {
    &DENTAL_TIERS
}

pub fn dental_tier(id: u32) -> Option<&'static DentalTier> {
    DENTAL_TIERS.iter().find(|tier| tier.id == id)
}

pub fn highest_dental_tier() -> &'static DentalTier {
    &DENTAL_TIERS[DENTAL_TIERS.len() - 1]
}
