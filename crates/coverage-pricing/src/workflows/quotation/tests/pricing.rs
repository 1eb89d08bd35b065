use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::common::*;
use crate::workflows::quotation::catalog::ResolvedCatalogs;
use crate::workflows::quotation::domain::{
    CoverageFamily, FamilyFilters, OptionalKind, PlanCoverageRecord, PricingIssue,
};
use crate::workflows::quotation::selection::PlanSelection;
use crate::workflows::quotation::{CopayPolicy, PremiumReconciler, PricingConfig};

fn filters(families: &[CoverageFamily]) -> FamilyFilters {
    let mut filters = FamilyFilters::default();
    for family in families {
        filters.set(*family, true);
    }
    filters
}

#[test]
fn individual_coverage_scales_with_affiliates() {
    let engine = PremiumReconciler::default();
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::HighCost, Some(11));

    let quote = engine.compute_plan_optionals(
        &family_plan(),
        &selection,
        &resolved_catalogs(),
        &individual_client(),
        &FamilyFilters::default(),
    );

    assert_eq!(quote.applied_optionals.len(), 1);
    let line = &quote.applied_optionals[0];
    assert_eq!(line.kind, OptionalKind::Coverage);
    assert_eq!(line.source_catalog_id, 11);
    assert_eq!(line.family_id, CoverageFamily::HighCost.family_id());
    assert_eq!(line.premium, dec!(274.64));
    assert_eq!(quote.summary.optional_subtotal, dec!(274.64));
    assert_eq!(quote.summary.total_due, dec!(874.64));
    assert!(quote.issues.is_empty());
}

#[test]
fn collective_copay_adds_its_own_line() {
    let engine = PremiumReconciler::default();
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::Medication, Some(21));
    assert!(selection.select_copay(CoverageFamily::Medication, Some(201)));

    let quote = engine.compute_plan_optionals(
        &collective_plan("plan-a", 10),
        &selection,
        &resolved_catalogs(),
        &collective_client(),
        &filters(&[CoverageFamily::Medication]),
    );

    let premiums: Vec<_> = quote
        .applied_optionals
        .iter()
        .map(|line| (line.kind, line.premium))
        .collect();
    assert_eq!(
        premiums,
        vec![
            (OptionalKind::Coverage, dec!(1299.00)),
            (OptionalKind::Copay, dec!(1000.00)),
        ]
    );
    let copay_line = &quote.applied_optionals[1];
    assert_eq!(copay_line.copay_id, Some(201));
    assert_eq!(copay_line.source_catalog_id, 21);
    assert_eq!(quote.summary.optional_subtotal, dec!(2299.00));
    assert_eq!(quote.summary.total_due, dec!(2500.00) + dec!(2299.00));
}

#[test]
fn dental_tier_is_priced_per_affiliate() {
    let engine = PremiumReconciler::default();
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::Dental, Some(2));

    let quote = engine.compute_plan_optionals(
        &collective_plan("plan-a", 3),
        &selection,
        &ResolvedCatalogs::default(),
        &collective_client(),
        &filters(&[CoverageFamily::Dental]),
    );

    assert_eq!(quote.applied_optionals.len(), 1);
    let line = &quote.applied_optionals[0];
    assert_eq!(line.kind, OptionalKind::Dental);
    assert_eq!(line.description, "Nivel II");
    assert_eq!(line.premium, dec!(1050.00));
}

#[test]
fn inactive_families_are_not_priced() {
    let engine = PremiumReconciler::default();
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::HighCost, Some(11));
    selection.select(CoverageFamily::Room, Some(31));

    let quote = engine.compute_plan_optionals(
        &collective_plan("plan-a", 4),
        &selection,
        &resolved_catalogs(),
        &collective_client(),
        &filters(&[CoverageFamily::Room]),
    );

    assert_eq!(quote.applied_optionals.len(), 1);
    assert_eq!(
        quote.applied_optionals[0].family(),
        Some(CoverageFamily::Room)
    );
    assert_eq!(quote.applied_optionals[0].premium, dec!(181.00));
}

#[test]
fn pricing_is_deterministic() {
    let engine = PremiumReconciler::default();
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::HighCost, Some(12));
    selection.select_copay(CoverageFamily::HighCost, Some(101));
    selection.select(CoverageFamily::Dental, Some(1));
    let plan = collective_plan("plan-a", 7);
    let catalogs = resolved_catalogs();
    let client = collective_client();
    let active = FamilyFilters::all_active();

    let first = engine.compute_plan_optionals(&plan, &selection, &catalogs, &client, &active);
    let second = engine.compute_plan_optionals(&plan, &selection, &catalogs, &client, &active);

    assert_eq!(first, second);
    let sum: rust_decimal::Decimal = first.applied_optionals.iter().map(|line| line.premium).sum();
    assert_eq!(first.summary.optional_subtotal, sum);
    assert_eq!(
        first.summary.total_due,
        first.summary.affiliate_subtotal + first.summary.optional_subtotal
    );
}

#[test]
fn each_line_is_rounded_half_away_from_zero() {
    let engine = PremiumReconciler::default();
    let catalogs = ResolvedCatalogs::default().with_options(
        CoverageFamily::Room,
        vec![option(31, "Habitacion", dec!(0.125))],
    );
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::Room, Some(31));

    let quote = engine.compute_plan_optionals(
        &collective_plan("plan-a", 3),
        &selection,
        &catalogs,
        &collective_client(),
        &filters(&[CoverageFamily::Room]),
    );

    assert_eq!(quote.applied_optionals[0].premium, dec!(0.38));
}

#[test]
fn copays_follow_the_configured_policy() {
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::Medication, Some(21));
    selection.select_copay(CoverageFamily::Medication, Some(201));
    let plan = collective_plan("plan-a", 10);
    let catalogs = resolved_catalogs();
    let active = filters(&[CoverageFamily::Medication]);
    let mut voluntary = collective_client();
    voluntary.plan_type_id = 1;

    let complementary_only = PremiumReconciler::default();
    let quote =
        complementary_only.compute_plan_optionals(&plan, &selection, &catalogs, &voluntary, &active);
    assert_eq!(quote.applied_optionals.len(), 1);

    let any_collective = PremiumReconciler::new(PricingConfig {
        copay_policy: CopayPolicy::AnyCollective,
        ..PricingConfig::default()
    });
    let quote =
        any_collective.compute_plan_optionals(&plan, &selection, &catalogs, &voluntary, &active);
    assert_eq!(quote.applied_optionals.len(), 2);

    let disabled = PremiumReconciler::new(PricingConfig {
        copay_policy: CopayPolicy::Disabled,
        ..PricingConfig::default()
    });
    let quote = disabled.compute_plan_optionals(
        &plan,
        &selection,
        &catalogs,
        &collective_client(),
        &active,
    );
    assert_eq!(quote.applied_optionals.len(), 1);
}

#[test]
fn unavailable_catalog_is_reported_not_fatal() {
    let engine = PremiumReconciler::default();
    let mut catalogs = resolved_catalogs();
    catalogs.mark_unavailable(CoverageFamily::Medication);
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::Medication, Some(21));
    selection.select(CoverageFamily::Room, Some(31));

    let quote = engine.compute_plan_optionals(
        &collective_plan("plan-a", 2),
        &selection,
        &catalogs,
        &collective_client(),
        &filters(&[CoverageFamily::Medication, CoverageFamily::Room]),
    );

    assert_eq!(
        quote.issues,
        vec![PricingIssue::CatalogUnavailable {
            family: CoverageFamily::Medication
        }]
    );
    assert_eq!(quote.applied_optionals.len(), 1);
    assert_eq!(quote.summary.optional_subtotal, dec!(90.50));
}

#[test]
fn stale_ids_surface_as_invalid_references() {
    let engine = PremiumReconciler::default();
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::HighCost, Some(99));
    selection.select(CoverageFamily::Dental, Some(7));

    let quote = engine.compute_plan_optionals(
        &collective_plan("plan-a", 2),
        &selection,
        &resolved_catalogs(),
        &collective_client(),
        &FamilyFilters::all_active(),
    );

    assert!(quote.applied_optionals.is_empty());
    assert_eq!(
        quote.issues,
        vec![
            PricingIssue::InvalidSelectionReference {
                family: CoverageFamily::HighCost,
                id: 99
            },
            PricingIssue::InvalidSelectionReference {
                family: CoverageFamily::Dental,
                id: 7
            },
        ]
    );
}

#[test]
fn individual_plans_fall_back_to_bundled_records() {
    let engine = PremiumReconciler::default();
    let mut plan = family_plan();
    plan.coverage_records.push(PlanCoverageRecord {
        family: CoverageFamily::Room,
        catalog_id: 39,
        description: "Habitacion incluida".to_string(),
        unit_premium: dec!(20.00),
    });
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::HighCost, Some(11));

    let quote = engine.compute_plan_optionals(
        &plan,
        &selection,
        &resolved_catalogs(),
        &individual_client(),
        &FamilyFilters::default(),
    );

    let kinds: Vec<_> = quote
        .applied_optionals
        .iter()
        .map(|line| (line.kind, line.premium))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (OptionalKind::Coverage, dec!(274.64)),
            (OptionalKind::Bundled, dec!(40.00)),
        ]
    );

    let collective = engine.compute_plan_optionals(
        &plan,
        &PlanSelection::default(),
        &resolved_catalogs(),
        &collective_client(),
        &FamilyFilters::all_active(),
    );
    assert!(collective.applied_optionals.is_empty());
}

#[test]
fn unavailable_family_falls_back_to_the_bundled_record() {
    let engine = PremiumReconciler::default();
    let mut catalogs = resolved_catalogs();
    catalogs.mark_unavailable(CoverageFamily::Room);
    let mut plan = family_plan();
    plan.coverage_records.push(PlanCoverageRecord {
        family: CoverageFamily::Room,
        catalog_id: 39,
        description: "Habitacion incluida".to_string(),
        unit_premium: dec!(20.00),
    });
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::Room, Some(31));

    let quote = engine.compute_plan_optionals(
        &plan,
        &selection,
        &catalogs,
        &individual_client(),
        &FamilyFilters::default(),
    );

    assert_eq!(
        quote.issues,
        vec![PricingIssue::CatalogUnavailable {
            family: CoverageFamily::Room
        }]
    );
    assert_eq!(quote.applied_optionals.len(), 1);
    let line = &quote.applied_optionals[0];
    assert_eq!(line.kind, OptionalKind::Bundled);
    assert_eq!(line.source_catalog_id, 39);
    assert_eq!(line.premium, dec!(40.00));
}

#[test]
fn amounts_beyond_decimal_range_degrade_to_an_issue() {
    let engine = PremiumReconciler::default();
    let mut plan = collective_plan("plan-a", 10);
    plan.affiliate_subtotal = Decimal::MAX;
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::Dental, Some(1));

    let quote = engine.compute_plan_optionals(
        &plan,
        &selection,
        &resolved_catalogs(),
        &collective_client(),
        &filters(&[CoverageFamily::Dental]),
    );

    assert_eq!(
        quote.issues,
        vec![PricingIssue::AmountOverflow {
            plan: plan.id.clone()
        }]
    );
    assert!(quote.applied_optionals.is_empty());
    assert_eq!(quote.summary.optional_subtotal, Decimal::ZERO);
    assert_eq!(quote.summary.total_due, Decimal::MAX);

    let oversized = ResolvedCatalogs::default().with_options(
        CoverageFamily::HighCost,
        vec![option(11, "Alto Costo ilimitado", Decimal::MAX)],
    );
    let mut selection = PlanSelection::default();
    selection.select(CoverageFamily::HighCost, Some(11));

    let quote = engine.compute_plan_optionals(
        &collective_plan("plan-b", 3),
        &selection,
        &oversized,
        &collective_client(),
        &filters(&[CoverageFamily::HighCost]),
    );

    assert!(quote.applied_optionals.is_empty());
    assert!(matches!(
        quote.issues.as_slice(),
        [PricingIssue::AmountOverflow { .. }]
    ));
    assert_eq!(quote.summary.total_due, dec!(750.00));
}
