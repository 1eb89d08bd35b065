use rust_decimal::Decimal;

use super::super::catalog::{dental_tier, ResolvedCatalogs};
use super::super::domain::{
    checked_total, line_premium, AppliedOptional, ClientCategory, ClientProfile, CoverageFamily,
    FamilyFilters, OptionalKind, PlanPricingSummary, PricingIssue, QuotedPlan,
};
use super::super::selection::PlanSelection;
use super::config::PricingConfig;

pub(crate) struct PricingInputs<'a> {
    pub client: &'a ClientProfile,
    pub filters: &'a FamilyFilters,
    pub config: &'a PricingConfig,
}

/// A premium or subtotal left the representable decimal range.
struct Overflow;

pub(crate) fn price_plan(
    plan: &QuotedPlan,
    selection: &PlanSelection,
    catalogs: &ResolvedCatalogs,
    inputs: &PricingInputs<'_>,
) -> (Vec<AppliedOptional>, PlanPricingSummary, Vec<PricingIssue>) {
    let mut issues = Vec::new();
    let priced = priced_lines(plan, selection, catalogs, inputs, &mut issues)
        .and_then(|applied| summarize(plan, &applied).map(|summary| (applied, summary)));

    match priced {
        Ok((applied, summary)) => (applied, summary, issues),
        Err(Overflow) => {
            issues.push(PricingIssue::AmountOverflow {
                plan: plan.id.clone(),
            });
            let summary = PlanPricingSummary {
                affiliate_subtotal: plan.affiliate_subtotal,
                optional_subtotal: Decimal::ZERO,
                total_due: plan.affiliate_subtotal,
            };
            (Vec::new(), summary, issues)
        }
    }
}

fn priced_lines(
    plan: &QuotedPlan,
    selection: &PlanSelection,
    catalogs: &ResolvedCatalogs,
    inputs: &PricingInputs<'_>,
    issues: &mut Vec<PricingIssue>,
) -> Result<Vec<AppliedOptional>, Overflow> {
    let category = inputs.client.category;
    let multiplier = plan.multiplier(category);
    let copays_allowed = inputs.config.copay_policy.allows(inputs.client);

    let mut applied = Vec::new();

    for family in CoverageFamily::dynamic() {
        if !inputs.filters.is_active(category, family) {
            continue;
        }

        let choice = selection.family(family);
        let unavailable = catalogs.is_unavailable(family);
        if unavailable && choice.catalog_option_id().is_some() {
            issues.push(PricingIssue::CatalogUnavailable { family });
        }
        let option_id = match choice.catalog_option_id() {
            Some(option_id) if !unavailable => option_id,
            _ => {
                if category == ClientCategory::Individual {
                    applied.extend(bundled_line(plan, family, multiplier)?);
                }
                continue;
            }
        };

        let Some(option) = catalogs.find_option(family, option_id) else {
            issues.push(PricingIssue::InvalidSelectionReference {
                family,
                id: option_id,
            });
            continue;
        };

        applied.push(AppliedOptional {
            source_catalog_id: option.id,
            name: family.label().to_string(),
            description: option.description.clone(),
            premium: line_premium(option.unit_premium, multiplier).ok_or(Overflow)?,
            family_id: family.family_id(),
            copay_id: None,
            kind: OptionalKind::Coverage,
        });

        let Some(copay_id) = choice.copay_option_id() else {
            continue;
        };
        if !copays_allowed {
            continue;
        }
        match catalogs.find_copay(family, copay_id) {
            Some(copay) => applied.push(AppliedOptional {
                source_catalog_id: option.id,
                name: family.copay_label(),
                description: copay.description.clone(),
                premium: line_premium(copay.unit_price, multiplier).ok_or(Overflow)?,
                family_id: family.family_id(),
                copay_id: Some(copay.id),
                kind: OptionalKind::Copay,
            }),
            None => issues.push(PricingIssue::InvalidSelectionReference {
                family,
                id: copay_id,
            }),
        }
    }

    if inputs.filters.is_active(category, CoverageFamily::Dental) {
        match selection.dental_tier() {
            Some(tier_id) => match dental_tier(tier_id) {
                Some(tier) => applied.push(AppliedOptional {
                    source_catalog_id: tier.id,
                    name: CoverageFamily::Dental.label().to_string(),
                    description: tier.name.to_string(),
                    premium: line_premium(tier.premium, multiplier).ok_or(Overflow)?,
                    family_id: CoverageFamily::Dental.family_id(),
                    copay_id: None,
                    kind: OptionalKind::Dental,
                }),
                None => issues.push(PricingIssue::InvalidSelectionReference {
                    family: CoverageFamily::Dental,
                    id: tier_id,
                }),
            },
            None if category == ClientCategory::Individual => {
                applied.extend(bundled_line(plan, CoverageFamily::Dental, multiplier)?);
            }
            None => {}
        }
    }

    Ok(applied)
}

fn summarize(
    plan: &QuotedPlan,
    applied: &[AppliedOptional],
) -> Result<PlanPricingSummary, Overflow> {
    let optional_subtotal =
        checked_total(applied.iter().map(|line| line.premium)).ok_or(Overflow)?;
    let total_due = plan
        .affiliate_subtotal
        .checked_add(optional_subtotal)
        .ok_or(Overflow)?;
    Ok(PlanPricingSummary {
        affiliate_subtotal: plan.affiliate_subtotal,
        optional_subtotal,
        total_due,
    })
}

fn bundled_line(
    plan: &QuotedPlan,
    family: CoverageFamily,
    multiplier: u32,
) -> Result<Option<AppliedOptional>, Overflow> {
    let Some(record) = plan.coverage_record(family) else {
        return Ok(None);
    };
    Ok(Some(AppliedOptional {
        source_catalog_id: record.catalog_id,
        name: family.label().to_string(),
        description: record.description.clone(),
        premium: line_premium(record.unit_premium, multiplier).ok_or(Overflow)?,
        family_id: family.family_id(),
        copay_id: None,
        kind: OptionalKind::Bundled,
    }))
}
