use crate::infra::{load_catalog, InMemoryQuotationStore};
use chrono::{Local, NaiveDate};
use clap::Args;
use coverage_pricing::error::AppError;
use coverage_pricing::workflows::quotation::{
    ClientCategory, ClientProfile, CoverageFamily, PaymentPeriod, PlanId, PlanQuote,
    PricingConfig, QuotationService, QuotationServiceError, QuotedPlan, SelectionChange,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Catalog CSV export to price against. Defaults to the bundled demo catalog.
    #[arg(long)]
    pub(crate) catalog_csv: Option<PathBuf>,
    /// Headcount of the first collective plan.
    #[arg(long, default_value_t = 10)]
    pub(crate) headcount: u32,
    /// Payment period: monthly, quarterly, semiannual or annual.
    #[arg(long, value_parser = parse_period)]
    pub(crate) period: Option<PaymentPeriod>,
    /// Preparation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) prepared_on: Option<NaiveDate>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        catalog_csv,
        headcount,
        period,
        prepared_on,
    } = args;

    let catalog = Arc::new(load_catalog(catalog_csv.as_deref())?);
    let service = QuotationService::new(
        catalog,
        Arc::new(InMemoryQuotationStore::default()),
        PricingConfig::default(),
    );

    let client = ClientProfile {
        name: "Acme Logistics".to_string(),
        category: ClientCategory::Collective,
        plan_type_id: 2,
    };
    let plans = vec![
        demo_plan("operaciones", "Plan Operaciones", headcount, Decimal::new(24_500, 2)),
        demo_plan("gerencia", "Plan Gerencia", 3, Decimal::new(41_000, 2)),
    ];
    let operations = PlanId::new("operaciones");
    let management = PlanId::new("gerencia");

    println!("Coverage pricing demo");
    println!(
        "Client {} ({}, plan type {})",
        client.name,
        client.category.label(),
        client.plan_type_id
    );

    let mut session = service.start(client, plans, None).await?;
    let changes = [
        SelectionChange::Filter {
            family: CoverageFamily::Medication,
            active: true,
        },
        SelectionChange::Filter {
            family: CoverageFamily::Dental,
            active: true,
        },
        SelectionChange::Family {
            plan: operations.clone(),
            family: CoverageFamily::Medication,
            option: Some(23),
        },
        SelectionChange::Copay {
            plan: operations.clone(),
            family: CoverageFamily::Medication,
            copay: Some(201),
        },
        SelectionChange::DentalTier {
            plan: management.clone(),
            tier: Some(2),
        },
    ];
    for change in changes {
        service.apply_change(&mut session, change).await;
    }

    println!("\nPriced selection");
    let quotes = service.quote(&session);
    for quote in &quotes {
        render_quote(quote);
    }
    for issue in session.issues() {
        println!("  ! {issue}");
    }

    let period = period.unwrap_or_default();
    let prepared_on = prepared_on.unwrap_or_else(|| Local::now().date_naive());
    let payload = service.finalize(&session, "demo@coverage.local", period, prepared_on)?;
    let total_due = payload
        .total_due()
        .ok_or(QuotationServiceError::AmountOverflow)?;
    println!(
        "\nQuotation total {} per month, billed {}",
        total_due,
        period.label()
    );
    for plan in &payload.plans {
        println!(
            "- {}: {} per {} period",
            plan.plan.name,
            plan.period_total,
            period.label()
        );
    }

    let receipt = service.submit(payload)?;
    println!(
        "\nSubmitted as {} (reference {})",
        receipt.document_id, receipt.reference
    );

    let resumed = service.resume_document(&receipt.document_id).await?;
    println!("Resumed quotation for editing");
    for quote in service.quote(&resumed) {
        render_quote(&quote);
    }
    if resumed.issues().is_empty() {
        println!("  Every saved line mapped back to the catalog");
    } else {
        for issue in resumed.issues() {
            println!("  ! {issue}");
        }
    }

    Ok(())
}

fn demo_plan(id: &str, name: &str, headcount: u32, unit_premium: Decimal) -> QuotedPlan {
    QuotedPlan {
        id: PlanId::new(id),
        name: name.to_string(),
        headcount,
        affiliates: Vec::new(),
        affiliate_subtotal: unit_premium * Decimal::from(headcount),
        coverage_records: Vec::new(),
    }
}

fn render_quote(quote: &PlanQuote) {
    println!(
        "- {}: base {} + optionals {} = {}",
        quote.plan_id,
        quote.summary.affiliate_subtotal,
        quote.summary.optional_subtotal,
        quote.summary.total_due
    );
    for line in &quote.applied_optionals {
        println!(
            "    {} ({}): {} [{:?}]",
            line.name, line.description, line.premium, line.kind
        );
    }
}

fn parse_period(raw: &str) -> Result<PaymentPeriod, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "monthly" | "mensual" => Ok(PaymentPeriod::Monthly),
        "quarterly" | "trimestral" => Ok(PaymentPeriod::Quarterly),
        "semiannual" | "semestral" => Ok(PaymentPeriod::Semiannual),
        "annual" | "anual" => Ok(PaymentPeriod::Annual),
        other => Err(format!("unknown payment period '{other}'")),
    }
}
