use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::workflows::quotation::catalog::{CatalogError, CatalogSource, CatalogTable};
use crate::workflows::quotation::domain::{
    CatalogOption, ClientCategory, ClientProfile, CopayOption, CoverageFamily, InsuredAffiliate,
    PlanCoverageRecord, PlanId, QuotedPlan,
};
use crate::workflows::quotation::repository::{
    QuotationPayload, QuotationReceipt, QuotationStore, StoreError,
};
use crate::workflows::quotation::{
    quotation_router, FetchMode, PricingConfig, QuotationService, ResolvedCatalogs,
};

pub(super) const INDIVIDUAL_PLAN_TYPE: u32 = 1;
pub(super) const COMPLEMENTARY_PLAN_TYPE: u32 = 2;

pub(super) fn individual_client() -> ClientProfile {
    ClientProfile {
        name: "Maria Gonzalez".to_string(),
        category: ClientCategory::Individual,
        plan_type_id: INDIVIDUAL_PLAN_TYPE,
    }
}

pub(super) fn collective_client() -> ClientProfile {
    ClientProfile {
        name: "Acme Logistics".to_string(),
        category: ClientCategory::Collective,
        plan_type_id: COMPLEMENTARY_PLAN_TYPE,
    }
}

pub(super) fn option(id: u32, description: &str, unit_premium: Decimal) -> CatalogOption {
    CatalogOption {
        id,
        description: description.to_string(),
        unit_premium,
        percentage_covered: dec!(80),
    }
}

pub(super) fn copay(id: u32, description: &str, unit_price: Decimal) -> CopayOption {
    CopayOption {
        id,
        description: description.to_string(),
        unit_price,
    }
}

fn catalog_options() -> Vec<(CoverageFamily, CatalogOption)> {
    vec![
        (
            CoverageFamily::HighCost,
            option(11, "Alto Costo $500,000 al 80%", dec!(137.32)),
        ),
        (
            CoverageFamily::HighCost,
            option(12, "Alto Costo $1,000,000 al 100%", dec!(210.00)),
        ),
        (
            CoverageFamily::Medication,
            option(21, "Medicamentos $50,000 al 70%", dec!(129.90)),
        ),
        (
            CoverageFamily::Medication,
            option(22, "Medicamentos $100,000 al 80%", dec!(185.50)),
        ),
        (
            CoverageFamily::Room,
            option(31, "Habitacion privada $3,000 al 100%", dec!(45.25)),
        ),
    ]
}

fn collective_copays() -> Vec<(CoverageFamily, CopayOption)> {
    vec![
        (
            CoverageFamily::HighCost,
            copay(101, "Copago 10%", dec!(80.00)),
        ),
        (
            CoverageFamily::Medication,
            copay(201, "Copago 20%", dec!(100.00)),
        ),
        (
            CoverageFamily::Medication,
            copay(202, "Copago 30%", dec!(60.00)),
        ),
    ]
}

/// Catalog export shared by the quotation tests. Both plan types offer the same options.
pub(super) fn catalog_table() -> CatalogTable {
    let mut table = CatalogTable::default();
    for plan_type_id in [INDIVIDUAL_PLAN_TYPE, COMPLEMENTARY_PLAN_TYPE] {
        for (family, option) in catalog_options() {
            table = table.with_option(family, plan_type_id, option);
        }
    }
    for (family, copay) in collective_copays() {
        table = table.with_copay(family, ClientCategory::Collective, copay);
    }
    table.with_plan_record(
        "Plan Familiar",
        INDIVIDUAL_PLAN_TYPE,
        ClientCategory::Individual,
        PlanCoverageRecord {
            family: CoverageFamily::Room,
            catalog_id: 39,
            description: "Habitacion incluida".to_string(),
            unit_premium: dec!(20.00),
        },
    )
}

/// Resolved snapshot equivalent to an eager fetch of [`catalog_table`] for a collective client.
pub(super) fn resolved_catalogs() -> ResolvedCatalogs {
    let mut catalogs = ResolvedCatalogs::default();
    for family in CoverageFamily::dynamic() {
        let options = catalog_options()
            .into_iter()
            .filter(|(owner, _)| *owner == family)
            .map(|(_, option)| option)
            .collect();
        let copays = collective_copays()
            .into_iter()
            .filter(|(owner, _)| *owner == family)
            .map(|(_, copay)| copay)
            .collect();
        catalogs = catalogs.with_options(family, options).with_copays(family, copays);
    }
    catalogs
}

pub(super) async fn resolve_eagerly(client: &ClientProfile) -> ResolvedCatalogs {
    let resolver = crate::workflows::quotation::CatalogResolver::new(
        Arc::new(catalog_table()),
        PricingConfig::default().copay_policy,
    );
    let (catalogs, issues) = resolver
        .resolve(client, &Default::default(), FetchMode::Eager)
        .await;
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    catalogs
}

pub(super) fn affiliate(name: &str, premium: Decimal) -> InsuredAffiliate {
    InsuredAffiliate {
        name: name.to_string(),
        premium,
    }
}

pub(super) fn family_plan() -> QuotedPlan {
    QuotedPlan {
        id: PlanId::new("plan-familiar"),
        name: "Plan Familiar".to_string(),
        headcount: 0,
        affiliates: vec![
            affiliate("Maria Gonzalez", dec!(310.00)),
            affiliate("Luis Gonzalez", dec!(290.00)),
        ],
        affiliate_subtotal: dec!(600.00),
        coverage_records: Vec::new(),
    }
}

pub(super) fn collective_plan(id: &str, headcount: u32) -> QuotedPlan {
    QuotedPlan {
        id: PlanId::new(id),
        name: format!("Plan Colectivo {id}"),
        headcount,
        affiliates: Vec::new(),
        affiliate_subtotal: Decimal::from(headcount) * dec!(250.00),
        coverage_records: Vec::new(),
    }
}

pub(super) fn build_service() -> (
    QuotationService<CatalogTable, MemoryStore>,
    Arc<MemoryStore>,
) {
    build_service_with(catalog_table(), PricingConfig::default())
}

pub(super) fn build_service_with(
    table: CatalogTable,
    config: PricingConfig,
) -> (
    QuotationService<CatalogTable, MemoryStore>,
    Arc<MemoryStore>,
) {
    let store = Arc::new(MemoryStore::default());
    let service = QuotationService::new(Arc::new(table), store.clone(), config);
    (service, store)
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    pub(super) documents: Arc<Mutex<HashMap<String, QuotationPayload>>>,
}

impl MemoryStore {
    pub(super) fn len(&self) -> usize {
        self.documents.lock().expect("store mutex poisoned").len()
    }
}

impl QuotationStore for MemoryStore {
    fn submit(&self, payload: QuotationPayload) -> Result<QuotationReceipt, StoreError> {
        let mut guard = self.documents.lock().expect("store mutex poisoned");
        let document_id = format!("doc-{}", guard.len() + 1);
        let reference = format!("COT-{:04}", guard.len() + 1);
        guard.insert(document_id.clone(), payload);
        Ok(QuotationReceipt {
            document_id,
            reference,
        })
    }

    fn fetch(&self, document_id: &str) -> Result<Option<QuotationPayload>, StoreError> {
        let guard = self.documents.lock().expect("store mutex poisoned");
        Ok(guard.get(document_id).cloned())
    }
}

pub(super) struct ConflictStore;

impl QuotationStore for ConflictStore {
    fn submit(&self, _payload: QuotationPayload) -> Result<QuotationReceipt, StoreError> {
        Err(StoreError::Conflict)
    }

    fn fetch(&self, _document_id: &str) -> Result<Option<QuotationPayload>, StoreError> {
        Ok(None)
    }
}

/// Source whose plan record endpoint is down.
pub(super) struct PlanRecordsOutage(pub(super) CatalogTable);

#[async_trait]
impl CatalogSource for PlanRecordsOutage {
    async fn fetch_catalog(
        &self,
        family: CoverageFamily,
        plan_type_id: u32,
    ) -> Result<Vec<CatalogOption>, CatalogError> {
        self.0.fetch_catalog(family, plan_type_id).await
    }

    async fn fetch_copay_options(
        &self,
        family: CoverageFamily,
        category: ClientCategory,
    ) -> Result<Vec<CopayOption>, CatalogError> {
        self.0.fetch_copay_options(family, category).await
    }

    async fn fetch_plan_records(
        &self,
        plan_name: &str,
        _plan_type_id: u32,
        _category: ClientCategory,
    ) -> Result<Vec<PlanCoverageRecord>, CatalogError> {
        Err(CatalogError::PlanRecordsUnavailable {
            plan_name: plan_name.to_string(),
            reason: "503 from plan service".to_string(),
        })
    }
}

/// Source counting catalog requests per family.
#[derive(Default)]
pub(super) struct CountingSource {
    pub(super) table: CatalogTable,
    pub(super) catalog_calls: Mutex<Vec<CoverageFamily>>,
}

impl CountingSource {
    pub(super) fn new(table: CatalogTable) -> Self {
        Self {
            table,
            catalog_calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn calls(&self) -> Vec<CoverageFamily> {
        let mut calls = self.catalog_calls.lock().expect("calls mutex poisoned").clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl CatalogSource for CountingSource {
    async fn fetch_catalog(
        &self,
        family: CoverageFamily,
        plan_type_id: u32,
    ) -> Result<Vec<CatalogOption>, CatalogError> {
        self.catalog_calls
            .lock()
            .expect("calls mutex poisoned")
            .push(family);
        self.table.fetch_catalog(family, plan_type_id).await
    }

    async fn fetch_copay_options(
        &self,
        family: CoverageFamily,
        category: ClientCategory,
    ) -> Result<Vec<CopayOption>, CatalogError> {
        self.table.fetch_copay_options(family, category).await
    }

    async fn fetch_plan_records(
        &self,
        plan_name: &str,
        plan_type_id: u32,
        category: ClientCategory,
    ) -> Result<Vec<PlanCoverageRecord>, CatalogError> {
        self.table
            .fetch_plan_records(plan_name, plan_type_id, category)
            .await
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn quotation_router_with_service(
    service: QuotationService<CatalogTable, MemoryStore>,
) -> axum::Router {
    quotation_router(Arc::new(service))
}

/// Source whose high cost catalog and copay requests only return once both are in flight.
pub(super) struct RendezvousSource {
    pub(super) table: CatalogTable,
    pub(super) barrier: tokio::sync::Barrier,
}

impl RendezvousSource {
    pub(super) fn new(table: CatalogTable) -> Self {
        Self {
            table,
            barrier: tokio::sync::Barrier::new(2),
        }
    }
}

#[async_trait]
impl CatalogSource for RendezvousSource {
    async fn fetch_catalog(
        &self,
        family: CoverageFamily,
        plan_type_id: u32,
    ) -> Result<Vec<CatalogOption>, CatalogError> {
        if family == CoverageFamily::HighCost {
            self.barrier.wait().await;
        }
        self.table.fetch_catalog(family, plan_type_id).await
    }

    async fn fetch_copay_options(
        &self,
        family: CoverageFamily,
        category: ClientCategory,
    ) -> Result<Vec<CopayOption>, CatalogError> {
        if family == CoverageFamily::HighCost {
            self.barrier.wait().await;
        }
        self.table.fetch_copay_options(family, category).await
    }

    async fn fetch_plan_records(
        &self,
        plan_name: &str,
        plan_type_id: u32,
        category: ClientCategory,
    ) -> Result<Vec<PlanCoverageRecord>, CatalogError> {
        self.table
            .fetch_plan_records(plan_name, plan_type_id, category)
            .await
    }
}
