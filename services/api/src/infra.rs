use chrono::NaiveDate;
use coverage_pricing::error::AppError;
use coverage_pricing::workflows::quotation::{
    CatalogTable, QuotationPayload, QuotationReceipt, QuotationStore, StoreError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Catalog shipped with the service for local runs and demos.
const DEMO_CATALOG: &str = "\
kind,family,plan_type_id,category,plan_name,id,description,price,percentage_covered
coverage,high_cost,1,,,11,\"Alto Costo $500,000 al 80%\",137.32,80
coverage,high_cost,1,,,12,\"Alto Costo $1,000,000 al 100%\",210.00,100
coverage,medication,1,,,21,\"Medicamentos $50,000 al 70%\",129.90,70
coverage,room,1,,,31,\"Habitacion privada $3,000 al 100%\",45.25,100
coverage,high_cost,2,,,13,\"Alto Costo $500,000 al 80%\",118.40,80
coverage,high_cost,2,,,14,\"Alto Costo $1,000,000 al 100%\",189.75,100
coverage,medication,2,,,23,\"Medicamentos $50,000 al 70%\",129.90,70
coverage,medication,2,,,24,\"Medicamentos $100,000 al 80%\",185.50,80
coverage,room,2,,,33,\"Habitacion privada $3,000 al 100%\",41.10,100
copay,high_cost,,collective,,101,Copago 10%,80.00,
copay,medication,,collective,,201,Copago 20%,100.00,
copay,medication,,collective,,202,Copago 30%,60.00,
plan,room,1,individual,Plan Familiar,39,Habitacion incluida,20.00,
plan,medication,1,individual,Plan Familiar,29,Medicamentos incluidos,35.60,
";

pub(crate) fn demo_catalog() -> Result<CatalogTable, AppError> {
    Ok(CatalogTable::from_reader(Cursor::new(DEMO_CATALOG))?)
}

pub(crate) fn load_catalog(path: Option<&Path>) -> Result<CatalogTable, AppError> {
    match path {
        Some(path) => {
            let table = CatalogTable::from_path(path)?;
            info!(path = %path.display(), options = table.option_count(), "catalog export loaded");
            Ok(table)
        }
        None => {
            let table = demo_catalog()?;
            info!(options = table.option_count(), "using bundled demo catalog");
            Ok(table)
        }
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryQuotationStore {
    documents: Arc<Mutex<HashMap<String, QuotationPayload>>>,
}

impl QuotationStore for InMemoryQuotationStore {
    fn submit(&self, payload: QuotationPayload) -> Result<QuotationReceipt, StoreError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        let sequence = guard.len() + 1;
        let document_id = format!("quotation-{sequence}");
        if guard.contains_key(&document_id) {
            return Err(StoreError::Conflict);
        }
        let reference = format!(
            "COT-{}-{sequence:05}",
            payload.prepared_on.format("%Y%m%d")
        );
        guard.insert(document_id.clone(), payload);
        Ok(QuotationReceipt {
            document_id,
            reference,
        })
    }

    fn fetch(&self, document_id: &str) -> Result<Option<QuotationPayload>, StoreError> {
        let guard = self
            .documents
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        Ok(guard.get(document_id).cloned())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
