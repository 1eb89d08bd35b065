use crate::cli::ServeArgs;
use crate::infra::{load_catalog, AppState, InMemoryQuotationStore};
use crate::routes::with_quotation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use coverage_pricing::config::AppConfig;
use coverage_pricing::error::AppError;
use coverage_pricing::telemetry;
use coverage_pricing::workflows::quotation::QuotationService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = Arc::new(load_catalog(config.catalog_csv.as_deref())?);
    let store = Arc::new(InMemoryQuotationStore::default());
    let quotation_service = Arc::new(QuotationService::new(
        catalog,
        store,
        config.pricing.clone(),
    ));

    let app = with_quotation_routes(quotation_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        copay_policy = ?config.pricing.copay_policy,
        "coverage pricing service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
