use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::catalog::CatalogSource;
use super::domain::{
    checked_total, ClientProfile, PaymentPeriod, PersistedOptional, PlanId, PricingIssue,
    QuotedPlan,
};
use super::pricing::PlanQuote;
use super::repository::{QuotationStore, StoreError};
use super::selection::{SelectionChange, SelectionState};
use super::service::{QuotationService, QuotationServiceError, QuoteSession};

/// Router builder exposing the quotation pricing endpoints.
pub fn quotation_router<S, Q>(service: Arc<QuotationService<S, Q>>) -> Router
where
    S: CatalogSource + 'static,
    Q: QuotationStore + 'static,
{
    Router::new()
        .route("/api/v1/quotations", post(submit_handler::<S, Q>))
        .route("/api/v1/quotations/price", post(price_handler::<S, Q>))
        .route("/api/v1/quotations/resume", post(resume_handler::<S, Q>))
        .route(
            "/api/v1/quotations/:document_id/resume",
            get(resume_document_handler::<S, Q>),
        )
        .with_state(service)
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceRequest {
    pub client: ClientProfile,
    pub plans: Vec<QuotedPlan>,
    #[serde(default)]
    pub selection: Option<SelectionState>,
    /// Applied in order on top of `selection` before pricing.
    #[serde(default)]
    pub changes: Vec<SelectionChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResumeRequest {
    pub client: ClientProfile,
    pub plans: Vec<QuotedPlan>,
    #[serde(default)]
    pub persisted: BTreeMap<PlanId, Vec<PersistedOptional>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub user: String,
    pub client: ClientProfile,
    pub plans: Vec<QuotedPlan>,
    #[serde(default)]
    pub selection: Option<SelectionState>,
    #[serde(default)]
    pub payment_period: PaymentPeriod,
    #[serde(default)]
    pub prepared_on: Option<NaiveDate>,
}

/// Priced view of a session, echoing the selection so clients can send it back.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteView {
    pub selection: SelectionState,
    pub quotes: Vec<PlanQuote>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<PricingIssue>,
    pub total_due: Decimal,
}

impl QuoteView {
    fn from_session<S, Q>(
        service: &QuotationService<S, Q>,
        session: &QuoteSession,
    ) -> Result<Self, QuotationServiceError>
    where
        S: CatalogSource + 'static,
        Q: QuotationStore + 'static,
    {
        let quotes = service.quote(session);
        let total_due = checked_total(quotes.iter().map(|quote| quote.summary.total_due))
            .ok_or(QuotationServiceError::AmountOverflow)?;
        Ok(Self {
            selection: session.selection.clone(),
            quotes,
            issues: session.issues().to_vec(),
            total_due,
        })
    }

    fn into_ok_response(self) -> Response {
        (StatusCode::OK, axum::Json(self)).into_response()
    }
}

pub(crate) async fn price_handler<S, Q>(
    State(service): State<Arc<QuotationService<S, Q>>>,
    axum::Json(request): axum::Json<PriceRequest>,
) -> Response
where
    S: CatalogSource + 'static,
    Q: QuotationStore + 'static,
{
    let mut session = match service
        .start(request.client, request.plans, request.selection)
        .await
    {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    for change in request.changes {
        service.apply_change(&mut session, change).await;
    }

    match QuoteView::from_session(&service, &session) {
        Ok(view) => view.into_ok_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn resume_handler<S, Q>(
    State(service): State<Arc<QuotationService<S, Q>>>,
    axum::Json(request): axum::Json<ResumeRequest>,
) -> Response
where
    S: CatalogSource + 'static,
    Q: QuotationStore + 'static,
{
    match service
        .resume(request.client, request.plans, &request.persisted)
        .await
    {
        Ok(session) => match QuoteView::from_session(&service, &session) {
            Ok(view) => view.into_ok_response(),
            Err(error) => error_response(error),
        },
        Err(error) => error_response(error),
    }
}

pub(crate) async fn resume_document_handler<S, Q>(
    State(service): State<Arc<QuotationService<S, Q>>>,
    Path(document_id): Path<String>,
) -> Response
where
    S: CatalogSource + 'static,
    Q: QuotationStore + 'static,
{
    match service.resume_document(&document_id).await {
        Ok(session) => match QuoteView::from_session(&service, &session) {
            Ok(view) => view.into_ok_response(),
            Err(error) => error_response(error),
        },
        Err(QuotationServiceError::Store(StoreError::NotFound)) => {
            let payload = json!({
                "document_id": document_id,
                "error": "quotation not found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S, Q>(
    State(service): State<Arc<QuotationService<S, Q>>>,
    axum::Json(request): axum::Json<SubmitRequest>,
) -> Response
where
    S: CatalogSource + 'static,
    Q: QuotationStore + 'static,
{
    let session = match service
        .start(request.client, request.plans, request.selection)
        .await
    {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };

    let prepared_on = request
        .prepared_on
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    let submitted = service
        .finalize(&session, &request.user, request.payment_period, prepared_on)
        .and_then(|payload| {
            let total_due = payload
                .total_due()
                .ok_or(QuotationServiceError::AmountOverflow)?;
            service.submit(payload).map(|receipt| (receipt, total_due))
        });

    match submitted {
        Ok((receipt, total_due)) => {
            let body = json!({
                "document_id": receipt.document_id,
                "reference": receipt.reference,
                "total_due": total_due,
            });
            (StatusCode::CREATED, axum::Json(body)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: QuotationServiceError) -> Response {
    let status = match &error {
        QuotationServiceError::NothingToPrice | QuotationServiceError::AmountOverflow => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        QuotationServiceError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        QuotationServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        QuotationServiceError::Store(StoreError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
