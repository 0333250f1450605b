// routes/billing.rs
// Billing lifecycle endpoints: listing, generation, manual creation, payment and the overdue sweep.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::error::KosError;
use crate::gateway::{BillingChanges, BillingDraft, PaymentRedirect};
use crate::models::{Billing, BillingPeriod, BillingStatus, Id, Payment, PaymentMethod, Tenant};
use crate::state::{
    AppState, GenerationSummary, PaymentReceipt, StatusCounts, parse_schedule,
};

use super::helpers::{ApiResult, Data, created, data, stale_ok};

#[derive(Deserialize, Default)]
pub struct BillingQuery {
    #[serde(default)]
    status: Option<BillingStatus>,
    #[serde(default)]
    tenant_id: Option<Id>,
}

#[derive(Serialize)]
pub struct BillingList {
    items: Vec<Billing>,
    is_loading: bool,
    error: Option<String>,
    pending_total: i64,
    counts: StatusCounts,
}

pub async fn billings_index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BillingQuery>,
) -> ApiResult<BillingList> {
    stale_ok(state.billing.refresh().await)?;
    let snapshot = state.billing.snapshot().await;
    let items = snapshot
        .items
        .into_iter()
        .filter(|b| query.status.is_none_or(|status| b.status == status))
        .filter(|b| query.tenant_id.is_none_or(|tenant| b.tenant_id == tenant))
        .collect();
    Ok(data(BillingList {
        items,
        is_loading: snapshot.is_loading,
        error: snapshot.error,
        pending_total: state.billing.pending_total().await,
        counts: state.billing.count_by_status().await,
    }))
}

pub async fn billings_show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> ApiResult<Billing> {
    Ok(data(state.billing.require(id).await?))
}

/// Period and due date arrive as text so that missing or malformed values are a 400.
#[derive(Deserialize)]
pub struct ScheduleForm {
    #[serde(rename = "bulan_tagihan", default)]
    period: Option<String>,
    #[serde(rename = "tanggal_jatuh_tempo", default)]
    due_date: Option<String>,
}

pub async fn billings_generate(
    State(state): State<Arc<AppState>>,
    Json(form): Json<ScheduleForm>,
) -> ApiResult<GenerationSummary> {
    let (period, due_date) = parse_schedule(form.period.as_deref(), form.due_date.as_deref())?;
    Ok(data(state.billing.generate_for_period(period, due_date).await?))
}

#[derive(Deserialize)]
pub struct ManualBillingForm {
    #[serde(rename = "penghuni_id")]
    tenant_id: Id,
    #[serde(rename = "total_tagihan")]
    amount: i64,
    #[serde(flatten)]
    schedule: ScheduleForm,
}

pub async fn billings_create(
    State(state): State<Arc<AppState>>,
    Json(form): Json<ManualBillingForm>,
) -> Result<(StatusCode, Json<Data<Billing>>), KosError> {
    let (period, due_date) = parse_schedule(
        form.schedule.period.as_deref(),
        form.schedule.due_date.as_deref(),
    )?;
    let billing = state
        .billing
        .create_manual(BillingDraft {
            tenant_id: form.tenant_id,
            period,
            amount: form.amount,
            due_date,
        })
        .await?;
    Ok(created(billing))
}

pub async fn billings_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    Json(changes): Json<BillingChanges>,
) -> ApiResult<Billing> {
    Ok(data(state.billing.update_billing(id, changes).await?))
}

pub async fn billings_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<StatusCode, KosError> {
    state.billing.delete_billing(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct PaymentForm {
    #[serde(rename = "jumlah_bayar")]
    amount: i64,
    #[serde(rename = "metode_bayar")]
    method: PaymentMethod,
    #[serde(rename = "bukti_bayar", default)]
    proof: Option<String>,
}

pub async fn billings_pay(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    Json(form): Json<PaymentForm>,
) -> ApiResult<PaymentReceipt> {
    let receipt = state
        .billing
        .record_payment(id, form.amount, form.method, form.proof)
        .await?;
    Ok(data(receipt))
}

pub async fn billings_payments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> ApiResult<Vec<Payment>> {
    Ok(data(state.billing.payments(id).await?))
}

pub async fn billings_external_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> ApiResult<PaymentRedirect> {
    Ok(data(state.billing.initiate_external_payment(id).await?))
}

#[derive(Serialize)]
pub struct SweepResult {
    updated: usize,
}

pub async fn billings_check_overdue(State(state): State<Arc<AppState>>) -> ApiResult<SweepResult> {
    let updated = state.billing.check_overdue().await?;
    Ok(data(SweepResult { updated }))
}

#[derive(Deserialize)]
pub struct PeriodQuery {
    #[serde(rename = "bulan", default)]
    period: Option<String>,
}

/// Active tenants still lacking a billing for the period (current month by default).
pub async fn billings_unbilled(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Vec<Tenant>> {
    let period = match query.period.as_deref() {
        Some(raw) => raw.parse::<BillingPeriod>().map_err(KosError::Validation)?,
        None => BillingPeriod::current(),
    };
    stale_ok(state.tenants.refresh().await)?;
    stale_ok(state.billing.refresh().await)?;
    Ok(data(state.billing.tenants_without_billing(period).await))
}
