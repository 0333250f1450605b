// state/dashboard.rs
// Figures shown on the landing page, computed from the caches.

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::models::{BillingPeriod, BillingStatus, Id, format_rupiah};

use super::AppState;
use super::billing::StatusCounts;
use super::rooms::RoomSummary;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OverdueRow {
    pub billing_id: Id,
    pub tenant: String,
    pub room: Option<String>,
    pub period: String,
    pub amount: String,
    pub days_late: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardSummary {
    pub period: BillingPeriod,
    pub period_label: String,
    pub rooms: RoomSummary,
    pub active_tenants: usize,
    pub monthly_income: i64,
    pub monthly_income_label: String,
    pub pending_total: i64,
    pub pending_total_label: String,
    pub billings: StatusCounts,
    pub overdue: Vec<OverdueRow>,
    pub unread_notifications: u64,
    /// Collections whose last refresh failed; their figures come from the previous copy.
    pub stale: Vec<&'static str>,
}

/// Refreshes what it can, sweeps overdue billings, then summarizes.
pub async fn load(state: &AppState) -> DashboardSummary {
    let mut stale = Vec::new();
    if state.rooms.refresh().await.is_err() {
        stale.push("rooms");
    }
    if state.tenants.refresh().await.is_err() {
        stale.push("tenants");
    }
    // The sweep refreshes billings on success.
    if let Err(err) = state.billing.check_overdue().await {
        tracing::warn!(error = %err, "overdue sweep failed");
        if state.billing.refresh().await.is_err() {
            stale.push("billings");
        }
    }
    if let Err(err) = state.face.refresh_unread_count().await {
        tracing::debug!(error = %err, "unread count unavailable");
    }

    summarize(state, BillingPeriod::current(), Utc::now().date_naive(), stale).await
}

async fn summarize(
    state: &AppState,
    period: BillingPeriod,
    today: NaiveDate,
    stale: Vec<&'static str>,
) -> DashboardSummary {
    let rooms = state.rooms.summary().await;
    let tenants = state.tenants.summary().await;
    let monthly_income = state.billing.monthly_income(period).await;
    let pending_total = state.billing.pending_total().await;

    let mut overdue = Vec::new();
    for billing in state.billing.by_status(BillingStatus::Overdue).await {
        let tenant = state.tenants.get(billing.tenant_id).await;
        let room = match tenant.as_ref().and_then(|t| t.room_id) {
            Some(room_id) => state.rooms.get(room_id).await.map(|r| r.number),
            None => None,
        };
        overdue.push(OverdueRow {
            billing_id: billing.id,
            tenant: tenant.map(|t| t.name).unwrap_or_else(|| "-".to_string()),
            room,
            period: billing.period.label(),
            amount: format_rupiah(billing.amount),
            days_late: billing.days_late(today),
        });
    }
    overdue.sort_by(|a, b| b.days_late.cmp(&a.days_late));

    DashboardSummary {
        period,
        period_label: period.label(),
        rooms,
        active_tenants: tenants.with_room,
        monthly_income,
        monthly_income_label: format_rupiah(monthly_income),
        pending_total,
        pending_total_label: format_rupiah(pending_total),
        billings: state.billing.count_by_status().await,
        overdue,
        unread_notifications: state.face.unread_count().await,
        stale,
    }
}
