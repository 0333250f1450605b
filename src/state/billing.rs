// state/billing.rs
// Billing lifecycle: generation gated per (tenant, period), payment recording,
// overdue sweep, and aggregates over the cached billings.

use chrono::NaiveDate;
use serde::Serialize;
use std::{collections::HashSet, sync::Arc};

use crate::error::{KosError, Result};
use crate::gateway::{
    BillingChanges, BillingDraft, BillingGateway, GenerateRequest, GenerationLine, PaymentDraft,
    PaymentRedirect,
};
use crate::models::{
    Billing, BillingPeriod, BillingStatus, Id, Payment, PaymentMethod, Room, Tenant,
};

use super::cache::{Collection, Snapshot};
use super::rooms::RoomStore;
use super::tenants::TenantStore;

/// Parses the period and due date given to generation or manual creation.
pub fn parse_schedule(
    period: Option<&str>,
    due_date: Option<&str>,
) -> Result<(BillingPeriod, NaiveDate)> {
    let period = period
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| KosError::validation("Bulan tagihan wajib diisi"))?
        .parse::<BillingPeriod>()
        .map_err(KosError::Validation)?;
    let due_date = due_date
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| KosError::validation("Tanggal jatuh tempo wajib diisi"))?;
    let due_date = NaiveDate::parse_from_str(due_date, "%Y-%m-%d")
        .map_err(|_| KosError::validation(format!("Tanggal jatuh tempo tidak valid: {due_date}")))?;
    Ok((period, due_date))
}

/// Which tenants a bulk generation would bill, and why the others are left out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerationPlan {
    pub lines: Vec<GenerationLine>,
    pub already_billed: usize,
    pub without_room: usize,
}

/// One line per tenant holding a priced room and lacking a billing for `period`.
pub fn plan_generation(
    period: BillingPeriod,
    tenants: &[Tenant],
    rooms: &[Room],
    billings: &[Billing],
) -> GenerationPlan {
    let billed: HashSet<Id> = billings
        .iter()
        .filter(|b| b.period == period)
        .map(|b| b.tenant_id)
        .collect();

    let mut plan = GenerationPlan::default();
    for tenant in tenants {
        if billed.contains(&tenant.id) {
            plan.already_billed += 1;
            continue;
        }
        let price = tenant
            .room_id
            .and_then(|room_id| rooms.iter().find(|r| r.id == room_id))
            .map(|room| room.monthly_price)
            .filter(|price| *price > 0);
        match price {
            Some(amount) => plan.lines.push(GenerationLine {
                tenant_id: tenant.id,
                amount,
            }),
            None => plan.without_room += 1,
        }
    }
    plan
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerationSummary {
    pub period: BillingPeriod,
    pub created: usize,
    pub skipped: usize,
    pub billings: Vec<Billing>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub billing: Option<Billing>,
    /// Paid minus due, when they differ.
    pub mismatch: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub unpaid: usize,
    pub paid: usize,
    pub overdue: usize,
}

/// Owns the billing cache and every transition a billing can go through.
pub struct BillingManager {
    gateway: Arc<dyn BillingGateway>,
    billings: Collection<Billing>,
    tenants: Arc<TenantStore>,
    rooms: Arc<RoomStore>,
}

impl BillingManager {
    pub fn new(
        gateway: Arc<dyn BillingGateway>,
        tenants: Arc<TenantStore>,
        rooms: Arc<RoomStore>,
    ) -> Self {
        BillingManager {
            gateway,
            billings: Collection::new(),
            tenants,
            rooms,
        }
    }

    pub async fn refresh(&self) -> Result<()> {
        self.billings
            .sync("billings", self.gateway.list_billings())
            .await
    }

    pub async fn snapshot(&self) -> Snapshot<Billing> {
        self.billings.snapshot().await
    }

    pub async fn list(&self) -> Vec<Billing> {
        self.billings.items().await
    }

    pub async fn get(&self, id: Id) -> Option<Billing> {
        self.billings.get(id).await
    }

    /// Billing `id`, re-reading the list once if it is not cached yet.
    pub async fn require(&self, id: Id) -> Result<Billing> {
        self.billings
            .lookup("billings", id, || self.gateway.list_billings())
            .await?
            .ok_or(KosError::NotFound {
                entity: "Tagihan",
                id,
            })
    }

    /// Bills every active tenant without a billing for `period` at their room's current price.
    ///
    /// Tenants, rooms and billings are re-read first so the duplicate check runs
    /// against the backend's current state. Running it twice for the same
    /// period creates nothing the second time.
    pub async fn generate_for_period(
        &self,
        period: BillingPeriod,
        due_date: NaiveDate,
    ) -> Result<GenerationSummary> {
        self.tenants.refresh().await?;
        self.rooms.refresh().await?;
        self.refresh().await?;

        let tenants = self.tenants.list().await;
        let rooms = self.rooms.list().await;
        let plan = self
            .billings
            .with_records(|billings| plan_generation(period, &tenants, &rooms, billings))
            .await;
        let skipped = plan.already_billed + plan.without_room;

        if plan.lines.is_empty() {
            tracing::info!(%period, skipped, "nothing to generate");
            return Ok(GenerationSummary {
                period,
                created: 0,
                skipped,
                billings: Vec::new(),
            });
        }

        let request = GenerateRequest {
            period,
            due_date,
            lines: plan.lines,
        };
        let outcome = self
            .billings
            .mutate("billings", self.gateway.generate_billings(&request))
            .await?;
        self.refresh().await?;

        tracing::info!(
            %period,
            created = outcome.created.len(),
            skipped = skipped + outcome.skipped,
            "billings generated"
        );
        Ok(GenerationSummary {
            period,
            created: outcome.created.len(),
            skipped: skipped + outcome.skipped,
            billings: outcome.created,
        })
    }

    /// Creates one unpaid billing with an arbitrary amount, still one per tenant and period.
    pub async fn create_manual(&self, draft: BillingDraft) -> Result<Billing> {
        if draft.amount <= 0 {
            return Err(KosError::validation("Total tagihan harus lebih dari 0"));
        }
        self.tenants.require(draft.tenant_id).await?;
        self.refresh().await?;
        let duplicate = self
            .billings
            .with_records(|billings| {
                billings
                    .iter()
                    .any(|b| b.tenant_id == draft.tenant_id && b.period == draft.period)
            })
            .await;
        if duplicate {
            return Err(KosError::validation(format!(
                "Tagihan bulan {} untuk penghuni ini sudah ada",
                draft.period.label()
            )));
        }

        let billing = self
            .billings
            .mutate("billings", self.gateway.create_billing(&draft))
            .await?;
        tracing::info!(billing_id = billing.id, tenant_id = billing.tenant_id, period = %billing.period, "billing created");
        self.refresh().await?;
        Ok(billing)
    }

    /// Edits amount, due date or the unpaid/overdue flag. Settling goes through `record_payment`;
    /// a paid billing only accepts a new due date.
    pub async fn update_billing(&self, id: Id, changes: BillingChanges) -> Result<Billing> {
        if changes.is_empty() {
            return Err(KosError::validation("Tidak ada perubahan"));
        }
        if changes.amount.is_some_and(|amount| amount <= 0) {
            return Err(KosError::validation("Total tagihan harus lebih dari 0"));
        }
        let current = self.require(id).await?;
        if changes.status == Some(BillingStatus::Paid) {
            return Err(KosError::invalid_state(
                "Pelunasan harus melalui pencatatan pembayaran",
            ));
        }
        if current.status == BillingStatus::Paid
            && (changes.amount.is_some_and(|amount| amount != current.amount)
                || changes.status.is_some())
        {
            return Err(KosError::invalid_state(
                "Total dan status tagihan yang sudah lunas tidak dapat diubah",
            ));
        }

        let billing = self
            .billings
            .mutate("billings", self.gateway.update_billing(id, &changes))
            .await?;
        self.refresh().await?;
        Ok(billing)
    }

    /// Hard delete, allowed in every status.
    pub async fn delete_billing(&self, id: Id) -> Result<()> {
        self.billings
            .mutate("billings", self.gateway.delete_billing(id))
            .await?;
        tracing::info!(billing_id = id, "billing deleted");
        self.refresh().await
    }

    /// Settles an unpaid or overdue billing. The paid amount is not required to match.
    pub async fn record_payment(
        &self,
        billing_id: Id,
        amount: i64,
        method: PaymentMethod,
        proof: Option<String>,
    ) -> Result<PaymentReceipt> {
        if amount <= 0 {
            return Err(KosError::validation("Jumlah bayar harus lebih dari 0"));
        }
        let billing = self.require(billing_id).await?;
        if !billing.status.is_payable() {
            return Err(KosError::invalid_state("Tagihan sudah lunas"));
        }

        let draft = PaymentDraft {
            billing_id,
            amount,
            method,
            proof: proof.filter(|p| !p.trim().is_empty()),
        };
        let payment = self
            .billings
            .mutate("billings", self.gateway.record_payment(&draft))
            .await?;

        let mismatch = (amount != billing.amount).then(|| amount - billing.amount);
        if let Some(diff) = mismatch {
            tracing::warn!(billing_id, due = billing.amount, paid = amount, diff, "payment amount differs from amount due");
        }
        tracing::info!(billing_id, amount, method = method.label(), "payment recorded");

        self.refresh().await?;
        Ok(PaymentReceipt {
            payment,
            billing: self.billings.get(billing_id).await,
            mismatch,
        })
    }

    pub async fn payments(&self, billing_id: Id) -> Result<Vec<Payment>> {
        self.gateway.list_payments(billing_id).await
    }

    /// Asks the payment gateway for a checkout URL. Status changes only once the backend is notified.
    pub async fn initiate_external_payment(&self, billing_id: Id) -> Result<PaymentRedirect> {
        let billing = self.require(billing_id).await?;
        if !billing.status.is_payable() {
            return Err(KosError::invalid_state("Tagihan sudah lunas"));
        }
        let redirect = self.gateway.create_external_payment(billing_id).await?;
        tracing::info!(billing_id, order_id = %redirect.order_id, "external payment initiated");
        Ok(redirect)
    }

    /// Runs the backend's overdue sweep and re-reads the billings. Returns how many changed.
    pub async fn check_overdue(&self) -> Result<usize> {
        let sweep = self
            .billings
            .mutate("billings", self.gateway.check_overdue())
            .await?;
        if sweep.updated > 0 {
            tracing::info!(updated = sweep.updated, "billings marked overdue");
        }
        self.refresh().await?;
        Ok(sweep.updated)
    }

    pub async fn pending_total(&self) -> i64 {
        self.billings
            .with_records(|billings| {
                billings
                    .iter()
                    .filter(|b| b.status == BillingStatus::Unpaid)
                    .map(|b| b.amount)
                    .sum()
            })
            .await
    }

    pub async fn count_by_status(&self) -> StatusCounts {
        self.billings
            .with_records(|billings| {
                billings.iter().fold(StatusCounts::default(), |mut counts, b| {
                    match b.status {
                        BillingStatus::Unpaid => counts.unpaid += 1,
                        BillingStatus::Paid => counts.paid += 1,
                        BillingStatus::Overdue => counts.overdue += 1,
                    }
                    counts
                })
            })
            .await
    }

    /// Sum of paid billings covering `period`.
    pub async fn monthly_income(&self, period: BillingPeriod) -> i64 {
        self.billings
            .with_records(|billings| {
                billings
                    .iter()
                    .filter(|b| b.status == BillingStatus::Paid && b.period == period)
                    .map(|b| b.amount)
                    .sum()
            })
            .await
    }

    pub async fn by_status(&self, status: BillingStatus) -> Vec<Billing> {
        self.billings
            .with_records(|billings| {
                billings
                    .iter()
                    .filter(|b| b.status == status)
                    .cloned()
                    .collect()
            })
            .await
    }

    pub async fn for_tenant(&self, tenant_id: Id) -> Vec<Billing> {
        self.billings
            .with_records(|billings| {
                billings
                    .iter()
                    .filter(|b| b.tenant_id == tenant_id)
                    .cloned()
                    .collect()
            })
            .await
    }

    /// Active tenants with no billing for `period` yet.
    pub async fn tenants_without_billing(&self, period: BillingPeriod) -> Vec<Tenant> {
        let tenants = self.tenants.list().await;
        self.billings
            .with_records(|billings| {
                let billed: HashSet<Id> = billings
                    .iter()
                    .filter(|b| b.period == period)
                    .map(|b| b.tenant_id)
                    .collect();
                tenants
                    .into_iter()
                    .filter(|t| t.is_active() && !billed.contains(&t.id))
                    .collect()
            })
            .await
    }
}
