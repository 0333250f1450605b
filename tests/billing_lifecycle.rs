#[path = "common/mod.rs"]
mod common;

use kosflow::{
    KosError,
    gateway::{BillingChanges, BillingDraft, RoomDraft},
    models::{BillingStatus, PaymentMethod, RoomType},
};

use common::{add_room, add_tenant, date, period, setup};

#[tokio::test]
async fn generating_twice_for_one_period_creates_one_billing_per_tenant() {
    let ctx = setup().await;
    let room = add_room(&ctx, "Kamar 01", 800_000).await;
    let tenant = add_tenant(&ctx, "Budi", Some(room.id)).await;

    let first = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();
    assert_eq!(first.created, 1);
    let billing = &first.billings[0];
    assert_eq!(billing.tenant_id, tenant.id);
    assert_eq!(billing.amount, 800_000);
    assert_eq!(billing.status, BillingStatus::Unpaid);

    let second = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(ctx.backend.billing_count(), 1);
    assert_eq!(ctx.state.billing.list().await.len(), 1);
}

#[tokio::test]
async fn tenants_without_room_are_not_billed() {
    let ctx = setup().await;
    let room = add_room(&ctx, "Kamar 01", 800_000).await;
    add_tenant(&ctx, "Budi", Some(room.id)).await;
    add_tenant(&ctx, "Tamu", None).await;

    let summary = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn paying_a_paid_billing_is_rejected() {
    let ctx = setup().await;
    let room = add_room(&ctx, "Kamar 01", 800_000).await;
    add_tenant(&ctx, "Budi", Some(room.id)).await;
    let summary = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();
    let id = summary.billings[0].id;

    let receipt = ctx
        .state
        .billing
        .record_payment(id, 800_000, PaymentMethod::Cash, None)
        .await
        .unwrap();
    assert_eq!(receipt.billing.unwrap().status, BillingStatus::Paid);
    assert_eq!(receipt.mismatch, None);

    let err = ctx
        .state
        .billing
        .record_payment(id, 800_000, PaymentMethod::Transfer, None)
        .await
        .unwrap_err();
    assert!(matches!(err, KosError::InvalidState(_)));
    assert_eq!(ctx.backend.payment_count(), 1);
    assert_eq!(ctx.state.billing.get(id).await.unwrap().status, BillingStatus::Paid);
    assert_eq!(ctx.state.billing.payments(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn payment_amount_mismatch_is_reported_not_refused() {
    let ctx = setup().await;
    let room = add_room(&ctx, "Kamar 01", 800_000).await;
    add_tenant(&ctx, "Budi", Some(room.id)).await;
    let summary = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();

    let receipt = ctx
        .state
        .billing
        .record_payment(summary.billings[0].id, 750_000, PaymentMethod::EWallet, None)
        .await
        .unwrap();
    assert_eq!(receipt.mismatch, Some(-50_000));
    assert_eq!(receipt.payment.amount, 750_000);
}

#[tokio::test]
async fn pending_total_drops_by_the_paid_billing() {
    let ctx = setup().await;
    let a = add_room(&ctx, "Kamar 01", 800_000).await;
    let b = add_room(&ctx, "Kamar 02", 1_200_000).await;
    let budi = add_tenant(&ctx, "Budi", Some(a.id)).await;
    add_tenant(&ctx, "Sarah", Some(b.id)).await;
    ctx.state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();
    assert_eq!(ctx.state.billing.pending_total().await, 2_000_000);

    let budi_bill = ctx.state.billing.for_tenant(budi.id).await.remove(0);
    ctx.state
        .billing
        .record_payment(budi_bill.id, budi_bill.amount, PaymentMethod::Cash, None)
        .await
        .unwrap();
    assert_eq!(ctx.state.billing.pending_total().await, 1_200_000);
}

#[tokio::test]
async fn room_price_change_leaves_existing_billings_alone() {
    let ctx = setup().await;
    let room = add_room(&ctx, "Kamar 01", 800_000).await;
    add_tenant(&ctx, "Budi", Some(room.id)).await;
    let march = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();

    ctx.state
        .rooms
        .update(
            room.id,
            RoomDraft {
                number: "Kamar 01".into(),
                room_type: RoomType::Deluxe,
                monthly_price: 950_000,
            },
        )
        .await
        .unwrap();
    ctx.state.billing.refresh().await.unwrap();
    let kept = ctx.state.billing.get(march.billings[0].id).await.unwrap();
    assert_eq!(kept.amount, 800_000);

    let april = ctx
        .state
        .billing
        .generate_for_period(period("2026-04"), date(2026, 4, 10))
        .await
        .unwrap();
    assert_eq!(april.billings[0].amount, 950_000);
}

#[tokio::test]
async fn overdue_billing_can_still_be_paid() {
    let ctx = setup().await;
    let room = add_room(&ctx, "Kamar 01", 800_000).await;
    add_tenant(&ctx, "Budi", Some(room.id)).await;
    let summary = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();
    let id = summary.billings[0].id;

    ctx.backend.set_today(date(2026, 3, 20));
    assert_eq!(ctx.state.billing.check_overdue().await.unwrap(), 1);
    assert_eq!(ctx.state.billing.get(id).await.unwrap().status, BillingStatus::Overdue);
    assert_eq!(ctx.state.billing.pending_total().await, 0);

    ctx.state
        .billing
        .record_payment(id, 800_000, PaymentMethod::Transfer, Some("bukti.jpg".into()))
        .await
        .unwrap();
    assert_eq!(ctx.state.billing.get(id).await.unwrap().status, BillingStatus::Paid);
    assert_eq!(ctx.state.billing.check_overdue().await.unwrap(), 0);
}

#[tokio::test]
async fn income_and_pending_split_between_paid_and_unpaid_tenants() {
    let ctx = setup().await;
    let a = add_room(&ctx, "Kamar 01", 800_000).await;
    let b = add_room(&ctx, "Kamar 02", 1_200_000).await;
    let budi = add_tenant(&ctx, "Budi", Some(a.id)).await;
    let sarah = add_tenant(&ctx, "Sarah", Some(b.id)).await;
    ctx.state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();

    let paid = ctx.state.billing.for_tenant(sarah.id).await.remove(0);
    ctx.state
        .billing
        .record_payment(paid.id, paid.amount, PaymentMethod::Cash, None)
        .await
        .unwrap();

    assert_eq!(ctx.state.billing.monthly_income(period("2026-03")).await, 1_200_000);
    assert_eq!(ctx.state.billing.monthly_income(period("2026-04")).await, 0);
    assert_eq!(ctx.state.billing.pending_total().await, 800_000);
    let counts = ctx.state.billing.count_by_status().await;
    assert_eq!((counts.unpaid, counts.paid, counts.overdue), (1, 1, 0));
    assert!(
        ctx.state
            .billing
            .tenants_without_billing(period("2026-04"))
            .await
            .iter()
            .any(|t| t.id == budi.id)
    );
}

#[tokio::test]
async fn manual_billing_shares_the_duplicate_gate() {
    let ctx = setup().await;
    let room = add_room(&ctx, "Kamar 01", 800_000).await;
    let budi = add_tenant(&ctx, "Budi", Some(room.id)).await;
    let draft = BillingDraft {
        tenant_id: budi.id,
        period: period("2026-03"),
        amount: 500_000,
        due_date: date(2026, 3, 15),
    };

    let billing = ctx.state.billing.create_manual(draft.clone()).await.unwrap();
    assert_eq!(billing.amount, 500_000);

    let err = ctx.state.billing.create_manual(draft.clone()).await.unwrap_err();
    assert!(matches!(err, KosError::Validation(_)));

    let err = ctx
        .state
        .billing
        .create_manual(BillingDraft { amount: 0, ..draft })
        .await
        .unwrap_err();
    assert!(matches!(err, KosError::Validation(_)));

    let summary = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();
    assert_eq!(summary.created, 0);
}

#[tokio::test]
async fn paid_billing_keeps_its_amount_but_can_be_deleted() {
    let ctx = setup().await;
    let room = add_room(&ctx, "Kamar 01", 800_000).await;
    add_tenant(&ctx, "Budi", Some(room.id)).await;
    let summary = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();
    let id = summary.billings[0].id;

    let err = ctx
        .state
        .billing
        .update_billing(
            id,
            BillingChanges {
                status: Some(BillingStatus::Paid),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, KosError::InvalidState(_)));

    ctx.state
        .billing
        .record_payment(id, 800_000, PaymentMethod::Cash, None)
        .await
        .unwrap();
    let err = ctx
        .state
        .billing
        .update_billing(
            id,
            BillingChanges {
                amount: Some(900_000),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, KosError::InvalidState(_)));

    let moved = ctx
        .state
        .billing
        .update_billing(
            id,
            BillingChanges {
                due_date: Some(date(2026, 3, 12)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.due_date, date(2026, 3, 12));

    ctx.state.billing.delete_billing(id).await.unwrap();
    assert!(ctx.state.billing.get(id).await.is_none());
    assert_eq!(ctx.backend.billing_count(), 0);
}

#[tokio::test]
async fn failed_refresh_keeps_the_cached_billings() {
    let ctx = setup().await;
    let room = add_room(&ctx, "Kamar 01", 800_000).await;
    add_tenant(&ctx, "Budi", Some(room.id)).await;
    ctx.state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();

    ctx.backend.set_offline(true);
    let err = ctx.state.billing.refresh().await.unwrap_err();
    assert!(matches!(err, KosError::Fetch { .. }));

    let snapshot = ctx.state.billing.snapshot().await;
    assert_eq!(snapshot.items.len(), 1);
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.error.as_deref(), Some("Tidak dapat terhubung ke server"));

    let err = ctx
        .state
        .billing
        .record_payment(snapshot.items[0].id, 800_000, PaymentMethod::Cash, None)
        .await
        .unwrap_err();
    assert!(matches!(err, KosError::Fetch { .. }));
    assert_eq!(
        ctx.state.billing.get(snapshot.items[0].id).await.unwrap().status,
        BillingStatus::Unpaid
    );
}

#[tokio::test]
async fn external_payment_leaves_status_unchanged() {
    let ctx = setup().await;
    let room = add_room(&ctx, "Kamar 01", 800_000).await;
    add_tenant(&ctx, "Budi", Some(room.id)).await;
    let summary = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();
    let id = summary.billings[0].id;

    let redirect = ctx.state.billing.initiate_external_payment(id).await.unwrap();
    assert!(redirect.order_id.starts_with(&format!("KOS-{id}-")));
    assert_eq!(ctx.state.billing.get(id).await.unwrap().status, BillingStatus::Unpaid);
}
