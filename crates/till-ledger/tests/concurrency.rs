//! Racing operations against a file-backed pool.

mod common;

use common::*;
use till_core::{ErrorKind, Money, PaymentStatus};
use till_ledger::OpenSession;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opens_yield_one_session() {
    let (ledger, _dir) = file_ledger().await;

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .open_session(OpenSession {
                        user_id: "cashier-1".into(),
                        initial_amount: Money::from_cents(10_000 + i),
                        notes: None,
                    })
                    .await
            })
        })
        .collect();

    let mut opened = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => opened += 1,
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::Conflict, "unexpected error: {}", e);
                conflicts += 1;
            }
        }
    }
    assert_eq!(opened, 1);
    assert_eq!(conflicts, 5);

    let history = ledger
        .get_user_session_history("cashier-1", None)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_open());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_never_overpay() {
    let (ledger, _dir) = file_ledger().await;
    open(&ledger, "cashier-1", 0).await;
    open(&ledger, "cashier-2", 0).await;
    let req = request(&ledger, 10_000).await;

    let first = {
        let ledger = ledger.clone();
        let id = req.id.clone();
        tokio::spawn(async move { pay(&ledger, &id, "cashier-1", 6_000).await })
    };
    let second = {
        let ledger = ledger.clone();
        let id = req.id.clone();
        tokio::spawn(async move { pay(&ledger, &id, "cashier-2", 6_000).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(rejected.kind(), ErrorKind::Validation);

    let stored = ledger.get_service_request(&req.id).await.unwrap();
    assert_eq!(stored.paid_cents, 6_000);
    assert_eq!(stored.payment_status, PaymentStatus::Partial);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_postings_keep_totals_consistent() {
    let (ledger, _dir) = file_ledger().await;
    let session = open(&ledger, "cashier-1", 0).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ledger = ledger.clone();
            let input = post_input(
                &session.id,
                "cashier-1",
                till_core::TransactionType::Income,
                till_core::TransactionCategory::Other,
                1_000,
            );
            tokio::spawn(async move { ledger.post_transaction(input).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let summary = ledger.get_session_summary(&session.id).await.unwrap();
    assert!(summary.consistent);
    assert_eq!(summary.total_income_cents, 10_000);
    assert_eq!(summary.active_count, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refunds_never_exceed_original() {
    let (ledger, _dir) = file_ledger().await;
    open(&ledger, "cashier-1", 20_000).await;
    open(&ledger, "cashier-2", 20_000).await;
    let req = request(&ledger, 10_000).await;
    let payment = pay(&ledger, &req.id, "cashier-1", 10_000)
        .await
        .unwrap()
        .transaction;

    let handles: Vec<_> = ["cashier-1", "cashier-2"]
        .into_iter()
        .map(|user| {
            let ledger = ledger.clone();
            let input = refund_input(&req.id, &payment.id, user, 6_000);
            tokio::spawn(async move { ledger.refund_service_payment(input).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(rejected.kind(), ErrorKind::Validation);

    let refunded: i64 = ledger
        .list_request_transactions(&req.id)
        .await
        .unwrap()
        .iter()
        .filter(|t| t.is_active() && t.is_reversal())
        .map(|t| t.amount_cents)
        .sum();
    assert!(refunded <= payment.amount_cents);
    assert_eq!(refunded, 6_000);
    assert_eq!(
        ledger.get_refundable_amount(&payment.id).await.unwrap(),
        Money::from_cents(4_000)
    );

    let stored = ledger.get_service_request(&req.id).await.unwrap();
    assert_eq!(stored.paid_cents, 4_000);
    assert_eq!(stored.payment_status, PaymentStatus::Partial);
}
