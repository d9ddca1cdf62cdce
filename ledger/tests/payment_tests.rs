//! Payment request workflow scenarios.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use arena_core::ids::PaymentToken;
use arena_core::payment::PaymentStatus;
use arena_core::wallet::TransactionType;
use arena_core::{CollectionName, LedgerError};
use common::Harness;
use futures::future::join_all;
use rust_decimal_macros::dec;
use std::time::Duration;

fn token(s: &str) -> PaymentToken {
    PaymentToken::new(s)
}

#[tokio::test]
async fn approval_credits_the_requested_amount_once() {
    let h = Harness::new();
    let user_id = h.user("alice").await;

    let submitted = h
        .service
        .submit_payment_request(user_id.clone(), dec!(50), token("T1"))
        .await
        .unwrap();
    assert_eq!(submitted.status, PaymentStatus::Pending);
    assert_eq!(submitted.processed_date, None);

    let first = h.service.approve_payment_request(&token("T1")).await.unwrap();
    assert_eq!(first.status, PaymentStatus::Approved);
    assert!(first.processed_date.is_some());
    assert_eq!(
        h.service.get_wallet_balance(&user_id).await.unwrap().credits,
        dec!(50)
    );

    let second = h.service.approve_payment_request(&token("T1")).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(
        h.service.get_wallet_balance(&user_id).await.unwrap().credits,
        dec!(50)
    );

    let credits = h.logged_for(&user_id);
    assert_eq!(credits.len(), 1);
    assert_eq!(credits[0].kind, TransactionType::CreditPurchase);
    assert_eq!(credits[0].amount, dec!(50));
    assert_eq!(credits[0].related_id.as_deref(), Some("T1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_credit_once_and_agree() {
    let h = Harness::with_latency(Duration::from_millis(1));
    let user_id = h.user("bob").await;
    h.service
        .submit_payment_request(user_id.clone(), dec!(50), token("T1"))
        .await
        .unwrap();

    let approvals = (0..6).map(|_| {
        let service = h.service.clone();
        tokio::spawn(async move { service.approve_payment_request(&token("T1")).await })
    });
    let records: Vec<_> = join_all(approvals)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert!(records.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(records[0].status, PaymentStatus::Approved);
    assert_eq!(
        h.service.get_wallet_balance(&user_id).await.unwrap().credits,
        dec!(50)
    );
    assert_eq!(h.logged_for(&user_id).len(), 1);
}

#[tokio::test]
async fn decline_after_approve_is_rejected() {
    let h = Harness::new();
    let user_id = h.user("carol").await;
    h.service
        .submit_payment_request(user_id.clone(), dec!(20), token("T1"))
        .await
        .unwrap();
    h.service.approve_payment_request(&token("T1")).await.unwrap();

    let err = h
        .service
        .decline_payment_request(&token("T1"))
        .await
        .unwrap_err();

    assert_eq!(err, LedgerError::AlreadyApproved(token("T1")));
    assert_eq!(
        h.service.get_wallet_balance(&user_id).await.unwrap().credits,
        dec!(20)
    );
}

#[tokio::test]
async fn declined_requests_stay_declined() {
    let h = Harness::new();
    let user_id = h.user("dave").await;
    h.service
        .submit_payment_request(user_id.clone(), dec!(20), token("T1"))
        .await
        .unwrap();

    let declined = h.service.decline_payment_request(&token("T1")).await.unwrap();
    assert_eq!(declined.status, PaymentStatus::Declined);
    let again = h.service.decline_payment_request(&token("T1")).await.unwrap();
    assert_eq!(again, declined);

    let err = h
        .service
        .approve_payment_request(&token("T1"))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::AlreadyDeclined(token("T1")));
    assert_eq!(
        h.service.get_wallet_balance(&user_id).await.unwrap().credits,
        dec!(0)
    );
    assert!(h.logged_for(&user_id).is_empty());
}

#[tokio::test]
async fn tokens_are_unique_in_every_state() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;

    for (name, resolve) in [("P", None), ("A", Some(true)), ("D", Some(false))] {
        h.service
            .submit_payment_request(alice.clone(), dec!(10), token(name))
            .await
            .unwrap();
        match resolve {
            Some(true) => {
                h.service.approve_payment_request(&token(name)).await.unwrap();
            }
            Some(false) => {
                h.service.decline_payment_request(&token(name)).await.unwrap();
            }
            None => {}
        }

        let err = h
            .service
            .submit_payment_request(bob.clone(), dec!(99), token(name))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::DuplicateToken(token(name)));
    }

    assert_eq!(h.service.list_payment_requests(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn approval_repairs_status_after_failed_save() {
    let h = Harness::new();
    let user_id = h.user("erin").await;
    h.service
        .submit_payment_request(user_id.clone(), dec!(50), token("T1"))
        .await
        .unwrap();

    h.store.fail_next_saves(&CollectionName::PAYMENT_REQUESTS, 3);
    let err = h
        .service
        .approve_payment_request(&token("T1"))
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(
        h.service.get_payment_request(&token("T1")).await.unwrap().status,
        PaymentStatus::Pending
    );
    assert_eq!(
        h.service.get_wallet_balance(&user_id).await.unwrap().credits,
        dec!(50)
    );

    let approved = h.service.approve_payment_request(&token("T1")).await.unwrap();
    assert_eq!(approved.status, PaymentStatus::Approved);
    assert_eq!(
        h.service.get_wallet_balance(&user_id).await.unwrap().credits,
        dec!(50)
    );
    assert_eq!(h.logged_for(&user_id).len(), 1);
}

#[tokio::test]
async fn decline_after_interrupted_approval_marks_request_approved() {
    let h = Harness::new();
    let user_id = h.user("gina").await;
    h.service
        .submit_payment_request(user_id.clone(), dec!(50), token("T1"))
        .await
        .unwrap();

    h.store.fail_next_saves(&CollectionName::PAYMENT_REQUESTS, 3);
    let err = h
        .service
        .approve_payment_request(&token("T1"))
        .await
        .unwrap_err();
    assert!(err.is_transient());

    let err = h
        .service
        .decline_payment_request(&token("T1"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyApproved(_)));
    assert_eq!(
        h.service.get_payment_request(&token("T1")).await.unwrap().status,
        PaymentStatus::Approved
    );
    assert_eq!(
        h.service.get_wallet_balance(&user_id).await.unwrap().credits,
        dec!(50)
    );

    let approved = h.service.approve_payment_request(&token("T1")).await.unwrap();
    assert_eq!(approved.status, PaymentStatus::Approved);
    assert_eq!(h.logged_for(&user_id).len(), 1);
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let h = Harness::new();
    let user_id = h.user("frank").await;

    let err = h
        .service
        .submit_payment_request(user_id, dec!(0), token("T1"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = h
        .service
        .submit_payment_request("ghost".into(), dec!(10), token("T2"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "user", .. }));

    let err = h
        .service
        .approve_payment_request(&token("missing"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound {
            entity: "payment request",
            ..
        }
    ));
    assert!(h.service.list_payment_requests(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_filters_by_status_newest_first() {
    let h = Harness::new();
    let user_id = h.user("gina").await;

    for name in ["T1", "T2", "T3"] {
        h.service
            .submit_payment_request(user_id.clone(), dec!(5), token(name))
            .await
            .unwrap();
        h.clock.advance(chrono::Duration::minutes(1));
    }
    h.service.approve_payment_request(&token("T2")).await.unwrap();

    let all: Vec<_> = h
        .service
        .list_payment_requests(None)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id.into_inner())
        .collect();
    assert_eq!(all, ["T3", "T2", "T1"]);

    let pending: Vec<_> = h
        .service
        .list_payment_requests(Some(PaymentStatus::Pending))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id.into_inner())
        .collect();
    assert_eq!(pending, ["T3", "T1"]);
}
