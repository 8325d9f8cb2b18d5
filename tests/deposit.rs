#![allow(non_snake_case)]
use lootcase::{
    ControllerError,
    Deposit,
    config::{
        AppConfig,
        PaymentConfig,
    },
    payments::PaymentStatus,
    test_helpers::*,
};
use lootcase_core::{
    ForceMode,
    Source,
};
use std::time::Duration;

#[tokio::test]
async fn deposit__invoice_settles_when_host_reports_paid() {
    let ctx = TestContext::new(ForceMode::Auto);
    let balances = ctx.services().balances();

    // when
    let deposit = balances.deposit(250).await.unwrap();

    // then
    assert_eq!(deposit.source, Source::Primary);
    let Deposit::Invoice {
        link,
        mut subscription,
    } = deposit.into_value()
    else {
        panic!("expected an invoice");
    };
    assert!(link.contains("250"));
    assert_eq!(subscription.invoice_id(), "tx-1");
    assert_eq!(subscription.current(), PaymentStatus::Pending);

    ctx.services()
        .payments()
        .notify_raw("tx-1", "paid")
        .unwrap();
    let status = balances.complete_deposit(&mut subscription).await;

    assert_eq!(status, PaymentStatus::Paid);
    assert_eq!(ctx.backend().forget_calls(), 1);
    assert_eq!(ctx.services().payments().pending_count(), 0);
}

#[tokio::test]
async fn deposit__without_invoice_support_credits_demo_wallet() {
    // given
    let ctx = TestContext::with_config(AppConfig {
        platform_version: None,
        ..TestContext::base_config()
    });

    // when
    let deposit = ctx.services().balances().deposit(250).await.unwrap();

    // then
    assert_eq!(deposit.source, Source::Fallback);
    assert!(matches!(
        deposit.value,
        Deposit::Credited { new_balance: 1250 }
    ));
    assert_eq!(ctx.backend().invoice_calls(), 0);
    assert_eq!(ctx.services().wallet().load().unwrap().total_deposited_stars, 250);
}

#[tokio::test]
async fn deposit__unsupported_platform_in_primary_mode_is_an_error() {
    let ctx = TestContext::with_config(AppConfig {
        force_mode: ForceMode::Primary,
        platform_version: Some("6.0".to_string()),
        ..TestContext::base_config()
    });

    let err = ctx.services().balances().deposit(100).await.unwrap_err();

    assert!(matches!(err, ControllerError::Unsupported(_)));
}

#[tokio::test]
async fn deposit__zero_amount_is_rejected() {
    let ctx = TestContext::new(ForceMode::Auto);

    let err = ctx.services().balances().deposit(0).await.unwrap_err();

    assert!(matches!(err, ControllerError::InvalidAmount));
    assert_eq!(ctx.backend().invoice_calls(), 0);
}

#[tokio::test]
async fn complete_deposit__cancellation_cancels_the_invoice() {
    // given
    let ctx = TestContext::new(ForceMode::Auto);
    let balances = ctx.services().balances();
    let Deposit::Invoice {
        mut subscription, ..
    } = balances.deposit(100).await.unwrap().into_value()
    else {
        panic!("expected an invoice");
    };

    // when
    ctx.services().cancellation().cancel();
    let status = balances.complete_deposit(&mut subscription).await;

    // then
    assert_eq!(status, PaymentStatus::Cancelled);
    assert_eq!(
        ctx.services().payments().status("tx-1"),
        Some(PaymentStatus::Cancelled)
    );
    assert_eq!(ctx.backend().forget_calls(), 0);
}

#[tokio::test]
async fn complete_deposit__backend_confirms_payment_without_host_event() {
    // given
    let ctx = TestContext::new(ForceMode::Auto);
    let balances = ctx.services().balances();
    let Deposit::Invoice {
        mut subscription, ..
    } = balances.deposit(100).await.unwrap().into_value()
    else {
        panic!("expected an invoice");
    };
    ctx.backend().settle_transaction("tx-1", "completed", 2);

    // when
    let status = tokio::time::timeout(
        Duration::from_secs(2),
        balances.complete_deposit(&mut subscription),
    )
    .await
    .expect("deposit should settle from polling");

    // then
    assert_eq!(status, PaymentStatus::Paid);
    assert_eq!(ctx.backend().transaction_calls(), 3);
    assert_eq!(ctx.backend().forget_calls(), 1);
    assert_eq!(
        ctx.services().payments().status("tx-1"),
        Some(PaymentStatus::Paid)
    );
}

#[tokio::test]
async fn complete_deposit__failed_transaction_settles_as_failed() {
    let ctx = TestContext::new(ForceMode::Auto);
    let balances = ctx.services().balances();
    let Deposit::Invoice {
        mut subscription, ..
    } = balances.deposit(100).await.unwrap().into_value()
    else {
        panic!("expected an invoice");
    };
    ctx.backend().settle_transaction("tx-1", "failed", 0);

    let status = balances.complete_deposit(&mut subscription).await;

    assert_eq!(status, PaymentStatus::Failed);
    assert_eq!(ctx.backend().forget_calls(), 0);
}

#[tokio::test]
async fn complete_deposit__gives_up_when_payment_stays_pending() {
    // given
    let ctx = TestContext::with_config(AppConfig {
        payment: PaymentConfig {
            poll_interval_ms: 5,
            timeout_ms: 50,
        },
        ..TestContext::base_config()
    });
    let balances = ctx.services().balances();
    let Deposit::Invoice {
        mut subscription, ..
    } = balances.deposit(100).await.unwrap().into_value()
    else {
        panic!("expected an invoice");
    };

    // when
    let status = balances.complete_deposit(&mut subscription).await;

    // then
    assert_eq!(status, PaymentStatus::Pending);
    assert!(ctx.backend().transaction_calls() >= 1);
    assert_eq!(ctx.backend().forget_calls(), 0);
    assert_eq!(
        ctx.services().payments().status("tx-1"),
        Some(PaymentStatus::Pending)
    );
}

#[tokio::test]
async fn balance__reads_backend_when_available() {
    let ctx = TestContext::new(ForceMode::Auto);

    let balance = ctx.services().balances().balance().await.unwrap();

    assert_eq!(balance, lootcase_core::OperationResult::primary(500));
}

#[tokio::test]
async fn balance__backend_down_reads_demo_wallet() {
    let ctx = TestContext::new(ForceMode::Auto);
    ctx.backend().fail_balance(Some(Failure::Unavailable));

    let balance = ctx.services().balances().balance().await.unwrap();

    assert_eq!(balance.source, Source::Fallback);
    assert_eq!(balance.value, demo_store::STARTING_BALANCE);
    assert_eq!(ctx.backend().balance_calls(), 3);
}
