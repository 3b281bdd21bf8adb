//! Worker wiring tests against a PostgreSQL container
//!
//! Ignored by default; run with `cargo test -p billing_worker -- --ignored`.

use std::time::Duration;

use billing_worker::{build_service, WorkerConfig};
use core_kernel::Currency;
use domain_billing::BillStatus;
use durable_runtime::InstanceOutcome;
use test_utils::create_isolated_test_database;

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_restart_resumes_open_bill() {
    let db = create_isolated_test_database().await.unwrap();
    let options = WorkerConfig::default().activity_options();

    let (first, first_engine) = build_service(db.pool().clone(), options.clone());
    let bill = first.create_bill(Currency::USD).await.unwrap();
    first.add_line_item(bill.id, 500, "coffee").await.unwrap();
    for _ in 0..500 {
        if first.list_line_items(bill.id).await.unwrap().len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    first_engine.shutdown().await;

    let (second, second_engine) = build_service(db.pool().clone(), options);
    assert_eq!(second.recover_open_bills().await.unwrap(), 1);
    second.add_line_item(bill.id, 300, "muffin").await.unwrap();
    second.close_bill(bill.id).await.unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        second_engine.wait_for(&bill.id.instance_key()),
    )
    .await
    .unwrap();
    assert_eq!(outcome, Some(InstanceOutcome::Completed));

    let stored = second.get_bill(bill.id).await.unwrap();
    assert_eq!(stored.status, BillStatus::Closed);
    assert_eq!(stored.total.amount(), 800);
}
