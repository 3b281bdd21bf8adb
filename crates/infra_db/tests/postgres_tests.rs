//! PostgreSQL integration tests
//!
//! These start a PostgreSQL container and are ignored by default.
//! Run with `cargo test -p infra_db -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use core_kernel::{Currency, HealthCheckable, AdapterHealth, PortError, SystemClock};
use domain_billing::{BillStatus, BillingService, InsertOutcome, LedgerPort};
use durable_runtime::{ActivityOptions, InstanceOutcome, RetryPolicy, SignalJournal, WorkflowEngine};
use infra_db::{PostgresLedgerAdapter, PostgresSignalJournal};
use serde_json::json;
use test_utils::{
    assert_bill_closed, assert_bill_open, assert_money_eq, assert_total_matches_items,
    create_isolated_test_database, MoneyFixtures, StringFixtures, TestBillBuilder, TestDatabase,
    TestLineItemBuilder,
};

async fn database() -> TestDatabase {
    create_isolated_test_database()
        .await
        .expect("Failed to start PostgreSQL container")
}

mod ledger_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_create_and_get_bill() {
        let db = database().await;
        let ledger = PostgresLedgerAdapter::new(db.pool().clone());

        let bill = TestBillBuilder::new().with_currency(Currency::GEL).build();
        ledger.create_bill(&bill).await.unwrap();

        let stored = ledger.get_bill(bill.id).await.unwrap();
        assert_eq!(stored.id, bill.id);
        assert_bill_open(&stored);
        assert_money_eq(&stored.total, 0, Currency::GEL);

        let duplicate = ledger.create_bill(&bill).await.unwrap_err();
        assert!(matches!(duplicate, PortError::Conflict { .. }));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_missing_bill_is_not_found() {
        let db = database().await;
        let ledger = PostgresLedgerAdapter::new(db.pool().clone());
        let bill = TestBillBuilder::new().build();

        assert!(ledger.get_bill(bill.id).await.unwrap_err().is_not_found());
        let item = TestLineItemBuilder::for_bill(&bill).build();
        assert!(ledger
            .insert_line_item_and_update_total(&item)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_insert_updates_total_once() {
        let db = database().await;
        let ledger = PostgresLedgerAdapter::new(db.pool().clone());
        let bill = TestBillBuilder::new().build();
        ledger.create_bill(&bill).await.unwrap();

        let coffee = TestLineItemBuilder::for_bill(&bill).with_amount(500).build();
        let muffin = TestLineItemBuilder::for_bill(&bill)
            .with_amount(300)
            .with_description("muffin")
            .with_created_at(coffee.created_at + ChronoDuration::seconds(1))
            .build();

        let first = ledger.insert_line_item_and_update_total(&coffee).await.unwrap();
        assert!(matches!(first, InsertOutcome::Inserted { new_total } if new_total.amount() == 500));
        let again = ledger.insert_line_item_and_update_total(&coffee).await.unwrap();
        assert_eq!(again, InsertOutcome::Duplicate);
        ledger.insert_line_item_and_update_total(&muffin).await.unwrap();

        let stored = ledger.get_bill(bill.id).await.unwrap();
        let items = ledger.list_line_items(bill.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "coffee");
        assert_eq!(items[1].description, "muffin");
        assert_total_matches_items(&stored, &items);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_item_limits_enforced_by_schema() {
        let db = database().await;
        let ledger = PostgresLedgerAdapter::new(db.pool().clone());
        let bill = TestBillBuilder::new().build();
        ledger.create_bill(&bill).await.unwrap();

        let largest = MoneyFixtures::usd_max_item();
        let at_limit = TestLineItemBuilder::for_bill(&bill)
            .with_amount(largest.amount())
            .with_description(StringFixtures::longest_description())
            .build();
        let outcome = ledger.insert_line_item_and_update_total(&at_limit).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted { new_total } if new_total == largest));

        let too_long = TestLineItemBuilder::for_bill(&bill)
            .with_description(StringFixtures::too_long_description())
            .build();
        let err = ledger.insert_line_item_and_update_total(&too_long).await.unwrap_err();
        assert!(matches!(err, PortError::Validation { .. }));

        let stored = ledger.get_bill(bill.id).await.unwrap();
        assert_eq!(stored.total, largest);
        assert_eq!(ledger.list_line_items(bill.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_currency_mismatch_rejected() {
        let db = database().await;
        let ledger = PostgresLedgerAdapter::new(db.pool().clone());
        let bill = TestBillBuilder::new().build();
        ledger.create_bill(&bill).await.unwrap();

        let item = TestLineItemBuilder::for_bill(&bill)
            .with_currency(Currency::GEL)
            .build();
        let err = ledger.insert_line_item_and_update_total(&item).await.unwrap_err();
        assert!(err.is_permanent());
        assert!(ledger.list_line_items(bill.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_close_preserves_total() {
        let db = database().await;
        let ledger = PostgresLedgerAdapter::new(db.pool().clone());
        let bill = TestBillBuilder::new().build();
        ledger.create_bill(&bill).await.unwrap();
        let item = TestLineItemBuilder::for_bill(&bill).with_amount(800).build();
        ledger.insert_line_item_and_update_total(&item).await.unwrap();

        let closed_at = Utc::now();
        ledger
            .update_bill_status(bill.id, BillStatus::Closed, Some(closed_at))
            .await
            .unwrap();

        let stored = ledger.get_bill(bill.id).await.unwrap();
        assert_bill_closed(&stored);
        assert_eq!(stored.total.amount(), 800);

        let inconsistent = ledger
            .update_bill_status(bill.id, BillStatus::Closed, None)
            .await
            .unwrap_err();
        assert!(matches!(inconsistent, PortError::Validation { .. }));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_list_bills_by_status() {
        let db = database().await;
        let ledger = PostgresLedgerAdapter::new(db.pool().clone());
        let base = Utc::now();

        let older = TestBillBuilder::new().with_created_at(base).build();
        let newer = TestBillBuilder::new()
            .with_created_at(base + ChronoDuration::seconds(5))
            .build();
        ledger.create_bill(&older).await.unwrap();
        ledger.create_bill(&newer).await.unwrap();
        ledger
            .update_bill_status(older.id, BillStatus::Closed, Some(base + ChronoDuration::seconds(10)))
            .await
            .unwrap();

        let all = ledger.list_bills(None).await.unwrap();
        assert_eq!(all.iter().map(|b| b.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        let open = ledger.list_bills(Some(BillStatus::Open)).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, newer.id);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_health_check() {
        let db = database().await;
        let ledger = PostgresLedgerAdapter::new(db.pool().clone());
        let health = ledger.health_check().await;
        assert_eq!(health.status, AdapterHealth::Healthy);
        assert_eq!(health.adapter_id, "postgres-ledger-adapter");
    }
}

mod journal_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_append_pending_acknowledge() {
        let db = database().await;
        let journal = PostgresSignalJournal::new(db.pool().clone());
        let now = Utc::now();

        let first = journal.append("bill-a", "add-item", json!({"n": 1}), now).await.unwrap();
        let second = journal.append("bill-a", "close-bill", json!({}), now).await.unwrap();
        journal.append("bill-b", "add-item", json!({"n": 2}), now).await.unwrap();
        assert!(second.seq > first.seq);

        let pending = journal.pending("bill-a").await.unwrap();
        assert_eq!(pending.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![first.seq, second.seq]);
        assert_eq!(pending[0].payload, json!({"n": 1}));

        journal.acknowledge(first.seq).await.unwrap();
        journal.acknowledge(first.seq).await.unwrap();
        assert_eq!(journal.pending("bill-a").await.unwrap().len(), 1);

        assert_eq!(
            journal.instances_with_pending().await.unwrap(),
            vec!["bill-a".to_string(), "bill-b".to_string()]
        );
        assert!(journal.acknowledge(i64::MAX).await.unwrap_err().is_not_found());
    }
}

mod service_tests {
    use super::*;

    fn options() -> ActivityOptions {
        ActivityOptions::default().with_retry_policy(RetryPolicy::exponential(
            3,
            Duration::from_millis(10),
            Duration::from_millis(50),
        ))
    }

    fn service(db: &TestDatabase) -> BillingService {
        let ledger = Arc::new(PostgresLedgerAdapter::new(db.pool().clone()));
        let journal = Arc::new(PostgresSignalJournal::new(db.pool().clone()));
        let engine = Arc::new(WorkflowEngine::new(journal, Arc::new(SystemClock)));
        BillingService::new(ledger, engine, options())
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_bill_lifecycle_end_to_end() {
        let db = database().await;
        let service = service(&db);

        let bill = service.create_bill(Currency::USD).await.unwrap();
        let description = StringFixtures::random_description();
        service
            .add_line_item(bill.id, MoneyFixtures::usd_500().amount(), &description)
            .await
            .unwrap();
        service
            .add_line_item(bill.id, MoneyFixtures::usd_300().amount(), StringFixtures::muffin())
            .await
            .unwrap();
        service.close_bill(bill.id).await.unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            service.engine().wait_for(&bill.id.instance_key()),
        )
        .await
        .unwrap();
        assert_eq!(outcome, Some(InstanceOutcome::Completed));

        let view = service.get_bill_with_items(bill.id).await.unwrap();
        assert_bill_closed(&view.bill);
        assert_money_eq(&view.bill.total, 800, Currency::USD);
        assert_total_matches_items(&view.bill, &view.items);
        assert_eq!(view.items[0].description, description.trim());
        assert!(service.engine().pending_instances().await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_recovery_replays_journal() {
        let db = database().await;
        let first = service(&db);
        let bill = first.create_bill(Currency::GEL).await.unwrap();
        first.engine().shutdown().await;

        // Signals journaled while no instance was running
        let journal = PostgresSignalJournal::new(db.pool().clone());
        let amount = MoneyFixtures::gel_100();
        let item = domain_billing::AddItemSignal::new(core_kernel::LineItemId::new_v7(), amount.amount(), "khachapuri");
        journal
            .append(
                &bill.id.instance_key(),
                domain_billing::signal::ADD_ITEM_SIGNAL,
                serde_json::to_value(&item).unwrap(),
                Utc::now(),
            )
            .await
            .unwrap();

        let second = service(&db);
        assert_eq!(second.recover_open_bills().await.unwrap(), 1);
        second.close_bill(bill.id).await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(10),
            second.engine().wait_for(&bill.id.instance_key()),
        )
        .await
        .unwrap();

        let stored = second.get_bill(bill.id).await.unwrap();
        assert_bill_closed(&stored);
        assert_eq!(stored.total, amount);
    }
}
