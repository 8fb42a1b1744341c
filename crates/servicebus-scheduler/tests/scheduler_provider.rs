//! Scheduler provider behaviour against the in-memory scheduler store.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use servicebus_core::error::ServiceBusError;
use servicebus_core::message::{Command, Message};
use servicebus_scheduler::contract::{
    OperationScheduled, SchedulerOperationCanceled, SchedulerOperationEmitted,
};
use servicebus_scheduler::{NextScheduledOperation, ScheduledOperationId, SchedulerProvider};
use servicebus_test_support::{FixedClock, InMemorySchedulerStore, RecordingContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExpireInvoice {
    invoice_id: String,
}

impl Message for ExpireInvoice {
    fn message_type(&self) -> &'static str {
        "billing.expire_invoice"
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("ExpireInvoice serialization is infallible")
    }
}

impl Command for ExpireInvoice {}

fn expire(invoice_id: &str) -> ExpireInvoice {
    ExpireInvoice {
        invoice_id: invoice_id.into(),
    }
}

struct Fixture {
    store: Arc<InMemorySchedulerStore>,
    provider: SchedulerProvider,
    clock: FixedClock,
    context: Arc<RecordingContext>,
}

fn fixture() -> Fixture {
    let clock = FixedClock::default();
    let store = Arc::new(InMemorySchedulerStore::new());
    Fixture {
        provider: SchedulerProvider::new(store.clone(), Arc::new(clock)),
        store,
        clock,
        context: Arc::new(RecordingContext::new()),
    }
}

#[tokio::test]
async fn test_schedule_stores_operation_and_announces_it() {
    // Arrange
    let fx = fixture();
    let id = ScheduledOperationId::new();
    let date = fx.clock.later(Duration::minutes(30));

    // Act
    fx.provider
        .schedule(id, expire("inv-1"), date, fx.context.clone())
        .await
        .unwrap();

    // Assert
    let stored = fx.store.get(id).unwrap();
    assert_eq!(stored.date(), date);
    assert!(stored.is_sent());

    let scheduled = fx.context.delivered_of::<OperationScheduled>();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].id, id);
    assert_eq!(scheduled[0].command_type, "billing.expire_invoice");
    assert_eq!(scheduled[0].execution_date, date);
    assert_eq!(
        scheduled[0].next_operation,
        Some(NextScheduledOperation { id, time: date })
    );
}

#[tokio::test]
async fn test_schedule_in_the_past_is_rejected() {
    let fx = fixture();

    let result = fx
        .provider
        .schedule(
            ScheduledOperationId::new(),
            expire("inv-1"),
            fx.clock.0,
            fx.context.clone(),
        )
        .await;

    assert!(matches!(
        result,
        Err(ServiceBusError::InvalidScheduledOperationExecutionDate(_))
    ));
    assert!(fx.store.is_empty());
    assert!(fx.context.delivered().is_empty());
}

#[tokio::test]
async fn test_schedule_duplicate_id_is_a_unique_constraint_violation() {
    let fx = fixture();
    let id = ScheduledOperationId::new();
    let date = fx.clock.later(Duration::minutes(5));
    fx.provider
        .schedule(id, expire("inv-1"), date, fx.context.clone())
        .await
        .unwrap();

    let result = fx
        .provider
        .schedule(id, expire("inv-2"), date, fx.context.clone())
        .await;

    assert!(matches!(
        result,
        Err(ServiceBusError::UniqueConstraintViolation(_))
    ));
}

#[tokio::test]
async fn test_emit_delivers_command_then_emitted_event() {
    // Arrange
    let fx = fixture();
    let id = ScheduledOperationId::new();
    fx.provider
        .schedule(
            id,
            expire("inv-7"),
            fx.clock.later(Duration::seconds(1)),
            fx.context.clone(),
        )
        .await
        .unwrap();
    let context = Arc::new(RecordingContext::new());

    // Act
    fx.provider.emit(id, context.clone()).await.unwrap();

    // Assert
    assert_eq!(
        context.delivered_types(),
        vec!["billing.expire_invoice", "scheduler.operation_emitted"]
    );
    assert_eq!(context.delivered_of::<ExpireInvoice>()[0].invoice_id, "inv-7");
    let emitted = context.delivered_of::<SchedulerOperationEmitted>();
    assert_eq!(emitted[0].id, id);
    assert_eq!(emitted[0].next_operation, None);
    assert!(fx.store.get(id).is_none());
}

#[tokio::test]
async fn test_emit_twice_fails_with_not_found() {
    let fx = fixture();
    let id = ScheduledOperationId::new();
    fx.provider
        .schedule(
            id,
            expire("inv-7"),
            fx.clock.later(Duration::seconds(1)),
            fx.context.clone(),
        )
        .await
        .unwrap();
    fx.provider.emit(id, fx.context.clone()).await.unwrap();

    let result = fx.provider.emit(id, fx.context.clone()).await;

    assert!(matches!(result, Err(ServiceBusError::NotFound(_))));
}

#[tokio::test]
async fn test_emit_unknown_operation_fails_with_not_found() {
    let fx = fixture();

    let result = fx
        .provider
        .emit(ScheduledOperationId::new(), fx.context.clone())
        .await;

    assert!(matches!(result, Err(ServiceBusError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_emission_keeps_operation() {
    // Arrange
    let fx = fixture();
    let id = ScheduledOperationId::new();
    fx.provider
        .schedule(
            id,
            expire("inv-9"),
            fx.clock.later(Duration::hours(1)),
            fx.context.clone(),
        )
        .await
        .unwrap();
    let rejecting = Arc::new(RecordingContext::rejecting("billing.expire_invoice"));

    // Act
    let result = fx.provider.emit(id, rejecting.clone()).await;

    // Assert
    assert!(matches!(result, Err(ServiceBusError::DeliveryFailed(_))));
    assert!(fx.store.get(id).is_some());
    assert!(rejecting.delivered().is_empty());
}

#[tokio::test]
async fn test_cancel_reports_next_operation() {
    // Arrange
    let fx = fixture();
    let soon = ScheduledOperationId::new();
    let later = ScheduledOperationId::new();
    let later_date = fx.clock.later(Duration::hours(2));
    fx.provider
        .schedule(
            soon,
            expire("inv-1"),
            fx.clock.later(Duration::hours(1)),
            fx.context.clone(),
        )
        .await
        .unwrap();
    fx.provider
        .schedule(later, expire("inv-2"), later_date, fx.context.clone())
        .await
        .unwrap();

    // Act
    let removed = fx
        .provider
        .cancel(soon, Some("paid".into()), fx.context.clone())
        .await
        .unwrap();

    // Assert
    assert!(removed);
    let canceled = fx.context.delivered_of::<SchedulerOperationCanceled>();
    assert_eq!(canceled[0].id, soon);
    assert_eq!(canceled[0].reason.as_deref(), Some("paid"));
    assert_eq!(
        canceled[0].next_operation,
        Some(NextScheduledOperation {
            id: later,
            time: later_date
        })
    );
}

#[tokio::test]
async fn test_cancel_unknown_operation_is_not_an_error() {
    let fx = fixture();

    let removed = fx
        .provider
        .cancel(ScheduledOperationId::new(), None, fx.context.clone())
        .await
        .unwrap();

    assert!(!removed);
    assert_eq!(fx.context.delivered_types(), vec!["scheduler.operation_canceled"]);
}
