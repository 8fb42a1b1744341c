//! Integration tests for `SqlSchedulerStore`.

use std::sync::{Arc, Mutex};

use chrono::Duration;
use futures::FutureExt;
use futures::future;
use serde::{Deserialize, Serialize};
use servicebus_core::error::ServiceBusError;
use servicebus_core::message::{Command, Message, NamedMessage};
use servicebus_core::registry::MessageRegistry;
use servicebus_scheduler::{
    NextScheduledOperation, PostAdd, PostExtract, PostRemove, ScheduledOperation,
    ScheduledOperationId, SchedulerStore,
};
use servicebus_sql::SqlSchedulerStore;
use servicebus_test_support::FixedClock;
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ChargeCard {
    card: String,
    cents: u64,
}

impl Message for ChargeCard {
    fn message_type(&self) -> &'static str {
        Self::MESSAGE_TYPE
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("ChargeCard serialization is infallible")
    }
}

impl NamedMessage for ChargeCard {
    const MESSAGE_TYPE: &'static str = "payments.charge_card";
}

impl Command for ChargeCard {}

type Seen = Arc<Mutex<Vec<(ScheduledOperation, Option<NextScheduledOperation>)>>>;

fn store(pool: PgPool) -> SqlSchedulerStore {
    let registry = MessageRegistry::new().register::<ChargeCard>();
    SqlSchedulerStore::new(pool, Arc::new(registry))
}

fn charge(cents: u64) -> ChargeCard {
    ChargeCard {
        card: "4242".into(),
        cents,
    }
}

fn operation_in(clock: FixedClock, offset: Duration, cents: u64) -> ScheduledOperation {
    ScheduledOperation::new(
        ScheduledOperationId::new(),
        charge(cents),
        clock.later(offset),
        &clock,
    )
    .unwrap()
}

fn recording_add(seen: Seen) -> PostAdd {
    Box::new(
        move |operation: ScheduledOperation, next: Option<NextScheduledOperation>| {
            seen.lock().unwrap().push((operation, next));
            future::ok::<(), ServiceBusError>(()).boxed()
        },
    )
}

fn recording_extract(seen: Seen) -> PostExtract {
    Box::new(
        move |operation: ScheduledOperation, next: Option<NextScheduledOperation>| {
            seen.lock().unwrap().push((operation, next));
            future::ok::<(), ServiceBusError>(()).boxed()
        },
    )
}

fn ignore_add() -> PostAdd {
    recording_add(Seen::default())
}

fn recording_remove(seen: Arc<Mutex<Vec<Option<NextScheduledOperation>>>>) -> PostRemove {
    Box::new(move |next: Option<NextScheduledOperation>| {
        seen.lock().unwrap().push(next);
        future::ok::<(), ServiceBusError>(()).boxed()
    })
}

async fn row_exists(pool: &PgPool, id: ScheduledOperationId) -> bool {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM scheduler_registry WHERE id = $1)")
        .bind(id.as_uuid())
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn is_sent(pool: &PgPool, id: ScheduledOperationId) -> bool {
    sqlx::query_scalar("SELECT is_sent FROM scheduler_registry WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_one(pool)
        .await
        .unwrap()
}

// --- add ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_add_stores_operation_and_reports_it_as_next(pool: PgPool) {
    // Arrange
    let store = store(pool.clone());
    let clock = FixedClock::default();
    let operation = operation_in(clock, Duration::minutes(15), 500);
    let id = operation.id();
    let seen = Seen::default();

    // Act
    store
        .add(operation, recording_add(Arc::clone(&seen)))
        .await
        .unwrap();

    // Assert
    assert!(row_exists(&pool, id).await);
    assert!(is_sent(&pool, id).await);
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0.id(), id);
    assert_eq!(
        seen[0].1,
        Some(NextScheduledOperation {
            id,
            time: clock.later(Duration::minutes(15))
        })
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_next_operation_skips_already_sent_ones(pool: PgPool) {
    // Arrange
    let store = store(pool);
    let clock = FixedClock::default();
    let late = operation_in(clock, Duration::hours(2), 1);
    let soon = operation_in(clock, Duration::hours(1), 2);
    let latest = operation_in(clock, Duration::hours(3), 3);
    let soon_id = soon.id();
    let seen = Seen::default();

    // Act
    store.add(late, ignore_add()).await.unwrap();
    store
        .add(soon, recording_add(Arc::clone(&seen)))
        .await
        .unwrap();
    store
        .add(latest, recording_add(Arc::clone(&seen)))
        .await
        .unwrap();

    // Assert
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].1.map(|next| next.id), Some(soon_id));
    assert_eq!(seen[1].1, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_add_duplicate_id_is_unique_violation(pool: PgPool) {
    let store = store(pool);
    let operation = operation_in(FixedClock::default(), Duration::minutes(1), 10);
    store.add(operation.clone(), ignore_add()).await.unwrap();

    let result = store.add(operation, ignore_add()).await;

    assert!(matches!(
        result,
        Err(ServiceBusError::UniqueConstraintViolation(_))
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_failing_add_hook_rolls_back(pool: PgPool) {
    // Arrange
    let store = store(pool.clone());
    let operation = operation_in(FixedClock::default(), Duration::minutes(1), 10);
    let id = operation.id();
    let failing: PostAdd = Box::new(
        |_: ScheduledOperation, _: Option<NextScheduledOperation>| {
            future::err::<(), ServiceBusError>(ServiceBusError::DeliveryFailed("timer".into()))
                .boxed()
        },
    );

    // Act
    let result = store.add(operation, failing).await;

    // Assert
    assert!(matches!(result, Err(ServiceBusError::DeliveryFailed(_))));
    assert!(!row_exists(&pool, id).await);
}

// --- extract ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_extract_decodes_command_and_deletes_row(pool: PgPool) {
    // Arrange
    let store = store(pool.clone());
    let clock = FixedClock::default();
    let operation = operation_in(clock, Duration::minutes(5), 1_250);
    let id = operation.id();
    store.add(operation, ignore_add()).await.unwrap();
    let seen = Seen::default();

    // Act
    store
        .extract(id, recording_extract(Arc::clone(&seen)))
        .await
        .unwrap();

    // Assert
    assert!(!row_exists(&pool, id).await);
    let seen = seen.lock().unwrap();
    let (extracted, next) = &seen[0];
    assert_eq!(extracted.id(), id);
    assert_eq!(extracted.date(), clock.later(Duration::minutes(5)));
    let command = extracted
        .command()
        .as_ref()
        .as_any()
        .downcast_ref::<ChargeCard>()
        .unwrap();
    assert_eq!(command, &charge(1_250));
    assert!(next.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_extract_twice_is_not_found(pool: PgPool) {
    let store = store(pool);
    let operation = operation_in(FixedClock::default(), Duration::minutes(5), 1);
    let id = operation.id();
    store.add(operation, ignore_add()).await.unwrap();
    store
        .extract(id, recording_extract(Seen::default()))
        .await
        .unwrap();

    let result = store.extract(id, recording_extract(Seen::default())).await;

    assert!(matches!(result, Err(ServiceBusError::NotFound(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_extract_unregistered_command_keeps_row(pool: PgPool) {
    // Arrange
    let writer = store(pool.clone());
    let reader = SqlSchedulerStore::new(pool.clone(), Arc::new(MessageRegistry::new()));
    let operation = operation_in(FixedClock::default(), Duration::minutes(5), 1);
    let id = operation.id();
    writer.add(operation, ignore_add()).await.unwrap();

    // Act
    let result = reader.extract(id, recording_extract(Seen::default())).await;

    // Assert
    assert!(matches!(result, Err(ServiceBusError::RestoreFailed(_))));
    assert!(row_exists(&pool, id).await);
}

// --- remove ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_remove_reports_whether_row_existed(pool: PgPool) {
    // Arrange
    let store = store(pool.clone());
    let operation = operation_in(FixedClock::default(), Duration::minutes(5), 1);
    let id = operation.id();
    store.add(operation, ignore_add()).await.unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    // Act
    let first = store
        .remove(id, recording_remove(Arc::clone(&seen)))
        .await
        .unwrap();
    let second = store
        .remove(id, recording_remove(Arc::clone(&seen)))
        .await
        .unwrap();

    // Assert
    assert!(first);
    assert!(!second);
    assert!(!row_exists(&pool, id).await);
    assert_eq!(*seen.lock().unwrap(), vec![None, None]);
}
