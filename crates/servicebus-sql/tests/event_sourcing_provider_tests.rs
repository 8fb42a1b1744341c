//! `EventSourcingProvider` on top of `SqlEventStreamStore`.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use servicebus_core::apply::EventAppliers;
use servicebus_core::error::ServiceBusError;
use servicebus_core::message::{Event, Message, NamedMessage};
use servicebus_core::registry::MessageRegistry;
use servicebus_event_sourcing::{Aggregate, AggregateCore, AggregateId, EventSourcingProvider};
use servicebus_sql::SqlEventStreamStore;
use servicebus_test_support::{FailingContext, FixedClock, RecordingContext};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MoneyDeposited {
    cents: u64,
}

impl Message for MoneyDeposited {
    fn message_type(&self) -> &'static str {
        Self::MESSAGE_TYPE
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("MoneyDeposited serialization is infallible")
    }
}

impl NamedMessage for MoneyDeposited {
    const MESSAGE_TYPE: &'static str = "ledger.money_deposited";
}

impl Event for MoneyDeposited {}

#[derive(Debug)]
struct Account {
    core: AggregateCore,
    balance: u64,
}

impl Account {
    fn on_money_deposited(&mut self, event: &MoneyDeposited) {
        self.balance += event.cents;
    }
}

impl Aggregate for Account {
    const AGGREGATE_TYPE: &'static str = "ledger.account";

    fn with_core(core: AggregateCore) -> Self {
        Self { core, balance: 0 }
    }

    fn core(&self) -> &AggregateCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AggregateCore {
        &mut self.core
    }

    fn appliers() -> &'static EventAppliers<Self> {
        static APPLIERS: OnceLock<EventAppliers<Account>> = OnceLock::new();
        APPLIERS.get_or_init(|| EventAppliers::new().on(Account::on_money_deposited))
    }
}

fn account_id() -> AggregateId {
    AggregateId::new("acc-42", "ledger.account_id").unwrap()
}

fn provider(pool: PgPool, clock: FixedClock) -> EventSourcingProvider {
    let store = SqlEventStreamStore::new(pool).with_clock(Arc::new(clock));
    EventSourcingProvider::new(
        Arc::new(store),
        MessageRegistry::new().register::<MoneyDeposited>(),
    )
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_failed_publication_after_commit_does_not_wedge_the_aggregate(pool: PgPool) {
    // Arrange
    let clock = FixedClock::default();
    let provider = provider(pool, clock);
    let context = Arc::new(RecordingContext::new());
    let mut account = Account::create(account_id(), &clock);
    account.raise(MoneyDeposited { cents: 500 }, &clock);

    // Act
    let first = provider.save(&mut account, Arc::new(FailingContext)).await;
    let retry = provider.save(&mut account, context.clone()).await;
    account.raise(MoneyDeposited { cents: 250 }, &clock);
    let next = provider.save(&mut account, context.clone()).await;

    // Assert
    assert!(matches!(first, Err(ServiceBusError::PostCommitFailed(_))));
    retry.unwrap();
    next.unwrap();
    assert_eq!(context.delivered_types(), vec!["ledger.money_deposited"]);
    let reloaded: Account = provider.load(&account_id()).await.unwrap().unwrap();
    assert_eq!(reloaded.balance, 750);
    assert_eq!(reloaded.version(), 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_closed_aggregate_round_trips_through_postgres(pool: PgPool) {
    // Arrange
    let clock = FixedClock::default();
    let provider = provider(pool, clock);
    let mut account = Account::create(account_id(), &clock);
    account.raise(MoneyDeposited { cents: 100 }, &clock);
    account.close(&clock);

    // Act
    provider
        .save(&mut account, Arc::new(RecordingContext::new()))
        .await
        .unwrap();

    // Assert
    let reloaded: Account = provider.load(&account_id()).await.unwrap().unwrap();
    assert!(reloaded.core().is_closed());
    assert_eq!(reloaded.balance, 100);
}
