//! Saga state machine.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use servicebus_core::apply::EventAppliers;
use servicebus_core::clock::Clock;
use servicebus_core::error::ServiceBusError;
use servicebus_core::message::{Command, Event, Message};

use crate::contract::{SagaClosed, SagaCreated, SagaStatusChanged};
use crate::id::SagaId;
use crate::status::SagaStatus;

/// Expiration offset applied when a saga is created without an explicit date.
#[must_use]
pub fn default_expiration() -> Duration {
    Duration::hours(1)
}

/// Messages a saga produced since the last flush.
#[derive(Debug, Default)]
pub struct SagaOutbox {
    commands: Vec<Arc<dyn Message>>,
    events: Vec<Arc<dyn Message>>,
}

impl SagaOutbox {
    /// Fired commands, in firing order.
    #[must_use]
    pub fn commands(&self) -> &[Arc<dyn Message>] {
        &self.commands
    }

    /// Raised events, in raising order.
    #[must_use]
    pub fn events(&self) -> &[Arc<dyn Message>] {
        &self.events
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.events.is_empty()
    }

    /// Splits the outbox into `(commands, events)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Arc<dyn Message>>, Vec<Arc<dyn Message>>) {
        (self.commands, self.events)
    }
}

/// State every saga carries: identity, lifecycle and the transient outbox.
///
/// The outbox is never serialized. After a saga is deserialized the
/// persistence layer calls [`SagaCore::attach_outbox`] so the restored
/// instance starts with nothing pending.
#[derive(Debug, Serialize, Deserialize)]
pub struct SagaCore {
    id: SagaId,
    status: SagaStatus,
    created_at: DateTime<Utc>,
    expire_date: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    outbox: SagaOutbox,
}

impl SagaCore {
    fn new(id: SagaId, created_at: DateTime<Utc>, expire_date: DateTime<Utc>) -> Self {
        Self {
            id,
            status: SagaStatus::Created,
            created_at,
            expire_date,
            closed_at: None,
            outbox: SagaOutbox::default(),
        }
    }

    /// The saga identifier.
    #[must_use]
    pub fn id(&self) -> &SagaId {
        &self.id
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SagaStatus {
        self.status
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Expiration time.
    #[must_use]
    pub fn expire_date(&self) -> DateTime<Utc> {
        self.expire_date
    }

    /// Time the saga reached a terminal status, if it has.
    #[must_use]
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Returns `true` if the saga is still open at `now` but past its expiration date.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && self.expire_date <= now
    }

    /// Events raised since the last flush.
    #[must_use]
    pub fn pending_events(&self) -> &[Arc<dyn Message>] {
        self.outbox.events()
    }

    /// Commands fired since the last flush.
    #[must_use]
    pub fn pending_commands(&self) -> &[Arc<dyn Message>] {
        self.outbox.commands()
    }

    /// Drains the outbox, leaving it empty.
    pub fn take_outbox(&mut self) -> SagaOutbox {
        std::mem::take(&mut self.outbox)
    }

    /// Attaches a fresh, empty outbox.
    pub fn attach_outbox(&mut self) {
        self.outbox = SagaOutbox::default();
    }

    fn ensure_open(&self) -> Result<(), ServiceBusError> {
        if self.status.is_open() {
            Ok(())
        } else {
            Err(ServiceBusError::SagaClosed(self.id.to_string()))
        }
    }

    fn push_event(&mut self, event: Arc<dyn Message>) {
        self.outbox.events.push(event);
    }

    fn push_command(&mut self, command: Arc<dyn Message>) {
        self.outbox.commands.push(command);
    }

    /// Moves to a terminal status: records the status change, then closes.
    fn finish(
        &mut self,
        status: SagaStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceBusError> {
        self.ensure_open()?;

        let changed = SagaStatusChanged::new(&self.id, self.status, status, reason, now);
        self.push_event(Arc::new(changed));
        self.status = status;

        let closed = SagaClosed::new(&self.id, reason, now);
        self.closed_at = Some(closed.datetime);
        self.push_event(Arc::new(closed));

        Ok(())
    }
}

/// Trait for saga types.
///
/// Implementors own a [`SagaCore`] and describe how applied events change
/// their state through an [`EventAppliers`] table built once per type. The
/// provided methods implement the lifecycle rules: a closed saga rejects any
/// further raise, fire or status change with `ServiceBusError::SagaClosed`.
pub trait Saga: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    /// Stable saga type name, stored with every snapshot.
    const SAGA_TYPE: &'static str;

    /// The command that starts this saga.
    type StartCommand: Command;

    /// Builds the initial state around a freshly created core.
    fn with_core(core: SagaCore) -> Self;

    /// Borrow the core.
    fn core(&self) -> &SagaCore;

    /// Mutably borrow the core.
    fn core_mut(&mut self) -> &mut SagaCore;

    /// The applier table for this saga type.
    fn appliers() -> &'static EventAppliers<Self>;

    /// Starts the saga flow.
    ///
    /// # Errors
    ///
    /// Returns whatever error the saga's own logic reports.
    fn start(
        &mut self,
        command: &Self::StartCommand,
        clock: &dyn Clock,
    ) -> Result<(), ServiceBusError>;

    /// Creates a new saga and raises [`SagaCreated`].
    ///
    /// `expire_date` defaults to [`default_expiration`] from now.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::InvalidIdentifier` if `id` was issued for
    /// another saga type.
    fn create(
        id: SagaId,
        expire_date: Option<DateTime<Utc>>,
        clock: &dyn Clock,
    ) -> Result<Self, ServiceBusError> {
        if id.saga_type() != Self::SAGA_TYPE {
            return Err(ServiceBusError::InvalidIdentifier(format!(
                "identifier {id} was issued for saga {} but handed to {}",
                id.saga_type(),
                Self::SAGA_TYPE
            )));
        }

        let now = clock.now();
        let expire_date = expire_date.unwrap_or_else(|| now + default_expiration());
        let created = SagaCreated::new(&id, now, expire_date);

        let mut saga = Self::with_core(SagaCore::new(id, now, expire_date));
        saga.raise(created)?;
        Ok(saga)
    }

    /// The saga identifier.
    fn id(&self) -> &SagaId {
        self.core().id()
    }

    /// Current status.
    fn status(&self) -> SagaStatus {
        self.core().status()
    }

    /// Applies `event` to the saga state and queues it for publication.
    ///
    /// Events without a registered applier are still queued.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::SagaClosed` if the saga is closed.
    fn raise<E: Event>(&mut self, event: E) -> Result<(), ServiceBusError> {
        self.core().ensure_open()?;

        Self::appliers().apply(self, &event);
        self.core_mut().push_event(Arc::new(event));
        Ok(())
    }

    /// Queues `command` for sending. Does not change state.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::SagaClosed` if the saga is closed.
    fn fire<C: Command>(&mut self, command: C) -> Result<(), ServiceBusError> {
        self.core().ensure_open()?;

        self.core_mut().push_command(Arc::new(command));
        Ok(())
    }

    /// Completes the saga.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::SagaClosed` if the saga is already closed.
    fn make_completed(
        &mut self,
        reason: Option<&str>,
        clock: &dyn Clock,
    ) -> Result<(), ServiceBusError> {
        self.core_mut()
            .finish(SagaStatus::Completed, reason, clock.now())
    }

    /// Fails the saga.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::SagaClosed` if the saga is already closed.
    fn make_failed(&mut self, reason: Option<&str>, clock: &dyn Clock) -> Result<(), ServiceBusError> {
        self.core_mut().finish(SagaStatus::Failed, reason, clock.now())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use chrono::TimeZone;
    use servicebus_test_support::FixedClock;

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct StartCheckout {
        order_id: String,
    }

    impl Message for StartCheckout {
        fn message_type(&self) -> &'static str {
            "checkout.start_checkout"
        }

        fn to_payload(&self) -> serde_json::Value {
            serde_json::to_value(self).expect("StartCheckout serialization is infallible")
        }
    }

    impl Command for StartCheckout {}

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct ReserveStock {
        order_id: String,
    }

    impl Message for ReserveStock {
        fn message_type(&self) -> &'static str {
            "checkout.reserve_stock"
        }

        fn to_payload(&self) -> serde_json::Value {
            serde_json::to_value(self).expect("ReserveStock serialization is infallible")
        }
    }

    impl Command for ReserveStock {}

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct StockReserved {
        quantity: u32,
    }

    impl Message for StockReserved {
        fn message_type(&self) -> &'static str {
            "checkout.stock_reserved"
        }

        fn to_payload(&self) -> serde_json::Value {
            serde_json::to_value(self).expect("StockReserved serialization is infallible")
        }
    }

    impl Event for StockReserved {}

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct CheckoutNoted;

    impl Message for CheckoutNoted {
        fn message_type(&self) -> &'static str {
            "checkout.noted"
        }

        fn to_payload(&self) -> serde_json::Value {
            serde_json::Value::Null
        }
    }

    impl Event for CheckoutNoted {}

    #[derive(Debug, Serialize, Deserialize)]
    struct CheckoutSaga {
        core: SagaCore,
        reserved: u32,
    }

    impl CheckoutSaga {
        fn on_stock_reserved(&mut self, event: &StockReserved) {
            self.reserved += event.quantity;
        }
    }

    impl Saga for CheckoutSaga {
        const SAGA_TYPE: &'static str = "checkout.saga";
        type StartCommand = StartCheckout;

        fn with_core(core: SagaCore) -> Self {
            Self { core, reserved: 0 }
        }

        fn core(&self) -> &SagaCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut SagaCore {
            &mut self.core
        }

        fn appliers() -> &'static EventAppliers<Self> {
            static APPLIERS: OnceLock<EventAppliers<CheckoutSaga>> = OnceLock::new();
            APPLIERS.get_or_init(|| EventAppliers::new().on(CheckoutSaga::on_stock_reserved))
        }

        fn start(
            &mut self,
            command: &StartCheckout,
            _clock: &dyn Clock,
        ) -> Result<(), ServiceBusError> {
            self.fire(ReserveStock {
                order_id: command.order_id.clone(),
            })
        }
    }

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn saga_id() -> SagaId {
        SagaId::for_saga::<CheckoutSaga>("o-1", "checkout.order_id").unwrap()
    }

    fn new_saga(clock: &FixedClock) -> CheckoutSaga {
        CheckoutSaga::create(saga_id(), None, clock).unwrap()
    }

    fn downcast<T: 'static>(message: &Arc<dyn Message>) -> &T {
        message.as_ref().as_any().downcast_ref::<T>().unwrap()
    }

    #[test]
    fn test_create_raises_saga_created_with_default_expiration() {
        // Arrange
        let clock = fixed_clock();

        // Act
        let saga = new_saga(&clock);

        // Assert
        assert_eq!(saga.status(), SagaStatus::Created);
        assert_eq!(saga.core().created_at(), clock.0);
        assert_eq!(saga.core().expire_date(), clock.0 + Duration::hours(1));
        assert!(saga.core().closed_at().is_none());

        let events = saga.core().pending_events();
        assert_eq!(events.len(), 1);
        let created = downcast::<SagaCreated>(&events[0]);
        assert_eq!(created.id, "o-1");
        assert_eq!(created.id_type, "checkout.order_id");
        assert_eq!(created.saga_type, "checkout.saga");
        assert_eq!(created.datetime, clock.0);
    }

    #[test]
    fn test_create_honours_explicit_expiration() {
        let clock = fixed_clock();
        let expire = clock.0 + Duration::days(3);

        let saga = CheckoutSaga::create(saga_id(), Some(expire), &clock).unwrap();

        assert_eq!(saga.core().expire_date(), expire);
    }

    #[test]
    fn test_create_rejects_identifier_of_another_saga() {
        let clock = fixed_clock();
        let id = SagaId::new("o-1", "checkout.order_id", "billing.saga").unwrap();

        let result = CheckoutSaga::create(id, None, &clock);

        assert!(matches!(result, Err(ServiceBusError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_raise_applies_event_and_queues_it() {
        // Arrange
        let clock = fixed_clock();
        let mut saga = new_saga(&clock);

        // Act
        saga.raise(StockReserved { quantity: 4 }).unwrap();
        saga.raise(StockReserved { quantity: 1 }).unwrap();

        // Assert
        assert_eq!(saga.reserved, 5);
        assert_eq!(saga.core().pending_events().len(), 3);
    }

    #[test]
    fn test_raise_without_applier_still_queues_event() {
        let clock = fixed_clock();
        let mut saga = new_saga(&clock);

        saga.raise(CheckoutNoted).unwrap();

        assert_eq!(saga.reserved, 0);
        let events = saga.core().pending_events();
        assert_eq!(events.last().unwrap().message_type(), "checkout.noted");
    }

    #[test]
    fn test_start_fires_command_without_changing_state() {
        let clock = fixed_clock();
        let mut saga = new_saga(&clock);

        saga.start(
            &StartCheckout {
                order_id: "o-1".into(),
            },
            &clock,
        )
        .unwrap();

        assert_eq!(saga.status(), SagaStatus::Created);
        let commands = saga.core().pending_commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(downcast::<ReserveStock>(&commands[0]).order_id, "o-1");
    }

    #[test]
    fn test_make_failed_records_status_change_then_close() {
        // Arrange
        let clock = fixed_clock();
        let mut saga = new_saga(&clock);
        let _ = saga.core_mut().take_outbox();

        // Act
        saga.make_failed(Some("disk full"), &clock).unwrap();

        // Assert
        assert_eq!(saga.status(), SagaStatus::Failed);
        assert_eq!(saga.core().closed_at(), Some(clock.0));

        let events = saga.core().pending_events();
        assert_eq!(events.len(), 2);
        let changed = downcast::<SagaStatusChanged>(&events[0]);
        assert_eq!(changed.previous_status, SagaStatus::Created);
        assert_eq!(changed.new_status, SagaStatus::Failed);
        assert_eq!(changed.reason.as_deref(), Some("disk full"));
        let closed = downcast::<SagaClosed>(&events[1]);
        assert_eq!(closed.reason.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_make_completed_closes_without_reason() {
        let clock = fixed_clock();
        let mut saga = new_saga(&clock);

        saga.make_completed(None, &clock).unwrap();

        assert_eq!(saga.status(), SagaStatus::Completed);
        assert!(saga.core().closed_at().is_some());
    }

    #[test]
    fn test_closed_saga_rejects_every_change() {
        // Arrange
        let clock = fixed_clock();
        let mut saga = new_saga(&clock);
        saga.make_completed(None, &clock).unwrap();
        let pending = saga.core().pending_events().len();

        // Act & Assert
        assert!(matches!(
            saga.raise(StockReserved { quantity: 1 }),
            Err(ServiceBusError::SagaClosed(_))
        ));
        assert!(matches!(
            saga.fire(ReserveStock {
                order_id: "o-1".into()
            }),
            Err(ServiceBusError::SagaClosed(_))
        ));
        assert!(matches!(
            saga.make_completed(None, &clock),
            Err(ServiceBusError::SagaClosed(_))
        ));
        assert!(matches!(
            saga.make_failed(Some("late"), &clock),
            Err(ServiceBusError::SagaClosed(_))
        ));
        assert_eq!(saga.reserved, 0);
        assert_eq!(saga.core().pending_events().len(), pending);
        assert!(saga.core().pending_commands().is_empty());
    }

    #[test]
    fn test_take_outbox_drains_once() {
        let clock = fixed_clock();
        let mut saga = new_saga(&clock);
        saga.fire(ReserveStock {
            order_id: "o-1".into(),
        })
        .unwrap();

        let outbox = saga.core_mut().take_outbox();
        let second = saga.core_mut().take_outbox();

        assert_eq!(outbox.commands().len(), 1);
        assert_eq!(outbox.events().len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn test_deserialized_saga_has_empty_outbox() {
        // Arrange
        let clock = fixed_clock();
        let mut saga = new_saga(&clock);
        saga.raise(StockReserved { quantity: 2 }).unwrap();
        let snapshot = serde_json::to_vec(&saga).unwrap();

        // Act
        let mut restored: CheckoutSaga = serde_json::from_slice(&snapshot).unwrap();
        restored.core_mut().attach_outbox();

        // Assert
        assert_eq!(restored.reserved, 2);
        assert_eq!(restored.id(), saga.id());
        assert!(restored.core().pending_events().is_empty());
        assert!(restored.core().pending_commands().is_empty());
    }

    #[test]
    fn test_is_expired_only_for_open_sagas() {
        let clock = fixed_clock();
        let mut saga = new_saga(&clock);
        let later = clock.0 + Duration::hours(2);

        assert!(!saga.core().is_expired(clock.0));
        assert!(saga.core().is_expired(later));

        saga.make_completed(None, &clock).unwrap();
        assert!(!saga.core().is_expired(later));
    }
}
