//! Payload delivery
//!
//! The [`Dispatcher`] is the native-side half of the bridge. When an
//! asynchronous operation completes, it looks up the callback currently
//! stored in the registry and invokes it with the payload. The callback is
//! cloned out of the registry first, so the registry lock is never held
//! while host code runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};

use crate::callback::Invoke;
use crate::config::DispatchConfig;
use crate::registry::CallbackRegistry;
use crate::types::{BridgeError, Delivery, PayloadLen, Result, SlotKind};

/// Counters describing what happened to delivered payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryStats {
    /// Payloads handed to a registered callback
    pub delivered: u64,
    /// Payloads discarded because no callback was registered
    pub dropped: u64,
    /// Deliveries that returned an error
    pub failed: u64,
    /// Time of the most recent successful delivery
    pub last_delivery: Option<DateTime<Utc>>,
}

/// Delivers payloads from the native side to the registered callbacks
pub struct Dispatcher<'a, R, F> {
    registry: &'a CallbackRegistry<R, F>,
    config: Mutex<DispatchConfig>,
    stats: Mutex<DeliveryStats>,
}

impl<'a, R: Clone, F: Clone> Dispatcher<'a, R, F> {
    /// Create a dispatcher reading callbacks from `registry`
    pub fn new(registry: &'a CallbackRegistry<R, F>, config: DispatchConfig) -> Self {
        Self {
            registry,
            config: Mutex::new(config),
            stats: Mutex::new(DeliveryStats::default()),
        }
    }

    /// The registry this dispatcher reads from
    pub fn registry(&self) -> &'a CallbackRegistry<R, F> {
        self.registry
    }

    /// Current configuration
    pub fn config(&self) -> DispatchConfig {
        lock(&self.config).clone()
    }

    /// Replace the configuration used for subsequent deliveries
    pub fn set_config(&self, config: DispatchConfig) {
        log::debug!("Dispatch configuration updated: {:?}", config);
        *lock(&self.config) = config;
    }

    /// Snapshot of the delivery counters
    pub fn stats(&self) -> DeliveryStats {
        lock(&self.stats).clone()
    }

    /// Deliver a payload to the generic result callback
    ///
    /// # Returns
    /// * `Ok(Delivery::Delivered)` - the callback was invoked
    /// * `Ok(Delivery::Dropped)` - no callback registered and `require_callback` is off
    /// * `Err(_)` - missing callback in strict mode, oversized payload, or a panicking callback
    pub fn deliver_result<P>(&self, payload: &P) -> Result<Delivery>
    where
        P: PayloadLen + ?Sized,
        R: Invoke<P>,
    {
        let callback = self.registry.result_callback();
        let outcome = self.try_deliver(SlotKind::Result, callback, payload);
        self.record(SlotKind::Result, &outcome);
        outcome
    }

    /// Deliver a payload to the file-result callback
    ///
    /// Same outcomes as [`Dispatcher::deliver_result`].
    pub fn deliver_file_result<P>(&self, payload: &P) -> Result<Delivery>
    where
        P: PayloadLen + ?Sized,
        F: Invoke<P>,
    {
        let callback = self.registry.file_result_callback();
        let outcome = self.try_deliver(SlotKind::FileResult, callback, payload);
        self.record(SlotKind::FileResult, &outcome);
        outcome
    }

    /// Count a delivery that failed before a payload could be built
    ///
    /// Used by callers that reject input (e.g. a null native buffer) before
    /// reaching [`Dispatcher::deliver_result`], so the counters still match
    /// what the caller was told.
    pub fn record_failure(&self, slot: SlotKind, error: &BridgeError) {
        let mut stats = lock(&self.stats);
        stats.failed += 1;
        log::error!("Delivery to {} callback failed: {}", slot, error);
    }

    fn record(&self, slot: SlotKind, outcome: &Result<Delivery>) {
        match outcome {
            Ok(Delivery::Delivered) => {
                let mut stats = lock(&self.stats);
                stats.delivered += 1;
                stats.last_delivery = Some(Utc::now());
            }
            Ok(Delivery::Dropped) => lock(&self.stats).dropped += 1,
            Err(e) => self.record_failure(slot, e),
        }
    }

    fn try_deliver<C, P>(
        &self,
        slot: SlotKind,
        callback: Option<C>,
        payload: &P,
    ) -> Result<Delivery>
    where
        C: Invoke<P>,
        P: PayloadLen + ?Sized,
    {
        let config = self.config();
        let size = payload.payload_len();

        if !config.accepts_payload_size(size) {
            return Err(BridgeError::PayloadTooLarge {
                size,
                limit: config.max_payload_bytes.unwrap_or_default(),
            });
        }

        let Some(callback) = callback else {
            if config.require_callback {
                return Err(BridgeError::NoCallback(slot));
            }
            log::warn!(
                "No {} callback registered, dropping {} byte payload",
                slot,
                size
            );
            return Ok(Delivery::Dropped);
        };

        log::trace!("Delivering {} byte payload to {} callback", size, slot);

        if config.catch_panics {
            let invoked = panic::catch_unwind(AssertUnwindSafe(|| callback.invoke(payload)));
            if let Err(cause) = invoked {
                let message = panic_message(cause.as_ref());
                return Err(BridgeError::CallbackPanicked(slot, message));
            }
        } else {
            callback.invoke(payload);
        }

        Ok(Delivery::Delivered)
    }
}

/// Text of a panic payload, for `&str` and `String` panics
pub(crate) fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Callback;
    use crate::types::Payload;
    use std::sync::Arc;

    type TestRegistry = CallbackRegistry<Callback<Payload>, Callback<Payload>>;

    fn recorder() -> (Callback<Payload>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb = Callback::new(move |p: &Payload| {
            sink.lock().unwrap().push(p.as_str().unwrap().to_string());
        });
        (cb, seen)
    }

    fn exploding() -> Callback<Payload> {
        Callback::new(|_: &Payload| panic!("host handler exploded"))
    }

    #[test]
    fn test_delivers_to_matching_slot() {
        let registry = TestRegistry::new();
        let (result_cb, results) = recorder();
        let (file_cb, files) = recorder();
        registry.set_result_callback(Some(result_cb));
        registry.set_file_result_callback(Some(file_cb));

        let dispatcher = Dispatcher::new(&registry, DispatchConfig::new());
        let first = dispatcher.deliver_result(&Payload::from("score posted"));
        let second = dispatcher.deliver_file_result(&Payload::from("cloud/save1"));
        assert_eq!(first.unwrap(), Delivery::Delivered);
        assert_eq!(second.unwrap(), Delivery::Delivered);

        assert_eq!(*results.lock().unwrap(), vec!["score posted"]);
        assert_eq!(*files.lock().unwrap(), vec!["cloud/save1"]);

        let stats = dispatcher.stats();
        assert_eq!(stats.delivered, 2);
        assert!(stats.last_delivery.is_some());
    }

    #[test]
    fn test_absent_callback_drops_by_default() {
        let registry = TestRegistry::new();
        let dispatcher = Dispatcher::new(&registry, DispatchConfig::new());

        let outcome = dispatcher.deliver_result(&Payload::from("lost"));
        assert_eq!(outcome.unwrap(), Delivery::Dropped);
        assert_eq!(dispatcher.stats().dropped, 1);
        assert!(dispatcher.stats().last_delivery.is_none());
    }

    #[test]
    fn test_absent_callback_errors_when_required() {
        let registry = TestRegistry::new();
        let config = DispatchConfig::new().with_required_callback(true);
        let dispatcher = Dispatcher::new(&registry, config);

        let err = dispatcher
            .deliver_file_result(&Payload::from("lost"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::NoCallback(SlotKind::FileResult)));
        assert_eq!(dispatcher.stats().failed, 1);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let registry = TestRegistry::new();
        let (cb, seen) = recorder();
        registry.set_result_callback(Some(cb));

        let config = DispatchConfig::new().with_max_payload_bytes(3);
        let dispatcher = Dispatcher::new(&registry, config);
        let err = dispatcher
            .deliver_result(&Payload::from("toolong"))
            .unwrap_err();

        assert!(matches!(
            err,
            BridgeError::PayloadTooLarge { size: 7, limit: 3 }
        ));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let registry = TestRegistry::new();
        registry.set_result_callback(Some(exploding()));

        let dispatcher = Dispatcher::new(&registry, DispatchConfig::new());
        let err = dispatcher.deliver_result(&Payload::from("x")).unwrap_err();

        match err {
            BridgeError::CallbackPanicked(SlotKind::Result, msg) => {
                assert_eq!(msg, "host handler exploded")
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(dispatcher.stats().failed, 1);
    }

    #[test]
    fn test_panic_escapes_when_not_caught() {
        let registry = TestRegistry::new();
        registry.set_file_result_callback(Some(exploding()));

        let config = DispatchConfig::new().with_catch_panics(false);
        let dispatcher = Dispatcher::new(&registry, config);
        let escaped = panic::catch_unwind(AssertUnwindSafe(|| {
            dispatcher.deliver_file_result(&Payload::from("x"))
        }));

        let cause = escaped.unwrap_err();
        assert_eq!(panic_message(cause.as_ref()), "host handler exploded");
        assert_eq!(dispatcher.stats(), DeliveryStats::default());
    }

    #[test]
    fn test_record_failure_counts_rejected_input() {
        let registry = TestRegistry::new();
        let dispatcher = Dispatcher::new(&registry, DispatchConfig::new());

        dispatcher.record_failure(SlotKind::FileResult, &BridgeError::NullPayload(8));

        let stats = dispatcher.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.delivered, 0);
    }

    #[test]
    fn test_delivery_sees_latest_registration() {
        let registry = TestRegistry::new();
        let dispatcher = Dispatcher::new(&registry, DispatchConfig::new());
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();

        registry.set_result_callback(Some(first));
        dispatcher.deliver_result(&Payload::from("one")).unwrap();
        registry.set_result_callback(Some(second));
        dispatcher.deliver_result(&Payload::from("two")).unwrap();

        assert_eq!(*first_seen.lock().unwrap(), vec!["one"]);
        assert_eq!(*second_seen.lock().unwrap(), vec!["two"]);
    }

    #[test]
    fn test_set_config_applies_to_later_deliveries() {
        let registry = TestRegistry::new();
        let dispatcher = Dispatcher::new(&registry, DispatchConfig::new());
        assert!(dispatcher.deliver_result(&Payload::from("a")).is_ok());

        dispatcher.set_config(DispatchConfig::new().with_required_callback(true));
        assert!(dispatcher.deliver_result(&Payload::from("b")).is_err());
        assert!(dispatcher.config().require_callback);
    }
}
