//! The callback registry
//!
//! A [`CallbackRegistry`] owns exactly two slots, one for the generic result
//! callback and one for the file-result callback. Each slot is either absent
//! or holds a single value; setting a slot replaces whatever was there.
//!
//! The registry is generic over the slot value types so the same container
//! serves Rust closures ([`crate::Callback`]) and raw C function pointers
//! ([`crate::RawResultCallback`]). It is an ordinary value: construct one
//! with [`CallbackRegistry::new`] and hand out references. The process-wide
//! instance used by the C ABI lives in [`crate::shared`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::types::SlotKind;

/// Whether a slot currently holds a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Set,
    Absent,
}

impl SlotState {
    fn of<T>(slot: &Option<T>) -> Self {
        if slot.is_some() {
            SlotState::Set
        } else {
            SlotState::Absent
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Set => write!(f, "set"),
            SlotState::Absent => write!(f, "absent"),
        }
    }
}

/// Snapshot of both slot states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatus {
    pub result_callback: SlotState,
    pub file_result_callback: SlotState,
}

#[derive(Debug)]
struct Slots<R, F> {
    result: Option<R>,
    file_result: Option<F>,
}

/// Holder of the result and file-result callback slots
///
/// Both slots sit behind one mutex. Getters return clones, so a caller can
/// invoke a callback without holding the lock.
pub struct CallbackRegistry<R, F> {
    slots: Mutex<Slots<R, F>>,
}

impl<R: Clone, F: Clone> CallbackRegistry<R, F> {
    /// Create a registry with both slots absent
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                result: None,
                file_result: None,
            }),
        }
    }

    /// Store the generic result callback, or clear it with `None`
    ///
    /// Returns the value that was replaced.
    pub fn set_result_callback(&self, callback: Option<R>) -> Option<R> {
        let mut slots = self.lock();
        log_replacement(
            SlotKind::Result,
            slots.result.is_some(),
            callback.is_some(),
        );
        std::mem::replace(&mut slots.result, callback)
    }

    /// Currently stored generic result callback
    pub fn result_callback(&self) -> Option<R> {
        self.lock().result.clone()
    }

    /// Store the file-result callback, or clear it with `None`
    ///
    /// Returns the value that was replaced.
    pub fn set_file_result_callback(&self, callback: Option<F>) -> Option<F> {
        let mut slots = self.lock();
        log_replacement(
            SlotKind::FileResult,
            slots.file_result.is_some(),
            callback.is_some(),
        );
        std::mem::replace(&mut slots.file_result, callback)
    }

    /// Currently stored file-result callback
    pub fn file_result_callback(&self) -> Option<F> {
        self.lock().file_result.clone()
    }

    /// Reset both slots to absent
    pub fn clear(&self) {
        let mut slots = self.lock();
        slots.result = None;
        slots.file_result = None;
        log::debug!("Cleared both callback slots");
    }

    /// Which slots are currently set
    pub fn status(&self) -> RegistryStatus {
        let slots = self.lock();
        RegistryStatus {
            result_callback: SlotState::of(&slots.result),
            file_result_callback: SlotState::of(&slots.file_result),
        }
    }

    // Slot writes replace whole values, so a poisoned lock still guards
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, Slots<R, F>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<R: Clone, F: Clone> Default for CallbackRegistry<R, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Clone, F: Clone> fmt::Debug for CallbackRegistry<R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        f.debug_struct("CallbackRegistry")
            .field("result_callback", &status.result_callback)
            .field("file_result_callback", &status.file_result_callback)
            .finish()
    }
}

fn log_replacement(slot: SlotKind, had_value: bool, has_value: bool) {
    match (had_value, has_value) {
        (false, true) => log::debug!("Registered {} callback", slot),
        (true, true) => log::debug!("Replaced {} callback", slot),
        (true, false) => log::debug!("Cleared {} callback", slot),
        (false, false) => log::trace!("{} callback already absent", slot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Callback;
    use crate::types::Payload;

    type TestRegistry = CallbackRegistry<Callback<Payload>, Callback<Payload>>;

    fn noop() -> Callback<Payload> {
        Callback::new(|_| {})
    }

    #[test]
    fn test_fresh_registry_is_absent() {
        let registry = TestRegistry::new();
        assert!(registry.result_callback().is_none());
        assert!(registry.file_result_callback().is_none());
        assert_eq!(
            registry.status(),
            RegistryStatus {
                result_callback: SlotState::Absent,
                file_result_callback: SlotState::Absent,
            }
        );
    }

    #[test]
    fn test_set_then_get_returns_same_callback() {
        let registry = TestRegistry::new();
        let a = noop();
        registry.set_result_callback(Some(a.clone()));
        assert!(registry.result_callback().unwrap().ptr_eq(&a));
    }

    #[test]
    fn test_file_slot_does_not_touch_result_slot() {
        let registry = TestRegistry::new();
        let a = noop();
        let b = noop();
        registry.set_result_callback(Some(a.clone()));
        registry.set_file_result_callback(Some(b.clone()));

        assert!(registry.file_result_callback().unwrap().ptr_eq(&b));
        assert!(registry.result_callback().unwrap().ptr_eq(&a));
    }

    #[test]
    fn test_last_write_wins() {
        let registry = TestRegistry::new();
        let c1 = noop();
        let c2 = noop();

        assert!(registry.set_result_callback(Some(c1.clone())).is_none());
        let previous = registry.set_result_callback(Some(c2.clone())).unwrap();

        assert!(previous.ptr_eq(&c1));
        assert!(registry.result_callback().unwrap().ptr_eq(&c2));
    }

    #[test]
    fn test_set_none_clears_slot() {
        let registry = TestRegistry::new();
        registry.set_file_result_callback(Some(noop()));
        assert_eq!(registry.status().file_result_callback, SlotState::Set);

        registry.set_file_result_callback(None);
        assert!(registry.file_result_callback().is_none());
    }

    #[test]
    fn test_clear_resets_both_slots() {
        let registry = TestRegistry::new();
        registry.set_result_callback(Some(noop()));
        registry.set_file_result_callback(Some(noop()));
        registry.clear();
        assert_eq!(registry.status().result_callback, SlotState::Absent);
        assert_eq!(registry.status().file_result_callback, SlotState::Absent);
    }

    #[test]
    fn test_callback_can_reenter_registry() {
        use std::sync::Arc;

        let registry = Arc::new(TestRegistry::new());
        let inner = Arc::clone(&registry);
        registry.set_result_callback(Some(Callback::new(move |_| {
            // Replacing ourselves from inside the callback must not deadlock
            inner.set_result_callback(None);
        })));

        let cb = registry.result_callback().unwrap();
        cb.call(&Payload::from("done"));
        assert!(registry.result_callback().is_none());
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        use std::sync::Arc;

        let registry = Arc::new(TestRegistry::new());
        let clone = Arc::clone(&registry);
        let _ = std::thread::spawn(move || {
            let _guard = clone.slots.lock().unwrap();
            panic!("poison the registry lock");
        })
        .join();

        registry.set_result_callback(Some(noop()));
        assert_eq!(registry.status().result_callback, SlotState::Set);
    }

    #[test]
    fn test_plain_fn_pointer_slots() {
        fn first(_: u32) {}
        fn second(_: u32) {}

        let registry: CallbackRegistry<fn(u32), fn(u32)> = CallbackRegistry::new();
        registry.set_result_callback(Some(first as fn(u32)));
        registry.set_file_result_callback(Some(second as fn(u32)));
        assert_eq!(registry.result_callback(), Some(first as fn(u32)));
        assert_eq!(registry.file_result_callback(), Some(second as fn(u32)));
    }
}
