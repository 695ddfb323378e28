//! C ABI entry points
//!
//! These functions expose the process-wide registry to a host engine that
//! links the bridge as a native plugin. The host registers plain C function
//! pointers; the native side reports completions through the
//! `bridge_deliver_*` functions. A null function pointer means "absent".
//!
//! No panic is allowed to cross this boundary.

use serde::{Deserialize, Serialize};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crate::callback::{RawFileResultCallback, RawResultCallback};
use crate::shared::{shared, shared_dispatcher};
use crate::types::{raw_bytes, BridgeError, Delivery, Result, SlotKind};

/// Status code returned by the delivery functions
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStatus {
    Ok = 0,
    Dropped = 1,
    NoCallback = 2,
    NullPayload = 3,
    PayloadTooLarge = 4,
    CallbackPanicked = 5,
    InvalidPayload = 6,
}

impl From<&BridgeError> for BridgeStatus {
    fn from(err: &BridgeError) -> Self {
        match err {
            BridgeError::NoCallback(_) => BridgeStatus::NoCallback,
            BridgeError::CallbackPanicked(..) => BridgeStatus::CallbackPanicked,
            BridgeError::NullPayload(_) => BridgeStatus::NullPayload,
            BridgeError::PayloadTooLarge { .. } => BridgeStatus::PayloadTooLarge,
            BridgeError::InvalidUtf8(_) => BridgeStatus::InvalidPayload,
        }
    }
}

impl From<Delivery> for BridgeStatus {
    fn from(delivery: Delivery) -> Self {
        match delivery {
            Delivery::Delivered => BridgeStatus::Ok,
            Delivery::Dropped => BridgeStatus::Dropped,
        }
    }
}

/// Register the generic result callback; null clears the slot
#[no_mangle]
pub extern "C" fn bridge_set_result_callback(callback: Option<RawResultCallback>) {
    shared().set_result_callback(callback);
}

/// Currently registered generic result callback, or null
#[no_mangle]
pub extern "C" fn bridge_get_result_callback() -> Option<RawResultCallback> {
    shared().result_callback()
}

/// Register the file-result callback; null clears the slot
#[no_mangle]
pub extern "C" fn bridge_set_file_result_callback(callback: Option<RawFileResultCallback>) {
    shared().set_file_result_callback(callback);
}

/// Currently registered file-result callback, or null
#[no_mangle]
pub extern "C" fn bridge_get_file_result_callback() -> Option<RawFileResultCallback> {
    shared().file_result_callback()
}

/// Clear both callback slots
#[no_mangle]
pub extern "C" fn bridge_clear_callbacks() {
    shared().clear();
}

/// Deliver a payload to the generic result callback
///
/// # Safety
/// If `data` is non-null it must be valid for reads of `len` bytes for the
/// duration of the call.
#[no_mangle]
pub unsafe extern "C" fn bridge_deliver_result(data: *const u8, len: usize) -> BridgeStatus {
    deliver(SlotKind::Result, data, len)
}

/// Deliver a payload to the file-result callback
///
/// # Safety
/// Same requirements as [`bridge_deliver_result`].
#[no_mangle]
pub unsafe extern "C" fn bridge_deliver_file_result(data: *const u8, len: usize) -> BridgeStatus {
    deliver(SlotKind::FileResult, data, len)
}

/// Library version as a NUL-terminated string with static lifetime
#[no_mangle]
pub extern "C" fn bridge_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

unsafe fn deliver(slot: SlotKind, data: *const u8, len: usize) -> BridgeStatus {
    let bytes = match raw_bytes(data, len) {
        Ok(bytes) => bytes,
        Err(e) => {
            shared_dispatcher().record_failure(slot, &e);
            return BridgeStatus::from(&e);
        }
    };

    // The dispatcher may be configured not to catch panics; the C boundary
    // still must not unwind.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match slot {
        SlotKind::Result => shared_dispatcher().deliver_result(bytes),
        SlotKind::FileResult => shared_dispatcher().deliver_file_result(bytes),
    }));

    status_of(slot, outcome)
}

fn status_of(slot: SlotKind, outcome: thread::Result<Result<Delivery>>) -> BridgeStatus {
    match outcome {
        Ok(Ok(delivery)) => delivery.into(),
        Ok(Err(e)) => BridgeStatus::from(&e),
        Err(cause) => {
            let message = crate::dispatch::panic_message(cause.as_ref());
            let error = BridgeError::CallbackPanicked(slot, message);
            shared_dispatcher().record_failure(slot, &error);
            BridgeStatus::from(&error)
        }
    }
}
