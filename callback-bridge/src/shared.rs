//! The process-wide registry
//!
//! A native plugin loaded by a host engine has no way to receive a registry
//! by reference, so the C ABI in [`crate::ffi`] needs one globally
//! discoverable instance. Rust hosts should prefer their own
//! [`CallbackRegistry`] values.

use std::sync::OnceLock;

use crate::callback::{RawFileResultCallback, RawResultCallback};
use crate::config::DispatchConfig;
use crate::dispatch::Dispatcher;
use crate::registry::CallbackRegistry;

/// Registry type behind the C ABI
pub type NativeRegistry = CallbackRegistry<RawResultCallback, RawFileResultCallback>;

/// Dispatcher bound to the process-wide registry
pub type NativeDispatcher = Dispatcher<'static, RawResultCallback, RawFileResultCallback>;

static REGISTRY: OnceLock<NativeRegistry> = OnceLock::new();
static DISPATCHER: OnceLock<NativeDispatcher> = OnceLock::new();

/// The single process-wide registry, created on first access
pub fn shared() -> &'static NativeRegistry {
    REGISTRY.get_or_init(|| {
        log::debug!("Initialising process-wide callback registry");
        NativeRegistry::new()
    })
}

/// Dispatcher for [`shared()`], created on first access with default settings
pub fn shared_dispatcher() -> &'static NativeDispatcher {
    DISPATCHER.get_or_init(default_dispatcher)
}

fn default_dispatcher() -> NativeDispatcher {
    Dispatcher::new(shared(), DispatchConfig::default())
}
