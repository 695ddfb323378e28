//! Native Callback Bridge Library
//!
//! A small library that lets native asynchronous operations hand their
//! results back to a host application (typically a game-engine plugin layer)
//! through two registered callbacks:
//! - the **result callback**, for generic operation outcomes
//! - the **file-result callback**, for file-related operation outcomes
//!
//! # Architecture
//!
//! - [`CallbackRegistry`] holds the two slots. Each slot is absent or holds
//!   one callback; setting a slot replaces the previous value.
//! - [`Dispatcher`] is the native-side collaborator that looks up the current
//!   callback and invokes it with a payload.
//! - [`shared()`] is the process-wide registry used by the C ABI in [`ffi`].
//!
//! The library does NOT interpret payloads. They are opaque bytes.
//!
//! # Example Usage
//!
//! ```
//! use callback_bridge::{Callback, CallbackRegistry, DispatchConfig, Dispatcher, Payload};
//!
//! let registry: CallbackRegistry<Callback<Payload>, Callback<Payload>> = CallbackRegistry::new();
//! registry.set_result_callback(Some(Callback::new(|payload: &Payload| {
//!     println!("result: {:?}", payload.as_str());
//! })));
//!
//! let dispatcher = Dispatcher::new(&registry, DispatchConfig::new());
//! dispatcher.deliver_result(&Payload::from("login ok")).unwrap();
//! ```

// Public modules
pub mod callback;
pub mod config;
pub mod dispatch;
pub mod ffi;
pub mod registry;
pub mod shared;
pub mod types;

// Re-export main types for convenience
pub use callback::{Callback, Invoke, RawFileResultCallback, RawResultCallback};
pub use config::DispatchConfig;
pub use dispatch::{DeliveryStats, Dispatcher};
pub use ffi::BridgeStatus;
pub use registry::{CallbackRegistry, RegistryStatus, SlotState};
pub use shared::{shared, shared_dispatcher, NativeDispatcher, NativeRegistry};
pub use types::{raw_bytes, BridgeError, Delivery, Payload, PayloadLen, Result, SlotKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
