//! Callback handler types
//!
//! Two kinds of values can live in a registry slot:
//! - [`Callback<T>`] - an owned Rust closure, used by Rust hosts
//! - [`RawResultCallback`] / [`RawFileResultCallback`] - plain C function
//!   pointers, used through the C ABI in [`crate::ffi`]
//!
//! The [`Invoke`] trait lets the dispatcher call either kind without caring
//! which one the host registered.

use std::fmt;
use std::sync::Arc;

/// C signature of the generic result callback: an opaque byte buffer
pub type RawResultCallback = unsafe extern "C" fn(data: *const u8, len: usize);

/// C signature of the file-result callback: an opaque byte buffer
pub type RawFileResultCallback = unsafe extern "C" fn(data: *const u8, len: usize);

/// A slot value that can be invoked with a payload of type `P`
pub trait Invoke<P: ?Sized> {
    /// Invoke the handler with the given payload
    fn invoke(&self, payload: &P);
}

/// A cloneable, thread-safe Rust callback taking `&T`
///
/// Clones share the same closure; [`Callback::ptr_eq`] tells whether two
/// handles refer to the same registration.
pub struct Callback<T: ?Sized> {
    handler: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T: ?Sized> Callback<T> {
    /// Wrap a closure
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(f),
        }
    }

    /// Call the wrapped closure
    pub fn call(&self, payload: &T) {
        (self.handler)(payload)
    }

    /// True if both handles wrap the same closure
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.handler, &other.handler)
    }
}

impl<T: ?Sized> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("handler", &"<closure>")
            .finish()
    }
}

impl<T: ?Sized> Invoke<T> for Callback<T> {
    fn invoke(&self, payload: &T) {
        self.call(payload)
    }
}

// RawFileResultCallback is the same type, so this covers both slots.
impl Invoke<[u8]> for RawResultCallback {
    fn invoke(&self, payload: &[u8]) {
        // SAFETY: the pointer/length pair comes from a live slice, and the
        // host registered this function with exactly this signature.
        unsafe { (*self)(payload.as_ptr(), payload.len()) }
    }
}

impl Invoke<crate::types::Payload> for RawResultCallback {
    fn invoke(&self, payload: &crate::types::Payload) {
        Invoke::<[u8]>::invoke(self, payload.as_bytes())
    }
}
