//! Host callback sources
//!
//! Callbacks are either exported by a host shared library (loaded with
//! `libloading`) or the built-in logging handlers used when no library is
//! given. Either way they end up in the process-wide registry through the
//! C ABI, the same path a real engine plugin would take.

use callback_bridge::ffi;
use callback_bridge::{raw_bytes, RawFileResultCallback, RawResultCallback};
use std::path::{Path, PathBuf};

/// Errors raised while loading a host library
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Failed to load host library {path:?}: {source}")]
    Load {
        path: PathBuf,
        source: libloading::Error,
    },

    #[error("Host library {path:?} exports neither `{result}` nor `{file_result}`")]
    NoCallbacks {
        path: PathBuf,
        result: String,
        file_result: String,
    },
}

/// A loaded host library with its callbacks registered
///
/// The library stays loaded for the lifetime of this value. Dropping it
/// unregisters any of its callbacks that are still in the registry.
pub struct HostLibrary {
    path: PathBuf,
    result: Option<RawResultCallback>,
    file_result: Option<RawFileResultCallback>,
    _library: libloading::Library,
}

impl HostLibrary {
    /// Load `path` and register the exported callbacks
    ///
    /// A missing symbol leaves that slot absent; a library exporting neither
    /// symbol is an error.
    pub fn load(
        path: &Path,
        result_symbol: &str,
        file_result_symbol: &str,
    ) -> Result<Self, HostError> {
        log::info!("Loading host library: {:?}", path);

        // SAFETY: loading a library runs its initialisers; the harness only
        // loads libraries the user names explicitly.
        let loaded = unsafe { libloading::Library::new(path) };
        let library = loaded.map_err(|source| HostError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let result = lookup(&library, result_symbol);
        let file_result = lookup(&library, file_result_symbol);

        if result.is_none() && file_result.is_none() {
            return Err(HostError::NoCallbacks {
                path: path.to_path_buf(),
                result: result_symbol.to_string(),
                file_result: file_result_symbol.to_string(),
            });
        }

        if result.is_some() {
            ffi::bridge_set_result_callback(result);
        }
        if file_result.is_some() {
            ffi::bridge_set_file_result_callback(file_result);
        }

        log::info!(
            "Registered host callbacks: result={}, file_result={}",
            result.is_some(),
            file_result.is_some()
        );

        Ok(Self {
            path: path.to_path_buf(),
            result,
            file_result,
            _library: library,
        })
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for HostLibrary {
    fn drop(&mut self) {
        // Only clear slots that still hold this library's functions
        if registered_here(self.result, ffi::bridge_get_result_callback()) {
            ffi::bridge_set_result_callback(None);
        }
        if registered_here(self.file_result, ffi::bridge_get_file_result_callback()) {
            ffi::bridge_set_file_result_callback(None);
        }
        log::debug!("Unloading host library: {:?}", self.path);
    }
}

fn registered_here(ours: Option<RawResultCallback>, now: Option<RawResultCallback>) -> bool {
    match (ours, now) {
        (Some(ours), Some(now)) => ours as usize == now as usize,
        _ => false,
    }
}

fn lookup(library: &libloading::Library, symbol: &str) -> Option<RawResultCallback> {
    // SAFETY: the host contract is that these symbols have the C callback signature
    match unsafe { library.get::<RawResultCallback>(symbol.as_bytes()) } {
        Ok(sym) => Some(*sym),
        Err(e) => {
            log::warn!("Symbol `{}` not found: {}", symbol, e);
            None
        }
    }
}

/// Register the built-in handlers that log every payload
pub fn register_builtin() {
    ffi::bridge_set_result_callback(Some(log_result));
    ffi::bridge_set_file_result_callback(Some(log_file_result));
    log::info!("Registered built-in logging callbacks");
}

unsafe extern "C" fn log_result(data: *const u8, len: usize) {
    log_payload("result", data, len);
}

unsafe extern "C" fn log_file_result(data: *const u8, len: usize) {
    log_payload("file-result", data, len);
}

unsafe fn log_payload(slot: &str, data: *const u8, len: usize) {
    let bytes = match raw_bytes(data, len) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("[{}] {}", slot, e);
            return;
        }
    };
    match std::str::from_utf8(bytes) {
        Ok(text) => log::info!("[{}] {}", slot, text),
        Err(_) => log::info!("[{}] <{} bytes of binary data>", slot, bytes.len()),
    }
}
