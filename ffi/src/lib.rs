//! C ABI for the todo store.
//!
//! Every function is prefixed with `todo_`. The foreign caller owns a
//! [`StoreHandle`] from `todo_store_create` until `todo_store_free`.
//!
//! # Ownership
//!
//! - `*mut c_char` results are owned by the caller and released with
//!   [`todo_string_free`].
//! - `*mut TodoList` and `*mut Reply` results are released with
//!   `todo_list_free` and `todo_reply_free`.
//! - `*const Todo` and `*const Settings` results borrow from the locked
//!   store and stay valid until `todo_store_unlock`.
//!
//! # Locking
//!
//! Reads require `todo_store_lock`. Commands require the handle to be
//! unlocked, since they take the same lock. Misuse is logged and rejected.

use std::ffi::{c_char, CStr, CString};
use std::ptr;
use todo_store::DecodeError;

#[allow(unsafe_code)]
pub mod commands;
#[allow(unsafe_code)]
pub mod store;

pub use commands::*;
pub use store::*;

/// Copies `s` into a caller-owned C string
///
/// Interior NUL bytes are dropped.
fn to_c_string(s: &str) -> *mut c_char {
    let bytes: Vec<u8> = s.bytes().filter(|&b| b != 0).collect();
    CString::new(bytes).map_or(ptr::null_mut(), CString::into_raw)
}

/// Reads an optional UTF-8 argument
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
#[allow(unsafe_code)]
unsafe fn read_str(ptr: *const c_char) -> Result<Option<String>, DecodeError> {
    if ptr.is_null() {
        return Ok(None);
    }
    // SAFETY: non-null and NUL-terminated per the caller contract
    let s = unsafe { CStr::from_ptr(ptr) }.to_str()?;
    Ok(Some(s.to_owned()))
}

/// Releases a string returned by any `todo_` function
///
/// # Safety
///
/// `s` must be null or a pointer previously returned by this library that
/// has not been freed yet.
#[allow(unsafe_code)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    // SAFETY: allocated by `CString::into_raw` in `to_c_string`
    drop(unsafe { CString::from_raw(s) });
}

/// Installs the `tracing` subscriber
///
/// Honours `RUST_LOG`, defaulting to `todo_store=info`. Returns false if a
/// subscriber was already installed.
#[allow(unsafe_code)]
#[unsafe(no_mangle)]
pub extern "C" fn todo_init_logging() -> bool {
    let installed = todo_store::init_tracing("todo_store=info,todo_store_ffi=info");
    tracing::info!(installed, "Todo store logging initialized");
    installed
}

#[cfg(test)]
#[allow(unsafe_code, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn c_strings_round_trip() {
        let raw = to_c_string("a\0b");
        let read = unsafe { read_str(raw) }.unwrap();
        assert_eq!(read.as_deref(), Some("ab"));
        unsafe { todo_string_free(raw) };
    }

    #[test]
    fn null_argument_reads_as_none() {
        assert_eq!(unsafe { read_str(ptr::null()) }.unwrap(), None);
        unsafe { todo_string_free(ptr::null_mut()) };
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let bytes = [0xff_u8, 0xfe, 0];
        let result = unsafe { read_str(bytes.as_ptr().cast()) };
        assert!(matches!(result, Err(DecodeError::InvalidUtf8(_))));
    }
}
