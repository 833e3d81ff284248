//! Safe, ownership-tracked Rust handles over the elliptic curve objects of
//! [OpenSSL](https://www.openssl.org)'s `libcrypto`.
//!
//! OpenSSL represents elliptic curve keys and groups as opaque, heap-allocated C objects
//! (`EC_KEY` and `EC_GROUP`) which must be freed manually, exactly once. This crate wraps those
//! objects in owning types, so that the native resource is always released when the owning scope
//! ends, and so that using a handle after it has been released is a compile-time error rather than
//! undefined behaviour.
//!
//! The crate does not implement any curve arithmetic or cryptographic protocol itself: all of that
//! remains the job of the linked native library. What it does provide:
//!
//! * The catalog of curves built in to the linked OpenSSL, in the order OpenSSL reports them:
//!   [`curve::list_builtin_curves`]
//! * Key objects scoped to a curve: [`key::create_key`]
//! * Group objects for a curve, and the order of their generator: [`group::create_group`] and
//!   [`group::group_order`]
//!
//! # Example
//! ```rust
//! use halide::{curve, group};
//!
//! for info in curve::list_builtin_curves().unwrap() {
//!     let group = group::create_group(info.curve).unwrap();
//!     let order = group::group_order(&group).unwrap();
//!     println!("{} ({}): order has {} bits", info.curve, info.comment, order.bits());
//! }
//! ```
//!
//! # Errors
//! Every fallible operation returns a [`HalideError`]. A raw status code from OpenSSL is never
//! returned directly: failures are translated into [`HalideError::UnsupportedCurve`] if the
//! requested curve is not available, or [`HalideError::NativeLibrary`] (which carries the contents
//! of OpenSSL's error queue) for anything else.

use std::ffi::CStr;
use thiserror::Error;

mod bn;
pub mod curve;
mod ffi;
pub mod group;
pub mod key;

pub use curve::{list_builtin_curves, BuiltinCurveInfo, CurveId};
pub use group::{create_group, group_order, GroupHandle, GroupOrder};
pub use key::{create_key, KeyHandle};

/// General error type used in halide.
///
/// This type is returned by functions which can possibly fail throughout halide.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum HalideError {
    /// The requested curve is not available in the linked native library.
    ///
    /// The curve identifier is either not a curve at all, or names a curve which was not compiled
    /// in to this build of OpenSSL. Retrying with the same identifier will not succeed.
    #[error("curve {0} is not supported by the native library")]
    UnsupportedCurve(CurveId),

    /// A call into the native library reported failure.
    ///
    /// `function` is the name of the native function which failed, and `reason` is the contents of
    /// OpenSSL's error queue at the time of the failure.
    #[error("{function} failed: {reason}")]
    NativeLibrary {
        function: &'static str,
        reason: String,
    },

    /// The given name does not identify any curve known to the native library.
    #[error("unknown curve name: {0:?}")]
    UnknownCurveName(String),
}

/// Ensure OpenSSL is initialised.
///
/// `openssl_sys::init` may be called any number of times from any thread, so this is called at the
/// top of every public function which enters the native library.
fn require_init() {
    openssl_sys::init();
}

/// Builds a [`HalideError::NativeLibrary`] for a failed call to `function`, draining the calling
/// thread's OpenSSL error queue into the error's `reason`.
fn native_error(function: &'static str) -> HalideError {
    let mut reasons = Vec::new();

    loop {
        let code = unsafe {
            // SAFETY: This function just pops the oldest entry from the calling thread's error
            // queue, and is always safe to call.
            openssl_sys::ERR_get_error()
        };
        if code == 0 {
            break;
        }

        let mut buf = [0 as libc::c_char; 256];
        let reason = unsafe {
            // SAFETY: `ERR_error_string_n` writes at most `buf.len()` bytes to `buf`, including a
            // nul terminator, so after the call `buf` holds a valid nul-terminated C string which
            // lives as long as `buf` does. The string is copied out before `buf` goes out of scope.
            ffi::ERR_error_string_n(code, buf.as_mut_ptr(), buf.len());
            CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned()
        };
        reasons.push(reason);
    }

    let reason = if reasons.is_empty() {
        "no error reported".to_owned()
    } else {
        reasons.join("; ")
    };

    tracing::warn!(function, %reason, "native call failed");

    HalideError::NativeLibrary { function, reason }
}

/// Discard anything left on the calling thread's OpenSSL error queue.
///
/// Used where a native failure has already been fully described by the error we return, so stale
/// entries do not show up in a later [`HalideError::NativeLibrary`].
fn clear_native_errors() {
    unsafe {
        // SAFETY: This function only clears the calling thread's error queue, and is always safe
        // to call.
        openssl_sys::ERR_clear_error();
    }
}
