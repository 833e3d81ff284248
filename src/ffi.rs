//! `ec.h` and `err.h` declarations which `openssl-sys` does not provide.

use libc::{c_char, c_int, c_ulong, size_t};

/// One entry of the native builtin-curve table.
#[allow(non_camel_case_types)]
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct EC_builtin_curve {
    pub nid: c_int,
    pub comment: *const c_char,
}

extern "C" {
    pub fn EC_get_builtin_curves(r: *mut EC_builtin_curve, nitems: size_t) -> size_t;

    pub fn EC_curve_nist2nid(name: *const c_char) -> c_int;
    pub fn EC_curve_nid2nist(nid: c_int) -> *const c_char;

    pub fn ERR_error_string_n(e: c_ulong, buf: *mut c_char, len: size_t);
}
