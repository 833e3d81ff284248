//! Identifiers for named elliptic curves, and the native library's builtin-curve catalog.
//!
//! OpenSSL names each standard curve with a numeric object identifier (NID). The set of curves
//! available depends on how the linked library was built, so the catalog is always queried at
//! runtime via [`list_builtin_curves`], rather than hard-coded.
//!
//! # Examples
//! Looking up a curve by name:
//!
//! ```rust
//! use halide::curve::CurveId;
//!
//! let p256 = CurveId::from_name("P-256").unwrap();
//! assert_eq!(p256, CurveId::PRIME256V1);
//! assert_eq!(p256.short_name(), Some("prime256v1"));
//! assert_eq!(CurveId::from_name("secp384r1").unwrap(), CurveId::SECP384R1);
//! ```
//!
//! Listing the catalog:
//!
//! ```rust
//! use halide::curve;
//!
//! let curves = curve::list_builtin_curves().unwrap();
//! assert!(curves.iter().any(|info| info.curve == curve::CurveId::PRIME256V1));
//! ```

use crate::{clear_native_errors, ffi, require_init, HalideError};
use libc::c_int;
use std::ffi::{CStr, CString};
use std::fmt;

/// Numeric identifier (NID) naming a standardised elliptic curve.
///
/// A `CurveId` is just a number: constructing one does not check that the curve exists. An
/// identifier which does not name a curve available in the linked library is rejected when it is
/// used, with [`HalideError::UnsupportedCurve`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "use-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurveId(pub c_int);

// These values are fixed by `obj_mac.h` and identical across native library versions.
impl CurveId {
    /// NIST P-224, also known as secp224r1.
    pub const SECP224R1: Self = Self(713);

    /// NIST P-256, also known as prime256v1 or secp256r1.
    pub const PRIME256V1: Self = Self(415);

    /// NIST P-384, also known as secp384r1.
    pub const SECP384R1: Self = Self(715);

    /// NIST P-521, also known as secp521r1.
    pub const SECP521R1: Self = Self(716);

    /// The SECG curve secp256k1.
    pub const SECP256K1: Self = Self(714);

    /// The raw NID value.
    pub fn as_raw(self) -> c_int {
        self.0
    }

    /// Resolve a curve name to its identifier.
    ///
    /// Accepts NIST names (e.g. `"P-256"`) and OpenSSL short names (e.g. `"prime256v1"`,
    /// `"secp384r1"`). Returns [`HalideError::UnknownCurveName`] if the name is not known to the
    /// native library. A known name is not a guarantee that the curve is available: that is only
    /// checked once the identifier is used.
    pub fn from_name(name: &str) -> Result<Self, HalideError> {
        require_init();

        let c_name =
            CString::new(name).map_err(|_| HalideError::UnknownCurveName(name.to_owned()))?;

        let nist = unsafe {
            // SAFETY: `c_name` is a valid nul-terminated C string which outlives this call. The
            // function only reads from it, returning `NID_undef` if the name is not a NIST curve
            // name.
            ffi::EC_curve_nist2nid(c_name.as_ptr())
        };
        if nist != openssl_sys::NID_undef {
            return Ok(Self(nist));
        }

        let short = unsafe {
            // SAFETY: As above, `c_name` is a valid C string for the duration of the call. This
            // function returns `NID_undef` if the short name is not in the object table.
            openssl_sys::OBJ_sn2nid(c_name.as_ptr())
        };
        // An unknown short name may leave an entry on the error queue.
        clear_native_errors();

        if short != openssl_sys::NID_undef {
            Ok(Self(short))
        } else {
            Err(HalideError::UnknownCurveName(name.to_owned()))
        }
    }

    /// The OpenSSL short name of this curve (e.g. `"secp384r1"`), if it has one.
    pub fn short_name(self) -> Option<&'static str> {
        require_init();

        let name = unsafe {
            // SAFETY: This function returns either NULL, or a pointer into the native library's
            // static object table, which is never freed or modified.
            openssl_sys::OBJ_nid2sn(self.0)
        };
        clear_native_errors();

        static_str(name)
    }

    /// The NIST name of this curve (e.g. `"P-384"`), if it is a NIST curve.
    pub fn nist_name(self) -> Option<&'static str> {
        require_init();

        let name = unsafe {
            // SAFETY: This function returns either NULL, or a pointer into a static table of
            // string literals in the native library.
            ffi::EC_curve_nid2nist(self.0)
        };

        static_str(name)
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.short_name() {
            Some(name) => f.pad(name),
            None => f.pad(&format!("NID {}", self.0)),
        }
    }
}

impl From<c_int> for CurveId {
    fn from(nid: c_int) -> Self {
        Self(nid)
    }
}

/// Converts a C string owned by a static native table into a `&'static str`.
fn static_str(ptr: *const libc::c_char) -> Option<&'static str> {
    if ptr.is_null() {
        return None;
    }

    unsafe {
        // SAFETY: Callers only pass pointers into the native library's static tables, which are
        // nul-terminated and live for the rest of the program.
        CStr::from_ptr(ptr).to_str().ok()
    }
}

/// One entry of the native library's builtin-curve catalog.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "use-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuiltinCurveInfo {
    /// The curve's identifier.
    pub curve: CurveId,

    /// A human-readable description of the curve, as provided by the native library.
    pub comment: String,
}

/// List the curves built in to the linked native library.
///
/// The entries are returned in the order the native library enumerates them, which is not
/// necessarily sorted by [`CurveId`].
///
/// Returns [`HalideError::NativeLibrary`] if the native library reports a different number of
/// curves when filling the catalog than it did when sizing it.
pub fn list_builtin_curves() -> Result<Vec<BuiltinCurveInfo>, HalideError> {
    require_init();

    let count = unsafe {
        // SAFETY: With a NULL destination and zero capacity, this function writes nothing, and
        // just returns the total number of builtin curves.
        ffi::EC_get_builtin_curves(std::ptr::null_mut(), 0)
    };
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut raw = vec![
        ffi::EC_builtin_curve {
            nid: openssl_sys::NID_undef,
            comment: std::ptr::null(),
        };
        count
    ];

    let filled = unsafe {
        // SAFETY: The first argument is the destination for the catalog entries, and the second
        // is its capacity. `raw` holds exactly `count` entries, so it is valid for writes of
        // `count` `EC_builtin_curve` structs.
        ffi::EC_get_builtin_curves(raw.as_mut_ptr(), count)
    };
    if filled != count {
        return Err(HalideError::NativeLibrary {
            function: "EC_get_builtin_curves",
            reason: format!("catalog reported {count} curves, then {filled}"),
        });
    }

    let curves = raw
        .iter()
        .map(|entry| BuiltinCurveInfo {
            curve: CurveId(entry.nid),
            comment: static_str(entry.comment).unwrap_or_default().to_owned(),
        })
        .collect::<Vec<_>>();

    tracing::debug!(count = curves.len(), "listed builtin curves");

    Ok(curves)
}

#[cfg(test)]
mod tests {
    use super::{list_builtin_curves, CurveId};
    use crate::HalideError;
    use std::collections::HashSet;

    #[test]
    fn catalog_is_not_empty() -> Result<(), HalideError> {
        let curves = list_builtin_curves()?;
        assert!(!curves.is_empty());

        Ok(())
    }

    #[test]
    fn catalog_contains_common_curves() -> Result<(), HalideError> {
        let curves = list_builtin_curves()?
            .into_iter()
            .map(|info| info.curve)
            .collect::<HashSet<_>>();

        for curve in [CurveId::PRIME256V1, CurveId::SECP384R1, CurveId::SECP521R1] {
            assert!(curves.contains(&curve), "{curve} missing from catalog");
        }

        Ok(())
    }

    #[test]
    fn catalog_order_is_stable() -> Result<(), HalideError> {
        let a = list_builtin_curves()?;
        let b = list_builtin_curves()?;
        assert_eq!(a, b);

        Ok(())
    }

    #[test]
    fn catalog_entries_have_comments() -> Result<(), HalideError> {
        for info in list_builtin_curves()? {
            assert!(!info.comment.is_empty(), "{} has no comment", info.curve);
        }

        Ok(())
    }

    #[test]
    fn name_lookup() -> Result<(), HalideError> {
        assert_eq!(CurveId::from_name("P-256")?, CurveId::PRIME256V1);
        assert_eq!(CurveId::from_name("prime256v1")?, CurveId::PRIME256V1);
        assert_eq!(CurveId::from_name("P-384")?, CurveId::SECP384R1);
        assert_eq!(CurveId::from_name("secp384r1")?, CurveId::SECP384R1);
        assert_eq!(CurveId::from_name("secp256k1")?, CurveId::SECP256K1);

        assert_eq!(CurveId::PRIME256V1.short_name(), Some("prime256v1"));
        assert_eq!(CurveId::PRIME256V1.nist_name(), Some("P-256"));
        assert_eq!(CurveId::SECP521R1.nist_name(), Some("P-521"));
        assert_eq!(CurveId::SECP256K1.nist_name(), None);

        Ok(())
    }

    #[test]
    fn unknown_names() {
        for name in ["P-257", "not-a-curve", "", "prime\0256v1"] {
            assert_eq!(
                CurveId::from_name(name),
                Err(HalideError::UnknownCurveName(name.to_owned()))
            );
        }
    }

    #[test]
    fn display() {
        assert_eq!(CurveId::SECP384R1.to_string(), "secp384r1");
        assert_eq!(CurveId(-1).to_string(), "NID -1");
    }
}
