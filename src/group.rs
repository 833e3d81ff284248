//! Owning handles to native elliptic curve groups, and retrieval of their order.
//!
//! A group describes the mathematical structure underlying a curve: the field, the curve equation,
//! the generator point, and the order of the subgroup the generator spans. A [`GroupHandle`] owns
//! one native `EC_GROUP`, which is freed when the handle is dropped or explicitly released with
//! [`GroupHandle::release`].
//!
//! # Examples
//! ```rust
//! use halide::{curve::CurveId, group};
//!
//! let group = group::create_group(CurveId::PRIME256V1).unwrap();
//! let order = group::group_order(&group).unwrap();
//! assert_eq!(
//!     order.to_string(),
//!     "FFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551"
//! );
//! assert_eq!(group.degree(), 256);
//! group.release();
//! ```

use crate::bn::{BigNum, ScratchContext};
use crate::curve::CurveId;
use crate::{clear_native_errors, native_error, require_init, HalideError};
use openssl_sys::EC_GROUP;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// The order of a group's generator, as an arbitrary-precision unsigned integer.
///
/// This is a plain value, copied out of the native library: it does not refer back to the group it
/// was computed from.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "use-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupOrder(Vec<u8>);

impl GroupOrder {
    /// The order as big-endian bytes, with no leading zero bytes.
    pub fn to_bytes_be(&self) -> &[u8] {
        &self.0
    }

    /// The number of significant bits in the order.
    pub fn bits(&self) -> usize {
        match self.0.first() {
            Some(&top) => self.0.len() * 8 - top.leading_zeros() as usize,
            None => 0,
        }
    }
}

/// Formats the order as upper-case hexadecimal, two digits per byte.
impl fmt::Display for GroupOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("0");
        }

        for byte in &self.0 {
            write!(f, "{byte:02X}")?;
        }

        Ok(())
    }
}

impl From<GroupOrder> for Vec<u8> {
    fn from(order: GroupOrder) -> Self {
        order.0
    }
}

/// An owned native elliptic curve group.
pub struct GroupHandle {
    group: NonNull<EC_GROUP>,
    _marker: PhantomData<EC_GROUP>,
}

// SAFETY: The handle exclusively owns its native object, which is not tied to the thread that
// created it. The handle is not `Sync`: no internal locking is provided.
unsafe impl Send for GroupHandle {}

impl GroupHandle {
    /// Create the group for `curve`.
    ///
    /// Returns [`HalideError::UnsupportedCurve`] if the curve is not available in the linked
    /// native library.
    pub fn new(curve: CurveId) -> Result<Self, HalideError> {
        require_init();

        let group = unsafe {
            // SAFETY: This function allocates a new `EC_GROUP` for the given curve, or returns
            // NULL if the curve is unknown or allocation fails. A non-NULL result is owned by us,
            // and is freed exactly once in `drop`.
            openssl_sys::EC_GROUP_new_by_curve_name(curve.as_raw())
        };

        match NonNull::new(group) {
            Some(group) => {
                tracing::debug!(%curve, "created group");
                Ok(Self {
                    group,
                    _marker: PhantomData,
                })
            }
            None => {
                clear_native_errors();
                Err(HalideError::UnsupportedCurve(curve))
            }
        }
    }

    /// Try to clone this group.
    ///
    /// The clone is an independent native object with its own lifetime.
    pub fn try_clone(&self) -> Result<Self, HalideError> {
        let group = unsafe {
            // SAFETY: `self.group` is a valid `EC_GROUP` for the lifetime of `self`. This function
            // allocates a deep copy of it, or returns NULL on failure. A non-NULL result is owned
            // by the new handle.
            openssl_sys::EC_GROUP_dup(self.group.as_ptr())
        };

        NonNull::new(group)
            .map(|group| Self {
                group,
                _marker: PhantomData,
            })
            .ok_or_else(|| native_error("EC_GROUP_dup"))
    }

    /// The curve this group was created for.
    pub fn curve(&self) -> CurveId {
        let nid = unsafe {
            // SAFETY: `self.group` is a valid `EC_GROUP` for the lifetime of `self`. This function
            // only reads from the group.
            openssl_sys::EC_GROUP_get_curve_name(self.group.as_ptr())
        };

        CurveId(nid)
    }

    /// The size of the underlying field, in bits.
    pub fn degree(&self) -> u32 {
        let degree = unsafe {
            // SAFETY: `self.group` is a valid `EC_GROUP` for the lifetime of `self`. This function
            // only reads from the group.
            openssl_sys::EC_GROUP_get_degree(self.group.as_ptr())
        };

        degree.max(0) as u32
    }

    /// Compute the order of this group's generator.
    ///
    /// The order is recomputed by the native library on every call. A scratch context for the
    /// native arithmetic is allocated for the duration of the call, and freed before returning,
    /// whether or not the call succeeds.
    ///
    /// Returns [`HalideError::NativeLibrary`] if the native library fails to compute the order.
    pub fn order(&self) -> Result<GroupOrder, HalideError> {
        require_init();

        let ctx = ScratchContext::new()?;
        let mut order = BigNum::new()?;

        let result = unsafe {
            // SAFETY: `self.group` is a valid `EC_GROUP` for the lifetime of `self`, and this
            // function only reads from it. `order` is a valid, owned `BIGNUM` to which the result
            // is written. `ctx` is a valid `BN_CTX` for the duration of the call. Both `order` and
            // `ctx` are freed when they go out of scope at the end of this function.
            openssl_sys::EC_GROUP_get_order(self.group.as_ptr(), order.as_ptr(), ctx.as_ptr())
        };

        if result != 1 {
            return Err(native_error("EC_GROUP_get_order"));
        }

        Ok(GroupOrder(order.to_bytes_be()))
    }

    /// Release the native group object.
    ///
    /// This is equivalent to dropping the handle.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for GroupHandle {
    fn drop(&mut self) {
        unsafe {
            // SAFETY:
            // * Is a double-free possible in safe code?
            //   * No: We only free in `drop`, which is called exactly once. `release` consumes
            //     the handle, so it cannot be called twice either.
            // * Is a use-after-free possible in safe code?
            //   * No: after drop, none of the type's methods are accessible.
            // `self.group` was returned by `EC_GROUP_new_by_curve_name` or `EC_GROUP_dup`, so
            // `EC_GROUP_free` is the correct way to release it.
            openssl_sys::EC_GROUP_free(self.group.as_ptr());
        }
        tracing::debug!("released group");
    }
}

impl fmt::Debug for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupHandle")
            .field("curve", &self.curve())
            .finish_non_exhaustive()
    }
}

/// Create the group for `curve`.
///
/// See [`GroupHandle::new`].
pub fn create_group(curve: CurveId) -> Result<GroupHandle, HalideError> {
    GroupHandle::new(curve)
}

/// Compute the order of `group`'s generator.
///
/// See [`GroupHandle::order`].
pub fn group_order(group: &GroupHandle) -> Result<GroupOrder, HalideError> {
    group.order()
}

#[cfg(test)]
mod tests {
    use super::{create_group, group_order, GroupHandle};
    use crate::curve::{list_builtin_curves, CurveId};
    use crate::HalideError;

    const P256_ORDER: &str = "FFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551";
    const P384_ORDER: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFC7634D81F4372DDF\
                              581A0DB248B0A77AECEC196ACCC52973";
    const SECP256K1_ORDER: &str =
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141";

    #[test]
    fn known_orders() -> Result<(), HalideError> {
        let vectors = [
            (CurveId::PRIME256V1, P256_ORDER, 256),
            (CurveId::SECP384R1, P384_ORDER, 384),
            (CurveId::SECP256K1, SECP256K1_ORDER, 256),
        ];

        for (curve, expected, bits) in vectors {
            let group = create_group(curve)?;
            let order = group_order(&group)?;
            assert_eq!(order.to_string(), expected);
            assert_eq!(order.bits(), bits);
            assert_eq!(order.to_bytes_be().len(), bits / 8);
        }

        Ok(())
    }

    #[test]
    fn p521_order_width() -> Result<(), HalideError> {
        let group = create_group(CurveId::SECP521R1)?;
        let order = group.order()?;

        assert_eq!(order.bits(), 521);
        assert_eq!(order.to_bytes_be().len(), 66);
        assert_eq!(order.to_bytes_be()[0], 0x01);
        assert_eq!(group.degree(), 521);

        Ok(())
    }

    #[test]
    fn order_is_idempotent() -> Result<(), HalideError> {
        let group = create_group(CurveId::PRIME256V1)?;
        let first = group_order(&group)?;

        for _ in 0..100 {
            assert_eq!(group_order(&group)?, first);
        }
        assert_eq!(group.curve(), CurveId::PRIME256V1);

        Ok(())
    }

    #[test]
    fn every_builtin_curve() -> Result<(), HalideError> {
        for info in list_builtin_curves()? {
            let group = create_group(info.curve)?;
            assert_eq!(group.curve(), info.curve);

            let order = group_order(&group)?;
            assert!(order.bits() > 0, "{} has an empty order", info.curve);
            group.release();
        }

        Ok(())
    }

    #[test]
    fn unsupported_curves() {
        for curve in [CurveId(-1), CurveId(0), CurveId(i32::MAX)] {
            assert_eq!(
                create_group(curve).unwrap_err(),
                HalideError::UnsupportedCurve(curve)
            );
        }
    }

    #[test]
    fn clone_is_independent() -> Result<(), HalideError> {
        let group = GroupHandle::new(CurveId::SECP384R1)?;
        let clone = group.try_clone()?;
        let expected = group.order()?;
        group.release();

        assert_eq!(clone.curve(), CurveId::SECP384R1);
        assert_eq!(clone.order()?, expected);

        Ok(())
    }

    #[test]
    fn move_between_threads() -> Result<(), HalideError> {
        let group = create_group(CurveId::PRIME256V1)?;

        let order = std::thread::spawn(move || group_order(&group))
            .join()
            .unwrap()?;
        assert_eq!(order.to_string(), P256_ORDER);

        Ok(())
    }
}
