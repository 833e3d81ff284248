//! Owning handles to native elliptic curve key objects.
//!
//! A [`KeyHandle`] owns exactly one native `EC_KEY`, scoped to a single curve. The native object
//! is freed when the handle is dropped, or when it is explicitly released with
//! [`KeyHandle::release`]. Since `release` takes the handle by value, releasing a handle twice, or
//! using it after release, is rejected at compile time:
//!
//! ```rust,compile_fail
//! use halide::{curve::CurveId, key};
//!
//! let key = key::create_key(CurveId::PRIME256V1).unwrap();
//! key.release();
//! key.release();
//! ```
//!
//! # Examples
//! ```rust
//! use halide::{curve::CurveId, key};
//!
//! let mut key = key::create_key(CurveId::PRIME256V1).unwrap();
//! assert!(!key.has_private_key());
//!
//! key.generate().unwrap();
//! key.check().unwrap();
//! assert!(key.has_private_key());
//! assert_eq!(key.curve(), CurveId::PRIME256V1);
//! ```

use crate::curve::CurveId;
use crate::{clear_native_errors, native_error, require_init, HalideError};
use openssl_sys::EC_KEY;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// An owned native elliptic curve key.
///
/// A freshly created key holds no key material, only the curve it is scoped to. Use
/// [`KeyHandle::generate`] to fill it with a new key pair.
pub struct KeyHandle {
    key: NonNull<EC_KEY>,
    _marker: PhantomData<EC_KEY>,
}

// SAFETY: The handle exclusively owns its native object, and OpenSSL does not tie key objects to
// the thread which created them, so ownership can move between threads. The handle is not `Sync`:
// no internal locking is provided.
unsafe impl Send for KeyHandle {}

impl KeyHandle {
    /// Create a new key object scoped to `curve`.
    ///
    /// Returns [`HalideError::UnsupportedCurve`] if the curve is not available in the linked
    /// native library.
    pub fn new(curve: CurveId) -> Result<Self, HalideError> {
        require_init();

        let key = unsafe {
            // SAFETY: This function allocates a new `EC_KEY` for the given curve, or returns NULL
            // if the curve is unknown or allocation fails. A non-NULL result is owned by us, and is
            // freed exactly once in `drop`.
            openssl_sys::EC_KEY_new_by_curve_name(curve.as_raw())
        };

        match NonNull::new(key) {
            Some(key) => {
                tracing::debug!(%curve, "created key");
                Ok(Self {
                    key,
                    _marker: PhantomData,
                })
            }
            None => {
                clear_native_errors();
                Err(HalideError::UnsupportedCurve(curve))
            }
        }
    }

    /// Try to clone this key, including any key material it holds.
    ///
    /// The clone is an independent native object with its own lifetime.
    pub fn try_clone(&self) -> Result<Self, HalideError> {
        let key = unsafe {
            // SAFETY: `self.key` is a valid `EC_KEY` for the lifetime of `self`. This function
            // allocates a deep copy of it, or returns NULL on failure. A non-NULL result is owned
            // by the new handle.
            openssl_sys::EC_KEY_dup(self.key.as_ptr())
        };

        NonNull::new(key)
            .map(|key| Self {
                key,
                _marker: PhantomData,
            })
            .ok_or_else(|| native_error("EC_KEY_dup"))
    }

    /// The curve this key is scoped to.
    pub fn curve(&self) -> CurveId {
        let nid = unsafe {
            // SAFETY: `self.key` is a valid `EC_KEY` for the lifetime of `self`, and since it was
            // created for a named curve, its group is always set. The group pointer is borrowed
            // from the key and only used for the duration of this block.
            let group = openssl_sys::EC_KEY_get0_group(self.key.as_ptr());
            openssl_sys::EC_GROUP_get_curve_name(group)
        };

        CurveId(nid)
    }

    /// Fill this key with a freshly generated key pair, replacing any existing key material.
    pub fn generate(&mut self) -> Result<(), HalideError> {
        let result = unsafe {
            // SAFETY: `self.key` is a valid `EC_KEY` for the lifetime of `self`, and we hold a
            // unique reference to it. Randomness is drawn from the native library's own RNG.
            openssl_sys::EC_KEY_generate_key(self.key.as_ptr())
        };

        if result != 1 {
            return Err(native_error("EC_KEY_generate_key"));
        }

        Ok(())
    }

    /// Check that this key holds a valid key pair.
    ///
    /// Returns [`HalideError::NativeLibrary`] if the key has no public key, if the public key is
    /// not a valid point on the curve, or if the private key does not match it.
    pub fn check(&self) -> Result<(), HalideError> {
        let result = unsafe {
            // SAFETY: `self.key` is a valid `EC_KEY` for the lifetime of `self`. This function
            // only reads from the key.
            openssl_sys::EC_KEY_check_key(self.key.as_ptr())
        };

        if result != 1 {
            return Err(native_error("EC_KEY_check_key"));
        }

        Ok(())
    }

    /// Whether this key holds a private key.
    pub fn has_private_key(&self) -> bool {
        let private = unsafe {
            // SAFETY: `self.key` is a valid `EC_KEY` for the lifetime of `self`. The returned
            // pointer is borrowed from the key and only compared against NULL.
            openssl_sys::EC_KEY_get0_private_key(self.key.as_ptr())
        };

        !private.is_null()
    }

    /// Release the native key object.
    ///
    /// This is equivalent to dropping the handle.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for KeyHandle {
    fn drop(&mut self) {
        unsafe {
            // SAFETY:
            // * Is a double-free possible in safe code?
            //   * No: We only free in `drop`, which cannot be called manually, and is called
            //     exactly once when the struct is actually dropped. `release` takes `self` by
            //     value, so it consumes the handle and cannot be called twice.
            // * Is a use-after-free possible in safe code?
            //   * No: We only ever free `self.key` on drop, and after drop, none of the type's
            //     methods are accessible.
            // * Is a memory leak possible in safe code?
            //   * Yes: `std::mem::forget` and friends skip the destructor. This is documented
            //     behaviour for any heap-owning type.
            // `self.key` was returned by `EC_KEY_new_by_curve_name` or `EC_KEY_dup`, so
            // `EC_KEY_free` is the correct way to release it.
            openssl_sys::EC_KEY_free(self.key.as_ptr());
        }
        tracing::debug!("released key");
    }
}

impl std::fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHandle")
            .field("curve", &self.curve())
            .finish_non_exhaustive()
    }
}

/// Create a new key object scoped to `curve`.
///
/// See [`KeyHandle::new`].
pub fn create_key(curve: CurveId) -> Result<KeyHandle, HalideError> {
    KeyHandle::new(curve)
}

#[cfg(test)]
mod tests {
    use super::{create_key, KeyHandle};
    use crate::curve::{list_builtin_curves, CurveId};
    use crate::HalideError;
    use rand::Rng;

    #[test]
    fn create_and_release() -> Result<(), HalideError> {
        for _ in 0..1000 {
            let key = create_key(CurveId::PRIME256V1)?;
            key.release();
        }

        Ok(())
    }

    #[test]
    fn every_builtin_curve() -> Result<(), HalideError> {
        for info in list_builtin_curves()? {
            let key = create_key(info.curve)?;
            assert_eq!(key.curve(), info.curve);
        }

        Ok(())
    }

    #[test]
    fn unsupported_curves() {
        assert_eq!(
            create_key(CurveId(-1)).unwrap_err(),
            HalideError::UnsupportedCurve(CurveId(-1))
        );
        assert_eq!(
            create_key(CurveId(0)).unwrap_err(),
            HalideError::UnsupportedCurve(CurveId(0))
        );

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let curve = CurveId(rng.gen_range(i32::MIN..0));
            assert_eq!(
                create_key(curve).unwrap_err(),
                HalideError::UnsupportedCurve(curve)
            );
        }
    }

    #[test]
    fn generate_and_check() -> Result<(), HalideError> {
        for curve in [CurveId::PRIME256V1, CurveId::SECP384R1, CurveId::SECP521R1] {
            let mut key = create_key(curve)?;
            assert!(!key.has_private_key());
            assert!(matches!(
                key.check(),
                Err(HalideError::NativeLibrary {
                    function: "EC_KEY_check_key",
                    ..
                })
            ));

            key.generate()?;
            assert!(key.has_private_key());
            key.check()?;
        }

        Ok(())
    }

    #[test]
    fn clone_is_independent() -> Result<(), HalideError> {
        let mut key = KeyHandle::new(CurveId::SECP384R1)?;
        key.generate()?;

        let clone = key.try_clone()?;
        key.release();

        assert_eq!(clone.curve(), CurveId::SECP384R1);
        assert!(clone.has_private_key());
        clone.check()?;

        Ok(())
    }

    #[test]
    fn move_between_threads() -> Result<(), HalideError> {
        let mut key = create_key(CurveId::PRIME256V1)?;
        key.generate()?;

        let key = std::thread::spawn(move || key.check().map(|_| key))
            .join()
            .unwrap()?;
        assert_eq!(key.curve(), CurveId::PRIME256V1);

        Ok(())
    }
}
