//! Scoped owners for transient big-number objects.
//!
//! Some native EC routines need a `BN_CTX` scratch context, and write their results into a
//! caller-allocated `BIGNUM`. Neither object outlives the call that needs it: both are created
//! immediately before the call and freed when the owning value goes out of scope, on every exit
//! path.

use crate::{native_error, HalideError};
use openssl_sys::{BIGNUM, BN_CTX};
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Working memory for native big-number arithmetic.
pub(crate) struct ScratchContext {
    ctx: NonNull<BN_CTX>,
    _marker: PhantomData<BN_CTX>,
}

impl ScratchContext {
    pub(crate) fn new() -> Result<Self, HalideError> {
        let ctx = unsafe {
            // SAFETY: This function allocates a new `BN_CTX`, returning NULL on allocation
            // failure. A non-NULL result is owned by us, and is freed exactly once in `drop`.
            openssl_sys::BN_CTX_new()
        };

        NonNull::new(ctx)
            .map(|ctx| Self {
                ctx,
                _marker: PhantomData,
            })
            .ok_or_else(|| native_error("BN_CTX_new"))
    }

    pub(crate) fn as_ptr(&self) -> *mut BN_CTX {
        self.ctx.as_ptr()
    }
}

impl Drop for ScratchContext {
    fn drop(&mut self) {
        unsafe {
            // SAFETY: `self.ctx` was returned by `BN_CTX_new` in the constructor, and is only ever
            // freed here. `drop` runs at most once, and no method is reachable afterwards, so a
            // double-free or use-after-free is not possible from safe code.
            openssl_sys::BN_CTX_free(self.ctx.as_ptr());
        }
    }
}

/// An owned native big number, used as the destination for native results.
pub(crate) struct BigNum {
    bn: NonNull<BIGNUM>,
    _marker: PhantomData<BIGNUM>,
}

impl BigNum {
    pub(crate) fn new() -> Result<Self, HalideError> {
        let bn = unsafe {
            // SAFETY: This function allocates a new `BIGNUM` set to zero, returning NULL on
            // allocation failure. A non-NULL result is owned by us, and is freed exactly once in
            // `drop`.
            openssl_sys::BN_new()
        };

        NonNull::new(bn)
            .map(|bn| Self {
                bn,
                _marker: PhantomData,
            })
            .ok_or_else(|| native_error("BN_new"))
    }

    pub(crate) fn as_ptr(&mut self) -> *mut BIGNUM {
        self.bn.as_ptr()
    }

    /// The magnitude of this number as big-endian bytes, without leading zeroes.
    ///
    /// Zero is represented by an empty vector.
    pub(crate) fn to_bytes_be(&self) -> Vec<u8> {
        let bits = unsafe {
            // SAFETY: `self.bn` points to a valid, initialised `BIGNUM` for the lifetime of
            // `self`.
            openssl_sys::BN_num_bits(self.bn.as_ptr())
        };
        let len = (bits.max(0) as usize + 7) / 8;

        let mut bytes = vec![0u8; len];
        let written = unsafe {
            // SAFETY: `BN_bn2bin` writes exactly `BN_num_bytes(a)` bytes, which is
            // `(BN_num_bits(a) + 7) / 8`. `bytes` was allocated with exactly this length, so it is
            // valid for writes of the required length.
            openssl_sys::BN_bn2bin(self.bn.as_ptr(), bytes.as_mut_ptr())
        };
        bytes.truncate(written.max(0) as usize);

        bytes
    }
}

impl Drop for BigNum {
    fn drop(&mut self) {
        unsafe {
            // SAFETY: `self.bn` was returned by `BN_new` in the constructor, and is only ever
            // freed here, exactly once.
            openssl_sys::BN_free(self.bn.as_ptr());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BigNum, ScratchContext};
    use crate::{require_init, HalideError};

    #[test]
    fn new_bignum_is_zero() -> Result<(), HalideError> {
        require_init();

        let bn = BigNum::new()?;
        assert!(bn.to_bytes_be().is_empty());

        Ok(())
    }

    #[test]
    fn scratch_context_lifecycle() -> Result<(), HalideError> {
        require_init();

        for _ in 0..100 {
            let ctx = ScratchContext::new()?;
            assert!(!ctx.as_ptr().is_null());
        }

        Ok(())
    }
}
