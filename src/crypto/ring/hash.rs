// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of [`crypto::hash`] based on `ring`.

use core::mem;

use ring::digest;

use crate::crypto::hash;
use crate::Result;

#[cfg(doc)]
use crate::crypto;

/// A `ring`-based [`hash::Engine`].
pub struct Engine {
    inner: Option<digest::Context>,
}

impl Engine {
    /// Creates a new `Engine`.
    pub fn new() -> Self {
        Self { inner: None }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn algorithm(algo: hash::Algo) -> &'static digest::Algorithm {
    match algo {
        hash::Algo::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
        hash::Algo::Sha256 => &digest::SHA256,
        hash::Algo::Sha384 => &digest::SHA384,
        hash::Algo::Sha512 => &digest::SHA512,
    }
}

impl hash::Engine for Engine {
    fn supports(&mut self, _: hash::Algo) -> bool {
        true
    }

    fn start_raw(&mut self, algo: hash::Algo) -> Result<(), hash::Error> {
        self.inner = Some(digest::Context::new(algorithm(algo)));
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), hash::Error> {
        match &mut self.inner {
            None => return Err(fail!(hash::Error::Idle)),
            Some(c) => c.update(data),
        }
        Ok(())
    }

    fn finish_raw(&mut self, out: &mut [u8]) -> Result<(), hash::Error> {
        let c = mem::replace(&mut self.inner, None)
            .ok_or_else(|| fail!(hash::Error::Idle))?;
        check!(
            out.len() == c.algorithm().output_len,
            hash::Error::WrongSize
        );
        let digest = c.finish();
        out.copy_from_slice(digest.as_ref());
        Ok(())
    }

    fn compare_raw(&mut self, expected: &[u8]) -> Result<(), hash::Error> {
        let c = mem::replace(&mut self.inner, None)
            .ok_or_else(|| fail!(hash::Error::Idle))?;
        check!(
            expected.len() == c.algorithm().output_len,
            hash::Error::WrongSize
        );
        let digest = c.finish();
        ring::constant_time::verify_slices_are_equal(digest.as_ref(), expected)
            .map_err(|_| fail!(hash::Error::Unspecified))?;
        Ok(())
    }
}
