// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fake public keys for tests.
//!
//! A fake key's "signature" over a digest is its one-byte id followed by the
//! digest itself, so tampering with either the digest or the signature makes
//! verification fail, just like with a real key.

use core::cell::Cell;

use crate::crypto::hash;
use crate::crypto::sig;

/// A fake [`sig::PublicKey`] that counts how often it is asked to verify.
pub struct Key {
    hint: Option<&'static str>,
    id: u8,
    calls: Cell<usize>,
}

impl Key {
    /// Creates a key with the given name hint.
    pub fn new(hint: &'static str, id: u8) -> Self {
        Self {
            hint: Some(hint),
            id,
            calls: Cell::new(0),
        }
    }

    /// Creates a key with no name hint.
    pub fn anonymous(id: u8) -> Self {
        Self {
            hint: None,
            id,
            calls: Cell::new(0),
        }
    }

    /// Produces this key's signature over `digest`.
    pub fn sign(&self, digest: &[u8]) -> Vec<u8> {
        let mut sig = vec![self.id];
        sig.extend_from_slice(digest);
        sig
    }

    /// Returns how many times `verify()` has been called on this key.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl sig::PublicKey for Key {
    fn name_hint(&self) -> Option<&str> {
        self.hint
    }

    fn verify(
        &self,
        signature: &[u8],
        digest: &[u8],
        _: hash::Algo,
    ) -> Result<(), sig::Error> {
        self.calls.set(self.calls.get() + 1);
        match signature.split_first() {
            Some((&id, rest)) if id == self.id && rest == digest => Ok(()),
            _ => Err(sig::Error::Mismatch),
        }
    }
}
