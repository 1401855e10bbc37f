// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Public-key signature traits.
//!
//! FIT signatures are always checked against a digest the caller has
//! already computed, so [`PublicKey::verify()`] receives the *hash* of the
//! signed message rather than the message itself.
//!
//! Keys are collected into a [`KeyStore`], which is injected by the caller
//! and only ever read by `fitverify`.

use alloc::boxed::Box;
use alloc::vec::Vec;

use static_assertions::assert_obj_safe;

use crate::crypto::hash;

/// An error returned by a signature operation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The signature does not match the digest under this key.
    Mismatch,

    /// The key cannot be used with the digest algorithm requested.
    UnsupportedAlgo,

    /// An implementation-specific failure, such as a malformed signature
    /// encoding.
    Custom,
}

/// A public key that can check signatures over precomputed digests.
pub trait PublicKey {
    /// Returns the name this key is known by, matched against a signature
    /// node's `key-name-hint` property.
    fn name_hint(&self) -> Option<&str>;

    /// Checks `signature` against `digest`, which was computed with `algo`.
    ///
    /// Returns `Ok(())` only if the signature verifies.
    fn verify(
        &self,
        signature: &[u8],
        digest: &[u8],
        algo: hash::Algo,
    ) -> Result<(), Error>;
}
assert_obj_safe!(PublicKey);

/// A read-only collection of trusted [`PublicKey`]s.
pub trait KeyStore {
    /// Returns the key at `index`, or `None` past the end of the store.
    ///
    /// Indices are dense: if `key(n)` is `None`, so is `key(n + 1)`.
    fn key(&self, index: usize) -> Option<&dyn PublicKey>;

    /// Looks up a key by its name hint.
    fn find(&self, hint: &str) -> Option<&dyn PublicKey> {
        self.keys().find(|k| k.name_hint() == Some(hint))
    }
}
assert_obj_safe!(KeyStore);

/// Helpers for walking a [`KeyStore`].
#[extend::ext(name = KeyStoreExt)]
pub impl<S: KeyStore + ?Sized> S {
    /// Returns an iterator over every key in the store, in index order.
    fn keys(&self) -> Keys<'_, Self> {
        Keys {
            store: self,
            index: 0,
        }
    }
}

/// An iterator over a [`KeyStore`]; see [`KeyStoreExt::keys()`].
pub struct Keys<'a, S: ?Sized> {
    store: &'a S,
    index: usize,
}

impl<'a, S: KeyStore + ?Sized> Iterator for Keys<'a, S> {
    type Item = &'a dyn PublicKey;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.store.key(self.index)?;
        self.index += 1;
        Some(key)
    }
}

/// A [`KeyStore`] holding no keys.
///
/// Every signature check against it fails; useful when signatures are not
/// required by policy.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoKeys;

impl KeyStore for NoKeys {
    fn key(&self, _: usize) -> Option<&dyn PublicKey> {
        None
    }
}

impl<K: PublicKey> KeyStore for [K] {
    fn key(&self, index: usize) -> Option<&dyn PublicKey> {
        self.get(index).map(|k| k as &dyn PublicKey)
    }
}

impl<K: PublicKey, const N: usize> KeyStore for [K; N] {
    fn key(&self, index: usize) -> Option<&dyn PublicKey> {
        self[..].key(index)
    }
}

impl<K: PublicKey> KeyStore for Vec<K> {
    fn key(&self, index: usize) -> Option<&dyn PublicKey> {
        self.as_slice().key(index)
    }
}

impl<K: PublicKey + ?Sized> PublicKey for Box<K> {
    fn name_hint(&self) -> Option<&str> {
        K::name_hint(self)
    }

    fn verify(
        &self,
        signature: &[u8],
        digest: &[u8],
        algo: hash::Algo,
    ) -> Result<(), Error> {
        K::verify(self, signature, digest, algo)
    }
}
