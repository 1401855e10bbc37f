// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Cryptographic hashing.
//!
//! In general, users of this module should be pulling in [`EngineExt`],
//! adds functions to [`Engine`] for more ergonomic usage, but which would
//! otherwise make it object-unsafe.

use static_assertions::assert_obj_safe;

use crate::Result;

#[cfg(feature = "arbitrary-derive")]
use libfuzzer_sys::arbitrary::{self, Arbitrary};

/// A cryptographic hashing algorithm.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "arbitrary-derive", derive(Arbitrary))]
pub enum Algo {
    /// 160-bit SHA-1.
    ///
    /// Only present because deployed FIT images still carry it.
    Sha1,
    /// 256-bit SHA-2.
    Sha256,
    /// 384-bit SHA-2.
    Sha384,
    /// 512-bit SHA-2.
    Sha512,
}

impl Algo {
    /// The largest digest produced by any supported algorithm, in bytes.
    pub const MAX_BYTES: usize = Self::Sha512.bytes();

    /// Looks up an algorithm by the name used in a hash node's `algo`
    /// property, such as `"sha256"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Returns the canonical name of this algorithm.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// The number of bits in a digest of this strength.
    #[inline]
    pub const fn bits(self) -> usize {
        match self {
            Self::Sha1 => 160,
            Self::Sha256 => 256,
            Self::Sha384 => 384,
            Self::Sha512 => 512,
        }
    }

    /// The number of bytes in a digest of this strength.
    #[inline]
    pub const fn bytes(self) -> usize {
        self.bits() / 8
    }
}

/// A digest buffer large enough for any [`Algo`].
///
/// Only the first [`Algo::bytes()`] bytes are meaningful.
#[derive(Clone, Copy)]
pub struct Digest {
    algo: Algo,
    bytes: [u8; Algo::MAX_BYTES],
}

impl Digest {
    /// Creates a zeroed digest for `algo`.
    pub fn new(algo: Algo) -> Self {
        Self {
            algo,
            bytes: [0; Algo::MAX_BYTES],
        }
    }

    /// Returns the algorithm this digest was computed with.
    pub fn algo(&self) -> Algo {
        self.algo
    }

    /// Returns the digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.algo.bytes()]
    }

    /// Returns the digest bytes, mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.algo.bytes();
        &mut self.bytes[..len]
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl core::fmt::Debug for Digest {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}:", self.algo.name())?;
        for b in self.as_bytes() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// An error returned by a hashing function.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// Indicates that the wrong size of digest was provided to
    /// [`Engine::finish_raw()`].
    WrongSize,

    /// Indicates that the engine was idle, but a write or finish
    /// operation was requested.
    Idle,

    /// Indicates that the engine does not implement the requested
    /// algorithm.
    Unsupported,

    /// Indicates an unspecified, internal error; also returned when
    /// [`Engine::compare_raw()`] finds a mismatch.
    Unspecified,
}

/// A hashing engine, which maintains the state for one digest.
///
/// Callers should not use the `raw` API directly; [`Hasher`] is a type-safe
/// wrapper that manages a session with an `Engine`.
///
/// Implementers only need to provide the "raw" form of the API; the remaining
/// functions are convenience helpers.
pub trait Engine {
    /// Returns whether this engine supports the given algorithm.
    fn supports(&mut self, algo: Algo) -> bool;

    /// Begins a new hashing operation, discarding any previous state.
    fn start_raw(&mut self, algo: Algo) -> Result<(), Error>;

    /// Adds `data` to the hashing state.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Completes the hashing operation.
    ///
    /// Calling this function multiple times will have an unspecified effect.
    fn finish_raw(&mut self, out: &mut [u8]) -> Result<(), Error>;

    /// Completes the hashing operation, and then compares it to `expected`.
    ///
    /// Returns `Ok(())` if the hashes matched. The comparison does not leak
    /// the position of the first differing byte.
    ///
    /// Calling this function multiple times will have an unspecified effect.
    fn compare_raw(&mut self, expected: &[u8]) -> Result<(), Error>;
}
assert_obj_safe!(Engine);

/// Helpers for creating a [`Hasher`] from an [`Engine`].
#[extend::ext(name = EngineExt)]
pub impl<E: Engine + ?Sized> E {
    /// Begins a new hashing operation.
    ///
    /// Implementers do not need to implement this function themselves.
    #[inline]
    fn new_hash(&mut self, algo: Algo) -> Result<Hasher<&mut Self>, Error> {
        check!(self.supports(algo), Error::Unsupported);
        self.start_raw(algo)?;
        Ok(Hasher { engine: self })
    }

    /// Convenience helper for hashing a contiguous memory region.
    ///
    /// Implementers do not need to implement this function themselves.
    #[inline]
    fn contiguous_hash(
        &mut self,
        algo: Algo,
        buf: &[u8],
        out: &mut [u8],
    ) -> Result<(), Error> {
        let mut h = self.new_hash(algo)?;
        h.write(buf)?;
        h.finish(out)
    }

    /// Convenience helper for hashing a contiguous memory region into a
    /// fresh [`Digest`].
    ///
    /// Implementers do not need to implement this function themselves.
    #[inline]
    fn digest(&mut self, algo: Algo, buf: &[u8]) -> Result<Digest, Error> {
        let mut digest = Digest::new(algo);
        self.contiguous_hash(algo, buf, digest.as_bytes_mut())?;
        Ok(digest)
    }
}

/// A helper for managing a hashing operation with an [`Engine`].
///
/// Users should prefer to use this instead of calling [`Engine`]'s raw API
/// directly.
pub struct Hasher<E> {
    engine: E,
}

impl<E: Engine + ?Sized> Hasher<&mut E> {
    /// Adds `data` to the hashing state.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.engine.write_raw(data)
    }

    /// Completes the hashing operation, writing the result to `out`.
    pub fn finish(self, out: &mut [u8]) -> Result<(), Error> {
        self.engine.finish_raw(out)
    }

    /// Completes the hashing operation, comparing the result to `expected`.
    pub fn expect(self, expected: &[u8]) -> Result<(), Error> {
        self.engine.compare_raw(expected)
    }
}
