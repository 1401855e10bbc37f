// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable decompression of image payloads.
//!
//! An image node's `compression` property names the codec its `data` was
//! packed with. When an image is opened, its verified payload is handed to a
//! [`Decompress`] implementation along with that name.

use alloc::vec::Vec;

use static_assertions::assert_obj_safe;

#[cfg(feature = "std")]
pub mod gzip;

/// An error returned by a [`Decompress`] implementation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The named codec is not supported by this implementation.
    Unsupported,

    /// The payload is not a valid stream for the named codec.
    Failed,
}

/// A decompressor for image payloads.
pub trait Decompress {
    /// Decompresses `data`, which was compressed with `compression` (for
    /// example `"gzip"`).
    ///
    /// `compression` is never `"none"`.
    fn decompress(
        &self,
        compression: &str,
        data: &[u8],
    ) -> Result<Vec<u8>, Error>;
}
assert_obj_safe!(Decompress);

/// A [`Decompress`] that supports no codecs at all.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unsupported;

impl Decompress for Unsupported {
    fn decompress(&self, _: &str, _: &[u8]) -> Result<Vec<u8>, Error> {
        Err(Error::Unsupported)
    }
}
