// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! gzip and zlib decompression, using the `flate2` crate.

use std::io::Read;

use flate2::read::GzDecoder;
use flate2::read::ZlibDecoder;

use crate::compress::Decompress;
use crate::compress::Error;

/// A `flate2`-based [`Decompress`], accepting `"gzip"` and `"zlib"`.
#[derive(Copy, Clone, Debug, Default)]
pub struct Flate;

impl Decompress for Flate {
    fn decompress(
        &self,
        compression: &str,
        data: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        let result = match compression {
            "gzip" => GzDecoder::new(data).read_to_end(&mut out),
            "zlib" => ZlibDecoder::new(data).read_to_end(&mut out),
            _ => return Err(Error::Unsupported),
        };
        result.map_err(|_| Error::Failed)?;
        Ok(out)
    }
}
