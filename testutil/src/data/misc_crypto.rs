// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Plaintext and digest vectors for hash engine tests.

/// A plaintext string.
pub const PLAIN_TEXT: &[u8] =
    b"The quick brown fox jumps over the lazy dog, twice over.\n";

/// The SHA-256 hash of `PLAIN_TEXT`.
#[rustfmt::skip]
pub const PLAIN_SHA256: &[u8; 32] = &[
    0x90, 0x38, 0x93, 0xed, 0xdd, 0x31, 0xd7, 0x96,
    0xe4, 0x5e, 0x02, 0x53, 0xd6, 0x1f, 0x62, 0xa6,
    0x7e, 0xe5, 0x86, 0x53, 0xc0, 0x67, 0x10, 0xa8,
    0x1b, 0xd2, 0x04, 0x06, 0x4c, 0xd1, 0x34, 0xc8,
];

/// The SHA-1 hash of `PLAIN_TEXT`.
#[rustfmt::skip]
pub const PLAIN_SHA1: &[u8; 20] = &[
    0x5e, 0x05, 0xb1, 0x7c, 0xad, 0xc2, 0x5d, 0x26, 0xe0, 0x2a,
    0x08, 0x87, 0x83, 0x09, 0x88, 0x34, 0x2a, 0xdb, 0x1b, 0x7a,
];
