// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! `fitverify` verifies and resolves Flattened Image Tree (FIT) boot
//! images.
//!
//! A FIT image is a single flattened device-tree blob holding an `images`
//! subtree (kernels, device trees, ramdisks, each with hashes and
//! signatures) and a `configurations` subtree selecting one image per role.
//! This crate parses such a blob without ever reading past its declared
//! bounds, picks a configuration, and hands back image data only after the
//! configured [`VerifyPolicy`](fit::VerifyPolicy) has been satisfied.
//!
//! The entry point is [`fit::Session`]:
//!
//! ```no_run
//! # use fitverify::fit::{Options, Session, VerifyPolicy};
//! # use fitverify::crypto::sig::NoKeys;
//! # fn boot(blob: &[u8]) -> fitverify::Result<(), fitverify::fit::Error> {
//! let keys = NoKeys;
//! let options = Options::new(VerifyPolicy::HashOnly, &keys);
//! let session = Session::open(blob, options)?;
//! let config = session.open_configuration(None)?;
//! let kernel = session.open_image(Some(config), "kernel")?;
//! # let _ = kernel;
//! # Ok(())
//! # }
//! ```
//!
//! Cryptography is pluggable through the traits in [`crypto`]; software
//! implementations are provided behind the `ring` and `rsa` features.
//! Decompression is pluggable through [`compress::Decompress`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![deny(warnings)]
#![deny(unused)]
#![deny(unsafe_code)]

extern crate alloc;

#[macro_use]
mod debug;

pub mod compress;
pub mod crypto;
pub mod fdt;
pub mod fit;

pub use debug::Error;

/// A `Result` whose error half is a wrapped [`Error`].
pub type Result<T, E> = core::result::Result<T, Error<E>>;
