// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable cryptography traits.
//!
//! FIT verification requires a digest engine and a store of trusted public
//! keys. This module provides object-safe traits that abstract over those
//! operations, so that integrations can back them with whatever hardware
//! or certified library they need.
//!
//! It is recommended to not import the traits in this module directly, since
//! a lot of them have the same name. Instead, use imports like
//! `use fitverify::crypto::hash;` and partially-qualified names like
//! `hash::Engine`.
//!
//! Software implementations of these traits are provided under the
//! [`ring` module], based on the [`ring`] crate, and the [`rsa` module],
//! based on the RustCrypto `rsa` crate. Their presence is controlled by the
//! feature flags of the same names.
//!
//! [`ring` module]: ring/index.html
//! [`rsa` module]: rsa/index.html

pub mod hash;
pub mod sig;

#[cfg(feature = "ring")]
pub mod ring;

#[cfg(feature = "rsa")]
pub mod rsa;

#[cfg(test)]
pub(crate) mod fake;
