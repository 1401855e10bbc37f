// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of crypto traits, using the `ring` crate.
//!
//! This module provides implementations of `fitverify::crypto` traits based
//! on Brian Smith's `ring` crate.
//!
//! `ring` takes no care to be side-channel-free in this configuration,
//! beyond whatever precautions it takes by default.

pub mod hash;
