// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for `fitverify` tests.

#![deny(missing_docs)]
#![deny(unused)]

pub mod data;
pub mod fdt;
