// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for flattened-tree parsing and the embedded `compatible`
//! scan, which must agree on what a well-formed tree is.

#![no_main]

use libfuzzer_sys::fuzz_target;

use fitverify::fdt;
use fitverify::fdt::Tree;

fuzz_target!(|data: &[u8]| {
    let score = fdt::machine_is_compatible(data, "acme,board");
    assert!(score <= fdt::COMPATIBLE_MAX_SCORE);

    let tree = match Tree::parse(data) {
        Ok(t) => t,
        Err(_) => return,
    };
    let root = tree.root(data);
    assert!(root.compatible_score("acme,board") >= 0);
    for node in (0..tree.len()).map(|i| tree.node(data, i)) {
        let _ = node.path();
        for prop in node.properties() {
            let _ = prop.strings().count();
        }
    }
});
