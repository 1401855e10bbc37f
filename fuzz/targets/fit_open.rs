// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for the whole FIT flow: opening a session, selecting a
//! configuration, and resolving its kernel both through the configuration
//! and as a standalone image.
//!
//! No keys are trusted, so signed configurations never verify; everything
//! else is checked as thoroughly as `BestEffort` allows.

#![no_main]

use libfuzzer_sys::fuzz_target;

use fitverify::crypto::sig::NoKeys;
use fitverify::fit::Options;
use fitverify::fit::Session;
use fitverify::fit::VerifyPolicy;

const MACHINE: &[&str] = &["acme,board-v2", "acme,board"];

fuzz_target!(|data: &[u8]| {
    let options = Options::new(VerifyPolicy::BestEffort, &NoKeys)
        .verbose(true)
        .machine(MACHINE);
    let session = match Session::open(data, options) {
        Ok(s) => s,
        Err(_) => return,
    };

    let config = match session.open_configuration(None) {
        Ok(c) => c,
        Err(_) => match session.last_configuration() {
            Some(name) => match session.open_configuration(Some(name)) {
                Ok(c) => c,
                Err(_) => return,
            },
            None => return,
        },
    };

    if let Ok(kernel) = session.open_image(Some(config), "kernel") {
        if let Ok(Some(load)) = kernel.load_address() {
            let addr = session.image_address(Some(config), "kernel", "load");
            assert_eq!(addr.ok(), Some(load));
        }
        let _ = kernel.entry_point();
    }
    let _ = session.image_address(Some(config), "kernel", "entry");
    let _ = session.open_image(Some(config), "fdt");

    // The same kernel, looked up by unit name and checked against its own
    // signature.
    let unit = config
        .node()
        .property("kernel")
        .and_then(|p| p.as_str())
        .unwrap_or("kernel");
    if let Ok(kernel) = session.open_image(None, unit) {
        // Payloads are decompressed at most once per session.
        let again = session.open_image(None, unit).map(|k| k.data().as_ptr());
        assert_eq!(again.ok(), Some(kernel.data().as_ptr()));
    }
});
