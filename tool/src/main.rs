// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! `fitverify-tool` is a simple command-line tool for inspecting and
//! verifying FIT images.

#![deny(missing_docs)]
#![deny(warnings)]
#![deny(unused)]
#![deny(unsafe_code)]

use structopt::StructOpt as _;

#[macro_use]
mod util;

mod fit;

/// A command-line tool for working with FIT images.
#[allow(missing_docs)]
#[derive(structopt::StructOpt)]
#[structopt(author)]
enum CliCommand {
    #[structopt(flatten)]
    Fit(fit::Fit),
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp(None)
    .init();

    match CliCommand::from_args() {
        CliCommand::Fit(f) => f.run(),
    }
}
