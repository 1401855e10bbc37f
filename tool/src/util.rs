// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! I/O utilities.

use std::fs;
use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::Path;

/// Like `?`, but crashes the binary with a nice error message.
macro_rules! check {
    ($result:expr, $fmt:literal $(, $args:expr)* $(,)?) => {
        match $result {
            Ok(x) => x,
            Err(e) => {
                eprintln!("error: {}: {:?}", format_args!($fmt, $($args,)*), e);
                std::process::exit(2)
            }
        }
    }
}

/// Reads the whole of the given input file, or stdin if there is none.
///
/// At most `max_size` bytes are read.
pub fn read_input(path: Option<&Path>, max_size: usize) -> Vec<u8> {
    let mut input: Box<dyn Read> = match path {
        Some(path) => {
            Box::new(check!(File::open(path), "failed to open input file"))
        }
        None => Box::new(io::stdin()),
    };

    let mut buf = Vec::new();
    check!(
        input.by_ref().take(max_size as u64).read_to_end(&mut buf),
        "failed to read input"
    );
    buf
}

/// Opens the given output file, or stdout if there is none.
pub fn output(path: Option<&Path>) -> Box<dyn Write> {
    match path {
        Some(path) => {
            Box::new(check!(File::create(path), "failed to open output file"))
        }
        None => Box::new(io::stdout()),
    }
}

/// Reads every file in `paths`.
pub fn read_all(paths: &[impl AsRef<Path>]) -> Vec<Vec<u8>> {
    paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            check!(fs::read(p), "failed to read {}", p.display())
        })
        .collect()
}
