// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! A minimal flattened device tree writer, for building test blobs.
//!
//! The writer performs no validation whatsoever: tags are emitted in
//! whatever order they are requested, so that tests can build malformed
//! trees as easily as well-formed ones.

const MAGIC: u32 = 0xd00d_feed;
const VERSION: u32 = 17;
const LAST_COMP_VERSION: u32 = 16;

const HEADER_SIZE: usize = 40;
const RSVMAP_SIZE: usize = 16;
const STRUCT_START: usize = HEADER_SIZE + RSVMAP_SIZE;

const BEGIN_NODE: u32 = 1;
const END_NODE: u32 = 2;
const PROP: u32 = 3;
const NOP: u32 = 4;
const END: u32 = 9;

/// Builds a version 17 flattened device tree.
///
/// Every emitting method returns the absolute offset, within the finished
/// blob, of the tag it wrote.
#[derive(Default)]
pub struct FdtWriter {
    structs: Vec<u8>,
    strings: Vec<u8>,
    names: Vec<(String, u32)>,
}

impl FdtWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    fn offset(&self) -> usize {
        STRUCT_START + self.structs.len()
    }

    fn pad(&mut self) {
        while self.structs.len() % 4 != 0 {
            self.structs.push(0);
        }
    }

    fn string(&mut self, name: &str) -> u32 {
        if let Some((_, off)) = self.names.iter().find(|(n, _)| n == name) {
            return *off;
        }
        let off = self.strings.len() as u32;
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        self.names.push((name.to_string(), off));
        off
    }

    /// Emits an arbitrary big-endian word, such as an unknown tag.
    pub fn raw_u32(&mut self, word: u32) -> usize {
        let at = self.offset();
        self.structs.extend_from_slice(&word.to_be_bytes());
        at
    }

    /// Opens a node named `name`.
    pub fn begin_node(&mut self, name: &str) -> usize {
        let at = self.raw_u32(BEGIN_NODE);
        self.structs.extend_from_slice(name.as_bytes());
        self.structs.push(0);
        self.pad();
        at
    }

    /// Closes the innermost open node.
    pub fn end_node(&mut self) -> usize {
        self.raw_u32(END_NODE)
    }

    /// Emits a `NOP` tag.
    pub fn nop(&mut self) -> usize {
        self.raw_u32(NOP)
    }

    /// Emits a property with a raw value.
    ///
    /// The value itself starts twelve bytes past the returned offset.
    pub fn prop(&mut self, name: &str, value: &[u8]) -> usize {
        let name_off = self.string(name);
        let at = self.raw_u32(PROP);
        self.raw_u32(value.len() as u32);
        self.raw_u32(name_off);
        self.structs.extend_from_slice(value);
        self.pad();
        at
    }

    /// Emits a property holding a single NUL-terminated string.
    pub fn prop_str(&mut self, name: &str, value: &str) -> usize {
        self.prop_strs(name, &[value])
    }

    /// Emits a property holding a list of NUL-terminated strings.
    pub fn prop_strs(&mut self, name: &str, values: &[&str]) -> usize {
        let mut buf = Vec::new();
        for v in values {
            buf.extend_from_slice(v.as_bytes());
            buf.push(0);
        }
        self.prop(name, &buf)
    }

    /// Emits a property holding big-endian 32-bit cells.
    pub fn prop_cells(&mut self, name: &str, cells: &[u32]) -> usize {
        let buf = cells
            .iter()
            .flat_map(|c| c.to_be_bytes())
            .collect::<Vec<_>>();
        self.prop(name, &buf)
    }

    /// Emits a trailing `END` tag and assembles the finished blob.
    pub fn finish(mut self) -> Vec<u8> {
        self.raw_u32(END);

        let strings_start = STRUCT_START + self.structs.len();
        let total = strings_start + self.strings.len();

        let mut blob = Vec::with_capacity(total);
        for word in [
            MAGIC,
            total as u32,
            STRUCT_START as u32,
            strings_start as u32,
            HEADER_SIZE as u32,
            VERSION,
            LAST_COMP_VERSION,
            0,
            self.strings.len() as u32,
            self.structs.len() as u32,
        ] {
            blob.extend_from_slice(&word.to_be_bytes());
        }
        blob.extend_from_slice(&[0; RSVMAP_SIZE]);
        blob.extend_from_slice(&self.structs);
        blob.extend_from_slice(&self.strings);
        blob
    }
}
