// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Flattened device tree (FDT) parsing.
//!
//! A FIT image is an ordinary version-17 flattened device tree. This module
//! provides the pieces the rest of the crate needs to read one without ever
//! leaving the bounds its header declares:
//!
//! - [`Header`], the fixed 40-byte big-endian header.
//! - [`BoundedCursor`], the only sanctioned way to read the structure and
//!   string tables, and the [`Tokens`] stream built on top of it.
//! - [`Tree`], an arena holding the unflattened node hierarchy, navigated
//!   through [`Node`] and [`Property`] handles.

use core::fmt;

mod cursor;
mod header;
mod tree;

pub use cursor::BoundedCursor;
pub use cursor::Token;
pub use cursor::TokenKind;
pub use cursor::Tokens;
pub use header::Header;
pub use tree::machine_is_compatible;
pub use tree::Node;
pub use tree::Property;
pub use tree::Strings;
pub use tree::Tree;

/// The magic number at the start of every flattened tree.
pub const MAGIC: u32 = 0xd00d_feed;

/// The only flattened-tree version this crate understands.
pub const VERSION: u32 = 17;

/// The score reported for a first-position `compatible` match.
///
/// Each later position in a `compatible` list scores four less.
pub const COMPATIBLE_MAX_SCORE: i32 = i32::MAX / 2;

/// Structure-table tag values.
#[allow(missing_docs)]
pub mod tag {
    pub const BEGIN_NODE: u32 = 0x1;
    pub const END_NODE: u32 = 0x2;
    pub const PROP: u32 = 0x3;
    pub const NOP: u32 = 0x4;
    pub const END: u32 = 0x9;
}

/// Size of a bare structure-table tag.
pub const TAG_SIZE: usize = 4;

/// Size of a `PROP` tag together with its length and name-offset words.
pub const PROP_HEADER_SIZE: usize = 12;

/// Errors produced while reading a flattened tree.
///
/// Every one of these means the blob is corrupt; none are recoverable.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The buffer is shorter than a header, or than the header's
    /// `totalsize`.
    Truncated,
    /// The header magic is wrong.
    BadMagic(u32),
    /// The header version is not 17.
    BadVersion(u32),
    /// A read or an advance would leave the table it belongs to.
    OutOfBounds {
        /// The offset being read from or advanced past.
        offset: usize,
    },
    /// A structure-table tag was not one of the five known ones.
    UnknownTag {
        /// Offset of the tag.
        offset: usize,
        /// The tag value read.
        tag: u32,
    },
    /// A node or property name is empty where it may not be, reserved,
    /// or not valid UTF-8.
    BadName {
        /// Offset of the name.
        offset: usize,
    },
    /// A string-table entry is unterminated.
    BadString {
        /// Offset of the entry, relative to the start of the string table.
        offset: usize,
    },
    /// `BEGIN_NODE` and `END_NODE` tags do not pair up, or a property
    /// appears outside any node.
    Unbalanced {
        /// Offset of the offending tag.
        offset: usize,
    },
    /// Nodes nest deeper than the walker's limit.
    TooDeep,
    /// A node path grew longer than the walker's limit.
    PathTooLong,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "blob truncated"),
            Self::BadMagic(m) => write!(f, "bad magic: {:#010x}", m),
            Self::BadVersion(v) => write!(f, "bad dt version: {:#010x}", v),
            Self::OutOfBounds { offset } => {
                write!(f, "out of bounds at offset {:#x}", offset)
            }
            Self::UnknownTag { offset, tag } => {
                write!(f, "unknown tag {:#010x} at offset {:#x}", tag, offset)
            }
            Self::BadName { offset } => {
                write!(f, "bad name at offset {:#x}", offset)
            }
            Self::BadString { offset } => {
                write!(f, "bad string at string offset {:#x}", offset)
            }
            Self::Unbalanced { offset } => {
                write!(f, "unbalanced node at offset {:#x}", offset)
            }
            Self::TooDeep => write!(f, "nodes nested too deeply"),
            Self::PathTooLong => write!(f, "node path too long"),
        }
    }
}
