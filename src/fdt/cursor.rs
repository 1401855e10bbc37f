// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Bounds-checked access to the structure and string tables.
//!
//! Every tag, node name, and property name in a flattened tree is read
//! through a [`BoundedCursor`]. No other code in this crate performs offset
//! arithmetic on a tree buffer.

use core::str;

use byteorder::ByteOrder as _;
use byteorder::BE;

use crate::fdt::tag;
use crate::fdt::Error;
use crate::fdt::Header;
use crate::fdt::PROP_HEADER_SIZE;
use crate::fdt::TAG_SIZE;
use crate::Result;

/// A bounded view of a flattened tree's structure and string tables.
///
/// All offsets taken and returned by a cursor are absolute offsets into
/// the blob, except for string-table offsets, which are relative to the
/// start of the string table as in the on-disk format.
#[derive(Copy, Clone, Debug)]
pub struct BoundedCursor<'a> {
    blob: &'a [u8],
    struct_start: usize,
    struct_end: usize,
    strings_start: usize,
    strings_size: usize,
}

impl<'a> BoundedCursor<'a> {
    /// Creates a cursor over `blob`, which `header` was parsed from.
    pub fn new(blob: &'a [u8], header: &Header) -> Self {
        Self {
            blob,
            struct_start: header.off_dt_struct,
            struct_end: header.struct_end(),
            strings_start: header.off_dt_strings,
            strings_size: header.size_dt_strings,
        }
    }

    /// Parses the header of `blob` and creates a cursor over it.
    pub fn from_blob(blob: &'a [u8]) -> Result<Self, Error> {
        let header = Header::parse(blob)?;
        Ok(Self::new(blob, &header))
    }

    /// Returns the blob this cursor reads from.
    pub fn blob(&self) -> &'a [u8] {
        self.blob
    }

    /// Returns the offset of the first tag.
    pub fn struct_start(&self) -> usize {
        self.struct_start
    }

    /// Returns the offset one past the end of the structure table.
    pub fn struct_end(&self) -> usize {
        self.struct_end
    }

    /// Returns the offset of the string table.
    pub fn strings_start(&self) -> usize {
        self.strings_start
    }

    /// Returns the size of the string table.
    pub fn strings_size(&self) -> usize {
        self.strings_size
    }

    /// Steps `size` bytes past `offset`, then rounds up to the next tag
    /// boundary.
    ///
    /// Fails if the result would lie past the end of the structure table,
    /// including when the arithmetic itself would overflow.
    pub fn advance(&self, offset: usize, size: usize) -> Result<usize, Error> {
        let next = offset
            .checked_add(size)
            .and_then(|n| n.checked_add(TAG_SIZE - 1))
            .map(|n| n & !(TAG_SIZE - 1))
            .ok_or_else(|| fail!(Error::OutOfBounds { offset }))?;
        check!(next <= self.struct_end, Error::OutOfBounds { offset: next });
        Ok(next)
    }

    /// Returns `len` bytes of the structure table starting at `offset`.
    pub fn bytes_at(
        &self,
        offset: usize,
        len: usize,
    ) -> Result<&'a [u8], Error> {
        let end = offset
            .checked_add(len)
            .filter(|&end| {
                offset >= self.struct_start && end <= self.struct_end
            })
            .ok_or_else(|| fail!(Error::OutOfBounds { offset }))?;
        self.blob
            .get(offset..end)
            .ok_or_else(|| fail!(Error::OutOfBounds { offset }))
    }

    /// Reads the big-endian word at `offset` in the structure table.
    pub fn u32_at(&self, offset: usize) -> Result<u32, Error> {
        Ok(BE::read_u32(self.bytes_at(offset, 4)?))
    }

    /// Reads the NUL-terminated node name starting at `offset`.
    ///
    /// The terminator must lie inside the structure table.
    pub fn name_at(&self, offset: usize) -> Result<&'a str, Error> {
        let rest = self
            .blob
            .get(offset..self.struct_end)
            .filter(|_| offset >= self.struct_start)
            .ok_or_else(|| fail!(Error::OutOfBounds { offset }))?;
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| fail!(Error::OutOfBounds { offset }))?;
        str::from_utf8(&rest[..len])
            .map_err(|_| fail!(Error::BadName { offset }))
    }

    /// Looks up the string at `offset` within the string table.
    ///
    /// Fails if `offset` lies past the end of the table, or if the string
    /// is not terminated within it.
    pub fn string_at(&self, offset: u32) -> Result<&'a str, Error> {
        let offset = offset as usize;
        check!(
            offset <= self.strings_size,
            Error::OutOfBounds {
                offset: self.strings_start.saturating_add(offset)
            }
        );
        let table = self.strings(0, self.strings_size)?;
        let rest = &table[offset..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| fail!(Error::BadString { offset }))?;
        str::from_utf8(&rest[..len])
            .map_err(|_| fail!(Error::BadString { offset }))
    }

    /// Returns `size` bytes of the string table, starting `start` bytes in.
    pub fn strings(
        &self,
        start: usize,
        size: usize,
    ) -> Result<&'a [u8], Error> {
        let end = start
            .checked_add(size)
            .filter(|&end| end <= self.strings_size)
            .ok_or_else(|| fail!(Error::OutOfBounds { offset: start }))?;
        let base = self.strings_start;
        self.blob
            .get(base + start..base + end)
            .ok_or_else(|| fail!(Error::OutOfBounds { offset: base + start }))
    }

    /// Returns an iterator over the tags of the structure table.
    pub fn tokens(&self) -> Tokens<'a> {
        Tokens {
            cursor: *self,
            offset: self.struct_start,
            done: false,
        }
    }
}

/// A single decoded structure-table tag.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Token<'a> {
    /// Offset of the tag.
    pub offset: usize,
    /// Offset of the next tag.
    pub end: usize,
    /// What the tag holds.
    pub kind: TokenKind<'a>,
}

/// The payload of a [`Token`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TokenKind<'a> {
    /// A node begins.
    BeginNode {
        /// The node's name, including any unit address.
        name: &'a str,
    },
    /// The innermost open node ends.
    EndNode,
    /// A property of the innermost open node.
    Prop {
        /// The property's name, from the string table.
        name: &'a str,
        /// The property's value.
        value: &'a [u8],
    },
    /// Padding.
    Nop,
    /// The end of the structure table.
    End,
}

/// An iterator over the tags of a structure table, returned by
/// [`BoundedCursor::tokens()`].
///
/// Yields `Err` at most once; the iterator is exhausted after an error or
/// after the `END` tag.
pub struct Tokens<'a> {
    cursor: BoundedCursor<'a>,
    offset: usize,
    done: bool,
}

impl<'a> Tokens<'a> {
    fn decode(&self, offset: usize) -> Result<Token<'a>, Error> {
        let c = &self.cursor;
        let (kind, end) = match c.u32_at(offset)? {
            tag::BEGIN_NODE => {
                let name = c.name_at(offset + TAG_SIZE)?;
                let end = c.advance(offset, TAG_SIZE + name.len() + 1)?;
                (TokenKind::BeginNode { name }, end)
            }
            tag::END_NODE => (TokenKind::EndNode, c.advance(offset, TAG_SIZE)?),
            tag::PROP => {
                let len = c.u32_at(offset + 4)? as usize;
                let name = c.string_at(c.u32_at(offset + 8)?)?;
                let end =
                    c.advance(offset, PROP_HEADER_SIZE.saturating_add(len))?;
                let value = c.bytes_at(offset + PROP_HEADER_SIZE, len)?;
                (TokenKind::Prop { name, value }, end)
            }
            tag::NOP => (TokenKind::Nop, c.advance(offset, TAG_SIZE)?),
            tag::END => (TokenKind::End, c.advance(offset, TAG_SIZE)?),
            tag => return Err(fail!(Error::UnknownTag { offset, tag })),
        };
        Ok(Token { offset, end, kind })
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Result<Token<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decode(self.offset) {
            Ok(token) => {
                trace!("tag at {:#x}: {:?}", token.offset, token.kind);
                self.offset = token.end;
                self.done = token.kind == TokenKind::End;
                Some(Ok(token))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
