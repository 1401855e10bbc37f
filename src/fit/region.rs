// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Selective hashing of a flattened tree's raw bytes.
//!
//! A configuration signature does not cover the whole FIT blob. Instead,
//! the signer lists the paths of the nodes it vouches for in the signature
//! node's `hashed-nodes` property, and the signed digest covers exactly the
//! regions of the structure table that those nodes occupy, minus any
//! excluded properties (the image payloads, which are covered by each
//! image's own hash), plus a prefix of the string table.
//!
//! Which bytes are selected is driven by an inclusion level, `want`, that
//! each node inherits from its parent:
//!
//! - A node whose path is listed has `want = 2`: its tags, name, and
//!   property values are all hashed.
//! - Below that, each level of nesting decrements `want`. A node with
//!   `want = 1` contributes its begin and end tags and its name, but not its
//!   properties.
//! - A node with `want = 0` contributes nothing.
//!
//! The `END` tag is always hashed.

use alloc::vec::Vec;
use core::ops::Range;

use arrayvec::ArrayString;
use arrayvec::ArrayVec;

use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::fdt::BoundedCursor;
use crate::fdt::Error;
use crate::fdt::TokenKind;
use crate::fdt::Tokens;
use crate::Result;

/// The deepest node nesting the walker accepts.
pub const MAX_DEPTH: usize = 32;

/// The longest node path the walker accepts, in bytes.
pub const MAX_PATH_LEN: usize = 200;

/// Which parts of a tree are hashed.
#[derive(Clone, Debug)]
pub struct InclusionSpec<'s> {
    included: Vec<&'s str>,
    excluded: Vec<&'s str>,
    strings: (usize, usize),
}

impl<'s> InclusionSpec<'s> {
    /// Creates a new spec.
    ///
    /// `included` lists the exact paths of fully hashed nodes, `excluded`
    /// the names of properties whose values are never hashed, and
    /// `strings` the start and size of the string-table range appended to
    /// the digest.
    pub fn new(
        included: Vec<&'s str>,
        excluded: Vec<&'s str>,
        strings: (usize, usize),
    ) -> Self {
        Self {
            included,
            excluded,
            strings,
        }
    }

    fn is_included(&self, path: &str) -> bool {
        self.included.iter().any(|p| *p == path)
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|p| *p == name)
    }
}

/// Computes digests over the regions of a tree selected by an
/// [`InclusionSpec`].
pub struct RegionDigestWalker<'a, 's> {
    cursor: BoundedCursor<'a>,
    spec: &'s InclusionSpec<'s>,
}

impl<'a, 's> RegionDigestWalker<'a, 's> {
    /// Creates a walker over the tree behind `cursor`.
    pub fn new(cursor: BoundedCursor<'a>, spec: &'s InclusionSpec<'s>) -> Self {
        Self { cursor, spec }
    }

    /// Returns an iterator over the selected regions, as absolute byte
    /// ranges of the blob, in increasing order.
    pub fn regions(&self) -> Regions<'a, 's> {
        Regions {
            cursor: self.cursor,
            tokens: self.cursor.tokens(),
            spec: self.spec,
            stack: ArrayVec::new(),
            path: ArrayString::new(),
            want: 0,
            open: None,
            tail: None,
            done: false,
        }
    }

    /// Hashes the selected regions with `algo`.
    pub fn digest(
        &self,
        engine: &mut dyn hash::Engine,
        algo: hash::Algo,
    ) -> Result<hash::Digest, super::Error> {
        let blob = self.cursor.blob();
        let mut digest = hash::Digest::new(algo);
        let mut hasher = engine.new_hash(algo)?;
        for region in self.regions() {
            let region = region?;
            let bytes = blob.get(region.clone()).ok_or_else(|| {
                fail!(Error::OutOfBounds {
                    offset: region.start
                })
            })?;
            hasher.write(bytes)?;
        }
        hasher.finish(digest.as_bytes_mut())?;
        Ok(digest)
    }
}

/// An iterator over selected regions; see
/// [`RegionDigestWalker::regions()`].
///
/// Yields `Err` at most once, after which it is exhausted.
pub struct Regions<'a, 's> {
    cursor: BoundedCursor<'a>,
    tokens: Tokens<'a>,
    spec: &'s InclusionSpec<'s>,
    stack: ArrayVec<u8, MAX_DEPTH>,
    path: ArrayString<MAX_PATH_LEN>,
    want: u8,
    open: Option<usize>,
    tail: Option<Range<usize>>,
    done: bool,
}

impl Regions<'_, '_> {
    fn enter(&mut self, name: &str) -> Result<bool, Error> {
        check!(!self.stack.is_full(), Error::TooDeep);
        check!(
            self.path.len() + 2 + name.len() < MAX_PATH_LEN,
            Error::PathTooLong
        );
        if self.path.len() != 1 {
            self.path.push('/');
        }
        self.path.push_str(name);

        self.stack.push(self.want);
        if self.spec.is_included(&self.path) {
            self.want = 2;
        } else {
            self.want = self.want.saturating_sub(1);
        }
        Ok(self.want != 0)
    }

    fn leave(&mut self, offset: usize) -> Result<bool, Error> {
        let include = self.want != 0;
        self.want = self
            .stack
            .pop()
            .ok_or_else(|| fail!(Error::Unbalanced { offset }))?;
        let parent = self.path.rfind('/').unwrap_or(0);
        self.path.truncate(parent);
        Ok(include)
    }

    fn string_range(&self) -> Result<Range<usize>, Error> {
        let (start, size) = self.spec.strings;
        self.cursor.strings(start, size)?;
        let base = self.cursor.strings_start();
        Ok(base + start..base + start + size)
    }

    fn step(&mut self) -> Result<Option<Range<usize>>, Error> {
        while let Some(token) = self.tokens.next() {
            let token = token?;
            let include = match token.kind {
                TokenKind::BeginNode { name } => self.enter(name)?,
                TokenKind::EndNode => self.leave(token.offset)?,
                TokenKind::Prop { name, .. } => {
                    self.want >= 2 && !self.spec.is_excluded(name)
                }
                TokenKind::Nop => self.want >= 2,
                TokenKind::End => {
                    let start = self.open.take().unwrap_or(token.offset);
                    self.tail = Some(self.string_range()?);
                    self.done = true;
                    return Ok(Some(start..token.end));
                }
            };

            match (include, self.open) {
                (true, None) => self.open = Some(token.offset),
                (false, Some(start)) => {
                    self.open = None;
                    return Ok(Some(start..token.offset));
                }
                _ => {}
            }
        }

        // A tag stream always ends in `END` or an error.
        self.done = true;
        Err(fail!(Error::OutOfBounds {
            offset: self.cursor.struct_end()
        }))
    }
}

impl Iterator for Regions<'_, '_> {
    type Item = Result<Range<usize>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return self.tail.take().map(Ok);
        }
        match self.step() {
            Ok(region) => region.map(Ok),
            Err(e) => {
                self.done = true;
                self.tail = None;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::Algo;
    use crate::crypto::ring;
    use pretty_assertions::assert_eq;
    use testutil::fdt::FdtWriter;

    struct Sample {
        blob: Vec<u8>,
        kernel_data: usize,
        kernel_type: usize,
        conf_kernel: usize,
        hash_value: usize,
    }

    fn sample() -> Sample {
        let mut w = FdtWriter::new();
        w.begin_node("");
        w.prop_str("description", "sample");
        w.begin_node("images");
        w.begin_node("kernel");
        let kernel_data = w.prop("data", &[0xaa; 16]);
        let kernel_type = w.prop_str("type", "kernel");
        w.begin_node("hash-1");
        w.prop_str("algo", "sha256");
        let hash_value = w.prop("value", &[0x11; 32]);
        w.end_node();
        w.end_node();
        w.end_node();
        w.nop();
        w.begin_node("configurations");
        w.begin_node("conf-1");
        let conf_kernel = w.prop_str("kernel", "kernel");
        w.end_node();
        w.end_node();
        w.end_node();
        Sample {
            blob: w.finish(),
            kernel_data,
            kernel_type,
            conf_kernel,
            hash_value,
        }
    }

    const SIGNED: &[&str] = &[
        "/",
        "/configurations/conf-1",
        "/images/kernel",
        "/images/kernel/hash-1",
    ];

    fn digest(blob: &[u8], spec: &InclusionSpec) -> hash::Digest {
        let cursor = BoundedCursor::from_blob(blob).unwrap();
        let mut engine = ring::hash::Engine::new();
        RegionDigestWalker::new(cursor, spec)
            .digest(&mut engine, Algo::Sha256)
            .unwrap()
    }

    fn all_paths(blob: &[u8]) -> Vec<String> {
        let tree = crate::fdt::Tree::parse(blob).unwrap();
        (0..tree.len()).map(|i| tree.node(blob, i).path()).collect()
    }

    #[test]
    fn full_inclusion_round_trip() {
        let s = sample();
        let paths = all_paths(&s.blob);
        let spec = InclusionSpec::new(
            paths.iter().map(|p| p.as_str()).collect(),
            vec![],
            (0, 0),
        );

        let cursor = BoundedCursor::from_blob(&s.blob).unwrap();
        let regions = RegionDigestWalker::new(cursor, &spec)
            .regions()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let structs = cursor.struct_start()..cursor.struct_end();
        assert_eq!(regions[0], structs);
        assert!(regions[1..].iter().all(|r| r.is_empty()));

        let expected =
            ::ring::digest::digest(&::ring::digest::SHA256, &s.blob[structs]);
        assert_eq!(digest(&s.blob, &spec).as_bytes(), expected.as_ref());
    }

    #[test]
    fn idempotent() {
        let s = sample();
        let spec = InclusionSpec::new(SIGNED.to_vec(), vec!["data"], (0, 8));
        let walker_a = digest(&s.blob, &spec);
        let walker_b = digest(&s.blob, &spec);
        assert_eq!(walker_a.as_bytes(), walker_b.as_bytes());

        let cursor = BoundedCursor::from_blob(&s.blob).unwrap();
        let walker = RegionDigestWalker::new(cursor, &spec);
        let first = walker.regions().collect::<Vec<_>>();
        let second = walker.regions().collect::<Vec<_>>();
        assert_eq!(first, second);
    }

    #[test]
    fn regions_are_ordered() {
        let s = sample();
        let spec = InclusionSpec::new(SIGNED.to_vec(), vec!["data"], (0, 8));
        let cursor = BoundedCursor::from_blob(&s.blob).unwrap();
        let regions = RegionDigestWalker::new(cursor, &spec)
            .regions()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        let (strings, structs) = regions.split_last().unwrap();
        for pair in structs.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
        // The payload sits in a gap between two regions.
        assert!(structs
            .windows(2)
            .any(|p| p[0].end == s.kernel_data && p[1].start > s.kernel_data));
        assert_eq!(structs.last().unwrap().end, cursor.struct_end());
        assert_eq!(
            *strings,
            cursor.strings_start()..cursor.strings_start() + 8
        );
    }

    #[test]
    fn excluded_payload() {
        let s = sample();
        let spec = InclusionSpec::new(SIGNED.to_vec(), vec!["data"], (0, 8));
        let reference = digest(&s.blob, &spec);

        // Flipping payload bytes leaves the digest unchanged.
        let mut blob = s.blob.clone();
        blob[s.kernel_data + 12] ^= 0xff;
        blob[s.kernel_data + 27] ^= 0x01;
        assert_eq!(digest(&blob, &spec).as_bytes(), reference.as_bytes());

        // Flipping any other included property does not.
        for &at in &[s.kernel_type, s.conf_kernel, s.hash_value] {
            let mut blob = s.blob.clone();
            blob[at + 12] ^= 0x01;
            assert_ne!(digest(&blob, &spec).as_bytes(), reference.as_bytes());
        }
    }

    #[test]
    fn want_one_skips_properties() {
        let s = sample();
        // Only the kernel node is listed, so `hash-1` inherits `want = 1`.
        let spec = InclusionSpec::new(vec!["/images/kernel"], vec![], (0, 0));
        let reference = digest(&s.blob, &spec);

        let mut blob = s.blob.clone();
        blob[s.hash_value + 12] ^= 0x01;
        assert_eq!(digest(&blob, &spec).as_bytes(), reference.as_bytes());

        let mut blob = s.blob.clone();
        blob[s.kernel_type + 12] ^= 0x01;
        assert_ne!(digest(&blob, &spec).as_bytes(), reference.as_bytes());
    }

    #[test]
    fn nothing_included() {
        let s = sample();
        let spec = InclusionSpec::new(vec![], vec![], (0, 4));
        let cursor = BoundedCursor::from_blob(&s.blob).unwrap();
        let regions = RegionDigestWalker::new(cursor, &spec)
            .regions()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let end = cursor.struct_end();
        let strings = cursor.strings_start();
        assert_eq!(regions, vec![end - 4..end, strings..strings + 4]);
    }

    #[test]
    fn string_range_bounds() {
        let s = sample();
        let cursor = BoundedCursor::from_blob(&s.blob).unwrap();
        let size = cursor.strings_size();
        let spec = InclusionSpec::new(vec![], vec![], (4, size));
        let err = RegionDigestWalker::new(cursor, &spec)
            .regions()
            .find_map(|r| r.err())
            .unwrap()
            .into_inner();
        assert!(matches!(err, Error::OutOfBounds { .. }));

        let spec = InclusionSpec::new(vec![], vec![], (usize::MAX, 2));
        assert!(RegionDigestWalker::new(cursor, &spec)
            .regions()
            .any(|r| r.is_err()));
    }

    #[test]
    fn depth_limit() {
        let build = |depth: usize| {
            let mut w = FdtWriter::new();
            w.begin_node("");
            for _ in 1..depth {
                w.begin_node("n");
            }
            for _ in 0..depth {
                w.end_node();
            }
            w.finish()
        };
        let spec = InclusionSpec::new(vec!["/"], vec![], (0, 0));

        let blob = build(MAX_DEPTH);
        let cursor = BoundedCursor::from_blob(&blob).unwrap();
        let walker = RegionDigestWalker::new(cursor, &spec);
        assert!(walker.regions().all(|r| r.is_ok()));

        let blob = build(MAX_DEPTH + 1);
        let cursor = BoundedCursor::from_blob(&blob).unwrap();
        let err = RegionDigestWalker::new(cursor, &spec)
            .regions()
            .find_map(|r| r.err())
            .unwrap()
            .into_inner();
        assert_eq!(err, Error::TooDeep);
    }

    #[test]
    fn path_limit() {
        let name = "x".repeat(100);
        let mut w = FdtWriter::new();
        w.begin_node("");
        w.begin_node(&name);
        w.begin_node(&name);
        w.end_node();
        w.end_node();
        w.end_node();
        let blob = w.finish();

        let spec = InclusionSpec::new(vec![], vec![], (0, 0));
        let cursor = BoundedCursor::from_blob(&blob).unwrap();
        let err = RegionDigestWalker::new(cursor, &spec)
            .regions()
            .find_map(|r| r.err())
            .unwrap()
            .into_inner();
        assert_eq!(err, Error::PathTooLong);
    }

    #[test]
    fn unbalanced() {
        let mut w = FdtWriter::new();
        w.begin_node("");
        w.end_node();
        let at = w.end_node();
        let blob = w.finish();

        let spec = InclusionSpec::new(vec![], vec![], (0, 0));
        let cursor = BoundedCursor::from_blob(&blob).unwrap();
        let err = RegionDigestWalker::new(cursor, &spec)
            .regions()
            .find_map(|r| r.err())
            .unwrap()
            .into_inner();
        assert_eq!(err, Error::Unbalanced { offset: at });
    }
}
