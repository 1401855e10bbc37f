// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The unflattened node hierarchy.
//!
//! A [`Tree`] does not borrow the blob it was parsed from; it only records
//! offsets into it. [`Node`] and [`Property`] handles pair a tree with its
//! blob again, so that both can be owned side by side by one session.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::OnceCell;
use core::fmt;
use core::str;

use byteorder::ByteOrder as _;
use byteorder::BE;

use crate::fdt::BoundedCursor;
use crate::fdt::Error;
use crate::fdt::TokenKind;
use crate::fdt::COMPATIBLE_MAX_SCORE;
use crate::fdt::PROP_HEADER_SIZE;
use crate::fdt::TAG_SIZE;
use crate::Result;

/// A byte range within the blob.
#[derive(Copy, Clone, Debug)]
struct Span {
    start: usize,
    len: usize,
}

impl Span {
    fn of<'a>(self, blob: &'a [u8]) -> &'a [u8] {
        self.start
            .checked_add(self.len)
            .and_then(|end| blob.get(self.start..end))
            .unwrap_or_default()
    }

    fn str_of<'a>(self, blob: &'a [u8]) -> &'a str {
        str::from_utf8(self.of(blob)).unwrap_or_default()
    }
}

struct RawProp {
    name: Span,
    value: Span,
}

struct RawNode {
    name: Span,
    parent: Option<usize>,
    children: Vec<usize>,
    props: Vec<RawProp>,
    attached: OnceCell<Box<[u8]>>,
}

impl RawNode {
    fn new(name: Span, parent: Option<usize>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            props: Vec::new(),
            attached: OnceCell::new(),
        }
    }
}

/// An unflattened device tree.
pub struct Tree {
    nodes: Vec<RawNode>,
}

impl Tree {
    /// Unflattens the tree in `blob`.
    ///
    /// Besides the bounds checks performed by [`BoundedCursor`], this
    /// rejects a non-empty root name, empty or `$`-prefixed node names,
    /// `$`-prefixed property names, and unbalanced `END_NODE` tags.
    pub fn parse(blob: &[u8]) -> Result<Self, Error> {
        let cursor = BoundedCursor::from_blob(blob)?;
        let mut nodes = Vec::new();
        nodes.push(RawNode::new(
            Span {
                start: cursor.struct_start(),
                len: 0,
            },
            None,
        ));

        let mut open: Vec<usize> = Vec::new();
        let mut root_seen = false;
        for token in cursor.tokens() {
            let token = token?;
            let offset = token.offset;
            match token.kind {
                TokenKind::BeginNode { name } => {
                    let span = Span {
                        start: offset + TAG_SIZE,
                        len: name.len(),
                    };
                    let index = match open.last() {
                        None => {
                            check!(!root_seen, Error::Unbalanced { offset });
                            check!(name.is_empty(), Error::BadName { offset });
                            root_seen = true;
                            nodes[0].name = span;
                            0
                        }
                        Some(&parent) => {
                            check!(
                                !name.is_empty() && !is_reserved(name),
                                Error::BadName { offset }
                            );
                            let index = nodes.len();
                            nodes.push(RawNode::new(span, Some(parent)));
                            nodes[parent].children.push(index);
                            index
                        }
                    };
                    open.push(index);
                }
                TokenKind::EndNode => {
                    open.pop()
                        .ok_or_else(|| fail!(Error::Unbalanced { offset }))?;
                }
                TokenKind::Prop { name, value } => {
                    let &node = open
                        .last()
                        .ok_or_else(|| fail!(Error::Unbalanced { offset }))?;
                    check!(!is_reserved(name), Error::BadName { offset });
                    let name_off = cursor.u32_at(offset + 8)? as usize;
                    nodes[node].props.push(RawProp {
                        name: Span {
                            start: cursor.strings_start() + name_off,
                            len: name.len(),
                        },
                        value: Span {
                            start: offset + PROP_HEADER_SIZE,
                            len: value.len(),
                        },
                    });
                }
                TokenKind::Nop | TokenKind::End => {}
            }
        }

        Ok(Tree { nodes })
    }

    /// Returns the number of nodes in the tree, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the tree holds nothing but an empty root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].props.is_empty()
    }

    /// Returns the root node, reading names and values from `blob`.
    ///
    /// `blob` must be the buffer this tree was parsed from.
    pub fn root<'t>(&'t self, blob: &'t [u8]) -> Node<'t> {
        self.node(blob, 0)
    }

    /// Returns the node with the given index.
    ///
    /// Indices come from [`Node::index()`]; an out-of-range index yields
    /// the root.
    pub fn node<'t>(&'t self, blob: &'t [u8], index: usize) -> Node<'t> {
        let index = if index < self.nodes.len() { index } else { 0 };
        Node {
            blob,
            tree: self,
            index,
        }
    }
}

fn is_reserved(name: &str) -> bool {
    name.starts_with('$')
}

/// Scores the first entry of `list` accepted by `matches`.
fn score<'a>(
    list: impl Iterator<Item = &'a str>,
    mut matches: impl FnMut(&str) -> bool,
) -> i32 {
    for (index, entry) in list.enumerate() {
        if matches(entry) {
            let penalty = index
                .saturating_mul(4)
                .min(COMPATIBLE_MAX_SCORE as usize);
            return COMPATIBLE_MAX_SCORE - penalty as i32;
        }
    }
    0
}

/// A node in a [`Tree`].
#[derive(Copy, Clone)]
pub struct Node<'t> {
    blob: &'t [u8],
    tree: &'t Tree,
    index: usize,
}

impl<'t> Node<'t> {
    fn raw(self) -> &'t RawNode {
        &self.tree.nodes[self.index]
    }

    fn at(self, index: usize) -> Node<'t> {
        Node { index, ..self }
    }

    /// Returns this node's index in its tree.
    pub fn index(self) -> usize {
        self.index
    }

    /// Returns this node's full name, including any unit address.
    ///
    /// The root's name is empty.
    pub fn name(self) -> &'t str {
        self.raw().name.str_of(self.blob)
    }

    /// Returns this node's parent, if it is not the root.
    pub fn parent(self) -> Option<Node<'t>> {
        self.raw().parent.map(|p| self.at(p))
    }

    /// Returns an iterator over this node's children, in document order.
    pub fn children(self) -> impl Iterator<Item = Node<'t>> + 't {
        self.raw().children.iter().map(move |&i| self.at(i))
    }

    /// Finds the first child whose full name matches `name`, ignoring ASCII
    /// case.
    pub fn child(self, name: &str) -> Option<Node<'t>> {
        self.children().find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Returns whether this node's name starts with `prefix`.
    pub fn has_prefix(self, prefix: &str) -> bool {
        self.name().starts_with(prefix)
    }

    /// Returns an iterator over this node's properties, in document order.
    pub fn properties(self) -> impl Iterator<Item = Property<'t>> + 't {
        let blob = self.blob;
        self.raw().props.iter().map(move |p| Property {
            name: p.name.str_of(blob),
            value: p.value.of(blob),
        })
    }

    /// Finds the property named exactly `name`.
    pub fn property(self, name: &str) -> Option<Property<'t>> {
        self.properties().find(|p| p.name == name)
    }

    /// Returns whether this node has a property named `name`.
    pub fn has_property(self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Scores how well this node's `compatible` list matches `compat`.
    ///
    /// A match on the first entry scores [`COMPATIBLE_MAX_SCORE`]; each
    /// later position scores four less. Entries are compared ignoring ASCII
    /// case. No match, or no `compatible` property, scores zero.
    pub fn compatible_score(self, compat: &str) -> i32 {
        match self.property("compatible") {
            Some(p) => score(p.strings(), |s| s.eq_ignore_ascii_case(compat)),
            None => 0,
        }
    }

    /// Returns this node's absolute path, such as `/images/kernel`.
    pub fn path(self) -> String {
        let mut names = Vec::new();
        let mut node = self;
        while let Some(parent) = node.parent() {
            names.push(node.name());
            node = parent;
        }
        if names.is_empty() {
            return String::from("/");
        }
        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        path
    }

    /// Returns the data previously attached to this node with
    /// [`Node::attach_with()`].
    pub fn attached(self) -> Option<&'t [u8]> {
        self.raw().attached.get().map(|b| &**b)
    }

    /// Attaches the output of `f` to this node, unless data is already
    /// attached, and returns the attached data.
    ///
    /// Once data is attached, `f` is never called again; if it fails,
    /// nothing is attached.
    pub fn attach_with<E>(
        self,
        f: impl FnOnce() -> core::result::Result<Vec<u8>, E>,
    ) -> core::result::Result<&'t [u8], E> {
        let cell = &self.raw().attached;
        if let Some(data) = cell.get() {
            return Ok(data);
        }
        let data = f()?;
        Ok(cell.get_or_init(|| data.into_boxed_slice()))
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A property of a [`Node`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Property<'t> {
    name: &'t str,
    value: &'t [u8],
}

impl<'t> Property<'t> {
    /// Returns the property's name.
    pub fn name(self) -> &'t str {
        self.name
    }

    /// Returns the property's raw value.
    pub fn value(self) -> &'t [u8] {
        self.value
    }

    /// Reads the value as a single string.
    ///
    /// The value must contain a NUL terminator; anything after the first
    /// one is ignored. Returns `None` for unterminated or non-UTF-8 values.
    pub fn as_str(self) -> Option<&'t str> {
        let len = self.value.iter().position(|&b| b == 0)?;
        str::from_utf8(&self.value[..len]).ok()
    }

    /// Returns an iterator over the value read as a list of strings.
    pub fn strings(self) -> Strings<'t> {
        Strings { rest: self.value }
    }

    /// Reads the `index`th big-endian 32-bit cell of the value.
    pub fn u32_at(self, index: usize) -> Option<u32> {
        let start = index.checked_mul(4)?;
        let cell = self.value.get(start..start.checked_add(4)?)?;
        Some(BE::read_u32(cell))
    }
}

/// An iterator over a NUL-separated string list; see
/// [`Property::strings()`].
///
/// Iteration stops at the first unterminated or non-UTF-8 entry.
#[derive(Clone, Debug)]
pub struct Strings<'t> {
    rest: &'t [u8],
}

impl<'t> Iterator for Strings<'t> {
    type Item = &'t str;

    fn next(&mut self) -> Option<&'t str> {
        let len = self.rest.iter().position(|&b| b == 0)?;
        let (entry, rest) = self.rest.split_at(len);
        self.rest = &rest[1..];
        match str::from_utf8(entry) {
            Ok(s) => Some(s),
            Err(_) => {
                self.rest = &[];
                None
            }
        }
    }
}

/// Scores how well the root `compatible` list of the flattened tree in
/// `blob` matches `compat`, on the same scale as
/// [`Node::compatible_score()`].
///
/// Only the root node's properties are scanned, without unflattening the
/// tree, and entries are compared exactly. A malformed blob, or one whose
/// root has no `compatible` property before its first subnode, scores zero.
pub fn machine_is_compatible(blob: &[u8], compat: &str) -> i32 {
    let cursor = match BoundedCursor::from_blob(blob) {
        Ok(c) => c,
        Err(_) => return 0,
    };

    let mut in_root = false;
    for token in cursor.tokens() {
        match token.map(|t| t.kind) {
            Ok(TokenKind::Nop) => {}
            Ok(TokenKind::BeginNode { name })
                if !in_root && name.is_empty() =>
            {
                in_root = true
            }
            Ok(TokenKind::Prop { name, value }) if in_root => {
                if name == "compatible" {
                    return score(Strings { rest: value }, |s| s == compat);
                }
            }
            _ => return 0,
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use pretty_assertions::assert_eq;
    use testutil::fdt::FdtWriter;

    fn sample() -> Vec<u8> {
        let mut w = FdtWriter::new();
        w.begin_node("");
        w.prop_str("description", "sample");
        w.begin_node("images");
        w.begin_node("kernel");
        w.prop_str("type", "kernel");
        w.prop_cells("load", &[0x8000_0000]);
        w.begin_node("hash-1");
        w.end_node();
        w.end_node();
        w.end_node();
        w.begin_node("configurations");
        w.prop_str("default", "conf-1");
        w.begin_node("conf-1");
        w.prop_strs("compatible", &["acme,board-v2", "acme,board"]);
        w.prop("empty", &[]);
        w.end_node();
        w.end_node();
        w.end_node();
        w.finish()
    }

    #[test]
    fn navigate() {
        let blob = sample();
        let tree = Tree::parse(&blob).unwrap();
        assert_eq!(tree.len(), 6);
        assert!(!tree.is_empty());

        let root = tree.root(&blob);
        assert_eq!(root.name(), "");
        assert_eq!(root.path(), "/");
        assert!(root.parent().is_none());
        assert_eq!(
            root.property("description").unwrap().as_str(),
            Some("sample")
        );

        let names = root.children().map(|c| c.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["images", "configurations"]);

        let kernel = root.child("IMAGES").unwrap().child("Kernel").unwrap();
        assert_eq!(kernel.path(), "/images/kernel");
        assert_eq!(kernel.parent().unwrap().name(), "images");
        assert_eq!(
            kernel.property("load").unwrap().u32_at(0),
            Some(0x8000_0000)
        );
        assert_eq!(kernel.property("load").unwrap().u32_at(1), None);
        assert!(kernel.property("Type").is_none());
        assert!(kernel.child("hash-1").unwrap().has_prefix("hash"));

        let node = tree.node(&blob, kernel.index());
        assert_eq!(node.path(), "/images/kernel");
    }

    #[test]
    fn strings_and_scores() {
        let blob = sample();
        let tree = Tree::parse(&blob).unwrap();
        let conf = tree
            .root(&blob)
            .child("configurations")
            .unwrap()
            .child("conf-1")
            .unwrap();

        let compat = conf.property("compatible").unwrap();
        assert_eq!(
            compat.strings().collect::<Vec<_>>(),
            vec!["acme,board-v2", "acme,board"]
        );
        assert_eq!(compat.as_str(), Some("acme,board-v2"));
        assert_eq!(conf.property("empty").unwrap().as_str(), None);
        assert_eq!(conf.property("empty").unwrap().strings().count(), 0);

        assert_eq!(
            conf.compatible_score("acme,board-v2"),
            COMPATIBLE_MAX_SCORE
        );
        assert_eq!(
            conf.compatible_score("ACME,Board"),
            COMPATIBLE_MAX_SCORE - 4
        );
        assert_eq!(conf.compatible_score("acme,board-v3"), 0);
        assert_eq!(conf.compatible_score("acme"), 0);
    }

    #[test]
    fn unterminated_string_list() {
        let mut w = FdtWriter::new();
        w.begin_node("");
        w.prop("list", b"one\0two\0three");
        w.end_node();
        let blob = w.finish();
        let tree = Tree::parse(&blob).unwrap();
        let list = tree.root(&blob).property("list").unwrap();
        assert_eq!(list.strings().collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn attach_once() {
        let blob = sample();
        let tree = Tree::parse(&blob).unwrap();
        let kernel = tree.root(&blob).child("images").unwrap();
        let calls = Cell::new(0);

        assert!(kernel.attached().is_none());
        let failed: core::result::Result<&[u8], ()> = kernel.attach_with(|| {
            calls.set(calls.get() + 1);
            Err(())
        });
        assert!(failed.is_err());
        assert!(kernel.attached().is_none());

        for _ in 0..2 {
            let data = kernel
                .attach_with::<()>(|| {
                    calls.set(calls.get() + 1);
                    Ok(vec![1, 2, 3])
                })
                .unwrap();
            assert_eq!(data, &[1, 2, 3]);
        }
        assert_eq!(calls.get(), 2);
        assert_eq!(kernel.attached(), Some(&[1u8, 2, 3][..]));
    }

    fn parse_err(build: impl FnOnce(&mut FdtWriter)) -> Error {
        let mut w = FdtWriter::new();
        build(&mut w);
        let blob = w.finish();
        match Tree::parse(&blob) {
            Ok(_) => panic!("tree parsed unexpectedly"),
            Err(e) => e.into_inner(),
        }
    }

    #[test]
    fn rejects_bad_names() {
        let err = parse_err(|w| {
            w.begin_node("root");
            w.end_node();
        });
        assert!(matches!(err, Error::BadName { .. }));

        let err = parse_err(|w| {
            w.begin_node("");
            w.begin_node("");
            w.end_node();
            w.end_node();
        });
        assert!(matches!(err, Error::BadName { .. }));

        let err = parse_err(|w| {
            w.begin_node("");
            w.begin_node("$hidden");
            w.end_node();
            w.end_node();
        });
        assert!(matches!(err, Error::BadName { .. }));

        let err = parse_err(|w| {
            w.begin_node("");
            w.prop("$uncompressed-data", &[0]);
            w.end_node();
        });
        assert!(matches!(err, Error::BadName { .. }));
    }

    #[test]
    fn rejects_unbalanced() {
        let err = parse_err(|w| {
            w.begin_node("");
            w.end_node();
            w.end_node();
        });
        assert!(matches!(err, Error::Unbalanced { .. }));

        let err = parse_err(|w| {
            w.prop("orphan", &[]);
        });
        assert!(matches!(err, Error::Unbalanced { .. }));

        let err = parse_err(|w| {
            w.begin_node("");
            w.end_node();
            w.begin_node("");
            w.end_node();
        });
        assert!(matches!(err, Error::Unbalanced { .. }));
    }

    #[test]
    fn empty_structure() {
        let blob = FdtWriter::new().finish();
        let tree = Tree::parse(&blob).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root(&blob).children().count(), 0);
    }

    fn machine(compatible: Option<&[&str]>, child_first: bool) -> Vec<u8> {
        let mut w = FdtWriter::new();
        w.begin_node("");
        w.nop();
        if child_first {
            w.begin_node("chosen");
            w.end_node();
        }
        w.prop_str("model", "Acme Board");
        if let Some(list) = compatible {
            w.prop_strs("compatible", list);
        }
        w.end_node();
        w.finish()
    }

    #[test]
    fn embedded_machine_compatible() {
        let blob = machine(Some(&["acme,board-v2", "acme,board"]), false);
        assert_eq!(
            machine_is_compatible(&blob, "acme,board-v2"),
            COMPATIBLE_MAX_SCORE
        );
        assert_eq!(
            machine_is_compatible(&blob, "acme,board"),
            COMPATIBLE_MAX_SCORE - 4
        );
        // Unlike node matching, this comparison is exact.
        assert_eq!(machine_is_compatible(&blob, "ACME,board"), 0);

        let blob = machine(None, false);
        assert_eq!(machine_is_compatible(&blob, "acme,board"), 0);

        let blob = machine(Some(&["acme,board"]), true);
        assert_eq!(machine_is_compatible(&blob, "acme,board"), 0);

        assert_eq!(machine_is_compatible(b"not a tree", "acme,board"), 0);
    }
}
