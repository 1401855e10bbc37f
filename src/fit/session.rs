// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! FIT sessions.
//!
//! A [`Session`] owns (or borrows) one FIT blob together with the parsed
//! tree over it, and everything needed to verify what is read from it: the
//! [`VerifyPolicy`], the trusted keys, a hash engine, and a decompressor.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use core::cell::RefCell;
use core::cell::RefMut;

use crate::compress::Decompress;
use crate::crypto::hash;
use crate::crypto::sig::KeyStore;
use crate::fdt::Node;
use crate::fdt::Tree;
use crate::fit::child;
use crate::fit::signature::SignatureVerifier;
use crate::fit::Error;
use crate::fit::VerifyPolicy;
use crate::Result;

#[cfg(feature = "std")]
use std::path::Path;

/// Options for opening a [`Session`].
pub struct Options<'a> {
    policy: VerifyPolicy,
    verbose: bool,
    keys: &'a dyn KeyStore,
    decompressor: &'a dyn Decompress,
    machine: &'a [&'a str],
    engine: Box<dyn hash::Engine + 'a>,
}

impl<'a> Options<'a> {
    /// Creates options that verify according to `policy`, trusting `keys`,
    /// and hashing with `ring`.
    #[cfg(feature = "ring")]
    pub fn new(policy: VerifyPolicy, keys: &'a dyn KeyStore) -> Self {
        let engine = crate::crypto::ring::hash::Engine::new();
        Self::with_engine(policy, keys, engine)
    }

    /// Creates options that verify according to `policy`, trusting `keys`,
    /// and hashing with `engine`.
    pub fn with_engine(
        policy: VerifyPolicy,
        keys: &'a dyn KeyStore,
        engine: impl hash::Engine + 'a,
    ) -> Self {
        Self {
            policy,
            verbose: false,
            keys,
            decompressor: default_decompressor(),
            machine: &[],
            engine: Box::new(engine),
        }
    }

    /// Sets whether every hash and key check is logged as it happens.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the running machine's `compatible` list, most specific first.
    ///
    /// Configurations are scored against every entry when none is named
    /// explicitly. With an empty list, which is the default, the
    /// configurations node's `default` is always used.
    pub fn machine(mut self, compatible: &'a [&'a str]) -> Self {
        self.machine = compatible;
        self
    }

    /// Sets the decompressor used for compressed image payloads.
    ///
    /// Defaults to [`compress::gzip::Flate`](crate::compress::gzip::Flate)
    /// when the `std` feature is enabled, and to
    /// [`compress::Unsupported`](crate::compress::Unsupported) otherwise.
    pub fn decompressor(mut self, decompressor: &'a dyn Decompress) -> Self {
        self.decompressor = decompressor;
        self
    }
}

#[cfg(feature = "std")]
fn default_decompressor() -> &'static dyn Decompress {
    &crate::compress::gzip::Flate
}

#[cfg(not(feature = "std"))]
fn default_decompressor() -> &'static dyn Decompress {
    &crate::compress::Unsupported
}

/// An open FIT image.
///
/// Nodes, configurations, and images obtained from a session borrow it,
/// and so cannot outlive it; data decompressed while opening images lives
/// as long as the session does.
pub struct Session<'a> {
    blob: Cow<'a, [u8]>,
    tree: Tree,
    images: usize,
    configurations: Option<usize>,

    pub(super) policy: VerifyPolicy,
    pub(super) verbose: bool,
    pub(super) keys: &'a dyn KeyStore,
    pub(super) decompressor: &'a dyn Decompress,
    pub(super) machine: &'a [&'a str],
    engine: RefCell<Box<dyn hash::Engine + 'a>>,
}

impl<'a> Session<'a> {
    /// Opens the FIT image in `blob`.
    ///
    /// This parses the whole tree up front, so a structurally corrupt blob
    /// is rejected here. Nothing is verified yet.
    pub fn open(
        blob: impl Into<Cow<'a, [u8]>>,
        options: Options<'a>,
    ) -> Result<Self, Error> {
        let blob = blob.into();
        let tree = Tree::parse(&blob)?;

        let root = tree.root(&blob);
        info!(
            "Opened FIT image: {}",
            root.property("description")
                .and_then(|p| p.as_str())
                .unwrap_or("(no description)")
        );
        let images = child(root, "node", "images")?.index();
        let configurations = root.child("configurations").map(Node::index);

        Ok(Self {
            blob,
            tree,
            images,
            configurations,
            policy: options.policy,
            verbose: options.verbose,
            keys: options.keys,
            decompressor: options.decompressor,
            machine: options.machine,
            engine: RefCell::new(options.engine),
        })
    }

    /// Opens the FIT image stored in the file at `path`.
    ///
    /// At most `max_size` bytes are read; anything past that is ignored,
    /// and will usually make the image fail to parse.
    #[cfg(feature = "std")]
    pub fn open_file(
        path: impl AsRef<Path>,
        options: Options<'a>,
        max_size: usize,
    ) -> Result<Self, Error> {
        use std::io::Read as _;

        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let len = file.metadata()?.len();
        if len > max_size as u64 {
            warn!(
                "{}: {} bytes, only reading the first {}",
                path.display(),
                len,
                max_size
            );
        }

        let mut blob = Vec::new();
        file.take(max_size as u64).read_to_end(&mut blob)?;
        Self::open(blob, options)
    }

    /// Closes this session, releasing the blob and all decompressed data.
    pub fn close(self) {}

    /// Returns the raw FIT blob.
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Returns the policy this session verifies with.
    pub fn policy(&self) -> VerifyPolicy {
        self.policy
    }

    /// Returns the root node of the FIT image.
    pub fn root(&self) -> Node<'_> {
        self.tree.root(&self.blob)
    }

    /// Returns the FIT image's `description`, if it has one.
    pub fn description(&self) -> Option<&str> {
        self.root().property("description").and_then(|p| p.as_str())
    }

    /// Returns the `/images` node.
    pub fn images(&self) -> Node<'_> {
        self.tree.node(&self.blob, self.images)
    }

    /// Returns the `/configurations` node, if present.
    pub fn configurations(&self) -> Option<Node<'_>> {
        self.configurations.map(|i| self.tree.node(&self.blob, i))
    }

    /// Returns the unit names of every image, in document order.
    pub fn image_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.images().children().map(Node::name)
    }

    /// Returns the unit names of every configuration, in document order.
    pub fn configuration_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.configurations()
            .into_iter()
            .flat_map(|c| c.children())
            .map(Node::name)
    }

    pub(super) fn verifier(&self) -> SignatureVerifier<'a> {
        SignatureVerifier::new(self.keys, self.verbose)
    }

    pub(super) fn engine(&self) -> RefMut<'_, Box<dyn hash::Engine + 'a>> {
        self.engine.borrow_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sig::NoKeys;
    use pretty_assertions::assert_eq;
    use testutil::fdt::FdtWriter;

    fn fit(description: Option<&str>, with_configs: bool) -> Vec<u8> {
        let mut w = FdtWriter::new();
        w.begin_node("");
        if let Some(d) = description {
            w.prop_str("description", d);
        }
        w.begin_node("images");
        w.begin_node("kernel");
        w.end_node();
        w.begin_node("fdt-1");
        w.end_node();
        w.end_node();
        if with_configs {
            w.begin_node("configurations");
            w.begin_node("conf-1");
            w.end_node();
            w.begin_node("conf-2");
            w.end_node();
            w.end_node();
        }
        w.end_node();
        w.finish()
    }

    #[test]
    fn open_borrowed() {
        let blob = fit(Some("test image"), true);
        let session =
            Session::open(&blob[..], Options::new(VerifyPolicy::None, &NoKeys))
                .unwrap();
        assert_eq!(session.description(), Some("test image"));
        assert_eq!(session.blob(), &blob[..]);
        assert_eq!(session.policy(), VerifyPolicy::None);
        assert_eq!(session.images().path(), "/images");
        assert_eq!(
            session.image_names().collect::<Vec<_>>(),
            vec!["kernel", "fdt-1"]
        );
        assert_eq!(
            session.configuration_names().collect::<Vec<_>>(),
            vec!["conf-1", "conf-2"]
        );
        session.close();
    }

    #[test]
    fn open_owned_without_configurations() {
        let blob = fit(None, false);
        let session =
            Session::open(blob, Options::new(VerifyPolicy::BestEffort, &NoKeys))
                .unwrap();
        assert_eq!(session.description(), None);
        assert!(session.configurations().is_none());
        assert_eq!(session.configuration_names().count(), 0);
    }

    #[test]
    fn missing_images() {
        let mut w = FdtWriter::new();
        w.begin_node("");
        w.begin_node("configurations");
        w.end_node();
        w.end_node();
        let blob = w.finish();

        let err = Session::open(blob, Options::new(VerifyPolicy::None, &NoKeys))
            .err()
            .unwrap()
            .into_inner();
        assert_eq!(
            err,
            Error::NotFound {
                what: "node",
                name: "images".into()
            }
        );
    }

    #[test]
    fn corrupt() {
        let mut blob = fit(None, true);
        blob[0] ^= 0xff;
        let err = Session::open(blob, Options::new(VerifyPolicy::None, &NoKeys))
            .err()
            .unwrap()
            .into_inner();
        assert!(err.is_corruption());
    }

    #[test]
    fn open_file() {
        let blob = fit(Some("from disk"), true);
        let path = std::env::temp_dir()
            .join(format!("fitverify-session-{}.itb", std::process::id()));
        std::fs::write(&path, &blob).unwrap();

        let session = Session::open_file(
            &path,
            Options::new(VerifyPolicy::None, &NoKeys),
            1 << 20,
        )
        .unwrap();
        assert_eq!(session.description(), Some("from disk"));
        drop(session);

        // Truncation is not an I/O error, but the header no longer fits.
        let err = Session::open_file(
            &path,
            Options::new(VerifyPolicy::None, &NoKeys),
            blob.len() - 1,
        )
        .err()
        .unwrap()
        .into_inner();
        assert!(err.is_corruption());
        std::fs::remove_file(&path).unwrap();

        let err = Session::open_file(
            &path,
            Options::new(VerifyPolicy::None, &NoKeys),
            1 << 20,
        )
        .err()
        .unwrap()
        .into_inner();
        assert_eq!(err, Error::Io(std::io::ErrorKind::NotFound));
    }
}
