// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Signature node verification.
//!
//! A signature node looks like this:
//!
//! ```text
//! signature-1 {
//!     algo = "sha256,rsa2048";
//!     key-name-hint = "dev";
//!     value = <...>;
//!     /* Only for signatures over a configuration: */
//!     hashed-nodes = "/", "/configurations/conf-1", "/images/kernel", ...;
//!     hashed-strings = <0 0x9c>;
//! };
//! ```

use alloc::vec::Vec;

use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::crypto::sig::KeyStore;
use crate::crypto::sig::KeyStoreExt as _;
use crate::crypto::sig::PublicKey;
use crate::fdt::BoundedCursor;
use crate::fdt::Node;
use crate::fit::property;
use crate::fit::region::InclusionSpec;
use crate::fit::region::RegionDigestWalker;
use crate::fit::string;
use crate::fit::Error;
use crate::fit::IMAGE_DATA;
use crate::Result;

/// Checks signature nodes against a [`KeyStore`].
#[derive(Copy, Clone)]
pub struct SignatureVerifier<'k> {
    keys: &'k dyn KeyStore,
    verbose: bool,
}

impl<'k> SignatureVerifier<'k> {
    /// Creates a verifier that trusts `keys`.
    ///
    /// When `verbose` is set, the outcome of every key tried is logged.
    pub fn new(keys: &'k dyn KeyStore, verbose: bool) -> Self {
        Self { keys, verbose }
    }

    /// Reads the digest algorithm from a signature node's `algo` property.
    ///
    /// Only the part before the first comma is looked at, and only SHA-1
    /// and SHA-256 are accepted.
    pub fn algo(node: Node) -> Result<hash::Algo, Error> {
        let algo = string(node, "algo")?;
        let algo_match = if algo.starts_with("sha1,") {
            Some(hash::Algo::Sha1)
        } else if algo.starts_with("sha256,") {
            Some(hash::Algo::Sha256)
        } else {
            None
        };
        algo_match.ok_or_else(|| {
            fail!(
                Error::UnsupportedAlgorithm(algo.into()),
                "{}: unsupported signature algorithm: {}",
                node.path(),
                algo,
            )
        })
    }

    /// Checks the signature in `node` against `digest`, which was computed
    /// with `algo`.
    ///
    /// The key named by `key-name-hint` is tried first, then every other
    /// key in the store; keys sharing the hint are not tried twice.
    pub fn check(
        &self,
        node: Node,
        algo: hash::Algo,
        digest: &[u8],
    ) -> Result<(), Error> {
        let signature = property(node, "value")?.value();
        let hint = node.property("key-name-hint").and_then(|p| p.as_str());

        if let Some(key) = hint.and_then(|h| self.keys.find(h)) {
            if self.try_key(node, key, signature, digest, algo) {
                return Ok(());
            }
        }

        for key in self.keys.keys() {
            if hint.is_some() && key.name_hint() == hint {
                continue;
            }
            if self.try_key(node, key, signature, digest, algo) {
                return Ok(());
            }
        }

        let reason = if self.keys.key(0).is_none() {
            "no built-in keys"
        } else {
            "verification failed"
        };
        Err(fail!(
            Error::SignatureMismatch { node: node.path() },
            "image signature BAD: {}",
            reason,
        ))
    }

    fn try_key(
        &self,
        node: Node,
        key: &dyn PublicKey,
        signature: &[u8],
        digest: &[u8],
        algo: hash::Algo,
    ) -> bool {
        let ok = key.verify(signature, digest, algo).is_ok();
        if self.verbose {
            info!(
                "{}: key {} {}",
                node.path(),
                key.name_hint().unwrap_or("<anonymous>"),
                if ok { "OK" } else { "BAD" },
            );
        }
        ok
    }

    /// Verifies a signature over selected regions of the tree in `blob`.
    ///
    /// The regions are chosen by `node`'s `hashed-nodes` and
    /// `hashed-strings` properties; image payloads are never included.
    pub fn verify_subtree(
        &self,
        node: Node,
        blob: &[u8],
        engine: &mut dyn hash::Engine,
    ) -> Result<(), Error> {
        let algo = Self::algo(node)?;

        let strings = property(node, "hashed-strings")?;
        let (start, size) = match (strings.u32_at(0), strings.u32_at(1)) {
            (Some(start), Some(size)) => (start as usize, size as usize),
            _ => {
                return Err(fail!(Error::InvalidValue {
                    node: node.path(),
                    property: "hashed-strings",
                }))
            }
        };
        let included = property(node, "hashed-nodes")?
            .strings()
            .collect::<Vec<_>>();

        let spec = InclusionSpec::new(
            included,
            alloc::vec![IMAGE_DATA],
            (start, size),
        );
        let cursor = BoundedCursor::from_blob(blob)?;
        let digest =
            RegionDigestWalker::new(cursor, &spec).digest(engine, algo)?;
        self.check(node, algo, digest.as_bytes())
    }

    /// Verifies a signature over `data` as a whole.
    pub fn verify_flat(
        &self,
        node: Node,
        data: &[u8],
        engine: &mut dyn hash::Engine,
    ) -> Result<(), Error> {
        let algo = Self::algo(node)?;
        let digest = engine.digest(algo, data)?;
        self.check(node, algo, digest.as_bytes())
    }
}
