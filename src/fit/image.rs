// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Image resolution.
//!
//! An image is a child of `/images` holding a payload in its `data`
//! property, along with a `type`, an optional `compression`, optional
//! `load` and `entry` addresses, and the nodes used to verify it:
//!
//! ```text
//! kernel {
//!     type = "kernel";
//!     compression = "gzip";
//!     data = [...];
//!     load = <0x80008000>;
//!     entry = <0x80008000>;
//!     hash-1 {
//!         algo = "sha256";
//!         value = [...];
//!     };
//! };
//! ```

use core::fmt;
use core::mem;

use crate::compress;
use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::fdt::Node;
use crate::fit::child;
use crate::fit::property;
use crate::fit::property_path;
use crate::fit::string;
use crate::fit::Configuration;
use crate::fit::Error;
use crate::fit::Session;
use crate::fit::IMAGE_DATA;
use crate::Result;

/// An image that has been verified and, if necessary, decompressed.
#[derive(Copy, Clone)]
pub struct ResolvedImage<'s> {
    node: Node<'s>,
    kind: &'s str,
    data: &'s [u8],
}

impl<'s> ResolvedImage<'s> {
    /// Returns the image's unit name.
    pub fn name(&self) -> &'s str {
        self.node.name()
    }

    /// Returns the image's node.
    pub fn node(&self) -> Node<'s> {
        self.node
    }

    /// Returns the image's `type`, such as `"kernel"` or `"flat_dt"`.
    pub fn kind(&self) -> &'s str {
        self.kind
    }

    /// Returns the image's payload, after decompression.
    pub fn data(&self) -> &'s [u8] {
        self.data
    }

    /// Returns the length of the payload, after decompression.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the address the image should be loaded at, if any.
    ///
    /// Fails if the address does not fit in a `usize`.
    pub fn load_address(&self) -> Result<Option<usize>, Error> {
        address(self.node, "load")
    }

    /// Returns the image's entry point, if any.
    ///
    /// Fails if the address does not fit in a `usize`.
    pub fn entry_point(&self) -> Result<Option<usize>, Error> {
        address(self.node, "entry")
    }
}

impl fmt::Debug for ResolvedImage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResolvedImage")
            .field("node", &self.node)
            .field("kind", &self.kind)
            .field("len", &self.data.len())
            .finish()
    }
}

impl<'a> Session<'a> {
    /// Opens the image `name`.
    ///
    /// If `config` is given, `name` is a role such as `"kernel"`, and the
    /// image is the one `config` selects for it; the image must then match
    /// its hash. Otherwise, `name` is the image's unit name, and the image
    /// must match its own signature. Either check is waived only as far as
    /// the session's policy allows.
    pub fn open_image<'s>(
        &'s self,
        config: Option<Configuration<'s>>,
        name: &str,
    ) -> Result<ResolvedImage<'s>, Error> {
        let node = self.resolve_unit(config, name)?;
        let desc = node.property("description").and_then(|p| p.as_str());
        if let (true, Some(desc)) = (self.verbose, desc) {
            info!("{}: {}", node.name(), desc);
        }

        let kind = string(node, "type")?;
        let raw = property(node, IMAGE_DATA)?.value();
        if config.is_some() {
            self.verify_image_hash(node, raw)?;
        } else {
            self.verify_image_signature(node, raw)?;
        }

        let data = self.decompress(node, kind, raw)?;
        Ok(ResolvedImage { node, kind, data })
    }

    /// Looks up the address in `property` of the image `name`, resolved as
    /// in [`Session::open_image()`].
    ///
    /// The image is not verified. Images of type `kernel_noload` have no
    /// addresses at all.
    pub fn image_address(
        &self,
        config: Option<Configuration<'_>>,
        name: &str,
        property: &str,
    ) -> Result<usize, Error> {
        let node = self.resolve_unit(config, name)?;
        address(node, property)?.ok_or_else(|| {
            fail!(Error::NotFound {
                what: "address",
                name: property_path(node, property),
            })
        })
    }

    /// Finds the image node for `name`, going through `config` if given.
    fn resolve_unit<'s>(
        &'s self,
        config: Option<Configuration<'s>>,
        name: &str,
    ) -> Result<Node<'s>, Error> {
        let unit = match config {
            Some(config) => {
                let redirect = config.node().property(name).ok_or_else(|| {
                    fail!(Error::NotFound {
                        what: "image",
                        name: property_path(config.node(), name),
                    })
                })?;
                redirect.as_str().ok_or_else(|| {
                    fail!(Error::InvalidValue {
                        node: config.node().path(),
                        property: "image reference",
                    })
                })?
            }
            None => name,
        };
        child(self.images(), "image", unit)
    }

    /// Checks `data` against the `hash-1` node of `image`, as the policy
    /// demands.
    pub(super) fn verify_image_hash(
        &self,
        image: Node,
        data: &[u8],
    ) -> Result<(), Error> {
        let check = self.policy.image_hash();
        if !check.enabled() {
            return Ok(());
        }
        let node = image.child("hash-1").or_else(|| image.child("hash@1"));
        let node = match node {
            Some(node) => node,
            None if check.required() => {
                return Err(fail!(
                    Error::NotFound {
                        what: "hash node",
                        name: image.path(),
                    },
                    "{}: hash-1 node not found",
                    image.name(),
                ))
            }
            None => return Ok(()),
        };

        let value = property(node, "value")?.value();
        let algo_name = string(node, "algo")?;
        let algo = hash::Algo::from_name(algo_name).ok_or_else(|| {
            fail!(Error::UnsupportedAlgorithm(algo_name.into()))
        })?;
        check!(
            value.len() == algo.bytes(),
            Error::InvalidValue {
                node: node.path(),
                property: "value",
            }
        );

        let mut guard = self.engine();
        let engine: &mut dyn hash::Engine = &mut **guard;
        let mut hasher = engine.new_hash(algo)?;
        hasher.write(data)?;
        match hasher.expect(value) {
            Ok(()) => {
                if self.verbose {
                    info!("{}: {} hash OK", image.name(), algo.name());
                }
                Ok(())
            }
            Err(e) if *e.as_ref() == hash::Error::Unspecified => Err(fail!(
                Error::HashMismatch { node: node.path() },
                "{}: {} hash BAD",
                image.name(),
                algo.name(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Checks `data` against the `signature-1` node of `image`, as the
    /// policy demands.
    fn verify_image_signature(
        &self,
        image: Node,
        data: &[u8],
    ) -> Result<(), Error> {
        let check = self.policy.image_signature();
        if !check.enabled() {
            return Ok(());
        }
        let node = image
            .child("signature-1")
            .or_else(|| image.child("signature@1"));
        let node = match node {
            Some(node) => node,
            None => {
                error!("{}: signature-1 node not found", image.name());
                if check.required() {
                    return Err(fail!(Error::NotFound {
                        what: "signature node",
                        name: image.path(),
                    }));
                }
                return Ok(());
            }
        };

        let mut engine = self.engine();
        self.verifier().verify_flat(node, data, &mut **engine)
    }

    /// Decompresses `raw`, the payload of `image`, caching the result in
    /// the image's node.
    fn decompress<'s>(
        &'s self,
        image: Node<'s>,
        kind: &str,
        raw: &'s [u8],
    ) -> Result<&'s [u8], Error> {
        let compression = match image.property("compression") {
            Some(p) => p.as_str().ok_or_else(|| {
                fail!(Error::InvalidValue {
                    node: image.path(),
                    property: "compression",
                })
            })?,
            None => return Ok(raw),
        };
        if compression == "none" {
            return Ok(raw);
        }
        if kind == "ramdisk" {
            warn!(
                "compression != \"none\" for ramdisks is deprecated, \
                 please fix your .its file!"
            );
            return Ok(raw);
        }

        image.attach_with(|| {
            self.decompressor
                .decompress(compression, raw)
                .map_err(|e| match e {
                    compress::Error::Unsupported => fail!(
                        Error::UnsupportedCompression(compression.into()),
                        "{}: unsupported compression: {}",
                        image.name(),
                        compression,
                    ),
                    compress::Error::Failed => fail!(
                        Error::DecompressionFailed(compression.into()),
                        "{}: failed to decompress {} payload",
                        image.name(),
                        compression,
                    ),
                })
        })
    }
}

/// Reads the address in `property` of `image`, if it has one.
fn address(image: Node, property: &str) -> Result<Option<usize>, Error> {
    let kind = image.property("type").and_then(|p| p.as_str());
    if kind == Some("kernel_noload") {
        return Ok(None);
    }
    let prop = match image.property(property) {
        Some(prop) => prop,
        None => return Ok(None),
    };

    let len = prop.value().len();
    check!(
        len <= mem::size_of::<usize>(),
        Error::UnsupportedAddress { len }
    );
    let address = (0..len / 4)
        .filter_map(|i| prop.u32_at(i))
        .fold(0u64, |acc, cell| (acc << 32) | u64::from(cell));
    Ok(Some(address as usize))
}
