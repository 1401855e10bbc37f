// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Flattened Image Tree (FIT) verification.
//!
//! A FIT image is a flattened device tree with two well-known subtrees:
//! `/images`, whose children each carry one payload in a `data` property,
//! and `/configurations`, whose children select one image per role
//! (`kernel`, `fdt`, `ramdisk`, ...) by unit name.
//!
//! Everything starts with a [`Session`], which owns the FIT blob. From it,
//! a [`Configuration`] is chosen (by name, or by scoring each
//! configuration's `compatible` list against the running machine), and
//! images are then opened through it. How much verification happens along
//! the way is controlled by a [`VerifyPolicy`]:
//!
//! - Images opened through a configuration are checked against their
//!   `hash-1` node.
//! - Images opened on their own are checked against their `signature-1`
//!   node, a signature over the payload itself.
//! - Configurations are checked against their `signature*` nodes, each a
//!   signature over a selected set of regions of the tree; see
//!   [`region`].

use alloc::string::String;
use alloc::string::ToString as _;
use core::fmt;

use crate::crypto::hash;
use crate::fdt;
use crate::fdt::Node;
use crate::fdt::Property;

pub mod config;
pub mod image;
pub mod policy;
pub mod region;
pub mod session;
pub mod signature;

#[cfg(test)]
mod fixtures;

pub use config::Configuration;
pub use image::ResolvedImage;
pub use policy::VerifyPolicy;
pub use session::Options;
pub use session::Session;

/// The property holding an image's payload.
///
/// Its value is never part of a configuration signature; the image's own
/// hash covers it instead.
pub const IMAGE_DATA: &str = "data";

/// Errors produced while opening and verifying a FIT image.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The underlying tree is malformed.
    Corrupt(fdt::Error),
    /// A required node or property is absent.
    NotFound {
        /// What kind of thing was being looked up.
        what: &'static str,
        /// The name or path that was looked up.
        name: String,
    },
    /// An image's payload does not match its hash node.
    HashMismatch {
        /// Path of the hash node.
        node: String,
    },
    /// No trusted key verifies a signature node.
    SignatureMismatch {
        /// Path of the signature node.
        node: String,
    },
    /// A hash or signature node names an algorithm that is not supported.
    UnsupportedAlgorithm(String),
    /// An image's `compression` is not supported by the decompressor.
    UnsupportedCompression(String),
    /// An address property is wider than a `usize`.
    UnsupportedAddress {
        /// The width of the property, in bytes.
        len: usize,
    },
    /// An image's payload could not be decompressed.
    DecompressionFailed(String),
    /// A property is present but its value is malformed.
    InvalidValue {
        /// Path of the node holding the property.
        node: String,
        /// Name of the property.
        property: &'static str,
    },
    /// The hash engine failed.
    Hash(hash::Error),
    /// The FIT image could not be read from the filesystem.
    #[cfg(feature = "std")]
    Io(std::io::ErrorKind),
}

impl Error {
    /// Returns whether this error indicates a malformed FIT image, which
    /// must never be retried.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupt(_) | Self::InvalidValue { .. })
    }

    /// Returns whether this error is a [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<fdt::Error> for Error {
    fn from(e: fdt::Error) -> Self {
        Self::Corrupt(e)
    }
}

impl From<hash::Error> for Error {
    fn from(e: hash::Error) -> Self {
        Self::Hash(e)
    }
}

debug_from!(Error => fdt::Error, hash::Error);

#[cfg(feature = "std")]
impl From<std::io::Error> for crate::Error<Error> {
    fn from(e: std::io::Error) -> Self {
        fail!(Error::Io(e.kind()))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Corrupt(e) => write!(f, "corrupt FIT image: {}", e),
            Self::NotFound { what, name } => {
                write!(f, "{} not found: {}", what, name)
            }
            Self::HashMismatch { node } => write!(f, "{}: hash BAD", node),
            Self::SignatureMismatch { node } => {
                write!(f, "{}: signature BAD", node)
            }
            Self::UnsupportedAlgorithm(a) => {
                write!(f, "unsupported algorithm: {}", a)
            }
            Self::UnsupportedCompression(c) => {
                write!(f, "unsupported compression: {}", c)
            }
            Self::UnsupportedAddress { len } => {
                write!(f, "unsupported address width: {} bytes", len)
            }
            Self::DecompressionFailed(c) => {
                write!(f, "failed to decompress {} payload", c)
            }
            Self::InvalidValue { node, property } => {
                write!(f, "{}: invalid `{}` property", node, property)
            }
            Self::Hash(e) => write!(f, "hash engine failure: {:?}", e),
            #[cfg(feature = "std")]
            Self::Io(kind) => write!(f, "i/o error: {:?}", kind),
        }
    }
}

/// Looks up a required property of `node`.
fn property<'t>(
    node: Node<'t>,
    name: &'static str,
) -> crate::Result<Property<'t>, Error> {
    node.property(name).ok_or_else(|| {
        fail!(Error::NotFound {
            what: "property",
            name: property_path(node, name),
        })
    })
}

/// Looks up a required string property of `node`.
fn string<'t>(
    node: Node<'t>,
    name: &'static str,
) -> crate::Result<&'t str, Error> {
    property(node, name)?.as_str().ok_or_else(|| {
        fail!(Error::InvalidValue {
            node: node.path(),
            property: name,
        })
    })
}

/// Looks up a required child of `node`.
fn child<'t>(
    node: Node<'t>,
    what: &'static str,
    name: &str,
) -> crate::Result<Node<'t>, Error> {
    node.child(name).ok_or_else(|| {
        fail!(Error::NotFound {
            what,
            name: name.to_string(),
        })
    })
}

fn property_path(node: Node, name: &str) -> String {
    let mut path = node.path();
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(name);
    path
}
