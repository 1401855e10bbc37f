// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! FIT images for tests.
//!
//! Hashes are real SHA-256 digests; signatures are made with
//! [`fake::Key`]s, identified by their id.

use crate::crypto::fake;
use crate::crypto::hash::Algo;
use crate::crypto::ring;
use crate::fdt::BoundedCursor;
use crate::fit::region::InclusionSpec;
use crate::fit::region::RegionDigestWalker;
use crate::fit::IMAGE_DATA;
use testutil::fdt::FdtWriter;

/// A sixteen-byte kernel payload.
pub const KERNEL: &[u8] = b"\x7fELF kernel 0123";

/// The load and entry address of [`Image::kernel()`].
pub const KERNEL_ADDR: u32 = 0x8000_8000;

pub fn sha256(data: &[u8]) -> Vec<u8> {
    ::ring::digest::digest(&::ring::digest::SHA256, data)
        .as_ref()
        .to_vec()
}

/// Builds a bare device tree whose root has the given `compatible` list.
pub fn dtb(compatible: &[&str]) -> Vec<u8> {
    let mut w = FdtWriter::new();
    w.begin_node("");
    w.prop_strs("compatible", compatible);
    w.begin_node("chosen");
    w.end_node();
    w.end_node();
    w.finish()
}

#[derive(Copy, Clone, Debug)]
pub enum Hash {
    Good,
    Bad,
    Short,
    Algo(&'static str),
}

#[derive(Clone, Default)]
pub struct Image {
    pub name: &'static str,
    pub kind: Option<&'static str>,
    pub data: Option<Vec<u8>>,
    pub compression: Option<&'static str>,
    pub hash: Option<Hash>,
    pub signed_by: Option<u8>,
    pub load: Option<Vec<u32>>,
    pub entry: Option<Vec<u32>>,
    /// Names the hash and signature nodes `hash@1` and `signature@1`.
    pub unit_addresses: bool,
}

impl Image {
    pub fn kernel() -> Self {
        Self {
            name: "kernel",
            kind: Some("kernel"),
            data: Some(KERNEL.to_vec()),
            hash: Some(Hash::Good),
            load: Some(vec![KERNEL_ADDR]),
            entry: Some(vec![KERNEL_ADDR]),
            ..Self::default()
        }
    }

    pub fn fdt(name: &'static str, compatible: &[&str]) -> Self {
        Self {
            name,
            kind: Some("flat_dt"),
            data: Some(dtb(compatible)),
            hash: Some(Hash::Good),
            ..Self::default()
        }
    }
}

#[derive(Clone, Default)]
pub struct Config {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub compatible: Option<Vec<&'static str>>,
    /// Pairs of role and image unit name.
    pub images: Vec<(&'static str, &'static str)>,
    pub signed_by: Option<u8>,
}

impl Config {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            images: vec![("kernel", "kernel")],
            ..Self::default()
        }
    }

    pub fn compatible(mut self, compatible: &[&'static str]) -> Self {
        self.compatible = Some(compatible.to_vec());
        self
    }

    pub fn fdt(mut self, unit: &'static str) -> Self {
        self.images.push(("fdt", unit));
        self
    }

    pub fn signed_by(mut self, key: u8) -> Self {
        self.signed_by = Some(key);
        self
    }
}

/// A FIT image together with the offsets of interesting properties.
pub struct Fit {
    pub blob: Vec<u8>,
    props: Vec<(String, usize)>,
}

impl Fit {
    /// Returns the offset of the `PROP` tag of `name` in the node at
    /// `path`.
    pub fn prop(&self, path: &str, name: &str) -> usize {
        let key = format!("{}:{}", path, name);
        self.props
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, at)| *at)
            .unwrap_or_else(|| panic!("no property {}", key))
    }

    /// Flips one bit of the value of `name` in the node at `path`.
    pub fn flip(&mut self, path: &str, name: &str) {
        let at = self.prop(path, name);
        self.blob[at + 12] ^= 0x01;
    }
}

struct Writer {
    w: FdtWriter,
    path: Vec<&'static str>,
    props: Vec<(String, usize)>,
}

impl Writer {
    fn begin(&mut self, name: &'static str) {
        self.w.begin_node(name);
        self.path.push(name);
    }

    fn end(&mut self) {
        self.w.end_node();
        self.path.pop();
    }

    fn record(&mut self, name: &str, at: usize) {
        let path = format!("/{}", self.path[1..].join("/"));
        self.props.push((format!("{}:{}", path, name), at));
    }

    fn prop(&mut self, name: &str, value: &[u8]) {
        let at = self.w.prop(name, value);
        self.record(name, at);
    }

    fn prop_str(&mut self, name: &str, value: &str) {
        let at = self.w.prop_str(name, value);
        self.record(name, at);
    }

    fn prop_strs(&mut self, name: &str, value: &[&str]) {
        let at = self.w.prop_strs(name, value);
        self.record(name, at);
    }

    fn prop_cells(&mut self, name: &str, value: &[u32]) {
        let at = self.w.prop_cells(name, value);
        self.record(name, at);
    }
}

const SIG_ALGO: &str = "sha256,rsa2048";

/// Builds a FIT image from `images` and `configs`.
pub fn build(
    images: &[Image],
    configs: &[Config],
    default: Option<&str>,
) -> Fit {
    let mut w = Writer {
        w: FdtWriter::new(),
        path: Vec::new(),
        props: Vec::new(),
    };
    w.begin("");
    w.prop_str("description", "test FIT");

    w.begin("images");
    for image in images {
        w.begin(image.name);
        w.prop_str("description", image.name);
        if let Some(kind) = image.kind {
            w.prop_str("type", kind);
        }
        if let Some(compression) = image.compression {
            w.prop_str("compression", compression);
        }
        if let Some(data) = &image.data {
            w.prop(IMAGE_DATA, data);
        }
        if let Some(load) = &image.load {
            w.prop_cells("load", load);
        }
        if let Some(entry) = &image.entry {
            w.prop_cells("entry", entry);
        }

        let data = image.data.clone().unwrap_or_default();
        if let Some(hash) = image.hash {
            let mut value = sha256(&data);
            let algo = match hash {
                Hash::Good => "sha256",
                Hash::Bad => {
                    value[5] ^= 0x20;
                    "sha256"
                }
                Hash::Short => {
                    value.truncate(20);
                    "sha256"
                }
                Hash::Algo(algo) => algo,
            };
            w.begin(if image.unit_addresses { "hash@1" } else { "hash-1" });
            w.prop_str("algo", algo);
            w.prop("value", &value);
            w.end();
        }
        if let Some(key) = image.signed_by {
            w.begin(if image.unit_addresses {
                "signature@1"
            } else {
                "signature-1"
            });
            w.prop_str("algo", SIG_ALGO);
            w.prop("value", &fake::Key::anonymous(key).sign(&sha256(&data)));
            w.end();
        }
        w.end();
    }
    w.end();

    let mut signed = Vec::new();
    w.begin("configurations");
    if let Some(default) = default {
        w.prop_str("default", default);
    }
    for config in configs {
        w.begin(config.name);
        if let Some(desc) = config.description {
            w.prop_str("description", desc);
        }
        if let Some(compatible) = &config.compatible {
            w.prop_strs("compatible", compatible);
        }
        for &(role, unit) in &config.images {
            w.prop_str(role, unit);
        }
        if let Some(key) = config.signed_by {
            let mut nodes = vec![
                "/".to_string(),
                format!("/configurations/{}", config.name),
            ];
            for &(_, unit) in &config.images {
                nodes.push(format!("/images/{}", unit));
                nodes.push(format!("/images/{}/hash-1", unit));
            }
            let names = nodes.iter().map(String::as_str).collect::<Vec<_>>();

            w.begin("signature-1");
            w.prop_str("algo", SIG_ALGO);
            w.prop_strs("hashed-nodes", &names);
            w.prop_cells("hashed-strings", &[0, 0]);
            w.prop("value", &[0; 33]);
            w.end();
            signed.push((config.name, key, nodes));
        }
        w.end();
    }
    w.end();
    w.end();

    let mut fit = Fit {
        blob: w.w.finish(),
        props: w.props,
    };

    // Sign only once the layout is final.
    for (name, key, nodes) in signed {
        let path = format!("/configurations/{}/signature-1", name);
        let strings_size = BoundedCursor::from_blob(&fit.blob)
            .unwrap()
            .strings_size();
        let at = fit.prop(&path, "hashed-strings");
        fit.blob[at + 16..at + 20]
            .copy_from_slice(&(strings_size as u32).to_be_bytes());

        let nodes = nodes.iter().map(String::as_str).collect::<Vec<_>>();
        let spec =
            InclusionSpec::new(nodes, vec![IMAGE_DATA], (0, strings_size));
        let cursor = BoundedCursor::from_blob(&fit.blob).unwrap();
        let digest = RegionDigestWalker::new(cursor, &spec)
            .digest(&mut ring::hash::Engine::new(), Algo::Sha256)
            .unwrap();

        let sig = fake::Key::anonymous(key).sign(digest.as_bytes());
        let at = fit.prop(&path, "value");
        fit.blob[at + 12..at + 12 + sig.len()].copy_from_slice(&sig);
    }
    fit
}
