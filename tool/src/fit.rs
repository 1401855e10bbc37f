// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! FIT inspection and verification commands.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::PathBuf;

use fitverify::crypto::rsa;
use fitverify::crypto::sig::NoKeys;
use fitverify::fdt::Node;
use fitverify::fit::Options;
use fitverify::fit::ResolvedImage;
use fitverify::fit::Session;
use fitverify::fit::VerifyPolicy;
use serde::Serialize;

/// Images larger than this are truncated on read.
const DEFAULT_MAX_SIZE: usize = 64 << 20;

/// A CLI interface for `fitverify`.
#[derive(structopt::StructOpt)]
#[structopt(author)]
pub enum Fit {
    /// Print the images and configurations of a FIT image as JSON.
    ///
    /// Nothing is verified.
    ShowFit {
        /// Whether to pretty-print the resulting JSON.
        #[structopt(long)]
        pretty: bool,

        /// Input file, defaults to stdin.
        #[structopt(short = "i", long, parse(from_os_str))]
        input: Option<PathBuf>,

        /// Output file, defaults to stdout.
        #[structopt(short = "o", long, parse(from_os_str))]
        output: Option<PathBuf>,
    },

    /// Select a configuration and verify some of its images.
    VerifyFit {
        /// Verification policy: none, hash, signature, or available.
        #[structopt(long, default_value = "hash")]
        policy: VerifyPolicy,

        /// DER-encoded PKCS#1 RSA public key to trust; may be repeated.
        ///
        /// The file stem becomes the key's name hint.
        #[structopt(long, parse(from_os_str))]
        key: Vec<PathBuf>,

        /// Configuration to use. If missing, the best match for `--machine`
        /// is used, falling back to the default configuration.
        #[structopt(long)]
        config: Option<String>,

        /// The running machine's `compatible` list, most specific first;
        /// may be repeated.
        #[structopt(long)]
        machine: Vec<String>,

        /// Roles of the images to open, such as `kernel` or `fdt`.
        #[structopt(long, default_value = "kernel")]
        image: Vec<String>,

        /// Whether to log every hash and key check.
        #[structopt(short = "v", long)]
        verbose: bool,

        /// Whether to pretty-print the resulting JSON.
        #[structopt(long)]
        pretty: bool,

        /// Maximum number of bytes to read from the input.
        #[structopt(long, default_value = "67108864")]
        max_size: usize,

        /// Input file, defaults to stdin.
        #[structopt(short = "i", long, parse(from_os_str))]
        input: Option<PathBuf>,

        /// Output file, defaults to stdout.
        #[structopt(short = "o", long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ImageInfo<'a> {
    name: &'a str,
    description: Option<&'a str>,
    #[serde(rename = "type")]
    kind: Option<&'a str>,
    compression: Option<&'a str>,
    size: Option<usize>,
}

impl<'a> ImageInfo<'a> {
    fn new(node: Node<'a>) -> Self {
        let string = |name| node.property(name).and_then(|p| p.as_str());
        Self {
            name: node.name(),
            description: string("description"),
            kind: string("type"),
            compression: string("compression"),
            size: node.property("data").map(|p| p.value().len()),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo<'a> {
    name: &'a str,
    description: Option<&'a str>,
    compatible: Vec<&'a str>,
    images: BTreeMap<&'a str, &'a str>,
    signatures: Vec<&'a str>,
}

impl<'a> ConfigInfo<'a> {
    fn new(node: Node<'a>) -> Self {
        let images = node
            .properties()
            .filter(|p| !matches!(p.name(), "description" | "compatible"))
            .filter_map(|p| Some((p.name(), p.as_str()?)))
            .collect();
        Self {
            name: node.name(),
            description: node
                .property("description")
                .and_then(|p| p.as_str()),
            compatible: node
                .property("compatible")
                .map(|p| p.strings().collect())
                .unwrap_or_default(),
            images,
            signatures: node
                .children()
                .filter(|c| c.has_prefix("signature"))
                .map(|c| c.name())
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct FitInfo<'a> {
    description: Option<&'a str>,
    default: Option<&'a str>,
    images: Vec<ImageInfo<'a>>,
    configurations: Vec<ConfigInfo<'a>>,
}

#[derive(Serialize)]
struct Verified<'a> {
    role: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    size: usize,
    load: Option<usize>,
    entry: Option<usize>,
}

impl<'a> Verified<'a> {
    fn new(role: &'a str, image: ResolvedImage<'a>) -> Self {
        Self {
            role,
            name: image.name(),
            kind: image.kind(),
            size: image.len(),
            load: check!(image.load_address(), "bad {} load address", role),
            entry: check!(image.entry_point(), "bad {} entry point", role),
        }
    }
}

#[derive(Serialize)]
struct VerifyReport<'a> {
    policy: VerifyPolicy,
    configuration: &'a str,
    images: Vec<Verified<'a>>,
}

fn write_json(
    value: &impl Serialize,
    pretty: bool,
    output: Option<PathBuf>,
) {
    let mut w = crate::util::output(output.as_deref());
    if pretty {
        check!(
            serde_json::to_writer_pretty(&mut w, value),
            "failed to write JSON"
        );
    } else {
        check!(serde_json::to_writer(&mut w, value), "failed to write JSON");
    }
    check!(writeln!(w), "failed to write JSON");
}

impl Fit {
    pub fn run(self) {
        match self {
            Self::ShowFit {
                pretty,
                input,
                output,
            } => {
                let blob =
                    crate::util::read_input(input.as_deref(), DEFAULT_MAX_SIZE);
                let session = check!(
                    Session::open(
                        blob,
                        Options::new(VerifyPolicy::None, &NoKeys)
                    ),
                    "failed to open FIT image"
                );

                let configs = session.configurations();
                let info = FitInfo {
                    description: session.description(),
                    default: configs
                        .and_then(|c| c.property("default"))
                        .and_then(|p| p.as_str()),
                    images: session
                        .images()
                        .children()
                        .map(ImageInfo::new)
                        .collect(),
                    configurations: configs
                        .into_iter()
                        .flat_map(|c| c.children())
                        .map(ConfigInfo::new)
                        .collect(),
                };
                write_json(&info, pretty, output);
            }

            Self::VerifyFit {
                policy,
                key,
                config,
                machine,
                image,
                verbose,
                pretty,
                max_size,
                input,
                output,
            } => {
                let keys = crate::util::read_all(&key)
                    .into_iter()
                    .zip(&key)
                    .map(|(der, path)| {
                        let key = check!(
                            rsa::PublicKey::from_pkcs1_der(&der),
                            "failed to parse key {}",
                            path.display()
                        );
                        match path.file_stem() {
                            Some(stem) => {
                                key.with_hint(stem.to_string_lossy())
                            }
                            None => key,
                        }
                    })
                    .collect::<Vec<_>>();
                let machine =
                    machine.iter().map(String::as_str).collect::<Vec<_>>();

                let blob = crate::util::read_input(input.as_deref(), max_size);
                let options = Options::new(policy, &keys)
                    .verbose(verbose)
                    .machine(&machine);
                let session = check!(
                    Session::open(blob, options),
                    "failed to open FIT image"
                );

                let selected = check!(
                    session.open_configuration(config.as_deref()),
                    "failed to select a configuration"
                );
                let images = image
                    .iter()
                    .map(|role| {
                        let resolved = check!(
                            session.open_image(Some(selected), role),
                            "failed to open {} image",
                            role
                        );
                        Verified::new(role, resolved)
                    })
                    .collect();

                let report = VerifyReport {
                    policy,
                    configuration: selected.name(),
                    images,
                };
                write_json(&report, pretty, output);
            }
        }
    }
}
