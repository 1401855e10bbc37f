// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Configuration selection.
//!
//! A configuration is a child of `/configurations` that names one image
//! per role:
//!
//! ```text
//! configurations {
//!     default = "conf-1";
//!     conf-1 {
//!         compatible = "acme,board-v2", "acme,board";
//!         kernel = "kernel";
//!         fdt = "fdt-1";
//!         signature-1 { ... };
//!     };
//! };
//! ```
//!
//! When no configuration is named, the one whose `compatible` list best
//! matches the running machine is chosen; a configuration without a
//! `compatible` list is scored by the root `compatible` of its embedded
//! device tree instead.

use alloc::string::String;

use crate::fdt;
use crate::fdt::Node;
use crate::fit::property_path;
use crate::fit::Error;
use crate::fit::Session;
use crate::fit::IMAGE_DATA;
use crate::Result;

/// A configuration, selected and verified through
/// [`Session::open_configuration()`].
#[derive(Copy, Clone, Debug)]
pub struct Configuration<'s> {
    node: Node<'s>,
    images: Node<'s>,
}

impl<'s> Configuration<'s> {
    /// Returns the configuration's unit name.
    pub fn name(self) -> &'s str {
        self.node.name()
    }

    /// Returns the configuration's node.
    pub fn node(self) -> Node<'s> {
        self.node
    }

    /// Returns the configuration's `description`, if it has one.
    pub fn description(self) -> Option<&'s str> {
        self.node.property("description").and_then(|p| p.as_str())
    }

    /// Returns the unit name of the image this configuration selects for
    /// `role`, such as `"kernel"`.
    pub fn image_name(self, role: &str) -> Option<&'s str> {
        self.node.property(role).and_then(|p| p.as_str())
    }

    /// Returns whether this configuration selects an existing image for
    /// `role`.
    pub fn has_image(self, role: &str) -> bool {
        self.image_name(role)
            .map_or(false, |unit| self.images.child(unit).is_some())
    }
}

impl<'a> Session<'a> {
    /// Opens the configuration called `name`, or the best match for the
    /// running machine if `name` is `None`.
    ///
    /// The configuration's signatures are checked as the session's policy
    /// demands before it is returned.
    pub fn open_configuration(
        &self,
        name: Option<&str>,
    ) -> Result<Configuration<'_>, Error> {
        self.open_configuration_matching(name, |_| true)
    }

    /// Like [`Session::open_configuration()`], but candidates rejected by
    /// `filter` are not considered during the compatible search.
    ///
    /// `filter` is not consulted for the `default` fallback, nor when a
    /// configuration is named explicitly.
    pub fn open_configuration_matching(
        &self,
        name: Option<&str>,
        filter: impl FnMut(Configuration<'_>) -> bool,
    ) -> Result<Configuration<'_>, Error> {
        let configs = self.configurations().ok_or_else(|| {
            fail!(Error::NotFound {
                what: "node",
                name: String::from("configurations"),
            })
        })?;

        let unit = match name {
            Some(name) => name,
            None => self.find_compatible(configs, filter)?,
        };
        let node = configs.child(unit).ok_or_else(|| {
            fail!(
                Error::NotFound {
                    what: "configuration",
                    name: String::from(unit),
                },
                "configuration '{}' not found",
                unit,
            )
        })?;
        let config = Configuration {
            node,
            images: self.images(),
        };

        if let Some(desc) = config.description() {
            info!("Using configuration {}: {}", config.name(), desc);
        }
        self.verify_configuration(node)?;
        Ok(config)
    }

    /// Returns the unit name of the last configuration, if any.
    pub fn last_configuration(&self) -> Option<&str> {
        self.configurations()?.children().last().map(Node::name)
    }

    /// Picks the child of `configs` that best matches the running machine,
    /// falling back to `configs`' `default`.
    fn find_compatible<'s>(
        &'s self,
        configs: Node<'s>,
        mut filter: impl FnMut(Configuration<'_>) -> bool,
    ) -> Result<&'s str, Error> {
        let mut best = None;
        let mut best_score = 0;
        if !self.machine.is_empty() {
            for node in configs.children() {
                let config = Configuration {
                    node,
                    images: self.images(),
                };
                if !filter(config) {
                    continue;
                }

                let score = if node.has_property("compatible") {
                    self.score(|m| node.compatible_score(m))
                } else if node.has_property("fdt") {
                    self.embedded_fdt_score(config)
                } else {
                    0
                };
                if score > best_score {
                    best = Some(node);
                    best_score = score;
                }
                if score == fdt::COMPATIBLE_MAX_SCORE {
                    break;
                }
            }
        }

        if let Some(node) = best {
            return Ok(node.name());
        }

        info!("No match found. Trying default.");
        configs
            .property("default")
            .and_then(|p| p.as_str())
            .ok_or_else(|| {
                fail!(
                    Error::NotFound {
                        what: "property",
                        name: property_path(configs, "default"),
                    },
                    "no matching configuration and no default",
                )
            })
    }

    /// Scores the running machine's `compatible` list with `f`, keeping the
    /// best score.
    fn score(&self, f: impl FnMut(&str) -> i32) -> i32 {
        self.machine.iter().copied().map(f).max().unwrap_or(0)
    }

    /// Scores a configuration by the device tree it embeds.
    ///
    /// Failure to use the device tree is not an error; it just disqualifies
    /// the configuration.
    fn embedded_fdt_score(&self, config: Configuration) -> i32 {
        let unit = match config.image_name("fdt") {
            Some(unit) => unit,
            None => return 0,
        };
        let image = match self.images().child(unit) {
            Some(image) => image,
            None => {
                warn!("skipping {}: no fdt image '{}'", config.name(), unit);
                return 0;
            }
        };

        let compression =
            image.property("compression").and_then(|p| p.as_str());
        if compression.map_or(false, |c| c != "none") {
            warn!("skipping {}: compressed fdt", config.name());
            return 0;
        }
        let data = match image.property(IMAGE_DATA) {
            Some(data) => data.value(),
            None => {
                warn!("skipping {}: malformed fdt", config.name());
                return 0;
            }
        };
        if self.verify_image_hash(image, data).is_err() {
            warn!("skipping {}: fdt failed verification", config.name());
            return 0;
        }

        self.score(|m| fdt::machine_is_compatible(data, m))
    }

    /// Checks every signature of a configuration, as the policy demands.
    fn verify_configuration(&self, node: Node) -> Result<(), Error> {
        let check = self.policy.config_signature();
        if !check.enabled() {
            return Ok(());
        }

        let verifier = self.verifier();
        let mut found = false;
        for sig in node.children().filter(|c| c.has_prefix("signature")) {
            found = true;
            let mut engine = self.engine();
            verifier.verify_subtree(sig, self.blob(), &mut **engine)?;
            if self.verbose {
                info!("{}: signature OK", sig.path());
            }
        }

        if !found && check.required() {
            return Err(fail!(
                Error::NotFound {
                    what: "signature",
                    name: node.path(),
                },
                "configuration '{}' does not have a signature",
                node.name(),
            ));
        }
        Ok(())
    }
}
