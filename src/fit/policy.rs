// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Verification policies.
//!
//! A [`VerifyPolicy`] decides, for each of the three places a FIT image can
//! carry a check, whether that check is skipped, performed only when
//! present, or required. This table is the only place where a missing
//! check can be waived.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "arbitrary-derive")]
use libfuzzer_sys::arbitrary::{self, Arbitrary};

/// How strictly a FIT image is verified.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "arbitrary-derive", derive(Arbitrary))]
pub enum VerifyPolicy {
    /// Nothing is verified.
    #[cfg_attr(feature = "serde", serde(rename = "none"))]
    None,
    /// Images must carry a matching hash; configuration signatures are
    /// ignored.
    #[cfg_attr(feature = "serde", serde(rename = "hash"))]
    HashOnly,
    /// Configurations must be signed, and images must carry a matching
    /// hash.
    #[cfg_attr(feature = "serde", serde(rename = "signature"))]
    SignatureRequired,
    /// Whatever is present must verify, but nothing is required.
    #[cfg_attr(feature = "serde", serde(rename = "available"))]
    BestEffort,
}

/// What a [`VerifyPolicy`] demands of one particular check.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Check {
    /// The check is not performed.
    Skip,
    /// The check is performed if the image carries it.
    IfPresent,
    /// The check must be present, and must pass.
    Required,
}

impl Check {
    /// Returns whether the check is performed at all.
    pub fn enabled(self) -> bool {
        self != Check::Skip
    }

    /// Returns whether a missing check is fatal.
    pub fn required(self) -> bool {
        self == Check::Required
    }
}

impl VerifyPolicy {
    /// Every policy, from weakest to strongest.
    pub const ALL: [Self; 4] = [
        Self::None,
        Self::BestEffort,
        Self::HashOnly,
        Self::SignatureRequired,
    ];

    /// Returns the short name of this policy, as accepted by
    /// [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::HashOnly => "hash",
            Self::SignatureRequired => "signature",
            Self::BestEffort => "available",
        }
    }

    /// The requirement on the signatures of a configuration.
    pub fn config_signature(self) -> Check {
        match self {
            Self::None | Self::HashOnly => Check::Skip,
            Self::SignatureRequired => Check::Required,
            Self::BestEffort => Check::IfPresent,
        }
    }

    /// The requirement on the hash of an image opened through a
    /// configuration.
    pub fn image_hash(self) -> Check {
        match self {
            Self::None => Check::Skip,
            Self::BestEffort => Check::IfPresent,
            Self::HashOnly | Self::SignatureRequired => Check::Required,
        }
    }

    /// The requirement on the signature of an image opened without a
    /// configuration.
    ///
    /// Note that [`VerifyPolicy::HashOnly`] does not waive this: an image
    /// opened on its own has no configuration vouching for its hash.
    pub fn image_signature(self) -> Check {
        match self {
            Self::None => Check::Skip,
            Self::BestEffort => Check::IfPresent,
            Self::HashOnly | Self::SignatureRequired => Check::Required,
        }
    }
}

impl fmt::Display for VerifyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error returned when parsing an unknown [`VerifyPolicy`] name.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct UnknownPolicy;

impl fmt::Display for UnknownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("unknown verify policy; expected one of ")?;
        for (i, p) in VerifyPolicy::ALL.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            f.write_str(p.name())?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnknownPolicy {}

impl FromStr for VerifyPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, UnknownPolicy> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or(UnknownPolicy)
    }
}
