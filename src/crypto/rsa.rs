// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! RSA PKCS#1 v1.5 public keys, based on the RustCrypto `rsa` crate.
//!
//! `ring` can only verify signatures over whole messages, while FIT
//! verification hands keys an already-computed digest; this backend fills
//! that gap.

use alloc::string::String;

use ::rsa::pkcs1::DecodeRsaPublicKey as _;
use ::rsa::BigUint;
use ::rsa::Pkcs1v15Sign;

use crate::crypto::hash;
use crate::crypto::sig;

/// An error returned when constructing a [`PublicKey`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The key encoding could not be parsed.
    BadEncoding,
    /// The modulus or exponent were rejected.
    BadKey,
}

/// An RSA public key with an optional name hint.
#[derive(Clone, Debug)]
pub struct PublicKey {
    key: ::rsa::RsaPublicKey,
    hint: Option<String>,
}

impl PublicKey {
    /// Parses a PKCS#1 `RSAPublicKey` DER encoding.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self, Error> {
        let key = ::rsa::RsaPublicKey::from_pkcs1_der(der)
            .map_err(|_| Error::BadEncoding)?;
        Ok(Self { key, hint: None })
    }

    /// Builds a key from its big-endian modulus and exponent, as stored in
    /// a device tree `rsa,modulus`/`rsa,exponent` pair.
    pub fn from_components(
        modulus: &[u8],
        exponent: &[u8],
    ) -> Result<Self, Error> {
        let key = ::rsa::RsaPublicKey::new(
            BigUint::from_bytes_be(modulus),
            BigUint::from_bytes_be(exponent),
        )
        .map_err(|_| Error::BadKey)?;
        Ok(Self { key, hint: None })
    }

    /// Attaches a name hint to this key.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Returns the underlying `rsa` key.
    pub fn inner(&self) -> &::rsa::RsaPublicKey {
        &self.key
    }
}

impl sig::PublicKey for PublicKey {
    fn name_hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    fn verify(
        &self,
        signature: &[u8],
        digest: &[u8],
        algo: hash::Algo,
    ) -> Result<(), sig::Error> {
        let scheme = match algo {
            hash::Algo::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
            hash::Algo::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
            hash::Algo::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
            hash::Algo::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        };
        if digest.len() != algo.bytes() {
            return Err(sig::Error::UnsupportedAlgo);
        }
        self.key
            .verify(scheme, digest, signature)
            .map_err(|_| sig::Error::Mismatch)
    }
}
