//! Conversion of published JSON Web Keys into RSA public keys.
//!
//! Apple publishes its keys as modulus/exponent pairs. RS256 verification
//! accepts moduli between 2048 and 8192 bits and odd exponents of at most
//! 33 bits, so keys outside these bounds are rejected up front instead of
//! failing every signature check later.
use std::fmt;

use base64::Engine as _;
use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use jsonwebtoken::DecodingKey;
use tracing::debug;

use crate::error::{ConversionError, FetchError};
use crate::models::{KeyRecord, KeySet};

const RSA_KEY_TYPE: &str = "RSA";
const MIN_MODULUS_BITS: usize = 2048;
const MAX_MODULUS_BITS: usize = 8192;
const MAX_EXPONENT: u64 = (1 << 33) - 1;

/// Key components are base64url; tolerate issuers that pad them.
const KEY_COMPONENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// An RSA public key converted from a [`KeyRecord`].
#[derive(Clone)]
pub struct PublicKey {
    key: DecodingKey,
    modulus_bits: usize,
}

impl PublicKey {
    /// Size of the modulus in bits.
    #[must_use]
    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("modulus_bits", &self.modulus_bits)
            .finish_non_exhaustive()
    }
}

/// Converts a published key record into an RSA public key.
///
/// # Errors
/// - key type is not `RSA`
/// - modulus or exponent is missing or not base64url
/// - modulus length or exponent is outside what RS256 accepts
pub fn convert(record: &KeyRecord) -> Result<PublicKey, ConversionError> {
    if record.key_type != RSA_KEY_TYPE {
        return Err(ConversionError::UnsupportedKeyType(record.key_type.clone()));
    }

    let modulus = record
        .modulus
        .as_deref()
        .ok_or(ConversionError::MissingComponent("n"))?;
    let exponent = record
        .exponent
        .as_deref()
        .ok_or(ConversionError::MissingComponent("e"))?;

    let modulus = decode_component("n", modulus)?;
    let exponent = decode_component("e", exponent)?;

    let modulus = strip_leading_zeros(&modulus);
    let modulus_bits = bit_length(modulus);
    if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&modulus_bits) {
        return Err(ConversionError::ModulusLength(modulus_bits));
    }

    let exponent = strip_leading_zeros(&exponent);
    if exponent.len() > size_of::<u64>() {
        return Err(ConversionError::InvalidExponent);
    }
    let value = exponent
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    if value < 3 || value % 2 == 0 || value > MAX_EXPONENT {
        return Err(ConversionError::InvalidExponent);
    }

    Ok(PublicKey {
        key: DecodingKey::from_rsa_raw_components(modulus, exponent),
        modulus_bits,
    })
}

/// Picks the key a token should be verified with.
///
/// Prefers the key whose `kid` matches the token header. Without a header
/// `kid`, or without a match, the first key is used; a token signed by an
/// unknown key then fails signature verification.
///
/// # Errors
/// - the key set is empty
pub fn select_key<'a>(key_set: &'a KeySet, kid: Option<&str>) -> Result<&'a KeyRecord, FetchError> {
    let first = key_set.keys.first().ok_or(FetchError::NoKeysAvailable)?;

    let Some(kid) = kid else {
        return Ok(first);
    };

    match key_set
        .keys
        .iter()
        .find(|key| key.key_id.as_deref() == Some(kid))
    {
        Some(key) => Ok(key),
        None => {
            debug!(kid, "no published key matches token kid, using first key");
            Ok(first)
        }
    }
}

fn decode_component(component: &'static str, value: &str) -> Result<Vec<u8>, ConversionError> {
    KEY_COMPONENT_ENGINE
        .decode(value)
        .map_err(|source| ConversionError::MalformedComponent { component, source })
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn bit_length(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(first) => (bytes.len() - 1) * 8 + (8 - first.leading_zeros() as usize),
        None => 0,
    }
}
