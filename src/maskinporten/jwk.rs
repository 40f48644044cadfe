//! RSA private JSON Web Key loading for RS256 grant signing

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{BigUint, RsaPrivateKey};
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Deserialize)]
struct RsaPrivateJwk {
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    n: String,
    e: String,
    d: String,
    p: String,
    q: String,
}

/// Signing half of the operator's JWK
#[derive(Clone)]
pub struct SigningKey {
    pub kid: Option<String>,
    pub(crate) encoding_key: EncodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Parse an RSA private key in JWK form.
    ///
    /// # Errors
    /// [`Error::ConfigError`] when the document is not an RSA private JWK,
    /// [`Error::SigningError`] when the key material is inconsistent.
    pub fn from_jwk_json(jwk: &str) -> Result<Self> {
        let jwk: RsaPrivateJwk = serde_json::from_str(jwk)
            .map_err(|e| Error::ConfigError(format!("JWK is not a valid RSA private key: {e}")))?;

        if jwk.kty != "RSA" {
            return Err(Error::ConfigError(format!(
                "Unsupported JWK key type {} (expected RSA)",
                jwk.kty
            )));
        }
        if let Some(alg) = jwk.alg.as_deref() {
            if alg != "RS256" {
                return Err(Error::ConfigError(format!(
                    "Unsupported JWK algorithm {alg} (expected RS256)"
                )));
            }
        }

        let key = RsaPrivateKey::from_components(
            decode_uint("n", &jwk.n)?,
            decode_uint("e", &jwk.e)?,
            decode_uint("d", &jwk.d)?,
            vec![decode_uint("p", &jwk.p)?, decode_uint("q", &jwk.q)?],
        )
        .map_err(|e| Error::SigningError(format!("invalid RSA key components: {e}")))?;
        key.validate()
            .map_err(|e| Error::SigningError(format!("RSA key failed validation: {e}")))?;

        let der = key
            .to_pkcs1_der()
            .map_err(|e| Error::SigningError(format!("failed to encode RSA key: {e}")))?;

        Ok(Self {
            kid: jwk.kid,
            encoding_key: EncodingKey::from_rsa_der(der.as_bytes()),
        })
    }
}

fn decode_uint(field: &str, value: &str) -> Result<BigUint> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| Error::ConfigError(format!("JWK field {field} is not base64url: {e}")))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TEST_JWK: &str = include_str!("testdata/test_jwk.json");

    /// Public half of [`TEST_JWK`] for verifying signed grants.
    pub(crate) fn test_decoding_key() -> jsonwebtoken::DecodingKey {
        let value: serde_json::Value = serde_json::from_str(TEST_JWK).unwrap();
        jsonwebtoken::DecodingKey::from_rsa_components(
            value["n"].as_str().unwrap(),
            value["e"].as_str().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_private_jwk() {
        let key = SigningKey::from_jwk_json(TEST_JWK).unwrap();
        assert_eq!(key.kid.as_deref(), Some("test-operator-key"));
    }

    #[test]
    fn test_reject_non_json() {
        let err = SigningKey::from_jwk_json("not a key").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_reject_public_only_jwk() {
        let mut value: serde_json::Value = serde_json::from_str(TEST_JWK).unwrap();
        let obj = value.as_object_mut().unwrap();
        obj.remove("d");
        obj.remove("p");
        obj.remove("q");
        let err = SigningKey::from_jwk_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_reject_unsupported_key_type() {
        let mut value: serde_json::Value = serde_json::from_str(TEST_JWK).unwrap();
        value["kty"] = serde_json::json!("EC");
        let err = SigningKey::from_jwk_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("Unsupported JWK key type EC"));
    }

    #[test]
    fn test_reject_inconsistent_components() {
        let mut value: serde_json::Value = serde_json::from_str(TEST_JWK).unwrap();
        // Swap in a modulus that does not match the primes.
        value["n"] = serde_json::json!(URL_SAFE_NO_PAD.encode([0xC5u8; 256]));
        let err = SigningKey::from_jwk_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, Error::SigningError(_)));
    }
}
