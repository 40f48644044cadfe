//! Maskinporten API client configuration

use std::path::Path;

use reqwest::Url;

use crate::error::{Error, Result};

#[derive(Clone)]
pub struct MaskinportenApiConfig {
    /// Client id of the operator's own Maskinporten integration
    pub client_id: String,
    /// Base URL of the authorization server, e.g. `https://test.maskinporten.no/`
    pub url: String,
    /// RSA private key as a JSON Web Key
    pub jwk: String,
    /// Space separated scopes requested for the operator's token
    pub scope: String,
}

impl std::fmt::Debug for MaskinportenApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskinportenApiConfig")
            .field("client_id", &self.client_id)
            .field("url", &self.url)
            .field("jwk", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

impl MaskinportenApiConfig {
    /// Read the JWK from a file instead of taking it inline.
    pub fn with_jwk_file(
        client_id: String,
        url: String,
        jwk_path: &Path,
        scope: String,
    ) -> Result<Self> {
        let jwk = std::fs::read_to_string(jwk_path).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read JWK file {}: {e}",
                jwk_path.display()
            ))
        })?;
        Ok(Self {
            client_id,
            url,
            jwk,
            scope,
        })
    }

    /// Check that all fields are present and the base URL is usable.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("client_id", &self.client_id),
            ("url", &self.url),
            ("jwk", &self.jwk),
            ("scope", &self.scope),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::ConfigError(format!(
                    "Maskinporten configuration field {field} must not be empty"
                )));
            }
        }

        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::ConfigError(format!(
                "Maskinporten url must be http(s), got {}",
                url.scheme()
            )));
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.url)
            .map_err(|e| Error::ConfigError(format!("Invalid Maskinporten url {}: {e}", self.url)))
    }

    /// Resolve `path` relative to the base URL, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.base_url()?;
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| Error::ConfigError(format!("Invalid endpoint path {path}: {e}")))
    }
}
