//! Maskinporten credential provider
//!
//! Authenticates the operator against Maskinporten with the JWT-bearer grant:
//! a short lived assertion signed with the operator's JWK is exchanged for an
//! access token at the token endpoint. Discovery metadata and the access token
//! are both held in an [`ExpiringCache`] so concurrent reconciliations share a
//! single network round trip.
//!
//! Discovery is fetched with a single plain GET while the token exchange goes
//! through the [`RetryingExecutor`], so a misconfigured base URL surfaces on
//! the first call.
//!
//! Protocol references:
//! - <https://docs.digdir.no/docs/Maskinporten/maskinporten_protocol_token>
//! - <https://docs.digdir.no/docs/Maskinporten/maskinporten_func_wellknown>

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, Header};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::cache::ExpiringCache;
use super::config::MaskinportenApiConfig;
use super::jwk::SigningKey;
use super::retry::{send_classified, RetryPolicy, RetryingExecutor};
use super::types::{DiscoveryMetadata, TokenResponse};
use crate::error::{Error, Result};

pub const WELL_KNOWN_PATH: &str = "/.well-known/oauth-authorization-server";
pub const TOKEN_PATH: &str = "/token";
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub const DISCOVERY_TTL: Duration = Duration::from_secs(5 * 60);
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(60);
/// Lifetime of a signed grant, in seconds
pub const GRANT_LIFETIME_SECS: i64 = 60;

/// Claims of the JWT-bearer assertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantClaims {
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    pub scope: String,
}

struct ProviderInner {
    config: MaskinportenApiConfig,
    http: Client,
    key: SigningKey,
    executor: RetryingExecutor,
}

pub struct CredentialProvider {
    inner: Arc<ProviderInner>,
    discovery: Arc<ExpiringCache<DiscoveryMetadata>>,
    access_token: ExpiringCache<TokenResponse>,
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("config", &self.inner.config)
            .field("discovery", &self.discovery)
            .field("access_token", &self.access_token)
            .finish()
    }
}

impl CredentialProvider {
    pub fn new(config: MaskinportenApiConfig) -> Result<Self> {
        Self::with_retry_policy(config, RetryPolicy::default())
    }

    /// Build a provider whose token exchange retries according to `policy`.
    ///
    /// # Errors
    /// [`Error::ConfigError`] for incomplete configuration or an unusable JWK.
    pub fn with_retry_policy(config: MaskinportenApiConfig, policy: RetryPolicy) -> Result<Self> {
        config.validate()?;
        let key = SigningKey::from_jwk_json(&config.jwk)?;
        let http = Client::builder()
            .user_agent(concat!("maskinporten-operator/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        let inner = Arc::new(ProviderInner {
            config,
            http,
            key,
            executor: RetryingExecutor::new(policy),
        });

        let discovery = Arc::new(ExpiringCache::new("discovery", DISCOVERY_TTL, {
            let inner = Arc::clone(&inner);
            move || {
                let inner = Arc::clone(&inner);
                async move { inner.fetch_discovery().await }
            }
        }));

        let access_token = ExpiringCache::new("access_token", ACCESS_TOKEN_TTL, {
            let inner = Arc::clone(&inner);
            let discovery = Arc::clone(&discovery);
            move || {
                let inner = Arc::clone(&inner);
                let discovery = Arc::clone(&discovery);
                async move { inner.fetch_access_token(&discovery).await }
            }
        });

        Ok(Self {
            inner,
            discovery,
            access_token,
        })
    }

    pub fn config(&self) -> &MaskinportenApiConfig {
        &self.inner.config
    }

    /// Authorization server metadata, cached for [`DISCOVERY_TTL`].
    #[instrument(skip(self))]
    pub async fn discovery_metadata(&self) -> Result<Arc<DiscoveryMetadata>> {
        self.discovery.get().await
    }

    /// Sign a fresh JWT-bearer assertion. Never cached.
    pub async fn create_grant(&self) -> Result<String> {
        let metadata = self.discovery.get().await?;
        self.inner.sign_grant(&metadata)
    }

    /// Access token for the operator's own client, cached for [`ACCESS_TOKEN_TTL`].
    #[instrument(skip(self))]
    pub async fn access_token(&self) -> Result<Arc<TokenResponse>> {
        self.access_token.get().await
    }

    /// Forget the cached access token, e.g. after a downstream API rejected it.
    pub async fn invalidate_access_token(&self) {
        self.access_token.invalidate().await;
    }

    /// A POST request to `endpoint` carrying the cached access token as a
    /// bearer credential.
    pub async fn authorized_request(&self, endpoint: &str) -> Result<reqwest::Request> {
        let url = Url::parse(endpoint)
            .map_err(|e| Error::ValidationError(format!("Invalid endpoint {endpoint}: {e}")))?;
        let token = self.access_token().await?;

        self.inner
            .http
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .bearer_auth(&token.access_token)
            .build()
            .map_err(Error::HttpError)
    }
}

impl ProviderInner {
    async fn fetch_discovery(&self) -> Result<DiscoveryMetadata> {
        let url = self.config.endpoint(WELL_KNOWN_PATH)?;
        debug!(url = %url, "Fetching authorization server metadata");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(Error::HttpError)?;
        if response.status() != StatusCode::OK {
            return Err(Error::UnexpectedStatusError {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let metadata: DiscoveryMetadata = decode_json(response).await?;
        info!(issuer = %metadata.issuer, "Loaded authorization server metadata");
        Ok(metadata)
    }

    fn sign_grant(&self, metadata: &DiscoveryMetadata) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = GrantClaims {
            aud: metadata.issuer.clone(),
            iss: self.config.client_id.clone(),
            iat: now,
            nbf: now,
            exp: now + GRANT_LIFETIME_SECS,
            jti: Uuid::new_v4().to_string(),
            scope: self.config.scope.clone(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.kid.clone();

        jsonwebtoken::encode(&header, &claims, &self.key.encoding_key)
            .map_err(|e| Error::SigningError(e.to_string()))
    }

    async fn fetch_access_token(
        &self,
        discovery: &ExpiringCache<DiscoveryMetadata>,
    ) -> Result<TokenResponse> {
        let url = self.config.endpoint(TOKEN_PATH)?;
        let endpoint = &url;

        // Discovery stays outside the retry loop.
        let metadata = discovery.get().await?;
        let metadata = metadata.as_ref();

        // Each attempt signs its own grant so a late retry never presents an
        // expired assertion.
        let result = self
            .executor
            .execute(move || async move {
                let grant = self.sign_grant(metadata)?;
                send_classified(
                    self.http
                        .post(endpoint.clone())
                        .query(&[
                            ("grant_type", JWT_BEARER_GRANT_TYPE),
                            ("assertion", grant.as_str()),
                        ])
                        .header(CONTENT_TYPE, FORM_CONTENT_TYPE),
                )
                .await
            })
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                record_token_fetch("failure");
                return Err(err);
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            record_token_fetch("rejected");
            return Err(if status.is_client_error() {
                Error::ClientError {
                    status: status.as_u16(),
                    url: url.to_string(),
                }
            } else {
                Error::UnexpectedStatusError {
                    status: status.as_u16(),
                    url: url.to_string(),
                }
            });
        }

        let token: TokenResponse = match decode_json(response).await {
            Ok(token) => token,
            Err(err) => {
                record_token_fetch("failure");
                return Err(err);
            }
        };
        record_token_fetch("success");
        info!(
            expires_in = token.expires_in,
            scope = %token.scope,
            "Obtained Maskinporten access token"
        );
        Ok(token)
    }
}

/// Decode a JSON body. Undecodable payloads are permanent failures, only a
/// broken connection while reading the body stays [`Error::HttpError`].
async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let url = response.url().to_string();
    response.json().await.map_err(|e| {
        if e.is_decode() {
            Error::DecodeError {
                url,
                message: e.to_string(),
            }
        } else {
            Error::HttpError(e)
        }
    })
}

#[cfg(feature = "metrics")]
fn record_token_fetch(outcome: &str) {
    crate::controller::metrics::inc_token_fetch(outcome);
}

#[cfg(not(feature = "metrics"))]
fn record_token_fetch(_outcome: &str) {}
