use crate::config::AuthConfig;
use crate::domain::auth::{AuthSession, Claims, Identity};
use crate::domain::user::User;
use crate::error::{AppError, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use opentelemetry::{KeyValue, global, metrics::Counter};
use time::OffsetDateTime;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Clone, Debug)]
struct Metrics {
    issued_total: Counter<u64>,
    verifications_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("reeltalk-server");
        Self {
            issued_total: meter
                .u64_counter("reeltalk_auth_tokens_issued_total")
                .with_description("Total access tokens issued")
                .build(),
            verifications_total: meter
                .u64_counter("reeltalk_auth_verifications_total")
                .with_description("Access token verifications by outcome")
                .build(),
        }
    }
}

/// Issues and verifies access tokens. Every trust decision in the server goes through
/// [`AuthService::verify_token`].
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    metrics: Metrics,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").field("token_ttl_secs", &self.config.token_ttl_secs).finish_non_exhaustive()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            config,
            validation,
            metrics: Metrics::new(),
        }
    }

    /// Verifies the signature and expiry of a raw token.
    ///
    /// # Errors
    /// Returns `AppError::Unauthorized` if the token is empty, malformed, expired or badly signed.
    pub fn verify_token(&self, token: &str) -> Result<Identity> {
        let token = token.trim();
        if token.is_empty() {
            self.record_verification("missing");
            return Err(AppError::Unauthorized);
        }

        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => {
                self.record_verification("ok");
                Ok(data.claims.into())
            }
            Err(e) => {
                tracing::debug!(error = %e, "Token verification failed");
                self.record_verification("rejected");
                Err(AppError::Unauthorized)
            }
        }
    }

    /// Verifies an `Authorization` header value, which must use the `Bearer` scheme.
    ///
    /// # Errors
    /// Returns `AppError::Unauthorized` if the scheme is missing or the token is invalid.
    pub fn verify_bearer(&self, header_value: &str) -> Result<Identity> {
        let token = header_value.strip_prefix(BEARER_PREFIX).ok_or(AppError::Unauthorized)?;
        self.verify_token(token)
    }

    /// Verifies a credential supplied at gateway handshake, where the `Bearer ` prefix is optional.
    ///
    /// # Errors
    /// Returns `AppError::Unauthorized` if the token is invalid.
    pub fn verify_handshake(&self, credential: &str) -> Result<Identity> {
        let credential = credential.trim_start();
        let token = credential.strip_prefix(BEARER_PREFIX).unwrap_or(credential);
        self.verify_token(token)
    }

    /// Checks the secret presented by the OAuth callback when one is configured.
    ///
    /// # Errors
    /// Returns `AppError::Unauthorized` if a secret is configured and `presented` does not match it.
    pub fn verify_exchange(&self, presented: Option<&str>) -> Result<()> {
        let Some(expected) = self.config.exchange_secret.as_deref() else {
            return Ok(());
        };
        if presented.is_some_and(|p| p.as_bytes() == expected.as_bytes()) {
            Ok(())
        } else {
            self.record_verification("exchange_rejected");
            Err(AppError::Unauthorized)
        }
    }

    /// Issues an access token for `user` valid for the configured TTL.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the token cannot be signed.
    #[tracing::instrument(err, skip(self, user), fields(user_id = %user.id))]
    pub fn issue(&self, user: &User) -> Result<AuthSession> {
        let iat = u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or_default();
        let exp = iat + self.config.token_ttl_secs;

        let claims = Claims {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            avatar: user.avatar.clone(),
            iat,
            exp,
        };
        let token = self.sign(&claims)?;
        self.metrics.issued_total.add(1, &[]);

        Ok(AuthSession { token, expires_at: exp })
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            AppError::Internal
        })
    }

    fn record_verification(&self, outcome: &'static str) {
        self.metrics.verifications_total.add(1, &[KeyValue::new("outcome", outcome)]);
    }
}
