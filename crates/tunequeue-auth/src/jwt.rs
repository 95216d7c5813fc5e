//! HS256 JWT verification for connection credentials.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tunequeue_protocol::UserId;

use crate::{AuthError, Authenticator, UserDirectory, UserIdentity};

/// JWT verification settings.
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared secret the tokens are signed with.
    pub secret: String,
    /// Required `iss` claim. `None` accepts any issuer.
    pub issuer: Option<String>,
}

impl JwtConfig {
    /// Creates a config for `secret` with no issuer check.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
        }
    }

    /// Loads `JWT_SECRET` and optional `JWT_ISSUER` from the environment.
    ///
    /// Returns `None` if `JWT_SECRET` is unset or empty.
    pub fn from_env() -> Option<Self> {
        let secret = std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty())?;
        let issuer = std::env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty());
        Some(Self { secret, issuer })
    }

    /// Requires tokens to carry this `iss` claim.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// The claims we read. Tokens minted by the account service put the user id
/// in `_id`; standard issuers use `sub`. When both are present `_id` wins.
#[derive(Debug, Clone, Deserialize)]
struct Claims {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[allow(dead_code)]
    exp: u64,
}

impl Claims {
    fn user_id(self) -> Option<UserId> {
        self.id.or(self.sub).filter(|id| !id.is_empty()).map(UserId)
    }
}

/// Verifies a JWT, then resolves its subject through a [`UserDirectory`].
pub struct JwtAuthenticator<D: UserDirectory> {
    decoding_key: DecodingKey,
    validation: Validation,
    directory: D,
}

impl<D: UserDirectory> JwtAuthenticator<D> {
    /// Creates an authenticator for `config` that resolves users in `directory`.
    pub fn new(config: JwtConfig, directory: D) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Strict expiry: a token is dead the second it expires.
        validation.leeway = 0;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            directory,
        }
    }

    /// The directory users are resolved in.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => {
                    tracing::debug!(error = %e, "jwt rejected");
                    AuthError::InvalidToken
                }
            },
        )?;

        data.claims.user_id().ok_or(AuthError::InvalidToken)
    }
}

impl<D: UserDirectory> Authenticator for JwtAuthenticator<D> {
    async fn authenticate(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let user_id = self.verify(token)?;
        match self.directory.find_user(&user_id).await? {
            Some(user) => Ok(user),
            None => Err(AuthError::UnknownUser(user_id)),
        }
    }
}
