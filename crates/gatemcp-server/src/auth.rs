//! Request authentication.
//!
//! The authenticator runs once per incoming message, using credentials
//! extracted from the first request in the (possibly batched) message.
//! Two modes are implemented: no authentication, and a pre-shared API key
//! read from `params.apiKey`. Token and certificate modes are declared in
//! the credential taxonomy but fail until a transport supplies metadata
//! for them.

use gatemcp_core::logging::{debug, targets};
use gatemcp_core::{AuthContext, AuthKind, McpError, McpResult};
use gatemcp_protocol::JsonRpcRequest;

/// Verifies message credentials and produces an [`AuthContext`].
#[derive(Debug, Clone)]
pub struct Authenticator {
    require: AuthKind,
    api_key: Option<String>,
}

impl Authenticator {
    /// An authenticator that accepts any caller as `anonymous`.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            require: AuthKind::None,
            api_key: None,
        }
    }

    /// An authenticator requiring the given pre-shared API key.
    #[must_use]
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            require: AuthKind::ApiKey,
            api_key: Some(key.into()),
        }
    }

    /// Builds the authenticator implied by an optional configured key.
    #[must_use]
    pub fn from_config(api_key: Option<&str>) -> Self {
        match api_key {
            Some(key) => Self::api_key(key),
            None => Self::disabled(),
        }
    }

    /// Returns the required credential kind.
    #[must_use]
    pub fn required_kind(&self) -> AuthKind {
        self.require
    }

    /// Authenticates a message from its first request.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when credentials are missing or wrong, and
    /// `InternalError` for credential kinds with no implementation.
    pub fn authenticate(&self, first_request: Option<&JsonRpcRequest>) -> McpResult<AuthContext> {
        match self.require {
            AuthKind::None => Ok(AuthContext::anonymous()),
            AuthKind::ApiKey => {
                let configured = self
                    .api_key
                    .as_deref()
                    .ok_or_else(|| McpError::internal_error("API key auth without a key"))?;
                let presented = first_request.and_then(|req| req.param_str("apiKey"));
                match presented {
                    Some(key) if key.as_bytes() == configured.as_bytes() => {
                        debug!(target: targets::AUTH, "API key accepted");
                        Ok(AuthContext::authenticated(
                            AuthKind::ApiKey,
                            "authenticated_client",
                        ))
                    }
                    _ => {
                        debug!(target: targets::AUTH, "API key rejected");
                        Err(McpError::invalid_request("Authentication failed"))
                    }
                }
            }
            AuthKind::Token | AuthKind::Cert => Err(McpError::internal_error(
                "Credential type not implemented",
            )),
        }
    }
}
