//! Authentication state backed by the durable token store.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{AuthError, TransportError},
    fallback::{with_fallback, Resolved},
    http::HttpClient,
    models::{Identity, Session},
};

/// Sentinel token stored for locally synthesized sessions.
pub const DEMO_TOKEN: &str = "demo-token";
/// Credentials offered by the login screen's demo shortcut.
pub const DEMO_CREDENTIALS: (&str, &str) = ("demo@user.com", "demo");

const LOGIN_PATH: &str = "/auth/login";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Successful `POST /auth/login` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for later requests.
    pub access_token: String,
    /// The signed-in user.
    pub user: Identity,
}

impl HttpClient {
    /// `POST /auth/login` with an email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, TransportError> {
        self.post_json(LOGIN_PATH, &LoginRequest { email, password })
            .await
    }
}

/// Process-wide session state. Clones share the same session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    client: HttpClient,
    demo_fallback: bool,
    identity: Arc<RwLock<Option<Identity>>>,
}

impl SessionStore {
    /// Create a signed-out store; call [`SessionStore::restore`] to pick up a persisted token.
    pub fn new(client: HttpClient, demo_fallback: bool) -> Self {
        Self {
            client,
            demo_fallback,
            identity: Arc::new(RwLock::new(None)),
        }
    }

    /// Rebuild the session from durable state.
    ///
    /// The token is trusted as-is; there is no round-trip to the backend.
    pub fn restore(&self) -> Session {
        let token = self.client.tokens().token();
        let mut identity = self.identity.write();
        *identity = token.as_ref().map(|_| Identity::placeholder());
        if token.is_some() {
            info!("restored persisted session");
        }
        Session {
            identity: identity.clone(),
            token,
        }
    }

    /// Current session. A token cleared elsewhere (e.g. after a 401) reads as signed out.
    pub fn current(&self) -> Session {
        let token = self.client.tokens().token();
        let identity = match token {
            Some(_) => self.identity.read().clone(),
            None => None,
        };
        Session { identity, token }
    }

    /// Whether a token is present.
    pub fn is_authenticated(&self) -> bool {
        self.current().is_authenticated()
    }

    /// Sign in, falling back to a local demo session when the backend cannot be used.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<Session, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(AuthError::CredentialsRequired);
        }

        if !self.demo_fallback {
            return self.login_strict(identifier, secret).await;
        }

        let remote = self.client.login(identifier, secret).await;
        let resolved = with_fallback(
            remote.map(|response| (response.access_token, response.user.normalized())),
            |_| true,
            || (DEMO_TOKEN.to_string(), Identity::demo(identifier)),
        );
        if let Resolved::Fallback { reason, .. } = &resolved {
            warn!(%identifier, %reason, "login failed; continuing with demo session");
        }
        let (token, identity) = resolved.into_value();
        self.establish(token, identity)
    }

    /// Sign in without the demo fallback, surfacing backend rejections.
    pub async fn login_strict(&self, identifier: &str, secret: &str) -> Result<Session, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(AuthError::CredentialsRequired);
        }
        let response = self
            .client
            .login(identifier, secret)
            .await
            .map_err(rejection)?;
        self.establish(response.access_token, response.user.normalized())
    }

    /// Forget the token and identity. Safe to call repeatedly.
    pub fn logout(&self) {
        if let Err(err) = self.client.tokens().clear_token() {
            warn!("failed to remove persisted token: {err}");
        }
        *self.identity.write() = None;
        info!("signed out");
    }

    fn establish(&self, token: String, identity: Identity) -> Result<Session, AuthError> {
        if let Err(err) = self.client.tokens().set_token(&token) {
            // In-memory session stays valid for this run.
            warn!("failed to persist token: {err}");
        }
        info!(email = %identity.email, "signed in");
        *self.identity.write() = Some(identity.clone());
        Ok(Session {
            identity: Some(identity),
            token: Some(token),
        })
    }
}

fn rejection(err: TransportError) -> AuthError {
    match err.detail() {
        Some(detail) => AuthError::Rejected(detail.to_string()),
        None => AuthError::Rejected(format!("Login failed: {err}")),
    }
}
