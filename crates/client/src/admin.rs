//! Admin bootstrap guard.
//!
//! Tracks whether the session may use write-capable surfaces. The remote
//! service is the only authority on roles: the guard never assumes admin
//! status, it asks. The first admin is created through a one-time claim
//! that forwards a secret token to `assignCallerUserRole`.
//!
//! ```text
//! Unauthenticated --login--> AuthenticatedNonAdmin --claim ok--> AuthenticatedAdmin
//!        ^                           |                                  |
//!        +----------logout-----------+-------------logout---------------+
//! ```

use std::sync::Arc;

use machinery_store_core::{Principal, UserRole};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::client::StoreClient;
use crate::error::{ClientError, ValidationError};
use crate::remote::{RoleAssignment, StoreBackend};

/// Message fragments meaning another identity already holds admin.
///
/// The remote service reports claim failures as free text only. This match
/// breaks if the wording changes; a structured error code is needed to fix
/// it properly.
const ALREADY_ASSIGNED_MARKERS: &[&str] = &["already", "assigned"];

static SIGNED_OUT: AccessState = AccessState::Unauthenticated;

/// Whether this session may still attempt an admin claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    Open,
    /// The service reported admin as already assigned. Cleared by logging in
    /// again.
    Locked,
}

/// Access level of the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessState {
    Unauthenticated,
    AuthenticatedNonAdmin {
        principal: Principal,
        claim: ClaimStatus,
    },
    AuthenticatedAdmin {
        principal: Principal,
    },
}

impl AccessState {
    #[must_use]
    pub const fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Unauthenticated => None,
            Self::AuthenticatedNonAdmin { principal, .. } | Self::AuthenticatedAdmin { principal } => {
                Some(principal)
            }
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::AuthenticatedAdmin { .. })
    }

    /// Role implied by this state, for display.
    #[must_use]
    pub const fn role(&self) -> UserRole {
        match self {
            Self::Unauthenticated => UserRole::Guest,
            Self::AuthenticatedNonAdmin { .. } => UserRole::User,
            Self::AuthenticatedAdmin { .. } => UserRole::Admin,
        }
    }
}

/// Admin claim failures.
#[derive(Debug, Clone, Error)]
pub enum ClaimError {
    /// Another identity already holds the admin role. Retrying will not help.
    #[error("Admin is already assigned to another account: {0}")]
    AlreadyAssigned(String),

    /// The secret did not match. The claim may be retried.
    #[error("Incorrect admin token: {0}")]
    IncorrectToken(String),

    #[error("Log in before claiming admin access")]
    NotAuthenticated,

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl From<ValidationError> for ClaimError {
    fn from(err: ValidationError) -> Self {
        Self::Client(err.into())
    }
}

/// Map a failed role assignment to a claim outcome.
///
/// Service rejections mentioning an existing assignment are conflicts; any
/// other service rejection is treated as a wrong token. Connectivity and
/// decoding failures pass through unchanged.
#[must_use]
pub fn classify_claim_failure(err: ClientError) -> ClaimError {
    match err {
        ClientError::Remote(message) | ClientError::Unauthorized(message) => {
            let lower = message.to_lowercase();
            if ALREADY_ASSIGNED_MARKERS.iter().any(|m| lower.contains(m)) {
                ClaimError::AlreadyAssigned(message)
            } else {
                ClaimError::IncorrectToken(message)
            }
        }
        other => ClaimError::Client(other),
    }
}

/// Gate for write-capable operations.
///
/// The access state belongs to the session the guard logged in to. If the
/// client is connected elsewhere or disconnected behind the guard's back,
/// the guard reads as unauthenticated until the next [`AdminGuard::login`].
pub struct AdminGuard {
    client: StoreClient,
    state: AccessState,
    session: u64,
}

impl AdminGuard {
    #[must_use]
    pub fn new(client: StoreClient) -> Self {
        let session = client.session();
        Self {
            client,
            state: AccessState::Unauthenticated,
            session,
        }
    }

    fn is_current(&self) -> bool {
        self.client.session() == self.session
    }

    fn forget_stale(&mut self) {
        if self.is_current() {
            return;
        }
        if let Some(principal) = self.state.principal() {
            warn!(principal = %principal, "Session changed outside the guard, dropping access");
        }
        self.state = AccessState::Unauthenticated;
        self.session = self.client.session();
    }

    #[must_use]
    pub fn state(&self) -> &AccessState {
        if self.is_current() {
            &self.state
        } else {
            &SIGNED_OUT
        }
    }

    #[must_use]
    pub const fn client(&self) -> &StoreClient {
        &self.client
    }

    /// Start a session on `backend` and ask the service for the caller's role.
    ///
    /// An anonymous backend connects for browsing and leaves the guard
    /// unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns the role query failure. The session stays authenticated as a
    /// non-admin in that case.
    #[instrument(skip_all)]
    pub async fn login(&mut self, backend: Arc<dyn StoreBackend>) -> Result<&AccessState, ClientError> {
        let principal = backend.caller().cloned();
        self.client.connect(backend);
        self.session = self.client.session();

        let Some(principal) = principal else {
            self.state = AccessState::Unauthenticated;
            return Ok(&self.state);
        };

        info!(principal = %principal, "Logged in");
        self.state = AccessState::AuthenticatedNonAdmin {
            principal,
            claim: ClaimStatus::Open,
        };
        self.refresh().await
    }

    /// Re-query the caller's admin status.
    ///
    /// # Errors
    ///
    /// Returns the role query failure and leaves the state unchanged.
    pub async fn refresh(&mut self) -> Result<&AccessState, ClientError> {
        self.forget_stale();
        let Some(principal) = self.state.principal().cloned() else {
            return Ok(&self.state);
        };

        let is_admin = self.client.is_admin().await.inspect_err(|err| {
            warn!(error = %err, "Role query failed");
        })?;

        self.state = match (&self.state, is_admin) {
            (_, true) => AccessState::AuthenticatedAdmin { principal },
            (AccessState::AuthenticatedNonAdmin { claim, .. }, false) => {
                AccessState::AuthenticatedNonAdmin {
                    principal,
                    claim: *claim,
                }
            }
            (_, false) => AccessState::AuthenticatedNonAdmin {
                principal,
                claim: ClaimStatus::Open,
            },
        };
        Ok(&self.state)
    }

    /// Claim the admin role with the one-time secret.
    ///
    /// On success the role keys are invalidated and re-queried; the guard
    /// moves to admin only if the service confirms it.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::NotAuthenticated`] without a logged-in identity
    /// - [`ClaimError::AlreadyAssigned`] if admin is held by someone else;
    ///   later claims this session fail without a remote call
    /// - [`ClaimError::IncorrectToken`] if the secret was rejected
    /// - [`ClaimError::Client`] for blank tokens and connectivity failures
    #[instrument(skip_all)]
    pub async fn claim(&mut self, token: SecretString) -> Result<&AccessState, ClaimError> {
        self.forget_stale();
        let principal = match &self.state {
            AccessState::Unauthenticated => return Err(ClaimError::NotAuthenticated),
            AccessState::AuthenticatedNonAdmin {
                claim: ClaimStatus::Locked,
                ..
            } => {
                return Err(ClaimError::AlreadyAssigned(
                    "admin role already assigned".to_string(),
                ));
            }
            AccessState::AuthenticatedNonAdmin { principal, .. }
            | AccessState::AuthenticatedAdmin { principal } => principal.clone(),
        };

        if token.expose_secret().trim().is_empty() {
            return Err(ValidationError::EmptyToken.into());
        }

        let assignment = RoleAssignment::admin_claim(principal.clone(), token);
        if let Err(err) = self.client.assign_caller_user_role(&assignment).await {
            let err = classify_claim_failure(err);
            if matches!(err, ClaimError::AlreadyAssigned(_))
                && let AccessState::AuthenticatedNonAdmin { claim, .. } = &mut self.state
            {
                *claim = ClaimStatus::Locked;
            }
            warn!(principal = %principal, error = %err, "Admin claim rejected");
            return Err(err);
        }

        let state = self.refresh().await?;
        if state.is_admin() {
            info!(principal = %principal, "Admin role claimed");
        } else {
            warn!(principal = %principal, "Claim accepted but role not confirmed");
        }
        Ok(&self.state)
    }

    /// End the session. Cached data and the role answer are dropped.
    pub fn logout(&mut self) {
        if let Some(principal) = self.state().principal() {
            info!(principal = %principal, "Logged out");
        }
        self.client.disconnect();
        self.session = self.client.session();
        self.state = AccessState::Unauthenticated;
    }

    #[must_use]
    pub fn can_write(&self) -> bool {
        self.state().is_admin()
    }

    /// The admin principal, or an authorization error.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unauthorized`] unless the server confirmed admin.
    pub fn require_admin(&self) -> Result<&Principal, ClientError> {
        match self.state() {
            AccessState::AuthenticatedAdmin { principal } => Ok(principal),
            AccessState::AuthenticatedNonAdmin { .. } => Err(ClientError::Unauthorized(
                "admin role required".to_string(),
            )),
            AccessState::Unauthenticated => {
                Err(ClientError::Unauthorized("login required".to_string()))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_already_assigned_is_a_conflict() {
        let err = classify_claim_failure(ClientError::Remote(
            "Admin has already been claimed".to_string(),
        ));
        assert!(matches!(err, ClaimError::AlreadyAssigned(_)));

        let err = classify_claim_failure(ClientError::Unauthorized(
            "Role ASSIGNED to another principal".to_string(),
        ));
        assert!(matches!(err, ClaimError::AlreadyAssigned(_)));
    }

    #[test]
    fn test_other_rejections_are_incorrect_token() {
        let err = classify_claim_failure(ClientError::Remote("Invalid secret".to_string()));
        assert!(matches!(err, ClaimError::IncorrectToken(_)));
    }

    #[test]
    fn test_connectivity_failures_pass_through() {
        let err = classify_claim_failure(ClientError::Transport("reset".to_string()));
        assert!(matches!(err, ClaimError::Client(ClientError::Transport(_))));
        let err = classify_claim_failure(ClientError::NotConnected);
        assert!(matches!(err, ClaimError::Client(ClientError::NotConnected)));
    }

    #[test]
    fn test_state_roles() {
        let principal = Principal::parse("aaaaa-aa").unwrap();
        assert_eq!(AccessState::Unauthenticated.role(), UserRole::Guest);
        assert!(AccessState::Unauthenticated.principal().is_none());

        let user = AccessState::AuthenticatedNonAdmin {
            principal: principal.clone(),
            claim: ClaimStatus::Open,
        };
        assert_eq!(user.role(), UserRole::User);
        assert!(!user.is_admin());

        let admin = AccessState::AuthenticatedAdmin { principal };
        assert!(admin.is_admin());
        assert_eq!(admin.role(), UserRole::Admin);
    }

    #[tokio::test]
    async fn test_unauthenticated_guard_denies_writes_and_claims() {
        let mut guard = AdminGuard::new(StoreClient::new(&crate::config::CacheConfig::default()));
        assert!(!guard.can_write());
        assert!(matches!(
            guard.require_admin(),
            Err(ClientError::Unauthorized(_))
        ));
        let err = guard
            .claim(SecretString::from("secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::NotAuthenticated));
    }
}
