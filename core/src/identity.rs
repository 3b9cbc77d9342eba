use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::AuthError;
use crate::models::UserId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl User {
    /// The `full_name` metadata, or the part of the email before `@`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self.user_metadata.full_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => self.email.split('@').next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(Session),
    SignedOut,
    PasswordRecovery,
    UserUpdated(User),
}

impl SessionEvent {
    #[must_use]
    pub fn has_session(&self) -> bool {
        matches!(self, Self::SignedIn(_) | Self::UserUpdated(_))
    }
}

/// Fields of the signed-in user to change. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub password: Option<String>,
    pub full_name: Option<String>,
}

/// Sign-up / sign-in / recovery against the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Result<Option<User>, AuthError>;

    /// Returns the session when the provider signs the user in right away,
    /// `None` when the address has to be confirmed first.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Option<Session>, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError>;

    async fn update_user(&self, update: UserUpdate) -> Result<User, AuthError>;

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// The signed-in user, resolved once and passed to the operations that need it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityContext {
    user: Option<User>,
}

impl IdentityContext {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub async fn resolve(provider: &dyn IdentityProvider) -> Result<Self, AuthError> {
        Ok(Self {
            user: provider.current_user().await?,
        })
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn require(&self) -> Result<&User, AuthError> {
        self.user.as_ref().ok_or(AuthError::NotSignedIn)
    }

    /// Apply a session change.
    pub fn observe(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::SignedIn(session) => self.user = Some(session.user.clone()),
            SessionEvent::UserUpdated(user) => self.user = Some(user.clone()),
            SessionEvent::SignedOut => self.user = None,
            SessionEvent::PasswordRecovery => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Home,
    Login,
    UpdatePassword,
}

impl Route {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Home => "/home",
            Self::Login => "/login",
            Self::UpdatePassword => "/update-password",
        }
    }
}

/// Whether a redirect fragment (`#access_token=..&type=recovery`) comes from a
/// password recovery link.
#[must_use]
pub fn is_recovery_fragment(fragment: &str) -> bool {
    fragment
        .trim_start_matches('#')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .any(|(k, v)| k == "type" && v == "recovery")
}

/// Where to send the user after the auth redirect lands.
#[must_use]
pub fn redirect_for(fragment: Option<&str>, has_session: bool) -> Route {
    if fragment.is_some_and(is_recovery_fragment) {
        Route::UpdatePassword
    } else if has_session {
        Route::Home
    } else {
        Route::Login
    }
}
