use std::sync::Arc;

use tracing::{debug, error};

use crate::error::AuthError;
use crate::identity::{IdentityProvider, Session, User, UserUpdate};

pub const REGISTERED: &str =
    "Cadastro realizado com sucesso! Verifique seu e-mail para confirmar a conta.";
pub const SIGNED_IN: &str = "Login realizado com sucesso!";
pub const RESET_EMAIL_SENT: &str = "Verifique seu e-mail para o link de redefinição de senha.";
pub const PASSWORD_UPDATED: &str = "Senha atualizada com sucesso! Redirecionando...";
pub const NAME_UPDATED: &str = "Nome de usuário atualizado com sucesso!";

const FILL_ALL_FIELDS: &str = "Preencha todos os campos!";
const PASSWORDS_DIFFER: &str = "As senhas não coincidem!";

/// The sign-up form.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirmation: String,
}

impl Registration {
    pub fn validate(&self) -> Result<(), AuthError> {
        let fields = [&self.name, &self.email, &self.password, &self.confirmation];
        if fields.iter().any(|f| f.is_empty()) {
            return Err(AuthError::Validation(FILL_ALL_FIELDS));
        }
        if self.password != self.confirmation {
            return Err(AuthError::Validation(PASSWORDS_DIFFER));
        }
        Ok(())
    }
}

/// Account flows with form validation in front of the identity provider.
///
/// Nothing reaches the provider until the form is valid. Provider errors are
/// logged and passed back unchanged.
#[derive(Clone)]
pub struct AccountService {
    provider: Arc<dyn IdentityProvider>,
}

impl AccountService {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    #[must_use]
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    pub async fn register(&self, form: &Registration) -> Result<Option<Session>, AuthError> {
        form.validate()?;
        debug!(email = %form.email, "registering");
        self.provider
            .sign_up(&form.email, &form.password, Some(form.name.trim()))
            .await
            .inspect_err(|e| error!("Error registering: {e}"))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(FILL_ALL_FIELDS));
        }
        self.provider
            .sign_in_with_password(email, password)
            .await
            .inspect_err(|e| error!("Error signing in: {e}"))
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.provider
            .sign_out()
            .await
            .inspect_err(|e| error!("Error signing out: {e}"))
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::Validation(FILL_ALL_FIELDS));
        }
        self.provider
            .reset_password_for_email(email.trim())
            .await
            .inspect_err(|e| error!("Error resetting password: {e}"))
    }

    pub async fn update_password(&self, password: &str, confirmation: &str) -> Result<User, AuthError> {
        if password.is_empty() {
            return Err(AuthError::Validation(FILL_ALL_FIELDS));
        }
        if password != confirmation {
            return Err(AuthError::Validation(PASSWORDS_DIFFER));
        }
        self.provider
            .update_user(UserUpdate {
                password: Some(password.to_string()),
                ..UserUpdate::default()
            })
            .await
            .inspect_err(|e| error!("Error updating password: {e}"))
    }

    pub async fn update_display_name(&self, name: &str) -> Result<User, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation(FILL_ALL_FIELDS));
        }
        self.provider
            .update_user(UserUpdate {
                full_name: Some(name.to_string()),
                ..UserUpdate::default()
            })
            .await
            .inspect_err(|e| error!("Error updating display name: {e}"))
    }
}
