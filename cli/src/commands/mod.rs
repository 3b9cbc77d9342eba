mod account;
mod browse;
mod favorites;
mod helpers;
mod ingredients;
mod recipe;
mod search;

use anyhow::Result;
use std::sync::Arc;

use pantry_core::account::AccountService;
use pantry_core::error::AuthError;
use pantry_core::identity::{IdentityContext, IdentityProvider};
use pantry_core::models::UserId;
use pantry_core::selection::SelectionRetention;
use pantry_core::service::{PantryService, RecipeApi};

use crate::config::Config;
use crate::session::SessionStore;
use crate::spoonacular::SpoonacularClient;
use crate::supabase::{AuthClient, RestStore, Supabase};

use helpers::exit_with;

pub(crate) use account::{
    cmd_login, cmd_logout, cmd_redirect, cmd_register, cmd_rename, cmd_reset_password,
    cmd_update_password, cmd_whoami,
};
pub(crate) use browse::cmd_browse;
pub(crate) use favorites::{cmd_favorite, cmd_favorites};
pub(crate) use ingredients::{cmd_ingredients, cmd_suggest};
pub(crate) use recipe::{cmd_comment, cmd_rate, cmd_recipe};
pub(crate) use search::cmd_search;

/// Everything a command needs: the services and the session on disk.
pub(crate) struct App {
    pub service: PantryService,
    pub accounts: AccountService,
    pub auth: Arc<AuthClient>,
    pub supabase: Arc<Supabase>,
    pub sessions: SessionStore,
    pub retention: SelectionRetention,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let settings = &config.settings;
        tracing::debug!(data_dir = %config.data_dir.display(), "loaded configuration");
        let (url, anon_key) = settings.require_supabase()?;
        let supabase = Arc::new(Supabase::new(url, anon_key, settings.timeout_secs)?);
        let api = SpoonacularClient::new(
            &settings.spoonacular_url,
            settings.spoonacular_api_key.clone(),
            settings.timeout_secs,
        )?;
        Ok(Self::from_parts(
            supabase,
            Arc::new(api),
            SessionStore::new(&config.session_path),
            settings.selection_retention,
        ))
    }

    pub(crate) fn from_parts(
        supabase: Arc<Supabase>,
        api: Arc<dyn RecipeApi>,
        sessions: SessionStore,
        retention: SelectionRetention,
    ) -> Self {
        supabase.set_session(sessions.load());
        let service = PantryService::new(Arc::new(RestStore::new(Arc::clone(&supabase))), api);
        let auth = Arc::new(AuthClient::new(Arc::clone(&supabase)));
        let provider: Arc<dyn IdentityProvider> = Arc::<AuthClient>::clone(&auth);
        Self {
            service,
            accounts: AccountService::new(provider),
            auth,
            supabase,
            sessions,
            retention,
        }
    }

    /// Who is signed in, according to the stored session.
    pub fn identity(&self) -> IdentityContext {
        self.supabase
            .session()
            .map_or_else(IdentityContext::anonymous, |s| {
                IdentityContext::signed_in(s.user)
            })
    }

    /// The signed-in user's id, or exit asking the user to log in.
    pub fn require_user(&self, json: bool) -> UserId {
        match self.identity().require() {
            Ok(user) => user.id,
            Err(e) => exit_with(json, &e.user_message(), 1),
        }
    }

    /// Write the client's current session to disk, or remove the file when
    /// signed out.
    pub fn persist_session(&self) -> Result<()> {
        tracing::debug!(path = %self.sessions.path().display(), "persisting session");
        match self.supabase.session() {
            Some(session) => self.sessions.save(&session),
            None => self.sessions.clear(),
        }
    }
}

/// Exit with the message the user should see for an auth failure.
pub(super) fn exit_auth(json: bool, err: &AuthError) -> ! {
    exit_with(json, &err.user_message(), 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubServer;
    use crate::supabase::tests::session;

    fn app(server: &StubServer, dir: &std::path::Path) -> App {
        let supabase = Arc::new(Supabase::new(&server.base_url, "anon", 5).unwrap());
        App::from_parts(
            supabase,
            Arc::new(SpoonacularClient::new(&server.base_url, None, 5).unwrap()),
            SessionStore::new(dir.join("session.json")),
            SelectionRetention::Remember,
        )
    }

    #[tokio::test]
    async fn test_stored_session_signs_the_app_in() {
        let server = StubServer::start(vec![]).await;
        let dir = tempfile::tempdir().unwrap();
        let stored = session("jwt-1");
        SessionStore::new(dir.path().join("session.json"))
            .save(&stored)
            .unwrap();

        let app = app(&server, dir.path());
        assert_eq!(app.identity().user_id(), Some(stored.user.id));
        assert_eq!(app.require_user(false), stored.user.id);
    }

    #[tokio::test]
    async fn test_persist_session_follows_client_state() {
        let server = StubServer::start(vec![]).await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&server, dir.path());
        assert!(app.identity().user().is_none());

        app.supabase.set_session(Some(session("jwt-2")));
        app.persist_session().unwrap();
        assert!(app.sessions.path().exists());

        app.supabase.set_session(None);
        app.persist_session().unwrap();
        assert!(!app.sessions.path().exists());
    }
}
