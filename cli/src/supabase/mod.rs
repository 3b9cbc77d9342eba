mod auth;
mod rest;

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use pantry_core::identity::Session;

pub use auth::AuthClient;
pub use rest::RestStore;

/// HTTP access to one Supabase project, shared by the table store and the
/// auth client so both use the signed-in user's token.
pub struct Supabase {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
}

impl Supabase {
    pub fn new(base_url: &str, anon_key: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("pantry-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session: RwLock::new(None),
        })
    }

    pub fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// A request to `path` with the project key and the user's token (or the
    /// anon key when signed out).
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }
}
