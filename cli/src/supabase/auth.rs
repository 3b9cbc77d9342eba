use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use pantry_core::error::AuthError;
use pantry_core::identity::{IdentityProvider, Session, SessionEvent, User, UserUpdate};

use super::Supabase;

/// GoTrue token response (`/token`, and `/signup` when auto-confirm is on).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_at
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            user: token.user,
        }
    }
}

/// GoTrue uses several error shapes depending on the endpoint and version.
#[derive(Debug, Default, Deserialize)]
struct AuthFailure {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl AuthFailure {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

/// `IdentityProvider` over the Supabase auth endpoint (`/auth/v1`).
pub struct AuthClient {
    client: Arc<Supabase>,
    events: broadcast::Sender<SessionEvent>,
}

impl AuthClient {
    pub fn new(client: Arc<Supabase>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self { client, events }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response, AuthError> {
        let mut request = self.client.request(method, &format!("/auth/v1{path}"));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<AuthFailure>(&text)
            .ok()
            .and_then(AuthFailure::into_message)
            .unwrap_or_else(|| format!("authentication failed ({status})"));
        debug!(%status, "auth request rejected: {message}");
        Err(AuthError::Provider(message))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
        response
            .json()
            .await
            .map_err(|e| AuthError::Transport(format!("malformed auth response: {e}")))
    }

    /// Take over the session carried by a recovery link fragment
    /// (`#access_token=..&refresh_token=..&type=recovery`).
    pub async fn recover_from_fragment(&self, fragment: &str) -> Result<Session, AuthError> {
        let params: Vec<(&str, &str)> = fragment
            .trim_start_matches('#')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();
        let param = |name: &str| {
            params
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_string())
        };
        let access_token = param("access_token").ok_or_else(|| {
            AuthError::Provider("Link de recuperação inválido.".to_string())
        })?;

        let previous = self.client.session();
        self.client.set_session(Some(Session {
            access_token: access_token.clone(),
            refresh_token: None,
            expires_at: None,
            user: placeholder_user(),
        }));
        let user = match self.fetch_user().await {
            Ok(user) => user,
            Err(e) => {
                self.client.set_session(previous);
                return Err(e);
            }
        };

        let session = Session {
            access_token,
            refresh_token: param("refresh_token"),
            expires_at: param("expires_at")
                .and_then(|s| s.parse().ok())
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            user,
        };
        self.client.set_session(Some(session.clone()));
        self.publish(SessionEvent::PasswordRecovery);
        Ok(session)
    }

    async fn fetch_user(&self) -> Result<User, AuthError> {
        let response = self.call(Method::GET, "/user", None).await?;
        Self::decode(response).await
    }
}

fn placeholder_user() -> User {
    User {
        id: uuid::Uuid::nil(),
        email: String::new(),
        user_metadata: pantry_core::identity::UserMetadata::default(),
    }
}

#[async_trait]
impl IdentityProvider for AuthClient {
    async fn current_user(&self) -> Result<Option<User>, AuthError> {
        if self.client.session().is_none() {
            return Ok(None);
        }
        let response = self
            .client
            .request(Method::GET, "/auth/v1/user")
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("stored session was rejected");
                self.client.set_session(None);
                Ok(None)
            }
            status if status.is_success() => Ok(Some(Self::decode(response).await?)),
            status => Err(AuthError::Provider(format!(
                "authentication failed ({status})"
            ))),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Option<Session>, AuthError> {
        let mut body = json!({"email": email, "password": password});
        if let Some(name) = full_name {
            body["data"] = json!({"full_name": name});
        }
        let response = self.call(Method::POST, "/signup", Some(body)).await?;
        let value: Value = Self::decode(response).await?;

        // With email confirmation on, GoTrue answers with the bare user.
        if value.get("access_token").is_none() {
            return Ok(None);
        }
        let token: TokenResponse = serde_json::from_value(value)
            .map_err(|e| AuthError::Transport(format!("malformed auth response: {e}")))?;
        let session = Session::from(token);
        self.client.set_session(Some(session.clone()));
        self.publish(SessionEvent::SignedIn(session.clone()));
        Ok(Some(session))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let body = json!({"email": email, "password": password});
        let response = self
            .call(Method::POST, "/token?grant_type=password", Some(body))
            .await?;
        let session = Session::from(Self::decode::<TokenResponse>(response).await?);
        self.client.set_session(Some(session.clone()));
        self.publish(SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.client.session().is_some() {
            self.call(Method::POST, "/logout", None).await?;
        }
        self.client.set_session(None);
        self.publish(SessionEvent::SignedOut);
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError> {
        self.call(Method::POST, "/recover", Some(json!({"email": email})))
            .await?;
        Ok(())
    }

    async fn update_user(&self, update: UserUpdate) -> Result<User, AuthError> {
        if self.client.session().is_none() {
            return Err(AuthError::NotSignedIn);
        }
        let mut body = json!({});
        if let Some(password) = update.password {
            body["password"] = json!(password);
        }
        if let Some(name) = update.full_name {
            body["data"] = json!({"full_name": name});
        }
        let response = self.call(Method::PUT, "/user", Some(body)).await?;
        let user: User = Self::decode(response).await?;

        if let Some(mut session) = self.client.session() {
            session.user = user.clone();
            self.client.set_session(Some(session));
        }
        self.publish(SessionEvent::UserUpdated(user.clone()));
        Ok(user)
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubServer;
    use crate::supabase::tests::session;

    const USER_ID: &str = "1b4e28ba-2fa1-11d2-883f-0016d3cca427";

    fn user_json(full_name: Option<&str>) -> Value {
        let mut user = json!({"id": USER_ID, "email": "ana@example.com", "aud": "authenticated"});
        if let Some(name) = full_name {
            user["user_metadata"] = json!({"full_name": name});
        }
        user
    }

    fn token_json() -> Value {
        json!({
            "access_token": "jwt-abc",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1_900_000_000,
            "refresh_token": "refresh-abc",
            "user": user_json(Some("Ana"))
        })
    }

    async fn client(responses: Vec<(u16, Value)>) -> (StubServer, Arc<Supabase>, AuthClient) {
        let server = StubServer::start(responses).await;
        let supabase = Arc::new(Supabase::new(&server.base_url, "anon-key", 5).unwrap());
        let auth = AuthClient::new(Arc::clone(&supabase));
        (server, supabase, auth)
    }

    #[tokio::test]
    async fn test_sign_in_stores_session_and_publishes() {
        let (server, supabase, auth) = client(vec![(200, token_json())]).await;
        let mut events = auth.subscribe();

        let session = auth
            .sign_in_with_password("ana@example.com", "secret")
            .await
            .unwrap();
        assert_eq!(session.access_token, "jwt-abc");
        assert_eq!(session.user.display_name(), "Ana");
        assert_eq!(session.expires_at.unwrap().timestamp(), 1_900_000_000);
        assert_eq!(supabase.session().unwrap().access_token, "jwt-abc");
        assert!(events.recv().await.unwrap().has_session());

        let req = server.last();
        assert_eq!(req.path, "/auth/v1/token");
        assert_eq!(req.query, "grant_type=password");
        assert_eq!(req.json()["email"], "ana@example.com");
    }

    #[tokio::test]
    async fn test_provider_message_is_verbatim() {
        let (_server, _sb, auth) = client(vec![(
            400,
            json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}),
        )])
        .await;
        let err = auth
            .sign_in_with_password("ana@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid login credentials");

        let (_server, _sb, auth) = client(vec![(
            422,
            json!({"code": 422, "msg": "Password should be at least 6 characters"}),
        )])
        .await;
        let err = auth.sign_up("a@b.c", "123", None).await.unwrap_err();
        assert_eq!(err.user_message(), "Password should be at least 6 characters");
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation_has_no_session() {
        let (server, supabase, auth) = client(vec![(200, user_json(None))]).await;
        let session = auth.sign_up("ana@example.com", "secret", Some("Ana")).await.unwrap();
        assert!(session.is_none());
        assert!(supabase.session().is_none());
        assert_eq!(server.last().json()["data"]["full_name"], "Ana");
    }

    #[tokio::test]
    async fn test_current_user() {
        let (_server, supabase, auth) = client(vec![(200, user_json(None)), (401, json!({}))]).await;
        assert!(auth.current_user().await.unwrap().is_none());

        supabase.set_session(Some(session("jwt")));
        let user = auth.current_user().await.unwrap().unwrap();
        assert_eq!(user.display_name(), "ana");

        // Rejected token signs the user out
        assert!(auth.current_user().await.unwrap().is_none());
        assert!(supabase.session().is_none());
    }

    #[tokio::test]
    async fn test_update_user_sends_metadata() {
        let (server, supabase, auth) = client(vec![(200, user_json(Some("Ana Souza")))]).await;
        assert!(matches!(
            auth.update_user(UserUpdate::default()).await,
            Err(AuthError::NotSignedIn)
        ));

        supabase.set_session(Some(session("jwt")));
        let user = auth
            .update_user(UserUpdate {
                full_name: Some("Ana Souza".to_string()),
                ..UserUpdate::default()
            })
            .await
            .unwrap();
        assert_eq!(user.display_name(), "Ana Souza");
        assert_eq!(supabase.session().unwrap().user.display_name(), "Ana Souza");

        let req = server.last();
        assert_eq!(req.method, Method::PUT);
        assert_eq!(req.json(), json!({"data": {"full_name": "Ana Souza"}}));
        assert_eq!(req.header("authorization"), Some("Bearer jwt"));
    }

    #[tokio::test]
    async fn test_sign_out_and_recover() {
        let (server, supabase, auth) = client(vec![(204, json!(null)), (200, json!({}))]).await;
        supabase.set_session(Some(session("jwt")));
        let mut events = auth.subscribe();

        auth.sign_out().await.unwrap();
        assert!(supabase.session().is_none());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedOut);

        auth.reset_password_for_email("ana@example.com").await.unwrap();
        let reqs = server.requests();
        assert_eq!(reqs[0].path, "/auth/v1/logout");
        assert_eq!(reqs[1].path, "/auth/v1/recover");
    }

    #[tokio::test]
    async fn test_recover_from_fragment() {
        let (server, supabase, auth) = client(vec![(200, user_json(None))]).await;
        let mut events = auth.subscribe();

        let session = auth
            .recover_from_fragment("#access_token=jwt-rec&expires_at=1900000000&refresh_token=r&type=recovery")
            .await
            .unwrap();
        assert_eq!(session.user.id.to_string(), USER_ID);
        assert_eq!(supabase.session().unwrap().access_token, "jwt-rec");
        assert_eq!(server.last().header("authorization"), Some("Bearer jwt-rec"));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::PasswordRecovery);

        assert!(auth.recover_from_fragment("#type=recovery").await.is_err());
    }
}
