use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use super::check_response;
use crate::backend::AuthApi;
use crate::error::Result;
use crate::session::{Account, Session};

#[derive(Debug, Deserialize)]
struct UserMetadata {
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: Option<String>,
    user_metadata: Option<UserMetadata>,
}

impl AuthUser {
    fn into_account(self) -> Account {
        Account {
            id: self.id,
            email: self.email.unwrap_or_default(),
            full_name: self.user_metadata.and_then(|metadata| metadata.full_name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            account: self.user.into_account(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}

/// Sign-up answers with a session, or with the bare user while email confirmation is pending.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(AuthUser),
}

/// Client for the platform's GoTrue-compatible auth service.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(api_url: &str, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/auth/v1", api_url.trim_end_matches('/')),
            api_key,
        }
    }
}

impl AuthApi for AuthClient {
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<Session> {
        let response = self
            .client
            .post(format!("{}/signup", self.base_url))
            .header("apikey", &self.api_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "full_name": full_name },
            }))
            .send()
            .await?;

        let response = check_response(response, "Account").await?;
        match response.json::<SignUpResponse>().await? {
            SignUpResponse::Session(token) => Ok(token.into_session()),
            SignUpResponse::User(user) => {
                info!("Account {} created, waiting for email confirmation", user.id);
                Ok(Session {
                    account: user.into_account(),
                    access_token: String::new(),
                    refresh_token: None,
                })
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .client
            .post(format!("{}/token?grant_type=password", self.base_url))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let response = check_response(response, "Account").await?;
        let session = response.json::<TokenResponse>().await?.into_session();
        debug!("Signed in as {}", session.user_id());
        Ok(session)
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        check_response(response, "Session").await?;
        Ok(())
    }

    async fn update_email(&self, session: &Session, email: &str) -> Result<()> {
        let response = self
            .client
            .put(format!("{}/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .json(&json!({ "email": email }))
            .send()
            .await?;

        check_response(response, "Account").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let client = AuthClient::new("https://project.example.co/", "anon".to_string());
        assert_eq!(client.base_url, "https://project.example.co/auth/v1");
    }

    #[test]
    fn test_sign_up_response_variants() {
        let with_session = r#"{
            "access_token": "jwt",
            "refresh_token": "r",
            "user": {
                "id": "5b1c3a8e-2f4d-4c6b-8a9e-0d1f2e3c4b5a",
                "email": "ada@example.com",
                "user_metadata": { "full_name": "Ada" }
            }
        }"#;
        match serde_json::from_str::<SignUpResponse>(with_session).unwrap() {
            SignUpResponse::Session(token) => {
                let session = token.into_session();
                assert_eq!(session.access_token, "jwt");
                assert_eq!(session.account.full_name.as_deref(), Some("Ada"));
            }
            SignUpResponse::User(_) => panic!("expected a session"),
        }

        let unconfirmed = r#"{
            "id": "5b1c3a8e-2f4d-4c6b-8a9e-0d1f2e3c4b5a",
            "email": "ada@example.com",
            "user_metadata": {}
        }"#;
        assert!(matches!(
            serde_json::from_str::<SignUpResponse>(unconfirmed).unwrap(),
            SignUpResponse::User(_)
        ));
    }
}
