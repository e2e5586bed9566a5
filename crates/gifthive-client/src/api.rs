use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use gifthive_types::AUTH_HEADER;
use gifthive_types::api::{
    CreateGiftRequest, Envelope, LoginRequest, LoginResponse, MessageBody, RegisterRequest,
    RegisterResponse, UpdateGiftRequest, UpdateUserRequest, UserSummary,
};
use gifthive_types::models::{Gift, Hive};

use crate::config::ClientConfig;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("not logged in")]
    MissingToken,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            Self::MissingToken => None,
        }
    }

    /// Text suitable for an error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Transport(_) => "Could not reach the server, please try again".into(),
            Self::MissingToken => "Please log in first".into(),
        }
    }
}

/// Thin typed wrapper over the REST routes.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.api_url.as_str())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let res = req.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res.json::<T>().await?);
        }

        // Error bodies are `{success:false, response:{message}}`, but older
        // servers answered with a bare string in `response`.
        let body: Value = res.json().await.unwrap_or(Value::Null);
        let message = body["response"]["message"]
            .as_str()
            .or_else(|| body["response"].as_str())
            .unwrap_or("Something went wrong, please try again")
            .to_string();
        debug!("API error {}: {}", status, message);
        Err(ClientError::Api { status, message })
    }

    // -- Users --

    pub async fn register(&self, username: &str, password: &str) -> Result<RegisterResponse, ClientError> {
        let body = RegisterRequest {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
        };
        let envelope: Envelope<RegisterResponse> = self
            .send(self.http.post(self.url("/user-routes/register")).json(&body))
            .await?;
        Ok(envelope.response)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
        };
        let envelope: Envelope<LoginResponse> = self
            .send(self.http.post(self.url("/user-routes/login")).json(&body))
            .await?;
        Ok(envelope.response)
    }

    pub async fn update_user(
        &self,
        token: &str,
        id: &str,
        update: &UpdateUserRequest,
    ) -> Result<UserSummary, ClientError> {
        let envelope: Envelope<UserSummary> = self
            .send(
                self.http
                    .put(self.url(&format!("/user-routes/{}", id)))
                    .header(AUTH_HEADER, token)
                    .json(update),
            )
            .await?;
        Ok(envelope.response)
    }

    pub async fn delete_user(&self, token: &str, id: &str) -> Result<MessageBody, ClientError> {
        let envelope: Envelope<MessageBody> = self
            .send(
                self.http
                    .delete(self.url(&format!("/user-routes/{}", id)))
                    .header(AUTH_HEADER, token),
            )
            .await?;
        Ok(envelope.response)
    }

    // -- Hives --

    pub async fn hives(&self, token: &str) -> Result<Vec<Hive>, ClientError> {
        self.send(self.http.get(self.url("/gift-routes/hives")).header(AUTH_HEADER, token))
            .await
    }

    pub async fn hive(&self, token: &str, id: &str) -> Result<Hive, ClientError> {
        self.send(
            self.http
                .get(self.url(&format!("/gift-routes/hives/{}", id)))
                .header(AUTH_HEADER, token),
        )
        .await
    }

    pub async fn create_hive(&self, token: &str, name: &str) -> Result<Hive, ClientError> {
        self.send(
            self.http
                .post(self.url("/gift-routes/hives"))
                .header(AUTH_HEADER, token)
                .json(&json!({ "name": name })),
        )
        .await
    }

    pub async fn rename_hive(&self, token: &str, id: &str, name: &str) -> Result<Hive, ClientError> {
        self.send(
            self.http
                .put(self.url(&format!("/gift-routes/hives/{}", id)))
                .header(AUTH_HEADER, token)
                .json(&json!({ "name": name })),
        )
        .await
    }

    pub async fn delete_hive(&self, token: &str, id: &str) -> Result<(), ClientError> {
        let _: Envelope<MessageBody> = self
            .send(
                self.http
                    .delete(self.url(&format!("/gift-routes/hives/{}", id)))
                    .header(AUTH_HEADER, token),
            )
            .await?;
        Ok(())
    }

    pub async fn share_hive(&self, token: &str, id: &str, username: &str) -> Result<Hive, ClientError> {
        self.send(
            self.http
                .post(self.url(&format!("/gift-routes/hives/{}/share", id)))
                .header(AUTH_HEADER, token)
                .json(&json!({ "username": username })),
        )
        .await
    }

    pub async fn shared_hives(&self, token: &str) -> Result<Vec<Hive>, ClientError> {
        self.send(
            self.http
                .get(self.url("/gift-routes/shared-hives"))
                .header(AUTH_HEADER, token),
        )
        .await
    }

    // -- Gifts --

    pub async fn gifts(&self, token: &str, hive_id: Option<&str>) -> Result<Vec<Gift>, ClientError> {
        let mut req = self
            .http
            .get(self.url("/gift-routes/gifts"))
            .header(AUTH_HEADER, token);
        if let Some(hive_id) = hive_id {
            req = req.query(&[("hiveId", hive_id)]);
        }
        self.send(req).await
    }

    pub async fn create_gift(&self, token: &str, gift: &CreateGiftRequest) -> Result<Gift, ClientError> {
        self.send(
            self.http
                .post(self.url("/gift-routes/gifts"))
                .header(AUTH_HEADER, token)
                .json(gift),
        )
        .await
    }

    pub async fn update_gift(
        &self,
        token: &str,
        id: &str,
        update: &UpdateGiftRequest,
    ) -> Result<Gift, ClientError> {
        self.send(
            self.http
                .put(self.url(&format!("/gift-routes/gifts/{}", id)))
                .header(AUTH_HEADER, token)
                .json(update),
        )
        .await
    }

    pub async fn mark_shared_gift(&self, token: &str, id: &str, bought: bool) -> Result<Gift, ClientError> {
        self.send(
            self.http
                .put(self.url(&format!("/gift-routes/shared-gifts/{}", id)))
                .header(AUTH_HEADER, token)
                .json(&json!({ "bought": bought })),
        )
        .await
    }

    pub async fn delete_gift(&self, token: &str, id: &str) -> Result<(), ClientError> {
        let _: Envelope<MessageBody> = self
            .send(
                self.http
                    .delete(self.url(&format!("/gift-routes/gifts/{}", id)))
                    .header(AUTH_HEADER, token),
            )
            .await?;
        Ok(())
    }

    // -- Search --

    pub async fn search(&self, token: &str, term: &str) -> Result<Vec<Hive>, ClientError> {
        self.send(
            self.http
                .get(self.url("/search-routes/search"))
                .header(AUTH_HEADER, token)
                .query(&[("searchTerm", term)]),
        )
        .await
    }
}
