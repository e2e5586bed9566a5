use reqwest::StatusCode;
use tracing::{error, info};

use gifthive_types::api::{LoginResponse, RegisterResponse, UpdateUserRequest, UserSummary};
use gifthive_types::storage_keys;

use crate::api::ClientError;
use crate::storage::SessionStorage;
use crate::Context;

pub const MISSING_CREDENTIALS: &str = "Please enter both username and password";
pub const WRONG_CREDENTIALS: &str = "Wrong username or password, please try again";
pub const UNKNOWN_USERNAME: &str = "Username not found, please try again";
pub const GENERIC_FAILURE: &str = "Something went wrong, please try again";

/// Login/session state. `is_logged_in` is the whole state machine:
/// anonymous until a login succeeds, anonymous again after logout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub username: String,
    pub access_token: Option<String>,
    pub user_id: String,
    pub is_logged_in: bool,
    pub loading: bool,
    pub error_message: String,
    /// Username of the last successful registration, for the confirmation banner.
    pub registered: Option<String>,
}

impl UserState {
    /// Session restored from storage: authenticated iff a token is stored.
    pub fn rehydrate(storage: &dyn SessionStorage) -> Self {
        match storage.get(storage_keys::ACCESS_TOKEN).filter(|t| !t.is_empty()) {
            Some(token) => Self {
                username: storage.get(storage_keys::USERNAME).unwrap_or_default(),
                user_id: storage.get(storage_keys::USER_ID).unwrap_or_default(),
                access_token: Some(token),
                is_logged_in: true,
                ..Self::default()
            },
            None => Self::default(),
        }
    }

    pub fn begin_request(self) -> Self {
        Self {
            loading: true,
            error_message: String::new(),
            ..self
        }
    }

    pub fn with_error(self, message: impl Into<String>) -> Self {
        Self {
            loading: false,
            error_message: message.into(),
            ..self
        }
    }

    pub fn registered(self, response: &RegisterResponse) -> Self {
        Self {
            username: response.username.clone(),
            loading: false,
            error_message: String::new(),
            registered: Some(response.username.clone()),
            ..self
        }
    }

    pub fn registration_failed(self, err: &ClientError) -> Self {
        let message = match err {
            ClientError::Api { status, message } if *status == StatusCode::BAD_REQUEST => message.clone(),
            _ => "Registration failed, please try again".to_string(),
        };
        Self {
            username: String::new(),
            registered: None,
            ..self.with_error(message)
        }
    }

    pub fn logged_in(self, response: &LoginResponse) -> Self {
        Self {
            username: response.username.clone(),
            access_token: Some(response.access_token.clone()),
            user_id: response.id.clone(),
            is_logged_in: true,
            loading: false,
            error_message: String::new(),
            ..self
        }
    }

    pub fn login_failed(self, err: &ClientError) -> Self {
        let message = match err.status() {
            Some(StatusCode::UNAUTHORIZED) => WRONG_CREDENTIALS,
            Some(StatusCode::NOT_FOUND) => UNKNOWN_USERNAME,
            _ => GENERIC_FAILURE,
        };
        Self {
            username: String::new(),
            access_token: None,
            is_logged_in: false,
            ..self.with_error(message)
        }
    }

    pub fn account_updated(self, summary: &UserSummary) -> Self {
        Self {
            username: summary.username.clone(),
            loading: false,
            error_message: String::new(),
            ..self
        }
    }

    pub fn logged_out() -> Self {
        Self::default()
    }
}

pub struct UserStore {
    ctx: Context,
    state: UserState,
}

impl UserStore {
    /// Create the store, rehydrating any stored session.
    pub fn new(ctx: Context) -> Self {
        let state = UserState::rehydrate(ctx.storage.as_ref());
        Self { ctx, state }
    }

    pub fn state(&self) -> &UserState {
        &self.state
    }

    pub fn set_error_message(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.apply(|s| UserState { error_message: message, ..s });
    }

    fn apply<F>(&mut self, transition: F)
    where
        F: FnOnce(UserState) -> UserState,
    {
        self.state = transition(std::mem::take(&mut self.state));
    }

    pub async fn register(&mut self, username: &str, password: &str) {
        if username.is_empty() || password.is_empty() {
            self.apply(|s| s.with_error(MISSING_CREDENTIALS));
            return;
        }

        self.apply(UserState::begin_request);
        match self.ctx.api.register(username, password).await {
            Ok(response) => {
                info!("The user {} has been created", response.username);
                self.apply(|s| s.registered(&response));
            }
            Err(e) => {
                error!("There was an error => {}", e);
                self.apply(|s| s.registration_failed(&e));
            }
        }
    }

    pub async fn login(&mut self, username: &str, password: &str) {
        if username.is_empty() || password.is_empty() {
            self.apply(|s| s.with_error(MISSING_CREDENTIALS));
            return;
        }

        self.apply(UserState::begin_request);
        match self.ctx.api.login(username, password).await {
            Ok(response) => {
                let storage = &self.ctx.storage;
                storage.set(storage_keys::ACCESS_TOKEN, &response.access_token);
                storage.set(storage_keys::USERNAME, &response.username);
                storage.set(storage_keys::USER_ID, &response.id);

                info!("{} is logged in", response.username);
                self.apply(|s| s.logged_in(&response));
            }
            Err(e) => {
                error!("There was an error => {}", e);
                self.apply(|s| s.login_failed(&e));
            }
        }
    }

    /// Drop the session and everything in local storage.
    pub fn logout(&mut self) {
        self.ctx.storage.clear();
        self.state = UserState::logged_out();
    }

    pub async fn update_account(&mut self, username: Option<&str>, password: Option<&str>) {
        let token = match self.ctx.access_token() {
            Ok(token) => token,
            Err(e) => return self.apply(|s| s.with_error(e.user_message())),
        };
        let update = UpdateUserRequest {
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        };

        self.apply(UserState::begin_request);
        let user_id = self.state.user_id.clone();
        match self.ctx.api.update_user(&token, &user_id, &update).await {
            Ok(summary) => {
                self.ctx.storage.set(storage_keys::USERNAME, &summary.username);
                self.apply(|s| s.account_updated(&summary));
            }
            Err(e) => {
                error!("Error updating user: {}", e);
                self.apply(|s| s.with_error(e.user_message()));
            }
        }
    }

    /// Delete the account on the server, then log out locally.
    pub async fn delete_account(&mut self) {
        let token = match self.ctx.access_token() {
            Ok(token) => token,
            Err(e) => return self.apply(|s| s.with_error(e.user_message())),
        };

        self.apply(UserState::begin_request);
        let user_id = self.state.user_id.clone();
        match self.ctx.api.delete_user(&token, &user_id).await {
            Ok(body) => {
                info!("{}", body.message);
                self.logout();
            }
            Err(e) => {
                error!("Error deleting user: {}", e);
                self.apply(|s| s.with_error(e.user_message()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn login_response() -> LoginResponse {
        LoginResponse {
            id: "u1".into(),
            username: "alice".into(),
            access_token: "tok".into(),
            hives: vec![],
            gifts: vec![],
        }
    }

    #[test]
    fn rehydrate_without_token_is_anonymous() {
        let storage = MemoryStorage::new();
        storage.set(storage_keys::USERNAME, "alice");
        assert_eq!(UserState::rehydrate(&storage), UserState::default());
    }

    #[test]
    fn rehydrate_with_token_is_authenticated() {
        let storage = MemoryStorage::new();
        storage.set(storage_keys::ACCESS_TOKEN, "tok");
        storage.set(storage_keys::USERNAME, "alice");
        storage.set(storage_keys::USER_ID, "u1");

        let state = UserState::rehydrate(&storage);
        assert!(state.is_logged_in);
        assert_eq!(state.access_token.as_deref(), Some("tok"));
        assert_eq!(state.username, "alice");
        assert_eq!(state.user_id, "u1");
    }

    #[test]
    fn login_then_logout() {
        let state = UserState::default().begin_request();
        assert!(state.loading);

        let state = state.logged_in(&login_response());
        assert!(state.is_logged_in);
        assert!(!state.loading);
        assert_eq!(state.user_id, "u1");

        assert_eq!(UserState::logged_out(), UserState::default());
    }

    #[test]
    fn login_failure_messages_follow_status() {
        let unauthorized = ClientError::Api {
            status: StatusCode::UNAUTHORIZED,
            message: "Incorrect password".into(),
        };
        let not_found = ClientError::Api {
            status: StatusCode::NOT_FOUND,
            message: "User not found".into(),
        };
        let server = ClientError::Api {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "boom".into(),
        };

        let state = UserState::default().begin_request();
        assert_eq!(state.clone().login_failed(&unauthorized).error_message, WRONG_CREDENTIALS);
        assert_eq!(state.clone().login_failed(&not_found).error_message, UNKNOWN_USERNAME);

        let failed = state.login_failed(&server);
        assert_eq!(failed.error_message, GENERIC_FAILURE);
        assert!(!failed.loading);
        assert!(!failed.is_logged_in);
    }

    #[test]
    fn registration_failure_surfaces_server_message() {
        let duplicate = ClientError::Api {
            status: StatusCode::BAD_REQUEST,
            message: "User with the username alice already exists".into(),
        };
        let state = UserState::default().begin_request().registration_failed(&duplicate);
        assert!(state.error_message.contains("already exists"));
        assert!(state.registered.is_none());
    }
}
