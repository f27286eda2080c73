use serde_json::Value;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{Credentials, Identity, Registration},
    services::{
        envelope::{self, EndpointFamily},
        transport::{Method, Transport},
    },
    session::SessionStore,
};

/// Login, signup and logout, keeping the session store in step
#[derive(Clone)]
pub struct AccountService {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
}

impl AccountService {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    async fn post_user(&self, path: &str, body: Value) -> AppResult<Identity> {
        let payload = self
            .transport
            .send(Method::Post, path, &[], Some(body))
            .await?;

        match envelope::unwrap(EndpointFamily::Users, payload)? {
            Value::Null => Err(AppError::ExternalApi(
                "User response did not contain a user".to_string(),
            )),
            user => serde_json::from_value(user)
                .map_err(|e| AppError::ExternalApi(format!("Malformed user record: {}", e))),
        }
    }

    /// Authenticates and stores the identity on success
    pub async fn login(&self, username: &str, password: &str) -> AppResult<Identity> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                "Username and password are required".to_string(),
            ));
        }

        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let body = serde_json::to_value(&credentials)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;

        let identity = self.post_user("/users/authenticate", body).await?;
        self.session.set(&identity)?;

        tracing::info!(user_id = identity.id, username = %identity.username, "Logged in");
        Ok(identity)
    }

    /// Creates an account. Does not sign in; call [`AccountService::login`] afterwards.
    pub async fn register(&self, registration: Registration) -> AppResult<Identity> {
        if registration.username.trim().is_empty() || registration.password.is_empty() {
            return Err(AppError::InvalidInput(
                "Username and password are required".to_string(),
            ));
        }

        let body = serde_json::to_value(&registration)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        let identity = self.post_user("/users", body).await?;

        tracing::info!(user_id = identity.id, username = %identity.username, "Account created");
        Ok(identity)
    }

    pub fn logout(&self) -> AppResult<()> {
        self.session.clear()?;
        Ok(())
    }

    pub fn current(&self) -> AppResult<Option<Identity>> {
        Ok(self.session.get()?)
    }

    /// Extended profile (ratings and tags) for a user
    pub async fn profile(&self, user_id: i64) -> AppResult<Value> {
        let payload = self
            .transport
            .send(Method::Get, &format!("/users/{}/profile", user_id), &[], None)
            .await?;

        match envelope::unwrap(EndpointFamily::Profile, payload)? {
            Value::Null => Err(AppError::NotFound(format!("Profile for user {}", user_id))),
            profile => Ok(profile),
        }
    }
}
