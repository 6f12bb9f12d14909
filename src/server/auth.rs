use std::collections::HashMap;

use thiserror::Error;

use crate::config::AuthSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("The user ({0}) could not be found")]
    UserNotFound(String),
    #[error("Authentication failed for the user ({0})")]
    AuthenticationFailed(String),
}

/// Verifies the credentials presented in a registration request.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, user: &str, password: &str, device: &str) -> Result<(), AuthError>;

    fn user_exists(&self, user: &str, organisation: &str) -> bool;
}

/// Authenticates against the `[auth.users]` table of the configuration.
/// Usernames are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct ConfigAuthenticator {
    users: HashMap<String, String>,
}

impl ConfigAuthenticator {
    pub fn new(settings: &AuthSettings) -> Self {
        let users = settings
            .users
            .iter()
            .map(|(user, password)| (user.to_lowercase(), password.clone()))
            .collect();
        Self { users }
    }
}

impl Authenticator for ConfigAuthenticator {
    fn authenticate(&self, user: &str, password: &str, _device: &str) -> Result<(), AuthError> {
        match self.users.get(&user.to_lowercase()) {
            None => Err(AuthError::UserNotFound(user.to_string())),
            Some(expected) if expected == password => Ok(()),
            Some(_) => Err(AuthError::AuthenticationFailed(user.to_string())),
        }
    }

    fn user_exists(&self, user: &str, _organisation: &str) -> bool {
        self.users.contains_key(&user.to_lowercase())
    }
}
