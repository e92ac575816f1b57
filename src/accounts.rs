use std::sync::Arc;

use crate::{
    auth::{generate_token, PasswordHasher},
    database::Database,
    error::ApiError,
};

pub const USER_EXISTS: &str = "User already exists";
pub const BAD_CREDENTIALS: &str = "User not found or wrong password";
pub const USER_NOT_FOUND: &str = "User not found";
pub const CITY_IN_LIST: &str = "City already in list";

/// Signup, signin and the per-user saved-city list.
///
/// Usernames and saved city names are compared exactly (case-sensitive).
pub struct AccountService {
    database: Arc<Database>,
    hasher: PasswordHasher,
}

impl AccountService {
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            hasher: PasswordHasher::new(),
        }
    }

    /// Registers a new user and returns the token issued for it.
    pub async fn signup(&self, username: &str, password: &str) -> Result<String, ApiError> {
        if self.database.find_user_by_username(username).await?.is_some() {
            return Err(ApiError::Conflict(USER_EXISTS.to_string()));
        }

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))??;

        let user = self
            .database
            .create_user(username, &password_hash, &generate_token())
            .await?;

        tracing::info!("Registered user {}", user.username);
        Ok(user.token)
    }

    /// Returns the user's existing token when the password matches.
    pub async fn signin(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let Some(user) = self.database.find_user_by_username(username).await? else {
            return Err(ApiError::NotFound(BAD_CREDENTIALS.to_string()));
        };

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &password_hash))
            .await
            .map_err(|e| ApiError::Internal(format!("Verification task failed: {}", e)))??;

        if !verified {
            tracing::debug!("Rejected signin for {}", username);
            return Err(ApiError::NotFound(BAD_CREDENTIALS.to_string()));
        }

        Ok(user.token)
    }

    pub async fn add_city(&self, username: &str, city_name: &str) -> Result<(), ApiError> {
        let Some(user) = self.database.find_user_by_username(username).await? else {
            return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
        };

        if user.saved_cities.iter().any(|c| c == city_name) {
            return Err(ApiError::Conflict(CITY_IN_LIST.to_string()));
        }

        self.database.add_saved_city(&user.id, city_name).await?;
        tracing::info!("User {} saved city {}", username, city_name);
        Ok(())
    }

    #[cfg(test)]
    pub async fn saved_cities(&self, username: &str) -> Result<Vec<String>, ApiError> {
        self.database
            .find_user_by_username(username)
            .await?
            .map(|user| user.saved_cities)
            .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))
    }
}
