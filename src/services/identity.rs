use reqwest::Client;
use serde_json::{json, Value};

use super::{check_status, endpoint, ServiceError};

/// Principal returned by the identity service for a valid bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    /// Full user record as the identity service returned it
    pub raw: Value,
}

impl AuthUser {
    pub fn from_value(raw: Value) -> Result<Self, ServiceError> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::Decode("user record without id".to_string()))?
            .to_string();
        let email = raw.get("email").and_then(Value::as_str).map(str::to_string);
        Ok(Self { id, email, raw })
    }
}

/// Outcome of sign-up / sign-in
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: Value,
    /// Absent when sign-up requires email confirmation
    pub access_token: Option<String>,
}

impl AuthSession {
    fn from_value(value: Value) -> Self {
        let access_token = value
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string);

        // Token responses nest the user; bare sign-up responses are the user
        let user = match value.get("user") {
            Some(user) if access_token.is_some() => user.clone(),
            _ => value,
        };

        Self { user, access_token }
    }
}

/// Client for the hosted identity provider's auth REST endpoints
pub struct IdentityService {
    client: Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

impl IdentityService {
    pub fn new(client: Client, base_url: &str, anon_key: &str, service_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            anon_key: anon_key.to_string(),
            service_key: service_key.to_string(),
        }
    }

    /// Resolve a bearer token to the user it was issued for
    pub async fn get_user(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let url = endpoint(&self.base_url, "/auth/v1/user", &[])?;
        let response = self
            .client
            .get(url)
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await?;
        let user: Value = check_status(response).await?.json().await?;
        AuthUser::from_value(user)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
        redirect_to: &str,
    ) -> Result<AuthSession, ServiceError> {
        let url = endpoint(&self.base_url, "/auth/v1/signup", &[("redirect_to", redirect_to)])?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "name": name }
            }))
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        Ok(AuthSession::from_value(body))
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession, ServiceError> {
        let url = endpoint(&self.base_url, "/auth/v1/token", &[("grant_type", "password")])?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        Ok(AuthSession::from_value(body))
    }

    /// Revoke the session behind `token`
    pub async fn sign_out(&self, token: &str) -> Result<(), ServiceError> {
        let url = endpoint(&self.base_url, "/auth/v1/logout", &[])?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
