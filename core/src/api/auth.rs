use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use crate::model::Session;

use super::{response::read_json, wire, ApiError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn register(&self, registration: &Registration) -> Result<Session, ApiError>;

    async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError>;
}

/// Client for the `Auth` endpoints. Never sends a bearer token.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(AuthClient {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        action: &str,
        body: &T,
    ) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}/Auth/{}", self.base_url, action);
        let resp = self.http.request(Method::POST, url).json(body).send().await?;
        read_json(resp).await
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    #[tracing::instrument(skip_all, fields(email = %registration.email))]
    async fn register(&self, registration: &Registration) -> Result<Session, ApiError> {
        let body = self.post("register", registration).await?;
        Ok(wire::session(
            &body,
            &registration.email,
            Some(&registration.user_name),
        ))
    }

    #[tracing::instrument(skip_all, fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let body = self.post("login", credentials).await?;
        Ok(wire::session(&body, &credentials.email, None))
    }
}
