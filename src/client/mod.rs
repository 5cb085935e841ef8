//! Typed HTTP client for the LMS API, used by the `lms` binary and the
//! integration tests.

use async_trait::async_trait;
use reqwest::{multipart, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::database::models::{Directory, DirectoryListing, MediaFile, UserView};
use crate::services::auth_service::{LoginRequest, LoginResponse};
use crate::services::user_service::{SearchResult, UserUpdate};
use crate::types::Role;

pub mod media;

pub use media::{DeletionSummary, FailedDeletion, MediaBrowser, MediaService};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({status}, {code})")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            ClientError::InvalidUrl(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    code: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(base_url)?,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.base.join(path)?;
        let builder = self.http.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            let envelope: Envelope<T> = response.json().await?;
            return Ok(envelope.data);
        }

        let text = response.text().await.unwrap_or_default();
        let (message, code) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.message, body.code),
            Err(_) => (text, "UNKNOWN".to_string()),
        };
        Err(ClientError::Api { status, code, message })
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, ClientError> {
        Self::send(self.request(method, path)?).await
    }

    async fn call_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        Self::send(self.request(method, path)?.json(body)).await
    }

    /// Log in and keep the issued token for subsequent calls.
    pub async fn login(&mut self, login: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let request = LoginRequest {
            login: login.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self.call_json(Method::POST, "/api/auth/login", &request).await?;
        self.token = Some(response.token.clone());
        Ok(response)
    }

    pub async fn whoami(&self) -> Result<UserView, ClientError> {
        self.call(Method::GET, "/api/auth/whoami").await
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        self.call(Method::GET, "/health").await
    }

    pub async fn list_users(&self) -> Result<Vec<UserView>, ClientError> {
        self.call(Method::GET, "/api/users").await
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserView, ClientError> {
        self.call(Method::GET, &format!("/api/users/{}", id)).await
    }

    pub async fn roles(&self) -> Result<Vec<Role>, ClientError> {
        self.call(Method::GET, "/api/users/roles/").await
    }

    pub async fn search_users(&self, role: Role, query: &str, limit: Option<u32>) -> Result<SearchResult, ClientError> {
        let mut builder = self
            .request(Method::GET, "/api/users/members/search")?
            .query(&[("role", role.as_str()), ("query", query)]);
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", limit)]);
        }
        Self::send(builder).await
    }

    pub async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<UserView, ClientError> {
        self.call_json(Method::PUT, &format!("/api/users/{}", id), update).await
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), ClientError> {
        let _: Value = self.call(Method::DELETE, &format!("/api/users/{}", id)).await?;
        Ok(())
    }

    pub async fn upload_picture(&self, id: Uuid, file_name: &str, bytes: Vec<u8>) -> Result<UserView, ClientError> {
        let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(file_name.to_string()));
        Self::send(self.request(Method::POST, &format!("/api/users/picture/{}", id))?.multipart(form)).await
    }
}

#[async_trait]
impl MediaService for ApiClient {
    async fn course_root(&self, course: &str) -> Result<DirectoryListing, ClientError> {
        self.call(Method::GET, &format!("/api/media/course/{}", course)).await
    }

    async fn directory(&self, id: Uuid) -> Result<DirectoryListing, ClientError> {
        self.call(Method::GET, &format!("/api/media/directory/{}", id)).await
    }

    async fn create_directory(&self, parent: Uuid, name: &str) -> Result<Directory, ClientError> {
        self.call_json(Method::POST, &format!("/api/media/directory/{}", parent), &json!({ "name": name }))
            .await
    }

    async fn rename_directory(&self, id: Uuid, name: &str) -> Result<Directory, ClientError> {
        self.call_json(Method::PUT, &format!("/api/media/directory/{}", id), &json!({ "name": name }))
            .await
    }

    async fn delete_directory(&self, id: Uuid) -> Result<(), ClientError> {
        let _: Value = self.call(Method::DELETE, &format!("/api/media/directory/{}", id)).await?;
        Ok(())
    }

    async fn upload(&self, directory: Uuid, file_name: &str, bytes: Vec<u8>) -> Result<Vec<MediaFile>, ClientError> {
        let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(file_name.to_string()));
        Self::send(self.request(Method::POST, &format!("/api/media/file/{}", directory))?.multipart(form)).await
    }

    async fn rename_file(&self, id: Uuid, name: &str) -> Result<MediaFile, ClientError> {
        self.call_json(Method::PUT, &format!("/api/media/file/{}", id), &json!({ "name": name }))
            .await
    }

    async fn delete_file(&self, id: Uuid) -> Result<(), ClientError> {
        let _: Value = self.call(Method::DELETE, &format!("/api/media/file/{}", id)).await?;
        Ok(())
    }
}
