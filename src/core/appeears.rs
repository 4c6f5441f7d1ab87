use crate::config::credentials::Credentials;
use crate::core::AppeearsApi;
use crate::domain::model::{Bundle, TaskRequest, TaskStatus};
use crate::utils::error::{BatchError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: Option<String>,
}

/// reqwest-backed client for the AppEEARS REST API.
pub struct AppeearsClient {
    base_url: String,
    credentials: Credentials,
    client: Client,
    token: Option<String>,
}

impl AppeearsClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        // Endpoints are appended directly, so keep exactly one trailing slash.
        let base_url = format!("{}/", base_url.trim_end_matches('/'));
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            base_url,
            credentials,
            client,
            token: None,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| BatchError::MissingCredentials {
                message: "not logged in to AppEEARS".to_string(),
            })?;
        Ok(request.bearer_auth(token))
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::error!("AppEEARS request failed - Status: {} Response: {}", status, body);
        Err(BatchError::ApiStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AppeearsApi for AppeearsClient {
    async fn login(&mut self) -> Result<()> {
        tracing::debug!("Logging in to {}", self.endpoint("login"));
        let response = self
            .client
            .post(self.endpoint("login"))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let login: LoginResponse = Self::check(response).await?.json().await?;
        self.token = Some(login.token);
        Ok(())
    }

    async fn submit_task(&self, request: &TaskRequest) -> Result<String> {
        let response = self
            .authorized(self.client.post(self.endpoint("task")))?
            .json(request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let submitted: SubmitResponse = Self::check(response).await?.json().await?;
        Ok(submitted.task_id)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        let response = self
            .authorized(self.client.get(self.endpoint(&format!("task/{}", task_id))))?
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let status: StatusResponse = Self::check(response).await?.json().await?;
        Ok(TaskStatus::parse(status.status.as_deref().unwrap_or("unknown")))
    }

    async fn bundle(&self, task_id: &str) -> Result<Bundle> {
        let response = self
            .authorized(self.client.get(self.endpoint(&format!("bundle/{}", task_id))))?
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let bundle = Self::check(response).await?.json().await?;
        Ok(bundle)
    }

    async fn download_file(
        &self,
        task_id: &str,
        file_id: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let url = self.endpoint(&format!("bundle/{}/{}", task_id, file_id));
        let response = self
            .authorized(self.client.get(url))?
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        let mut response = Self::check(response).await?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn credentials() -> Credentials {
        Credentials {
            username: "user".to_string(),
            password: "pass".to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_uses_basic_auth_and_stores_token() {
        let server = MockServer::start();
        let login_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/login")
                .header("Authorization", "Basic dXNlcjpwYXNz");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"token": "tok-123", "token_type": "Bearer"}));
        });
        let status_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/task/t1")
                .header("Authorization", "Bearer tok-123");
            then.status(200)
                .json_body(serde_json::json!({"task_id": "t1", "status": "processing"}));
        });

        let mut client = AppeearsClient::new(&server.url("/api"), credentials()).unwrap();
        client.login().await.unwrap();
        let status = client.task_status("t1").await.unwrap();

        login_mock.assert();
        status_mock.assert();
        assert_eq!(status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn test_download_streams_into_writer() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/login");
            then.status(200).json_body(serde_json::json!({"token": "tok"}));
        });
        let body = vec![7u8; 64 * 1024];
        let file_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/bundle/t1/f1")
                .header("Authorization", "Bearer tok");
            then.status(200).body(body.clone());
        });

        let mut client = AppeearsClient::new(&server.url("/api"), credentials()).unwrap();
        client.login().await.unwrap();
        let mut out: Vec<u8> = Vec::new();
        let written = client.download_file("t1", "f1", &mut out).await.unwrap();

        file_mock.assert();
        assert_eq!(written, 64 * 1024);
        assert_eq!(out, body);
    }

    #[tokio::test]
    async fn test_calls_before_login_are_rejected() {
        let client = AppeearsClient::new("http://127.0.0.1:9/api/", credentials()).unwrap();
        let err = client.task_status("t1").await.unwrap_err();
        assert!(matches!(err, BatchError::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn test_rejected_login_surfaces_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/login");
            then.status(401).body("invalid credentials");
        });

        let mut client = AppeearsClient::new(&server.url("/api/"), credentials()).unwrap();
        let err = client.login().await.unwrap_err();
        match err {
            BatchError::ApiStatus { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_base_url_normalised() {
        let a = AppeearsClient::new("https://example.com/api", credentials()).unwrap();
        let b = AppeearsClient::new("https://example.com/api//", credentials()).unwrap();
        assert_eq!(a.endpoint("login"), "https://example.com/api/login");
        assert_eq!(b.endpoint("login"), "https://example.com/api/login");
    }
}
