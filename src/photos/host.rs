//! Image host client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;

use crate::config::Config;
use crate::errors::AppError;

use super::UPLOAD_ALERT;

/// Somewhere to put an image and get a public URL back.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload a base64-encoded image and return its hosted URL.
    async fn upload(&self, image_base64: String) -> Result<String, AppError>;
}

/// ImgBB-compatible upload endpoint: multipart `key` + `image`, JSON reply
/// with `data.url` or `error.message`.
pub struct ImgbbHost {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HostReply {
    data: Option<HostData>,
    error: Option<HostFailure>,
}

#[derive(Debug, Deserialize)]
struct HostData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HostFailure {
    message: Option<String>,
}

impl ImgbbHost {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(config.image_host_url.clone(), config.image_host_key.clone())
    }
}

#[async_trait]
impl ImageHost for ImgbbHost {
    async fn upload(&self, image_base64: String) -> Result<String, AppError> {
        let Some(key) = self.api_key.clone() else {
            return Err(AppError::Upload(format!(
                "{}: clé de l'hébergeur d'images non configurée",
                UPLOAD_ALERT
            )));
        };

        let form = Form::new().text("key", key).text("image", image_base64);
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let reply: HostReply = response.json().await?;

        if let Some(url) = reply.data.and_then(|d| d.url) {
            tracing::debug!(%url, "Photo hosted");
            return Ok(url);
        }

        let message = reply
            .error
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("réponse inattendue ({})", status));
        tracing::warn!(%status, "Image host refused upload: {}", message);
        Err(AppError::Upload(format!("{}: {}", UPLOAD_ALERT, message)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Multipart;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    /// Minimal stand-in for the upload endpoint.
    async fn upload_endpoint(mut multipart: Multipart) -> Json<Value> {
        let mut key = None;
        let mut image = None;
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            let text = field.text().await.unwrap_or_default();
            match name.as_str() {
                "key" => key = Some(text),
                "image" => image = Some(text),
                _ => {}
            }
        }

        match (key.as_deref(), image) {
            (Some("good-key"), Some(image)) if !image.is_empty() => Json(json!({
                "data": { "url": format!("https://i.ibb.co/abc/{}.jpg", image.len()) },
                "success": true,
                "status": 200
            })),
            _ => Json(json!({
                "status_code": 400,
                "error": { "message": "Invalid API v1 key.", "code": 100 },
                "status_txt": "Bad Request"
            })),
        }
    }

    async fn spawn_host() -> String {
        let app = Router::new().route("/1/upload", post(upload_endpoint));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/1/upload", addr)
    }

    #[tokio::test]
    async fn test_upload_returns_hosted_url() {
        let endpoint = spawn_host().await;
        let host = ImgbbHost::new(endpoint, Some("good-key".to_string())).unwrap();

        let url = host.upload("aGVsbG8=".to_string()).await.unwrap();
        assert_eq!(url, "https://i.ibb.co/abc/8.jpg");
    }

    #[tokio::test]
    async fn test_host_error_message_is_surfaced() {
        let endpoint = spawn_host().await;
        let host = ImgbbHost::new(endpoint, Some("bad-key".to_string())).unwrap();

        let err = host.upload("aGVsbG8=".to_string()).await.unwrap_err();
        assert_eq!(err.error_code(), crate::errors::codes::UPLOAD_ERROR);
        assert!(err.message().contains("Invalid API v1 key."));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let host = ImgbbHost::new("http://127.0.0.1:9/unreachable", None).unwrap();
        let err = host.upload("aGVsbG8=".to_string()).await.unwrap_err();
        assert!(err.message().contains("non configurée"));
    }
}
