//! Image CAPTCHA solving via an external service
//!
//! The docket search form protects submission with an image CAPTCHA. Workers
//! screenshot the challenge and hand the bytes to a [`CaptchaSolver`]; the
//! shipped implementation talks to the Anti-Captcha JSON API
//! (createTask / getTaskResult polling).

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::CaptchaConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry;

/// Solver for image CAPTCHAs
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Solve the challenge in `image` (PNG bytes) and return its text
    async fn solve_image(&self, image: &[u8]) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    #[serde(rename = "errorId")]
    error_id: i64,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
    #[serde(rename = "errorDescription", default)]
    error_description: Option<String>,
    #[serde(rename = "taskId", default)]
    task_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TaskResultResponse {
    #[serde(rename = "errorId")]
    error_id: i64,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
    #[serde(rename = "errorDescription", default)]
    error_description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    solution: Option<TaskSolution>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TaskSolution {
    text: String,
}

/// Anti-Captcha API client
///
/// Submits the image as an `ImageToTextTask` and polls `getTaskResult` until
/// the solution is ready. Transient HTTP failures are retried with the
/// configured backoff; service-level errors surface as [`Error::Captcha`].
pub struct AntiCaptchaClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    config: CaptchaConfig,
}

impl AntiCaptchaClient {
    /// Create a client from the captcha configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no API key is configured, or an I/O
    /// error if the key file cannot be read.
    pub async fn from_config(config: &CaptchaConfig) -> Result<Self> {
        let api_key = config.load_api_key().await?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            config: config.clone(),
        })
    }

    async fn create_task(&self, image: &[u8]) -> Result<i64> {
        let body = json!({
            "clientKey": self.api_key,
            "task": {
                "type": "ImageToTextTask",
                "body": BASE64.encode(image),
                "phrase": false,
                "case": false,
            }
        });

        let url = format!("{}/createTask", self.api_url);
        let response: CreateTaskResponse = with_retry(&self.config.retry, || {
            let request = self.http.post(&url).json(&body);
            async move { Ok::<_, Error>(request.send().await?.json().await?) }
        })
        .await?;

        if response.error_id != 0 {
            return Err(Error::Captcha(service_error(
                response.error_code,
                response.error_description,
            )));
        }

        response
            .task_id
            .ok_or_else(|| Error::Captcha("createTask returned no task id".to_string()))
    }

    async fn poll_result(&self, task_id: i64) -> Result<String> {
        let body = json!({
            "clientKey": self.api_key,
            "taskId": task_id,
        });
        let url = format!("{}/getTaskResult", self.api_url);

        for _ in 0..self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval).await;

            let response: TaskResultResponse = with_retry(&self.config.retry, || {
                let request = self.http.post(&url).json(&body);
                async move { Ok::<_, Error>(request.send().await?.json().await?) }
            })
            .await?;

            if response.error_id != 0 {
                return Err(Error::Captcha(service_error(
                    response.error_code,
                    response.error_description,
                )));
            }

            match response.status.as_deref() {
                Some("ready") => {
                    return response
                        .solution
                        .map(|s| s.text)
                        .ok_or_else(|| Error::Captcha("ready result without solution".to_string()));
                }
                Some("processing") | None => continue,
                Some(other) => {
                    return Err(Error::Captcha(format!("unexpected task status: {}", other)));
                }
            }
        }

        Err(Error::Captcha(format!(
            "task {} not ready after {} polls",
            task_id, self.config.max_polls
        )))
    }
}

#[async_trait]
impl CaptchaSolver for AntiCaptchaClient {
    async fn solve_image(&self, image: &[u8]) -> Result<String> {
        let task_id = self.create_task(image).await?;
        tracing::debug!(task_id, "captcha task created");

        let text = self.poll_result(task_id).await?;
        tracing::debug!(task_id, "captcha task solved");
        Ok(text)
    }
}

fn service_error(code: Option<String>, description: Option<String>) -> String {
    match (code, description) {
        (Some(code), Some(desc)) => format!("{}: {}", code, desc),
        (Some(code), None) => code,
        (None, Some(desc)) => desc,
        (None, None) => "unspecified service error".to_string(),
    }
}
