//! HTTP client for a hosted text classifier.
//!
//! Speaks the prediction API exposed by Gradio-style inference spaces:
//! `POST {endpoint}/api/predict` with `{"data": [text]}`, label read from
//! `data[0]` of the JSON response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModerationError;
use crate::{Moderator, Verdict};

#[derive(Serialize)]
struct PredictRequest<'a> {
    data: [&'a str; 1],
}

#[derive(Deserialize)]
struct PredictResponse {
    data: Vec<serde_json::Value>,
}

/// Remote classifier client.
#[derive(Debug, Clone)]
pub struct HttpModerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpModerator {
    /// `endpoint` is the base URL of the inference space, without the
    /// `/api/predict` suffix.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Moderator for HttpModerator {
    async fn classify(&self, text: &str) -> Result<Verdict, ModerationError> {
        let url = format!("{}/api/predict", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&PredictRequest { data: [text] })
            .send()
            .await?
            .error_for_status()?;

        let body: PredictResponse = response.json().await?;
        let label = body
            .data
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ModerationError::BadResponse("response carries no label in data[0]".to_string())
            })?;

        debug!(label, "classifier verdict");
        Ok(Verdict::new(label))
    }
}
