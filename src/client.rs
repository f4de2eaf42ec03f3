//! HTTP client for the sentiment prediction backend.
//!
//! The backend is an external service. It accepts a single text at
//! `POST {base}/predict` or a batch at `POST {base}/predict/batch` and answers
//! with a model code (0 = negative, 1 = neutral, 2 = positive) plus the three
//! class scores for every text.

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::label::ModelCode;
use crate::scores::SentimentScores;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// One prediction for one text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: ModelCode,
    #[serde(default)]
    pub scores: Option<SentimentScores>,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

/// Client for the prediction backend.
pub struct PredictionClient {
    base_url: String,
    client: reqwest::Client,
}

impl PredictionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Predict a single text.
    pub async fn predict_one(&self, text: &str) -> Result<Prediction> {
        let url = format!("{}/predict", self.base_url);
        self.client
            .post(&url)
            .json(&PredictRequest { text })
            .send()
            .await
            .wrap_err_with(|| format!("Failed to connect to prediction backend at {}", url))?
            .error_for_status()
            .wrap_err("Prediction backend returned an error")?
            .json()
            .await
            .wrap_err("Failed to parse prediction JSON")
    }

    /// Predict a batch of texts. The response must contain exactly one
    /// prediction per text, in request order.
    pub async fn predict_batch(&self, texts: &[String]) -> Result<Vec<Prediction>> {
        let url = format!("{}/predict/batch", self.base_url);
        let resp: BatchResponse = self
            .client
            .post(&url)
            .json(&BatchRequest { texts })
            .send()
            .await
            .wrap_err_with(|| format!("Failed to connect to prediction backend at {}", url))?
            .error_for_status()
            .wrap_err("Prediction backend returned an error")?
            .json()
            .await
            .wrap_err("Failed to parse batch prediction JSON")?;

        if resp.predictions.len() != texts.len() {
            eyre::bail!(
                "Expected {} predictions, backend returned {}",
                texts.len(),
                resp.predictions.len()
            );
        }
        debug!(count = texts.len(), "batch predicted");
        Ok(resp.predictions)
    }

    /// Predict every text, `batch_size` texts per request.
    pub async fn predict_all(&self, texts: &[String], batch_size: usize) -> Result<Vec<Prediction>> {
        let mut out = Vec::with_capacity(texts.len());
        for (i, chunk) in texts.chunks(batch_size.max(1)).enumerate() {
            let predictions = self
                .predict_batch(chunk)
                .await
                .wrap_err_with(|| format!("Batch {} failed", i + 1))?;
            out.extend(predictions);
        }
        info!(count = out.len(), base_url = %self.base_url, "predictions received");
        Ok(out)
    }
}
