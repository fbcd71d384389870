//! Language-understanding adapter (LUIS v2 prediction endpoint).
//!
//! `GET {endpoint}/luis/v2.0/apps/{app_id}?q=...` with the subscription key,
//! mapped into the provider-agnostic `IntentResult`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use gracebot_core::{
    config::LuisConfig,
    errors::Error,
    ports::{IntentClassifier, IntentEntity, IntentResult},
    Result,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LuisResponse {
    #[serde(default)]
    query: String,
    #[serde(default)]
    top_scoring_intent: Option<LuisIntent>,
    #[serde(default)]
    entities: Vec<LuisEntity>,
}

#[derive(Debug, Deserialize)]
struct LuisIntent {
    intent: String,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Deserialize)]
struct LuisEntity {
    entity: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    score: Option<f64>,
}

impl From<LuisResponse> for IntentResult {
    fn from(r: LuisResponse) -> Self {
        let (top_intent, score) = match r.top_scoring_intent {
            Some(i) => (Some(i.intent), i.score),
            None => (None, 0.0),
        };
        IntentResult {
            query: r.query,
            top_intent,
            score,
            entities: r
                .entities
                .into_iter()
                .map(|e| IntentEntity {
                    entity: e.entity,
                    kind: e.kind,
                    score: e.score,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LuisClient {
    cfg: LuisConfig,
    http: reqwest::Client,
}

impl LuisClient {
    pub fn new(cfg: LuisConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self { cfg, http })
    }

    fn prediction_url(&self, text: &str) -> Result<Url> {
        let mut url = Url::parse(&self.cfg.endpoint)
            .map_err(|e| Error::Config(format!("invalid LUIS_ENDPOINT: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("LUIS_ENDPOINT cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["luis", "v2.0", "apps", self.cfg.app_id.as_str()]);
        url.query_pairs_mut()
            .append_pair("subscription-key", &self.cfg.key)
            .append_pair("verbose", "false")
            .append_pair("q", text);
        Ok(url)
    }
}

#[async_trait]
impl IntentClassifier for LuisClient {
    async fn classify(&self, text: &str) -> Result<IntentResult> {
        let url = self.prediction_url(text)?;

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::External(format!("luis request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "luis prediction failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: LuisResponse = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("luis json error: {e}")))?;

        let result = IntentResult::from(parsed);
        tracing::debug!(intent = ?result.top_intent, score = result.score, "luis prediction");
        Ok(result)
    }
}
