use crate::adapters::http::EngageClient;
use crate::domain::endpoint::Endpoint;
use crate::output::flatten::render;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `/metrics` 的回應：速率限制、批次上限與呼叫次數
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub rate_limit: Option<u64>,
    pub max_batch_size: Option<u64>,
    pub current_rate_limit: Option<u64>,
    #[serde(rename = "totalAPICalls")]
    pub total_api_calls: Option<u64>,
    #[serde(rename = "lastAPICall")]
    pub last_api_call: Option<String>,
    #[serde(rename = "totalAPICallFailures")]
    pub total_api_call_failures: Option<u64>,
    #[serde(rename = "lastAPICallFailure")]
    pub last_api_call_failure: Option<String>,
    /// 各資源的讀寫計數 (supporterRead、activityPetition ...)
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Metrics {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let known = [
            ("rateLimit", self.rate_limit.map(|v| v.to_string())),
            ("maxBatchSize", self.max_batch_size.map(|v| v.to_string())),
            ("currentRateLimit", self.current_rate_limit.map(|v| v.to_string())),
            ("totalAPICalls", self.total_api_calls.map(|v| v.to_string())),
            ("lastAPICall", self.last_api_call.clone()),
            (
                "totalAPICallFailures",
                self.total_api_call_failures.map(|v| v.to_string()),
            ),
            ("lastAPICallFailure", self.last_api_call_failure.clone()),
        ];

        known
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .chain(self.other.iter().map(|(k, v)| (k.clone(), render(v))))
            .collect()
    }

    /// 剩餘額度低於一成
    pub fn is_rate_limit_low(&self) -> bool {
        match (self.current_rate_limit, self.rate_limit) {
            (Some(current), Some(limit)) if limit > 0 => current.saturating_mul(10) < limit,
            _ => false,
        }
    }
}

pub async fn fetch_metrics(client: &EngageClient) -> Result<Metrics> {
    let payload = client.get_payload(&Endpoint::Metrics.descriptor()).await?;
    let metrics: Metrics = serde_json::from_value(payload)?;

    if metrics.is_rate_limit_low() {
        tracing::warn!(
            "⚠️ Only {} of {} API calls left in the current window",
            metrics.current_rate_limit.unwrap_or_default(),
            metrics.rate_limit.unwrap_or_default()
        );
    }

    Ok(metrics)
}
