use crate::domain::endpoint::{ApiFamily, EndpointDescriptor, Paging};
use crate::domain::model::Page;
use crate::domain::ports::{ConfigProvider, PageSource};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Map, Value};

const AUTH_TOKEN_HEADER: &str = "authtoken";
const MAX_ERROR_BODY: usize = 500;

/// 帶 `authToken` 與 `Content-Type` 標頭的 Engage API 客戶端
#[derive(Debug, Clone)]
pub struct EngageClient {
    client: Client,
    host: String,
}

impl EngageClient {
    pub fn new<C: ConfigProvider>(config: &C, family: ApiFamily) -> Result<Self> {
        let token = config.token_for(family)?;

        let mut auth = HeaderValue::from_str(token).map_err(|e| EtlError::InvalidConfigValueError {
            field: "token".to_string(),
            value: "<redacted>".to_string(),
            reason: format!("Token is not a valid header value: {}", e),
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(AUTH_TOKEN_HEADER), auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            host: config.host_for(family).to_string(),
        })
    }

    /// 送出請求並解析 JSON；非 2xx 回應轉成 `ApiStatusError`
    pub async fn send_json(
        &self,
        descriptor: &EndpointDescriptor,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = descriptor.url(&self.host);
        let mut request = self.client.request(descriptor.method.as_reqwest(), &url);

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!("📡 {} {}", descriptor.method, url);
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("API response status: {}", status);

        let text = response.text().await?;
        if !status.is_success() {
            return Err(EtlError::ApiStatusError {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        serde_json::from_str(&text).map_err(|e| EtlError::UnexpectedResponse {
            message: format!("{}: response is not valid JSON: {}", descriptor.name, e),
        })
    }

    /// 讀取一頁搜尋結果
    pub async fn fetch_page(
        &self,
        descriptor: &EndpointDescriptor,
        filters: &Map<String, Value>,
        offset: u64,
        count: u64,
    ) -> Result<Page> {
        let body = match descriptor.paging {
            Paging::Body => {
                let request_body = search_body(filters, offset, count);
                self.send_json(descriptor, &[], Some(&request_body)).await?
            }
            Paging::Query => {
                let query = search_query(filters, offset, count);
                self.send_json(descriptor, &query, None).await?
            }
        };

        descriptor.parse_page(body)
    }

    /// 不分頁的 GET，回傳 `payload`
    pub async fn get_payload(&self, descriptor: &EndpointDescriptor) -> Result<Value> {
        let body = self.send_json(descriptor, &[], None).await?;
        take_payload(descriptor, body)
    }

    /// 以 `{"payload": ...}` 包裝送出寫入請求，回傳 `payload`
    pub async fn send_payload(&self, descriptor: &EndpointDescriptor, payload: Value) -> Result<Value> {
        let request_body = json!({ "payload": payload });
        let body = self.send_json(descriptor, &[], Some(&request_body)).await?;
        take_payload(descriptor, body)
    }
}

/// 綁定端點與過濾條件的分頁來源
pub struct EndpointSource {
    client: EngageClient,
    descriptor: EndpointDescriptor,
    filters: Map<String, Value>,
}

impl EndpointSource {
    pub fn new(client: EngageClient, descriptor: EndpointDescriptor, filters: Map<String, Value>) -> Self {
        Self {
            client,
            descriptor,
            filters,
        }
    }
}

#[async_trait]
impl PageSource for EndpointSource {
    async fn fetch_page(&self, offset: u64, count: u64) -> Result<Page> {
        self.client
            .fetch_page(&self.descriptor, &self.filters, offset, count)
            .await
    }
}

pub fn search_body(filters: &Map<String, Value>, offset: u64, count: u64) -> Value {
    let mut payload = filters.clone();
    payload.insert("offset".to_string(), json!(offset));
    payload.insert("count".to_string(), json!(count));
    json!({ "payload": payload })
}

pub fn search_query(filters: &Map<String, Value>, offset: u64, count: u64) -> Vec<(String, String)> {
    let mut query: Vec<(String, String)> = filters
        .iter()
        .filter_map(|(key, value)| query_value(value).map(|v| (key.clone(), v)))
        .collect();
    query.push(("offset".to_string(), offset.to_string()));
    query.push(("count".to_string(), count.to_string()));
    query
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

fn take_payload(descriptor: &EndpointDescriptor, body: Value) -> Result<Value> {
    match body {
        Value::Object(mut obj) => obj.remove("payload").ok_or_else(|| EtlError::UnexpectedResponse {
            message: format!("{}: response has no 'payload' field", descriptor.name),
        }),
        _ => Err(EtlError::UnexpectedResponse {
            message: format!("{}: expected a JSON object", descriptor.name),
        }),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
