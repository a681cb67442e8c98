use crate::domain::model::{Page, Record};
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Engage 有兩組 API，各自使用不同的 token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiFamily {
    #[default]
    Integration,
    Developer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        };
        f.write_str(name)
    }
}

/// offset/count 放在哪裡：JSON body 的 `payload` 或 query string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Paging {
    #[default]
    Body,
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub name: String,
    pub family: ApiFamily,
    pub method: HttpMethod,
    pub path: String,
    /// `payload` 中結果陣列的欄位名稱；沒有時取第一個陣列欄位
    pub result_key: Option<String>,
    pub paging: Paging,
}

impl EndpointDescriptor {
    pub fn url(&self, host: &str) -> String {
        format!("{}{}", host.trim_end_matches('/'), self.path)
    }

    /// 解析 `{payload: {count, offset?, total?, <result_key>: [...]}}`
    pub fn parse_page(&self, body: Value) -> Result<Page> {
        let payload = match body {
            Value::Object(mut obj) => obj.remove("payload").ok_or_else(|| {
                EtlError::UnexpectedResponse {
                    message: format!("{}: response has no 'payload' field", self.name),
                }
            })?,
            other => {
                return Err(EtlError::UnexpectedResponse {
                    message: format!("{}: expected a JSON object, got {}", self.name, other),
                })
            }
        };

        let Value::Object(mut payload) = payload else {
            return Err(EtlError::UnexpectedResponse {
                message: format!("{}: 'payload' is not an object", self.name),
            });
        };

        let key = match &self.result_key {
            Some(key) => Some(key.clone()),
            None => payload
                .iter()
                .find(|(k, v)| k.as_str() != "errors" && v.is_array())
                .map(|(k, _)| k.clone()),
        };

        // count 為 0 時伺服器可能省略結果陣列
        let records = match key.and_then(|k| payload.remove(&k).map(|v| (k, v))) {
            Some((_, Value::Array(items))) => items.into_iter().map(Record::from_value).collect(),
            Some((_, Value::Null)) | None => Vec::new(),
            Some((k, _)) => {
                return Err(EtlError::UnexpectedResponse {
                    message: format!("{}: 'payload.{}' is not an array", self.name, k),
                })
            }
        };

        let count = payload
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(records.len() as u64);

        Ok(Page {
            count,
            offset: payload.get("offset").and_then(Value::as_u64),
            total: payload.get("total").and_then(Value::as_u64),
            records,
        })
    }
}

/// 內建的 Engage 端點
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Metrics,
    SupporterSearch,
    SupporterUpsert,
    SegmentSearch,
    SegmentMembers,
    ActivitySearch,
    EmailSearch,
    DeveloperActivitySearch,
    BlastSearch,
}

impl Endpoint {
    pub const ALL: [Endpoint; 9] = [
        Endpoint::Metrics,
        Endpoint::SupporterSearch,
        Endpoint::SupporterUpsert,
        Endpoint::SegmentSearch,
        Endpoint::SegmentMembers,
        Endpoint::ActivitySearch,
        Endpoint::EmailSearch,
        Endpoint::DeveloperActivitySearch,
        Endpoint::BlastSearch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Metrics => "metrics",
            Endpoint::SupporterSearch => "supporter_search",
            Endpoint::SupporterUpsert => "supporter_upsert",
            Endpoint::SegmentSearch => "segment_search",
            Endpoint::SegmentMembers => "segment_members",
            Endpoint::ActivitySearch => "activity_search",
            Endpoint::EmailSearch => "email_search",
            Endpoint::DeveloperActivitySearch => "developer_activity_search",
            Endpoint::BlastSearch => "blast_search",
        }
    }

    pub fn descriptor(self) -> EndpointDescriptor {
        use ApiFamily::{Developer, Integration};
        use HttpMethod::{Get, Post, Put};

        let (family, method, path, result_key, paging) = match self {
            Endpoint::Metrics => (Integration, Get, "/api/integration/ext/v1/metrics", None, Paging::Body),
            Endpoint::SupporterSearch => (
                Integration,
                Post,
                "/api/integration/ext/v1/supporters/search",
                Some("supporters"),
                Paging::Body,
            ),
            Endpoint::SupporterUpsert => (
                Integration,
                Put,
                "/api/integration/ext/v1/supporters",
                Some("supporters"),
                Paging::Body,
            ),
            Endpoint::SegmentSearch => (
                Integration,
                Post,
                "/api/integration/ext/v1/segments/search",
                Some("segments"),
                Paging::Body,
            ),
            Endpoint::SegmentMembers => (
                Integration,
                Post,
                "/api/integration/ext/v1/segments/members/search",
                Some("supporters"),
                Paging::Body,
            ),
            Endpoint::ActivitySearch => (
                Integration,
                Post,
                "/api/integration/ext/v1/activities/search",
                Some("activities"),
                Paging::Body,
            ),
            Endpoint::EmailSearch => (
                Integration,
                Post,
                "/api/integration/ext/v1/emails/search",
                Some("emailActivities"),
                Paging::Body,
            ),
            Endpoint::DeveloperActivitySearch => (
                Developer,
                Post,
                "/api/developer/ext/v1/activities/search",
                Some("activities"),
                Paging::Body,
            ),
            Endpoint::BlastSearch => (
                Developer,
                Get,
                "/api/developer/ext/v1/blasts",
                Some("results"),
                Paging::Query,
            ),
        };

        EndpointDescriptor {
            name: self.name().to_string(),
            family,
            method,
            path: path.to_string(),
            result_key: result_key.map(str::to_string),
            paging,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_descriptors() {
        let blasts = Endpoint::BlastSearch.descriptor();
        assert_eq!(blasts.family, ApiFamily::Developer);
        assert_eq!(blasts.paging, Paging::Query);
        assert_eq!(blasts.method, HttpMethod::Get);

        let activities = Endpoint::ActivitySearch.descriptor();
        assert_eq!(
            activities.url("https://api.salsalabs.org/"),
            "https://api.salsalabs.org/api/integration/ext/v1/activities/search"
        );
        assert_eq!(activities.result_key.as_deref(), Some("activities"));

        for endpoint in Endpoint::ALL {
            assert!(endpoint.descriptor().path.starts_with("/api/"));
        }
    }

    #[test]
    fn test_parse_page_with_result_key() {
        let body = json!({
            "payload": {
                "count": 2,
                "offset": 0,
                "total": 5,
                "segments": [{"segmentId": "a"}, {"segmentId": "b"}]
            }
        });
        let page = Endpoint::SegmentSearch.descriptor().parse_page(body).unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.total, Some(5));
        assert_eq!(page.records[1].get("segmentId"), Some(&json!("b")));
    }

    #[test]
    fn test_parse_page_detects_result_array() {
        let mut descriptor = Endpoint::ActivitySearch.descriptor();
        descriptor.result_key = None;
        let body = json!({
            "payload": {"errors": [], "count": 1, "things": [{"id": 1}]}
        });
        let page = descriptor.parse_page(body).unwrap();
        assert_eq!(page.records.len(), 1);
    }

    #[test]
    fn test_parse_page_missing_results_and_count() {
        let body = json!({"payload": {"offset": 40}});
        let page = Endpoint::SupporterSearch.descriptor().parse_page(body).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.records.is_empty());
    }

    #[test]
    fn test_parse_page_without_payload_is_an_error() {
        let body = json!({"errors": [{"message": "bad"}]});
        let err = Endpoint::SupporterSearch.descriptor().parse_page(body).unwrap_err();
        assert!(matches!(err, EtlError::UnexpectedResponse { .. }));
    }

    #[test]
    fn test_endpoint_names_deserialize() {
        let endpoint: Endpoint = serde_json::from_value(json!("segment_members")).unwrap();
        assert_eq!(endpoint, Endpoint::SegmentMembers);
        assert_eq!(endpoint.to_string(), "segment_members");
    }
}
