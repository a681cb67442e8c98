use crate::config::job::{JobConfig, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::config::login::LoginConfig;
use crate::domain::endpoint::{Endpoint, EndpointDescriptor, Paging};
use crate::output::{default_columns, ColumnSpec};
use crate::utils::dates::{days_ago, normalize_date_filters};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_range;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// 一次搜尋要用的端點、過濾條件與分頁設定
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub name: String,
    pub descriptor: EndpointDescriptor,
    pub filters: Map<String, Value>,
    pub columns: Vec<ColumnSpec>,
    pub page_size: u64,
    pub start_offset: u64,
    pub max_records: Option<usize>,
}

impl SearchPlan {
    pub fn for_endpoint(endpoint: Endpoint) -> Self {
        Self {
            name: endpoint.name().to_string(),
            descriptor: endpoint.descriptor(),
            filters: Map::new(),
            columns: default_columns(endpoint),
            page_size: DEFAULT_PAGE_SIZE,
            start_offset: 0,
            max_records: None,
        }
    }

    pub fn from_job(job: &JobConfig) -> Result<Self> {
        Ok(Self {
            name: job.filename(),
            descriptor: job.descriptor()?,
            filters: job.source.filters.clone(),
            columns: job.columns(),
            page_size: job.page_size(),
            start_offset: job.source.start_offset.unwrap_or(0),
            max_records: job.source.max_records,
        })
    }

    pub fn filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.filters.insert(key.to_string(), value.into());
        self
    }

    pub fn filter_opt(self, key: &str, value: Option<String>) -> Self {
        match value {
            Some(value) => self.filter(key, value),
            None => self,
        }
    }

    pub fn filter_list(self, key: &str, values: Vec<String>) -> Self {
        if values.is_empty() {
            return self;
        }
        self.filter(key, values)
    }

    pub fn filter_default(self, key: &str, value: impl Into<Value>) -> Self {
        if self.filters.contains_key(key) {
            return self;
        }
        self.filter(key, value)
    }

    /// 命令列沒有指定的過濾條件，從 login 檔補上
    pub fn fallback_from(mut self, login: &LoginConfig, keys: &[&str]) -> Self {
        for key in keys {
            if self.filters.contains_key(*key) {
                continue;
            }
            if let Some(value) = login.param(key) {
                self.filters.insert(key.to_string(), value.clone());
            }
        }
        self
    }

    /// `--days N` 轉成 modifiedFrom
    pub fn modified_within_days(self, days: Option<u32>, now: DateTime<Utc>) -> Result<Self> {
        match days {
            Some(days) => Ok(self.filter("modifiedFrom", days_ago(days, now)?)),
            None => Ok(self),
        }
    }

    pub fn page_size(mut self, page_size: Option<u64>) -> Self {
        if let Some(page_size) = page_size {
            self.page_size = page_size;
        }
        self
    }

    pub fn max_records(mut self, max_records: Option<usize>) -> Self {
        if max_records.is_some() {
            self.max_records = max_records;
        }
        self
    }

    pub fn require(&self, key: &str) -> Result<()> {
        match self.filters.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
            Some(Value::Array(items)) if !items.is_empty() => Ok(()),
            Some(Value::Number(_)) | Some(Value::Bool(_)) => Ok(()),
            _ => Err(EtlError::MissingConfigError {
                field: key.to_string(),
            }),
        }
    }

    /// 日期欄位正規化並檢查分頁大小
    pub fn finalize(mut self) -> Result<Self> {
        normalize_date_filters(&mut self.filters)?;
        validate_range("page_size", self.page_size, 1, MAX_PAGE_SIZE)?;
        Ok(self)
    }

    /// dry run 用的請求摘要
    pub fn describe(&self, host: &str) -> String {
        let mut lines = vec![
            format!("  Endpoint: {} {}", self.descriptor.method, self.descriptor.url(host)),
            format!("  API family: {:?}", self.descriptor.family),
            format!(
                "  Paging: {} (offset {} + page size {})",
                match self.descriptor.paging {
                    Paging::Body => "payload.offset/payload.count",
                    Paging::Query => "?offset=&count=",
                },
                self.start_offset,
                self.page_size
            ),
            format!(
                "  Results: payload.{}",
                self.descriptor.result_key.as_deref().unwrap_or("<first array>")
            ),
        ];

        if let Some(max) = self.max_records {
            lines.push(format!("  Max records: {}", max));
        }

        if self.filters.is_empty() {
            lines.push("  Filters: none".to_string());
        } else {
            lines.push("  Filters:".to_string());
            for (key, value) in &self.filters {
                lines.push(format!("    {} = {}", key, value));
            }
        }

        if !self.columns.is_empty() {
            let headers: Vec<&str> = self.columns.iter().map(ColumnSpec::header).collect();
            lines.push(format!("  Columns: {}", headers.join(", ")));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn login() -> LoginConfig {
        LoginConfig::from_yaml_str(
            "token: t\nmodifiedFrom: '2024-02-01'\ntype: FUNDRAISE\nsegmentId: seg-1\n",
        )
        .unwrap()
    }

    #[test]
    fn test_command_line_wins_over_login_file() {
        let plan = SearchPlan::for_endpoint(Endpoint::ActivitySearch)
            .filter_opt("type", Some("PETITION".to_string()))
            .fallback_from(&login(), &["type", "modifiedFrom", "modifiedTo"])
            .finalize()
            .unwrap();

        assert_eq!(plan.filters["type"], "PETITION");
        assert_eq!(plan.filters["modifiedFrom"], "2024-02-01T00:00:00.000Z");
        assert!(!plan.filters.contains_key("modifiedTo"));
    }

    #[test]
    fn test_days_sets_modified_from() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        let plan = SearchPlan::for_endpoint(Endpoint::SupporterSearch)
            .modified_within_days(Some(10), now)
            .unwrap()
            .fallback_from(&login(), &["modifiedFrom"]);
        assert_eq!(plan.filters["modifiedFrom"], "2024-04-30T00:00:00.000Z");
    }

    #[test]
    fn test_require_reports_missing_filter() {
        let plan = SearchPlan::for_endpoint(Endpoint::SegmentMembers);
        let err = plan.require("segmentId").unwrap_err();
        assert!(err.to_string().contains("segmentId"));

        let plan = plan.fallback_from(&login(), &["segmentId"]);
        assert!(plan.require("segmentId").is_ok());
    }

    #[test]
    fn test_filter_default_keeps_existing_value() {
        let plan = SearchPlan::for_endpoint(Endpoint::EmailSearch)
            .fallback_from(&login(), &["type"])
            .filter_default("type", "EMAIL")
            .filter_default("modifiedTo", "2024-03-01");
        assert_eq!(plan.filters["type"], "FUNDRAISE");
        assert_eq!(plan.filters["modifiedTo"], "2024-03-01");
    }

    #[test]
    fn test_filter_list_skips_empty() {
        let plan = SearchPlan::for_endpoint(Endpoint::SupporterSearch)
            .filter_list("identifiers", Vec::new())
            .filter_list("activityFormIds", vec!["a".to_string()]);
        assert!(!plan.filters.contains_key("identifiers"));
        assert_eq!(plan.filters["activityFormIds"], json!(["a"]));
    }

    #[test]
    fn test_finalize_rejects_page_size() {
        let result = SearchPlan::for_endpoint(Endpoint::SegmentSearch)
            .page_size(Some(0))
            .finalize();
        assert!(result.is_err());
    }

    #[test]
    fn test_describe_mentions_endpoint_and_filters() {
        let plan = SearchPlan::for_endpoint(Endpoint::BlastSearch).filter("criteria", "spring");
        let text = plan.describe("https://api.salsalabs.org");
        assert!(text.contains("GET https://api.salsalabs.org/api/developer/ext/v1/blasts"));
        assert!(text.contains("criteria = \"spring\""));
        assert!(text.contains("?offset=&count="));
    }
}
