use crate::domain::endpoint::{ApiFamily, Endpoint, EndpointDescriptor, HttpMethod, Paging};
use crate::output::{default_columns, ColumnSpec, OutputFormat};
use crate::utils::env::substitute_env_vars;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, validate_range, Validate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 200;

/// TOML 工作檔：端點描述 + 過濾條件 + 輸出設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job: JobInfo,
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 內建端點名稱，例如 "activity_search"
    pub endpoint: Option<Endpoint>,
    pub path: Option<String>,
    pub method: Option<HttpMethod>,
    pub family: Option<ApiFamily>,
    pub result_key: Option<String>,
    pub paging: Option<Paging>,
    pub page_size: Option<u64>,
    pub start_offset: Option<u64>,
    pub max_records: Option<usize>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<OutputFormat>,
    pub filename: Option<String>,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            output_formats: default_output_formats(),
            filename: None,
            compress: false,
            columns: Vec::new(),
        }
    }
}

fn default_output_path() -> String {
    ".".to_string()
}

fn default_output_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Table]
}

impl JobConfig {
    /// 從 TOML 檔案載入
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| EtlError::ConfigError {
            message: format!("Cannot read job file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 內建端點為基礎，自訂欄位覆寫
    pub fn descriptor(&self) -> Result<EndpointDescriptor> {
        let source = &self.source;
        let mut descriptor = match (source.endpoint, &source.path) {
            (Some(endpoint), _) => endpoint.descriptor(),
            (None, Some(path)) => EndpointDescriptor {
                name: self.job.name.clone(),
                family: ApiFamily::default(),
                method: HttpMethod::default(),
                path: path.clone(),
                result_key: None,
                paging: Paging::default(),
            },
            (None, None) => {
                return Err(EtlError::MissingConfigError {
                    field: "source.endpoint or source.path".to_string(),
                })
            }
        };

        if let Some(path) = &source.path {
            descriptor.path = path.clone();
        }
        if let Some(method) = source.method {
            descriptor.method = method;
        }
        if let Some(family) = source.family {
            descriptor.family = family;
        }
        if let Some(result_key) = &source.result_key {
            descriptor.result_key = Some(result_key.clone());
        }
        if let Some(paging) = source.paging {
            descriptor.paging = paging;
        }

        Ok(descriptor)
    }

    pub fn page_size(&self) -> u64 {
        self.source.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// 沒有設定欄位時用內建端點的預設欄位
    pub fn columns(&self) -> Vec<ColumnSpec> {
        if !self.output.columns.is_empty() {
            return self.output.columns.clone();
        }
        self.source.endpoint.map(default_columns).unwrap_or_default()
    }

    pub fn filename(&self) -> String {
        self.output
            .filename
            .clone()
            .unwrap_or_else(|| self.job.name.clone())
    }
}

impl Validate for JobConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("job.name", &self.job.name)?;
        validate_path("output.output_path", &self.output.output_path)?;
        validate_range("source.page_size", self.page_size(), 1, MAX_PAGE_SIZE)?;

        if let Some(path) = &self.source.path {
            if !path.starts_with('/') {
                return Err(EtlError::InvalidConfigValueError {
                    field: "source.path".to_string(),
                    value: path.clone(),
                    reason: "Path must start with '/'".to_string(),
                });
            }
        }

        if let Some(endpoint @ (Endpoint::Metrics | Endpoint::SupporterUpsert)) = self.source.endpoint {
            return Err(EtlError::InvalidConfigValueError {
                field: "source.endpoint".to_string(),
                value: endpoint.to_string(),
                reason: "Endpoint is not a paginated search".to_string(),
            });
        }

        if self.output.output_formats.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "output.output_formats".to_string(),
            });
        }

        self.descriptor().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PETITION_JOB: &str = r#"
[job]
name = "petition-signers"
description = "Petition signatures modified this year"

[source]
endpoint = "activity_search"
page_size = 50
max_records = 500

[source.filters]
type = "PETITION"
modifiedFrom = "2024-01-01"

[output]
output_path = "./exports"
output_formats = ["csv", "table"]
columns = [
    "activityId",
    { path = "supporterId", header = "Supporter" },
]
"#;

    #[test]
    fn test_parse_builtin_job() {
        let job = JobConfig::from_toml_str(PETITION_JOB).unwrap();
        assert!(job.validate().is_ok());

        let descriptor = job.descriptor().unwrap();
        assert_eq!(descriptor.path, "/api/integration/ext/v1/activities/search");
        assert_eq!(job.page_size(), 50);
        assert_eq!(job.source.max_records, Some(500));
        assert_eq!(job.source.filters["type"], "PETITION");
        assert_eq!(
            job.output.output_formats,
            vec![OutputFormat::Csv, OutputFormat::Table]
        );
        assert_eq!(job.columns()[1].header(), "Supporter");
        assert_eq!(job.filename(), "petition-signers");
    }

    #[test]
    fn test_custom_endpoint_descriptor() {
        let job = JobConfig::from_toml_str(
            r#"
[job]
name = "blasts-by-query"

[source]
path = "/api/developer/ext/v1/blasts"
method = "GET"
family = "developer"
paging = "query"
result_key = "results"
"#,
        )
        .unwrap();

        assert!(job.validate().is_ok());
        let descriptor = job.descriptor().unwrap();
        assert_eq!(descriptor.name, "blasts-by-query");
        assert_eq!(descriptor.family, ApiFamily::Developer);
        assert_eq!(descriptor.method, HttpMethod::Get);
        assert_eq!(descriptor.paging, Paging::Query);
        assert_eq!(job.output.output_formats, vec![OutputFormat::Table]);
        assert!(job.columns().is_empty());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let no_source = JobConfig::from_toml_str("[job]\nname = \"x\"\n[source]\n").unwrap();
        assert!(no_source.validate().is_err());

        let big_page = JobConfig::from_toml_str(
            "[job]\nname = \"x\"\n[source]\nendpoint = \"segment_search\"\npage_size = 1000\n",
        )
        .unwrap();
        assert!(big_page.validate().is_err());

        let relative = JobConfig::from_toml_str(
            "[job]\nname = \"x\"\n[source]\npath = \"api/things\"\n",
        )
        .unwrap();
        assert!(relative.validate().is_err());

        let upsert = JobConfig::from_toml_str(
            "[job]\nname = \"x\"\n[source]\nendpoint = \"supporter_upsert\"\n",
        )
        .unwrap();
        assert!(upsert.validate().is_err());
    }

    #[test]
    fn test_unknown_format_is_a_parse_error() {
        let err = JobConfig::from_toml_str(
            "[job]\nname = \"x\"\n[source]\nendpoint = \"segment_search\"\n[output]\noutput_formats = [\"xml\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_job_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PETITION_JOB.as_bytes()).unwrap();
        let job = JobConfig::from_file(file.path()).unwrap();
        assert_eq!(job.job.name, "petition-signers");
    }
}
