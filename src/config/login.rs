use crate::domain::endpoint::ApiFamily;
use crate::domain::ports::ConfigProvider;
use crate::utils::env::substitute_env_vars;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "https://api.salsalabs.org";

/// `--login` 指向的 YAML 檔：token、host 以及各端點使用的參數
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub dev_token: Option<String>,
    #[serde(default)]
    pub dev_host: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// 其餘欄位 (modifiedFrom、segmentId、identifiers ...)
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl LoginConfig {
    /// 從 YAML 檔案載入
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| EtlError::ConfigError {
            message: format!("Cannot read login file '{}': {}", path.display(), e),
        })?;
        Self::from_yaml_str(&content)
    }

    /// 從 YAML 字串解析，先替換 ${VAR}
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;
        let config: LoginConfig = serde_yaml::from_str(&processed)?;
        Ok(config)
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    /// 字串或數字參數
    pub fn param_str(&self, name: &str) -> Option<String> {
        match self.param(name)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn require_param(&self, name: &str) -> Result<String> {
        self.param_str(name).ok_or_else(|| EtlError::MissingConfigError {
            field: name.to_string(),
        })
    }

    /// YAML 陣列或逗號分隔字串
    pub fn param_list(&self, name: &str) -> Vec<String> {
        match self.param(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl ConfigProvider for LoginConfig {
    fn host_for(&self, family: ApiFamily) -> &str {
        match family {
            ApiFamily::Integration => &self.host,
            ApiFamily::Developer => self.dev_host.as_deref().unwrap_or(&self.host),
        }
    }

    fn token_for(&self, family: ApiFamily) -> Result<&str> {
        let (field, token) = match family {
            ApiFamily::Integration => ("token", self.token.as_deref()),
            ApiFamily::Developer => ("devToken", self.dev_token.as_deref()),
        };
        token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| EtlError::MissingConfigError {
                field: field.to_string(),
            })
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

impl Validate for LoginConfig {
    fn validate(&self) -> Result<()> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "token".to_string(),
            })?;
        validate_non_empty_string("token", token)?;
        validate_url("host", &self.host)?;

        if let Some(dev_host) = &self.dev_host {
            validate_url("devHost", dev_host)?;
        }
        if let Some(dev_token) = &self.dev_token {
            validate_non_empty_string("devToken", dev_token)?;
        }
        Ok(())
    }
}
