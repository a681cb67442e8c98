// Presenter: turns pass-through records into tables, CSV/TSV rows and JSON.

pub mod flatten;
pub mod table;
pub mod writer;

use crate::domain::endpoint::Endpoint;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Tsv,
}

impl OutputFormat {
    /// 寫檔用的副檔名；table 只輸出到 console
    pub fn extension(self) -> Option<&'static str> {
        match self {
            OutputFormat::Table => None,
            OutputFormat::Json => Some("json"),
            OutputFormat::Csv => Some("csv"),
            OutputFormat::Tsv => Some("tsv"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
        };
        f.write_str(name)
    }
}

/// 輸出欄位：直接寫路徑，或 `{ path, header }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Path(String),
    Mapped { path: String, header: String },
}

impl ColumnSpec {
    pub fn named(path: &str, header: &str) -> Self {
        ColumnSpec::Mapped {
            path: path.to_string(),
            header: header.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ColumnSpec::Path(path) | ColumnSpec::Mapped { path, .. } => path,
        }
    }

    pub fn header(&self) -> &str {
        match self {
            ColumnSpec::Path(path) => path,
            ColumnSpec::Mapped { header, .. } => header,
        }
    }
}

/// 內建端點的預設欄位；空陣列代表攤平全部欄位
pub fn default_columns(endpoint: Endpoint) -> Vec<ColumnSpec> {
    let columns: &[(&str, &str)] = match endpoint {
        Endpoint::SupporterSearch | Endpoint::SegmentMembers => &[
            ("supporterId", "Supporter ID"),
            ("firstName", "First Name"),
            ("lastName", "Last Name"),
            ("contacts[type=EMAIL].value", "Email"),
            ("contacts[type=EMAIL].status", "Email Status"),
            ("address.city", "City"),
            ("address.state", "State"),
            ("lastModified", "Last Modified"),
        ],
        Endpoint::SegmentSearch => &[
            ("segmentId", "Segment ID"),
            ("name", "Name"),
            ("type", "Type"),
            ("totalMembers", "Members"),
        ],
        Endpoint::ActivitySearch => &[
            ("activityId", "Activity ID"),
            ("activityType", "Type"),
            ("activityFormName", "Form"),
            ("supporterId", "Supporter ID"),
            ("activityDate", "Date"),
            ("totalReceivedAmount", "Amount"),
        ],
        Endpoint::BlastSearch => &[
            ("id", "Blast ID"),
            ("name", "Name"),
            ("status", "Status"),
            ("publishDate", "Published"),
        ],
        Endpoint::Metrics
        | Endpoint::SupporterUpsert
        | Endpoint::EmailSearch
        | Endpoint::DeveloperActivitySearch => &[],
    };

    columns
        .iter()
        .map(|(path, header)| ColumnSpec::named(path, header))
        .collect()
}
