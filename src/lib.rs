pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod output;
pub mod utils;

pub use adapters::{EndpointSource, EngageClient, LocalStorage};
#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{JobConfig, LoginConfig};

pub use core::{
    etl::EtlEngine,
    plan::SearchPlan,
    search_pipeline::{OutputSettings, SearchPipeline},
};
pub use utils::error::{EtlError, Result};
