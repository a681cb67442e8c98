pub mod etl;
pub mod metrics;
pub mod pagination;
pub mod plan;
pub mod search_pipeline;
pub mod upsert;

pub use crate::domain::model::{Page, Record, SearchOutcome, TransformResult};
pub use crate::domain::ports::{ConfigProvider, PageSource, Pipeline, Storage};
pub use crate::utils::error::Result;
