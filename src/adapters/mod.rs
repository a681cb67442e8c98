// Adapters layer: concrete implementations for external systems (filesystem, Engage HTTP API).

pub mod http;
pub mod storage;

pub use http::{EndpointSource, EngageClient};
pub use storage::LocalStorage;
