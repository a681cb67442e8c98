use crate::domain::endpoint::ApiFamily;
use crate::domain::model::{Page, Record, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 連線設定來源 (login 檔或測試替身)
pub trait ConfigProvider: Send + Sync {
    fn host_for(&self, family: ApiFamily) -> &str;
    fn token_for(&self, family: ApiFamily) -> Result<&str>;
    fn timeout(&self) -> Option<Duration>;
}

/// 可用 offset/count 逐頁讀取的來源
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, offset: u64, count: u64) -> Result<Page>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Record>>;
    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
