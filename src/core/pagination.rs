use crate::core::{PageSource, SearchOutcome};

/// offset/count 分頁迴圈：從 `start_offset` 開始，每次以回傳的 `count` 前進，
/// `count == 0` 時結束。錯誤會中止迴圈並保留已取得的記錄。
pub struct PagedSearch<'a, P: PageSource + ?Sized> {
    source: &'a P,
    label: String,
    page_size: u64,
    start_offset: u64,
    max_records: Option<usize>,
}

impl<'a, P: PageSource + ?Sized> PagedSearch<'a, P> {
    pub fn new(source: &'a P, label: impl Into<String>, page_size: u64) -> Self {
        Self {
            source,
            label: label.into(),
            page_size,
            start_offset: 0,
            max_records: None,
        }
    }

    pub fn start_offset(mut self, offset: u64) -> Self {
        self.start_offset = offset;
        self
    }

    pub fn max_records(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records;
        self
    }

    pub async fn run(&self) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let mut offset = self.start_offset;

        loop {
            if self.cap_reached(outcome.records.len()) {
                tracing::info!(
                    "🛑 {}: reached max_records ({}), stopping",
                    self.label,
                    outcome.records.len()
                );
                break;
            }

            let page = match self.source.fetch_page(offset, self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(
                        "❌ {}: request at offset {} failed: {}",
                        self.label,
                        offset,
                        e
                    );
                    outcome.interrupted = Some(e);
                    break;
                }
            };

            if page.count == 0 {
                tracing::debug!("{}: empty page at offset {}, done", self.label, offset);
                break;
            }

            if page.total.is_some() {
                outcome.total = page.total;
            }
            outcome.pages += 1;
            outcome.records.extend(page.records);
            offset += page.count;

            tracing::info!(
                "📄 {}: page {} fetched, {} records so far{}",
                self.label,
                outcome.pages,
                outcome.records.len(),
                outcome
                    .total
                    .map(|t| format!(" of {}", t))
                    .unwrap_or_default()
            );
        }

        if let Some(max) = self.max_records {
            outcome.records.truncate(max);
        }

        outcome
    }

    fn cap_reached(&self, fetched: usize) -> bool {
        self.max_records.is_some_and(|max| fetched >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Page, Record};
    use crate::utils::error::{EtlError, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// 依序回傳預先準備的頁面，並記錄收到的 offset
    struct ScriptedSource {
        pages: Mutex<Vec<Result<Page>>>,
        offsets: Mutex<Vec<(u64, u64)>>,
    }

    impl ScriptedSource {
        fn new(mut pages: Vec<Result<Page>>) -> Self {
            pages.reverse();
            Self {
                pages: Mutex::new(pages),
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<(u64, u64)> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch_page(&self, offset: u64, count: u64) -> Result<Page> {
            self.offsets.lock().unwrap().push((offset, count));
            self.pages
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Page::default()))
        }
    }

    fn page(ids: std::ops::Range<u64>, total: u64) -> Result<Page> {
        let records: Vec<Record> = ids.map(|id| Record::from_value(json!({ "id": id }))).collect();
        Ok(Page {
            count: records.len() as u64,
            offset: None,
            total: Some(total),
            records,
        })
    }

    #[tokio::test]
    async fn test_collects_until_empty_page() {
        let source = ScriptedSource::new(vec![page(0..3, 7), page(3..6, 7), page(6..7, 7)]);
        let outcome = PagedSearch::new(&source, "test", 3).run().await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.records.len(), 7);
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.total, Some(7));
        assert_eq!(source.offsets(), vec![(0, 3), (3, 3), (6, 3), (7, 3)]);
    }

    #[tokio::test]
    async fn test_cardinality_matches_sum_of_page_counts() {
        let sizes = [20u64, 20, 20, 5];
        let mut pages = Vec::new();
        let mut next = 0;
        for size in sizes {
            pages.push(page(next..next + size, 65));
            next += size;
        }
        let source = ScriptedSource::new(pages);

        let outcome = PagedSearch::new(&source, "test", 20).run().await;
        assert_eq!(outcome.records.len() as u64, sizes.iter().sum::<u64>());
    }

    #[tokio::test]
    async fn test_error_keeps_partial_results() {
        let source = ScriptedSource::new(vec![
            page(0..2, 10),
            Err(EtlError::ApiStatusError {
                status: 500,
                body: "oops".to_string(),
            }),
            page(2..4, 10),
        ]);

        let outcome = PagedSearch::new(&source, "test", 2).run().await;
        assert!(!outcome.is_complete());
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(source.offsets().len(), 2);
        assert!(matches!(
            outcome.interrupted,
            Some(EtlError::ApiStatusError { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_offset_advances_by_reported_count() {
        // 伺服器回傳的 count 比要求的少
        let source = ScriptedSource::new(vec![page(0..2, 4), page(2..4, 4)]);
        let outcome = PagedSearch::new(&source, "test", 20)
            .start_offset(100)
            .run()
            .await;

        assert_eq!(outcome.records.len(), 4);
        assert_eq!(source.offsets(), vec![(100, 20), (102, 20), (104, 20)]);
    }

    #[tokio::test]
    async fn test_max_records_stops_early() {
        let source = ScriptedSource::new(vec![page(0..3, 9), page(3..6, 9), page(6..9, 9)]);
        let outcome = PagedSearch::new(&source, "test", 3)
            .max_records(Some(4))
            .run()
            .await;

        assert_eq!(outcome.records.len(), 4);
        assert_eq!(source.offsets().len(), 2);
    }
}
