use crate::core::pagination::PagedSearch;
use crate::core::plan::SearchPlan;
use crate::core::{PageSource, Pipeline, Record, Storage, TransformResult};
use crate::output::flatten::{resolve_columns, to_rows};
use crate::output::table::render_table;
use crate::output::writer::{to_delimited, to_json, zip_bundle};
use crate::output::{ColumnSpec, OutputFormat};
use crate::utils::error::{EtlError, Result};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub formats: Vec<OutputFormat>,
    pub output_path: String,
    pub filename: String,
    pub compress: bool,
}

/// 分頁搜尋 → 攤平成欄位 → 輸出表格/CSV/TSV/JSON
pub struct SearchPipeline<S: Storage, P: PageSource> {
    storage: S,
    source: P,
    plan: SearchPlan,
    output: OutputSettings,
    interrupted: Mutex<Option<EtlError>>,
}

impl<S: Storage, P: PageSource> SearchPipeline<S, P> {
    pub fn new(storage: S, source: P, plan: SearchPlan, output: OutputSettings) -> Self {
        Self {
            storage,
            source,
            plan,
            output,
            interrupted: Mutex::new(None),
        }
    }

    /// 取出最近一次 extract 中止的原因 (部分結果)
    pub fn take_interruption(&self) -> Option<EtlError> {
        self.interrupted.lock().ok().and_then(|mut slot| slot.take())
    }

    async fn write(&self, name: String, data: Vec<u8>, written: &mut Vec<String>) -> Result<()> {
        self.storage.write_file(&name, &data).await?;
        written.push(format!("{}/{}", self.output.output_path.trim_end_matches('/'), name));
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: Storage, P: PageSource> Pipeline for SearchPipeline<S, P> {
    async fn extract(&self) -> Result<Vec<Record>> {
        tracing::info!(
            "🚀 Searching {} ({} {})",
            self.plan.name,
            self.plan.descriptor.method,
            self.plan.descriptor.path
        );

        let outcome = PagedSearch::new(&self.source, self.plan.name.clone(), self.plan.page_size)
            .start_offset(self.plan.start_offset)
            .max_records(self.plan.max_records)
            .run()
            .await;

        if let Some(e) = outcome.interrupted {
            tracing::warn!(
                "⚠️ {}: search interrupted after {} pages, keeping {} records",
                self.plan.name,
                outcome.pages,
                outcome.records.len()
            );
            if let Ok(mut slot) = self.interrupted.lock() {
                *slot = Some(e);
            }
        }

        tracing::info!("📊 Extracted {} records", outcome.records.len());
        Ok(outcome.records)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let columns = resolve_columns(&data, &self.plan.columns);
        let headers = columns
            .iter()
            .map(ColumnSpec::header)
            .map(str::to_string)
            .collect();
        let rows = to_rows(&data, &columns);

        tracing::debug!("🔧 {} rows x {} columns", rows.len(), columns.len());
        Ok(TransformResult {
            processed_records: data,
            headers,
            rows,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();

        for format in &self.output.formats {
            match format {
                OutputFormat::Table => {
                    if result.rows.is_empty() {
                        println!("No records found.");
                    } else {
                        print!("{}", render_table(&result.headers, &result.rows));
                        println!("({} records)", result.rows.len());
                    }
                }
                OutputFormat::Json => {
                    let json = to_json(&result.processed_records)?;
                    print!("{}", String::from_utf8_lossy(&json));
                }
                OutputFormat::Csv => files.push((
                    format!("{}.csv", self.output.filename),
                    to_delimited(&result.headers, &result.rows, b',')?,
                )),
                OutputFormat::Tsv => files.push((
                    format!("{}.tsv", self.output.filename),
                    to_delimited(&result.headers, &result.rows, b'\t')?,
                )),
            }
        }

        let mut written = Vec::new();
        if self.output.compress {
            // zip 內一律附上原始 JSON
            files.push((
                format!("{}.json", self.output.filename),
                to_json(&result.processed_records)?,
            ));
            let bundle = zip_bundle(&files)?;
            self.write(format!("{}.zip", self.output.filename), bundle, &mut written)
                .await?;
        } else {
            for (name, data) in files {
                self.write(name, data, &mut written).await?;
            }
        }

        if written.is_empty() {
            return Ok("stdout".to_string());
        }
        for path in &written {
            tracing::info!("📁 Output saved to: {}", path);
        }
        Ok(written.join(", "))
    }
}
