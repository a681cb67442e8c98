use chrono::Utc;
use clap::Parser;
use engage_etl::config::cli::{
    ActivityCommand, BlastCommand, Command, DateRange, EmailCommand, RunArgs, SegmentCommand,
    SupporterCommand,
};
use engage_etl::config::login::DEFAULT_HOST;
use engage_etl::core::metrics::fetch_metrics;
use engage_etl::core::upsert::{batch_payloads, supporters_from_delimited, upsert_supporters};
use engage_etl::core::Storage;
use engage_etl::domain::endpoint::{ApiFamily, Endpoint};
use engage_etl::output::table::render_key_values;
use engage_etl::output::OutputFormat;
use engage_etl::utils::validation::{validate_file_extensions, validate_positive_number, Validate};
use engage_etl::utils::{error::Result, logger};
use engage_etl::{
    CliConfig, EndpointSource, EngageClient, EtlEngine, EtlError, JobConfig, LocalStorage,
    LoginConfig, OutputSettings, SearchPipeline, SearchPlan,
};

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting engage CLI");
    tracing::debug!("CLI config: {:?}", config);

    let exit_code = match run(config).await {
        Ok(code) => code,
        Err(e) => {
            report_error("❌ Run failed", &e);
            e.severity().exit_code()
        }
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}

async fn run(config: CliConfig) -> Result<i32> {
    if let Command::Run(RunArgs { job, dry_run: true }) = &config.command {
        return dry_run(&config, job);
    }

    let login = LoginConfig::from_file(&config.login)?;
    login.validate()?;
    tracing::info!("✅ Login loaded from {}", config.login.display());

    let now = Utc::now();
    let plan = match &config.command {
        Command::Metrics => return show_metrics(&config, &login).await,
        Command::Supporters {
            action:
                SupporterCommand::Upsert {
                    input,
                    batch_size,
                    dry_run,
                },
        } => return upsert(&login, input, *batch_size, *dry_run).await,
        Command::Supporters {
            action:
                SupporterCommand::Search {
                    identifiers,
                    identifier_type,
                    range,
                },
        } => {
            let plan = with_range(
                SearchPlan::for_endpoint(Endpoint::SupporterSearch)
                    .filter_list("identifiers", or_login_list(identifiers, &login, "identifiers"))
                    .filter_opt("identifierType", identifier_type.clone()),
                range,
                now,
            )?
            .fallback_from(
                &login,
                &["identifierType", "modifiedFrom", "modifiedTo"],
            );

            if plan.filters.contains_key("identifiers") {
                plan.filter_default("identifierType", "EMAIL_ADDRESS")
            } else {
                plan.require("modifiedFrom")?;
                plan
            }
        }
        Command::Segments {
            action:
                SegmentCommand::Search {
                    identifiers,
                    include_counts,
                    range,
                },
        } => {
            let mut plan = with_range(
                SearchPlan::for_endpoint(Endpoint::SegmentSearch)
                    .filter_list("identifiers", or_login_list(identifiers, &login, "identifiers")),
                range,
                now,
            )?
            .fallback_from(&login, &["modifiedFrom", "modifiedTo"]);
            if *include_counts {
                plan = plan.filter("includeSupporterCounts", true);
            }
            plan
        }
        Command::Segments {
            action: SegmentCommand::Members { segment_id, range },
        } => {
            let segment_id = match segment_id {
                Some(id) => id.clone(),
                None => login.require_param("segmentId")?,
            };
            with_range(
                SearchPlan::for_endpoint(Endpoint::SegmentMembers).filter("segmentId", segment_id),
                range,
                now,
            )?
            .fallback_from(&login, &["modifiedFrom", "modifiedTo"])
        }
        Command::Activities {
            action:
                ActivityCommand::Search {
                    activity_type,
                    form_ids,
                    developer,
                    range,
                },
        } => {
            let endpoint = if *developer {
                Endpoint::DeveloperActivitySearch
            } else {
                Endpoint::ActivitySearch
            };
            let plan = with_range(
                SearchPlan::for_endpoint(endpoint)
                    .filter_opt("type", activity_type.clone())
                    .filter_list(
                        "activityFormIds",
                        or_login_list(form_ids, &login, "activityFormIds"),
                    ),
                range,
                now,
            )?
            .fallback_from(&login, &["type", "modifiedFrom", "modifiedTo"]);
            if !*developer {
                plan.require("type")?;
            }
            plan
        }
        Command::Emails {
            action: EmailCommand::Search { email_type, range },
        } => with_range(
            SearchPlan::for_endpoint(Endpoint::EmailSearch)
                .filter_opt("type", email_type.clone()),
            range,
            now,
        )?
        .fallback_from(&login, &["type", "modifiedFrom", "modifiedTo"])
        .filter_default("type", "EMAIL"),
        Command::Blasts {
            action:
                BlastCommand::Search {
                    criteria,
                    start_date,
                    end_date,
                    sort_field,
                    sort_order,
                },
        } => SearchPlan::for_endpoint(Endpoint::BlastSearch)
            .filter_opt("criteria", criteria.clone())
            .filter_opt("startDate", start_date.clone())
            .filter_opt("endDate", end_date.clone())
            .filter_opt("sortField", sort_field.clone())
            .filter_opt("sortOrder", sort_order.clone())
            .fallback_from(
                &login,
                &["criteria", "startDate", "endDate", "sortField", "sortOrder"],
            ),
        Command::Run(RunArgs { job, .. }) => {
            let job = load_job(job)?;
            let plan = SearchPlan::from_job(&job)?;
            let settings = OutputSettings {
                formats: pick_formats(&config, &job.output.output_formats),
                output_path: config
                    .output_path
                    .clone()
                    .unwrap_or_else(|| job.output.output_path.clone()),
                filename: config.filename.clone().unwrap_or_else(|| job.filename()),
                compress: config.compress || job.output.compress,
            };
            let plan = plan
                .page_size(config.page_size)
                .max_records(config.max_records);

            let mut login = login.clone();
            if job.source.timeout_seconds.is_some() {
                login.timeout_seconds = job.source.timeout_seconds;
            }
            return search(&config, &login, plan, settings).await;
        }
    };

    let plan = plan
        .page_size(config.page_size)
        .max_records(config.max_records);
    let settings = OutputSettings {
        formats: pick_formats(&config, &[OutputFormat::Table]),
        output_path: config.output_path.clone().unwrap_or_else(|| ".".to_string()),
        filename: config.filename.clone().unwrap_or_else(|| plan.name.clone()),
        compress: config.compress,
    };
    search(&config, &login, plan, settings).await
}

/// 共用的搜尋流程：分頁讀取 → 輸出
async fn search(
    config: &CliConfig,
    login: &LoginConfig,
    plan: SearchPlan,
    settings: OutputSettings,
) -> Result<i32> {
    let plan = plan.finalize()?;
    let client = EngageClient::new(login, plan.descriptor.family)?;
    let source = EndpointSource::new(client, plan.descriptor.clone(), plan.filters.clone());
    let storage = LocalStorage::new(settings.output_path.clone());

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = SearchPipeline::new(storage, source, plan, settings);
    let engine = EtlEngine::new_with_monitoring(pipeline, config.monitor);
    let output_path = engine.run().await?;
    tracing::info!("✅ Search completed, output: {}", output_path);

    match engine.pipeline().take_interruption() {
        Some(e) => {
            report_error("⚠️ Results are partial", &e);
            Ok(e.severity().exit_code())
        }
        None => Ok(0),
    }
}

async fn show_metrics(config: &CliConfig, login: &LoginConfig) -> Result<i32> {
    let client = EngageClient::new(login, ApiFamily::Integration)?;
    let metrics = fetch_metrics(&client).await?;

    if config.formats.contains(&OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        print!("{}", render_key_values(&metrics.to_pairs()));
    }
    Ok(0)
}

async fn upsert(login: &LoginConfig, input: &str, batch_size: usize, dry_run: bool) -> Result<i32> {
    validate_file_extensions("input", &[input.to_string()], &["csv", "tsv"])?;
    validate_positive_number("batch_size", batch_size, 1)?;

    let delimiter = if input.to_ascii_lowercase().ends_with(".tsv") {
        b'\t'
    } else {
        b','
    };
    let data = LocalStorage::new(".").read_file(input).await?;
    let supporters = supporters_from_delimited(&data, delimiter)?;
    tracing::info!("📥 Read {} supporters from {}", supporters.len(), input);

    if dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be sent");
        for payload in batch_payloads(&supporters, batch_size) {
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        return Ok(0);
    }

    let client = EngageClient::new(login, ApiFamily::Integration)?;
    let summary = upsert_supporters(&client, &supporters, batch_size).await;

    println!(
        "Sent {} supporters in {} batches",
        summary.supporters_sent, summary.batches_sent
    );
    for (result, count) in &summary.results {
        println!("  {}: {}", result, count);
    }
    for error in &summary.errors {
        println!("  ! {}", error);
    }

    match summary.interrupted {
        Some(e) => {
            report_error("⚠️ Upsert stopped early", &e);
            Ok(e.severity().exit_code())
        }
        None => Ok(0),
    }
}

fn dry_run(config: &CliConfig, job_path: &std::path::Path) -> Result<i32> {
    let job = load_job(job_path)?;
    let host = match LoginConfig::from_file(&config.login) {
        Ok(login) => login.host,
        Err(e) => {
            tracing::debug!("Login file not loaded for dry run: {}", e);
            DEFAULT_HOST.to_string()
        }
    };

    let plan = SearchPlan::from_job(&job)?
        .page_size(config.page_size)
        .max_records(config.max_records)
        .finalize()?;

    tracing::info!("🔍 DRY RUN MODE - no requests will be sent");
    println!("📋 Job: {}", job.job.name);
    if let Some(description) = &job.job.description {
        println!("  {}", description);
    }
    println!("{}", plan.describe(&host));

    let formats: Vec<String> = pick_formats(config, &job.output.output_formats)
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("  Output: {} -> {}", formats.join(", "), job.output.output_path);
    Ok(0)
}

fn load_job(path: &std::path::Path) -> Result<JobConfig> {
    tracing::info!("📁 Loading job from: {}", path.display());
    let job = JobConfig::from_file(path)?;
    job.validate()?;
    Ok(job)
}

fn with_range(
    plan: SearchPlan,
    range: &DateRange,
    now: chrono::DateTime<Utc>,
) -> Result<SearchPlan> {
    plan.filter_opt("modifiedFrom", range.modified_from.clone())
        .filter_opt("modifiedTo", range.modified_to.clone())
        .modified_within_days(range.days, now)
}

/// 命令列沒給時讀 login 檔的清單 (YAML 陣列或逗號分隔)
fn or_login_list(values: &[String], login: &LoginConfig, key: &str) -> Vec<String> {
    if values.is_empty() {
        login.param_list(key)
    } else {
        values.to_vec()
    }
}

fn pick_formats(config: &CliConfig, fallback: &[OutputFormat]) -> Vec<OutputFormat> {
    if config.formats.is_empty() {
        fallback.to_vec()
    } else {
        config.formats.clone()
    }
}

fn report_error(context: &str, e: &EtlError) {
    tracing::error!(
        "{}: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
}
