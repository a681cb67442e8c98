use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "engage")]
#[command(about = "Search, export and update Engage supporters, segments, activities and blasts")]
pub struct CliConfig {
    /// YAML login file with token, host and endpoint parameters
    #[arg(long, global = true, default_value = "login.yaml")]
    pub login: PathBuf,

    /// Output formats (repeatable); defaults to table, or the job file's setting
    #[arg(short = 'f', long = "format", value_enum, global = true)]
    pub formats: Vec<OutputFormat>,

    /// Directory for CSV/TSV/JSON files
    #[arg(long, global = true)]
    pub output_path: Option<String>,

    /// Base name for written files
    #[arg(long, global = true)]
    pub filename: Option<String>,

    /// Records requested per page
    #[arg(long, global = true)]
    pub page_size: Option<u64>,

    /// Stop after this many records
    #[arg(long, global = true)]
    pub max_records: Option<usize>,

    /// Bundle written files into a zip archive
    #[arg(long, global = true)]
    pub compress: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Log as JSON lines instead of compact text
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Log CPU and memory usage per phase
    #[arg(long, global = true)]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show API usage metrics and rate limits
    Metrics,
    /// Supporter search and upsert
    Supporters {
        #[command(subcommand)]
        action: SupporterCommand,
    },
    /// Segment (group) search and membership
    Segments {
        #[command(subcommand)]
        action: SegmentCommand,
    },
    /// Activity search (donations, petitions, events ...)
    Activities {
        #[command(subcommand)]
        action: ActivityCommand,
    },
    /// Email activity search
    Emails {
        #[command(subcommand)]
        action: EmailCommand,
    },
    /// Email blast search (web developer API)
    Blasts {
        #[command(subcommand)]
        action: BlastCommand,
    },
    /// Run a TOML job file
    Run(RunArgs),
}

/// `--from/--to` 或 `--days`
#[derive(Debug, Clone, Default, Args)]
pub struct DateRange {
    /// modifiedFrom (YYYY-MM-DD or RFC 3339)
    #[arg(long = "from")]
    pub modified_from: Option<String>,

    /// modifiedTo (YYYY-MM-DD or RFC 3339)
    #[arg(long = "to")]
    pub modified_to: Option<String>,

    /// Records modified in the last N days
    #[arg(long, conflicts_with = "modified_from")]
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SupporterCommand {
    Search {
        /// Email addresses, supporter IDs or external IDs (repeatable)
        #[arg(long = "identifier")]
        identifiers: Vec<String>,

        /// EMAIL_ADDRESS, SUPPORTER_ID or EXTERNAL_ID
        #[arg(long)]
        identifier_type: Option<String>,

        #[command(flatten)]
        range: DateRange,
    },
    Upsert {
        /// CSV or TSV file with a header row
        #[arg(long)]
        input: String,

        /// Supporters per request
        #[arg(long, default_value = "20")]
        batch_size: usize,

        /// Print the batches without sending them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum SegmentCommand {
    Search {
        /// Segment IDs (repeatable)
        #[arg(long = "identifier")]
        identifiers: Vec<String>,

        /// Ask the API for member counts
        #[arg(long)]
        include_counts: bool,

        #[command(flatten)]
        range: DateRange,
    },
    Members {
        /// Segment ID; falls back to `segmentId` in the login file
        #[arg(long)]
        segment_id: Option<String>,

        #[command(flatten)]
        range: DateRange,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ActivityCommand {
    Search {
        /// Activity type, e.g. PETITION, FUNDRAISE, SUBSCRIBE, EVENT
        #[arg(long = "type")]
        activity_type: Option<String>,

        /// Activity form IDs (repeatable)
        #[arg(long = "form-id")]
        form_ids: Vec<String>,

        /// Use the web developer API instead of the integration API
        #[arg(long)]
        developer: bool,

        #[command(flatten)]
        range: DateRange,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum EmailCommand {
    Search {
        /// EMAIL, CALL or TARGETED_LETTER ...
        #[arg(long = "type")]
        email_type: Option<String>,

        #[command(flatten)]
        range: DateRange,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum BlastCommand {
    Search {
        /// Free-text criteria
        #[arg(long)]
        criteria: Option<String>,

        #[arg(long)]
        start_date: Option<String>,

        #[arg(long)]
        end_date: Option<String>,

        #[arg(long)]
        sort_field: Option<String>,

        #[arg(long)]
        sort_order: Option<String>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// TOML job file
    #[arg(long)]
    pub job: PathBuf,

    /// Show the request plan without calling the API
    #[arg(long)]
    pub dry_run: bool,
}
