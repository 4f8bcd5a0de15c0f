//! ytharvest - YouTube channel metadata harvester CLI
//!
//! Main entry point for the ytharvest command-line tool.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, warn};

use ytharvest::logging::{LogConfig, init_logging};
use ytharvest::reports::{self, CATALOGUE};
use ytharvest::{
    Cell, Channel, Cli, Commands, Config, HEADER_DIVIDER_WIDTH, HarvestError, HttpTransport,
    IngestionPipeline, OutputFormat, ReportTable, Storage, Video, cli, csv_escape_text, duration,
    format_error, format_number, format_published, format_unknown_value_error, truncate,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&LogConfig::from_flags(cli.quiet, cli.verbose));

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load()?;
    if !config.output.colors {
        colored::control::set_override(false);
    }

    let ctx = Session::new(cli, config);
    match &cli.command {
        Commands::Ingest(args) => cmd_ingest(&ctx, args),
        Commands::Search(args) => cmd_search(&ctx, args),
        Commands::Report(args) => cmd_report(&ctx, args),
        Commands::Channels => cmd_channels(&ctx),
        Commands::Videos(args) => cmd_videos(&ctx, args),
        Commands::Config(args) => cmd_config(&ctx, args),
        Commands::Completions(args) => {
            cmd_completions(args);
            Ok(())
        }
    }
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<HarvestError>() {
        Some(HarvestError::UnknownReport { name }) => {
            eprintln!(
                "{}",
                format_unknown_value_error("report", name, &reports::report_names())
            );
        }
        Some(harvest) => {
            let hints: Vec<&str> = harvest.suggestion().into_iter().collect();
            eprintln!("{}", format_error(&format!("{err:#}"), "", &hints));
        }
        None => eprintln!("{}", format_error(&format!("{err:#}"), "", &[])),
    }
}

/// Resolved settings for one invocation: config layered under CLI flags.
struct Session {
    config: Config,
    db_path: PathBuf,
    format: OutputFormat,
    quiet: bool,
}

impl Session {
    fn new(cli: &Cli, config: Config) -> Self {
        let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());
        let format = cli.format.unwrap_or_else(|| {
            config.output.format.parse::<OutputFormat>().unwrap_or_else(|_| {
                warn!(format = %config.output.format, "Unknown output format in config, using text");
                OutputFormat::Text
            })
        });
        Self {
            config,
            db_path,
            format,
            quiet: cli.quiet,
        }
    }

    fn open_existing(&self) -> Result<Storage> {
        if !self.db_path.exists() {
            anyhow::bail!(
                "No database found at {}. Run 'ytharvest ingest <CHANNEL_ID>' first.",
                self.db_path.display()
            );
        }
        Storage::open(&self.db_path)
            .with_context(|| format!("opening {}", self.db_path.display()))
    }

    fn open_or_create(&self) -> Result<Storage> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Storage::open(&self.db_path)
            .with_context(|| format!("opening {}", self.db_path.display()))
    }
}

// =============================================================================
// ingest
// =============================================================================

#[derive(Serialize)]
struct IngestSummary<'a> {
    channel: &'a Channel,
    videos_stored: usize,
    replaced: bool,
    ingested_at: String,
}

fn cmd_ingest(ctx: &Session, args: &cli::IngestArgs) -> Result<()> {
    let key = args
        .key
        .clone()
        .or_else(|| ctx.config.api.key.clone())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            HarvestError::invalid_argument(
                "no API key configured; pass --key or set YTHARVEST_API_KEY",
            )
        })?;

    let page_limit = args.pages.unwrap_or(ctx.config.api.page_limit);
    let page_size = args.page_size.unwrap_or(ctx.config.api.page_size);

    let transport = HttpTransport::new(
        ctx.config.api.base_url.as_str(),
        Duration::from_secs(ctx.config.api.timeout_secs),
    )?;
    let storage = ctx.open_or_create()?;
    debug!(db = %ctx.db_path.display(), page_limit, page_size, "Starting ingest");

    let pipeline = IngestionPipeline::new(transport, storage).with_pages(page_limit, page_size);

    let spinner = ingest_spinner(ctx, &args.channel_id);
    let outcome = pipeline.ingest(&key, &args.channel_id);
    spinner.finish_and_clear();
    let result = outcome?;

    let summary = IngestSummary {
        channel: &result.channel,
        videos_stored: result.videos.len(),
        replaced: result.replaced,
        ingested_at: Utc::now().to_rfc3339(),
    };

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&summary)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Csv => {
            println!("channel_id,channel_name,subscribers,total_videos,view_count,videos_stored,replaced");
            let c = summary.channel;
            println!(
                "{},\"{}\",{},{},{},{},{}",
                c.channel_id,
                csv_escape_text(&c.channel_name),
                c.subscribers,
                c.total_videos,
                c.view_count,
                summary.videos_stored,
                summary.replaced
            );
        }
        OutputFormat::Text => {
            if ctx.quiet {
                return Ok(());
            }
            let c = summary.channel;
            let verb = if summary.replaced { "Replaced" } else { "Stored" };
            println!(
                "{} {verb} {} ({})",
                "✓".green(),
                c.channel_name.bold(),
                c.channel_id.dimmed()
            );
            println!("  {:<14} {:>14}", "Subscribers:", format_number(c.subscribers));
            println!("  {:<14} {:>14}", "Total videos:", format_number(c.total_videos));
            println!("  {:<14} {:>14}", "Views:", format_number(c.view_count));
            println!(
                "  {:<14} {:>14}",
                "Stored videos:",
                summary.videos_stored.to_string().cyan()
            );
        }
    }

    Ok(())
}

fn ingest_spinner(ctx: &Session, channel_id: &str) -> ProgressBar {
    if ctx.quiet || ctx.format != OutputFormat::Text {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Ingesting {channel_id}..."));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

// =============================================================================
// search / report
// =============================================================================

fn cmd_search(ctx: &Session, args: &cli::SearchArgs) -> Result<()> {
    let storage = ctx.open_existing()?;
    let table = reports::search(&storage, &args.query)?;

    if table.is_empty() && ctx.format == OutputFormat::Text {
        println!("{}", "No matches found.".yellow());
        return Ok(());
    }
    if ctx.format == OutputFormat::Text && !ctx.quiet {
        println!(
            "{} matches for \"{}\":\n",
            table.len().to_string().cyan(),
            args.query.bold()
        );
    }
    print_table(ctx.format, &table)
}

#[derive(Serialize)]
struct ReportEntry {
    name: &'static str,
    title: &'static str,
}

fn cmd_report(ctx: &Session, args: &cli::ReportArgs) -> Result<()> {
    let name = match (&args.name, args.list) {
        (Some(name), false) => name,
        _ => return list_reports(ctx.format),
    };

    let report = reports::find(name)?;
    let storage = ctx.open_existing()?;
    let table = reports::run_report(&storage, report.name)?;

    if ctx.format == OutputFormat::Text {
        if !ctx.quiet {
            println!("{}", report.title.bold().cyan());
            println!("{}", "─".repeat(HEADER_DIVIDER_WIDTH));
        }
        if table.is_empty() {
            println!("{}", "No rows.".yellow());
            return Ok(());
        }
    }
    print_table(ctx.format, &table)
}

fn list_reports(format: OutputFormat) -> Result<()> {
    let entries: Vec<ReportEntry> = CATALOGUE
        .iter()
        .map(|r| ReportEntry {
            name: r.name,
            title: r.title,
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&entries)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Csv => {
            println!("name,title");
            for e in &entries {
                println!("{},\"{}\"", e.name, csv_escape_text(e.title));
            }
        }
        OutputFormat::Text => {
            println!("{}", "Available reports".bold().cyan());
            println!("{}", "─".repeat(HEADER_DIVIDER_WIDTH));
            for e in &entries {
                println!("  {:<20} {}", e.name.bold(), e.title.dimmed());
            }
        }
    }
    Ok(())
}

const MAX_CELL_WIDTH: usize = 48;

fn print_table(format: OutputFormat, table: &ReportTable) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&table.to_records())?),
        OutputFormat::JsonPretty => {
            println!("{}", serde_json::to_string_pretty(&table.to_records())?);
        }
        OutputFormat::Csv => {
            println!("{}", table.columns.join(","));
            for row in &table.rows {
                let line: Vec<String> = row.iter().map(csv_cell).collect();
                println!("{}", line.join(","));
            }
        }
        OutputFormat::Text => print_text_table(table),
    }
    Ok(())
}

fn csv_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text(text) => format!("\"{}\"", csv_escape_text(text)),
        other => other.to_string(),
    }
}

fn text_cell(cell: &Cell) -> String {
    match cell {
        Cell::Integer(v) => u64::try_from(*v).map_or_else(|_| v.to_string(), format_number),
        Cell::Text(text) => truncate(text, MAX_CELL_WIDTH),
        other => other.to_string(),
    }
}

fn print_text_table(table: &ReportTable) {
    let rendered: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(text_cell).collect())
        .collect();

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &rendered {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(idx) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(name, &width)| format!("{name:<width$}"))
        .collect();
    println!("{}", header.join("  ").bold());
    println!("{}", "─".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));

    for (row, cells) in table.rows.iter().zip(&rendered) {
        let line: Vec<String> = cells
            .iter()
            .zip(row)
            .zip(&widths)
            .map(|((text, cell), &width)| match cell {
                Cell::Integer(_) | Cell::Real(_) => format!("{text:>width$}"),
                _ => format!("{text:<width$}"),
            })
            .collect();
        println!("{}", line.join("  "));
    }
}

// =============================================================================
// channels / videos
// =============================================================================

#[derive(Serialize)]
struct ChannelRow<'a> {
    #[serde(flatten)]
    channel: &'a Channel,
    stored_videos: u64,
}

fn cmd_channels(ctx: &Session) -> Result<()> {
    let storage = ctx.open_existing()?;
    let channels = storage.list_channels()?;
    let rows = channels
        .iter()
        .map(|channel| {
            Ok(ChannelRow {
                channel,
                stored_videos: storage.video_count(Some(channel.channel_id.as_str()))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&rows)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Csv => {
            println!("channel_id,channel_name,subscribers,total_videos,view_count,stored_videos");
            for row in &rows {
                let c = row.channel;
                println!(
                    "{},\"{}\",{},{},{},{}",
                    c.channel_id,
                    csv_escape_text(&c.channel_name),
                    c.subscribers,
                    c.total_videos,
                    c.view_count,
                    row.stored_videos
                );
            }
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("{}", "No channels stored.".yellow());
                return Ok(());
            }
            println!("{}", "Stored channels".bold().cyan());
            println!("{}", "─".repeat(HEADER_DIVIDER_WIDTH));
            for row in &rows {
                let c = row.channel;
                println!("{} {}", c.channel_name.bold(), c.channel_id.dimmed());
                println!(
                    "   {} subscribers  {} views  {}/{} videos stored",
                    format_number(c.subscribers).cyan(),
                    format_number(c.view_count).cyan(),
                    row.stored_videos,
                    format_number(c.total_videos)
                );
            }
        }
    }
    Ok(())
}

fn cmd_videos(ctx: &Session, args: &cli::VideosArgs) -> Result<()> {
    let storage = ctx.open_existing()?;
    let channel_id = args.channel_id.trim();
    let channel = storage
        .get_channel(channel_id)?
        .ok_or_else(|| HarvestError::channel_not_found(channel_id))?;
    let videos = storage.videos_for_channel(channel_id)?;

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&videos)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&videos)?),
        OutputFormat::Csv => {
            println!("video_id,title,published_at,view_count,likes,dislikes,comments,duration");
            for v in &videos {
                println!(
                    "{},\"{}\",{},{},{},{},{},{}",
                    v.video_id,
                    csv_escape_text(&v.title),
                    v.published_at,
                    v.view_count,
                    v.likes,
                    v.dislikes,
                    v.comments,
                    duration::format(v.duration)
                );
            }
        }
        OutputFormat::Text => print_videos(&channel, &videos),
    }
    Ok(())
}

fn print_videos(channel: &Channel, videos: &[Video]) {
    println!(
        "{} {}",
        channel.channel_name.bold().cyan(),
        format!("({} videos stored)", videos.len()).dimmed()
    );
    println!("{}", "─".repeat(HEADER_DIVIDER_WIDTH));

    for (i, v) in videos.iter().enumerate() {
        let mut lines = textwrap::wrap(&v.title, HEADER_DIVIDER_WIDTH - 4).into_iter();
        if let Some(first) = lines.next() {
            println!("{}. {}", (i + 1).to_string().dimmed(), first);
        }
        for line in lines {
            println!("   {line}");
        }
        println!(
            "   {}  {}  {} views  {} likes  {} comments",
            format_published(&v.published_at).dimmed(),
            duration::format(v.duration),
            format_number(v.view_count).cyan(),
            format_number(v.likes),
            format_number(v.comments)
        );
    }
}

// =============================================================================
// config / completions
// =============================================================================

fn cmd_config(ctx: &Session, args: &cli::ConfigArgs) -> Result<()> {
    if args.init {
        init_config(Config::user_config_path().as_deref())?;
        if !args.show {
            return Ok(());
        }
    }

    let mut shown = ctx.config.clone();
    if shown.api.key.is_some() {
        shown.api.key = Some("********".to_string());
    }
    shown.paths.db = Some(ctx.db_path.clone());

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&shown)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&shown)?),
        OutputFormat::Csv | OutputFormat::Text => {
            println!("{}", "Current Configuration".bold().cyan());
            if let Some(path) = Config::user_config_path() {
                let state = if path.exists() { "" } else { " (not created)" };
                println!("  Config file: {}{}", path.display(), state.dimmed());
            }
            println!("  Database:    {}", ctx.db_path.display());
            println!("  API base:    {}", shown.api.base_url);
            println!(
                "  API key:     {}",
                if shown.api.key.is_some() {
                    "set".green()
                } else {
                    "not set".yellow()
                }
            );
            println!("  Page limit:  {}", shown.api.page_limit);
            println!("  Page size:   {}", shown.api.page_size);
            println!("  Timeout:     {}s", shown.api.timeout_secs);
            println!("  Format:      {}", shown.output.format);
        }
    }
    Ok(())
}

fn init_config(path: Option<&Path>) -> Result<()> {
    let path = path.context("could not determine config directory")?;
    if path.exists() {
        println!(
            "{} Config already exists at {}",
            "•".dimmed(),
            path.display()
        );
        return Ok(());
    }
    Config::default().save_to(path)?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(())
}

fn cmd_completions(args: &cli::CompletionsArgs) {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "ytharvest", &mut io::stdout());
}
