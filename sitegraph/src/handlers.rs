use crate::commands::DEFAULT_DATA_DIR;
use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use sitegraph_core::analyze::analyze;
use sitegraph_core::crawl::{CrawlOptions, execute_crawl};
use sitegraph_core::data::Database;
use sitegraph_core::export::{ExportFormat, read_edge_list, write_export};
use sitegraph_core::report::{ReportHeader, format_timestamp, generate_crawl_report};
use sitegraph_scanner::config::CrawlConfig;
use sitegraph_scanner::normalize::NormalizedUrl;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, warn};
use url::Url;

pub const DB_FILE_NAME: &str = "sitegraph.db";

/// Install the stderr log subscriber. Safe to call more than once.
pub fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// `--db` if given, otherwise the database in the default data directory.
pub fn resolve_db_path(db: Option<&String>) -> PathBuf {
    match db {
        Some(path) => expand_path(path),
        None => expand_path(DEFAULT_DATA_DIR).join(DB_FILE_NAME),
    }
}

/// Crawl configuration from `--config` (if any) with command-line flags
/// layered on top.
pub fn build_crawl_config(args: &ArgMatches) -> Result<CrawlConfig> {
    let mut config = match args.get_one::<String>("config") {
        Some(path) => {
            let path = expand_path(path);
            CrawlConfig::from_json_file(&path).with_context(|| {
                format!("Failed to load crawl configuration from {}", path.display())
            })?
        }
        None => CrawlConfig::default(),
    };

    if let Some(url) = args.get_one::<Url>("url") {
        config.root_url = url.to_string();
    }
    if let Some(max_pages) = args.get_one::<usize>("max-pages") {
        config.max_pages = *max_pages;
    }
    if let Some(max_depth) = args.get_one::<u32>("max-depth") {
        config.max_depth = Some(*max_depth);
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        config.timeout_secs = *timeout;
    }
    if let Some(delay) = args.get_one::<u64>("delay") {
        config.delay_ms = *delay;
    }
    if let Some(selectors) = args.get_many::<String>("exclude") {
        config.excluded_selectors = selectors.cloned().collect();
    }
    if args.get_flag("robots") {
        config.respect_robots = true;
    }
    if args.get_flag("sitemap") {
        config.use_sitemap = true;
    }
    if let Some(concurrency) = args.get_one::<usize>("concurrency") {
        config.concurrency = *concurrency;
    }
    if let Some(max_duration) = args.get_one::<u64>("max-duration") {
        config.max_duration_secs = Some(*max_duration);
    }
    if let Some(user_agent) = args.get_one::<String>("user-agent") {
        config.user_agent = user_agent.clone();
    }

    if config.root_url.trim().is_empty() {
        bail!("A root URL is required: pass --url or set root_url in the configuration file");
    }
    Ok(config)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn open_existing_db(db: Option<&String>) -> Result<Database> {
    let db_path = resolve_db_path(db);
    if !Database::exists(&db_path) {
        bail!(
            "No database at {}. Run `sitegraph init` or `sitegraph crawl --save` first",
            db_path.display()
        );
    }
    Database::new(&db_path).with_context(|| format!("Failed to open {}", db_path.display()))
}

fn open_or_create_db(db_path: &Path) -> Result<Database> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Database::new(db_path).with_context(|| format!("Failed to open {}", db_path.display()))
}

fn colored_status(status: &str) -> String {
    match status {
        "completed" => status.green().to_string(),
        "failed" => status.red().to_string(),
        "running" => status.cyan().to_string(),
        _ => status.yellow().to_string(),
    }
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  SITEGRAPH INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let data_dir = expand_path(
        args.get_one::<String>("PATH")
            .map(String::as_str)
            .unwrap_or(DEFAULT_DATA_DIR),
    );
    let force = args.get_flag("force");
    let db_path = data_dir.join(DB_FILE_NAME);

    println!(
        "{} Target: {}",
        "→".blue(),
        data_dir.display().to_string().bright_white()
    );

    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    println!("{} Data directory ready", "✓".green().bold());

    if Database::exists(&db_path) {
        if !force {
            println!();
            println!("{}", "⚠ WARNING".yellow().bold());
            println!(
                "Database already exists at {}",
                db_path.display().to_string().bright_white()
            );
            println!("{}", "Pass --force to replace it. Keeping the existing database.".yellow());
            return Ok(());
        }
        println!("{} Deleting existing database (force mode)", "→".yellow().bold());
        Database::drop(&db_path)
            .with_context(|| format!("Failed to delete {}", db_path.display()))?;
    }

    Database::new(&db_path)
        .with_context(|| format!("Failed to create database at {}", db_path.display()))?;

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<()> {
    let config = build_crawl_config(args)?;
    let format = match args.get_one::<String>("format") {
        Some(name) => name.parse::<ExportFormat>()?,
        None => ExportFormat::EdgeList,
    };
    let output = args.get_one::<PathBuf>("output");
    let save = args.get_flag("save");

    if !quiet {
        println!("\n{} Crawling {}", "→".blue(), config.root_url.bright_white());
        println!("Max pages: {}", config.max_pages);
        match config.max_depth {
            Some(depth) => println!("Max depth: {}", depth),
            None => println!("Max depth: unlimited"),
        }
        println!("Concurrency: {}", config.concurrency);
        if config.respect_robots {
            println!("robots.txt: honored");
        }
        if config.use_sitemap {
            println!("Sitemap seeding: on");
        }
        println!();
    }

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing pages in flight");
            ctrl_c_token.cancel();
        }
    });

    let options = CrawlOptions {
        config: config.clone(),
        show_progress_bars: !quiet,
        cancel: Some(cancel),
    };
    let session = execute_crawl(options, None).await.context("Crawl failed")?;

    let analysis = analyze(&session.graph, &session.root);
    let mut header = ReportHeader {
        status: Some(session.summary.outcome.as_str().to_string()),
        elapsed: Some(session.summary.elapsed),
        ..ReportHeader::default()
    };

    if save {
        let db_path = resolve_db_path(args.get_one::<String>("db"));
        let db = open_or_create_db(&db_path)?;
        let config_json = serde_json::to_string(&config)?;
        let session_id = db
            .save_crawl(&session, Some(&config_json))
            .context("Failed to store crawl session")?;
        debug!("Stored session {} in {}", session_id, db_path.display());
        header.session_id = Some(session_id);
    }

    print!("{}", generate_crawl_report(&session.graph, &analysis, &header));

    if let Some(path) = output {
        write_export(&session.graph, format, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "{} Link graph written to {}",
            "✓".green().bold(),
            path.display().to_string().bright_white()
        );
    }
    if let Some(ref id) = header.session_id {
        println!("{} Session saved: {}", "✓".green().bold(), id.bright_white());
    }

    Ok(())
}

pub fn handle_analyze(args: &ArgMatches) -> Result<()> {
    let input = args
        .get_one::<PathBuf>("input")
        .ok_or_else(|| anyhow!("--input is required"))?;
    let graph = read_edge_list(input)
        .with_context(|| format!("Failed to read edge list {}", input.display()))?;

    let root = match args.get_one::<Url>("root") {
        Some(url) => NormalizedUrl::parse(url.as_str())?,
        None => graph
            .nodes()
            .next()
            .map(|page| page.url.clone())
            .ok_or_else(|| anyhow!("{} contains no links", input.display()))?,
    };
    if !graph.contains(&root) {
        warn!("Root {} does not appear in {}", root, input.display());
    }

    let analysis = analyze(&graph, &root);
    print!(
        "{}",
        generate_crawl_report(&graph, &analysis, &ReportHeader::default())
    );
    Ok(())
}

pub fn handle_sessions_list(args: &ArgMatches) -> Result<()> {
    let db = open_existing_db(args.get_one::<String>("db"))?;
    let sessions = db.list_sessions()?;

    if sessions.is_empty() {
        println!("No stored crawl sessions. Run `sitegraph crawl --save` to store one.");
        return Ok(());
    }

    print_divider();
    println!(
        "{}",
        format!(
            "  {:<36}  {:<17}  {:<23}  {:>6}  {:>6}  {}",
            "ID", "STATUS", "STARTED", "PAGES", "LINKS", "ROOT"
        )
        .bold()
    );
    print_divider();
    for session in sessions {
        println!(
            "  {:<36}  {:<17}  {:<23}  {:>6}  {:>6}  {}",
            session.id,
            colored_status(&session.status),
            format_timestamp(session.start_time),
            session.page_count,
            session.link_count,
            session.root_url
        );
    }
    println!();
    Ok(())
}

pub fn handle_sessions_show(args: &ArgMatches) -> Result<()> {
    let session_id = args
        .get_one::<String>("ID")
        .ok_or_else(|| anyhow!("a session id is required"))?;
    let db = open_existing_db(args.get_one::<String>("db"))?;

    let record = db
        .get_session(session_id)?
        .ok_or_else(|| anyhow!("No session with id {}", session_id))?;
    let graph = db.load_graph(session_id)?;
    let root = NormalizedUrl::parse(&record.root_url)?;

    let analysis = analyze(&graph, &root);
    let header = ReportHeader {
        session_id: Some(record.id.clone()),
        status: Some(record.status.clone()),
        started_at: Some(record.start_time),
        elapsed: record
            .end_time
            .map(|end| Duration::from_secs((end - record.start_time).max(0) as u64)),
    };
    print!("{}", generate_crawl_report(&graph, &analysis, &header));
    Ok(())
}
