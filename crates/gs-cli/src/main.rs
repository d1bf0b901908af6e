//! CLI entry point for the globscan scanner.
//!
//! Prints every file matching one or more wildcard patterns, one path per
//! line, as results arrive.
//!
//! # Usage
//!
//! ```bash
//! gs-scan [OPTIONS] <COMMAND>
//!
//! # Stream matches from four pool workers
//! gs-scan scan --async --pool-concurrency 4 'logs/**/*.gz'
//!
//! # Sorted output, excluding temporary files
//! gs-scan scan --sort -x tmp,bak 'data/2024-??/*.csv' README.md
//!
//! # Show the options a config file resolves to
//! gs-scan --config scan.json show-config
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use gs_core::{Config, ScanOptions};
use gs_queue::{PoolStatsSnapshot, QueueStatsSnapshot};
use gs_scanner::{DirectoryScanner, Scan, WalkStatsSnapshot};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Concurrent wildcard file scanner.
///
/// Patterns use `*` and `?` within one path segment and `**` for any number
/// of directories. Matching is case-insensitive.
#[derive(Parser)]
#[command(name = "gs-scan", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file with a `scan` section.
    ///
    /// Command-line options override values from the file.
    #[arg(short, long, global = true, env = "GS_SCAN_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Scan options.
    #[command(flatten)]
    options: OptionArgs,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Scan for files matching the given patterns.
    Scan {
        /// Wildcard patterns or plain paths.
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Collect all matches and print them sorted.
        #[arg(short, long)]
        sort: bool,

        /// Print only the number of matches.
        #[arg(long, conflicts_with = "json")]
        count: bool,

        /// Print matches as a JSON array.
        #[arg(long)]
        json: bool,

        /// Print walk, queue, and pool statistics to stderr when done.
        #[arg(long)]
        stats: bool,
    },

    /// Print the effective scan options as JSON.
    ShowConfig,
}

/// Scan option overrides. Flags only ever switch an option on.
#[derive(Args, Debug, Default)]
struct OptionArgs {
    /// Walk on background producer threads.
    #[arg(long = "async", global = true)]
    asynchronous: bool,

    /// Number of producer threads in asynchronous mode.
    #[arg(long, global = true, env = "GS_SCAN_PRODUCER_THREADS")]
    producer_threads: Option<usize>,

    /// Worker pool size for offloaded subtrees (`0` disables offloading).
    #[arg(long, global = true, env = "GS_SCAN_POOL_CONCURRENCY")]
    pool_concurrency: Option<usize>,

    /// Maximum queued matches before producers block (`0` = unbounded).
    #[arg(long, global = true, env = "GS_SCAN_QUEUE_LIMIT")]
    queue_limit: Option<usize>,

    /// Producer poll delay while blocked, in milliseconds.
    #[arg(long, global = true)]
    poll_delay_ms: Option<u64>,

    /// Dequeue matches in random order.
    #[arg(long, global = true)]
    randomize: bool,

    /// Extensions never reported (comma-separated, leading `.` optional).
    #[arg(short = 'x', long = "exclude-ext", global = true, value_delimiter = ',')]
    exclude_ext: Vec<String>,

    /// Skip files whose name contains a control character.
    #[arg(long, global = true)]
    reject_control_chars: bool,

    /// Visit each directory's children in sorted order.
    #[arg(long, global = true)]
    sort_children: bool,

    /// Descend into symbolically linked directories.
    #[arg(long, global = true)]
    follow_links: bool,
}

impl OptionArgs {
    /// Applies the overrides on top of `options`.
    fn apply(&self, options: &mut ScanOptions) {
        options.asynchronous |= self.asynchronous;
        options.randomize |= self.randomize;
        options.reject_control_chars |= self.reject_control_chars;
        options.sort_children |= self.sort_children;
        options.follow_links |= self.follow_links;

        if let Some(threads) = self.producer_threads {
            options.producer_threads = threads;
        }
        if let Some(concurrency) = self.pool_concurrency {
            options.pool_concurrency = concurrency;
        }
        if let Some(limit) = self.queue_limit {
            options.queue_limit = limit;
        }
        if let Some(delay) = self.poll_delay_ms {
            options.queue_poll_delay_ms = delay;
        }
        for ext in &self.exclude_ext {
            options.excluded_extensions.insert(ext.trim());
        }
    }
}

/// How matches are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    /// One path per line as results arrive.
    Stream,
    /// One path per line, sorted, after the scan completes.
    Sorted,
    /// A JSON array after the scan completes.
    Json,
    /// Only the number of matches.
    Count,
}

impl OutputMode {
    const fn from_flags(sort: bool, count: bool, json: bool) -> Self {
        match (count, json, sort) {
            (true, _, _) => Self::Count,
            (false, true, _) => Self::Json,
            (false, false, true) => Self::Sorted,
            (false, false, false) => Self::Stream,
        }
    }
}

/// Statistics printed with `--stats`.
#[derive(Debug, serde::Serialize)]
struct ScanSummary {
    matches: usize,
    walk: WalkStatsSnapshot,
    queue: QueueStatsSnapshot,
    pool: Option<PoolStatsSnapshot>,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// Logs always go to stderr so stdout carries only results.
///
/// # Arguments
///
/// * `verbose` - Enable debug-level logging
/// * `no_color` - Disable ANSI colors in output
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},mio=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds the effective [`ScanOptions`] from the config file and CLI flags.
///
/// # Errors
///
/// Returns an error if the config file can't be loaded or the resulting
/// options are invalid.
fn build_options(cli: &Cli) -> color_eyre::Result<ScanOptions> {
    let mut config = match &cli.config {
        Some(path) => {
            debug!(path = %path, "Loading config file");
            Config::from_json_file(path)
                .map_err(|e| color_eyre::eyre::eyre!("Failed to load config {}: {}", path, e))?
        }
        None => Config::default(),
    };

    cli.options.apply(&mut config.scan);
    config
        .scan
        .validate()
        .map_err(|e| color_eyre::eyre::eyre!("Invalid options: {}", e))?;

    Ok(config.scan)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Runs a scan, interrupting it on Ctrl-C.
///
/// The scan itself blocks, so it runs on the blocking pool while this task
/// waits for either completion or a signal.
///
/// # Errors
///
/// Returns an error if the scan fails or output can't be written.
async fn run_scan(
    options: ScanOptions,
    patterns: Vec<String>,
    mode: OutputMode,
    stats: bool,
) -> color_eyre::Result<()> {
    info!(patterns = patterns.len(), "Starting scan");

    let scanner = DirectoryScanner::from_options(options).with_patterns(patterns);
    let scan = scanner.scan()?;
    let handle = scan.handle();

    let mut worker = tokio::task::spawn_blocking(move || drain_scan(&scan, mode, stats));

    let summary = tokio::select! {
        result = &mut worker => result??,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received Ctrl-C, interrupting scan");
            handle.interrupt();
            worker.await??
        }
    };

    if let Some(summary) = summary {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize stats: {}", e))?;
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        writeln!(handle, "{json}")?;
    }

    Ok(())
}

/// Pulls every match from `scan` and writes it in the requested mode.
///
/// Returns the statistics summary when `stats` is set.
fn drain_scan(
    scan: &Scan,
    mode: OutputMode,
    stats: bool,
) -> color_eyre::Result<Option<ScanSummary>> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut collected = Vec::new();
    let mut matches = 0usize;

    while scan.has_next()? {
        let path = scan.next_path()?;
        matches += 1;
        match mode {
            OutputMode::Stream => writeln!(out, "{path}")?,
            OutputMode::Sorted | OutputMode::Json => collected.push(path),
            OutputMode::Count => {}
        }
    }

    match mode {
        OutputMode::Stream => {}
        OutputMode::Sorted => {
            collected.sort_unstable();
            for path in &collected {
                writeln!(out, "{path}")?;
            }
        }
        OutputMode::Json => {
            collected.sort_unstable();
            let json = serde_json::to_string_pretty(&collected)
                .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize JSON: {}", e))?;
            writeln!(out, "{json}")?;
        }
        OutputMode::Count => writeln!(out, "{matches}")?,
    }
    out.flush()?;

    info!(matches, "Scan finished");

    Ok(stats.then(|| ScanSummary {
        matches,
        walk: scan.walk_stats(),
        queue: scan.queue_stats(),
        pool: scan.pool_stats(),
    }))
}

/// Prints the effective options as JSON.
fn run_show_config(options: ScanOptions) -> color_eyre::Result<()> {
    let config = Config { scan: options };
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize config: {}", e))?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}")?;
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Merge config file and flags
    let options = build_options(&cli)?;

    // 5. Route to appropriate command
    match cli.command {
        Commands::Scan {
            patterns,
            sort,
            count,
            json,
            stats,
        } => run_scan(options, patterns, OutputMode::from_flags(sort, count, json), stats).await,
        Commands::ShowConfig => run_show_config(options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gs-scan").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = parse(&["scan", "*.txt"]);
        let options = build_options(&cli).unwrap();
        assert_eq!(options, ScanOptions::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "scan",
            "--async",
            "--pool-concurrency",
            "2",
            "--queue-limit",
            "16",
            "-x",
            "tmp,.bak",
            "--follow-links",
            "logs/**/*.gz",
        ]);
        let options = build_options(&cli).unwrap();
        assert!(options.asynchronous);
        assert_eq!(options.pool_concurrency, 2);
        assert_eq!(options.queue_limit, 16);
        assert_eq!(options.excluded_extensions.len(), 2);
        assert!(options.follow_links);
        assert!(!options.randomize);
    }

    #[test]
    fn test_zero_producer_threads_rejected() {
        let cli = parse(&["scan", "--producer-threads", "0", "*"]);
        assert!(build_options(&cli).is_err());
    }

    #[test]
    fn test_scan_requires_a_pattern() {
        assert!(Cli::try_parse_from(["gs-scan", "scan"]).is_err());
    }

    #[test]
    fn test_output_mode_precedence() {
        assert_eq!(OutputMode::from_flags(false, false, false), OutputMode::Stream);
        assert_eq!(OutputMode::from_flags(true, false, false), OutputMode::Sorted);
        assert_eq!(OutputMode::from_flags(true, false, true), OutputMode::Json);
        assert_eq!(OutputMode::from_flags(true, true, false), OutputMode::Count);
    }

    #[test]
    fn test_count_conflicts_with_json() {
        assert!(Cli::try_parse_from(["gs-scan", "scan", "--count", "--json", "*"]).is_err());
    }
}
