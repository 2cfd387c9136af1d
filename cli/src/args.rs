//! Command-line argument definitions.
//!
//! One root [`Parser`], one [`Subcommand`] per verb (`validate`, `repair`, `batch`), and a
//! handful of `#[command(flatten)]` groups (`ReportArgs`, `PoolArgs`) shared across the verbs
//! that need them: the same shape the report/batch options take in the library itself.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use vellum::{ReportFilter, ReportOptions, Severity};

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}\
";

/// Validate and repair EPUB/PDF documents.
#[derive(Parser, Debug)]
#[command(name = "vellum", version, about, long_about = None, help_template = HELP_TEMPLATE)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate one or more files and print a report.
    Validate(ValidateArgs),
    /// Preview or apply repairs to a single file.
    Repair(RepairArgs),
    /// Validate or repair many files concurrently.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Files to validate.
    #[arg(required = true)]
    pub targets: Vec<PathBuf>,

    #[command(flatten)]
    pub report: ReportArgs,

    /// Skip the EPUB accessibility scorer. Has no effect on PDF.
    #[arg(long)]
    pub skip_accessibility: bool,
}

#[derive(Args, Debug)]
pub struct RepairArgs {
    /// File to repair.
    pub target: PathBuf,

    /// Write the repaired file here instead of only previewing.
    #[arg(long = "to", conflicts_with = "in_place")]
    pub destination: Option<PathBuf>,

    /// Repair the file in place.
    #[arg(long)]
    pub in_place: bool,

    /// Back up the original before an in-place repair.
    #[arg(long, requires = "in_place")]
    pub backup: bool,

    /// Directory to write the backup into (default: alongside the source, as `<name>.bak`).
    #[arg(long, requires = "backup")]
    pub backup_dir: Option<PathBuf>,

    #[command(flatten)]
    pub report: ReportArgs,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(subcommand)]
    pub action: BatchAction,
}

#[derive(Subcommand, Debug)]
pub enum BatchAction {
    /// Validate many files concurrently.
    Validate(BatchValidateArgs),
    /// Repair many files concurrently, in place.
    Repair(BatchRepairArgs),
}

#[derive(Args, Debug)]
pub struct BatchValidateArgs {
    /// Files, directories, or glob patterns.
    #[arg(required = true)]
    pub targets: Vec<String>,

    #[command(flatten)]
    pub pool: PoolArgs,

    #[command(flatten)]
    pub report: ReportArgs,

    /// Skip the EPUB accessibility scorer. Has no effect on PDF.
    #[arg(long)]
    pub skip_accessibility: bool,

    /// Print only the aggregate summary line, not a report per file.
    #[arg(long)]
    pub summary_only: bool,

    /// Report progress to stderr as each file finishes.
    #[arg(long)]
    pub progress: bool,
}

#[derive(Args, Debug)]
pub struct BatchRepairArgs {
    /// Files, directories, or glob patterns.
    #[arg(required = true)]
    pub targets: Vec<String>,

    #[command(flatten)]
    pub pool: PoolArgs,

    /// Back up each original before repairing it in place.
    #[arg(long)]
    pub backup: bool,

    /// Directory to write backups into (default: alongside each source, as `<name>.bak`).
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,

    /// Report progress to stderr as each file finishes.
    #[arg(long)]
    pub progress: bool,

    /// Output format for the per-file summary.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Args, Debug)]
pub struct PoolArgs {
    /// Number of worker threads (default: available parallelism).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Bounded channel capacity between the feeder and the workers.
    #[arg(long)]
    pub queue_size: Option<usize>,

    /// Maximum directory recursion depth.
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Only consider files with this extension (repeatable), e.g. `--ext epub --ext pdf`.
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Exclude files matching this glob pattern, matched against basename and full path
    /// (repeatable).
    #[arg(long = "ignore")]
    pub ignore: Vec<String>,
}

impl PoolArgs {
    pub fn into_config(self) -> vellum::batch::BatchConfig {
        let mut config = vellum::batch::BatchConfig::default();
        if let Some(workers) = self.workers {
            config.workers = workers.max(1);
        }
        if let Some(queue_size) = self.queue_size {
            config.queue_size = queue_size.max(1);
        }
        config.max_depth = self.max_depth;
        if !self.extensions.is_empty() {
            config.allowed_extensions =
                self.extensions.into_iter().map(|ext| if ext.starts_with('.') { ext } else { format!(".{ext}") }).collect();
        }
        config.ignore_patterns = self.ignore;
        config
    }
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Only show findings at or above this severity.
    #[arg(long)]
    pub min_severity: Option<Severity>,

    /// Only show findings with one of these severities (repeatable).
    #[arg(long = "severity")]
    pub severities: Vec<Severity>,

    /// Suppress warning-severity findings.
    #[arg(long)]
    pub no_warnings: bool,

    /// Suppress info-severity findings.
    #[arg(long)]
    pub no_info: bool,

    /// Cap the number of error-severity findings rendered.
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Include extra detail (elapsed time, full detail maps) where the format supports it.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Control ANSI color in text output.
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Write the rendered report to this file instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

impl ReportArgs {
    /// Build a [`ReportOptions`] from the parsed flags, resolving `--color`/`NO_COLOR` against
    /// whether `stream` is actually a terminal.
    pub fn to_options(&self, stream_is_terminal: bool) -> ReportOptions {
        let mut filter = ReportFilter::default();
        filter.min_severity = self.min_severity;
        if !self.severities.is_empty() {
            filter.severities = Some(self.severities.clone());
        }
        ReportOptions {
            include_warnings: !self.no_warnings,
            include_info: !self.no_info,
            verbose: self.verbose,
            color_enabled: resolve_color(self.color, stream_is_terminal),
            max_errors: self.max_errors,
            filter,
        }
    }
}

/// Report rendering format.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Format {
    Json,
    Text,
    Markdown,
}

/// When to emit ANSI color escapes in text output.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

/// `--color=auto` defers to whether the output stream is a terminal and honors `NO_COLOR`
/// (<https://no-color.org>); `always`/`never` are unconditional overrides.
pub fn resolve_color(choice: ColorChoice, stream_is_terminal: bool) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => stream_is_terminal && std::env::var_os("NO_COLOR").is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_and_never_ignore_terminal_state() {
        assert!(resolve_color(ColorChoice::Always, false));
        assert!(!resolve_color(ColorChoice::Never, true));
    }

    #[test]
    fn auto_requires_a_terminal() {
        assert!(!resolve_color(ColorChoice::Auto, false));
    }
}
