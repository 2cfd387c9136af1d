//! Dispatch: turn a parsed [`Cli`] into calls against the `vellum` facade and a process exit
//! code, the way `verify_files`' `app::main` sits between `CliOpts` and its library.

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use vellum::batch::{BatchConfig, ProgressEvent};
use vellum::report::{JsonReporter, MarkdownReporter, TextReporter};
use vellum::{CancellationToken, OperationalError, Reporter, ValidateOptions, ValidationReport};

use crate::args::{BatchAction, BatchRepairArgs, BatchValidateArgs, Cli, Command, Format, RepairArgs, ValidateArgs};

/// Run the parsed command to completion, returning the process exit code.
pub fn execute(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Validate(args) => cmd_validate(args),
        Command::Repair(args) => cmd_repair(args),
        Command::Batch(args) => match args.action {
            BatchAction::Validate(args) => cmd_batch_validate(args),
            BatchAction::Repair(args) => cmd_batch_repair(args),
        },
    }
}

#[derive(Copy, Clone, Debug)]
enum FileKind {
    Epub,
    Pdf,
}

fn detect_file_kind(path: &Path) -> Result<FileKind> {
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("epub") => Ok(FileKind::Epub),
        Some("pdf") => Ok(FileKind::Pdf),
        _ => bail!("cannot determine file type for '{}' (expected a .epub or .pdf extension)", path.display()),
    }
}

fn validate_one(path: &Path, kind: FileKind, options: ValidateOptions, cancel: &CancellationToken) -> Result<ValidationReport, OperationalError> {
    match kind {
        FileKind::Epub => vellum::validate_epub(path, options, cancel),
        FileKind::Pdf => vellum::validate_pdf(path, options, cancel),
    }
}

fn reporter_for(format: Format) -> Box<dyn Reporter> {
    match format {
        Format::Json => Box::new(JsonReporter),
        Format::Text => Box::new(TextReporter),
        Format::Markdown => Box::new(MarkdownReporter),
    }
}

fn write_output(text: &str, output: &Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text).with_context(|| format!("writing report to '{}'", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

/// `0` clean, `1` warnings only, `2` at least one error.
fn exit_status_for_report(report: &ValidationReport) -> i32 {
    if !report.errors.is_empty() {
        2
    } else if !report.warnings.is_empty() {
        1
    } else {
        0
    }
}

fn cmd_validate(args: ValidateArgs) -> Result<i32> {
    let stream_is_terminal = args.report.output.is_none() && std::io::stdout().is_terminal();
    let options = args.report.to_options(stream_is_terminal);
    let reporter = reporter_for(args.report.format);
    let cancel = CancellationToken::new();
    let validate_options = ValidateOptions { skip_accessibility: args.skip_accessibility };

    let mut reports = Vec::with_capacity(args.targets.len());
    let mut worst = 0;
    for target in &args.targets {
        let kind = detect_file_kind(target)?;
        log::debug!("validating '{}'", target.display());
        let report = validate_one(target, kind, validate_options, &cancel)
            .with_context(|| format!("validating '{}'", target.display()))?;
        worst = worst.max(exit_status_for_report(&report));
        reports.push(report);
    }

    let text = if reports.len() == 1 {
        reporter.format(&reports[0], &options)
    } else {
        reporter.format_many(&reports, &options)
    };
    write_output(&text, &args.report.output)?;
    Ok(worst)
}

fn render_preview(preview: &vellum::RepairPreview, format: Format, verbose: bool) -> String {
    if format == Format::Json {
        return if verbose {
            serde_json::to_string_pretty(preview).unwrap_or_default()
        } else {
            serde_json::to_string(preview).unwrap_or_default()
        };
    }

    let mut out = String::new();
    let _ = writeln!(out, "{} action(s) planned, auto-repairable: {}", preview.actions.len(), preview.can_auto_repair);
    for action in &preview.actions {
        let marker = if action.automated { "auto" } else { "manual" };
        let _ = writeln!(out, "  [{marker}] {} - {}", action.action_type, action.description);
    }
    if !preview.manual_warnings.is_empty() {
        let _ = writeln!(out, "manual steps required:");
        for warning in &preview.manual_warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }
    out
}

fn render_result(result: &vellum::RepairResult, format: Format) -> String {
    if format == Format::Json {
        return serde_json::to_string_pretty(result).unwrap_or_default();
    }

    let mut out = String::new();
    if result.success {
        let _ = writeln!(out, "repair succeeded: {} action(s) applied", result.applied_actions.len());
        if let Some(path) = &result.output_path {
            let _ = writeln!(out, "  output: {}", path.display());
        }
        if let Some(path) = &result.backup_path {
            let _ = writeln!(out, "  backup: {}", path.display());
        }
    } else {
        let _ = writeln!(out, "repair failed: {}", result.error.as_deref().unwrap_or("unknown error"));
    }
    out
}

fn default_backup_path(source: &Path, backup_dir: Option<&Path>) -> PathBuf {
    let file_name = source.file_name().map(|name| format!("{}.bak", name.to_string_lossy())).unwrap_or_else(|| "backup.bak".to_owned());
    match backup_dir {
        Some(dir) => dir.join(file_name),
        None => source.with_file_name(file_name),
    }
}

fn cmd_repair(args: RepairArgs) -> Result<i32> {
    let stream_is_terminal = args.report.output.is_none() && std::io::stdout().is_terminal();
    let options = args.report.to_options(stream_is_terminal);
    let cancel = CancellationToken::new();
    let kind = detect_file_kind(&args.target)?;

    let report = validate_one(&args.target, kind, ValidateOptions::default(), &cancel)
        .with_context(|| format!("validating '{}'", args.target.display()))?;
    let preview = vellum::preview_repair(&report);

    if args.destination.is_none() && !args.in_place {
        write_output(&render_preview(&preview, args.report.format, options.verbose), &args.report.output)?;
        return Ok(if preview.can_auto_repair { 0 } else { 1 });
    }

    let result = if args.in_place {
        let backup_path = args.backup.then(|| default_backup_path(&args.target, args.backup_dir.as_deref()));
        vellum::repair::apply_in_place(&args.target, &preview, backup_path.as_deref())
    } else {
        let destination = args.destination.as_ref().expect("checked above");
        vellum::apply_repair(&args.target, &preview, destination)
    };

    write_output(&render_result(&result, args.report.format), &args.report.output)?;
    Ok(if result.success { if preview.can_auto_repair { 0 } else { 1 } } else { 2 })
}

fn cmd_batch_validate(args: BatchValidateArgs) -> Result<i32> {
    let stream_is_terminal = args.report.output.is_none() && std::io::stdout().is_terminal();
    let options = args.report.to_options(stream_is_terminal);
    let reporter = reporter_for(args.report.format);
    let cancel = CancellationToken::new();
    let validate_options = ValidateOptions { skip_accessibility: args.skip_accessibility };
    let config: BatchConfig = args.pool.into_config();
    log::info!("batch validate: {} target(s), {} worker(s)", args.targets.len(), config.workers);

    let mut progress_callback = args.progress.then(|| {
        let cb: Box<dyn FnMut(ProgressEvent<'_, ValidationReport>)> = Box::new(|event: ProgressEvent<'_, ValidationReport>| {
            let status = match event.err {
                Some(err) => format!("error: {err}"),
                None => match event.value {
                    Some(report) if report.is_valid => "valid".to_owned(),
                    Some(_) => "invalid".to_owned(),
                    None => "done".to_owned(),
                },
            };
            eprintln!("[{}/{}] {} - {status}", event.completed, event.total, event.path.display());
        });
        cb
    });

    let worker_cancel = cancel.clone();
    let result = vellum::batch::run(
        &args.targets,
        &config,
        &cancel,
        move |path| {
            let kind = detect_file_kind(path).map_err(|error| OperationalError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, error.to_string()),
            })?;
            validate_one(path, kind, validate_options, &worker_cancel)
        },
        progress_callback.as_deref_mut(),
    );

    let exit_status = vellum::batch::aggregate_exit_status(result.items.iter());

    if !args.summary_only {
        let reports: Vec<ValidationReport> = result.items.iter().filter_map(|item| item.value.clone()).collect();
        if !reports.is_empty() {
            write_output(&reporter.format_many(&reports, &options), &args.report.output)?;
        }
    } else {
        print_batch_summary(&result.items);
    }

    for item in &result.items {
        if let Some(err) = &item.err {
            eprintln!("error: '{}': {err}", item.path.display());
        }
    }

    Ok(exit_status.code())
}

fn print_batch_summary(items: &[vellum::batch::ItemResult<ValidationReport>]) {
    let total = items.len();
    let valid = items.iter().filter(|item| item.value.as_ref().is_some_and(|report| report.is_valid)).count();
    let errors: usize = items.iter().filter_map(|item| item.value.as_ref()).map(|report| report.errors.len()).sum();
    let warnings: usize = items.iter().filter_map(|item| item.value.as_ref()).map(|report| report.warnings.len()).sum();
    let failed = items.iter().filter(|item| item.err.is_some()).count();
    println!("{total} file(s), {valid} valid, {errors} error(s), {warnings} warning(s), {failed} failed to process");
}

struct BatchRepairOutcome {
    success: bool,
    applied: usize,
    manual_remaining: usize,
    error: Option<String>,
}

fn cmd_batch_repair(args: BatchRepairArgs) -> Result<i32> {
    let cancel = CancellationToken::new();
    let config: BatchConfig = args.pool.into_config();
    let backup = args.backup;
    let backup_dir = args.backup_dir.clone();

    let mut progress_callback = args.progress.then(|| {
        let cb: Box<dyn FnMut(ProgressEvent<'_, BatchRepairOutcome>)> = Box::new(|event: ProgressEvent<'_, BatchRepairOutcome>| {
            let status = match event.err {
                Some(err) => format!("error: {err}"),
                None => match event.value {
                    Some(outcome) if outcome.success => format!("repaired ({} action(s))", outcome.applied),
                    Some(_) => "failed".to_owned(),
                    None => "done".to_owned(),
                },
            };
            eprintln!("[{}/{}] {} - {status}", event.completed, event.total, event.path.display());
        });
        cb
    });

    let worker_cancel = cancel.clone();
    let result = vellum::batch::run(
        &args.targets,
        &config,
        &cancel,
        move |path| {
            let kind = detect_file_kind(path).map_err(|error| OperationalError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, error.to_string()),
            })?;
            let report = validate_one(path, kind, ValidateOptions::default(), &worker_cancel)?;
            let preview = vellum::preview_repair(&report);
            let manual_remaining = preview.actions.iter().filter(|action| !action.automated).count();
            let backup_path = backup.then(|| default_backup_path(path, backup_dir.as_deref()));
            let outcome = vellum::repair::apply_in_place(path, &preview, backup_path.as_deref());
            Ok(BatchRepairOutcome {
                success: outcome.success,
                applied: outcome.applied_actions.len(),
                manual_remaining,
                error: outcome.error,
            })
        },
        progress_callback.as_deref_mut(),
    );

    let mut has_internal_error = false;
    let mut has_failure = false;
    let mut has_manual_remaining = false;
    for item in &result.items {
        if let Some(err) = &item.err {
            has_internal_error = true;
            eprintln!("error: '{}': {err}", item.path.display());
            continue;
        }
        let Some(outcome) = &item.value else { continue };
        if !outcome.success {
            has_failure = true;
            eprintln!("repair failed for '{}': {}", item.path.display(), outcome.error.as_deref().unwrap_or("unknown error"));
        } else if outcome.manual_remaining > 0 {
            has_manual_remaining = true;
        }
        if args.format == Format::Json {
            let value = serde_json::json!({
                "path": item.path,
                "success": outcome.success,
                "applied_actions": outcome.applied,
                "manual_remaining": outcome.manual_remaining,
                "error": outcome.error,
            });
            println!("{value}");
        } else {
            println!(
                "{}: {} ({} applied, {} manual step(s) remaining)",
                item.path.display(),
                if outcome.success { "repaired" } else { "failed" },
                outcome.applied,
                outcome.manual_remaining
            );
        }
    }

    Ok(if has_internal_error {
        3
    } else if has_failure {
        2
    } else if has_manual_remaining {
        1
    } else {
        0
    })
}
