//! Subcommand dispatch.
//!
//! [`run_app`] wires the ambient pieces (logging, configuration, Ctrl+C
//! handling, progress bars) around a [`Workflow`] and prints the result of
//! each subcommand in the requested format.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::actions::{DeleteConfig, DeletePlan, GroupConfig};
use crate::catalog::Catalog;
use crate::cli::{
    Cli, ClearArgs, Commands, ConfigArgs, DeleteArgs, DuplicatesArgs, FilterArgs, GroupArgs,
    OutputFormat, ScanArgs, StatusArgs,
};
use crate::config::{Config, ConfigError};
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::output::{text, JsonEnvelope, JsonOutput, StatusReport};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::{Scanner, ScannerConfig, WalkerConfig};
use crate::signal::{install_handler, ShutdownHandler};
use crate::workflow::{Phase, Workflow};

/// Shared state for one invocation.
struct Invocation {
    config: Config,
    shutdown: ShutdownHandler,
    quiet: bool,
}

impl Invocation {
    fn progress(&self, output: OutputFormat) -> Arc<dyn ProgressCallback> {
        Arc::new(Progress::new(self.quiet || output == OutputFormat::Json))
    }

    fn open_workflow(&self) -> Result<Workflow> {
        let catalog = open_catalog(&self.config.database)?;
        Ok(Workflow::from_existing(catalog)?)
    }

    fn walker(&self, filters: &FilterArgs) -> WalkerConfig {
        let mut patterns = self.config.ignore_patterns.clone();
        patterns.extend(filters.ignore_patterns.iter().cloned());
        self.config
            .walker_config()
            .with_min_size(filters.min_size)
            .with_max_size(filters.max_size)
            .with_ignore_patterns(patterns)
    }

    fn scanner(&self, walker: WalkerConfig, refresh: bool, output: OutputFormat) -> Scanner {
        Scanner::new(
            ScannerConfig::default()
                .with_walker(walker)
                .with_io_threads(self.config.io_threads)
                .with_batch_size(self.config.batch_size)
                .with_refresh_changed(refresh)
                .with_shutdown_flag(self.shutdown.get_flag())
                .with_progress_callback(self.progress(output)),
        )
    }
}

/// Run one CLI invocation to completion.
///
/// # Errors
///
/// Returns an error for unusable configuration (a [`ConfigError`] in the
/// chain), an unreadable catalog, or an operation that could not start.
/// Per-file failures are reported in the output and the exit code instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet, cli.no_color);

    let config = Config::load(cli.config.as_deref(), &cli.config_overrides())?;
    let shutdown = install_handler().context("failed to install Ctrl+C handler")?;
    let ctx = Invocation {
        config,
        shutdown,
        quiet: cli.quiet,
    };

    match &cli.command {
        Commands::Scan(args) => run_scan(&ctx, args),
        Commands::Duplicates(args) => run_duplicates(&ctx, args),
        Commands::Delete(args) => run_delete(&ctx, args),
        Commands::Group(args) => run_group(&ctx, args),
        Commands::Status(args) => run_status(&ctx, args),
        Commands::Clear(args) => run_clear(&ctx, args),
        Commands::Config(args) => run_config(&ctx, &cli, args),
    }
}

fn open_catalog(path: &Path) -> Result<Catalog> {
    Catalog::open(path).with_context(|| format!("failed to open catalog {}", path.display()))
}

fn run_scan(ctx: &Invocation, args: &ScanArgs) -> Result<ExitCode> {
    let mut workflow = ctx.open_workflow()?;
    let scanner = ctx.scanner(ctx.walker(&args.filters), !args.no_refresh, args.output);

    let stats = workflow.scan(&scanner, &args.roots)?;
    let exit_code = ExitCode::for_batch(stats.interrupted, stats.failed());
    emit(args.output, "scan", &stats, exit_code, |w| {
        text::write_scan_stats(w, &stats)
    })?;
    Ok(exit_code)
}

fn run_duplicates(ctx: &Invocation, args: &DuplicatesArgs) -> Result<ExitCode> {
    let mut workflow = ctx.open_workflow()?;
    require_scanned(&workflow)?;

    let report = workflow.resolve(!args.no_mark)?;
    let exit_code = if report.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    };

    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Json => JsonOutput::new(report, exit_code).write_to(&mut stdout, true)?,
        OutputFormat::Text => text::write_duplicate_report(&mut stdout, report)?,
    }
    Ok(exit_code)
}

fn run_delete(ctx: &Invocation, args: &DeleteArgs) -> Result<ExitCode> {
    let mut workflow = ctx.open_workflow()?;
    require_scanned(&workflow)?;

    let plan = DeletePlan::from_report(workflow.resolve(true)?);
    if plan.is_empty() {
        log::info!("No duplicates to delete");
        emit(
            args.output,
            "delete",
            &plan,
            ExitCode::NoDuplicates,
            |w| writeln!(w, "No duplicates found"),
        )?;
        return Ok(ExitCode::NoDuplicates);
    }

    if args.output == OutputFormat::Text {
        text::write_delete_plan(&mut io::stdout().lock(), &plan)?;
    }

    if !args.dry_run && !args.yes {
        let question = format!(
            "Permanently delete {} files? This cannot be undone.",
            plan.len()
        );
        if !confirm(&question)? {
            log::info!("Delete cancelled");
            return Ok(ExitCode::Success);
        }
    }

    let config = DeleteConfig::default()
        .with_verify(ctx.config.verify_before_delete)
        .with_dry_run(args.dry_run)
        .with_shutdown_flag(ctx.shutdown.get_flag())
        .with_progress_callback(ctx.progress(args.output));

    let result = workflow.delete(&plan, &config)?;
    let exit_code = ExitCode::for_batch(result.interrupted, result.failure_count());
    emit(args.output, "delete", &result, exit_code, |w| {
        text::write_delete_result(w, &result)
    })?;
    Ok(exit_code)
}

fn run_group(ctx: &Invocation, args: &GroupArgs) -> Result<ExitCode> {
    let walker = ctx.walker(&args.filters);
    let config = GroupConfig::new(&args.origin, &args.destination)
        .with_mode(ctx.config.grouping_mode)
        .with_duplicate_policy(ctx.config.duplicate_policy())
        .with_dry_run(args.dry_run)
        .with_walker(walker.clone())
        .with_shutdown_flag(ctx.shutdown.get_flag())
        .with_progress_callback(ctx.progress(args.output));

    // Refused before the catalog is touched.
    config.validate()?;

    let mut workflow = ctx.open_workflow()?;
    let scanner = ctx.scanner(walker, true, args.output);
    let stats = workflow.scan(&scanner, &[args.origin.clone()])?;
    if stats.interrupted {
        log::warn!("Scan of {} interrupted; nothing copied", args.origin.display());
        return Ok(ExitCode::Interrupted);
    }
    if args.output == OutputFormat::Text && !ctx.quiet {
        text::write_scan_stats(&mut io::stdout().lock(), &stats)?;
    }

    let plan = workflow.plan_group(&config)?;
    if args.output == OutputFormat::Text {
        text::write_copy_plan(&mut io::stdout().lock(), &plan)?;
    }

    let result = workflow.group(&plan, &config)?;
    let failures = result.failures.len() + stats.failed() + plan.walk_failures.len();
    let exit_code = ExitCode::for_batch(result.interrupted, failures);
    emit(args.output, "group", &result, exit_code, |w| {
        text::write_group_result(w, &result)
    })?;
    Ok(exit_code)
}

fn run_status(ctx: &Invocation, args: &StatusArgs) -> Result<ExitCode> {
    let catalog = open_catalog(&ctx.config.database)?;
    let status = StatusReport::collect(&catalog, &ctx.config.database)?;
    emit(args.output, "status", &status, ExitCode::Success, |w| {
        text::write_status(w, &status)
    })?;
    Ok(ExitCode::Success)
}

fn run_clear(ctx: &Invocation, args: &ClearArgs) -> Result<ExitCode> {
    let database = &ctx.config.database;
    if !args.yes {
        let question = format!("Remove every entry from {}?", database.display());
        if !confirm(&question)? {
            log::info!("Clear cancelled");
            return Ok(ExitCode::Success);
        }
    }

    let mut catalog = open_catalog(database)?;
    catalog.clear()?;
    let workflow = Workflow::new(catalog)?;
    log::info!(
        "Cleared catalog {} (state: {})",
        database.display(),
        workflow.phase()
    );
    Ok(ExitCode::Success)
}

fn run_config(ctx: &Invocation, cli: &Cli, args: &ConfigArgs) -> Result<ExitCode> {
    if !args.init {
        print!("{}", toml::to_string_pretty(&ctx.config).map_err(ConfigError::from)?);
        return Ok(ExitCode::Success);
    }

    let path: PathBuf = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path().ok_or(ConfigError::NoConfigDir)?,
    };
    if path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    Config::default().save(&path)?;
    log::info!("Wrote default configuration to {}", path.display());
    println!("{}", path.display());
    Ok(ExitCode::Success)
}

/// Refuse catalog-wide operations before anything was scanned.
fn require_scanned(workflow: &Workflow) -> Result<()> {
    if workflow.phase() == Phase::Idle {
        bail!("the catalog has no live entries; run `filetidy scan` first");
    }
    Ok(())
}

/// Print `result` as JSON, or through `write_text` for people.
fn emit<T, F>(
    output: OutputFormat,
    operation: &'static str,
    result: &T,
    exit_code: ExitCode,
    write_text: F,
) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&mut io::StdoutLock<'static>) -> io::Result<()>,
{
    let mut stdout = io::stdout().lock();
    match output {
        OutputFormat::Json => {
            JsonEnvelope::new(operation, result, exit_code).write_to(&mut stdout, true)?;
        }
        OutputFormat::Text => write_text(&mut stdout)?,
    }
    stdout.flush()?;
    Ok(())
}

/// Ask a yes/no question on stderr.
///
/// Without a terminal there is nobody to answer, so the action is refused
/// and the caller has to pass `--yes`.
fn confirm(question: &str) -> Result<bool> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        bail!("refusing to continue without confirmation; pass --yes to run non-interactively");
    }

    let mut stderr = io::stderr();
    write!(stderr, "{} [y/N] ", question)?;
    stderr.flush()?;

    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
