//! `clockify`: workspace operations against the Clockify API.
//!
//! User-facing summaries go to stdout; everything else goes to the log.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod logging;

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clockify_engine::{
    changes_approved, load_roster, AccessReport, AccessRun, ApiClient, ApiConfig, ExpenseImporter,
    ExportSink, FileExportSink, ImportOptions, ImportReport, NullExportSink,
};
use clockify_logging::clk_info;
use log::LevelFilter;

use cli::{AccessArgs, Cli, Command, UploadArgs};
use logging::LogDestination;

fn main() -> ExitCode {
    let cli = match cli::parse_args(env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            cli::print_help();
            return ExitCode::FAILURE;
        }
    };

    let destination = if cli.verbose {
        LogDestination::Both
    } else {
        LogDestination::File
    };
    logging::initialize(destination, LevelFilter::Info);

    let result = match &cli.command {
        Command::Help => {
            cli::print_help();
            Ok(())
        }
        Command::Template { path } => ExpenseImporter::write_template(path)
            .map(|written| println!("Template written to {}", written.display()))
            .map_err(anyhow::Error::from),
        _ => run_remote(&cli),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Command failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Commands that talk to the API run on a single-threaded runtime, one request at a time.
fn run_remote(cli: &Cli) -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("Configuration incomplete")?;
    clk_info!("Using {config:?}");
    let client = ApiClient::from_config(&config)?;
    let sink: Arc<dyn ExportSink> = if cli.export {
        Arc::new(FileExportSink::new(cli.export_dir.clone()))
    } else {
        Arc::new(NullExportSink)
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Could not start the async runtime")?;

    runtime.block_on(async move {
        match &cli.command {
            Command::Check => run_check(&client).await,
            Command::Access(args) => run_access(client, sink, args).await,
            Command::UploadExpenses(args) => run_upload(client, sink, args).await,
            Command::Help | Command::Template { .. } => Ok(()),
        }
    })
}

async fn run_check(client: &ApiClient) -> anyhow::Result<()> {
    if !client.validate_connection().await {
        bail!("Could not read workspace {}", client.workspace_id());
    }
    println!("Connected to workspace {}", client.workspace_id());
    for path in ["/projects", "/users", "/user-groups"] {
        match client.probe_pagination(path).await {
            Ok(probe) => println!("    {path}: {:?}", probe.shape),
            Err(err) => println!("    {path}: {err}"),
        }
    }
    Ok(())
}

async fn run_access(client: ApiClient, sink: Arc<dyn ExportSink>, args: &AccessArgs) -> anyhow::Result<()> {
    let roster = load_roster(&args.roster)?;
    let approved = args.apply || changes_approved(|key| env::var(key).ok());
    let mut run = AccessRun::new(client, sink, roster, approved);
    let report = run.run(&args.scope).await;
    print_access_report(&report);
    if report.failures() > 0 {
        bail!("access run finished with {} failures", report.failures());
    }
    Ok(())
}

fn print_access_report(report: &AccessReport) {
    if let Some(error) = &report.project_error {
        println!("No projects processed: {error}");
        return;
    }
    println!("Projects in scope: {}", report.projects);
    for (label, phase) in [("Grant", &report.grant), ("Restrict", &report.restrict)] {
        println!(
            "{label}: {} matched, {} updated, {} failed{}",
            phase.matched,
            phase.updated,
            phase.failed,
            if phase.applied { "" } else { " (not applied)" }
        );
        for error in &phase.lookup_errors {
            println!("    {error}");
        }
    }
    if !report.grant.applied && report.grant.lookup_errors.is_empty() {
        println!("Pass --apply or set APPROVE_CHANGES=true to update tasks.");
    }
}

async fn run_upload(client: ApiClient, sink: Arc<dyn ExportSink>, args: &UploadArgs) -> anyhow::Result<()> {
    let client = match &args.workspace {
        Some(workspace_id) => client.for_workspace(workspace_id.clone()),
        None => client,
    };
    let options = ImportOptions {
        dry_run: args.dry_run,
        chunk_size: args.chunk_size,
        column_mapping: args.column_mapping.clone(),
        default_user_email: args.user_email.clone(),
        ..ImportOptions::default()
    };
    let mut importer = ExpenseImporter::new(client, sink);
    let report = importer.import_file(&args.csv, &options).await?;
    print_import_report(&report);
    match &report.upload {
        Some(upload) if upload.total_failed > 0 => {
            bail!("{} of {} expenses failed", upload.total_failed, upload.total_attempted)
        }
        _ => Ok(()),
    }
}

fn print_import_report(report: &ImportReport) {
    println!(
        "{}: {} rows, {} valid, {} invalid",
        report.source, report.total_records, report.valid_records, report.invalid_records
    );
    for error in report.validation_errors.iter().take(10) {
        println!("    row {}: {}", error.row_index, error.errors.join("; "));
    }
    if report.validation_errors.len() > 10 {
        println!("    ... {} more", report.validation_errors.len() - 10);
    }
    match &report.upload {
        Some(upload) => println!(
            "Created {} of {} expenses in {} chunks",
            upload.total_created,
            upload.total_attempted,
            upload.chunks.len()
        ),
        None => println!("Dry run: nothing uploaded"),
    }
}
