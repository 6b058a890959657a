use chrono::SubsecRound;
use clap::Parser;
use msstats::*;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Usage or config problem.
const EXIT_USAGE: u8 = 1;
/// At least one project failed.
const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    let (app_config, targets) = match prepare(&args) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "invalid invocation");
            eprintln!("error: {:#}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let runner_config = runner::RunnerConfig::from_app_config(&app_config);
    let endpoint = app_config.monitoring.endpoint.clone();
    let request_timeout = Duration::from_secs(app_config.monitoring.request_timeout_secs);
    tracing::info!(
        version = version::VERSION,
        projects = targets.len(),
        duration_secs = runner_config.duration_secs,
        step_secs = runner_config.step_secs,
        "starting"
    );

    let now = chrono::Utc::now().trunc_subsecs(0);
    let summary = runner::run_batch(&targets, &runner_config, now, |target| {
        runner::connect_cloud(target, &endpoint, request_timeout)
    })
    .await;

    for (project, outcome) in &summary.outcomes {
        match outcome {
            runner::ProjectOutcome::Completed {
                path,
                rows,
                failed_rows,
            } => println!(
                "{}: {} ({} instances, {} failed)",
                project,
                path.display(),
                rows,
                failed_rows
            ),
            runner::ProjectOutcome::Partial {
                path,
                rows,
                failed_rows,
                reason,
            } => println!(
                "{}: {} ({} instances, {} failed): INCOMPLETE: {}",
                project,
                path.display(),
                rows,
                failed_rows,
                reason
            ),
            runner::ProjectOutcome::Failed { reason } => println!("{}: FAILED: {}", project, reason),
        }
    }

    if summary.all_completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    }
}

fn prepare(args: &cli::Args) -> anyhow::Result<(config::AppConfig, Vec<runner::ProjectTarget>)> {
    let app_config = args.load_config()?;
    let targets = args.resolve_targets()?;
    Ok((app_config, targets))
}
