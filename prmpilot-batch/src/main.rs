use anyhow::Context;
use clap::Parser;
use prmpilot::{Session, WebDriverBackend};
use prmpilot_batch::{Auth, BatchDriver, Cli, Record};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.log_dir)
        .with_context(|| format!("creating log dir {}", cli.log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(&cli.log_dir, "prmpilot.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    let records = load_records(&cli.input)?;
    info!(count = records.len(), input = %cli.input.display(), "records loaded");

    let backend = WebDriverBackend::connect(&cli.webdriver_url, cli.headless)
        .await
        .context("connecting to the WebDriver endpoint")?;
    let session = Session::new(Arc::new(backend));

    let auth = Auth {
        new_work_url: cli.new_work_url.clone(),
        email: cli.email.clone(),
        password: cli.password.clone(),
    };
    let report = BatchDriver::new(auth)
        .with_settle(cli.settle())
        .run(session, &records)
        .await
        .context("batch aborted by a session failure")?;

    info!(
        attempted = report.attempted,
        completed = report.completed,
        failed = report.failed(),
        "batch finished"
    );
    // Per-record failures are reported, not fatal; only session-level
    // errors above produce a non-zero exit.
    for failure in &report.failures {
        warn!(
            index = failure.index,
            description = %failure.description,
            reason = %failure.reason,
            "record failed"
        );
    }
    Ok(())
}

fn load_records(path: &Path) -> anyhow::Result<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing records from {}", path.display()))
}
