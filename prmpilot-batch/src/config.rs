use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_NEW_WORK_URL: &str = "https://ukhs.pvcloud.com/planview/ConfiguredScreens/ConfiguredScreen.aspx?sid=CfgDef$WDT&mode=RW&popup=1&back=close";

/// Batch runner for the PRM work-intake workflow.
#[derive(Debug, Parser)]
#[command(name = "prmpilot-batch", version, about)]
pub struct Cli {
    /// CSV file with one record per row (headers must match the intake
    /// workbook columns).
    #[arg(long)]
    pub input: PathBuf,

    /// WebDriver endpoint (chromedriver).
    #[arg(long, default_value = "http://localhost:9515")]
    pub webdriver_url: String,

    /// Run the browser headless.
    #[arg(long)]
    pub headless: bool,

    /// Direct URL of the "New Work" configured screen.
    #[arg(long, default_value = DEFAULT_NEW_WORK_URL)]
    pub new_work_url: String,

    /// Account identifier for login. Supply via environment, not the
    /// command line.
    #[arg(long, env = "PRM_EMAIL", hide_env_values = true)]
    pub email: String,

    /// Passphrase for login. Supply via environment.
    #[arg(long, env = "PRM_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Settle delay in milliseconds for widgets without a readiness
    /// signal.
    #[arg(long, default_value_t = 1000)]
    pub settle_ms: u64,

    /// Directory for the per-run log file.
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

impl Cli {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
