use brrtcors::cli::{run_cli, Cli};
use brrtcors::logging::{init_logging_with_config, LogConfig};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let mut log_config = LogConfig::from_env();
    if std::env::var("BRRTCORS_LOG_LEVEL").is_err() {
        // Keep stderr quiet unless asked; decisions are printed to stdout.
        log_config.log_level = "warn".to_string();
    }
    init_logging_with_config(&log_config)?;

    let cli = Cli::parse();
    run_cli(cli)
}
