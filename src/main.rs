use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wristd::{Daemon, DaemonConfig, Registry};

/// Drives wrist display accessories from this host.
#[derive(Parser, Debug)]
#[command(name = "wristd", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "WRISTD_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "wristd=debug" } else { "wristd=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = cli.config.unwrap_or_else(DaemonConfig::default_path);
    let config = match DaemonConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %path.display(), error = %e, "cannot load configuration");
            return ExitCode::FAILURE;
        }
    };
    let registry = Registry::with_builtins();

    if cli.check {
        let problems = wristd::daemon::check_config(&config, &registry);
        for problem in &problems {
            error!(error = %problem, "configuration problem");
        }
        if problems.is_empty() {
            info!(watches = config.watches.len(), "configuration ok");
            return ExitCode::SUCCESS;
        }
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "cannot start runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        let daemon = Daemon::start(&config, &registry);
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for interrupts");
        }
        info!("shutting down");
        daemon.shutdown().await;
    });
    ExitCode::SUCCESS
}
