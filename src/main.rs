//! shell-bridge binary entry point.

use std::io::IsTerminal;
use std::process::ExitCode;

use shell_bridge::api::Service;
use shell_bridge::cli::{self, Args};
use shell_bridge::config::{default_config_path, Config, Settings};
use shell_bridge::control::ControlMenu;
use shell_bridge::{desktop, logging, ShutdownCoordinator};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Run 'shell-bridge --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "shell-bridge stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> shell_bridge::Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let loaded = Config::load_optional(&config_path);
    let settings = Settings::resolve(&args, loaded.as_ref().ok().and_then(Option::as_ref));

    // Logging depends on the resolved level, so config diagnostics wait until now.
    logging::init(&settings.log_level);
    info!("shell-bridge v{}", env!("CARGO_PKG_VERSION"));
    match &loaded {
        Ok(Some(_)) => info!(path = %config_path.display(), "config loaded"),
        Ok(None) => debug!(path = %config_path.display(), "no config file"),
        Err(e) => warn!(error = %e, "config load failed; using flags and defaults"),
    }

    if settings.autostart {
        if let Err(e) = desktop::ensure_autostart() {
            warn!(error = %e, "autostart registration failed");
        }
    }

    let server = settings.server_config();
    let shutdown = ShutdownCoordinator::new();
    let signals = shutdown.listen_for_signals();

    let service = Service::bind(&server, shutdown).await?;

    if settings.open_ui {
        let url = server.ui_url();
        tokio::task::spawn_blocking(move || desktop::open_browser(&url));
    }

    if std::io::stdin().is_terminal() {
        ControlMenu::new(
            service.shutdown_handle(),
            service.local_addr().to_string(),
            server.ui_url(),
        )
        .spawn_on_stdin();
    }

    let result = service.run().await;
    signals.abort();
    result
}
