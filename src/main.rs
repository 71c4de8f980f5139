use clap::Parser;
use color_eyre::Result;
use sensor_bridge::{
    cli, config::Config, device::ConnectionManagerHandle, hub::HubHandle, logging, server,
};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use tracing::{debug, error, info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    if let Some(command) = cli.command {
        cli::handle_command(command);

        return Ok(());
    }

    logging::init(Level::INFO, None).await;

    let config = if let Some(config_path) = cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)
    } else {
        debug!("Default config");
        Config::default()
    };

    let hub = HubHandle::new();
    let manager = ConnectionManagerHandle::new(config.clone(), hub.clone());

    let listen_port = config.listen_port;
    let server_handle = tokio::spawn(server::run_on_port(config, hub, listen_port));

    #[cfg(unix)]
    let mut hangup = signal(SignalKind::hangup())?;

    #[cfg(unix)]
    let hangup_recv = hangup.recv();

    #[cfg(not(unix))]
    let hangup_recv = std::future::pending::<Option<()>>();

    let server_result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C, quitting");
            Ok(())
        }
        _ = hangup_recv => {
            info!("Told to hang up, quitting");
            Ok(())
        }
        _ = server_handle => {
            error!("Server returned");
            Err(color_eyre::eyre::eyre!("Server stopped unexpectedly"))
        }
    };

    // The manager goes first: this disarms the retry timer so no connect
    // attempt can race the teardown, then closes the device and waits
    // for confirmation. It runs whether we are quitting on a signal or
    // because the server died, so the device never stays half-open.
    let close_result = manager.shutdown().await;

    if let Err(e) = close_result {
        error!(%e, "Device did not close cleanly");
        std::process::exit(1);
    }

    server_result
}
