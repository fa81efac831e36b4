pub mod cli;
pub mod core;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::core::coordinator::ApplicationCoordinator;
use crate::core::instance::InstanceManager;
use crate::core::launch::ProcessSpawner;
use crate::core::state::LauncherPaths;
use crate::core::window::HeadlessWindowHost;

pub fn run() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,interface_coordinator=debug")),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!("InterfaceOficial launcher starting...");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("Cannot start the async runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(run_launcher(cli));
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

async fn run_launcher(cli: Cli) -> i32 {
    let paths = match LauncherPaths::resolve(cli.dir.clone()) {
        Ok(paths) => paths,
        Err(err) => {
            tracing::error!("{}", err);
            return 1;
        }
    };
    tracing::debug!("Data directory: {:?}", paths.data_dir());

    let spawner = Arc::new(ProcessSpawner::new(InstanceManager::new(
        paths.instances_dir(),
    )));
    let mut coordinator =
        ApplicationCoordinator::new(paths, Box::new(HeadlessWindowHost::new()), spawner);

    coordinator.start(cli.intent()).await;

    // Without a real window layer, Ctrl+C stands in for closing the focused window.
    let handle = coordinator.handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            handle.close_current_window();
        }
    });

    coordinator.run().await
}
