use std::path::PathBuf;

use clap::Parser;

use crate::core::intent::{InvocationIntent, ServerTarget};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "interface",
    version,
    about = "InterfaceOficial launcher",
    long_about = None
)]
pub struct Cli {
    /// Use a portable data directory instead of the configured one
    #[arg(short = 'd', long = "dir")]
    pub dir: Option<PathBuf>,

    /// Instance to launch
    #[arg(short = 'l', long = "launch", value_name = "INSTANCE_ID")]
    pub launch: Option<String>,

    /// Join this server once the game is up (host[:port])
    #[arg(short = 's', long = "server", requires = "launch", value_parser = clap::value_parser!(ServerTarget))]
    pub server: Option<ServerTarget>,

    /// Account profile to launch with
    #[arg(short = 'a', long = "profile", requires = "launch")]
    pub profile: Option<String>,

    /// Write a liveness marker into the data directory
    #[arg(long)]
    pub alive: bool,

    /// Zip archive to open in the import dialog
    #[arg(short = 'I', long = "import", value_name = "ARCHIVE")]
    pub import: Option<PathBuf>,
}

impl Cli {
    /// Intent of this process. Relative import paths are made absolute
    /// because a running launcher may have a different working directory.
    pub fn intent(&self) -> InvocationIntent {
        let import_archive_path = self.import.as_ref().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.clone())
            }
        });

        InvocationIntent {
            instance_id: self.launch.clone(),
            server_to_join: self.server.clone(),
            profile_to_use: self.profile.clone(),
            live_check: self.alive,
            import_archive_path,
        }
    }
}
