// ─── Game Process ───
// Spawns an instance's prepared launch command and watches the child.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::core::auth::LaunchAccountProfile;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{Instance, InstanceManager};
use crate::core::intent::ServerTarget;

/// Time a game gets to exit after SIGTERM before it is killed outright.
const TERMINATE_GRACE: Duration = Duration::from_millis(3000);

/// Everything needed to start one game process.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub instance_id: String,
    pub account: LaunchAccountProfile,
    pub profiler: Option<String>,
    pub profiler_args: Vec<String>,
    pub server_to_join: Option<ServerTarget>,
}

/// How a game process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub success: bool,
    pub code: Option<i32>,
}

/// A running game that can be awaited or terminated.
#[async_trait]
pub trait GameProcess: Send {
    fn id(&self) -> Option<u32>;

    async fn wait(&mut self) -> LauncherResult<ProcessExit>;

    /// Best-effort termination; the exit is still observed through `wait`.
    async fn terminate(&mut self) -> LauncherResult<()>;
}

/// Starts game processes. The coordinator only sees this seam.
#[async_trait]
pub trait GameSpawner: Send + Sync {
    async fn spawn(&self, request: &LaunchRequest) -> LauncherResult<Box<dyn GameProcess>>;
}

/// Spawns real OS processes from `instance.json` records.
pub struct ProcessSpawner {
    instances: InstanceManager,
}

impl ProcessSpawner {
    pub fn new(instances: InstanceManager) -> Self {
        Self { instances }
    }
}

#[async_trait]
impl GameSpawner for ProcessSpawner {
    async fn spawn(&self, request: &LaunchRequest) -> LauncherResult<Box<dyn GameProcess>> {
        let mut instance = self.instances.load(&request.instance_id).await?;
        let game_dir = instance.game_dir();
        tokio::fs::create_dir_all(&game_dir)
            .await
            .map_err(|source| LauncherError::Io {
                path: game_dir.clone(),
                source,
            })?;

        let mut cmd = build_command(&instance, request)?;
        info!("Launching instance {} ({})", instance.name, instance.id);
        debug!("Command (copy/paste): {}", format_command_for_logs(&cmd));

        let mut child = cmd
            .spawn()
            .map_err(|e| LauncherError::Spawn(e.to_string()))?;
        forward_output(&instance.id, &mut child);

        instance.last_played = Some(Utc::now());
        if let Err(err) = self.instances.save(&instance).await {
            warn!("Cannot persist last_played for {}: {}", instance.id, err);
        }

        Ok(Box::new(ChildProcess {
            instance_id: instance.id,
            child,
        }))
    }
}

struct ChildProcess {
    instance_id: String,
    child: Child,
}

#[async_trait]
impl GameProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> LauncherResult<ProcessExit> {
        let status = self.child.wait().await?;
        Ok(ProcessExit {
            success: status.success(),
            code: status.code(),
        })
    }

    async fn terminate(&mut self) -> LauncherResult<()> {
        let Some(pid) = self.child.id() else {
            // Already reaped.
            return Ok(());
        };

        #[cfg(unix)]
        {
            let graceful = Command::new("kill")
                .args(["-15", &pid.to_string()])
                .status()
                .await;
            if matches!(graceful, Ok(status) if status.success())
                && tokio::time::timeout(TERMINATE_GRACE, self.child.wait())
                    .await
                    .is_ok()
            {
                info!("Instance {} (pid {}) stopped after SIGTERM", self.instance_id, pid);
                return Ok(());
            }
        }

        #[cfg(windows)]
        {
            let status = Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/T", "/F"])
                .status()
                .await
                .map_err(|e| LauncherError::Other(format!("Cannot stop process {pid}: {e}")))?;
            if status.success() {
                return Ok(());
            }
            warn!("taskkill for pid {} returned {:?}", pid, status.code());
        }

        warn!("Force killing instance {} (pid {})", self.instance_id, pid);
        self.child
            .kill()
            .await
            .map_err(|e| LauncherError::Other(format!("Cannot kill process {pid}: {e}")))
    }
}

/// Builds the command line: program, profiler args, prepared args, then the
/// account and server-join game arguments.
pub(crate) fn build_command(instance: &Instance, request: &LaunchRequest) -> LauncherResult<Command> {
    let (program, prepared_args) = instance.launch_command.split_first().ok_or_else(|| {
        LauncherError::Spawn(format!("instance {} has no launch command", instance.id))
    })?;

    let mut cmd = Command::new(program);
    cmd.args(&request.profiler_args);
    cmd.args(prepared_args);

    cmd.arg("--username").arg(&request.account.username);
    cmd.arg("--uuid").arg(&request.account.uuid);
    cmd.arg("--accessToken").arg(&request.account.access_token);

    if let Some(server) = &request.server_to_join {
        cmd.arg("--server").arg(&server.address);
        cmd.arg("--port").arg(server.port.to_string());
    }

    cmd.env("INST_ID", &instance.id);
    cmd.env("INST_NAME", &instance.name);
    cmd.env("INST_DIR", &instance.path);
    cmd.env("INST_MC_DIR", instance.game_dir());

    cmd.current_dir(instance.game_dir());
    cmd.kill_on_drop(true);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    Ok(cmd)
}

fn forward_output(instance_id: &str, child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        let instance_id = instance_id.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!("[mc:{}][stdout] {}", instance_id, line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let instance_id = instance_id.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("[mc:{}][stderr] {}", instance_id, line);
            }
        });
    }
}

fn format_command_for_logs(cmd: &Command) -> String {
    let std_cmd = cmd.as_std();
    let program = shell_escape(&std_cmd.get_program().to_string_lossy());
    let args = std_cmd
        .get_args()
        .map(|arg| shell_escape(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ");

    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args)
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}
