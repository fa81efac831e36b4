// ─── Launch Controller ───
// Drives one instance from account resolution to process exit and reports
// the outcome exactly once on the completion channel.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::process::{GameSpawner, LaunchRequest, ProcessExit};
use crate::core::auth::AccountList;
use crate::core::intent::ServerTarget;

/// Why a launched instance did not finish cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchFailureReason {
    Crashed { code: Option<i32> },
    KilledByUser,
    AccountResolution(String),
    Spawn(String),
}

impl fmt::Display for LaunchFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchFailureReason::Crashed { code: Some(code) } => {
                write!(f, "game exited with code {code}")
            }
            LaunchFailureReason::Crashed { code: None } => {
                write!(f, "game was terminated externally")
            }
            LaunchFailureReason::KilledByUser => write!(f, "killed by user"),
            LaunchFailureReason::AccountResolution(reason) => {
                write!(f, "account resolution failed: {reason}")
            }
            LaunchFailureReason::Spawn(reason) => write!(f, "could not start game: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Succeeded,
    Failed(LaunchFailureReason),
}

/// Terminal report of one controller, tagged with its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCompletion {
    pub instance_id: String,
    pub token: Uuid,
    pub outcome: LaunchOutcome,
}

/// Parameters fixed when a launch is accepted.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub instance_id: String,
    pub online: bool,
    pub profiler: Option<String>,
    pub profiler_args: Vec<String>,
    pub server_to_join: Option<ServerTarget>,
    pub account_to_use: Option<String>,
    pub default_account: Option<String>,
}

/// Handle to one in-flight launch. Owned by the instance registry.
#[derive(Debug)]
pub struct LaunchController {
    instance_id: String,
    token: Uuid,
    kill: watch::Sender<bool>,
}

impl LaunchController {
    /// Starts the launch on the current runtime and returns immediately.
    pub fn start<E>(
        plan: LaunchPlan,
        accounts: Arc<AccountList>,
        spawner: Arc<dyn GameSpawner>,
        completions: mpsc::UnboundedSender<E>,
    ) -> Self
    where
        E: From<LaunchCompletion> + Send + 'static,
    {
        let token = Uuid::new_v4();
        let (kill, kill_rx) = watch::channel(false);
        let instance_id = plan.instance_id.clone();

        tokio::spawn(async move {
            let instance_id = plan.instance_id.clone();
            let outcome = drive(plan, accounts, spawner, kill_rx).await;
            match &outcome {
                LaunchOutcome::Succeeded => info!("Instance {} finished", instance_id),
                LaunchOutcome::Failed(reason) => warn!("Instance {} failed: {}", instance_id, reason),
            }
            let completion = LaunchCompletion {
                instance_id,
                token,
                outcome,
            };
            if completions.send(E::from(completion)).is_err() {
                debug!("Coordinator gone before launch completion was delivered");
            }
        });

        Self {
            instance_id,
            token,
            kill,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Asks the launch to stop. Completion still arrives on the channel.
    pub fn request_kill(&self) {
        self.kill.send_replace(true);
    }
}

async fn drive(
    plan: LaunchPlan,
    accounts: Arc<AccountList>,
    spawner: Arc<dyn GameSpawner>,
    mut kill_rx: watch::Receiver<bool>,
) -> LaunchOutcome {
    let account = match accounts.resolve(
        plan.account_to_use.as_deref(),
        plan.default_account.as_deref(),
        plan.online,
    ) {
        Ok(account) => account,
        Err(err) => {
            return LaunchOutcome::Failed(LaunchFailureReason::AccountResolution(err.to_string()))
        }
    };

    let request = LaunchRequest {
        instance_id: plan.instance_id,
        account,
        profiler: plan.profiler,
        profiler_args: plan.profiler_args,
        server_to_join: plan.server_to_join,
    };

    let spawned = tokio::select! {
        biased;
        true = kill_requested(&mut kill_rx) => None,
        result = spawner.spawn(&request) => Some(result),
    };

    let mut process = match spawned {
        None => return LaunchOutcome::Failed(LaunchFailureReason::KilledByUser),
        Some(Err(err)) => return LaunchOutcome::Failed(LaunchFailureReason::Spawn(err.to_string())),
        Some(Ok(process)) => process,
    };
    debug!(
        "Instance {} running with pid {:?}",
        request.instance_id,
        process.id()
    );

    let exited = tokio::select! {
        biased;
        true = kill_requested(&mut kill_rx) => None,
        result = process.wait() => Some(result),
    };

    match exited {
        Some(result) => outcome_from_exit(result),
        None => {
            info!("Stopping instance {} on user request", request.instance_id);
            if let Err(err) = process.terminate().await {
                warn!("Terminating {} failed: {}", request.instance_id, err);
            }
            if let Err(err) = process.wait().await {
                warn!("Waiting for {} after kill failed: {}", request.instance_id, err);
            }
            LaunchOutcome::Failed(LaunchFailureReason::KilledByUser)
        }
    }
}

async fn kill_requested(kill_rx: &mut watch::Receiver<bool>) -> bool {
    // A dropped sender means the controller is gone, not a kill.
    kill_rx.wait_for(|requested| *requested).await.is_ok()
}

fn outcome_from_exit(result: crate::core::error::LauncherResult<ProcessExit>) -> LaunchOutcome {
    match result {
        Ok(exit) if exit.success => LaunchOutcome::Succeeded,
        Ok(exit) => LaunchOutcome::Failed(LaunchFailureReason::Crashed { code: exit.code }),
        Err(err) => {
            warn!("Lost track of game process: {}", err);
            LaunchOutcome::Failed(LaunchFailureReason::Crashed { code: None })
        }
    }
}
