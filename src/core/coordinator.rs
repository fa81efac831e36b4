// ─── Application Coordinator ───
// Owns the launcher state and runs the single event loop every other task
// reports into: forwarded invocations, launch completions, window closes and
// requests coming from the UI through a `CoordinatorHandle`.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::core::auth::AccountList;
use crate::core::error::{LaunchRejection, LauncherError};
use crate::core::exit::ExitArbiter;
use crate::core::import::validate_import_archive;
use crate::core::instance::InstanceManager;
use crate::core::intent::{InvocationIntent, ServerTarget};
use crate::core::ipc::{GateOutcome, ServingGate, SingleInstanceGate};
use crate::core::launch::{GameSpawner, LaunchCompletion, LaunchController, LaunchPlan};
use crate::core::registry::InstanceRegistry;
use crate::core::startup::SetupOutcome;
use crate::core::state::{ApplicationState, LauncherPaths, LauncherSettings, Status};
use crate::core::window::{WindowHost, WindowId};

/// Arguments of a launch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub instance_id: String,
    pub online: bool,
    pub profiler: Option<String>,
    pub server_to_join: Option<ServerTarget>,
    pub account_to_use: Option<String>,
}

impl LaunchParams {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            online: true,
            profiler: None,
            server_to_join: None,
            account_to_use: None,
        }
    }

    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }
}

#[derive(Debug)]
pub enum CoordinatorRequest {
    Launch {
        params: LaunchParams,
        reply: oneshot::Sender<bool>,
    },
    Kill {
        instance_id: String,
        reply: oneshot::Sender<bool>,
    },
    SetUpdateRunning(bool),
    CloseCurrentWindow,
}

/// Everything that can wake the coordinator.
#[derive(Debug)]
pub enum CoordinatorEvent {
    Invocation(InvocationIntent),
    LaunchFinished(LaunchCompletion),
    WindowClosed(WindowId),
    Request(CoordinatorRequest),
}

impl From<InvocationIntent> for CoordinatorEvent {
    fn from(intent: InvocationIntent) -> Self {
        CoordinatorEvent::Invocation(intent)
    }
}

impl From<LaunchCompletion> for CoordinatorEvent {
    fn from(completion: LaunchCompletion) -> Self {
        CoordinatorEvent::LaunchFinished(completion)
    }
}

/// Cloneable sender side used by the UI layer and signal handlers.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    update_allowed: watch::Receiver<bool>,
}

impl CoordinatorHandle {
    pub fn window_closed(&self, window: WindowId) {
        let _ = self.events.send(CoordinatorEvent::WindowClosed(window));
    }

    pub fn close_current_window(&self) {
        let _ = self
            .events
            .send(CoordinatorEvent::Request(CoordinatorRequest::CloseCurrentWindow));
    }

    pub fn set_update_running(&self, running: bool) {
        let _ = self
            .events
            .send(CoordinatorEvent::Request(CoordinatorRequest::SetUpdateRunning(running)));
    }

    pub async fn launch(&self, params: LaunchParams) -> bool {
        let (reply, answer) = oneshot::channel();
        let request = CoordinatorRequest::Launch { params, reply };
        if self.events.send(CoordinatorEvent::Request(request)).is_err() {
            return false;
        }
        answer.await.unwrap_or(false)
    }

    pub async fn kill(&self, instance_id: impl Into<String>) -> bool {
        let (reply, answer) = oneshot::channel();
        let request = CoordinatorRequest::Kill {
            instance_id: instance_id.into(),
            reply,
        };
        if self.events.send(CoordinatorEvent::Request(request)).is_err() {
            return false;
        }
        answer.await.unwrap_or(false)
    }

    /// Follows `updates_are_allowed()`.
    pub fn updates_allowed(&self) -> watch::Receiver<bool> {
        self.update_allowed.clone()
    }
}

pub struct ApplicationCoordinator {
    paths: LauncherPaths,
    settings: LauncherSettings,
    accounts: Arc<AccountList>,
    instances: InstanceManager,
    state: ApplicationState,
    registry: InstanceRegistry,
    windows: Box<dyn WindowHost>,
    spawner: Arc<dyn GameSpawner>,
    /// Open windows, most recently focused last.
    open_windows: Vec<WindowId>,
    main_window: Option<WindowId>,
    gate: Option<ServingGate>,
    events_tx: mpsc::UnboundedSender<CoordinatorEvent>,
    events_rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
    update_allowed: watch::Sender<bool>,
    shut_down: bool,
}

impl ApplicationCoordinator {
    pub fn new(
        paths: LauncherPaths,
        windows: Box<dyn WindowHost>,
        spawner: Arc<dyn GameSpawner>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (update_allowed, _) = watch::channel(true);
        let instances = InstanceManager::new(paths.instances_dir());

        Self {
            paths,
            settings: LauncherSettings::default(),
            accounts: Arc::new(AccountList::default()),
            instances,
            state: ApplicationState::new(),
            registry: InstanceRegistry::new(),
            windows,
            spawner,
            open_windows: Vec::new(),
            main_window: None,
            gate: None,
            events_tx,
            events_rx,
            update_allowed,
            shut_down: false,
        }
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            events: self.events_tx.clone(),
            update_allowed: self.update_allowed.subscribe(),
        }
    }

    pub fn state(&self) -> &ApplicationState {
        &self.state
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &LauncherSettings {
        &self.settings
    }

    pub fn main_window(&self) -> Option<WindowId> {
        self.main_window
    }

    /// Single entry point after argument parsing.
    ///
    /// Settles who owns the session, initializes the primary and dispatches
    /// the process's own intent. Returns the resulting startup status.
    pub async fn start(&mut self, intent: InvocationIntent) -> Status {
        let gate = SingleInstanceGate::new(self.paths.socket_path());
        match gate.establish(&intent).await {
            GateOutcome::Primary(listener) => {
                self.gate = Some(ServingGate::serve(listener, self.events_tx.clone()));
            }
            GateOutcome::Forwarded => {
                if let Err(err) = self.state.startup_mut().succeed() {
                    error!("Cannot finish headless startup: {}", err);
                }
                return self.status();
            }
            GateOutcome::Unavailable(err) => {
                warn!("Continuing without single-instance protection: {}", err);
            }
            GateOutcome::Failed(err) => {
                self.fail_startup(
                    "Launcher unreachable",
                    format!("Another launcher is running but did not accept the request: {err}"),
                );
                return self.status();
            }
        }

        if let Err(err) = self.initialize().await {
            match err {
                LauncherError::StartupFailure { title, message } => {
                    self.fail_startup(title, message)
                }
                other => self.fail_startup("Startup error", other.to_string()),
            }
            return self.status();
        }
        if self.status() != Status::Initialized {
            return self.status();
        }

        if intent.live_check {
            self.write_live_check();
        }
        self.handle_incoming_invocation(intent);
        self.status()
    }

    async fn initialize(&mut self) -> Result<(), LauncherError> {
        self.settings = LauncherSettings::load(self.paths.data_dir())?;
        self.accounts = Arc::new(AccountList::load(&self.paths.accounts_path()).map_err(|e| {
            LauncherError::startup("Accounts unreadable", e.to_string())
        })?);

        let setup = if self.settings.first_run_required() {
            info!("First run, starting setup flow");
            let outcome = self.windows.run_setup_flow(&mut self.settings).await;
            if outcome == SetupOutcome::Completed {
                self.settings.setup_completed = true;
                self.settings.save(self.paths.data_dir()).map_err(|e| {
                    LauncherError::startup("Settings not saved", e.to_string())
                })?;
            }
            Some(outcome)
        } else {
            None
        };

        self.state.startup_mut().finish_setup(setup)?;
        if let Some(fatal) = self.state.startup().fatal_error().cloned() {
            self.windows.show_fatal_error(&fatal);
            self.gate = None;
        }
        Ok(())
    }

    /// Moves to `Failed`, tells the user and frees the channel.
    pub fn fail_startup(&mut self, title: impl Into<String>, message: impl Into<String>) {
        if let Err(err) = self.state.startup_mut().fail(title, message) {
            error!("Ignoring late startup failure: {}", err);
            return;
        }
        if let Some(fatal) = self.state.startup().fatal_error().cloned() {
            self.windows.show_fatal_error(&fatal);
        }
        self.gate = None;
    }

    fn write_live_check(&self) {
        let path = self.paths.live_check_path();
        let stamp = chrono::Utc::now().to_rfc3339();
        match std::fs::write(&path, stamp) {
            Ok(()) => debug!("Wrote live check {:?}", path),
            Err(err) => warn!("Cannot write live check {:?}: {}", path, err),
        }
    }

    /// Routes an intent from this process or a forwarded one.
    pub fn handle_incoming_invocation(&mut self, intent: InvocationIntent) {
        if self.status() != Status::Initialized {
            warn!("Ignoring invocation while {:?}", self.status());
            return;
        }
        info!("Handling invocation {:?}", intent);

        let InvocationIntent {
            instance_id,
            server_to_join,
            profile_to_use,
            import_archive_path,
            ..
        } = intent;

        let mut shown = false;
        if let Some(instance_id) = instance_id {
            let params = LaunchParams {
                instance_id,
                online: true,
                profiler: None,
                server_to_join,
                account_to_use: profile_to_use,
            };
            shown = match self.try_launch(params) {
                Ok(()) => true,
                Err(LaunchRejection::AlreadyRunning(instance_id)) => {
                    let window = self.registry.get(&instance_id).and_then(|entry| entry.window);
                    info!("Instance {} is already running", instance_id);
                    match window {
                        Some(window) => {
                            self.focus_window(window);
                            true
                        }
                        None => false,
                    }
                }
                Err(rejection) => {
                    warn!("Invocation launch rejected: {}", rejection);
                    false
                }
            };
        }

        if let Some(archive) = import_archive_path {
            match validate_import_archive(&archive) {
                Ok(entries) => {
                    debug!("Import archive {:?} has {} entries", archive, entries);
                    let window = self.show_main_window();
                    self.windows.show_import(window, &archive);
                }
                Err(err) => warn!("Ignoring import of {:?}: {}", archive, err),
            }
            return;
        }

        if !shown {
            self.show_main_window();
        }
    }

    fn show_main_window(&mut self) -> WindowId {
        if let Some(window) = self.main_window {
            self.focus_window(window);
            return window;
        }
        let window = self.windows.show_main_window(false);
        self.track_window(window);
        self.main_window = Some(window);
        window
    }

    fn focus_window(&mut self, window: WindowId) {
        self.windows.focus_window(window);
        if let Some(index) = self.open_windows.iter().position(|open| *open == window) {
            self.open_windows.remove(index);
            self.open_windows.push(window);
        }
    }

    fn track_window(&mut self, window: WindowId) {
        self.open_windows.push(window);
        self.state.window_opened();
    }

    pub fn launch(&mut self, params: LaunchParams) -> bool {
        let instance_id = params.instance_id.clone();
        match self.try_launch(params) {
            Ok(()) => true,
            Err(rejection) => {
                warn!("Launch of {} rejected: {}", instance_id, rejection);
                false
            }
        }
    }

    pub fn try_launch(&mut self, params: LaunchParams) -> Result<(), LaunchRejection> {
        if self.status() != Status::Initialized {
            return Err(LaunchRejection::NotInitialized);
        }
        if self.registry.is_running(&params.instance_id) {
            return Err(LaunchRejection::AlreadyRunning(params.instance_id));
        }
        if !self.instances.exists(&params.instance_id) {
            return Err(LaunchRejection::UnknownInstance(params.instance_id));
        }

        let (profiler, profiler_args) = match self.settings.resolve_profiler(params.profiler.as_deref()) {
            Some((name, config)) => (Some(name), config.jvm_args),
            None => (None, Vec::new()),
        };
        let plan = LaunchPlan {
            instance_id: params.instance_id.clone(),
            online: params.online,
            profiler,
            profiler_args,
            server_to_join: params.server_to_join,
            account_to_use: params.account_to_use,
            default_account: self.settings.default_account.clone(),
        };

        let window = if self.settings.show_instance_window {
            let window = self.windows.create_window_for(&params.instance_id);
            self.track_window(window);
            Some(window)
        } else {
            None
        };

        let controller = LaunchController::start(
            plan,
            self.accounts.clone(),
            self.spawner.clone(),
            self.events_tx.clone(),
        );
        if let Err(controller) = self.registry.insert(controller, window) {
            // Unreachable on the coordinator task; keep the books straight anyway.
            controller.request_kill();
            if let Some(window) = window {
                self.windows.close_window(window);
                self.on_window_closed(window);
            }
            return Err(LaunchRejection::AlreadyRunning(params.instance_id));
        }

        if self.state.add_running_instance() {
            self.publish_update_allowed();
        }
        info!(
            "Launching {} ({} running)",
            params.instance_id,
            self.state.running_instances()
        );
        Ok(())
    }

    /// True iff the instance was running. The kill itself completes later.
    pub fn kill(&mut self, instance_id: &str) -> bool {
        let found = self.registry.request_kill(instance_id);
        if found {
            info!("Kill requested for {}", instance_id);
        } else {
            debug!("Kill requested for {} which is not running", instance_id);
        }
        found
    }

    fn on_launch_finished(&mut self, completion: LaunchCompletion) {
        let Some(entry) = self
            .registry
            .remove_completed(&completion.instance_id, completion.token)
        else {
            debug!("Dropping stale completion for {}", completion.instance_id);
            return;
        };

        if self.state.sub_running_instance() {
            self.publish_update_allowed();
        }
        self.windows
            .notify_instance_finished(&completion.instance_id, entry.window, &completion.outcome);
    }

    fn on_window_closed(&mut self, window: WindowId) {
        let Some(index) = self.open_windows.iter().position(|open| *open == window) else {
            debug!("Ignoring close of unknown window {:?}", window);
            return;
        };
        self.open_windows.remove(index);
        self.state.window_closed();
        if self.main_window == Some(window) {
            self.main_window = None;
        }
        if let Some(instance_id) = self.registry.detach_window(window) {
            debug!("Window of running instance {} closed", instance_id);
        }
    }

    /// Closes the most recently opened or focused window still open.
    pub fn close_current_window(&mut self) {
        match self.open_windows.last().copied() {
            Some(window) => {
                self.windows.close_window(window);
                self.on_window_closed(window);
            }
            None => debug!("No open window to close"),
        }
    }

    pub fn set_update_running(&mut self, running: bool) {
        self.state.set_update_running(running);
        self.publish_update_allowed();
    }

    pub fn updates_are_allowed(&self) -> bool {
        self.state.updates_are_allowed()
    }

    fn publish_update_allowed(&self) {
        let allowed = self.state.updates_are_allowed();
        self.update_allowed.send_if_modified(|current| {
            if *current == allowed {
                return false;
            }
            *current = allowed;
            true
        });
    }

    pub fn should_exit_now(&self) -> bool {
        ExitArbiter::should_exit_now(&self.state)
    }

    /// Waits for one event and applies it. Returns false if none can arrive.
    pub async fn handle_next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Invocation(intent) => self.handle_incoming_invocation(intent),
            CoordinatorEvent::LaunchFinished(completion) => self.on_launch_finished(completion),
            CoordinatorEvent::WindowClosed(window) => self.on_window_closed(window),
            CoordinatorEvent::Request(request) => match request {
                CoordinatorRequest::Launch { params, reply } => {
                    let _ = reply.send(self.launch(params));
                }
                CoordinatorRequest::Kill { instance_id, reply } => {
                    let _ = reply.send(self.kill(&instance_id));
                }
                CoordinatorRequest::SetUpdateRunning(running) => self.set_update_running(running),
                CoordinatorRequest::CloseCurrentWindow => self.close_current_window(),
            },
        }
    }

    /// Runs until the exit arbiter agrees, then shuts down. Returns the
    /// process exit code.
    pub async fn run(mut self) -> i32 {
        while self.status() != Status::Failed && !self.should_exit_now() {
            if !self.handle_next_event().await {
                break;
            }
        }
        self.shutdown();
        self.exit_code()
    }

    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if self.status() == Status::Initialized {
            if let Err(err) = self.settings.save(self.paths.data_dir()) {
                warn!("Cannot flush launcher settings: {}", err);
            }
        }
        self.gate = None;
        info!(
            "Launcher shutting down after {} ms ({:?})",
            self.state.time_since_start(),
            self.status()
        );
    }

    pub fn exit_code(&self) -> i32 {
        match self.status() {
            Status::Failed => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests;
