use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use super::*;
use crate::core::auth::{AccountMode, LaunchAccountProfile};
use crate::core::instance::Instance;
use crate::core::launch::controller::testing::FakeSpawner;
use crate::core::launch::{LaunchFailureReason, LaunchOutcome};
use crate::core::startup::FatalError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum WindowCall {
    Main(WindowId),
    Instance(String, WindowId),
    Focus(WindowId),
    Close(WindowId),
    Import(PathBuf),
    Finished(String, LaunchOutcome),
    Fatal(String),
    Setup,
}

#[derive(Default)]
struct WindowLog {
    next: u64,
    calls: Vec<WindowCall>,
    setup_outcome: Option<SetupOutcome>,
}

struct RecordingWindows(Arc<Mutex<WindowLog>>);

impl RecordingWindows {
    fn allocate(&self) -> WindowId {
        let mut log = self.0.lock().unwrap();
        log.next += 1;
        WindowId(log.next)
    }

    fn record(&self, call: WindowCall) {
        self.0.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl WindowHost for RecordingWindows {
    fn show_main_window(&mut self, _minimized: bool) -> WindowId {
        let id = self.allocate();
        self.record(WindowCall::Main(id));
        id
    }

    fn create_window_for(&mut self, instance_id: &str) -> WindowId {
        let id = self.allocate();
        self.record(WindowCall::Instance(instance_id.to_string(), id));
        id
    }

    fn focus_window(&mut self, window: WindowId) {
        self.record(WindowCall::Focus(window));
    }

    fn close_window(&mut self, window: WindowId) {
        self.record(WindowCall::Close(window));
    }

    fn show_import(&mut self, _window: WindowId, archive: &Path) {
        self.record(WindowCall::Import(archive.to_path_buf()));
    }

    fn notify_instance_finished(
        &mut self,
        instance_id: &str,
        _window: Option<WindowId>,
        outcome: &LaunchOutcome,
    ) {
        self.record(WindowCall::Finished(instance_id.to_string(), outcome.clone()));
    }

    fn show_fatal_error(&mut self, error: &FatalError) {
        self.record(WindowCall::Fatal(error.title.clone()));
    }

    async fn run_setup_flow(&mut self, _settings: &mut LauncherSettings) -> SetupOutcome {
        self.record(WindowCall::Setup);
        self.0
            .lock()
            .unwrap()
            .setup_outcome
            .clone()
            .unwrap_or(SetupOutcome::Completed)
    }
}

struct Fixture {
    dir: TempDir,
    spawner: Arc<FakeSpawner>,
    log: Arc<Mutex<WindowLog>>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            spawner: Arc::new(FakeSpawner::default()),
            log: Arc::new(Mutex::new(WindowLog::default())),
        }
    }

    /// Setup done, one online-capable default account.
    fn configured(show_instance_window: bool) -> Self {
        let fixture = Self::new();
        LauncherSettings {
            setup_completed: true,
            show_instance_window,
            default_account: Some("Alex".into()),
            ..Default::default()
        }
        .save(fixture.dir.path())
        .unwrap();
        let accounts = AccountList {
            accounts: vec![LaunchAccountProfile {
                mode: AccountMode::Microsoft,
                username: "Alex".into(),
                uuid: "a1".into(),
                access_token: "token".into(),
            }],
        };
        std::fs::write(
            fixture.paths().accounts_path(),
            serde_json::to_string(&accounts).unwrap(),
        )
        .unwrap();
        fixture
    }

    fn paths(&self) -> LauncherPaths {
        LauncherPaths::new(self.dir.path())
    }

    fn add_instance(&self, id: &str) {
        let instances_dir = self.paths().instances_dir();
        let mut instance = Instance::new(id.into(), vec!["java".into()], &instances_dir);
        instance.id = id.into();
        instance.path = instances_dir.join(id);
        std::fs::create_dir_all(&instance.path).unwrap();
        std::fs::write(
            instance.config_path(),
            serde_json::to_string(&instance).unwrap(),
        )
        .unwrap();
    }

    fn coordinator(&self) -> ApplicationCoordinator {
        ApplicationCoordinator::new(
            self.paths(),
            Box::new(RecordingWindows(self.log.clone())),
            self.spawner.clone(),
        )
    }

    fn calls(&self) -> Vec<WindowCall> {
        self.log.lock().unwrap().calls.clone()
    }
}

async fn wait_spawned(spawner: &FakeSpawner, id: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !spawner.is_spawned(id) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("instance never spawned");
}

async fn next_event(coordinator: &mut ApplicationCoordinator) {
    tokio::time::timeout(Duration::from_secs(5), coordinator.handle_next_event())
        .await
        .expect("no event arrived");
}

fn assert_counts_consistent(coordinator: &ApplicationCoordinator) {
    assert_eq!(
        coordinator.state().running_instances(),
        coordinator.registry().len()
    );
}

#[tokio::test]
async fn primary_start_initializes_and_shows_main_window() {
    let fx = Fixture::configured(true);
    let mut coordinator = fx.coordinator();

    assert_eq!(coordinator.start(InvocationIntent::default()).await, Status::Initialized);
    assert!(coordinator.main_window().is_some());
    assert_eq!(coordinator.state().open_windows(), 1);
    assert!(!coordinator.should_exit_now());
    assert!(fx.paths().socket_path().exists());
}

#[tokio::test]
async fn first_run_setup_is_persisted() {
    let fx = Fixture::new();
    let mut coordinator = fx.coordinator();

    assert_eq!(coordinator.start(InvocationIntent::default()).await, Status::Initialized);
    assert_eq!(fx.calls().first(), Some(&WindowCall::Setup));
    assert!(LauncherSettings::load(fx.dir.path()).unwrap().setup_completed);
}

#[tokio::test]
async fn cancelled_setup_fails_and_releases_channel() {
    let fx = Fixture::new();
    fx.log.lock().unwrap().setup_outcome = Some(SetupOutcome::Cancelled);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();

    assert_eq!(coordinator.start(InvocationIntent::default()).await, Status::Failed);
    assert!(fx.calls().contains(&WindowCall::Fatal("Setup cancelled".into())));
    assert!(!fx.paths().socket_path().exists());
    assert!(!coordinator.launch(LaunchParams::new("a")));
    assert_eq!(coordinator.run().await, 1);
}

#[tokio::test]
async fn corrupt_settings_fail_startup_and_block_launches() {
    let fx = Fixture::new();
    fx.add_instance("a");
    std::fs::write(fx.dir.path().join("launcher_settings.json"), "{").unwrap();
    let mut coordinator = fx.coordinator();

    assert_eq!(coordinator.start(InvocationIntent::default()).await, Status::Failed);
    assert!(fx.calls().contains(&WindowCall::Fatal("Settings corrupt".into())));
    assert!(!coordinator.launch(LaunchParams::new("a")));
    assert!(coordinator.registry().is_empty());
}

#[tokio::test]
async fn launch_before_start_is_rejected() {
    let fx = Fixture::configured(true);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();

    assert_eq!(
        coordinator.try_launch(LaunchParams::new("a")),
        Err(LaunchRejection::NotInitialized)
    );
}

#[tokio::test]
async fn duplicate_launch_is_rejected() {
    let fx = Fixture::configured(true);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;

    assert!(coordinator.launch(LaunchParams::new("a")));
    assert_eq!(
        coordinator.try_launch(LaunchParams::new("a")),
        Err(LaunchRejection::AlreadyRunning("a".into()))
    );
    assert_eq!(coordinator.registry().len(), 1);
    assert_counts_consistent(&coordinator);
}

#[tokio::test]
async fn unknown_instance_is_rejected() {
    let fx = Fixture::configured(true);
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;

    assert_eq!(
        coordinator.try_launch(LaunchParams::new("ghost")),
        Err(LaunchRejection::UnknownInstance("ghost".into()))
    );
    assert_eq!(coordinator.state().running_instances(), 0);
}

#[tokio::test]
async fn kill_of_unknown_instance_changes_nothing() {
    let fx = Fixture::configured(true);
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;
    let windows_before = coordinator.state().open_windows();

    assert!(!coordinator.kill("ghost"));
    assert_eq!(coordinator.state().running_instances(), 0);
    assert_eq!(coordinator.state().open_windows(), windows_before);
    assert!(coordinator.registry().is_empty());
}

#[tokio::test]
async fn headless_launch_exits_after_completion() {
    let fx = Fixture::configured(false);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();
    let mut allowed = coordinator.handle().updates_allowed();

    coordinator.start(InvocationIntent::launch("a")).await;
    assert!(coordinator.main_window().is_none());
    assert_eq!(coordinator.state().running_instances(), 1);
    assert!(!coordinator.updates_are_allowed());
    assert!(!*allowed.borrow_and_update());
    assert!(!coordinator.should_exit_now());

    wait_spawned(&fx.spawner, "a").await;
    fx.spawner.finish("a", true);
    next_event(&mut coordinator).await;

    assert_eq!(coordinator.state().running_instances(), 0);
    assert!(coordinator.registry().is_empty());
    assert!(coordinator.updates_are_allowed());
    assert!(*allowed.borrow_and_update());
    assert!(coordinator.should_exit_now());
    assert!(fx
        .calls()
        .contains(&WindowCall::Finished("a".into(), LaunchOutcome::Succeeded)));
    assert_eq!(coordinator.run().await, 0);
    assert!(!fx.paths().socket_path().exists());
}

#[tokio::test]
async fn updates_stay_blocked_while_an_update_runs() {
    let fx = Fixture::configured(true);
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;

    coordinator.set_update_running(true);
    assert!(!coordinator.updates_are_allowed());
    coordinator.set_update_running(false);
    assert!(coordinator.updates_are_allowed());
}

#[tokio::test]
async fn kill_completes_as_killed_by_user() {
    let fx = Fixture::configured(true);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;

    assert!(coordinator.launch(LaunchParams::new("a")));
    wait_spawned(&fx.spawner, "a").await;
    assert!(coordinator.kill("a"));
    // Still registered until the completion arrives.
    assert!(coordinator.registry().is_running("a"));

    next_event(&mut coordinator).await;
    assert!(coordinator.registry().is_empty());
    assert!(fx.calls().contains(&WindowCall::Finished(
        "a".into(),
        LaunchOutcome::Failed(LaunchFailureReason::KilledByUser)
    )));
    assert_counts_consistent(&coordinator);
}

#[tokio::test]
async fn counts_track_registry_across_interleaved_completions() {
    let fx = Fixture::configured(false);
    for id in ["a", "b", "c"] {
        fx.add_instance(id);
    }
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;

    for id in ["a", "b", "c"] {
        assert!(coordinator.launch(LaunchParams::new(id)));
        assert_counts_consistent(&coordinator);
    }
    for id in ["a", "b", "c"] {
        wait_spawned(&fx.spawner, id).await;
    }

    for (id, remaining) in [("b", 2), ("a", 1), ("c", 0)] {
        fx.spawner.finish(id, id != "a");
        next_event(&mut coordinator).await;
        assert!(!coordinator.registry().is_running(id));
        assert_eq!(coordinator.registry().len(), remaining);
        assert_counts_consistent(&coordinator);
    }
}

#[tokio::test]
async fn account_failure_rolls_back_counts() {
    let fx = Fixture::configured(false);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;

    let mut params = LaunchParams::new("a");
    params.account_to_use = Some("Nobody".into());
    assert!(coordinator.launch(params));
    next_event(&mut coordinator).await;

    assert_eq!(coordinator.state().running_instances(), 0);
    assert!(matches!(
        fx.calls().last(),
        Some(WindowCall::Finished(_, LaunchOutcome::Failed(LaunchFailureReason::AccountResolution(_))))
    ));
}

#[tokio::test]
async fn server_and_profile_reach_the_game() {
    let fx = Fixture::configured(false);
    fx.add_instance("survival1");
    let mut coordinator = fx.coordinator();

    let intent = InvocationIntent {
        instance_id: Some("survival1".into()),
        server_to_join: Some("play.example.org".parse().unwrap()),
        profile_to_use: Some("alex".into()),
        ..Default::default()
    };
    coordinator.start(intent).await;
    wait_spawned(&fx.spawner, "survival1").await;

    let requests = fx.spawner.requests();
    let request = &requests[0];
    assert_eq!(request.account.username, "Alex");
    assert_eq!(request.server_to_join.as_ref().unwrap().port, 25565);
}

#[tokio::test]
async fn instance_window_outlives_the_instance() {
    let fx = Fixture::configured(true);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::launch("a")).await;

    let window = coordinator.registry().get("a").unwrap().window.unwrap();
    assert_eq!(coordinator.state().open_windows(), 1);

    wait_spawned(&fx.spawner, "a").await;
    fx.spawner.finish("a", false);
    next_event(&mut coordinator).await;
    assert!(!coordinator.should_exit_now());

    coordinator.handle().window_closed(window);
    next_event(&mut coordinator).await;
    assert!(coordinator.should_exit_now());

    // A repeated close notification is ignored.
    coordinator.handle().window_closed(window);
    next_event(&mut coordinator).await;
    assert_eq!(coordinator.state().open_windows(), 0);
}

#[tokio::test]
async fn closing_current_window_lets_run_finish() {
    let fx = Fixture::configured(true);
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;
    let main = coordinator.main_window().unwrap();

    coordinator.handle().close_current_window();
    assert_eq!(coordinator.run().await, 0);
    assert!(fx.calls().contains(&WindowCall::Close(main)));
    assert!(!fx.paths().socket_path().exists());
}

#[tokio::test]
async fn repeated_activation_focuses_existing_main_window() {
    let fx = Fixture::configured(true);
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;
    let main = coordinator.main_window().unwrap();

    coordinator.handle_incoming_invocation(InvocationIntent::default());
    assert!(fx.calls().contains(&WindowCall::Focus(main)));
    assert_eq!(coordinator.state().open_windows(), 1);
}

#[tokio::test]
async fn unknown_instance_invocation_falls_back_to_main_window() {
    let fx = Fixture::configured(true);
    let mut coordinator = fx.coordinator();

    assert_eq!(
        coordinator.start(InvocationIntent::launch("typo")).await,
        Status::Initialized
    );
    let main = coordinator.main_window().expect("main window shown");
    assert_eq!(fx.calls(), vec![WindowCall::Main(main)]);
    assert_eq!(coordinator.state().open_windows(), 1);
    assert!(coordinator.registry().is_empty());
    assert!(!coordinator.should_exit_now());
}

#[tokio::test]
async fn relaunching_running_instance_focuses_its_window() {
    let fx = Fixture::configured(true);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::launch("a")).await;
    let window = coordinator.registry().get("a").unwrap().window.unwrap();

    coordinator.handle_incoming_invocation(InvocationIntent::launch("a"));

    assert!(fx.calls().contains(&WindowCall::Focus(window)));
    assert!(coordinator.main_window().is_none());
    assert_eq!(coordinator.state().open_windows(), 1);
    assert_eq!(coordinator.registry().len(), 1);
    assert_counts_consistent(&coordinator);
}

#[tokio::test]
async fn relaunching_windowless_instance_shows_main_window() {
    let fx = Fixture::configured(false);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::launch("a")).await;
    assert!(coordinator.main_window().is_none());

    coordinator.handle_incoming_invocation(InvocationIntent::launch("a"));

    assert!(coordinator.main_window().is_some());
    assert_eq!(coordinator.registry().len(), 1);
}

#[tokio::test]
async fn close_current_window_closes_a_lone_instance_window() {
    let fx = Fixture::configured(true);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::launch("a")).await;
    let window = coordinator.registry().get("a").unwrap().window.unwrap();

    wait_spawned(&fx.spawner, "a").await;
    fx.spawner.finish("a", true);
    next_event(&mut coordinator).await;
    assert!(!coordinator.should_exit_now());

    coordinator.close_current_window();
    assert!(fx.calls().contains(&WindowCall::Close(window)));
    assert_eq!(coordinator.state().open_windows(), 0);
    assert!(coordinator.should_exit_now());
}

#[tokio::test]
async fn close_current_window_follows_focus_order() {
    let fx = Fixture::configured(true);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;
    let main = coordinator.main_window().unwrap();
    assert!(coordinator.launch(LaunchParams::new("a")));
    let instance_window = coordinator.registry().get("a").unwrap().window.unwrap();

    // Refocusing the main window puts it on top again.
    coordinator.handle_incoming_invocation(InvocationIntent::default());
    coordinator.close_current_window();
    assert_eq!(fx.calls().last(), Some(&WindowCall::Close(main)));
    assert!(coordinator.main_window().is_none());

    coordinator.close_current_window();
    assert_eq!(fx.calls().last(), Some(&WindowCall::Close(instance_window)));
    assert!(coordinator.registry().get("a").unwrap().window.is_none());
    assert_eq!(coordinator.state().open_windows(), 0);

    // Nothing left to close.
    coordinator.close_current_window();
    assert_eq!(coordinator.state().open_windows(), 0);
}

#[tokio::test]
async fn handle_requests_are_answered_by_the_loop() {
    let fx = Fixture::configured(false);
    fx.add_instance("a");
    let mut coordinator = fx.coordinator();
    coordinator.start(InvocationIntent::default()).await;

    let handle = coordinator.handle();
    let launch = tokio::spawn(async move { handle.launch(LaunchParams::new("a")).await });
    next_event(&mut coordinator).await;
    assert!(launch.await.unwrap());

    let handle = coordinator.handle();
    let kill = tokio::spawn(async move { handle.kill("missing").await });
    next_event(&mut coordinator).await;
    assert!(!kill.await.unwrap());
}

#[tokio::test]
async fn live_check_is_written_on_startup() {
    let fx = Fixture::configured(true);
    let mut coordinator = fx.coordinator();
    let intent = InvocationIntent {
        live_check: true,
        ..Default::default()
    };
    coordinator.start(intent).await;
    assert!(fx.paths().live_check_path().exists());
}

#[tokio::test]
async fn valid_import_opens_main_window_with_archive() {
    let fx = Fixture::configured(true);
    let archive = fx.dir.path().join("pack.zip");
    let mut writer = zip::ZipWriter::new(std::fs::File::create(&archive).unwrap());
    writer
        .start_file("instance.cfg", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"name=Pack").unwrap();
    writer.finish().unwrap();

    let mut coordinator = fx.coordinator();
    let intent = InvocationIntent {
        import_archive_path: Some(archive.clone()),
        ..Default::default()
    };
    coordinator.start(intent).await;

    assert!(coordinator.main_window().is_some());
    assert!(fx.calls().contains(&WindowCall::Import(archive)));
}

#[cfg(unix)]
#[tokio::test]
async fn secondary_forwards_intent_and_exits() {
    let fx = Fixture::configured(false);
    fx.add_instance("survival1");
    let mut primary = fx.coordinator();
    assert_eq!(primary.start(InvocationIntent::default()).await, Status::Initialized);

    let secondary_log = Arc::new(Mutex::new(WindowLog::default()));
    let mut secondary = ApplicationCoordinator::new(
        fx.paths(),
        Box::new(RecordingWindows(secondary_log.clone())),
        Arc::new(FakeSpawner::default()),
    );
    let status = secondary.start(InvocationIntent::launch("survival1")).await;
    assert_eq!(status, Status::Succeeded);
    assert!(secondary.should_exit_now());
    assert!(secondary_log.lock().unwrap().calls.is_empty());
    assert_eq!(secondary.run().await, 0);

    next_event(&mut primary).await;
    assert!(primary.registry().is_running("survival1"));
    wait_spawned(&fx.spawner, "survival1").await;
    // The secondary exiting must not take the primary's channel with it.
    assert!(fx.paths().socket_path().exists());
}
