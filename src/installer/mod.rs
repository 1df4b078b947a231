//! Installation orchestrator
//!
//! Runs one install or update through its stages:
//! 1. Prepare  — recreate the scratch workspace
//! 2. Fetch    — stream the channel's archive into the workspace (0-50%)
//! 3. Extract  — unpack into the workspace staging directory (75%)
//! 4. Merge    — copy the payload into the destination (75-95%)
//! 5. Cleanup  — remove the workspace, whatever happened above
//! 6. Portable — create `data/` for portable installs (warnings only)
//!
//! The cancellation token is checked at the top of every stage, before each
//! downloaded chunk is written and before each top-level merge entry. A run
//! that observed cancellation always reports `Cancelled`, even if a stage
//! failed at the same time.

pub mod config;
pub mod merge;
pub mod progress;
pub mod workspace;

pub use config::{Channel, ConfigError, InstallRequest, InstallerConfig, OperationKind};
pub use merge::{merge_directory, MergeStats};
pub use progress::{
    EventCallback, InstallEvent, InstallState, OperationOutcome, ProgressEvent, Reporter,
};
pub use workspace::TempWorkspace;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::archive::extract_archive;
use crate::downloaders::{fetch_archive, HttpClient, FETCH_PROGRESS_END};
use crate::error::{ErrorKind, StageError, StageResult};
use crate::paths;
use merge::{MERGE_PROGRESS_SPAN, MERGE_PROGRESS_START};

/// Reasons an operation could not be started
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Another install or update is already running")]
    Busy,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Main installer orchestrator.
///
/// Cloning shares the "operation in progress" flag, so clones still accept
/// only one operation at a time.
#[derive(Debug, Clone)]
pub struct Installer {
    config: InstallerConfig,
    client: HttpClient,
    active: Arc<AtomicBool>,
}

/// Marks the installer busy until dropped
struct ActiveGuard(Arc<AtomicBool>);

impl ActiveGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, InstallError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| InstallError::Busy)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A running operation: its event stream, its cancel switch and its result
pub struct InstallHandle {
    events: mpsc::UnboundedReceiver<InstallEvent>,
    cancel: CancellationToken,
    task: JoinHandle<OperationOutcome>,
}

impl InstallHandle {
    /// Request cancellation. Repeated calls have no further effect.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event in production order; `None` once the operation has ended
    /// and every event was delivered.
    pub async fn next_event(&mut self) -> Option<InstallEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`Self::next_event`] for polling hosts
    pub fn try_next_event(&mut self) -> Option<InstallEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the terminal outcome
    pub async fn wait(self) -> OperationOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => OperationOutcome::Failed {
                kind: ErrorKind::UnexpectedFailure,
                detail: format!("Install task failed: {}", e),
            },
        }
    }
}

impl Installer {
    /// Create a new installer with the given configuration
    pub fn new(config: InstallerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            client: HttpClient::new()?,
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Whether an operation is currently running
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start an operation on its own task.
    ///
    /// Fails with [`InstallError::Busy`] while another operation is running.
    pub fn start(&self, request: InstallRequest) -> Result<InstallHandle, InstallError> {
        request.validate()?;
        let guard = ActiveGuard::acquire(&self.active)?;

        let (reporter, events) = Reporter::channel();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let installer = self.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            installer.execute(&request, &reporter, &task_cancel).await
        });

        Ok(InstallHandle {
            events,
            cancel,
            task,
        })
    }

    /// Run an operation on the current task, reporting through `reporter`.
    pub async fn run(
        &self,
        request: &InstallRequest,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> Result<OperationOutcome, InstallError> {
        request.validate()?;
        let _guard = ActiveGuard::acquire(&self.active)?;
        Ok(self.execute(request, reporter, cancel).await)
    }

    async fn execute(
        &self,
        request: &InstallRequest,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        info!(
            "{} VS Code ({}) into {}",
            request.kind.verb(),
            request.channel,
            request.destination.display()
        );
        reporter.message(format!("{} VS Code...", request.kind.verb()));

        let outcome = match self.pipeline(request, reporter, cancel).await {
            Ok(()) => {
                reporter.progress(100, "Core operation successful!");
                reporter.state(InstallState::Done);
                OperationOutcome::Success
            }
            Err(StageError::Failed { kind, detail }) if !cancel.is_cancelled() => {
                error!("{}: {}", kind, detail);
                reporter.reset(format!("Operation failed: {}: {}", kind, detail));
                reporter.state(InstallState::Failed);
                OperationOutcome::Failed { kind, detail }
            }
            Err(_) => {
                info!("Operation cancelled");
                reporter.reset("Operation cancelled by user.");
                reporter.state(InstallState::Cancelled);
                OperationOutcome::Cancelled
            }
        };

        reporter.finished(outcome.clone());
        outcome
    }

    async fn pipeline(
        &self,
        request: &InstallRequest,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> StageResult<()> {
        reporter.state(InstallState::Preparing);
        checkpoint(cancel)?;
        let workspace = TempWorkspace::acquire(&self.config.workspace_dir, reporter)?;

        let staged = self.place_payload(&workspace, request, reporter, cancel).await;
        workspace.release(reporter);
        staged?;

        if request.wants_portable_layout() {
            checkpoint(cancel)?;
            reporter.state(InstallState::FinalizingPortable);
            finalize_portable(&request.destination, reporter);
        }

        checkpoint(cancel)
    }

    /// Fetch, extract and merge. The caller releases the workspace.
    async fn place_payload(
        &self,
        workspace: &TempWorkspace,
        request: &InstallRequest,
        reporter: &Reporter,
        cancel: &CancellationToken,
    ) -> StageResult<()> {
        reporter.state(InstallState::Fetching);
        checkpoint(cancel)?;
        reporter.message("Downloading VS Code...");
        let archive = workspace.archive_path();
        let url = self.config.endpoints.url_for(request.channel);
        fetch_archive(&self.client, url, &archive, reporter, cancel).await?;
        reporter.progress(FETCH_PROGRESS_END, "Download complete.");

        reporter.state(InstallState::Extracting);
        checkpoint(cancel)?;
        reporter.message("Extracting files...");
        let staging = workspace.staging_dir();
        let extracted = {
            let archive = archive.clone();
            let staging = staging.clone();
            run_blocking(move || {
                extract_archive(&archive, &staging)
                    .map_err(|e| StageError::failed(ErrorKind::ExtractionFailure, e.to_string()))
            })
            .await
        };
        match tokio::fs::remove_file(&archive).await {
            Ok(()) => reporter.message("Temporary zip file removed."),
            Err(e) => reporter.warning(format!(
                "Warning: Could not remove temporary zip file: {}",
                e
            )),
        }
        extracted?;
        checkpoint(cancel)?;
        reporter.progress(MERGE_PROGRESS_START, "Extraction complete.");

        reporter.state(InstallState::Merging);
        checkpoint(cancel)?;
        reporter.message("Moving files to installation directory...");
        {
            let destination = request.destination.clone();
            let reporter = reporter.clone();
            let cancel = cancel.clone();
            run_blocking(move || merge_directory(&staging, &destination, &reporter, &cancel))
                .await?;
        }
        checkpoint(cancel)?;
        reporter.progress(MERGE_PROGRESS_START + MERGE_PROGRESS_SPAN, "File move complete.");

        Ok(())
    }
}

/// Stage boundary: stop here if cancellation was requested
fn checkpoint(cancel: &CancellationToken) -> StageResult<()> {
    if cancel.is_cancelled() {
        Err(StageError::Cancelled)
    } else {
        Ok(())
    }
}

/// Run a blocking stage on the blocking pool
async fn run_blocking<T, F>(f: F) -> StageResult<T>
where
    F: FnOnce() -> StageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        StageError::failed(
            ErrorKind::UnexpectedFailure,
            format!("Worker task failed: {}", e),
        )
    })?
}

/// Ensure `<destination>/data` exists. The install is already complete, so
/// failures are only warnings.
fn finalize_portable(destination: &Path, reporter: &Reporter) {
    reporter.message("Creating 'data' folder for portable mode...");
    let data = paths::data_dir(destination);
    match fs::create_dir_all(&data) {
        Ok(()) => reporter.message("'data' folder created/ensured."),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => reporter.warning(format!(
            "Warning: PERMISSION ERROR creating 'data' folder: {}. Check permissions.",
            e
        )),
        Err(e) => reporter.warning(format!("Warning: Error creating 'data' folder: {}.", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{detect_installation, Detection, INSIDER_MARKER, STABLE_MARKER};
    use crate::downloaders::Endpoints;
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};
    use walkdir::WalkDir;

    fn build_zip(files: &[(&str, String)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn stable_zip(version: &str) -> Vec<u8> {
        build_zip(&[
            (STABLE_MARKER, format!("code {}", version)),
            ("bin/code.cmd", "@echo off".to_string()),
            ("resources/app/package.json", format!("{{\"version\":\"{}\"}}", version)),
        ])
    }

    fn insider_zip(version: &str) -> Vec<u8> {
        build_zip(&[
            (INSIDER_MARKER, format!("insiders {}", version)),
            ("resources/app/package.json", format!("{{\"version\":\"{}\"}}", version)),
        ])
    }

    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|e| e.unwrap())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
                let data = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
                (rel, data)
            })
            .collect()
    }

    struct TestEnv {
        _dir: TempDir,
        server: mockito::ServerGuard,
        workspace: PathBuf,
        destination: PathBuf,
    }

    impl TestEnv {
        async fn new() -> Self {
            let dir = tempdir().unwrap();
            let destination = dir.path().join("VSCode");
            fs::create_dir_all(&destination).unwrap();
            Self {
                server: mockito::Server::new_async().await,
                workspace: dir.path().join("app").join("temp"),
                destination,
                _dir: dir,
            }
        }

        fn installer(&self) -> Installer {
            Installer::new(InstallerConfig {
                endpoints: Endpoints {
                    stable: format!("{}/stable", self.server.url()),
                    insider: format!("{}/insider", self.server.url()),
                },
                workspace_dir: self.workspace.clone(),
            })
            .unwrap()
        }

        async fn serve(&mut self, path: &str, body: Vec<u8>) -> mockito::Mock {
            self.server
                .mock("GET", path)
                .with_status(200)
                .with_body(body)
                .create_async()
                .await
        }
    }

    fn recording_reporter() -> (Reporter, Arc<Mutex<Vec<InstallEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = Reporter::new(Arc::new(move |event: InstallEvent| {
            sink.lock().unwrap().push(event)
        }));
        (reporter, events)
    }

    fn progress_of(events: &[InstallEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                InstallEvent::Progress(p) => Some(p.percent),
                _ => None,
            })
            .collect()
    }

    fn states_of(events: &[InstallEvent]) -> Vec<InstallState> {
        events
            .iter()
            .filter_map(|e| match e {
                InstallEvent::State(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    async fn drain(handle: &mut InstallHandle) -> Vec<InstallEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_fresh_portable_install_succeeds() {
        let mut env = TestEnv::new().await;
        let mock = env.serve("/stable", stable_zip("1.90.0")).await;
        let installer = env.installer();

        let request = InstallRequest::install(&env.destination, Channel::Stable, true);
        let mut handle = installer.start(request).unwrap();
        let events = drain(&mut handle).await;
        let outcome = handle.wait().await;

        mock.assert_async().await;
        assert_eq!(outcome, OperationOutcome::Success);
        assert_eq!(events.last(), Some(&InstallEvent::Finished(OperationOutcome::Success)));

        let percents = progress_of(&events);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
        assert_eq!(percents.last(), Some(&100));

        assert_eq!(
            states_of(&events),
            vec![
                InstallState::Preparing,
                InstallState::Fetching,
                InstallState::Extracting,
                InstallState::Merging,
                InstallState::FinalizingPortable,
                InstallState::Done,
            ]
        );

        assert_eq!(
            fs::read_to_string(env.destination.join(STABLE_MARKER)).unwrap(),
            "code 1.90.0"
        );
        assert!(env.destination.join("bin/code.cmd").is_file());
        assert!(env.destination.join("resources/app/package.json").is_file());
        assert!(env.destination.join("data").is_dir());
        assert!(!env.destination.join("vscode.zip").exists());
        assert!(!env.workspace.exists());
        assert!(!installer.is_busy());
    }

    #[tokio::test]
    async fn test_update_of_insider_install_overwrites_in_place() {
        let mut env = TestEnv::new().await;
        fs::write(env.destination.join(INSIDER_MARKER), b"insiders 1.0").unwrap();
        fs::create_dir_all(env.destination.join("resources/app")).unwrap();
        fs::write(env.destination.join("resources/app/package.json"), b"old").unwrap();
        fs::write(env.destination.join("notes.txt"), b"mine").unwrap();

        let stable = env
            .server
            .mock("GET", "/stable")
            .expect(0)
            .create_async()
            .await;
        let insider = env.serve("/insider", insider_zip("2.0")).await;

        let detection = detect_installation(&env.destination).unwrap();
        assert_eq!(detection, Detection::existing(Channel::Insider));

        let mut request = InstallRequest::update(&env.destination, detection.channel.unwrap());
        request.portable = true;
        let (reporter, events) = recording_reporter();
        let outcome = env
            .installer()
            .run(&request, &reporter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, OperationOutcome::Success);
        stable.assert_async().await;
        insider.assert_async().await;

        assert_eq!(
            fs::read_to_string(env.destination.join(INSIDER_MARKER)).unwrap(),
            "insiders 2.0"
        );
        assert_eq!(
            fs::read_to_string(env.destination.join("resources/app/package.json")).unwrap(),
            "{\"version\":\"2.0\"}"
        );
        assert_eq!(fs::read(env.destination.join("notes.txt")).unwrap(), b"mine");
        assert!(!env.destination.join("data").exists());
        assert!(!states_of(&events.lock().unwrap()).contains(&InstallState::FinalizingPortable));
        assert!(!env.workspace.exists());
    }

    #[tokio::test]
    async fn test_cancel_mid_fetch_leaves_destination_untouched() {
        let mut env = TestEnv::new().await;
        fs::write(env.destination.join("existing.txt"), b"before").unwrap();
        let before = snapshot(&env.destination);

        let body: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
        env.serve("/stable", body).await;

        let cancel = CancellationToken::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let reporter = {
            let cancel = cancel.clone();
            let events = events.clone();
            Reporter::new(Arc::new(move |event: InstallEvent| {
                if let InstallEvent::Progress(p) = &event {
                    if p.percent >= 5 {
                        cancel.cancel();
                    }
                }
                events.lock().unwrap().push(event);
            }))
        };

        let request = InstallRequest::install(&env.destination, Channel::Stable, true);
        let outcome = env.installer().run(&request, &reporter, &cancel).await.unwrap();

        assert_eq!(outcome, OperationOutcome::Cancelled);
        let events = events.lock().unwrap();
        assert_eq!(progress_of(&events).last(), Some(&0));
        assert!(states_of(&events).ends_with(&[InstallState::Fetching, InstallState::Cancelled]));
        assert!(!env.workspace.exists());
        assert_eq!(snapshot(&env.destination), before);
    }

    #[tokio::test]
    async fn test_cancel_before_fetch_sends_no_request() {
        let mut env = TestEnv::new().await;
        let mock = env
            .server
            .mock("GET", "/stable")
            .expect(0)
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (reporter, events) = recording_reporter();
        let request = InstallRequest::install(&env.destination, Channel::Stable, false);
        let outcome = env.installer().run(&request, &reporter, &cancel).await.unwrap();

        assert_eq!(outcome, OperationOutcome::Cancelled);
        mock.assert_async().await;
        assert_eq!(progress_of(&events.lock().unwrap()).last(), Some(&0));
        assert!(!env.workspace.exists());
    }

    #[tokio::test]
    async fn test_cancel_through_handle() {
        let mut env = TestEnv::new().await;
        env.serve("/stable", stable_zip("1.90.0")).await;

        let installer = env.installer();
        let mut handle = installer
            .start(InstallRequest::install(&env.destination, Channel::Stable, true))
            .unwrap();
        handle.cancel();
        handle.cancel();

        let events = drain(&mut handle).await;
        assert_eq!(handle.wait().await, OperationOutcome::Cancelled);
        assert_eq!(events.last(), Some(&InstallEvent::Finished(OperationOutcome::Cancelled)));
        assert!(!env.workspace.exists());
        assert!(!env.destination.join(STABLE_MARKER).exists());
    }

    #[tokio::test]
    async fn test_http_error_is_network_failure() {
        let mut env = TestEnv::new().await;
        let _mock = env
            .server
            .mock("GET", "/stable")
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let (reporter, events) = recording_reporter();
        let request = InstallRequest::install(&env.destination, Channel::Stable, true);
        let outcome = env
            .installer()
            .run(&request, &reporter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            OperationOutcome::Failed {
                kind: ErrorKind::NetworkFailure,
                detail: "HTTP 503 - Service Unavailable".to_string(),
            }
        );
        assert_eq!(progress_of(&events.lock().unwrap()).last(), Some(&0));
        assert!(!env.workspace.exists());
        assert!(!env.destination.join("data").exists());
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_extraction_failure() {
        let mut env = TestEnv::new().await;
        env.serve("/stable", b"<html>not an archive</html>".to_vec()).await;

        let request = InstallRequest::install(&env.destination, Channel::Stable, true);
        let outcome = env
            .installer()
            .run(&request, &Reporter::silent(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            OperationOutcome::Failed {
                kind: ErrorKind::ExtractionFailure,
                ..
            }
        ));
        assert!(!env.workspace.exists());
        assert!(snapshot(&env.destination).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_access_denied_during_merge() {
        use std::os::unix::fs::PermissionsExt;

        let mut env = TestEnv::new().await;
        env.serve("/stable", stable_zip("1.91.0")).await;

        let locked = env.destination.join("resources");
        fs::create_dir_all(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        if fs::write(locked.join("probe"), b"x").is_ok() {
            // Running with permission bypass (root)
            return;
        }

        let request = InstallRequest::install(&env.destination, Channel::Stable, true);
        let outcome = env
            .installer()
            .run(&request, &Reporter::silent(), &CancellationToken::new())
            .await
            .unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(
            outcome,
            OperationOutcome::Failed {
                kind: ErrorKind::PermissionDenied,
                ..
            }
        ));
        assert!(!env.workspace.exists());
        assert!(env.destination.join(STABLE_MARKER).exists());
        assert!(env.destination.join("bin/code.cmd").exists());
        assert!(!env.destination.join("data").exists());
    }

    #[tokio::test]
    async fn test_running_twice_is_idempotent() {
        let mut env = TestEnv::new().await;
        env.server
            .mock("GET", "/stable")
            .with_status(200)
            .with_body(stable_zip("1.90.0"))
            .expect(2)
            .create_async()
            .await;
        let installer = env.installer();
        let request = InstallRequest::install(&env.destination, Channel::Stable, true);

        let first = installer
            .run(&request, &Reporter::silent(), &CancellationToken::new())
            .await
            .unwrap();
        let once = snapshot(&env.destination);
        let second = installer
            .run(&request, &Reporter::silent(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(first, OperationOutcome::Success);
        assert_eq!(second, OperationOutcome::Success);
        assert_eq!(snapshot(&env.destination), once);
    }

    #[tokio::test]
    async fn test_second_operation_is_rejected_while_busy() {
        let mut env = TestEnv::new().await;
        env.server
            .mock("GET", "/stable")
            .with_status(200)
            .with_body(stable_zip("1.90.0"))
            .expect(2)
            .create_async()
            .await;
        let installer = env.installer();
        let request = InstallRequest::install(&env.destination, Channel::Stable, false);

        let handle = installer.start(request.clone()).unwrap();
        assert!(installer.is_busy());
        assert!(matches!(installer.start(request.clone()), Err(InstallError::Busy)));
        assert!(matches!(
            installer
                .clone()
                .run(&request, &Reporter::silent(), &CancellationToken::new())
                .await,
            Err(InstallError::Busy)
        ));

        assert_eq!(handle.wait().await, OperationOutcome::Success);
        assert!(!installer.is_busy());

        let again = installer.start(request).unwrap();
        assert_eq!(again.wait().await, OperationOutcome::Success);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let env = TestEnv::new().await;
        let file = env.destination.join("Code.exe");
        fs::write(&file, b"x").unwrap();

        let result = env
            .installer()
            .start(InstallRequest::install(&file, Channel::Stable, true));
        assert!(matches!(
            result,
            Err(InstallError::Config(ConfigError::DestinationNotDirectory(_)))
        ));
    }

    #[tokio::test]
    async fn test_workspace_creation_failure_is_io_failure() {
        let mut env = TestEnv::new().await;
        let blocker = env.destination.parent().unwrap().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        env.workspace = blocker.join("temp");

        let request = InstallRequest::install(&env.destination, Channel::Stable, true);
        let outcome = env
            .installer()
            .run(&request, &Reporter::silent(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            OperationOutcome::Failed {
                kind: ErrorKind::IoFailure,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_portable_folder_failure_is_only_a_warning() {
        let mut env = TestEnv::new().await;
        env.serve("/stable", stable_zip("1.90.0")).await;
        fs::write(env.destination.join("data"), b"a file, not a folder").unwrap();

        let (reporter, events) = recording_reporter();
        let request = InstallRequest::install(&env.destination, Channel::Stable, true);
        let outcome = env
            .installer()
            .run(&request, &reporter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, OperationOutcome::Success);
        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, InstallEvent::Warning(w) if w.contains("'data' folder"))));
        assert_eq!(progress_of(&events).last(), Some(&100));
    }

    #[tokio::test]
    async fn test_leftover_workspace_is_replaced() {
        let mut env = TestEnv::new().await;
        env.serve("/stable", stable_zip("1.90.0")).await;
        fs::create_dir_all(env.workspace.join("staging/stale-dir")).unwrap();
        fs::write(env.workspace.join("staging/stale.dll"), b"stale").unwrap();

        let request = InstallRequest::install(&env.destination, Channel::Stable, false);
        let outcome = env
            .installer()
            .run(&request, &Reporter::silent(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, OperationOutcome::Success);
        assert!(!env.destination.join("stale.dll").exists());
        assert!(!env.destination.join("stale-dir").exists());
        assert!(!env.workspace.exists());
    }
}
