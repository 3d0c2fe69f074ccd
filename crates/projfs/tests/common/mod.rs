//! Fake projection driver and recording provider shared by the
//! integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rusty_projfs::{
    Event, EventHandlers, InstanceOptions, PlaceholderId, Provider, ProjectionDriver,
    ProjectionSession, ProjectionState, ResultCode, SessionConfig, SessionError, TriggerInfo,
    VirtualizationInstance, mask,
};
use tempfile::TempDir;

/// One recorded file-placeholder creation.
pub struct CreatedFile {
    pub path: String,
    pub size: u64,
    pub mode: u32,
    pub provider_id: PlaceholderId,
    pub content_id: PlaceholderId,
}

/// Scriptable in-memory projection session.
pub struct FakeSession {
    pub states: Mutex<HashMap<String, (ResultCode, ProjectionState)>>,
    pub attrs: Mutex<HashMap<String, (PlaceholderId, PlaceholderId)>>,
    pub created_dirs: Mutex<Vec<(String, u32)>>,
    pub created_files: Mutex<Vec<CreatedFile>>,
    pub created_symlinks: Mutex<Vec<(String, String)>>,
    pub start_result: AtomicI32,
    pub stopped: AtomicBool,
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            attrs: Mutex::new(HashMap::new()),
            created_dirs: Mutex::new(Vec::new()),
            created_files: Mutex::new(Vec::new()),
            created_symlinks: Mutex::new(Vec::new()),
            start_result: AtomicI32::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn set_state(&self, path: &str, result: ResultCode, state: ProjectionState) {
        self.states
            .lock()
            .insert(path.to_string(), (result, state));
    }

    pub fn set_attrs(&self, path: &str, provider_id: PlaceholderId, content_id: PlaceholderId) {
        self.attrs
            .lock()
            .insert(path.to_string(), (provider_id, content_id));
    }
}

impl ProjectionSession for FakeSession {
    fn start(&self) -> i32 {
        self.start_result.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn projection_state(&self, relative_path: &str) -> (ResultCode, ProjectionState) {
        self.states
            .lock()
            .get(relative_path)
            .copied()
            .unwrap_or((ResultCode::FileNotFound, ProjectionState::Unknown))
    }

    fn projection_attrs(&self, relative_path: &str) -> (ResultCode, PlaceholderId, PlaceholderId) {
        match self.attrs.lock().get(relative_path) {
            Some((provider_id, content_id)) => (ResultCode::Success, *provider_id, *content_id),
            None => (ResultCode::FileNotFound, [0; 128], [0; 128]),
        }
    }

    fn create_placeholder_dir(&self, relative_path: &str, mode: u32) -> ResultCode {
        self.created_dirs
            .lock()
            .push((relative_path.to_string(), mode));
        ResultCode::Success
    }

    fn create_placeholder_file(
        &self,
        relative_path: &str,
        size: u64,
        mode: u32,
        provider_id: &PlaceholderId,
        content_id: &PlaceholderId,
    ) -> ResultCode {
        self.created_files.lock().push(CreatedFile {
            path: relative_path.to_string(),
            size,
            mode,
            provider_id: *provider_id,
            content_id: *content_id,
        });
        ResultCode::Success
    }

    fn create_placeholder_symlink(&self, relative_path: &str, target: &str) -> ResultCode {
        self.created_symlinks
            .lock()
            .push((relative_path.to_string(), target.to_string()));
        ResultCode::Success
    }
}

/// Driver binding whose sessions are [`FakeSession`]s and whose mount
/// signal is a flag.
pub struct FakeDriver {
    pub session: Arc<FakeSession>,
    pub handlers: Mutex<Option<Arc<EventHandlers>>>,
    pub mounted: AtomicBool,
    pub fail_construction: AtomicBool,
    pub last_config: Mutex<Option<SessionConfig>>,
}

impl FakeDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            session: Arc::new(FakeSession::new()),
            handlers: Mutex::new(None),
            mounted: AtomicBool::new(true),
            fail_construction: AtomicBool::new(false),
            last_config: Mutex::new(None),
        })
    }

    /// Handlers captured at session construction.
    pub fn handlers(&self) -> Arc<EventHandlers> {
        self.handlers
            .lock()
            .clone()
            .expect("no session constructed yet")
    }
}

impl ProjectionDriver for FakeDriver {
    fn new_session(
        &self,
        config: &SessionConfig,
        handlers: Arc<EventHandlers>,
    ) -> Result<Arc<dyn ProjectionSession>, SessionError> {
        if self.fail_construction.load(Ordering::SeqCst) {
            return Err(SessionError::InvalidRoot("scripted failure".to_string()));
        }
        *self.last_config.lock() = Some(config.clone());
        *self.handlers.lock() = Some(handlers);
        Ok(self.session.clone())
    }

    fn is_mounted(&self, _virt_root: &Path, _prior_device: u64) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

/// One recorded file-stream request.
pub struct StreamRequest {
    pub command_id: u64,
    pub path: String,
    pub provider_id: PlaceholderId,
    pub content_id: PlaceholderId,
    pub pid: i32,
    pub fd: RawFd,
}

/// Provider that records every callback and returns scripted results.
pub struct RecordingProvider {
    pub enumerations: Mutex<Vec<(String, i32)>>,
    pub streams: Mutex<Vec<StreamRequest>>,
    pub pre_deletes: Mutex<Vec<(String, bool)>>,
    pub pre_renames: Mutex<Vec<(String, String, bool)>>,
    pub pre_converts: Mutex<Vec<String>>,
    pub modified: Mutex<Vec<String>>,
    pub created: Mutex<Vec<(String, bool)>>,
    pub deleted: Mutex<Vec<(String, bool)>>,
    pub renamed: Mutex<Vec<(String, String, bool)>>,
    pub hard_links: Mutex<Vec<(String, String)>>,
    pub enumerate_result: Mutex<ResultCode>,
    pub stream_result: Mutex<ResultCode>,
    pub pre_delete_result: Mutex<ResultCode>,
    pub pre_rename_result: Mutex<ResultCode>,
    pub pre_convert_result: Mutex<ResultCode>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            enumerations: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
            pre_deletes: Mutex::new(Vec::new()),
            pre_renames: Mutex::new(Vec::new()),
            pre_converts: Mutex::new(Vec::new()),
            modified: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            renamed: Mutex::new(Vec::new()),
            hard_links: Mutex::new(Vec::new()),
            enumerate_result: Mutex::new(ResultCode::Success),
            stream_result: Mutex::new(ResultCode::Success),
            pre_delete_result: Mutex::new(ResultCode::Success),
            pre_rename_result: Mutex::new(ResultCode::Success),
            pre_convert_result: Mutex::new(ResultCode::Success),
        }
    }

    /// Total number of callbacks observed.
    pub fn callback_count(&self) -> usize {
        self.enumerations.lock().len()
            + self.streams.lock().len()
            + self.pre_deletes.lock().len()
            + self.pre_renames.lock().len()
            + self.pre_converts.lock().len()
            + self.modified.lock().len()
            + self.created.lock().len()
            + self.deleted.lock().len()
            + self.renamed.lock().len()
            + self.hard_links.lock().len()
    }
}

impl Provider for RecordingProvider {
    fn enumerate_directory(
        &self,
        _command_id: u64,
        relative_path: &str,
        trigger: &TriggerInfo,
    ) -> ResultCode {
        self.enumerations
            .lock()
            .push((relative_path.to_string(), trigger.pid));
        *self.enumerate_result.lock()
    }

    fn get_file_stream(
        &self,
        command_id: u64,
        relative_path: &str,
        provider_id: &PlaceholderId,
        content_id: &PlaceholderId,
        trigger: &TriggerInfo,
        fd: RawFd,
    ) -> ResultCode {
        self.streams.lock().push(StreamRequest {
            command_id,
            path: relative_path.to_string(),
            provider_id: *provider_id,
            content_id: *content_id,
            pid: trigger.pid,
            fd,
        });
        *self.stream_result.lock()
    }

    fn pre_delete(&self, relative_path: &str, is_directory: bool) -> ResultCode {
        self.pre_deletes
            .lock()
            .push((relative_path.to_string(), is_directory));
        *self.pre_delete_result.lock()
    }

    fn pre_rename(&self, relative_path: &str, destination: &str, is_directory: bool) -> ResultCode {
        self.pre_renames.lock().push((
            relative_path.to_string(),
            destination.to_string(),
            is_directory,
        ));
        *self.pre_rename_result.lock()
    }

    fn pre_convert_to_full(&self, relative_path: &str) -> ResultCode {
        self.pre_converts.lock().push(relative_path.to_string());
        *self.pre_convert_result.lock()
    }

    fn file_modified(&self, relative_path: &str) {
        self.modified.lock().push(relative_path.to_string());
    }

    fn new_file_created(&self, relative_path: &str, is_directory: bool) {
        self.created
            .lock()
            .push((relative_path.to_string(), is_directory));
    }

    fn file_deleted(&self, relative_path: &str, is_directory: bool) {
        self.deleted
            .lock()
            .push((relative_path.to_string(), is_directory));
    }

    fn file_renamed(&self, relative_path: &str, destination: &str, is_directory: bool) {
        self.renamed.lock().push((
            relative_path.to_string(),
            destination.to_string(),
            is_directory,
        ));
    }

    fn hard_link_created(&self, relative_path: &str, destination: &str) {
        self.hard_links
            .lock()
            .push((relative_path.to_string(), destination.to_string()));
    }
}

/// A started instance wired to a fake driver.
pub struct Harness {
    pub instance: Arc<VirtualizationInstance>,
    pub driver: Arc<FakeDriver>,
    pub provider: Arc<RecordingProvider>,
    pub virt_root: TempDir,
    pub storage_root: TempDir,
}

impl Harness {
    pub fn handlers(&self) -> Arc<EventHandlers> {
        self.driver.handlers()
    }

    pub fn session(&self) -> &FakeSession {
        &self.driver.session
    }
}

/// Start an instance over a fake driver that mounts immediately.
pub fn start_instance(
    provider: Arc<dyn Provider>,
) -> (Arc<VirtualizationInstance>, Arc<FakeDriver>, TempDir, TempDir) {
    let driver: Arc<FakeDriver> = FakeDriver::new();
    let virt_root = TempDir::new().unwrap();
    let storage_root = TempDir::new().unwrap();

    let instance = Arc::new(VirtualizationInstance::new(
        provider,
        driver.clone(),
        InstanceOptions::default(),
    ));
    let code = instance.start(storage_root.path(), virt_root.path(), 2, false);
    assert_eq!(code, ResultCode::Success);

    (instance, driver, virt_root, storage_root)
}

/// Start a harness with a recording provider.
pub fn start_harness() -> Harness {
    let provider = Arc::new(RecordingProvider::new());
    let (instance, driver, virt_root, storage_root) = start_instance(provider.clone());
    Harness {
        instance,
        driver,
        provider,
        virt_root,
        storage_root,
    }
}

/// Pid of this test process.
pub fn own_pid() -> i32 {
    std::process::id() as i32
}

/// A pid guaranteed not to be this process.
pub fn other_pid() -> i32 {
    own_pid() + 1
}

/// Notification or permission event without a destination.
pub fn notify_event(pid: i32, event_mask: u32, path: &str) -> Event {
    Event {
        pid,
        mask: event_mask,
        path: path.to_string(),
        target_path: None,
        fd: None,
    }
}

/// Notification or permission event with a destination path.
pub fn notify_event_with_target(pid: i32, event_mask: u32, path: &str, target: &str) -> Event {
    Event {
        target_path: Some(target.to_string()),
        ..notify_event(pid, event_mask, path)
    }
}

/// Directory projection (enumeration) event.
pub fn proj_dir_event(pid: i32, path: &str) -> Event {
    notify_event(pid, mask::ONDIR, path)
}

/// File projection (hydration) event carrying a driver descriptor.
pub fn proj_file_event(pid: i32, path: &str, fd: RawFd) -> Event {
    Event {
        fd: Some(fd),
        ..notify_event(pid, 0, path)
    }
}
