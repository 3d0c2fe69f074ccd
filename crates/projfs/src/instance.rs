//! Virtualization instance: lifecycle and the placeholder/update API.
//!
//! One instance per provider process. The instance is created inert,
//! `start` brings up a projection session and waits for the mount to
//! appear, and `stop` tears the session down after draining in-flight
//! event handlers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::dispatcher::EventDispatcher;
use crate::error::{ResultCode, UpdateFailureCause};
use crate::options::{InstanceOptions, UpdateFlags};
use crate::provider::Provider;
use crate::session::{
    ActiveSession, EventHandlers, PlaceholderId, ProjectionDriver, ProjectionSession,
    ProjectionState, SessionConfig, SessionSlot, PLACEHOLDER_ID_LENGTH,
};

/// Mode bits for directory placeholders.
const PLACEHOLDER_DIR_MODE: u32 = 0o777;

/// Lifecycle state guarded by the instance mutex.
///
/// Serializes `start` against `stop` and retains the handler slots for as
/// long as the driver may invoke them.
struct InstanceState {
    /// Whether a session is live.
    running: bool,

    /// Handler slots registered with the driver. The driver holds raw
    /// references the compiler cannot trace; ownership lives here until
    /// `stop` has drained in-flight invocations.
    #[allow(dead_code)]
    handlers: Option<Arc<EventHandlers>>,

    /// Owning reference to the session, for teardown.
    session: Option<Arc<dyn ProjectionSession>>,
}

/// A user-space virtualization provider instance.
///
/// Presents a directory tree whose entries are placeholders hydrated on
/// first access. The instance bridges the kernel projection driver to the
/// [`Provider`] callbacks and exposes the placeholder/update operations the
/// provider uses to shape the projected tree.
pub struct VirtualizationInstance {
    /// Configuration.
    options: InstanceOptions,

    /// Provider callbacks.
    provider: Arc<dyn Provider>,

    /// Driver binding.
    driver: Arc<dyn ProjectionDriver>,

    /// Pid of this process, captured once at construction. Events carrying
    /// this pid are the provider's own I/O and are never dispatched.
    own_pid: i32,

    /// Session slot shared with the event dispatcher. Handlers take the
    /// plain shared guard; operations reachable from inside callbacks take
    /// the recursive guard so a `stop` waiting for the exclusive guard
    /// cannot wedge a handler that re-enters the slot on the same thread.
    session: SessionSlot,

    /// Lifecycle state.
    state: Mutex<InstanceState>,
}

impl VirtualizationInstance {
    /// Create an inert instance.
    ///
    /// # Arguments
    /// * `provider` - Provider callbacks backing the projected tree
    /// * `driver` - Binding to the kernel projection driver
    /// * `options` - Instance configuration
    pub fn new(
        provider: Arc<dyn Provider>,
        driver: Arc<dyn ProjectionDriver>,
        options: InstanceOptions,
    ) -> Self {
        Self {
            options,
            provider,
            driver,
            own_pid: unsafe { libc::getpid() },
            session: Arc::new(RwLock::new(None)),
            state: Mutex::new(InstanceState {
                running: false,
                handlers: None,
                session: None,
            }),
        }
    }

    /// Start virtualization.
    ///
    /// Constructs and starts a projection session, then waits for the
    /// virtualization root to become a distinct mount (its device id
    /// changing is the completion signal). Event handlers answer `-ENODEV`
    /// until the mount is up and the session is published.
    ///
    /// # Arguments
    /// * `storage_root` - Lower-layer directory holding real bytes
    /// * `virt_root` - Mount point exposed to clients
    /// * `pool_threads` - Driver worker threads to request
    /// * `initialize_storage` - First-time initialization of the storage root
    ///
    /// # Returns
    /// `Success`, `InvalidState` if already running, `Invalid` on any
    /// startup failure.
    pub fn start(
        &self,
        storage_root: &Path,
        virt_root: &Path,
        pool_threads: u32,
        initialize_storage: bool,
    ) -> ResultCode {
        use std::os::unix::fs::MetadataExt;

        let mut state = self.state.lock();
        if state.running {
            tracing::warn!("start rejected: virtualization already running");
            return ResultCode::InvalidState;
        }

        let prior_device: u64 = match fs::metadata(virt_root) {
            Ok(meta) => meta.dev(),
            Err(error) => {
                tracing::error!(%error, root = %virt_root.display(), "cannot stat virtualization root");
                return ResultCode::Invalid;
            }
        };

        let dispatcher = Arc::new(EventDispatcher::new(
            self.session.clone(),
            self.provider.clone(),
            self.own_pid,
        ));
        let handlers: Arc<EventHandlers> = Arc::new(build_handlers(dispatcher));

        let config = SessionConfig {
            storage_root: storage_root.to_path_buf(),
            virtualization_root: virt_root.to_path_buf(),
            pool_threads,
            initialize_storage,
        };

        let session = match self.driver.new_session(&config, handlers.clone()) {
            Ok(session) => session,
            Err(error) => {
                tracing::error!(%error, "projection session construction failed");
                return ResultCode::Invalid;
            }
        };

        let rc: i32 = session.start();
        if rc != 0 {
            tracing::error!(rc, "projection session failed to start");
            session.stop();
            return ResultCode::Invalid;
        }

        if !self.wait_for_mount(virt_root, prior_device) {
            tracing::error!(root = %virt_root.display(), "mount did not complete in time");
            session.stop();
            return ResultCode::Invalid;
        }

        *self.session.write() = Some(ActiveSession {
            driver_session: session.clone(),
            virtualization_root: virt_root.to_path_buf(),
        });
        state.running = true;
        state.handlers = Some(handlers);
        state.session = Some(session);

        tracing::info!(root = %virt_root.display(), "virtualization started");
        ResultCode::Success
    }

    /// Stop virtualization. Idempotent.
    ///
    /// Requests driver shutdown, then takes the exclusive session guard,
    /// which waits out in-flight event handlers before the session and the
    /// handler slots are released.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }

        if let Some(session) = state.session.take() {
            session.stop();
        }

        // Taking the exclusive guard drains in-flight handlers.
        self.session.write().take();

        state.handlers = None;
        state.running = false;
        tracing::info!("virtualization stopped");
    }

    /// Whether a session is live.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Absolute path of the virtualization root, while running.
    pub fn virtualization_root(&self) -> Option<PathBuf> {
        self.session
            .read_recursive()
            .as_ref()
            .map(|active| active.virtualization_root.clone())
    }

    /// Query the projection state of a path.
    ///
    /// # Arguments
    /// * `relative_path` - Path relative to the virtualization root
    pub fn projection_state(&self, relative_path: &str) -> (ResultCode, ProjectionState) {
        let guard = self.session.read_recursive();
        match guard.as_ref() {
            Some(active) => active.driver_session.projection_state(relative_path),
            None => (ResultCode::DriverNotLoaded, ProjectionState::Unknown),
        }
    }

    /// Create a directory placeholder.
    ///
    /// # Arguments
    /// * `relative_path` - Directory relative to the virtualization root
    pub fn write_placeholder_directory(&self, relative_path: &str) -> ResultCode {
        let guard = self.session.read_recursive();
        let Some(active) = guard.as_ref() else {
            return ResultCode::DriverNotLoaded;
        };
        active
            .driver_session
            .create_placeholder_dir(relative_path, PLACEHOLDER_DIR_MODE)
    }

    /// Create a file placeholder.
    ///
    /// Both identifiers must be exactly [`PLACEHOLDER_ID_LENGTH`] bytes;
    /// any other length is a caller error reported as `InvalidArgument`
    /// before anything is touched.
    ///
    /// # Arguments
    /// * `relative_path` - File relative to the virtualization root
    /// * `provider_id` - Opaque provider identifier, 128 bytes
    /// * `content_id` - Opaque content identifier, 128 bytes
    /// * `size` - Projected file size in bytes
    /// * `mode` - Mode bits for the placeholder
    pub fn write_placeholder_file(
        &self,
        relative_path: &str,
        provider_id: &[u8],
        content_id: &[u8],
        size: u64,
        mode: u32,
    ) -> ResultCode {
        let (Some(provider_id), Some(content_id)) =
            (to_placeholder_id(provider_id), to_placeholder_id(content_id))
        else {
            return ResultCode::InvalidArgument;
        };

        let guard = self.session.read_recursive();
        let Some(active) = guard.as_ref() else {
            return ResultCode::DriverNotLoaded;
        };
        active.driver_session.create_placeholder_file(
            relative_path,
            size,
            mode,
            &provider_id,
            &content_id,
        )
    }

    /// Create a symlink placeholder.
    ///
    /// # Arguments
    /// * `relative_path` - Link path relative to the virtualization root
    /// * `target` - Link target, stored natively
    pub fn write_symlink(&self, relative_path: &str, target: &str) -> ResultCode {
        let guard = self.session.read_recursive();
        let Some(active) = guard.as_ref() else {
            return ResultCode::DriverNotLoaded;
        };
        active
            .driver_session
            .create_placeholder_symlink(relative_path, target)
    }

    /// Delete a projected file or directory.
    ///
    /// Deleting a path that does not exist succeeds. The virtualization
    /// root itself is undeletable and reports `DirectoryNotEmpty`. A
    /// non-directory whose projection state says its bytes live in the
    /// backing store (`Full`, or unclassifiable non-regular entries) is
    /// refused with `VirtualizationInvalidOperation` and a `DirtyData`
    /// cause, since removing it would lose data the provider no longer
    /// projects.
    ///
    /// `update_flags` is accepted for parity with the update operations;
    /// the delete path does not currently consult it.
    ///
    /// # Arguments
    /// * `relative_path` - Path relative to the root; empty means the root
    /// * `update_flags` - Update flags
    pub fn delete_file(
        &self,
        relative_path: &str,
        update_flags: UpdateFlags,
    ) -> (ResultCode, UpdateFailureCause) {
        let _ = update_flags;

        if relative_path.is_empty() {
            return (ResultCode::DirectoryNotEmpty, UpdateFailureCause::NoFailure);
        }

        let guard = self.session.read_recursive();
        let Some(active) = guard.as_ref() else {
            return (ResultCode::DriverNotLoaded, UpdateFailureCause::NoFailure);
        };

        let full_path: PathBuf = active.virtualization_root.join(relative_path);
        let is_directory: bool = full_path.is_dir();

        if !is_directory {
            let (state_result, state) = active.driver_session.projection_state(relative_path);
            let hydrated: bool =
                state_result == ResultCode::Success && state == ProjectionState::Full;
            // Sockets and other non-regular entries come back Unknown with
            // an Invalid result; treat them like hydrated files.
            let unclassified: bool =
                state_result == ResultCode::Invalid && state == ProjectionState::Unknown;
            if hydrated || unclassified {
                tracing::debug!(path = relative_path, "refusing delete of non-placeholder");
                return (
                    ResultCode::VirtualizationInvalidOperation,
                    UpdateFailureCause::DirtyData,
                );
            }
        }

        let removed: io::Result<()> = if is_directory {
            fs::remove_dir(&full_path)
        } else {
            fs::remove_file(&full_path)
        };

        match removed {
            Ok(()) => (ResultCode::Success, UpdateFailureCause::NoFailure),
            Err(error) => map_removal_error(&error),
        }
    }

    /// Replace a placeholder file, deleting any stale one first.
    ///
    /// # Arguments
    /// * `relative_path` - File relative to the virtualization root
    /// * `provider_id` - Opaque provider identifier, 128 bytes
    /// * `content_id` - Opaque content identifier, 128 bytes
    /// * `size` - Projected file size in bytes
    /// * `mode` - Mode bits for the placeholder
    /// * `update_flags` - Update flags
    pub fn update_placeholder_if_needed(
        &self,
        relative_path: &str,
        provider_id: &[u8],
        content_id: &[u8],
        size: u64,
        mode: u32,
        update_flags: UpdateFlags,
    ) -> (ResultCode, UpdateFailureCause) {
        if provider_id.len() != PLACEHOLDER_ID_LENGTH || content_id.len() != PLACEHOLDER_ID_LENGTH {
            return (ResultCode::InvalidArgument, UpdateFailureCause::NoFailure);
        }

        let (deleted, cause) = self.delete_file(relative_path, update_flags);
        if deleted != ResultCode::Success {
            return (deleted, cause);
        }

        let written: ResultCode =
            self.write_placeholder_file(relative_path, provider_id, content_id, size, mode);
        (written, UpdateFailureCause::NoFailure)
    }

    /// Replace a placeholder file with a symlink.
    ///
    /// # Arguments
    /// * `relative_path` - Link path relative to the virtualization root
    /// * `target` - Link target
    /// * `update_flags` - Update flags
    pub fn replace_placeholder_with_symlink(
        &self,
        relative_path: &str,
        target: &str,
        update_flags: UpdateFlags,
    ) -> (ResultCode, UpdateFailureCause) {
        let (deleted, cause) = self.delete_file(relative_path, update_flags);
        if deleted != ResultCode::Success {
            return (deleted, cause);
        }

        let written: ResultCode = self.write_symlink(relative_path, target);
        (written, UpdateFailureCause::NoFailure)
    }

    /// Complete a previously suspended command. Reserved.
    pub fn complete_command(&self, _command_id: u64, _result: ResultCode) -> ResultCode {
        ResultCode::NotYetImplemented
    }

    /// Convert an existing directory into a placeholder. Reserved.
    pub fn convert_directory_to_placeholder(&self, _relative_path: &str) -> ResultCode {
        ResultCode::NotYetImplemented
    }

    /// Poll the driver until the mount appears or the deadline passes.
    fn wait_for_mount(&self, virt_root: &Path, prior_device: u64) -> bool {
        let deadline: Instant = Instant::now() + self.options.mount_wait_timeout;
        loop {
            if self.driver.is_mounted(virt_root, prior_device) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(self.options.mount_poll_interval);
        }
    }
}

impl Drop for VirtualizationInstance {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Wrap a dispatcher into the three handler slots.
fn build_handlers(dispatcher: Arc<EventDispatcher>) -> EventHandlers {
    let projection = dispatcher.clone();
    let notification = dispatcher.clone();
    let permission = dispatcher;
    EventHandlers {
        projection: Box::new(move |event| projection.handle_projection(event)),
        notification: Box::new(move |event| notification.handle_notification(event)),
        permission: Box::new(move |event| permission.handle_permission(event)),
    }
}

/// Validate a caller-supplied placeholder identifier.
fn to_placeholder_id(bytes: &[u8]) -> Option<PlaceholderId> {
    bytes.try_into().ok()
}

/// Map a removal error to the result taxonomy.
///
/// Deleting something already gone counts as success.
fn map_removal_error(error: &io::Error) -> (ResultCode, UpdateFailureCause) {
    match error.kind() {
        io::ErrorKind::NotFound => (ResultCode::Success, UpdateFailureCause::NoFailure),
        io::ErrorKind::PermissionDenied => (ResultCode::AccessDenied, UpdateFailureCause::ReadOnly),
        _ => match error.raw_os_error() {
            Some(libc::ENOTEMPTY) => {
                (ResultCode::DirectoryNotEmpty, UpdateFailureCause::NoFailure)
            }
            Some(_) => (ResultCode::IOError, UpdateFailureCause::NoFailure),
            None => (ResultCode::Invalid, UpdateFailureCause::NoFailure),
        },
    }
}
