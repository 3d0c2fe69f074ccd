//! Projection-driver binding.
//!
//! The kernel projection driver is consumed through the two traits here:
//! [`ProjectionDriver`] constructs sessions, [`ProjectionSession`] is one
//! live virtualization session. The concrete wire binding lives with the
//! driver distribution; integration tests supply a fake.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ResultCode, SessionError};
use crate::event::Event;

/// Exact length of placeholder provider/content identifiers.
pub const PLACEHOLDER_ID_LENGTH: usize = 128;

/// Opaque placeholder identifier.
///
/// The driver stores both identifiers as extended attributes on the
/// placeholder and hands them back on demand events; the provider is free
/// to encode anything inside (version, content hash, ...).
pub type PlaceholderId = [u8; PLACEHOLDER_ID_LENGTH];

/// Projection state of a path as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionState {
    /// The driver cannot classify the entry (sockets, devices, ...).
    Unknown,

    /// Placeholder whose bytes have not been hydrated.
    Placeholder,

    /// Bytes exist in the backing store; the file is no longer projected.
    Full,
}

/// An event-handler entry point registered with the driver.
///
/// Returns `-errno` (0 for success), or the ALLOW/DENY sentinels for
/// permission events.
pub type EventHandlerFn = Box<dyn Fn(&Event) -> i32 + Send + Sync>;

/// The three handler slots registered at session construction.
///
/// The driver holds references to these for the whole session; the
/// virtualization instance retains the owning `Arc` from `start` until
/// `stop` has drained in-flight invocations.
pub struct EventHandlers {
    /// Demand events: directory enumeration and file hydration.
    pub projection: EventHandlerFn,

    /// Informational events about completed mutations.
    pub notification: EventHandlerFn,

    /// ALLOW/DENY requests for pending mutations.
    pub permission: EventHandlerFn,
}

/// Construction parameters for a projection session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lower-layer directory holding real bytes, under provider control.
    pub storage_root: PathBuf,

    /// Mount point exposed to filesystem clients.
    pub virtualization_root: PathBuf,

    /// Number of driver worker threads to request.
    pub pool_threads: u32,

    /// First-time initialization of the storage root.
    pub initialize_storage: bool,
}

/// A live projection session.
pub trait ProjectionSession: Send + Sync {
    /// Begin event delivery.
    ///
    /// # Returns
    /// 0 on success, non-zero on failure.
    fn start(&self) -> i32;

    /// Stop event delivery and release the session. Idempotent.
    fn stop(&self);

    /// Query the projection state of a path.
    ///
    /// # Arguments
    /// * `relative_path` - Path relative to the virtualization root
    fn projection_state(&self, relative_path: &str) -> (ResultCode, ProjectionState);

    /// Fetch the placeholder identifiers stored for a file.
    ///
    /// # Arguments
    /// * `relative_path` - Path relative to the virtualization root
    ///
    /// # Returns
    /// Result code plus the provider and content identifiers; the
    /// identifiers are meaningful only on `Success`.
    fn projection_attrs(&self, relative_path: &str) -> (ResultCode, PlaceholderId, PlaceholderId);

    /// Create a directory placeholder.
    fn create_placeholder_dir(&self, relative_path: &str, mode: u32) -> ResultCode;

    /// Create a file placeholder carrying the two identifiers.
    fn create_placeholder_file(
        &self,
        relative_path: &str,
        size: u64,
        mode: u32,
        provider_id: &PlaceholderId,
        content_id: &PlaceholderId,
    ) -> ResultCode;

    /// Create a symlink placeholder.
    fn create_placeholder_symlink(&self, relative_path: &str, target: &str) -> ResultCode;
}

/// Factory boundary to the kernel projection driver.
pub trait ProjectionDriver: Send + Sync {
    /// Construct a session with the given handler slots.
    ///
    /// The handlers must stay registered with the driver until the session
    /// is stopped.
    fn new_session(
        &self,
        config: &SessionConfig,
        handlers: Arc<EventHandlers>,
    ) -> Result<Arc<dyn ProjectionSession>, SessionError>;

    /// Whether the virtualization root has become a distinct mount.
    ///
    /// The default re-stats `virt_root` and compares its device id against
    /// the one observed before the session started; a change is the
    /// mount-complete signal. Bindings with another signal may override.
    fn is_mounted(&self, virt_root: &Path, prior_device: u64) -> bool {
        use std::os::unix::fs::MetadataExt;

        std::fs::metadata(virt_root)
            .map(|meta| meta.dev() != prior_device)
            .unwrap_or(false)
    }
}

/// A published session together with the root it virtualizes.
pub(crate) struct ActiveSession {
    /// The driver session.
    pub driver_session: Arc<dyn ProjectionSession>,

    /// Absolute path of the virtualization root.
    pub virtualization_root: PathBuf,
}

/// Shared slot holding the live session.
///
/// Event handlers take the shared guard for their entire invocation; `stop`
/// takes the exclusive guard after requesting driver shutdown, so clearing
/// the slot drains in-flight handlers.
pub(crate) type SessionSlot = Arc<RwLock<Option<ActiveSession>>>;
