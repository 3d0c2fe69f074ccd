//! Provider callback surface.
//!
//! A provider backs the projected tree: it enumerates directories and
//! supplies file bytes on demand, and observes (or vetoes) mutations the
//! driver reports. Callbacks run on driver worker threads and may be
//! entered concurrently for distinct events.

use std::os::unix::io::RawFd;

use crate::error::ResultCode;
use crate::session::PlaceholderId;
use crate::util::command_name;

/// Identity of the process whose I/O triggered an event.
#[derive(Debug, Clone)]
pub struct TriggerInfo {
    /// Pid reported by the driver.
    pub pid: i32,

    /// Command name from `/proc/<pid>/cmdline`; empty when unavailable.
    pub command_name: String,
}

impl TriggerInfo {
    /// Look up the triggering process.
    ///
    /// Never fails; the command name is best-effort.
    ///
    /// # Arguments
    /// * `pid` - Pid reported by the driver
    pub fn for_pid(pid: i32) -> Self {
        Self {
            pid,
            command_name: command_name(pid),
        }
    }
}

/// Callbacks a provider implements to back the projected tree.
///
/// The two demand callbacks are required. The notification and permission
/// callbacks default to no-ops reporting [`ResultCode::Success`], so a
/// provider that leaves a slot unimplemented observes nothing and vetoes
/// nothing.
///
/// `command_id` is always 0 today; it is reserved for asynchronous
/// completion.
pub trait Provider: Send + Sync {
    /// Populate a directory placeholder with its entries.
    ///
    /// # Arguments
    /// * `command_id` - Reserved, always 0
    /// * `relative_path` - Directory relative to the root; empty for the
    ///   root itself
    /// * `trigger` - Process whose read triggered the enumeration
    fn enumerate_directory(
        &self,
        command_id: u64,
        relative_path: &str,
        trigger: &TriggerInfo,
    ) -> ResultCode;

    /// Hydrate a file placeholder by writing its bytes to `fd`.
    ///
    /// The descriptor is owned by the driver: write to it (see
    /// [`try_write`](crate::try_write)) but do not close it.
    ///
    /// # Arguments
    /// * `command_id` - Reserved, always 0
    /// * `relative_path` - File relative to the root
    /// * `provider_id` - Provider identifier stored on the placeholder
    /// * `content_id` - Content identifier stored on the placeholder
    /// * `trigger` - Process whose read triggered hydration
    /// * `fd` - Driver-owned descriptor open for writing
    fn get_file_stream(
        &self,
        command_id: u64,
        relative_path: &str,
        provider_id: &PlaceholderId,
        content_id: &PlaceholderId,
        trigger: &TriggerInfo,
        fd: RawFd,
    ) -> ResultCode;

    /// A delete is pending; return non-success to veto.
    fn pre_delete(&self, _relative_path: &str, _is_directory: bool) -> ResultCode {
        ResultCode::Success
    }

    /// A rename is pending; return non-success to veto.
    fn pre_rename(
        &self,
        _relative_path: &str,
        _destination: &str,
        _is_directory: bool,
    ) -> ResultCode {
        ResultCode::Success
    }

    /// A placeholder is about to be opened for writing; return non-success
    /// to veto.
    fn pre_convert_to_full(&self, _relative_path: &str) -> ResultCode {
        ResultCode::Success
    }

    /// A writable handle was closed.
    fn file_modified(&self, _relative_path: &str) {}

    /// A new entry was created.
    fn new_file_created(&self, _relative_path: &str, _is_directory: bool) {}

    /// An entry was deleted.
    fn file_deleted(&self, _relative_path: &str, _is_directory: bool) {}

    /// An entry was renamed.
    fn file_renamed(&self, _relative_path: &str, _destination: &str, _is_directory: bool) {}

    /// A hard link was created at `destination` for `relative_path`.
    fn hard_link_created(&self, _relative_path: &str, _destination: &str) {}
}
