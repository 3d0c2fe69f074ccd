//! Translation of driver events into provider callbacks.
//!
//! The driver invokes the three registered handlers from its own worker
//! threads; distinct events are dispatched concurrently. Every handler
//! shares the same preamble: load the session slot (gone means `-ENODEV`),
//! suppress events generated by the provider's own I/O, then decode and
//! dispatch. Results travel back to the driver as `-errno`, or as the
//! ALLOW/DENY sentinels for permission events.

use std::sync::Arc;

use crate::error::ResultCode;
use crate::event::{mask, Event, NotificationType, ALLOW, DENY};
use crate::provider::{Provider, TriggerInfo};
use crate::session::SessionSlot;
use crate::util::normalize_enumeration_path;

/// Reserved command id; asynchronous completion is unimplemented.
const COMMAND_ID_SYNC: u64 = 0;

/// Dispatches driver events to the provider callbacks.
///
/// One dispatcher per virtualization instance. Entry points hold the
/// shared session guard for their whole invocation, which is what lets
/// `stop` drain in-flight events by taking the exclusive guard.
pub(crate) struct EventDispatcher {
    /// Slot published by the lifecycle once the mount is up.
    session: SessionSlot,

    /// Provider callbacks.
    provider: Arc<dyn Provider>,

    /// Pid of the provider process, captured at instance construction.
    own_pid: i32,
}

impl EventDispatcher {
    /// Create a dispatcher over the shared session slot.
    ///
    /// # Arguments
    /// * `session` - Slot the lifecycle publishes the session into
    /// * `provider` - Provider callbacks
    /// * `own_pid` - Pid of this provider process
    pub(crate) fn new(session: SessionSlot, provider: Arc<dyn Provider>, own_pid: i32) -> Self {
        Self {
            session,
            provider,
            own_pid,
        }
    }

    /// Demand events: directory enumeration and file hydration.
    pub(crate) fn handle_projection(&self, event: &Event) -> i32 {
        let guard = self.session.read();
        let Some(active) = guard.as_ref() else {
            return -libc::ENODEV;
        };

        // The provider's own I/O inside a callback must not re-enter it.
        if event.pid == self.own_pid {
            return 0;
        }

        let trigger: TriggerInfo = TriggerInfo::for_pid(event.pid);

        if event.mask & mask::ONDIR != 0 {
            let path: &str = normalize_enumeration_path(&event.path);
            tracing::debug!(path, pid = event.pid, "enumerate directory");
            let result = self
                .provider
                .enumerate_directory(COMMAND_ID_SYNC, path, &trigger);
            return -result.to_errno();
        }

        let (attrs_result, provider_id, content_id) =
            active.driver_session.projection_attrs(&event.path);
        if attrs_result != ResultCode::Success {
            tracing::warn!(path = %event.path, ?attrs_result, "placeholder attrs unavailable");
            return -attrs_result.to_errno();
        }

        let Some(fd) = event.fd else {
            tracing::warn!(path = %event.path, "file projection event without a descriptor");
            return -libc::EINVAL;
        };

        tracing::debug!(path = %event.path, pid = event.pid, fd, "hydrate file");
        let result = self.provider.get_file_stream(
            COMMAND_ID_SYNC,
            &event.path,
            &provider_id,
            &content_id,
            &trigger,
            fd,
        );
        -result.to_errno()
    }

    /// Informational events about completed mutations.
    pub(crate) fn handle_notification(&self, event: &Event) -> i32 {
        self.handle_non_projection(event, false)
    }

    /// ALLOW/DENY requests for pending mutations.
    pub(crate) fn handle_permission(&self, event: &Event) -> i32 {
        self.handle_non_projection(event, true)
    }

    /// Shared path of the notification and permission handlers.
    fn handle_non_projection(&self, event: &Event, is_permission: bool) -> i32 {
        let guard = self.session.read();
        if guard.is_none() {
            return -libc::ENODEV;
        }

        if event.pid == self.own_pid {
            return if is_permission { ALLOW } else { 0 };
        }

        let Some(kind) = NotificationType::from_mask(event.mask) else {
            tracing::debug!(mask = event.mask, path = %event.path, "ignoring unclassified event");
            return 0;
        };

        let is_directory: bool = event.is_directory();
        let destination: &str = if kind.has_destination() {
            event.target_path.as_deref().unwrap_or_default()
        } else {
            ""
        };

        tracing::debug!(?kind, path = %event.path, destination, is_directory, "notify");
        let result: ResultCode =
            self.dispatch_notification(kind, &event.path, destination, is_directory);

        let ret: i32 = -result.to_errno();
        if is_permission {
            match ret {
                0 => ALLOW,
                r if r == -libc::EPERM => DENY,
                r => r,
            }
        } else {
            ret
        }
    }

    /// Route one classified notification to its provider callback.
    ///
    /// Observation-only callbacks report `Success`; the pre-operation
    /// callbacks return whatever the provider decides.
    fn dispatch_notification(
        &self,
        kind: NotificationType,
        path: &str,
        destination: &str,
        is_directory: bool,
    ) -> ResultCode {
        match kind {
            NotificationType::PreDelete => self.provider.pre_delete(path, is_directory),
            NotificationType::PreRename => {
                self.provider.pre_rename(path, destination, is_directory)
            }
            NotificationType::PreConvertToFull => self.provider.pre_convert_to_full(path),
            NotificationType::FileModified => {
                self.provider.file_modified(path);
                ResultCode::Success
            }
            NotificationType::NewFileCreated => {
                self.provider.new_file_created(path, is_directory);
                ResultCode::Success
            }
            NotificationType::FileDeleted => {
                self.provider.file_deleted(path, is_directory);
                ResultCode::Success
            }
            NotificationType::FileRenamed => {
                self.provider.file_renamed(path, destination, is_directory);
                ResultCode::Success
            }
            NotificationType::HardLinkCreated => {
                self.provider.hard_link_created(path, destination);
                ResultCode::Success
            }
        }
    }
}
