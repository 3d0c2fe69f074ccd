//! Events delivered by the projection driver.
//!
//! The driver reports three kinds of events: projection (demand for content),
//! notification (a completed mutation), and permission (an ALLOW/DENY request
//! for a pending mutation). All three arrive as the same [`Event`] value;
//! the mask bits distinguish them.

use std::os::unix::io::RawFd;

/// Driver event mask bits.
///
/// Values follow the inotify/fanotify layout the driver protocol borrows.
pub mod mask {
    /// Writable handle closed.
    pub const CLOSE_WRITE: u32 = 0x0000_0008;
    /// Either end of a rename.
    pub const MOVE: u32 = 0x0000_00C0;
    /// Entry created.
    pub const CREATE: u32 = 0x0000_0100;
    /// Entry deleted.
    pub const DELETE: u32 = 0x0000_0200;
    /// Permission request for an open-for-write.
    pub const OPEN_PERM: u32 = 0x0001_0000;
    /// Permission request for a delete.
    pub const DELETE_PERM: u32 = 0x0002_0000;
    /// Permission request for a rename.
    pub const MOVE_PERM: u32 = 0x0004_0000;
    /// Subject is a hard link.
    pub const ONLINK: u32 = 0x0100_0000;
    /// Subject is a directory.
    pub const ONDIR: u32 = 0x4000_0000;
}

/// Permission-event response granting the pending operation.
pub const ALLOW: i32 = 0x01;

/// Permission-event response vetoing the pending operation.
pub const DENY: i32 = 0x02;

/// One event as delivered by the projection driver.
#[derive(Debug, Clone)]
pub struct Event {
    /// Pid of the process whose I/O triggered the event.
    pub pid: i32,

    /// Bitset over [`mask`] constants.
    pub mask: u32,

    /// Path relative to the virtualization root; `"."` is the root itself.
    pub path: String,

    /// Destination path for renames and link creation.
    pub target_path: Option<String>,

    /// Driver-owned descriptor open for writing into the placeholder.
    /// Present on file projection events only; the driver closes it after
    /// the handler returns.
    pub fd: Option<RawFd>,
}

impl Event {
    /// Whether the subject of the event is a directory.
    pub fn is_directory(&self) -> bool {
        self.mask & mask::ONDIR != 0
    }
}

/// Classification of a notification or permission event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    /// A delete is pending; the provider may veto.
    PreDelete,
    /// A rename is pending; the provider may veto.
    PreRename,
    /// A placeholder is about to be opened for writing; the provider may veto.
    PreConvertToFull,
    /// A writable handle was closed.
    FileModified,
    /// A new entry was created.
    NewFileCreated,
    /// An entry was deleted.
    FileDeleted,
    /// An entry was renamed.
    FileRenamed,
    /// A hard link was created.
    HardLinkCreated,
}

impl NotificationType {
    /// Derive the notification type from an event mask.
    ///
    /// First match wins. Events matching nothing are ignored by the
    /// dispatcher.
    ///
    /// # Arguments
    /// * `event_mask` - Bitset over [`mask`] constants
    pub fn from_mask(event_mask: u32) -> Option<Self> {
        if event_mask & mask::DELETE_PERM != 0 {
            Some(NotificationType::PreDelete)
        } else if event_mask & mask::MOVE_PERM != 0 {
            Some(NotificationType::PreRename)
        } else if event_mask & mask::CLOSE_WRITE != 0 {
            Some(NotificationType::FileModified)
        } else if event_mask & mask::CREATE != 0 && event_mask & mask::ONLINK == 0 {
            Some(NotificationType::NewFileCreated)
        } else if event_mask & mask::MOVE != 0 {
            Some(NotificationType::FileRenamed)
        } else if event_mask & mask::CREATE != 0 {
            Some(NotificationType::HardLinkCreated)
        } else if event_mask & mask::DELETE != 0 {
            Some(NotificationType::FileDeleted)
        } else if event_mask & mask::OPEN_PERM != 0 {
            Some(NotificationType::PreConvertToFull)
        } else {
            None
        }
    }

    /// Whether this type carries a destination path.
    pub fn has_destination(self) -> bool {
        matches!(
            self,
            NotificationType::PreRename
                | NotificationType::FileRenamed
                | NotificationType::HardLinkCreated
        )
    }
}
