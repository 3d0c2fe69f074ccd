//! User-space provider engine for a Linux projected filesystem.
//!
//! A kernel projection driver exposes a directory tree whose entries are
//! placeholders: files and directories that look materialized but whose
//! real content is fetched on first access. The driver forwards demand and
//! notification events to a user-space provider; this crate implements that
//! provider side. It owns the virtualization lifecycle (mount detection,
//! handler registration, teardown), dispatches driver events to provider
//! callbacks under the protocol's ordering and error-encoding rules, and
//! exposes the placeholder and deletion operations a provider uses to
//! shape the projected tree.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: VirtualizationInstance (lifecycle + placeholder/update API)
//! Layer 2: EventDispatcher (decode, self-event suppression, errno encoding)
//! Layer 1: Provider callbacks (enumeration, hydration, notifications)
//! Layer 0: ProjectionSession / ProjectionDriver (kernel driver binding)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rusty_projfs::{default_pool_threads, InstanceOptions, VirtualizationInstance};
//!
//! let instance = VirtualizationInstance::new(provider, driver, InstanceOptions::default());
//! let code = instance.start(&storage_root, &virt_root, default_pool_threads(), true);
//! assert!(code.is_success());
//! ```
//!
//! Event handlers run on driver worker threads and may be entered
//! concurrently; `stop` drains in-flight handlers before releasing the
//! session. Events triggered by the provider's own I/O are answered
//! without re-entering the provider, so callbacks can freely touch the
//! projected tree.

// This crate targets the Linux projection driver only.
#[cfg(not(target_os = "linux"))]
compile_error!("rusty-projfs is only supported on Linux");

mod dispatcher;
mod error;
mod event;
mod instance;
mod options;
mod provider;
mod session;
mod util;
mod writer;

pub use error::{ResultCode, SessionError, UpdateFailureCause};
pub use event::{mask, Event, NotificationType, ALLOW, DENY};
pub use instance::VirtualizationInstance;
pub use options::{default_pool_threads, InstanceOptions, UpdateFlags};
pub use provider::{Provider, TriggerInfo};
pub use session::{
    EventHandlerFn, EventHandlers, PlaceholderId, ProjectionDriver, ProjectionSession,
    ProjectionState, SessionConfig, PLACEHOLDER_ID_LENGTH,
};
pub use writer::try_write;
