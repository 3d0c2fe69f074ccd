//! Configuration options for the virtualization instance.

use std::time::Duration;

const DEFAULT_MOUNT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MOUNT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Configuration for a virtualization instance.
#[derive(Debug, Clone)]
pub struct InstanceOptions {
    /// How long `start` waits for the mount to appear.
    pub mount_wait_timeout: Duration,

    /// Poll interval of the mount-wait loop.
    pub mount_poll_interval: Duration,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            mount_wait_timeout: DEFAULT_MOUNT_WAIT_TIMEOUT,
            mount_poll_interval: DEFAULT_MOUNT_POLL_INTERVAL,
        }
    }
}

impl InstanceOptions {
    /// Set the mount-wait timeout.
    ///
    /// # Arguments
    /// * `timeout` - Maximum time `start` waits for the mount
    pub fn with_mount_wait_timeout(mut self, timeout: Duration) -> Self {
        self.mount_wait_timeout = timeout;
        self
    }

    /// Set the mount-wait poll interval.
    ///
    /// # Arguments
    /// * `interval` - Delay between mount probes
    pub fn with_mount_poll_interval(mut self, interval: Duration) -> Self {
        self.mount_poll_interval = interval;
        self
    }
}

/// Recommended driver worker-pool size: twice the logical CPU count.
pub fn default_pool_threads() -> u32 {
    let cpus: usize = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus * 2) as u32
}

/// Flags modulating placeholder update and delete operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateFlags {
    /// Permit updating a placeholder whose metadata diverged.
    pub allow_dirty_metadata: bool,

    /// Permit updating a placeholder whose content diverged.
    pub allow_dirty_data: bool,

    /// Permit updating a read-only placeholder.
    pub allow_read_only: bool,
}

impl UpdateFlags {
    /// Permit dirty metadata.
    pub fn with_allow_dirty_metadata(mut self, allow: bool) -> Self {
        self.allow_dirty_metadata = allow;
        self
    }

    /// Permit dirty data.
    pub fn with_allow_dirty_data(mut self, allow: bool) -> Self {
        self.allow_dirty_data = allow;
        self
    }

    /// Permit read-only targets.
    pub fn with_allow_read_only(mut self, allow: bool) -> Self {
        self.allow_read_only = allow;
        self
    }
}
