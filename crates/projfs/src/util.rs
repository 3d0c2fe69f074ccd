//! Small OS helpers.

/// Command name of a process, read from `/proc/<pid>/cmdline`.
///
/// Takes the first NUL-delimited segment. Any failure yields the empty
/// string; the process may already have exited.
pub(crate) fn command_name(pid: i32) -> String {
    match std::fs::read(format!("/proc/{}/cmdline", pid)) {
        Ok(bytes) => {
            let first: &[u8] = bytes.split(|b| *b == 0).next().unwrap_or(&[]);
            String::from_utf8_lossy(first).into_owned()
        }
        Err(_) => String::new(),
    }
}

/// Normalize a demand-event path for the enumeration callback.
///
/// The driver reports the root as `"."`; the enumeration callback receives
/// the empty string instead. Other callbacks see the raw relative path.
pub(crate) fn normalize_enumeration_path(path: &str) -> &str {
    if path == "." {
        ""
    } else {
        path
    }
}
