//! Chunked writer for driver-supplied descriptors.

use std::os::unix::io::RawFd;

/// Write all of `bytes` to `fd`, tolerating short writes.
///
/// The descriptor is owned by the projection driver: it is borrowed here
/// and never closed. Intended for use inside the file-stream callback.
///
/// # Arguments
/// * `fd` - Destination descriptor, open for writing
/// * `bytes` - Buffer to write in full
///
/// # Returns
/// True once every byte has been written; false on the first failed write.
pub fn try_write(fd: RawFd, bytes: &[u8]) -> bool {
    write_all(bytes, |chunk| unsafe {
        libc::write(fd, chunk.as_ptr() as *const libc::c_void, chunk.len())
    })
}

/// Drive `write` until the buffer is exhausted, advancing over short
/// writes. Any non-positive return stops the loop.
fn write_all(mut bytes: &[u8], mut write: impl FnMut(&[u8]) -> isize) -> bool {
    while !bytes.is_empty() {
        let written: isize = write(bytes);
        if written <= 0 {
            return false;
        }
        bytes = &bytes[written as usize..];
    }
    true
}
