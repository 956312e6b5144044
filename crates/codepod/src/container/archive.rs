//! Single-file tar archives for container injection

use std::time::{SystemTime, UNIX_EPOCH};

use tar::{Builder, Header};

use crate::container::ContainerError;

/// Permissions of the injected source file
const FILE_MODE: u32 = 0o644;

/// Pack `content` as `filename` at the root of a finished tar archive
///
/// The filename is taken as-is; callers are expected to have restricted it to
/// a plain path component.
pub fn build_archive(filename: &str, content: &[u8]) -> Result<Vec<u8>, ContainerError> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(FILE_MODE);
    header.set_mtime(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    );

    let mut builder = Builder::new(Vec::new());
    builder
        .append_data(&mut header, filename, content)
        .map_err(ContainerError::Archive)?;
    builder.into_inner().map_err(ContainerError::Archive)
}
