//! Extraction of the OTA helper app partition binary.
//!
//! The `firmware.bin` produced by the ESP-IDF and PlatformIO builds already is
//! the content of an app partition (it is flashed at the app offset, without
//! the bootloader), so extraction is a verbatim copy.

use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("failed to copy '{}' to '{}': {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Copy the partition binary from `firmware` to `output`, byte for byte.
///
/// Returns the number of bytes written. An existing `output` is replaced.
/// Nothing is written when `firmware` does not exist.
pub fn extract_partition_binary<P: AsRef<Path>, Q: AsRef<Path>>(
    firmware: P,
    output: Q,
) -> Result<u64, Error> {
    let firmware = firmware.as_ref();
    let output = output.as_ref();

    if !firmware.exists() {
        return Err(Error::InputNotFound(firmware.to_path_buf()));
    }

    let size = fs::copy(firmware, output).map_err(|source| Error::Copy {
        from: firmware.to_path_buf(),
        to: output.to_path_buf(),
        source,
    })?;
    log::debug!(
        "copied {} bytes from {} to {}",
        size,
        firmware.display(),
        output.display()
    );

    Ok(size)
}
