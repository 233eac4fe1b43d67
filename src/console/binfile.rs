//! Debug-target validation: sniff the executable header before the engine
//! touches the file.

use anyhow::{bail, Context};
use memmap2::Mmap;
use std::fs;
use std::path::Path;

#[cfg(unix)]
const MAGIC: &[u8] = &[0x7F, b'E', b'L', b'F'];
#[cfg(windows)]
const MAGIC: &[u8] = &[b'M', b'Z'];

/// Check that `path` names a regular file whose header marks a debuggable
/// executable for this platform.
pub fn validate_executable(path: &Path) -> anyhow::Result<()> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("file '{}' doesn't exist", path.display()))?;
    if !metadata.is_file() {
        bail!("'{}' is not a regular file", path.display());
    }

    let file = fs::File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    if mmap.len() < MAGIC.len() || &mmap[..MAGIC.len()] != MAGIC {
        bail!("'{}' is not a debuggable executable", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_missing_file_rejected() {
        assert!(validate_executable(Path::new("/no/such/file")).is_err());
    }

    #[test]
    fn test_foreign_magic_rejected() {
        let path = env::temp_dir().join("chronos_binfile_foreign");
        fs::write(&path, b"#!/bin/sh\necho hi\n").unwrap();
        assert!(validate_executable(&path).is_err());
    }

    #[test]
    fn test_short_file_rejected() {
        let path = env::temp_dir().join("chronos_binfile_short");
        fs::write(&path, [MAGIC[0]]).unwrap();
        assert!(validate_executable(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_elf_magic_accepted() {
        let path = env::temp_dir().join("chronos_binfile_elf");
        fs::write(&path, [0x7F, b'E', b'L', b'F', 2, 1, 1, 0]).unwrap();
        assert!(validate_executable(&path).is_ok());
    }
}
