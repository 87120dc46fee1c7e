//! SHA-256 digests of the four inputs a campaign depends on, recorded once
//! in the `Backup` section and re-verified on resume.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::ArchiveError;

pub const HASH_ALGORITHM: &str = "sha256";

/// The four inputs whose content must not change between the original run
/// and a resumed one.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct InputHashes {
    pub emulator: [u8; 32],
    pub fault_config: [u8; 32],
    pub kernel: Option<[u8; 32]>,
    pub bios: Option<[u8; 32]>,
}

#[derive(Debug, Clone)]
pub struct InputPaths<'a> {
    pub emulator: &'a Path,
    pub fault_config: &'a Path,
    pub kernel: Option<&'a Path>,
    pub bios: Option<&'a Path>,
}

pub fn hash_file(path: &Path) -> Result<[u8; 32], ArchiveError> {
    let mut file = std::fs::File::open(path).map_err(|source| ArchiveError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).map_err(|source| ArchiveError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hasher.finalize().into())
}

pub fn compute_input_hashes(paths: &InputPaths<'_>) -> Result<InputHashes, ArchiveError> {
    Ok(InputHashes {
        emulator: hash_file(paths.emulator)?,
        fault_config: hash_file(paths.fault_config)?,
        kernel: paths.kernel.map(hash_file).transpose()?,
        bios: paths.bios.map(hash_file).transpose()?,
    })
}

/// Compare freshly computed hashes against what the `Backup` section
/// recorded. Returns the name of the first mismatching input, if any.
pub fn first_mismatch(recorded: &InputHashes, current: &InputHashes) -> Option<&'static str> {
    if recorded.emulator != current.emulator {
        return Some("emulator");
    }
    if recorded.fault_config != current.fault_config {
        return Some("fault_config");
    }
    if recorded.kernel != current.kernel {
        return Some("kernel");
    }
    if recorded.bios != current.bios {
        return Some("bios");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn hash_is_stable_for_identical_content() {
        let mut a = tempfile::NamedTempFile::new().unwrap();
        a.write_all(b"hello world").unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        b.write_all(b"hello world").unwrap();
        assert_eq!(hash_file(a.path()).unwrap(), hash_file(b.path()).unwrap());
    }

    #[test]
    fn mismatch_detects_changed_kernel() {
        let recorded = InputHashes {
            emulator: [1; 32],
            fault_config: [2; 32],
            kernel: Some([3; 32]),
            bios: None,
        };
        let mut current = recorded.clone();
        current.kernel = Some([9; 32]);
        assert_eq!(first_mismatch(&recorded, &current), Some("kernel"));
    }
}
