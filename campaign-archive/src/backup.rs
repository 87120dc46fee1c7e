//! The `Backup` group: written exactly once, before any worker starts,
//! so a crashed or interrupted campaign can be resumed or audited without
//! re-reading the original fault configuration.

use fault_model::FaultCombination;
use hdf5::types::VarLenAscii;
use hdf5::File as H5File;

use crate::error::ArchiveError;
use crate::hash::{InputHashes, HASH_ALGORITHM};
use crate::schema::GROUP_BACKUP;

/// What `Backup` records: the fully expanded fault list (post golden-run,
/// post wildcard expansion, post trigger resolution), the resolved
/// configuration that produced it (serialized verbatim as JSON so a human
/// can diff it), and the content hashes of the four inputs.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BackupRecord {
    pub expanded_faults: Vec<FaultCombination>,
    pub resolved_config_json: String,
    pub hashes: InputHashes,
}

pub fn write_backup(file: &H5File, record: &BackupRecord) -> Result<(), ArchiveError> {
    let group = file.create_group(GROUP_BACKUP)?;

    let expanded_json = serde_json::to_string(&record.expanded_faults)?;
    group
        .new_dataset::<VarLenAscii>()
        .create("expanded_faults_json")?
        .write_scalar(&VarLenAscii::from_ascii(&expanded_json).unwrap_or_else(|_| hdf5::types::VarLenAscii::from_ascii("").unwrap()))?;
    group
        .new_dataset::<VarLenAscii>()
        .create("resolved_config_json")?
        .write_scalar(&VarLenAscii::from_ascii(&record.resolved_config_json).unwrap_or_else(|_| hdf5::types::VarLenAscii::from_ascii("").unwrap()))?;

    let hash_group = group.create_group("hash")?;
    hash_group.new_attr::<VarLenAscii>().create("algorithm")?.write_scalar(&VarLenAscii::from_ascii(HASH_ALGORITHM).unwrap_or_else(|_| hdf5::types::VarLenAscii::from_ascii("").unwrap()))?;
    write_hash_dataset(&hash_group, "emulator", &record.hashes.emulator)?;
    write_hash_dataset(&hash_group, "fault_config", &record.hashes.fault_config)?;
    if let Some(kernel) = &record.hashes.kernel {
        write_hash_dataset(&hash_group, "kernel", kernel)?;
    }
    if let Some(bios) = &record.hashes.bios {
        write_hash_dataset(&hash_group, "bios", bios)?;
    }
    Ok(())
}

fn write_hash_dataset(group: &hdf5::Group, name: &str, digest: &[u8; 32]) -> Result<(), ArchiveError> {
    group.new_dataset::<u8>().shape(32).create(name)?.write_raw(digest)?;
    Ok(())
}

/// Read the `Backup` group back. Returns [`ArchiveError::BackupMissing`]
/// if the archive has no such group at all.
pub fn read_backup(file: &H5File) -> Result<BackupRecord, ArchiveError> {
    let group = file.group(GROUP_BACKUP).map_err(|_| ArchiveError::BackupMissing)?;

    let expanded_json: VarLenAscii = group.dataset("expanded_faults_json")?.read_scalar()?;
    let expanded_faults: Vec<FaultCombination> = serde_json::from_str(expanded_json.as_str())?;

    let resolved_config_json: VarLenAscii = group.dataset("resolved_config_json")?.read_scalar()?;

    let hash_group = group.group("hash")?;
    let emulator = read_hash_dataset(&hash_group, "emulator")?;
    let fault_config = read_hash_dataset(&hash_group, "fault_config")?;
    let kernel = hash_group.dataset("kernel").ok().map(|_| read_hash_dataset(&hash_group, "kernel")).transpose()?;
    let bios = hash_group.dataset("bios").ok().map(|_| read_hash_dataset(&hash_group, "bios")).transpose()?;

    Ok(BackupRecord {
        expanded_faults,
        resolved_config_json: resolved_config_json.as_str().to_string(),
        hashes: InputHashes {
            emulator,
            fault_config,
            kernel,
            bios,
        },
    })
}

fn read_hash_dataset(group: &hdf5::Group, name: &str) -> Result<[u8; 32], ArchiveError> {
    let raw: Vec<u8> = group.dataset(name)?.read_raw()?;
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&raw[..32.min(raw.len())]);
    Ok(digest)
}
