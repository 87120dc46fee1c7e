//! Append-only writes into the HDF5 archive: `Pregoldenrun`, `Goldenrun`,
//! and `fault/experimentNNNN` groups.

use fault_model::FaultCombination;
use hdf5::{File as H5File, Group};
use trace_diff::Trace;

use crate::error::ArchiveError;
use crate::schema::{
    self, ArmRegisterRow, FaultRow, MemInfoRow, RiscVRegisterRow, TbExecRow, TbInfoRow,
};

/// One experiment's outcome as handed from the worker pipeline to the
/// archive: the post-processed (filtered, diffed) trace plus the
/// end-of-run metadata the emulator reported.
#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    pub endpoint: u8,
    pub end_reason: String,
    pub trace: Trace,
}

pub struct CampaignArchive {
    file: H5File,
    compression: u8,
}

impl CampaignArchive {
    pub fn create(path: &std::path::Path, compression: u8) -> Result<Self, ArchiveError> {
        let file = H5File::create(path)?;
        Ok(Self { file, compression })
    }

    /// Re-open an existing archive for append (`--append`/resume paths).
    pub fn open_append(path: &std::path::Path, compression: u8) -> Result<Self, ArchiveError> {
        let file = H5File::open_rw(path)?;
        Ok(Self { file, compression })
    }

    pub fn write_pregolden(&self, outcome: &ExperimentOutcome) -> Result<(), ArchiveError> {
        let group = self.file.create_group(schema::GROUP_PREGOLDEN)?;
        self.write_outcome_group(&group, outcome)
    }

    pub fn write_golden(&self, outcome: &ExperimentOutcome) -> Result<(), ArchiveError> {
        let group = self.file.create_group(schema::GROUP_GOLDEN)?;
        self.write_outcome_group(&group, outcome)
    }

    /// Write one experiment group. `total_experiments` decides the
    /// zero-padding width of the group name. If the name is already taken
    /// (a stale partial write from an earlier crashed run), bump the index
    /// and warn, matching `hdf5logger.py`'s de-duplication guard.
    pub fn write_experiment(
        &self,
        combination: &FaultCombination,
        outcome: &ExperimentOutcome,
        total_experiments: u64,
    ) -> Result<(), ArchiveError> {
        let root = match self.file.group(schema::GROUP_FAULT_ROOT) {
            Ok(group) => group,
            Err(_) => self.file.create_group(schema::GROUP_FAULT_ROOT)?,
        };

        let mut index = combination.index;
        let group = loop {
            let name = schema::experiment_group_name(index, total_experiments);
            match root.create_group(&name) {
                Ok(group) => break group,
                Err(_) if root.group(&name).is_ok() => {
                    tracing::warn!(name, "experiment group name already taken, bumping index");
                    index = index
                        .checked_add(total_experiments.max(1))
                        .ok_or(ArchiveError::ExperimentNameExhausted { index })?;
                }
                Err(err) => return Err(err.into()),
            }
        };

        let faults: Vec<FaultRow> = combination.faults.iter().map(FaultRow::from).collect();
        self.write_table(&group, schema::TABLE_FAULTS, &faults)?;
        group.new_attr::<u8>().create(schema::ATTR_ENDPOINT)?.write_scalar(&outcome.endpoint)?;
        group
            .new_attr::<hdf5::types::VarLenAscii>()
            .create(schema::ATTR_END_REASON)?
            .write_scalar(&hdf5::types::VarLenAscii::from_ascii(&outcome.end_reason).unwrap_or_else(|_| hdf5::types::VarLenAscii::from_ascii("").unwrap()))?;

        self.write_outcome_group(&group, outcome)
    }

    fn write_outcome_group(&self, group: &Group, outcome: &ExperimentOutcome) -> Result<(), ArchiveError> {
        let tbinfo: Vec<TbInfoRow> = outcome.trace.tbinfo.iter().map(TbInfoRow::from).collect();
        let tbexec: Vec<TbExecRow> = outcome.trace.tbexec.iter().map(TbExecRow::from).collect();
        let meminfo: Vec<MemInfoRow> = outcome.trace.meminfo.iter().map(MemInfoRow::from).collect();
        let (arm, riscv) = schema::split_registers(&outcome.trace.registers);

        self.write_table(group, schema::TABLE_TBINFO, &tbinfo)?;
        self.write_table(group, schema::TABLE_TBEXEC, &tbexec)?;
        self.write_table(group, schema::TABLE_MEMINFO, &meminfo)?;
        if !arm.is_empty() {
            self.write_table(group, schema::TABLE_REGISTERS_ARM, &arm)?;
        }
        if !riscv.is_empty() {
            self.write_table(group, schema::TABLE_REGISTERS_RISCV, &riscv)?;
        }
        Ok(())
    }

    fn write_table<T: hdf5::H5Type>(&self, group: &Group, name: &str, rows: &[T]) -> Result<(), ArchiveError> {
        let builder = group.new_dataset_builder::<T>();
        let builder = if self.compression > 0 {
            builder.deflate(self.compression)
        } else {
            builder
        };
        builder.with_data(rows).create(name)?;
        Ok(())
    }

    /// The canonical fault string of every fault combination already
    /// recorded under `/fault/*`, used by the `--missing-only` resume
    /// path. Reads the `faults` table of each experiment group back and
    /// joins each row's stored canonical-string identity.
    pub fn recorded_canonical_strings(&self) -> Result<std::collections::HashSet<String>, ArchiveError> {
        let mut seen = std::collections::HashSet::new();
        let Ok(root) = self.file.group(schema::GROUP_FAULT_ROOT) else {
            return Ok(seen);
        };
        for name in root.member_names()? {
            let Ok(group) = root.group(&name) else { continue };
            let Ok(dataset) = group.dataset(schema::TABLE_FAULTS) else { continue };
            let rows: Vec<FaultRow> = dataset.read_raw()?;
            let canonical = rows
                .iter()
                .map(|row| row.canonical.as_str().to_string())
                .collect::<Vec<_>>()
                .join(";");
            seen.insert(canonical);
        }
        Ok(seen)
    }

    pub fn into_file(self) -> H5File {
        self.file
    }

    /// The underlying HDF5 handle, for [`crate::write_backup`]/[`crate::read_backup`]
    /// which operate on a `Backup` group directly rather than through a
    /// `CampaignArchive` method.
    pub fn file(&self) -> &H5File {
        &self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault_model::{Fault, FaultAddress, FaultKind, FaultModel, Mask, Trigger};
    use trace_diff::{TbExec, TbInfo};

    fn sample_combination() -> FaultCombination {
        let fault = Fault::new(
            FaultAddress::Explicit(0x8000_00c0),
            vec![],
            FaultKind::Memory,
            FaultModel::Set1,
            10,
            Mask::U128(4),
            0,
            Trigger::Absolute {
                address: 0x8000_00c2,
                hitcounter: 1,
            },
        )
        .unwrap();
        FaultCombination::new(0, vec![fault])
    }

    fn sample_outcome() -> ExperimentOutcome {
        ExperimentOutcome {
            endpoint: 1,
            end_reason: "reached end point".to_string(),
            trace: Trace {
                tbinfo: vec![TbInfo {
                    id: 0x8000_0000,
                    size: 8,
                    ins_count: 2,
                    num_exec: 1,
                    assembler: "[ 0x8000000 ] a\n[ 0x8000004 ] b\n".to_string(),
                }],
                tbexec: vec![TbExec { tb: 0x8000_0000, pos: 0 }],
                meminfo: vec![],
                registers: vec![],
            },
        }
    }

    #[test]
    fn scenario_a_single_experiment_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campaign.h5");
        let archive = CampaignArchive::create(&path, 1).unwrap();

        let combination = sample_combination();
        let outcome = sample_outcome();
        archive.write_experiment(&combination, &outcome, 1).unwrap();

        let recorded = archive.recorded_canonical_strings().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(recorded.contains(&combination.canonical_string()));
    }
}
