//! The two JSON configuration documents the campaign is driven by: an
//! emulator config (what binary, what firmware images) and a fault config
//! (what experiments to run). Both are validated before any emulator is
//! spawned, per spec §7.

use std::path::{Path, PathBuf};

use qemu_ipc::EndPoint;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct EmulatorConfig {
    pub qemu: PathBuf,
    pub kernel: Option<PathBuf>,
    pub plugin: PathBuf,
    pub machine: String,
    pub bios: Option<PathBuf>,
    #[serde(default)]
    pub additional_qemu_args: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EndPointConfig {
    pub address: u64,
    pub counter: u64,
}

impl From<EndPointConfig> for EndPoint {
    fn from(config: EndPointConfig) -> Self {
        EndPoint {
            address: config.address,
            counter: config.counter,
        }
    }
}

/// `end` in the fault config document accepts either one object or a list
/// of objects (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryDumpConfig {
    pub address: u64,
    pub length: u64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaultConfig {
    pub start: Option<EndPointConfig>,
    pub end: Option<OneOrMany<EndPointConfig>>,
    #[serde(default)]
    pub max_instruction_count: u64,
    #[serde(default)]
    pub memorydump: Vec<MemoryDumpConfig>,
    #[serde(default = "default_true")]
    pub tb_exec_list: bool,
    #[serde(default = "default_true")]
    pub tb_info: bool,
    #[serde(default)]
    pub mem_info: bool,
    #[serde(default = "default_true")]
    pub ring_buffer: bool,
    pub faults: Vec<Vec<fault_expand::FaultDeviceConfig>>,
    #[serde(default)]
    pub fault_livespan: Option<serde_json::Value>,
}

impl FaultConfig {
    /// Validates the zero-counter and legacy-key rules from spec §7 before
    /// any emulator is spawned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fault_livespan.is_some() {
            return Err(ConfigError::ObsoleteField);
        }
        if self
            .faults
            .iter()
            .flatten()
            .any(|device| device.extra.contains_key("fault_livespan"))
        {
            return Err(ConfigError::ObsoleteField);
        }
        if let Some(start) = &self.start {
            if start.counter == 0 {
                return Err(ConfigError::ZeroCounter { field: "start" });
            }
        }
        if let Some(end) = &self.end {
            let ends: Vec<EndPointConfig> = match end {
                OneOrMany::One(point) => vec![*point],
                OneOrMany::Many(points) => points.clone(),
            };
            if ends.iter().any(|point| point.counter == 0) {
                return Err(ConfigError::ZeroCounter { field: "end" });
            }
        }
        Ok(())
    }

    pub fn ends(&self) -> Vec<EndPoint> {
        self.end
            .clone()
            .map(Vec::<EndPointConfig>::from)
            .unwrap_or_default()
            .into_iter()
            .map(EndPoint::from)
            .collect()
    }
}

pub fn load_emulator_config(path: &Path) -> Result<EmulatorConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_fault_config(path: &Path) -> Result<FaultConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: FaultConfig = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_legacy_fault_livespan_key() {
        let json = r#"{
            "faults": [[{
                "fault_address": 1,
                "fault_type": "memory",
                "fault_model": "set1",
                "fault_mask": 1,
                "fault_livespan": 5,
                "trigger_address": 1
            }]]
        }"#;
        let config: FaultConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ObsoleteField)));
    }

    #[test]
    fn rejects_zero_counter_at_start() {
        let json = r#"{
            "start": {"address": 1, "counter": 0},
            "faults": []
        }"#;
        let config: FaultConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ZeroCounter { field: "start" })));
    }

    #[test]
    fn end_accepts_single_object_or_list() {
        let single: FaultConfig = serde_json::from_str(r#"{"end": {"address": 1, "counter": 1}, "faults": []}"#).unwrap();
        assert_eq!(single.ends().len(), 1);

        let many: FaultConfig =
            serde_json::from_str(r#"{"end": [{"address": 1, "counter": 1}, {"address": 2, "counter": 1}], "faults": []}"#).unwrap();
        assert_eq!(many.ends().len(), 2);
    }
}
