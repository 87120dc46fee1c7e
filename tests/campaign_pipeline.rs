//! Exercises the expansion-to-archive pipeline end to end, without an
//! emulator subprocess: a synthetic golden trace stands in for what a real
//! qemu worker would report, so wildcard expansion, trigger resolution and
//! archival can all be verified against known-good inputs.

use fault_expand::FaultDeviceConfig;
use fault_model::FaultCombination;
use serde_json::json;
use trace_diff::{TbExec, TbInfo};

fn device(value: serde_json::Value) -> FaultDeviceConfig {
    serde_json::from_value(value).unwrap()
}

fn golden_trace() -> (Vec<TbExec>, Vec<TbInfo>) {
    let tbinfo = vec![
        TbInfo {
            id: 0x8000_0000,
            size: 8,
            ins_count: 2,
            num_exec: 1,
            assembler: "[ 0x8000000 ] ldr r0, [r1]\n[ 0x8000004 ] str r0, [r2]\n".to_string(),
        },
        TbInfo {
            id: 0x8000_0008,
            size: 4,
            ins_count: 1,
            num_exec: 1,
            assembler: "[ 0x8000008 ] bx lr\n".to_string(),
        },
    ];
    let tbexec = vec![
        TbExec { tb: 0x8000_0000, pos: 0 },
        TbExec { tb: 0x8000_0008, pos: 1 },
    ];
    (tbexec, tbinfo)
}

/// Scenario A: a single explicit fault, on a single device, survives the
/// whole expand -> wildcard -> trigger-resolve -> coverage-check pipeline
/// unchanged and ends up as exactly one combination.
#[test]
fn single_explicit_fault_survives_the_full_pipeline() {
    let dev = device(json!({
        "fault_address": 0x8000000i64,
        "fault_type": "memory",
        "fault_model": "set1",
        "fault_mask": 1,
        "trigger_address": 0x8000000i64,
        "trigger_hitcounter": 1,
    }));
    let expanded = fault_expand::expand_device(&dev, 0).unwrap();
    let combined = fault_expand::combine_devices(vec![expanded], 0);
    let flattened = fault_expand::flatten_combinations(vec![combined], 0);
    assert_eq!(flattened.len(), 1);

    let (tbexec, tbinfo) = golden_trace();
    let expanded = golden_run::generate_wildcard_faults(flattened, &tbexec, &tbinfo);
    let resolved = golden_run::calculate_trigger_addresses(expanded, &tbexec, &tbinfo);
    let kept = golden_run::checktriggers_in_tb(resolved, &tbinfo);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].index, 0);
    assert_eq!(kept[0].faults[0].fault_address.explicit(), Some(0x8000000));
}

/// Scenario B: a fault configured with the `-1` sentinel address takes on
/// its own trigger's resolved address once trigger resolution has run, and
/// survives the coverage check because that address falls inside a golden
/// TB.
#[test]
fn sentinel_fault_address_resolves_to_trigger_address_end_to_end() {
    let dev = device(json!({
        "fault_address": -1,
        "fault_type": "memory",
        "fault_model": "set1",
        "fault_mask": 1,
        "trigger_address": 0x8000004i64,
        "trigger_hitcounter": 1,
    }));
    let expanded = fault_expand::expand_device(&dev, 0).unwrap();
    let combined = fault_expand::combine_devices(vec![expanded], 0);
    let flattened = fault_expand::flatten_combinations(vec![combined], 0);
    assert_eq!(flattened.len(), 1);
    assert_eq!(flattened[0].faults[0].fault_address, fault_model::FaultAddress::UseTrigger);

    let (tbexec, tbinfo) = golden_trace();
    let expanded = golden_run::generate_wildcard_faults(flattened, &tbexec, &tbinfo);
    let resolved = golden_run::calculate_trigger_addresses(expanded, &tbexec, &tbinfo);
    let resolved = golden_run::resolve_use_trigger_addresses(resolved);
    let kept = golden_run::checktriggers_in_tb(resolved, &tbinfo);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].faults[0].fault_address.explicit(), Some(0x8000004));
}

/// Scenario C: a wildcard device, crossed against a second two-valued
/// device, expands into one combination per (instruction, device-value)
/// pair once a golden trace is available.
#[test]
fn wildcard_device_crossed_with_concrete_device_expands_per_instruction() {
    let wildcard_dev = device(json!({
        "fault_address": "*",
        "fault_type": "memory",
        "fault_model": "set1",
        "fault_mask": 1,
        "trigger_address": 1,
    }));
    let concrete_dev = device(json!({
        "fault_address": [0x9000000i64, 0x9000004i64],
        "fault_type": "register",
        "fault_model": "toggle",
        "fault_mask": 1,
        "trigger_address": 0x9000000i64,
    }));

    let wildcard_expanded = fault_expand::expand_device(&wildcard_dev, 0).unwrap();
    let concrete_expanded = fault_expand::expand_device(&concrete_dev, 0).unwrap();
    assert_eq!(wildcard_expanded.len(), 1);
    assert_eq!(concrete_expanded.len(), 2);

    let combined = fault_expand::combine_devices(vec![wildcard_expanded, concrete_expanded], 0);
    assert_eq!(combined.len(), 2);
    assert!(combined.iter().all(|c| c.faults[0].fault_address.is_wildcard()));

    let flattened = fault_expand::flatten_combinations(vec![combined], 0);
    let (tbexec, tbinfo) = golden_trace();
    let expanded = golden_run::generate_wildcard_faults(flattened, &tbexec, &tbinfo);

    // Three instructions in the golden trace times two concrete-device
    // combinations going in.
    assert_eq!(expanded.len(), 6);
    assert!(expanded.iter().all(|c| c.faults.len() == 2));
    assert!(expanded.iter().all(|c| !c.faults[0].fault_address.is_wildcard()));
}

/// Scenario F: a resumed campaign whose emulator binary or fault config no
/// longer matches what was recorded aborts with a hash mismatch rather than
/// silently running against different inputs.
#[test]
fn resume_with_changed_input_reports_hash_mismatch() {
    use std::io::Write;

    let mut original = tempfile::NamedTempFile::new().unwrap();
    original.write_all(b"emulator-binary-v1").unwrap();
    let recorded = campaign_archive::compute_input_hashes(&campaign_archive::InputPaths {
        emulator: original.path(),
        fault_config: original.path(),
        kernel: None,
        bios: None,
    })
    .unwrap();

    let mut changed = tempfile::NamedTempFile::new().unwrap();
    changed.write_all(b"emulator-binary-v2-different-bytes").unwrap();
    let current = campaign_archive::compute_input_hashes(&campaign_archive::InputPaths {
        emulator: changed.path(),
        fault_config: original.path(),
        kernel: None,
        bios: None,
    })
    .unwrap();

    let mismatch = campaign_archive::first_mismatch(&recorded, &current);
    assert_eq!(mismatch, Some("emulator"));
}

/// Scenario E: filtering an already-fully-recorded campaign for
/// `--missing-only` is a no-op, and a partially recorded one only keeps the
/// combinations not yet written.
#[test]
fn missing_only_resume_keeps_unrecorded_combinations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resume.h5");
    let archive = campaign_archive::CampaignArchive::create(&path, 1).unwrap();

    let recorded_combo = sample_combination(0, 0x8000000);
    let outcome = campaign_archive::ExperimentOutcome {
        endpoint: 0,
        end_reason: "reached end point".to_string(),
        trace: trace_diff::Trace::default(),
    };
    archive.write_experiment(&recorded_combo, &outcome, 2).unwrap();

    let missing_combo = sample_combination(1, 0x8000004);
    let recorded = archive.recorded_canonical_strings().unwrap();
    let remaining = campaign_archive::filter_missing_only(vec![recorded_combo.clone(), missing_combo.clone()], &recorded);

    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].canonical_string(), missing_combo.canonical_string());
}

fn sample_combination(index: u64, address: u64) -> FaultCombination {
    use fault_model::{Fault, FaultAddress, FaultKind, FaultModel, Mask, Trigger};
    let fault = Fault::new(
        FaultAddress::Explicit(address),
        vec![],
        FaultKind::Memory,
        FaultModel::Set1,
        0,
        Mask::U128(1),
        0,
        Trigger::Absolute { address, hitcounter: 1 },
    )
    .unwrap();
    FaultCombination::new(index, vec![fault])
}
