//! The top-level façade: loads configuration, runs (or resumes) the golden
//! phase, expands the campaign's fault list, and drives the scheduler,
//! writing every outcome into the archive as it completes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use campaign_archive::{BackupRecord, CampaignArchive, ExperimentOutcome, InputHashes, InputPaths};
use campaign_scheduler::{bounded_channel, RamSample, Scheduler, SchedulerConfig};
use fault_model::FaultCombination;
use qemu_ipc::{Control, EmulatorLaunch, EndPoint, FaultPack};
use tracing::{info, warn};
use trace_diff::{filter_artefacts, reverse_ring_buffer, unique_to_self, Trace};

use crate::cli::Cli;
use crate::config::{self, EmulatorConfig, FaultConfig};
use crate::error::{CampaignError, ConfigError};

/// A very large instruction budget for runs that must reach a configured
/// point rather than being cut off by it: the pre-golden run, and the
/// golden run itself. The budget that actually bounds fault experiments is
/// derived from the golden run's own length afterwards.
const UNBOUNDED_DURATION: u64 = u64::MAX;

/// One completed experiment as handed from a worker thread to the logger
/// thread. `outcome` is `Err` when the emulator could not be driven to
/// completion at all; such experiments are logged and skipped rather than
/// aborting the whole campaign.
struct ExperimentResult {
    combination: FaultCombination,
    outcome: Result<ExperimentOutcome, qemu_ipc::IpcError>,
}

pub fn run(cli: Cli) -> Result<(), CampaignError> {
    if cli.gdb && cli.worker != 1 {
        return Err(ConfigError::GdbRequiresSingleWorker { worker: cli.worker }.into());
    }

    let emulator_config = config::load_emulator_config(&cli.qemu)?;
    let fault_config = config::load_fault_config(&cli.faults)?;

    let launch = EmulatorLaunch {
        emulator_path: emulator_config.qemu.clone(),
        plugin_path: emulator_config.plugin.clone(),
        machine: emulator_config.machine.clone(),
        bios_path: emulator_config.bios.clone(),
        kernel_path: emulator_config.kernel.clone(),
        debug_plugin: cli.debug,
        custom_args: emulator_config.additional_qemu_args.clone(),
        gdb: cli.gdb,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(Arc::clone(&cancel));

    let archive_exists = cli.hdf5file.exists();
    if archive_exists && !cli.overwrite && !cli.append {
        return Err(ConfigError::ArchiveExistsNeedsFlag {
            path: cli.hdf5file.display().to_string(),
        }
        .into());
    }
    let resume = archive_exists && !cli.overwrite;

    let archive = if resume {
        CampaignArchive::open_append(&cli.hdf5file, cli.compressionlevel)?
    } else {
        CampaignArchive::create(&cli.hdf5file, cli.compressionlevel)?
    };

    let current_hashes = compute_current_hashes(&emulator_config, &cli)?;
    let resumed_backup = if resume {
        let backup = campaign_archive::read_backup(archive.file())?;
        if let Some(input) = campaign_archive::first_mismatch(&backup.hashes, &current_hashes) {
            return Err(campaign_archive::ArchiveError::HashMismatch {
                input: input.to_string(),
            }
            .into());
        }
        Some(backup)
    } else {
        None
    };

    let driver = golden_run::GoldenRunDriver {
        worker_id: 0,
        launch: &launch,
        cancel: Arc::clone(&cancel),
    };

    let start = fault_config.start.map(EndPoint::from);
    if let Some(start_point) = start {
        let pregolden_data = driver.run_pregolden(start_point)?;
        archive.write_pregolden(&ExperimentOutcome {
            endpoint: 0,
            end_reason: pregolden_data.end_reason.clone().unwrap_or_default(),
            trace: Trace::from(&pregolden_data),
        })?;
    }

    let tb_exec_list_ring_buffer = fault_config.ring_buffer && !cli.disable_ring_buffer;
    let golden_config = golden_run::GoldenRunConfig {
        start,
        ends: fault_config.ends(),
        configured_max_duration: UNBOUNDED_DURATION,
        tb_exec_list_ring_buffer,
    };
    let golden_data = driver.run_golden(&golden_config)?;
    let golden_raw = Trace::from(&golden_data);
    let golden_trace = if tb_exec_list_ring_buffer {
        reverse_ring_buffer(golden_raw)
    } else {
        let tbinfo = golden_raw.tbinfo.clone();
        filter_artefacts(golden_raw, &tbinfo)
    };
    archive.write_golden(&ExperimentOutcome {
        endpoint: 0,
        end_reason: golden_data.end_reason.clone().unwrap_or_default(),
        trace: golden_trace.clone(),
    })?;

    let mut combinations = match resumed_backup {
        Some(ref backup) => backup.expanded_faults.clone(),
        None => {
            let combos = expand_campaign(&fault_config, cli.indexbase)?;
            let combos = golden_run::generate_wildcard_faults(combos, &golden_trace.tbexec, &golden_trace.tbinfo);
            let combos = golden_run::calculate_trigger_addresses(combos, &golden_trace.tbexec, &golden_trace.tbinfo);
            let combos = golden_run::resolve_use_trigger_addresses(combos);
            golden_run::checktriggers_in_tb(combos, &golden_trace.tbinfo)
        }
    };

    if !resume {
        let resolved_config_json = resolved_config_json(&cli)?;
        campaign_archive::write_backup(
            archive.file(),
            &BackupRecord {
                expanded_faults: combinations.clone(),
                resolved_config_json,
                hashes: current_hashes,
            },
        )?;
    }

    if cli.missing_only {
        let recorded = archive.recorded_canonical_strings()?;
        combinations = campaign_archive::filter_missing_only(combinations, &recorded);
    }

    info!(total = combinations.len(), "campaign expanded");

    if cli.goldenrun_only {
        info!("--goldenrun-only set, stopping after the golden phase");
        return Ok(());
    }

    run_campaign(&cli, &launch, &golden_config, &fault_config, golden_trace, combinations, archive, cancel)
}

#[allow(clippy::too_many_arguments)]
fn run_campaign(
    cli: &Cli,
    launch: &EmulatorLaunch,
    golden_config: &golden_run::GoldenRunConfig,
    fault_config: &FaultConfig,
    golden_trace: Trace,
    combinations: Vec<FaultCombination>,
    archive: CampaignArchive,
    cancel: Arc<AtomicBool>,
) -> Result<(), CampaignError> {
    let total = combinations.len() as u64;
    let started = Instant::now();

    let (tx, rx) = bounded_channel::<ExperimentResult>();
    let scheduler = Scheduler::new(
        SchedulerConfig {
            num_workers: cli.worker,
            queue_depth: cli.queuedepth,
        },
        Arc::clone(&cancel),
    );

    let logger = thread::spawn(move || {
        let mut logged = 0u64;
        for result in rx.iter() {
            match result.outcome {
                Ok(outcome) => match archive.write_experiment(&result.combination, &outcome, total) {
                    Ok(()) => logged += 1,
                    Err(err) => warn!(%err, index = result.combination.index, "failed to write experiment to archive"),
                },
                Err(err) => warn!(%err, index = result.combination.index, "experiment failed, not recorded"),
            }
        }
        logged
    });

    let launch = launch.clone();
    let ends = golden_config.ends.clone();
    let start = golden_config.start;
    let ring_buffer = golden_config.tb_exec_list_ring_buffer;
    let max_duration = golden_run::max_instruction_count(&golden_trace.tbinfo, fault_config.max_instruction_count);
    let tb_exec_list = fault_config.tb_exec_list;
    let tb_info = fault_config.tb_info;
    let mem_info = fault_config.mem_info;

    scheduler.run(combinations, tx, move |combination, worker_cancel, ram_tx| {
        let control = Control {
            max_duration,
            num_faults: combination.faults.len() as u32,
            tb_exec_list,
            tb_info,
            mem_info,
            start_address: start,
            end_points: ends.clone(),
            tb_exec_list_ring_buffer: ring_buffer,
            full_mem_dump: false,
            memorydumps: vec![],
        };
        let fault_pack = FaultPack::from_faults(&combination.faults);

        let (sample_tx, sample_rx) = mpsc::channel::<u64>();
        let forward_tx = ram_tx.clone();
        let forwarder = thread::spawn(move || {
            while let Ok(bytes) = sample_rx.recv() {
                if forward_tx.send(RamSample { rss_bytes: bytes }).is_err() {
                    break;
                }
            }
        });

        let outcome = qemu_ipc::run_experiment(combination.index, &launch, &control, &fault_pack, &worker_cancel, Some(&sample_tx)).map(|data| {
            let raw = Trace::from(&data);
            let filtered = if ring_buffer {
                reverse_ring_buffer(raw)
            } else {
                filter_artefacts(raw, &golden_trace.tbinfo)
            };
            ExperimentOutcome {
                endpoint: data
                    .end_point
                    .and_then(|ep| ends.iter().position(|e| *e == ep))
                    .map(|pos| pos as u8)
                    .unwrap_or(0),
                end_reason: data.end_reason.unwrap_or_default(),
                trace: Trace {
                    tbinfo: unique_to_self(filtered.tbinfo, &golden_trace.tbinfo),
                    tbexec: unique_to_self(filtered.tbexec, &golden_trace.tbexec),
                    meminfo: unique_to_self(filtered.meminfo, &golden_trace.meminfo),
                    registers: unique_to_self(filtered.registers, &golden_trace.registers),
                },
            }
        });

        drop(sample_tx);
        let _ = forwarder.join();

        ExperimentResult { combination, outcome }
    });

    let logged = logger.join().unwrap_or(0);
    info!(logged, total, elapsed_secs = started.elapsed().as_secs_f64(), "campaign finished");
    Ok(())
}

fn expand_campaign(fault_config: &FaultConfig, index_base: u64) -> Result<Vec<FaultCombination>, CampaignError> {
    let mut groups = Vec::with_capacity(fault_config.faults.len());
    for devices in &fault_config.faults {
        let mut per_device = Vec::with_capacity(devices.len());
        for device in devices {
            per_device.push(fault_expand::expand_device(device, 0)?);
        }
        groups.push(fault_expand::combine_devices(per_device, 0));
    }
    Ok(fault_expand::flatten_combinations(groups, index_base))
}

fn compute_current_hashes(emulator_config: &EmulatorConfig, cli: &Cli) -> Result<InputHashes, CampaignError> {
    Ok(campaign_archive::compute_input_hashes(&InputPaths {
        emulator: &emulator_config.qemu,
        fault_config: &cli.faults,
        kernel: emulator_config.kernel.as_deref(),
        bios: emulator_config.bios.as_deref(),
    })?)
}

fn resolved_config_json(cli: &Cli) -> Result<String, CampaignError> {
    let emulator_value = read_json(&cli.qemu)?;
    let fault_value = read_json(&cli.faults)?;
    Ok(serde_json::json!({ "emulator": emulator_value, "fault": fault_value }).to_string())
}

fn read_json(path: &Path) -> Result<serde_json::Value, CampaignError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CampaignError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| {
        ConfigError::Parse {
            path: path.display().to_string(),
            source,
        }
        .into()
    })
}

fn install_ctrlc_handler(cancel: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        warn!("interrupt received, winding down");
        cancel.store(true, Ordering::SeqCst);
    });
    if let Err(err) = result {
        warn!(%err, "failed to install Ctrl-C handler");
    }
}
