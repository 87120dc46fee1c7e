//! Expands wildcard fault addresses into one concrete fault per
//! instruction seen while the wildcard range is "active" during the golden
//! run.

use fault_model::{Fault, FaultAddress, FaultCombination, Trigger, WildcardRange};
use trace_diff::{instruction_addresses, TbExec, TbInfo};
use tracing::{debug, error};

/// Walk the golden `tbexec` in order and emit one expanded, concrete fault
/// per instruction seen while a wildcard range is active. Combinations with
/// no wildcard fault pass through unchanged; combinations whose sole fault
/// is a wildcard are replaced by the expanded set.
pub fn generate_wildcard_faults(
    combinations: Vec<FaultCombination>,
    golden_tbexec: &[TbExec],
    golden_tbinfo: &[TbInfo],
) -> Vec<FaultCombination> {
    let tbinfo_by_id: std::collections::HashMap<u64, &TbInfo> =
        golden_tbinfo.iter().map(|tb| (tb.id, tb)).collect();
    let mut ordered = golden_tbexec.to_vec();
    ordered.sort_unstable_by_key(|e| e.pos);

    let mut out = Vec::new();
    let mut next_index = combinations.iter().map(|c| c.index).max().map(|m| m + 1).unwrap_or(0);

    for combination in combinations {
        let wildcard_index = combination
            .faults
            .iter()
            .position(|fault| fault.fault_address.is_wildcard());
        let Some(wildcard_pos) = wildcard_index else {
            out.push(combination);
            continue;
        };
        let template = combination.faults[wildcard_pos].clone();
        let FaultAddress::Wildcard(range) = template.fault_address else {
            unreachable!("position located by is_wildcard()");
        };

        // A start hit-counter of 0 means no explicit start was configured
        // (a lone `"*"`): the range is active from the very first
        // instruction of the trace.
        let has_start_gate = range.start.hitcounter != 0;
        let mut active = !has_start_gate;
        let mut start_hits = 0u64;

        for (row_idx, row) in ordered.iter().enumerate() {
            let Some(tb) = tbinfo_by_id.get(&row.tb) else {
                continue;
            };
            for &address in &ascending(tb) {
                if has_start_gate && !active && address == range.start.address {
                    start_hits += 1;
                    if start_hits >= range.start.hitcounter {
                        active = true;
                        debug!(address, "wildcard range activated");
                    }
                } else if has_start_gate && range.local && active && address == range.start.address {
                    active = true;
                    debug!(address, "local wildcard re-armed");
                }

                if active {
                    match trigger_resolve::cumulative_hitcounter(&ordered, &tbinfo_by_id, row_idx, address) {
                        Ok(hitcounter) => {
                            let mut expanded = template.clone();
                            expanded.fault_address = FaultAddress::Explicit(address);
                            expanded.trigger = Trigger::Absolute { address, hitcounter };
                            out.push(FaultCombination::new(next_index, vec![expanded]));
                            next_index += 1;
                        }
                        Err(err) => {
                            error!(%err, address, "hit-counter overflow while expanding wildcard fault, instruction dropped");
                        }
                    }
                }

                if active && !range.local && range.end.hitcounter != 0 && address == range.end.address {
                    active = false;
                    debug!(address, "wildcard range deactivated");
                }
            }
        }
        if active && !range.local {
            debug!("wildcard range never closed before trace end; closing implicitly");
        }
    }
    out
}

fn ascending(tb: &TbInfo) -> Vec<u64> {
    let mut addresses = instruction_addresses(tb);
    addresses.reverse();
    addresses
}
