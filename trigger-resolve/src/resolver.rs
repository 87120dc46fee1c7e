//! Resolves a fault's relative trigger offset into a concrete trigger
//! address and hit-counter by walking backwards through a golden-run
//! trace.

use std::collections::HashMap;

use fault_model::Trigger;
use trace_diff::{instruction_addresses, TbExec, TbInfo};
use tracing::warn;

use crate::error::TriggerResolveError;

/// The result of a successful resolution: a concrete trigger, and a
/// lifespan possibly extended to compensate for the trigger landing near
/// the very start of the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTrigger {
    pub trigger: Trigger,
    pub adjusted_lifespan: u64,
}

type CacheKey = (u64, i64, u64, u64);

/// Resolves triggers against one golden-run trace, memoizing by
/// `(fault_address, trigger_offset, requested_hitcounter, lifespan)` so a
/// campaign with many faults sharing the same trigger spec only pays for
/// the walk once.
pub struct TriggerResolver<'a> {
    tbexec: Vec<TbExec>,
    tbinfo_by_id: HashMap<u64, &'a TbInfo>,
    cache: HashMap<CacheKey, Result<ResolvedTrigger, TriggerResolveError>>,
}

impl<'a> TriggerResolver<'a> {
    pub fn new(golden_tbexec: &[TbExec], golden_tbinfo: &'a [TbInfo]) -> Self {
        let mut tbexec: Vec<TbExec> = golden_tbexec.to_vec();
        tbexec.sort_unstable_by_key(|e| e.pos);
        let tbinfo_by_id = golden_tbinfo.iter().map(|tb| (tb.id, tb)).collect();
        Self {
            tbexec,
            tbinfo_by_id,
            cache: HashMap::new(),
        }
    }

    /// Resolve one fault's relative trigger. `trigger_offset` must be `<=
    /// 0`; a positive offset is already an absolute address and never
    /// reaches this resolver.
    pub fn resolve(
        &mut self,
        fault_address: u64,
        trigger_offset: i64,
        requested_hitcounter: u64,
        lifespan: u64,
    ) -> Result<ResolvedTrigger, TriggerResolveError> {
        let key = (fault_address, trigger_offset, requested_hitcounter, lifespan);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let result = self.resolve_uncached(fault_address, trigger_offset, requested_hitcounter, lifespan);
        self.cache.insert(key, result.clone());
        result
    }

    fn resolve_uncached(
        &self,
        fault_address: u64,
        trigger_offset: i64,
        requested_hitcounter: u64,
        lifespan: u64,
    ) -> Result<ResolvedTrigger, TriggerResolveError> {
        if lifespan != 0 && trigger_offset + lifespan as i64 < 0 {
            warn!(fault_address, trigger_offset, lifespan, "lifespan too short for trigger offset");
            return Err(TriggerResolveError::LifespanNegative {
                trigger_offset,
                lifespan,
            });
        }

        // Step 1: locate the requested occurrence of fault_address.
        let occurrence_idx = self.locate_occurrence(fault_address, requested_hitcounter)?;
        let occurrence_row = self.tbexec[occurrence_idx];
        let tb = self.tbinfo_by_id(occurrence_row.tb);

        // Step 2: align fault_address to an instruction inside that TB.
        let ascending = ascending_addresses(tb);
        let instr_idx = ascending
            .iter()
            .rposition(|&addr| addr <= fault_address)
            .unwrap_or(0);

        let full_offset = trigger_offset.unsigned_abs();
        if full_offset == 0 {
            let hitcounter = self.hitcounter(occurrence_idx, tb, ascending[instr_idx])?;
            return Ok(ResolvedTrigger {
                trigger: Trigger::Absolute {
                    address: ascending[instr_idx],
                    hitcounter,
                },
                adjusted_lifespan: lifespan,
            });
        }

        // Step 3: walk backwards by `full_offset` instructions.
        match self.walk_backwards(occurrence_idx, instr_idx, full_offset) {
            Some((row_idx, landed_instr_idx)) => {
                let landed_tb = self.tbinfo_by_id(self.tbexec[row_idx].tb);
                let landed_addresses = ascending_addresses(landed_tb);
                let address = landed_addresses[landed_instr_idx];
                let hitcounter = self.hitcounter(row_idx, landed_tb, address)?;
                Ok(ResolvedTrigger {
                    trigger: Trigger::Absolute { address, hitcounter },
                    adjusted_lifespan: lifespan,
                })
            }
            None => {
                // Ran off the start of the trace: land on the fault's own
                // instruction, with lifespan extended so the fault still
                // covers its originally intended position.
                let consumed = full_offset - self.walked_before_running_off(occurrence_idx, instr_idx, full_offset);
                let adjusted = lifespan as i64 + trigger_offset + consumed as i64;
                let adjusted_lifespan = adjusted.max(0) as u64;
                Ok(ResolvedTrigger {
                    trigger: Trigger::Absolute {
                        address: ascending[instr_idx],
                        hitcounter: 0,
                    },
                    adjusted_lifespan,
                })
            }
        }
    }

    fn locate_occurrence(&self, fault_address: u64, requested_hitcounter: u64) -> Result<usize, TriggerResolveError> {
        let mut count = 0u64;
        for (idx, row) in self.tbexec.iter().enumerate() {
            let Some(tb) = self.tbinfo_by_id.get(&row.tb) else {
                continue;
            };
            if tb.id <= fault_address && fault_address < tb.id + tb.size {
                count += 1;
                if count == requested_hitcounter {
                    return Ok(idx);
                }
            }
        }
        Err(TriggerResolveError::NotFound {
            fault_address,
            requested_hitcounter,
        })
    }

    /// Walk backwards by `remaining` instructions from `(row_idx,
    /// instr_idx)`. Returns `None` if the walk runs off the start of the
    /// trace before being satisfied.
    fn walk_backwards(&self, mut row_idx: usize, mut instr_idx: usize, mut remaining: u64) -> Option<(usize, usize)> {
        loop {
            if remaining <= instr_idx as u64 {
                return Some((row_idx, instr_idx - remaining as usize));
            }
            remaining -= instr_idx as u64 + 1;
            if row_idx == 0 {
                return None;
            }
            row_idx -= 1;
            let tb = self.tbinfo_by_id(self.tbexec[row_idx].tb);
            instr_idx = tb.ins_count.saturating_sub(1) as usize;
        }
    }

    /// How many instructions were actually walked before the walk ran off
    /// the start of the trace (used to compute the lifespan adjustment).
    fn walked_before_running_off(&self, mut row_idx: usize, mut instr_idx: usize, total: u64) -> u64 {
        let mut remaining = total;
        loop {
            if remaining <= instr_idx as u64 {
                return 0; // would have succeeded; never actually called in that case
            }
            remaining -= instr_idx as u64 + 1;
            if row_idx == 0 {
                return remaining;
            }
            row_idx -= 1;
            let tb = self.tbinfo_by_id(self.tbexec[row_idx].tb);
            instr_idx = tb.ins_count.saturating_sub(1) as usize;
        }
    }

    /// Step 4: the trigger TB's own hit count, plus contributions from
    /// overlapping sub-TBs and containing super-TBs.
    fn hitcounter(&self, final_row_idx: usize, trigger_tb: &TbInfo, resolved_instruction: u64) -> Result<u64, TriggerResolveError> {
        let mut count = 0u64;
        for row in &self.tbexec[..=final_row_idx] {
            let Some(tb) = self.tbinfo_by_id.get(&row.tb) else {
                continue;
            };
            if overlaps(tb, trigger_tb, resolved_instruction) {
                count = count
                    .checked_add(1)
                    .ok_or(TriggerResolveError::HitcounterOverflow(trigger_tb.id))?;
            }
        }
        Ok(count)
    }

    fn tbinfo_by_id(&self, id: u64) -> &TbInfo {
        self.tbinfo_by_id
            .get(&id)
            .expect("tbexec row referencing an id absent from tbinfo")
    }
}

/// The same TB-occurrence hit-counter [`TriggerResolver::hitcounter`]
/// computes (a TB's own occurrences plus overlapping sub-TBs and containing
/// super-TBs), exposed standalone so `golden-run`'s wildcard expansion can
/// compute the trigger hit-counter of each instruction it expands without
/// constructing a full resolver. `tbexec` must already be sorted ascending
/// by `pos`, as [`TriggerResolver::new`] arranges internally.
pub fn cumulative_hitcounter(
    tbexec: &[TbExec],
    tbinfo_by_id: &HashMap<u64, &TbInfo>,
    up_to_row_idx: usize,
    resolved_instruction: u64,
) -> Result<u64, TriggerResolveError> {
    let trigger_tb = tbinfo_by_id
        .get(&tbexec[up_to_row_idx].tb)
        .expect("row references a tb id absent from tbinfo");
    let mut count = 0u64;
    for row in &tbexec[..=up_to_row_idx] {
        let Some(tb) = tbinfo_by_id.get(&row.tb) else {
            continue;
        };
        if overlaps(tb, trigger_tb, resolved_instruction) {
            count = count
                .checked_add(1)
                .ok_or(TriggerResolveError::HitcounterOverflow(trigger_tb.id))?;
        }
    }
    Ok(count)
}

fn ascending_addresses(tb: &TbInfo) -> Vec<u64> {
    let mut addresses = instruction_addresses(tb);
    addresses.reverse();
    addresses
}

fn tb_range(tb: &TbInfo) -> (u64, u64) {
    (tb.id, tb.id + tb.size)
}

fn contains_range(outer: (u64, u64), inner: (u64, u64)) -> bool {
    outer.0 <= inner.0 && inner.1 <= outer.1
}

fn overlaps(tb: &TbInfo, trigger_tb: &TbInfo, resolved_instruction: u64) -> bool {
    if tb.id == trigger_tb.id {
        return true;
    }
    let tb_r = tb_range(tb);
    let trigger_r = tb_range(trigger_tb);
    if contains_range(trigger_r, tb_r) {
        return true;
    }
    if contains_range(tb_r, trigger_r) && tb.id <= resolved_instruction {
        return true;
    }
    false
}
