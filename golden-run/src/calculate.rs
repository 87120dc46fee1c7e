//! The remaining golden-run post-processing steps: resolving relative
//! triggers against the trace, dropping faults whose trigger can never
//! fire, and computing the campaign-wide instruction budget.

use fault_model::{Fault, FaultAddress, FaultCombination, Trigger};
use trace_diff::{TbExec, TbInfo};
use tracing::{error, warn};
use trigger_resolve::TriggerResolver;

/// Resolve every fault's relative-offset trigger (`trigger_address < 0`)
/// against the golden trace. Faults with an already-absolute trigger pass
/// through unchanged. A fault whose trigger address is itself unresolved
/// (wildcard expansion failed upstream, which should not happen by this
/// point) is left as-is.
pub fn calculate_trigger_addresses(
    combinations: Vec<FaultCombination>,
    golden_tbexec: &[TbExec],
    golden_tbinfo: &[TbInfo],
) -> Vec<FaultCombination> {
    let mut resolver = TriggerResolver::new(golden_tbexec, golden_tbinfo);
    combinations
        .into_iter()
        .map(|combination| {
            let faults = combination
                .faults
                .into_iter()
                .map(|fault| resolve_one(&mut resolver, fault))
                .collect();
            FaultCombination::new(combination.index, faults)
        })
        .collect()
}

fn resolve_one(resolver: &mut TriggerResolver<'_>, mut fault: Fault) -> Fault {
    let Trigger::RelativeOffset { offset, hitcounter } = fault.trigger else {
        return fault;
    };
    let fault_address = match fault.fault_address.explicit() {
        Some(address) => address,
        None => {
            warn!("cannot resolve relative trigger against a non-concrete fault address");
            fault.trigger = Trigger::Unresolved;
            return fault;
        }
    };
    match resolver.resolve(fault_address, offset, hitcounter, fault.lifespan) {
        Ok(resolved) => {
            fault.trigger = resolved.trigger;
            fault.lifespan = resolved.adjusted_lifespan;
        }
        Err(err) => {
            error!(%err, fault_address, "trigger resolution failed, fault will be dropped");
            fault.trigger = Trigger::Unresolved;
        }
    }
    fault
}

/// Rewrite every fault whose address is the `-1` ("use the trigger address")
/// sentinel to the fault's own resolved trigger address, once trigger
/// resolution has run. A trigger that is still relative or unresolved at
/// this point (resolution failed, or the fault's own address was itself
/// `UseTrigger` so the walk in [`calculate_trigger_addresses`] had nothing
/// concrete to start from) leaves the fault's address untouched; such a
/// fault is dropped a moment later by [`checktriggers_in_tb`] unless its
/// trigger hit-counter is `0` with an `overwrite` model.
pub fn resolve_use_trigger_addresses(combinations: Vec<FaultCombination>) -> Vec<FaultCombination> {
    combinations
        .into_iter()
        .map(|combination| {
            let faults = combination
                .faults
                .into_iter()
                .map(|mut fault| {
                    if fault.fault_address == FaultAddress::UseTrigger {
                        if let Trigger::Absolute { address, .. } = fault.trigger {
                            fault.fault_address = FaultAddress::Explicit(address);
                        }
                    }
                    fault
                })
                .collect();
            FaultCombination::new(combination.index, faults)
        })
        .collect()
}

/// Drop every fault combination whose trigger is not covered by any golden
/// TB, unless the fault's trigger hit-counter is `0` and its model is
/// `overwrite` (those faults are armed unconditionally by the plugin and
/// never need their trigger to fall inside a known TB). Indices are
/// renumbered from `0` over the surviving combinations, never mutated in
/// place over the input.
pub fn checktriggers_in_tb(combinations: Vec<FaultCombination>, golden_tbinfo: &[TbInfo]) -> Vec<FaultCombination> {
    let kept: Vec<FaultCombination> = combinations
        .into_iter()
        .filter(|combination| {
            combination
                .faults
                .iter()
                .all(|fault| trigger_is_coverable(fault, golden_tbinfo))
        })
        .collect();

    kept.into_iter()
        .enumerate()
        .map(|(index, combination)| FaultCombination::new(index as u64, combination.faults))
        .collect()
}

fn trigger_is_coverable(fault: &Fault, golden_tbinfo: &[TbInfo]) -> bool {
    use fault_model::{FaultModel, Trigger};

    if fault.trigger.hitcounter() == 0 && fault.model == FaultModel::Overwrite {
        return true;
    }
    let address = match fault.trigger {
        Trigger::Absolute { address, .. } => address,
        Trigger::RelativeOffset { .. } => {
            // Should already have been resolved by calculate_trigger_addresses;
            // an unresolved relative offset here can't be checked against a TB.
            return false;
        }
        Trigger::Unresolved => return false,
    };
    golden_tbinfo.iter().any(|tb| address >= tb.id && address < tb.id + tb.size)
}

/// The campaign-wide instruction budget: the total number of instructions
/// the golden run itself executed, plus whatever additional budget the
/// operator configured (`configured_extra`).
pub fn max_instruction_count(golden_tbinfo: &[TbInfo], configured_extra: u64) -> u64 {
    let golden_total: u64 = golden_tbinfo
        .iter()
        .map(|tb| tb.num_exec.saturating_mul(tb.ins_count))
        .sum();
    golden_total.saturating_add(configured_extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault_model::{AddressRange, FaultAddress, FaultKind, FaultModel, Mask};

    fn tb(id: u64, size: u64, ins_count: u64, num_exec: u64) -> TbInfo {
        TbInfo {
            id,
            size,
            ins_count,
            num_exec,
            assembler: String::new(),
        }
    }

    fn fault_with_trigger(trigger: Trigger, model: FaultModel) -> Fault {
        Fault::new(
            FaultAddress::Explicit(0x1000),
            Vec::<AddressRange>::new(),
            FaultKind::Memory,
            model,
            0,
            Mask::U128(1),
            0,
            trigger,
        )
        .unwrap()
    }

    #[test]
    fn resolves_relative_offset_against_trace() {
        let tbinfo = vec![tb(0x8000000, 8, 2, 1)];
        let golden_tbinfo = vec![TbInfo {
            assembler: "[ 0x8000000 ] a\n[ 0x8000004 ] b\n".to_string(),
            ..tbinfo[0].clone()
        }];
        let tbexec = vec![TbExec { tb: 0x8000000, pos: 0 }];

        let fault = fault_with_trigger(
            Trigger::RelativeOffset { offset: -1, hitcounter: 1 },
            FaultModel::Set1,
        );
        let mut fault = fault;
        fault.fault_address = FaultAddress::Explicit(0x8000004);
        let combos = vec![FaultCombination::new(0, vec![fault])];

        let resolved = calculate_trigger_addresses(combos, &tbexec, &golden_tbinfo);
        assert_eq!(
            resolved[0].faults[0].trigger,
            Trigger::Absolute {
                address: 0x8000000,
                hitcounter: 1,
            }
        );
    }

    #[test]
    fn drops_combination_with_uncovered_trigger() {
        let golden_tbinfo = vec![tb(0x8000000, 4, 1, 1)];
        let fault = fault_with_trigger(
            Trigger::Absolute {
                address: 0x9000000,
                hitcounter: 1,
            },
            FaultModel::Set1,
        );
        let combos = vec![FaultCombination::new(0, vec![fault])];
        let kept = checktriggers_in_tb(combos, &golden_tbinfo);
        assert!(kept.is_empty());
    }

    #[test]
    fn zero_hitcounter_overwrite_always_kept() {
        let golden_tbinfo = vec![tb(0x8000000, 4, 1, 1)];
        let fault = fault_with_trigger(
            Trigger::Absolute {
                address: 0x9000000,
                hitcounter: 0,
            },
            FaultModel::Overwrite,
        );
        let combos = vec![FaultCombination::new(0, vec![fault])];
        let kept = checktriggers_in_tb(combos, &golden_tbinfo);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 0);
    }

    #[test]
    fn indices_renumbered_after_drop() {
        let golden_tbinfo = vec![tb(0x8000000, 4, 1, 1)];
        let covered = fault_with_trigger(
            Trigger::Absolute {
                address: 0x8000000,
                hitcounter: 1,
            },
            FaultModel::Set1,
        );
        let uncovered = fault_with_trigger(
            Trigger::Absolute {
                address: 0x9000000,
                hitcounter: 1,
            },
            FaultModel::Set1,
        );
        let combos = vec![
            FaultCombination::new(0, vec![covered.clone()]),
            FaultCombination::new(1, vec![uncovered]),
            FaultCombination::new(2, vec![covered]),
        ];
        let kept = checktriggers_in_tb(combos, &golden_tbinfo);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].index, 0);
        assert_eq!(kept[1].index, 1);
    }

    #[test]
    fn max_instruction_count_sums_golden_work_plus_extra() {
        let golden_tbinfo = vec![tb(0x8000000, 4, 1, 3), tb(0x8000004, 4, 1, 2)];
        assert_eq!(max_instruction_count(&golden_tbinfo, 100), 3 + 2 + 100);
    }

    #[test]
    fn use_trigger_address_copies_resolved_trigger() {
        let mut fault = fault_with_trigger(
            Trigger::Absolute {
                address: 0x8000004,
                hitcounter: 1,
            },
            FaultModel::Set1,
        );
        fault.fault_address = FaultAddress::UseTrigger;
        let combos = vec![FaultCombination::new(0, vec![fault])];
        let resolved = resolve_use_trigger_addresses(combos);
        assert_eq!(resolved[0].faults[0].fault_address, FaultAddress::Explicit(0x8000004));
    }

    #[test]
    fn use_trigger_address_left_untouched_when_trigger_still_unresolved() {
        let mut fault = fault_with_trigger(Trigger::Unresolved, FaultModel::Set1);
        fault.fault_address = FaultAddress::UseTrigger;
        let combos = vec![FaultCombination::new(0, vec![fault])];
        let resolved = resolve_use_trigger_addresses(combos);
        assert_eq!(resolved[0].faults[0].fault_address, FaultAddress::UseTrigger);
    }
}
