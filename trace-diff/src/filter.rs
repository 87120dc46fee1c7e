//! Removes artefact translation blocks the emulator's JIT introduces when
//! it single-steps through a real TB: each artefact TB's id is one
//! instruction address drawn from the real TB, so a run of consecutive
//! artefact executions reconstructs the real TB's instruction address list.

use crate::types::{TbExec, TbInfo, Trace};

/// Parse the bracketed per-instruction addresses out of a TB's assembler
/// listing (`"[ 0x80001a2 ] mov r0, r1\n[ 0x80001a6 ] ..."`), in descending
/// order. This descending list is the "filter" used to recognise a run of
/// single-instruction artefact TBs that together reconstruct this TB.
pub fn instruction_addresses(tbinfo: &TbInfo) -> Vec<u64> {
    let mut addresses: Vec<u64> = tbinfo
        .assembler
        .lines()
        .filter_map(|line| {
            let start = line.find('[')?;
            let end = line.find(']')?;
            let token = line.get(start + 1..end)?.trim();
            let token = token.strip_prefix("0x").unwrap_or(token);
            u64::from_str_radix(token, 16).ok()
        })
        .collect();
    addresses.sort_unstable_by(|a, b| b.cmp(a));
    addresses
}

struct Filter {
    tb_id: u64,
    addresses: Vec<u64>,
}

fn build_filters(golden_tbinfo: &[TbInfo]) -> Vec<Filter> {
    let mut filters: Vec<Filter> = golden_tbinfo
        .iter()
        .map(|tb| Filter {
            tb_id: tb.id,
            addresses: instruction_addresses(tb),
        })
        .collect();
    filters.sort_unstable_by(|a, b| b.addresses.len().cmp(&a.addresses.len()));
    filters
}

/// Run the five-step artefact filter against the golden run's TB set.
/// `trace.tbinfo`/`trace.tbexec` are replaced in place with the filtered
/// result; `pos` is renumbered contiguously from 0 in ascending order.
pub fn filter_artefacts(mut trace: Trace, golden_tbinfo: &[TbInfo]) -> Trace {
    let filters = build_filters(golden_tbinfo);

    // Step 2: sort tbexec descending by pos and track each row's tb as an
    // Option so a match can invalidate it with the `-1` sentinel.
    let mut rows: Vec<Option<u64>> = trace.tbexec.iter().map(|e| Some(e.tb)).collect();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_unstable_by(|&a, &b| trace.tbexec[b].pos.cmp(&trace.tbexec[a].pos));

    // Step 3: for every filter of length >= 2, find runs of consecutive
    // descending-order rows whose tb matches the filter sequence exactly.
    // `pattern` is sorted descending by address, so its last element is the
    // lowest address — the real TB's own base address. That row is the
    // survivor; every other row in the run is an artefact and gets
    // invalidated.
    for filter in &filters {
        if filter.addresses.len() < 2 {
            continue;
        }
        let pattern = &filter.addresses;
        let n = pattern.len();
        let mut i = 0usize;
        while i + n <= order.len() {
            let matches = (0..n).all(|j| rows[order[i + j]] == Some(pattern[j]));
            if matches {
                for j in 0..n - 1 {
                    let idx = order[i + j];
                    if let Some(removed_tb) = rows[idx].take() {
                        if let Some(info) = trace.tbinfo.iter_mut().find(|t| t.id == removed_tb) {
                            info.num_exec = info.num_exec.saturating_sub(1);
                        }
                    }
                }
                i += n;
            } else {
                i += 1;
            }
        }
    }

    // Step 4: drop invalid rows, reverse to ascending pos, renumber.
    let mut kept: Vec<u64> = order
        .into_iter()
        .filter_map(|idx| rows[idx])
        .collect();
    kept.reverse();
    trace.tbexec = kept
        .into_iter()
        .enumerate()
        .map(|(pos, tb)| TbExec { tb, pos: pos as u64 })
        .collect();

    // Step 5: drop TBInfo rows whose num_exec reached 0.
    trace.tbinfo.retain(|tb| tb.num_exec > 0);

    trace
}

/// The ring-buffer fast path: the trace is already truncated to the most
/// recent K entries by the emulator, so no artefact filtering is needed —
/// only reverse the descending-by-recency order to ascending `pos`.
pub fn reverse_ring_buffer(mut trace: Trace) -> Trace {
    trace.tbexec.reverse();
    trace.tbexec = trace
        .tbexec
        .into_iter()
        .enumerate()
        .map(|(pos, e)| TbExec { tb: e.tb, pos: pos as u64 })
        .collect();
    trace
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tb(id: u64, ins_count: u64, num_exec: u64, assembler: &str) -> TbInfo {
        TbInfo {
            id,
            size: ins_count * 4,
            ins_count,
            num_exec,
            assembler: assembler.to_string(),
        }
    }

    #[test]
    fn parses_descending_instruction_addresses() {
        let info = tb(0x8000000, 3, 1, "[ 0x8000000 ] a\n[ 0x8000004 ] b\n[ 0x8000008 ] c\n");
        assert_eq!(instruction_addresses(&info), vec![0x8000008, 0x8000004, 0x8000000]);
    }

    #[test]
    fn collapses_artefact_run_into_single_execution() {
        let golden_tb = tb(0x8000000, 3, 1, "[ 0x8000000 ] a\n[ 0x8000004 ] b\n[ 0x8000008 ] c\n");
        let mut trace = Trace {
            tbinfo: vec![
                tb(0x8000000, 3, 1, "[ 0x8000000 ] a\n[ 0x8000004 ] b\n[ 0x8000008 ] c\n"),
                tb(0x8000008, 1, 1, "[ 0x8000008 ] c\n"),
                tb(0x8000004, 1, 1, "[ 0x8000004 ] b\n"),
            ],
            tbexec: vec![
                TbExec { tb: 0x8000008, pos: 2 },
                TbExec { tb: 0x8000004, pos: 1 },
                TbExec { tb: 0x8000000, pos: 0 },
            ],
            meminfo: vec![],
            registers: vec![],
        };
        trace.tbinfo[1].num_exec = 1;
        trace.tbinfo[2].num_exec = 1;
        let filtered = filter_artefacts(trace, std::slice::from_ref(&golden_tb));
        assert_eq!(filtered.tbexec.len(), 1);
        assert_eq!(filtered.tbexec[0].tb, 0x8000000);
        assert_eq!(filtered.tbexec[0].pos, 0);
        assert!(filtered.tbinfo.iter().all(|tb| tb.id == 0x8000000));
    }

    #[test]
    fn ring_buffer_fast_path_only_reverses() {
        let trace = Trace {
            tbinfo: vec![],
            tbexec: vec![TbExec { tb: 1, pos: 5 }, TbExec { tb: 2, pos: 4 }],
            meminfo: vec![],
            registers: vec![],
        };
        let out = reverse_ring_buffer(trace);
        assert_eq!(out.tbexec[0].tb, 2);
        assert_eq!(out.tbexec[0].pos, 0);
        assert_eq!(out.tbexec[1].tb, 1);
        assert_eq!(out.tbexec[1].pos, 1);
    }
}
