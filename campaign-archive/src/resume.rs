//! `--missing-only`: drop every expanded fault combination whose canonical
//! identity is already present under `/fault/*` in an existing archive.

use std::collections::HashSet;

use fault_model::FaultCombination;

/// Filter `expanded` down to the combinations not yet recorded. Does not
/// renumber: a combination's `index` still names the experiment group it
/// would have been written to on the original run.
pub fn filter_missing_only(expanded: Vec<FaultCombination>, recorded: &HashSet<String>) -> Vec<FaultCombination> {
    expanded
        .into_iter()
        .filter(|combination| !recorded.contains(&combination.canonical_string()))
        .collect()
}
