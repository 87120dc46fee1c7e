//! Expansion of a declarative fault-device description (one JSON object per
//! "device" in a fault configuration document) into concrete
//! [`FaultCombination`]s.

use std::collections::HashMap;

use fault_model::{
    AddressRange, Fault, FaultAddress, FaultCombination, FaultKind, FaultModel, Mask, Trigger,
};
use itertools::Itertools;
use serde_json::Value;
use tracing::debug;

use crate::error::ExpansionError;
use crate::range::{self, MaskValue};

/// One fault-device entry after JSON decoding but before range expansion.
/// Unknown keys are retained in `extra` so legacy/obsolete fields can be
/// rejected with a precise error instead of silently ignored by serde.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct FaultDeviceConfig {
    pub fault_address: Value,
    #[serde(default)]
    pub fault_address_exclude: Vec<[Value; 2]>,
    pub fault_type: String,
    pub fault_model: String,
    #[serde(default)]
    pub fault_lifespan: Value,
    pub fault_mask: Value,
    #[serde(default)]
    pub fault_num_bytes: Value,
    pub trigger_address: Value,
    #[serde(default)]
    pub trigger_hitcounter: Value,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn detect_kind(value: &str) -> Result<FaultKind, ExpansionError> {
    match value {
        "memory" => Ok(FaultKind::Memory),
        "instruction" => Ok(FaultKind::Instruction),
        "register" => Ok(FaultKind::Register),
        other => Err(ExpansionError::UnrecognizedKeyword {
            field: "fault_type".to_string(),
            value: other.to_string(),
        }),
    }
}

fn detect_model(value: &str) -> Result<FaultModel, ExpansionError> {
    match value {
        "set0" => Ok(FaultModel::Set0),
        "set1" => Ok(FaultModel::Set1),
        "toggle" => Ok(FaultModel::Toggle),
        "overwrite" => Ok(FaultModel::Overwrite),
        other => Err(ExpansionError::UnrecognizedKeyword {
            field: "fault_model".to_string(),
            value: other.to_string(),
        }),
    }
}

fn as_i128_scalar(context: &str, value: &Value, default: i128) -> Result<i128, ExpansionError> {
    if value.is_null() {
        return Ok(default);
    }
    range::parse_numeric_range(context, value).map(|values| values[0])
}

/// Expand a single device description into the cross product of every
/// varying field. `index_base` is the first experiment index assigned;
/// subsequent combinations number upward from it.
pub fn expand_device(
    device: &FaultDeviceConfig,
    index_base: u64,
) -> Result<Vec<FaultCombination>, ExpansionError> {
    if device.extra.contains_key("fault_livespan") {
        return Err(ExpansionError::ObsoleteField);
    }

    let kind = detect_kind(&device.fault_type)?;
    let model = detect_model(&device.fault_model)?;

    let exclude = device
        .fault_address_exclude
        .iter()
        .map(|[start, end]| {
            Ok(AddressRange::new(
                as_i128_scalar("fault_address_exclude", start, 0)? as u64,
                as_i128_scalar("fault_address_exclude", end, 0)? as u64,
            ))
        })
        .collect::<Result<Vec<_>, ExpansionError>>()?;

    let lifespans = if device.fault_lifespan.is_null() {
        vec![0i128]
    } else {
        range::parse_numeric_range("fault_lifespan", &device.fault_lifespan)?
    };
    let num_bytes = as_i128_scalar("fault_num_bytes", &device.fault_num_bytes, 0)? as u8;
    let masks = range::parse_mask_range("fault_mask", &device.fault_mask)?;

    let trigger_hitcounters = if device.trigger_hitcounter.is_null() {
        vec![1i128]
    } else {
        range::parse_numeric_range("trigger_hitcounter", &device.trigger_hitcounter)?
    };

    if range::is_wildcard(&device.fault_address) {
        let wildcard = range::parse_wildcard("fault_address", &device.fault_address)?;
        debug!(?wildcard, "deferring wildcard fault address to golden-run expansion");
        let combos = build_combinations(
            index_base,
            std::iter::once(FaultAddress::Wildcard(wildcard)),
            &exclude,
            kind,
            model,
            &lifespans,
            &masks,
            num_bytes,
            &device.trigger_address,
            &trigger_hitcounters,
        )?;
        return Ok(combos);
    }

    let addresses = addresses_for(&device.fault_address)?;
    build_combinations(
        index_base,
        addresses.into_iter(),
        &exclude,
        kind,
        model,
        &lifespans,
        &masks,
        num_bytes,
        &device.trigger_address,
        &trigger_hitcounters,
    )
}

/// The sentinel `-1` stands for "use the trigger address" and must never be
/// carried forward as an in-band numeric address.
fn addresses_for(value: &Value) -> Result<Vec<FaultAddress>, ExpansionError> {
    range::parse_numeric_range("fault_address", value).map(|values| {
        values
            .into_iter()
            .map(|v| {
                if v == -1 {
                    FaultAddress::UseTrigger
                } else {
                    FaultAddress::Explicit(v as u64)
                }
            })
            .collect()
    })
}

#[allow(clippy::too_many_arguments)]
fn build_combinations(
    index_base: u64,
    addresses: impl Iterator<Item = FaultAddress>,
    exclude: &[AddressRange],
    kind: FaultKind,
    model: FaultModel,
    lifespans: &[i128],
    masks: &[MaskValue],
    num_bytes: u8,
    trigger_address_value: &Value,
    trigger_hitcounters: &[i128],
) -> Result<Vec<FaultCombination>, ExpansionError> {
    let trigger_addresses = trigger_addresses_for(trigger_address_value)?;

    let addresses: Vec<FaultAddress> = addresses
        .filter(|address| match address.explicit() {
            Some(concrete) => !exclude.iter().any(|range| range.contains(concrete)),
            None => true,
        })
        .collect();

    let mut combinations = Vec::new();
    for (address, lifespan, mask_value, &trigger_address, &trigger_hitcounter) in addresses
        .iter()
        .cartesian_product(lifespans.iter())
        .cartesian_product(masks.iter())
        .cartesian_product(trigger_addresses.iter())
        .cartesian_product(trigger_hitcounters.iter())
        .map(|((((a, l), m), t), h)| (a, l, m, t, h))
    {
        let mask = match mask_value {
            MaskValue::Pattern(pattern) => Mask::U128(*pattern),
            MaskValue::Bytes(bytes) => Mask::Bytes(bytes.clone()),
        };
        let trigger = Trigger::from_raw(trigger_address, trigger_hitcounter as u64);
        let fault = Fault::new(
            *address,
            exclude.to_vec(),
            kind,
            model,
            *lifespan as u64,
            mask,
            num_bytes,
            trigger,
        )?;
        combinations.push(FaultCombination::new(
            index_base + combinations.len() as u64,
            vec![fault],
        ));
    }
    Ok(combinations)
}

/// The `trigger_address` field uses the same `-1` sentinel as
/// [`fault_model::FaultAddress::UseTrigger`] on the *fault's own* address;
/// on the trigger itself, negative values mean "relative offset" per
/// [`Trigger::from_raw`], so no rewrite is needed here beyond range
/// expansion.
fn trigger_addresses_for(value: &Value) -> Result<Vec<i64>, ExpansionError> {
    range::parse_numeric_range("trigger_address", value)
        .map(|values| values.into_iter().map(|v| v as i64).collect())
}

/// Cross-products the per-device expansions of one combination group (the
/// devices listed together under one `faults[i]` entry, meant to fire in
/// the same experiment) into multi-fault [`FaultCombination`]s, one per
/// tuple. Every input [`FaultCombination`] is expected to carry exactly one
/// fault, which is [`expand_device`]'s contract.
pub fn combine_devices(device_expansions: Vec<Vec<FaultCombination>>, index_base: u64) -> Vec<FaultCombination> {
    if device_expansions.is_empty() {
        return Vec::new();
    }
    let fault_lists: Vec<Vec<fault_model::Fault>> = device_expansions
        .into_iter()
        .map(|combos| {
            combos
                .into_iter()
                .map(|combo| {
                    combo
                        .faults
                        .into_iter()
                        .next()
                        .expect("expand_device always yields single-fault combinations")
                })
                .collect()
        })
        .collect();

    let mut products: Vec<Vec<fault_model::Fault>> = vec![Vec::new()];
    for list in fault_lists {
        let mut next = Vec::with_capacity(products.len() * list.len());
        for prefix in &products {
            for fault in &list {
                let mut combo = prefix.clone();
                combo.push(fault.clone());
                next.push(combo);
            }
        }
        products = next;
    }

    products
        .into_iter()
        .enumerate()
        .map(|(i, faults)| FaultCombination::new(index_base + i as u64, faults))
        .collect()
}

/// Flatten and re-index the per-device combination groups produced by
/// [`expand_device`] for every device in a campaign, in declaration order.
pub fn flatten_combinations(groups: Vec<Vec<FaultCombination>>, index_base: u64) -> Vec<FaultCombination> {
    let mut index = index_base;
    let mut out = Vec::new();
    for group in groups {
        for mut combination in group {
            combination.index = index;
            index += 1;
            out.push(combination);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(json_value: Value) -> FaultDeviceConfig {
        serde_json::from_value(json_value).unwrap()
    }

    #[test]
    fn scenario_b_exclusion_leaves_three_experiments() {
        let dev = device(json!({
            "fault_address": [0x8000000i64, 0x8000010i64, 4],
            "fault_address_exclude": [[0x8000008i64, 0x8000008i64]],
            "fault_type": "memory",
            "fault_model": "set1",
            "fault_mask": 1,
            "trigger_address": 0x8000000i64,
        }));
        let combos = expand_device(&dev, 0).unwrap();
        assert_eq!(combos.len(), 3);
        let addresses: Vec<u64> = combos
            .iter()
            .map(|c| c.faults[0].fault_address.explicit().unwrap())
            .collect();
        assert_eq!(addresses, vec![0x8000000, 0x8000004, 0x800000c]);
    }

    #[test]
    fn scenario_d_legacy_key_is_rejected() {
        let dev = device(json!({
            "fault_address": 0x8000000i64,
            "fault_type": "memory",
            "fault_model": "set1",
            "fault_mask": 1,
            "fault_livespan": 5,
            "trigger_address": 0x8000000i64,
        }));
        let err = expand_device(&dev, 0).unwrap_err();
        assert!(matches!(err, ExpansionError::ObsoleteField));
        assert!(err.to_string().contains("fault_lifespan"));
    }

    #[test]
    fn unrecognized_fault_type_is_rejected() {
        let dev = device(json!({
            "fault_address": 1,
            "fault_type": "bogus",
            "fault_model": "set1",
            "fault_mask": 1,
            "trigger_address": 1,
        }));
        assert!(expand_device(&dev, 0).is_err());
    }

    #[test]
    fn wildcard_address_defers_expansion() {
        let dev = device(json!({
            "fault_address": "*",
            "fault_type": "memory",
            "fault_model": "set1",
            "fault_mask": 1,
            "trigger_address": 1,
        }));
        let combos = expand_device(&dev, 0).unwrap();
        assert_eq!(combos.len(), 1);
        assert!(combos[0].faults[0].fault_address.is_wildcard());
    }

    #[test]
    fn dict_mask_produces_instruction_overwrite_byte_mask() {
        let dev = device(json!({
            "fault_address": 0x8000000i64,
            "fault_type": "instruction",
            "fault_model": "overwrite",
            "fault_mask": {"type": "dict", "dict": [0x00, 0xbf]},
            "trigger_address": 0x8000000i64,
        }));
        let combos = expand_device(&dev, 0).unwrap();
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].faults[0].mask, Mask::Bytes(vec![0x00, 0xbf]));
    }

    #[test]
    fn scenario_c_like_cross_product_over_two_devices() {
        let first = device(json!({
            "fault_address": [0x8000000i64, 0x8000002i64],
            "fault_type": "memory",
            "fault_model": "set1",
            "fault_mask": 1,
            "trigger_address": 0x8000000i64,
        }));
        let second = device(json!({
            "fault_address": [0x9000000i64, 0x9000002i64],
            "fault_type": "register",
            "fault_model": "toggle",
            "fault_mask": 1,
            "trigger_address": 0x9000000i64,
        }));
        let first_expanded = expand_device(&first, 0).unwrap();
        let second_expanded = expand_device(&second, 0).unwrap();
        assert_eq!(first_expanded.len(), 2);
        assert_eq!(second_expanded.len(), 2);

        let combined = combine_devices(vec![first_expanded, second_expanded], 0);
        assert_eq!(combined.len(), 4);
        assert!(combined.iter().all(|c| c.faults.len() == 2));
        let indices: Vec<u64> = combined.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn single_device_group_passes_through_as_single_fault_combinations() {
        let dev = device(json!({
            "fault_address": 0x8000000i64,
            "fault_type": "memory",
            "fault_model": "set1",
            "fault_mask": 1,
            "trigger_address": 0x8000000i64,
        }));
        let expanded = expand_device(&dev, 0).unwrap();
        let combined = combine_devices(vec![expanded], 0);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].faults.len(), 1);
    }

    #[test]
    fn sentinel_fault_address_becomes_use_trigger() {
        let dev = device(json!({
            "fault_address": -1,
            "fault_type": "instruction",
            "fault_model": "overwrite",
            "fault_mask": 1,
            "trigger_address": 0x8000000i64,
        }));
        let combos = expand_device(&dev, 0).unwrap();
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].faults[0].fault_address, FaultAddress::UseTrigger);
    }

    #[test]
    fn flatten_reindexes_sequentially() {
        let dummy = Fault::new(
            FaultAddress::Explicit(0),
            vec![],
            FaultKind::Memory,
            FaultModel::Set1,
            0,
            Mask::U128(0),
            0,
            Trigger::Unresolved,
        )
        .unwrap();
        let a = FaultCombination::new(7, vec![dummy.clone()]);
        let b = FaultCombination::new(9, vec![dummy]);
        let flattened = flatten_combinations(vec![vec![a], vec![b]], 0);
        let indices: Vec<u64> = flattened.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }
}
