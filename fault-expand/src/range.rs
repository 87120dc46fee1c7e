//! Parsing of the range-descriptor grammar shared by every numeric fault
//! device field: an integer, a 1/2/3-element list, a `shift` object, a
//! `dict` object, or (for addresses only) a wildcard marker.

use fault_model::{AddrHit, WildcardRange};
use serde_json::Value;

use crate::error::ExpansionError;

/// A single value produced by expanding a `fault_mask` range: either a
/// plain 128-bit pattern, or the raw byte sequence carried by a `dict`
/// descriptor (used for the instruction-overwrite byte-sequence form).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskValue {
    Pattern(u128),
    Bytes(Vec<u8>),
}

/// Parse a numeric range descriptor (everything except wildcards and
/// mask dicts) into its fully enumerated values.
pub fn parse_numeric_range(context: &str, value: &Value) -> Result<Vec<i128>, ExpansionError> {
    match value {
        Value::Number(_) => Ok(vec![as_i128(context, value)?]),
        Value::String(s) => Ok(vec![parse_auto_base(context, s)?]),
        Value::Array(items) => parse_array_range(context, items),
        Value::Object(map) => parse_shift_range(context, map),
        other => Err(ExpansionError::InvalidRangeSpec {
            context: context.to_string(),
            detail: format!("unsupported JSON shape {other:?}"),
        }),
    }
}

/// Parse a `fault_mask` range descriptor, which additionally allows the
/// `dict` object form carrying one opaque byte-sequence value (used by the
/// instruction-overwrite model).
pub fn parse_mask_range(context: &str, value: &Value) -> Result<Vec<MaskValue>, ExpansionError> {
    if let Value::Object(map) = value {
        if map.get("type").and_then(Value::as_str) == Some("dict") {
            let dict = map.get("dict").ok_or_else(|| ExpansionError::InvalidRangeSpec {
                context: context.to_string(),
                detail: "dict object missing 'dict' field".to_string(),
            })?;
            return Ok(vec![MaskValue::Bytes(dict_to_bytes(context, dict)?)]);
        }
    }
    parse_numeric_range(context, value)
        .map(|values| values.into_iter().map(|v| MaskValue::Pattern(v as u128)).collect())
}

/// Convert a `dict` descriptor's opaque payload into the raw replacement
/// bytes an instruction-overwrite mask carries: a JSON array of byte
/// values, or a string (`0x`-prefixed hex, or taken as raw UTF-8 bytes
/// otherwise).
fn dict_to_bytes(context: &str, dict: &Value) -> Result<Vec<u8>, ExpansionError> {
    match dict {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .filter(|v| *v <= u8::MAX as u64)
                    .map(|v| v as u8)
                    .ok_or_else(|| ExpansionError::InvalidRangeSpec {
                        context: context.to_string(),
                        detail: format!("dict byte array element {item} is not a u8"),
                    })
            })
            .collect(),
        Value::String(s) => {
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                let hex = if hex.len() % 2 == 1 { format!("0{hex}") } else { hex.to_string() };
                (0..hex.len())
                    .step_by(2)
                    .map(|i| {
                        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| ExpansionError::InvalidRangeSpec {
                            context: context.to_string(),
                            detail: format!("dict hex string is invalid: {e}"),
                        })
                    })
                    .collect()
            } else {
                Ok(s.as_bytes().to_vec())
            }
        }
        other => Err(ExpansionError::InvalidRangeSpec {
            context: context.to_string(),
            detail: format!("dict value must be a byte array or string, got {other:?}"),
        }),
    }
}

fn parse_array_range(context: &str, items: &[Value]) -> Result<Vec<i128>, ExpansionError> {
    match items.len() {
        1 => Ok(vec![as_i128(context, &items[0])?]),
        2 => {
            let start = as_i128(context, &items[0])?;
            let end = as_i128(context, &items[1])?;
            Ok((start..end).collect())
        }
        3 => {
            let start = as_i128(context, &items[0])?;
            let end = as_i128(context, &items[1])?;
            let step = as_i128(context, &items[2])?;
            if step == 0 {
                return Err(ExpansionError::InvalidRangeSpec {
                    context: context.to_string(),
                    detail: "step of 0 never terminates".to_string(),
                });
            }
            let mut out = Vec::new();
            let mut cur = start;
            if step > 0 {
                while cur < end {
                    out.push(cur);
                    cur += step;
                }
            } else {
                while cur > end {
                    out.push(cur);
                    cur += step;
                }
            }
            Ok(out)
        }
        n => Err(ExpansionError::InvalidRangeSpec {
            context: context.to_string(),
            detail: format!("list must have 1, 2 or 3 elements, got {n}"),
        }),
    }
}

fn parse_shift_range(
    context: &str,
    map: &serde_json::Map<String, Value>,
) -> Result<Vec<i128>, ExpansionError> {
    if map.get("type").and_then(Value::as_str) != Some("shift") {
        return Err(ExpansionError::InvalidRangeSpec {
            context: context.to_string(),
            detail: "object range descriptor must be type 'shift' or 'dict'".to_string(),
        });
    }
    let range = map
        .get("range")
        .and_then(Value::as_array)
        .ok_or_else(|| ExpansionError::InvalidRangeSpec {
            context: context.to_string(),
            detail: "shift object missing 'range' array".to_string(),
        })?;
    if range.len() != 3 {
        return Err(ExpansionError::InvalidRangeSpec {
            context: context.to_string(),
            detail: format!("shift range must have exactly 3 elements, got {}", range.len()),
        });
    }
    let base = as_i128(context, &range[0])?;
    let lo = as_i128(context, &range[1])?;
    let hi = as_i128(context, &range[2])?;
    Ok((lo..hi).map(|shift| base << shift).collect())
}

fn as_i128(context: &str, value: &Value) -> Result<i128, ExpansionError> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(v as i128)
            } else if let Some(v) = n.as_u64() {
                Ok(v as i128)
            } else {
                Err(ExpansionError::BadNumericValue {
                    value: n.to_string(),
                    reason: format!("not an integer (context: {context})"),
                })
            }
        }
        Value::String(s) => parse_auto_base(context, s),
        other => Err(ExpansionError::BadNumericValue {
            value: other.to_string(),
            reason: format!("expected a number (context: {context})"),
        }),
    }
}

/// Parse a numeric token with automatic base detection: `0x`/`0X` hex,
/// `0o`/`0O` octal, `0b`/`0B` binary, otherwise decimal. A leading `-` is
/// honoured in all bases.
pub fn parse_auto_base(context: &str, token: &str) -> Result<i128, ExpansionError> {
    let token = token.trim();
    let (sign, rest) = match token.strip_prefix('-') {
        Some(rest) => (-1i128, rest),
        None => (1i128, token),
    };
    let parsed = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16)
    } else if let Some(oct) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        i128::from_str_radix(oct, 8)
    } else if let Some(bin) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        i128::from_str_radix(bin, 2)
    } else {
        rest.parse::<i128>()
    };
    parsed.map(|v| v * sign).map_err(|e| ExpansionError::BadNumericValue {
        value: token.to_string(),
        reason: format!("{e} (context: {context})"),
    })
}

/// `true` if a `fault_address` value denotes a wildcard: the literal `"*"`,
/// or a list containing `"*"`.
pub fn is_wildcard(value: &Value) -> bool {
    match value {
        Value::String(s) => s == "*",
        Value::Array(items) => items.iter().any(|item| item.as_str() == Some("*")),
        _ => false,
    }
}

/// Parse a wildcard `fault_address` descriptor into a [`WildcardRange`].
pub fn parse_wildcard(context: &str, value: &Value) -> Result<WildcardRange, ExpansionError> {
    let Value::Array(items) = value else {
        // A lone "*" with no explicit start/end.
        return Ok(WildcardRange::open());
    };
    if items.len() > 3 {
        return Err(ExpansionError::InvalidRangeSpec {
            context: context.to_string(),
            detail: "invalid wildcard fault range format".to_string(),
        });
    }
    let mut start = AddrHit::default();
    let mut end = AddrHit::default();
    let mut side_is_end = false;
    for item in items {
        if item.as_str() == Some("*") {
            side_is_end = true;
            continue;
        }
        let addr_hit = parse_wildcard_side(context, item)?;
        if side_is_end {
            end = addr_hit;
        } else {
            start = addr_hit;
        }
    }
    let local = start.hitcounter == 0 && end.hitcounter == 0;
    Ok(WildcardRange { start, end, local })
}

fn parse_wildcard_side(context: &str, value: &Value) -> Result<AddrHit, ExpansionError> {
    match value {
        Value::Number(_) => Ok(AddrHit::new(as_i128(context, value)? as u64, 1)),
        Value::String(s) => {
            let mut parts = s.splitn(2, '/');
            let address_token = parts.next().unwrap_or_default();
            let address = parse_auto_base(context, address_token)? as u64;
            let hitcounter = match parts.next() {
                Some(hit_token) => parse_auto_base(context, hit_token)? as u64,
                None => 1,
            };
            Ok(AddrHit::new(address, hitcounter))
        }
        other => Err(ExpansionError::InvalidRangeSpec {
            context: context.to_string(),
            detail: format!("invalid wildcard fault range element {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_integer() {
        assert_eq!(parse_numeric_range("t", &json!(5)).unwrap(), vec![5]);
    }

    #[test]
    fn one_element_list() {
        assert_eq!(parse_numeric_range("t", &json!([7])).unwrap(), vec![7]);
    }

    #[test]
    fn two_element_list_is_half_open() {
        assert_eq!(
            parse_numeric_range("t", &json!([0x8000000i64, 0x8000010i64])).unwrap().len(),
            16
        );
    }

    #[test]
    fn three_element_list_steps() {
        let values = parse_numeric_range("t", &json!([0x8000000i64, 0x8000010i64, 4])).unwrap();
        assert_eq!(values, vec![0x8000000, 0x8000004, 0x8000008, 0x800000c]);
    }

    #[test]
    fn four_element_list_is_invalid() {
        assert!(parse_numeric_range("t", &json!([1, 2, 3, 4])).is_err());
    }

    #[test]
    fn shift_object() {
        let values = parse_numeric_range("t", &json!({"type": "shift", "range": [1, 0, 3]})).unwrap();
        assert_eq!(values, vec![1, 2, 4]);
    }

    #[test]
    fn shift_object_wrong_arity() {
        assert!(parse_numeric_range("t", &json!({"type": "shift", "range": [1, 2]})).is_err());
    }

    #[test]
    fn wildcard_detection() {
        assert!(is_wildcard(&json!("*")));
        assert!(is_wildcard(&json!([1, "*"])));
        assert!(!is_wildcard(&json!([1, 2, 3])));
    }

    #[test]
    fn wildcard_lone_star_is_open() {
        let range = parse_wildcard("t", &json!("*")).unwrap();
        assert!(!range.local);
        assert_eq!(range.start.hitcounter, 0);
    }

    #[test]
    fn wildcard_with_explicit_sides() {
        let range = parse_wildcard("t", &json!([1000, "*", "2000/1"])).unwrap();
        assert_eq!(range.start, AddrHit::new(1000, 1));
        assert_eq!(range.end, AddrHit::new(2000, 1));
        assert!(!range.local);
    }

    #[test]
    fn wildcard_local_when_both_sides_zero_hitcounter() {
        let range = parse_wildcard("t", &json!(["1000/0", "*", "2000/0"])).unwrap();
        assert!(range.local);
    }

    #[test]
    fn auto_base_detection() {
        assert_eq!(parse_auto_base("t", "0x10").unwrap(), 16);
        assert_eq!(parse_auto_base("t", "0o10").unwrap(), 8);
        assert_eq!(parse_auto_base("t", "0b10").unwrap(), 2);
        assert_eq!(parse_auto_base("t", "10").unwrap(), 10);
        assert_eq!(parse_auto_base("t", "-10").unwrap(), -10);
    }

    #[test]
    fn dict_mask_with_byte_array_carries_through() {
        let values = parse_mask_range("fault_mask", &json!({"type": "dict", "dict": [0x00, 0xbf, 0x00, 0xea]})).unwrap();
        assert_eq!(values, vec![MaskValue::Bytes(vec![0x00, 0xbf, 0x00, 0xea])]);
    }

    #[test]
    fn dict_mask_with_hex_string_carries_through() {
        let values = parse_mask_range("fault_mask", &json!({"type": "dict", "dict": "0x00bf"})).unwrap();
        assert_eq!(values, vec![MaskValue::Bytes(vec![0x00, 0xbf])]);
    }

    #[test]
    fn dict_mask_missing_field_is_rejected() {
        assert!(parse_mask_range("fault_mask", &json!({"type": "dict"})).is_err());
    }
}
