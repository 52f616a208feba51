//! Accessors for decoded event and call arguments.
//!
//! Argument objects come from the gateway as JSON. Field casing differs
//! across runtime versions (camelCase vs snake_case) and large integers
//! arrive as strings, so all lookups go through these helpers.

use serde_json::Value;

use super::types::AccountId;

/// Get a field by any of its known names.
pub fn field<'a>(args: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let map = args.as_object()?;
    names.iter().find_map(|n| map.get(*n))
}

/// Parse a u128 from a JSON number or decimal string.
pub fn as_u128(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn u128_field(args: &Value, names: &[&str]) -> Option<u128> {
    field(args, names).and_then(as_u128)
}

pub fn u32_field(args: &Value, names: &[&str]) -> Option<u32> {
    field(args, names).and_then(as_u32)
}

pub fn account_field(args: &Value, names: &[&str]) -> Option<AccountId> {
    field(args, names)
        .and_then(|v| v.as_str())
        .and_then(AccountId::from_hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_casing() {
        let args = json!({"assetId": 5});
        assert_eq!(u32_field(&args, &["assetId", "asset_id"]), Some(5));
        let args = json!({"asset_id": 5});
        assert_eq!(u32_field(&args, &["assetId", "asset_id"]), Some(5));
        assert_eq!(u32_field(&args, &["other"]), None);
    }

    #[test]
    fn test_u128_from_string_or_number() {
        assert_eq!(as_u128(&json!("340282366920938463463374607431768211455")), Some(u128::MAX));
        assert_eq!(as_u128(&json!(42)), Some(42));
        assert_eq!(as_u128(&json!(-1)), None);
        assert_eq!(as_u128(&json!("nope")), None);
    }

    #[test]
    fn test_account_field() {
        let hex = format!("0x{}", "ab".repeat(32));
        let args = json!({ "from": hex });
        assert_eq!(account_field(&args, &["from"]), Some(AccountId([0xab; 32])));
    }
}
