use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

use crate::utils::num::value_to_u64;

pub fn deserialize_u64_from_str_or_int<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_u64(&value).ok_or_else(|| de::Error::custom(format!("u64 must be a number or a string: {value}")))
}

/// Same as above, but `null` and a missing field both become `None`.
pub fn deserialize_option_u64_from_str_or_int<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value_to_u64(&value)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid quantity: {value}"))),
    }
}
