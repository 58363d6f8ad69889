use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::error::WireError;

/// A record stored at some session path.
///
/// Records travel as flat camelCase maps. Decoding applies the declared
/// defaults for missing fields and then [`WireRecord::validate`], so a record
/// that comes back from `from_value` is safe to ingest.
pub trait WireRecord: Serialize + DeserializeOwned {
    fn validate(&self) -> Result<(), WireError> {
        Ok(())
    }

    fn from_value(value: &Value) -> Result<Self, WireError> {
        let record: Self = serde_json::from_value(value.clone())?;
        record.validate()?;
        Ok(record)
    }

    fn to_value(&self) -> Result<Value, WireError> {
        self.validate()?;
        Ok(serde_json::to_value(self)?)
    }
}

pub(crate) fn require_finite(field: &'static str, value: f32) -> Result<(), WireError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(WireError::NonFinite { field })
    }
}

pub(crate) fn require_key(field: &'static str, value: &str) -> Result<(), WireError> {
    if crate::store::is_valid_key(value) {
        Ok(())
    } else {
        Err(WireError::InvalidField {
            field,
            reason: format!("`{}` is not a usable store key", value),
        })
    }
}
