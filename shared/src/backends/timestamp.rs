use std::time::SystemTime;

use thiserror::Error;

use crate::types::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("System time is before the UNIX epoch")]
    SystemTimeBeforeEpoch,
}

/// Wall-clock reads in the store's timestamp unit.
pub struct Timestamp;

impl Timestamp {
    /// Milliseconds since the UNIX epoch.
    ///
    /// # Errors
    /// Returns `TimeError::SystemTimeBeforeEpoch` if the system clock is set
    /// before the epoch.
    pub fn try_now_millis() -> Result<Millis, TimeError> {
        let elapsed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(|_| TimeError::SystemTimeBeforeEpoch)?;
        Ok(Millis::try_from(elapsed.as_millis()).unwrap_or(Millis::MAX))
    }
}
