mod clock;
mod timer;
mod timestamp;

pub use clock::{Clock, ManualClock, SystemClock};
pub use timer::Timer;
pub use timestamp::{TimeError, Timestamp};
