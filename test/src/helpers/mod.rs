pub mod assertions;
pub mod recorder;
pub mod test_session;

pub use recorder::Recorder;
pub use test_session::{init_logging, TestSession, TEST_EPOCH};
