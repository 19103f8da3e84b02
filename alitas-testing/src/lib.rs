pub mod dummy;
pub mod fixtures;
pub mod recording;

pub use dummy::DummyState;
pub use fixtures::{block, random_transactions, tx};
pub use recording::RecordingHandler;
