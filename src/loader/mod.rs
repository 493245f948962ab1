pub mod decode;
pub mod sample_loader;
pub mod sample_store;

pub use decode::DecodeError;
pub use sample_loader::{DecodeJob, SampleLoader};
pub use sample_store::{prepare, LoadedSample, PreparedSample, SampleStore, SampleTarget};
