mod artifact;
mod file_store;
mod memory_store;
mod model_store;

pub use artifact::Artifact;
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use model_store::{ModelStore, validate_key};
