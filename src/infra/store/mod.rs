//! Key-value backends for the task store.

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::InMemoryBackend;
