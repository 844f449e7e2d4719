pub mod procfs;
pub mod store;

pub use procfs::{ProcfsConfig, ProcfsSystemSource};
#[cfg(test)]
pub use store::MemoryStore;
pub use store::SqliteStore;
