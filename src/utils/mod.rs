//! Utility modules

pub mod memory_storage;
pub mod money;
pub mod sqlite_storage;
pub mod validation;

pub use memory_storage::*;
pub use sqlite_storage::*;
pub use validation::*;
