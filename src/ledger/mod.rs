//! Ledger module containing account management, posting, statements and sales

pub mod account;
pub mod core;
pub mod journal;
pub mod sale;
pub mod statements;

pub use account::*;
pub use self::core::*;
pub use journal::*;
pub use sale::*;
pub use statements::*;
