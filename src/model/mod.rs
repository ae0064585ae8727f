//! Domain operations: account lifecycle and replication linkage.

pub mod master_info;
pub mod user;

pub use master_info::{MasterInfo, MasterInfoBuilder};
pub use user::{User, UserBuilder};
