//! Bill splitting: the allocation engine, the participant/item consistency
//! rules it depends on, the persistence gate, and the thin HTTP and MongoDB
//! layer around them.

pub mod allocation;
pub mod bill;
pub mod config;
pub mod error;
pub mod participants;
pub mod routes;
pub mod schemas;
pub mod stats;
pub mod store;
pub mod validation;
