//! Result store and its in-memory mirror.

pub mod hot;
pub mod store;


pub use hot::{HotCache, HotLookup};
pub use store::{ResultStore, StoreConfig};
