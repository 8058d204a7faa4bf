//! Embedded SQL store and timestamped-table registry for NetGuard Pro.

pub mod registry;
pub mod schema;
pub mod store;

pub use registry::TableRegistry;
pub use store::Store;
