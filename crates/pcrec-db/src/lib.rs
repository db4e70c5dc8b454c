//! pcrec DB - PostgreSQL implementation of the configuration store.

pub mod store;

pub use store::PgConfigStore;
