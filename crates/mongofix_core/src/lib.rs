pub mod backup;
pub mod core_api;
pub mod documents;
pub mod ids;
pub mod registry;
pub mod store;
pub mod substitution;
