pub mod agent;
pub mod api;
pub mod backup;
pub mod inventory;
pub mod metrics;
pub mod organization;
pub mod storage;
pub mod trends;
