//! The persistence gateway — pooled PostgreSQL access with a scoped
//! tenant-context operation primitive, plus typed query modules for
//! every entity in the data model. Every binary in the workspace
//! (`pulse-ingestd`, `pulse-evaluatord`, `pulse-notifyd`) depends on
//! this crate for all database access; none issue raw SQL of their own.

pub mod alerts;
pub mod channels;
pub mod config;
pub mod dead_letters;
pub mod device_state;
pub mod devices;
pub mod error;
pub mod gateway;
pub mod health;
pub mod jobs;
pub mod listen;
pub mod maintenance;
pub mod mappings;
pub mod quarantine;
pub mod routing;
pub mod rules;
pub mod sensors;
pub mod telemetry;
pub mod test_delivery;

pub use config::DatabaseConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{Gateway, TenantRole, assert_tenant_row};
