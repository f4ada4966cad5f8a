//! dbm-domain: modelo de especificaciones, reglas de afinidad y metadatos
//! de clústeres que consumen los constructores de tickets.
mod cluster;
mod db_type;
mod domain_repository;
mod domain_stubs;
mod errors;
pub mod spec;

pub use cluster::{Cluster, ClusterInstance, ClusterRepository};
pub use db_type::DbType;
pub use domain_repository::{InMemoryClusterRepository, InMemorySpecCatalog};
pub use domain_stubs::DomainStubs;
pub use errors::DomainError;
pub use spec::{BackendSide, Spec, SpecCatalog, BACKEND_GROUP, BACKEND_GROUP_SUFFIX};
