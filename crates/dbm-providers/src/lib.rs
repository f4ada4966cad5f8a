//! Crate `dbm-providers` — contratos de los servicios externos que consume
//! el motor de tickets.
//!
//! El núcleo de orquestación nunca habla HTTP directamente: depende de los
//! traits definidos aquí (`ResourcePoolClient`, `PipelineEngine`,
//! `ApprovalService`, `AdminDirectory`). El módulo `stubs` ofrece
//! implementaciones en memoria para pruebas, demos y wiring local.
//!
//! Ejemplo rápido:
//! ```rust
//! use dbm_providers::stubs::InMemoryResourcePool;
//! use dbm_providers::ResourcePoolClient;
//! let pool = InMemoryResourcePool::with_generated_hosts(4, 0);
//! assert_eq!(pool.available_count(), 4);
//! ```
pub mod admin;
pub mod approval;
pub mod errors;
pub mod host;
pub mod pipeline;
pub mod resource_pool;
pub mod stubs;

pub use admin::AdminDirectory;
pub use approval::{ApprovalField, ApprovalService};
pub use errors::{ProviderError, Result};
pub use host::HostInfo;
pub use pipeline::{ControllerInfo, PipelineEngine};
pub use resource_pool::{Affinity, ApplyDetail, ApplyErrCode, ApplyItem, ApplyRequest, ApplyResponse, LocationSpec,
                        ResourcePoolClient, ResourceRange, StorageSpec};
