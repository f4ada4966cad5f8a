//! Crate `dbm-ticket` — núcleo de orquestación de tickets.
//!
//! Un ticket se convierte en una lista ordenada de flows (aprobación ITSM,
//! confirmación manual, solicitud de recursos, flujos internos y entrega)
//! que el `FlowManager` ejecuta en orden. Cada tipo de ticket tiene un
//! `TicketFlowBuilder` registrado en una tabla incorporada; los callbacks
//! entre etapas se resuelven por clave en el `CallbackRegistry`.
//!
//! Ejemplo rápido:
//! ```rust
//! use dbm_ticket::{BuilderRegistry, TicketType};
//! let registry = BuilderRegistry::builtin();
//! assert!(registry.contains(TicketType::MongodbReplicasetApply));
//! ```
pub mod builder;
pub mod callbacks;
pub mod config;
pub mod context;
pub mod errors;
pub mod executors;
pub mod factory;
pub mod manager;
pub mod nodes;
pub mod params;
pub mod ticket_type;
pub mod view;

pub use builder::{build_flows, validate_plan, BuilderFactory, BuilderRegistry, TicketFlowBuilder};
pub use callbacks::{CallbackRegistry, CallbackTarget};
pub use config::TicketConfig;
pub use context::{Collaborators, TicketContext};
pub use errors::{Result, TicketError};
pub use executors::{confirm_resource, FlowOutcome};
pub use factory::{NewTicketRequest, TicketFactory};
pub use manager::{FlowManager, RetryTrigger};
pub use nodes::{BackendPair, NodeMap, RoleHosts};
pub use params::CallbackDescriptor;
pub use ticket_type::TicketType;
pub use view::{FlowView, TicketView};
