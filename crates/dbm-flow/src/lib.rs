//! Crate `dbm-flow` — registros persistidos del orquestador de tickets.
//!
//! Define los tipos `Ticket`, `Flow` y `Todo` con sus estados, el contrato
//! transaccional `TicketRepository`/`TicketStore` y una implementación en
//! memoria útil para pruebas (`InMemoryTicketRepository`).
//!
//! Diseño resumido:
//! - Un ticket se descompone en flows ordenados por `ordinal`.
//! - Cada avance de estado se escribe dentro de una transacción: o se
//!   aplica todo el trabajo o nada.
//! - Los todos abiertos se deduplican por (flow, tipo).
//!
//! Ejemplo rápido:
//! ```rust
//! use dbm_flow::{InMemoryTicketRepository, NewTicket, TicketRepositoryExt};
//! use serde_json::json;
//! let repo = InMemoryTicketRepository::new();
//! let ticket = repo.atomic(|store| {
//!                      store.insert_ticket(NewTicket { ticket_type: "MYSQL_HA_APPLY".into(),
//!                                                      creator: "admin".into(),
//!                                                      bk_biz_id: 3,
//!                                                      group: "mysql".into(),
//!                                                      remark: String::new(),
//!                                                      details: json!({}) })
//!                  })
//!                  .unwrap();
//! assert_eq!(ticket.status.as_str(), "PENDING");
//! ```
pub mod domain;
pub mod errors;
pub mod repository;
pub mod stubs;

pub use domain::*;
pub use errors::*;
pub use repository::*;
pub use stubs::*;
