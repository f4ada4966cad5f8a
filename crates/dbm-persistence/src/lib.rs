//! Persistencia Diesel del trait `TicketRepository`.
//! Expone el módulo `schema` y reexporta el repositorio; la implementación
//! está en `ticket_persistence.rs`. SQLite por defecto, Postgres con la
//! feature `pg`.

pub mod schema;
mod ticket_persistence;

pub use ticket_persistence::{new_from_env, DieselTicketRepository, MIGRATIONS};
