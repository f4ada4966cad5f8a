// Archivo: errors.rs
// Propósito: definir los errores del almacén de tickets/flows y el alias
// Result<T> usado por las APIs del crate.
use thiserror::Error;
/// Errores comunes del almacén de registros.
///
/// - `NotFound`: entidad no encontrada.
/// - `Conflict`: transición de estado no permitida u orden violado.
/// - `Storage`: error al acceder al almacenamiento.
/// - `Other`: cualquier otro error.
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    /// Entidad no encontrada (ticket, flow o todo).
    #[error("No encontrado: {0}")]
    NotFound(String),
    /// Conflicto de estado.
    #[error("Conflicto: {0}")]
    Conflict(String),
    /// Error genérico de almacenamiento (BD, pool, mutex, ...).
    #[error("Error de almacenamiento: {0}")]
    Storage(String),
    /// Otro tipo de error.
    #[error("Otro: {0}")]
    Other(String),
}
/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, FlowError>;
