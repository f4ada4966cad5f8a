// Archivo: errors.rs
// Propósito: errores de los colaboradores externos (pool de recursos,
// pipelines, ITSM) y el alias Result<T> del crate.
use thiserror::Error;

/// Errores devueltos por los clientes de servicios externos.
///
/// Los códigos de negocio del pool de recursos (recursos insuficientes,
/// fallo de bloqueo, ...) NO son errores de este tipo: viajan dentro de
/// `ApplyResponse::code` para que el ejecutor decida la política.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// El servicio no respondió o la llamada no pudo completarse.
    #[error("Servicio externo no disponible: {0}")]
    Unavailable(String),
    /// Respuesta con forma inesperada.
    #[error("Respuesta inválida de {service}: {message}")]
    InvalidResponse { service: String, message: String },
    /// Recurso remoto inexistente (request_id, servicio, ...).
    #[error("No encontrado: {0}")]
    NotFound(String),
    /// La petición fue rechazada por parámetros inválidos.
    #[error("Solicitud inválida: {0}")]
    InvalidRequest(String),
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, ProviderError>;
