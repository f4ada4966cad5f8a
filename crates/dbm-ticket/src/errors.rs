use thiserror::Error;

// Errores comunes del motor de tickets.
//
// Este enum centraliza los errores que pueden ocurrir al construir o
// ejecutar un ticket: errores del almacén (`FlowError`), del dominio
// (`DomainError`), de los servicios externos (`ProviderError`), de
// validación y de construcción del plan.
#[derive(Error, Debug)]
pub enum TicketError {
  /// Errores originados por el almacén de tickets/flows.
  #[error("Error de flujo: {0}")]
  Flow(#[from] dbm_flow::FlowError),

  /// Errores del modelo de especificaciones / clústeres.
  #[error("Error de dominio: {0}")]
  Domain(#[from] dbm_domain::DomainError),

  /// Errores de un servicio externo (pool, pipeline, ITSM, ...).
  #[error("Error de proveedor: {0}")]
  Provider(#[from] dbm_providers::ProviderError),

  /// Errores de serializacion/deserializacion JSON.
  #[error("Error de serializacion: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Datos del ticket inválidos u operación no permitida en el estado
  /// actual.
  #[error("Error de validacion: {0}")]
  Validation(String),

  /// Plan de flows estructuralmente inválido. Se detecta antes de
  /// persistir nada.
  #[error("Error de construccion: {0}")]
  Build(String),

  /// El descriptor de callback guardado no existe en el registro
  /// (constructor incompatible con el flow almacenado).
  #[error("Callback no registrado: {0}")]
  CallbackNotFound(String),

  /// Un `pre_callback` o `post_callback` devolvió error.
  #[error("Error en callback {key}: {message}")]
  Callback { key: String, message: String },

  /// El pool de recursos rechazó la solicitud con un código de error.
  #[error("Error del pool de recursos (code={code}): {message}")]
  ResourceApply { code: i64, message: String },

  /// Error generico.
  #[error("Otro error: {0}")]
  Other(String),
}

pub type Result<T> = std::result::Result<T, TicketError>;
