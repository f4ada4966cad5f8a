// Archivo: config.rs
// Propósito: configuración del motor de tickets leída del entorno.
use crate::errors::{Result, TicketError};
use std::env;

/// Configuración del motor. `from_env` lee `.env` (si existe) y las
/// variables `DBM_*`; cualquier variable ausente toma su valor por defecto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketConfig {
  /// Nombre del servicio ITSM donde se crean las aprobaciones.
  pub itsm_service_name: String,
  /// Operador con el que actúan los reintentos automáticos.
  pub system_operator: String,
  /// Máximo de reintentos automáticos por flow.
  pub auto_retry_max_attempts: i64,
  /// Prefijo del `resource_type` enviado al pool (`{prefijo}{grupo}`).
  pub resource_type_prefix: String,
  /// Aprobadores de plataforma cuando el negocio no tiene administradores
  /// para la familia del ticket. Vacío: el alta falla.
  pub fallback_approvers: Vec<String>,
}

impl Default for TicketConfig {
  fn default() -> Self {
    TicketConfig { itsm_service_name: "dbm-ticket-approval".into(),
                   system_operator: "system".into(),
                   auto_retry_max_attempts: 3,
                   resource_type_prefix: String::new(),
                   fallback_approvers: Vec::new() }
  }
}

impl TicketConfig {
  pub fn from_env() -> Result<Self> {
    dotenvy::dotenv().ok();
    let defaults = TicketConfig::default();
    let auto_retry_max_attempts = match env::var("DBM_AUTO_RETRY_MAX") {
      Ok(v) => v.trim()
                .parse::<i64>()
                .map_err(|e| TicketError::Validation(format!("DBM_AUTO_RETRY_MAX inválido '{}': {}", v, e)))?,
      Err(_) => defaults.auto_retry_max_attempts,
    };
    let fallback_approvers = match env::var("DBM_FALLBACK_APPROVERS") {
      Ok(v) => v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect(),
      Err(_) => defaults.fallback_approvers,
    };
    Ok(TicketConfig { itsm_service_name: env::var("DBM_ITSM_SERVICE_NAME").unwrap_or(defaults.itsm_service_name),
                      system_operator: env::var("DBM_SYSTEM_OPERATOR").unwrap_or(defaults.system_operator),
                      auto_retry_max_attempts,
                      resource_type_prefix: env::var("DBM_RESOURCE_TYPE_PREFIX").unwrap_or(defaults.resource_type_prefix),
                      fallback_approvers })
  }

  /// `resource_type` del pool para una familia de motor.
  pub fn resource_type(&self, group: &str) -> String {
    format!("{}{}", self.resource_type_prefix, group)
  }
}
