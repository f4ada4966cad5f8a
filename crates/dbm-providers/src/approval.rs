use crate::errors::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Campo clave/valor del formulario de aprobación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalField {
    pub key: String,
    pub value: String,
}

impl ApprovalField {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        ApprovalField { key: key.into(), value: value.into() }
    }
}

/// Servicio externo de aprobaciones (ITSM).
pub trait ApprovalService: Send + Sync {
    /// Devuelve el id del servicio de aprobación con ese nombre, creándolo si
    /// aún no existe.
    fn get_or_create_service(&self, name: &str) -> Result<i64>;

    /// Crea un ticket de aprobación y devuelve su número de serie. El
    /// resultado llega luego por callback con `callback_meta`.
    fn create_ticket(&self,
                     service_id: i64,
                     creator: &str,
                     fields: &[ApprovalField],
                     callback_meta: &JsonValue)
                     -> Result<String>;
}
