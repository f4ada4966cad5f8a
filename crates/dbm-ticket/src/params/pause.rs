use crate::errors::Result;
use crate::params::CallbackDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Motivo de la pausa de confirmación manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseType {
  /// Confirmación genérica antes de continuar.
  ManualConfirm,
  /// Confirmación previa a una operación destructiva.
  DestroyConfirm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseParams {
  pub pause_type: PauseType,
  pub callback: CallbackDescriptor,
}

/// Parámetros del flow de pausa: sólo el tipo y el callback.
pub struct PauseParamBuilder {
  pause_type: PauseType,
}

impl PauseParamBuilder {
  pub fn new(pause_type: PauseType) -> Self {
    Self { pause_type }
  }

  pub fn pause_type(&self) -> PauseType {
    self.pause_type
  }

  pub fn build(&self, callback: CallbackDescriptor) -> Result<JsonValue> {
    Ok(serde_json::to_value(PauseParams { pause_type: self.pause_type, callback })?)
  }
}
