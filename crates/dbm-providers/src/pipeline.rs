use crate::errors::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Punto de entrada del flujo interno en el motor de pipelines:
/// controlador + función de escena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInfo {
    pub controller: String,
    pub func_name: String,
}

impl ControllerInfo {
    pub fn new(controller: impl Into<String>, func_name: impl Into<String>) -> Self {
        ControllerInfo { controller: controller.into(), func_name: func_name.into() }
    }
}

/// Motor externo que ejecuta el DAG de actividades de un flujo interno.
///
/// El motor informa el resultado final de forma asíncrona; el núcleo sólo
/// necesita arrancar la ejecución con un `root_id` conocido de antemano.
pub trait PipelineEngine: Send + Sync {
    /// Arranca una ejecución y devuelve el id con que el motor la reporta
    /// (normalmente el propio `root_id`).
    fn start_run(&self, root_id: &str, controller: &ControllerInfo, params: &JsonValue) -> Result<String>;
}
