// Archivo: resource_pool.rs
// Propósito: forma de las peticiones/respuestas del pool de recursos y el
// trait `ResourcePoolClient` que las transporta.
use crate::errors::Result;
use crate::host::HostInfo;
use serde::{Deserialize, Serialize};

/// Política de afinidad entre las máquinas de un mismo grupo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Affinity {
    #[default]
    None,
    CrossRack,
    SameSubzone,
    SameSubzoneCrossSwitch,
    CrossSubzone,
    MaxEachZoneEqual,
}

/// Restricción de ubicación (ciudad/zonas) de la solicitud.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocationSpec {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub sub_zone_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_or_exclude: Option<bool>,
}

/// Rango cerrado `[min, max]` para cpu/memoria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceRange {
    pub min: i64,
    pub max: i64,
}

/// Disco requerido en un punto de montaje.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSpec {
    pub mount_point: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub disk_type: String,
}

/// Una entrada de la solicitud: un grupo de máquinas con la misma
/// especificación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyDetail {
    /// Marca del grupo; el pool la devuelve tal cual en `ApplyItem::item`.
    pub group_mark: String,
    pub count: u32,
    pub bk_cloud_id: i64,
    #[serde(default)]
    pub affinity: Affinity,
    #[serde(default)]
    pub location_spec: LocationSpec,
    #[serde(default)]
    pub device_class: Vec<String>,
    pub cpu: ResourceRange,
    pub mem: ResourceRange,
    #[serde(default)]
    pub storage_spec: Vec<StorageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_id: Option<i64>,
}

/// Petición de pre-asignación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub for_biz_id: i64,
    pub resource_type: String,
    pub bill_id: String,
    pub bill_type: String,
    pub task_id: String,
    pub operator: String,
    pub details: Vec<ApplyDetail>,
}

/// Hosts asignados a una marca de grupo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyItem {
    pub item: String,
    pub data: Vec<HostInfo>,
}

/// Respuesta de pre-asignación. `code == 0` indica éxito.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResponse {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub data: Vec<ApplyItem>,
}

/// Códigos de negocio que exigen tratamiento especial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyErrCode {
    Ok,
    /// Fallo al bloquear inventario en el pool.
    LockFailed,
    /// Fallo al asignar máquinas.
    MachineFailed,
    /// Parámetros inválidos.
    ParamsInvalid,
    /// No hay inventario suficiente: condición esperada y recuperable.
    ResourceInsufficient,
    Unknown(i64),
}

impl ApplyErrCode {
    pub const OK: i64 = 0;
    pub const LOCK_FAILED: i64 = 1;
    pub const MACHINE_FAILED: i64 = 2;
    pub const PARAMS_INVALID: i64 = 3;
    pub const RESOURCE_INSUFFICIENT: i64 = 8;

    pub fn from_code(code: i64) -> Self {
        match code {
            Self::OK => ApplyErrCode::Ok,
            Self::LOCK_FAILED => ApplyErrCode::LockFailed,
            Self::MACHINE_FAILED => ApplyErrCode::MachineFailed,
            Self::PARAMS_INVALID => ApplyErrCode::ParamsInvalid,
            Self::RESOURCE_INSUFFICIENT => ApplyErrCode::ResourceInsufficient,
            other => ApplyErrCode::Unknown(other),
        }
    }
}

/// Cliente del pool de recursos.
///
/// Las implementaciones sólo transportan: un código de negocio distinto de
/// cero se devuelve como `Ok(ApplyResponse)`; `Err` queda para fallos de
/// transporte o respuestas ilegibles.
pub trait ResourcePoolClient: Send + Sync {
    /// Reserva máquinas para los grupos de la petición.
    fn pre_apply(&self, request: &ApplyRequest) -> Result<ApplyResponse>;

    /// Confirma el consumo de las máquinas reservadas. Confirmar dos veces la
    /// misma petición no es un error.
    fn confirm(&self, request_id: &str, host_ids: &[i64]) -> Result<()>;
}
