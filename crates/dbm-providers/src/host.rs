use serde::{Deserialize, Serialize};

/// Descriptor de una máquina entregada por el pool de recursos.
///
/// Es la unidad que termina en los mapas `nodes` del ticket; por eso se
/// serializa con los mismos nombres de campo que usa el pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub ip: String,
    pub bk_cloud_id: i64,
    pub bk_host_id: i64,
    pub bk_biz_id: i64,
    /// Núcleos.
    #[serde(default)]
    pub bk_cpu: i64,
    /// Memoria en MB.
    #[serde(default)]
    pub bk_mem: i64,
    /// Disco en GB.
    #[serde(default)]
    pub bk_disk: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
}

impl HostInfo {
    /// Construye un host mínimo; el resto de atributos queda en cero.
    pub fn new(ip: impl Into<String>, bk_cloud_id: i64, bk_host_id: i64) -> Self {
        HostInfo { ip: ip.into(),
                   bk_cloud_id,
                   bk_host_id,
                   bk_biz_id: 0,
                   bk_cpu: 0,
                   bk_mem: 0,
                   bk_disk: 0,
                   city: None,
                   sub_zone: None,
                   device_class: None }
    }
}
