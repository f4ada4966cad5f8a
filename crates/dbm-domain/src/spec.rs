// spec.rs
//
// Especificación de máquina y construcción de los detalles de solicitud al
// pool de recursos, incluidos los "backend groups" (pares master/slave).
use crate::DomainError;
use dbm_providers::{Affinity, ApplyDetail, LocationSpec, ResourceRange, StorageSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Nombre del rol que se asigna en pares master/slave.
pub const BACKEND_GROUP: &str = "backend_group";
/// Sufijo de las marcas de grupo de un backend group en la respuesta.
pub const BACKEND_GROUP_SUFFIX: &str = "_backend_group";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spec {
  pub spec_id: i64,
  pub spec_name: String,
  pub spec_cluster_type: String,
  pub spec_machine_type: String,
  pub cpu: ResourceRange,
  pub mem: ResourceRange,
  #[serde(default)]
  pub device_class: Vec<String>,
  #[serde(default)]
  pub storage_spec: Vec<StorageSpec>,
  #[serde(default = "default_enable")]
  pub enable: bool,
}

fn default_enable() -> bool {
  true
}

impl Spec {
  pub fn new(spec_id: i64, spec_name: &str, cpu: ResourceRange, mem: ResourceRange) -> Result<Self, DomainError> {
    let spec = Self { spec_id,
                      spec_name: spec_name.to_string(),
                      spec_cluster_type: String::new(),
                      spec_machine_type: String::new(),
                      cpu,
                      mem,
                      device_class: Vec::new(),
                      storage_spec: Vec::new(),
                      enable: true };
    spec.validate()?;
    Ok(spec)
  }

  pub fn with_machine_type(mut self, cluster_type: &str, machine_type: &str) -> Self {
    self.spec_cluster_type = cluster_type.to_string();
    self.spec_machine_type = machine_type.to_string();
    self
  }

  pub fn with_storage(mut self, storage: Vec<StorageSpec>) -> Self {
    self.storage_spec = storage;
    self
  }

  pub fn validate(&self) -> Result<(), DomainError> {
    if self.cpu.min > self.cpu.max || self.mem.min > self.mem.max {
      return Err(DomainError::ValidationError(format!("spec {}: rango min > max", self.spec_id)));
    }
    if self.cpu.min < 0 || self.mem.min < 0 {
      return Err(DomainError::ValidationError(format!("spec {}: rangos negativos", self.spec_id)));
    }
    Ok(())
  }

  /// Atributos de la especificación tal como se inyectan en
  /// `resource_spec` de los datos del ticket.
  pub fn spec_info(&self) -> JsonValue {
    serde_json::json!({
      "id": self.spec_id,
      "name": self.spec_name,
      "cluster_type": self.spec_cluster_type,
      "machine_type": self.spec_machine_type,
      "cpu": self.cpu,
      "mem": self.mem,
      "device_class": self.device_class,
      "storage_spec": self.storage_spec,
    })
  }

  /// `spec_info()` con el `count` solicitado.
  pub fn spec_info_with_count(&self, count: u32) -> JsonValue {
    let mut info = self.spec_info();
    if let Some(obj) = info.as_object_mut() {
      obj.insert("count".into(), JsonValue::from(count));
    }
    info
  }

  /// Detalle de solicitud para un grupo simple.
  pub fn apply_detail(&self,
                      group_mark: &str,
                      count: u32,
                      bk_cloud_id: i64,
                      affinity: Affinity,
                      location_spec: LocationSpec)
                      -> ApplyDetail {
    ApplyDetail { group_mark: group_mark.to_string(),
                  count,
                  bk_cloud_id,
                  affinity,
                  location_spec,
                  device_class: self.device_class.clone(),
                  cpu: self.cpu,
                  mem: self.mem,
                  storage_spec: self.storage_spec.clone(),
                  spec_id: Some(self.spec_id) }
  }

  /// Detalles de un backend group: un grupo master y uno slave con el
  /// mismo `count`. `group_key` es la clave del rol (`backend_group` o
  /// `{i}_backend_group` en lotes).
  pub fn backend_group_apply_details(&self,
                                     group_key: &str,
                                     count: u32,
                                     bk_cloud_id: i64,
                                     affinity: Affinity,
                                     location_spec: LocationSpec)
                                     -> Result<[ApplyDetail; 2], DomainError> {
    let (master, slave) = backend_group_marks(group_key)?;
    Ok([self.apply_detail(&master, count, bk_cloud_id, affinity, location_spec.clone()),
        self.apply_detail(&slave, count, bk_cloud_id, affinity, location_spec)])
  }
}

/// Lado de un par de backend group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSide {
  Master,
  Slave,
}

impl BackendSide {
  pub fn as_str(&self) -> &'static str {
    match self {
      BackendSide::Master => "master",
      BackendSide::Slave => "slave",
    }
  }
}

/// ¿Es `role_key` un backend group (con o sin prefijo de lote)?
pub fn is_backend_group(role_key: &str) -> bool {
  role_key == BACKEND_GROUP || role_key.ends_with(BACKEND_GROUP_SUFFIX)
}

/// Marcas master/slave para la clave `backend_group` o `{i}_backend_group`.
pub fn backend_group_marks(group_key: &str) -> Result<(String, String), DomainError> {
  let prefix = group_key.strip_suffix(BACKEND_GROUP)
                        .ok_or_else(|| DomainError::ValidationError(format!("{} no es un backend group", group_key)))?;
  Ok((format!("{}master{}", prefix, BACKEND_GROUP_SUFFIX), format!("{}slave{}", prefix, BACKEND_GROUP_SUFFIX)))
}

/// Interpreta una marca de respuesta `{prefijo}master_backend_group`.
/// Devuelve la clave del grupo (`{prefijo}backend_group`) y el lado, o
/// `None` si la marca no pertenece a un backend group.
pub fn parse_backend_group_mark(item: &str) -> Option<(String, BackendSide)> {
  let head = item.strip_suffix(BACKEND_GROUP_SUFFIX)?;
  let (prefix, side) = match head.rfind('_') {
    Some(pos) => (&head[..=pos], &head[pos + 1..]),
    None => ("", head),
  };
  let side = match side {
    "master" => BackendSide::Master,
    "slave" => BackendSide::Slave,
    _ => return None,
  };
  Some((format!("{}{}", prefix, BACKEND_GROUP), side))
}

/// Catálogo de especificaciones.
pub trait SpecCatalog: Send + Sync {
  fn get_spec(&self, spec_id: i64) -> Result<Option<Spec>, DomainError>;

  /// Como `get_spec` pero exige que exista y esté habilitada.
  fn require_spec(&self, spec_id: i64) -> Result<Spec, DomainError> {
    let spec = self.get_spec(spec_id)?.ok_or_else(|| DomainError::NotFound(format!("spec {}", spec_id)))?;
    if !spec.enable {
      return Err(DomainError::ValidationError(format!("spec {} deshabilitada", spec_id)));
    }
    Ok(spec)
  }
}
