// cluster.rs
use crate::{DbType, DomainError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Instancia (proceso) de un clúster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInstance {
  pub ip: String,
  pub port: u16,
  pub bk_host_id: i64,
  /// Rol de la instancia (`master`, `slave`, `proxy`, `mongod`, ...).
  pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
  pub id: i64,
  pub name: String,
  pub immute_domain: String,
  pub cluster_type: String,
  pub db_type: DbType,
  pub bk_biz_id: i64,
  pub bk_cloud_id: i64,
  pub major_version: String,
  pub region: String,
  pub db_module_id: i64,
  #[serde(default)]
  pub instances: Vec<ClusterInstance>,
}

impl Cluster {
  pub fn new(id: i64, name: &str, db_type: DbType, bk_biz_id: i64, bk_cloud_id: i64) -> Self {
    Self { id,
           name: name.to_string(),
           immute_domain: format!("{}.db", name),
           cluster_type: String::new(),
           db_type,
           bk_biz_id,
           bk_cloud_id,
           major_version: String::new(),
           region: String::new(),
           db_module_id: 0,
           instances: Vec::new() }
  }

  pub fn with_cluster_type(mut self, cluster_type: &str, major_version: &str) -> Self {
    self.cluster_type = cluster_type.to_string();
    self.major_version = major_version.to_string();
    self
  }

  pub fn with_instances(mut self, instances: Vec<ClusterInstance>) -> Self {
    self.instances = instances;
    self
  }

  /// Instancias con el rol indicado.
  pub fn instances_by_role(&self, role: &str) -> Vec<&ClusterInstance> {
    self.instances.iter().filter(|i| i.role == role).collect()
  }

  /// Huella SHA-256 de la configuración de un conjunto de clústeres,
  /// independiente del orden.
  pub fn config_digest(clusters: &[Cluster]) -> Result<String, DomainError> {
    let mut sorted: Vec<&Cluster> = clusters.iter().collect();
    sorted.sort_by_key(|c| c.id);
    let mut hasher = Sha256::new();
    for c in sorted {
      hasher.update(serde_json::to_vec(c)?);
    }
    Ok(format!("{:x}", hasher.finalize()))
  }
}

/// Acceso a los metadatos de clústeres.
pub trait ClusterRepository: Send + Sync {
  fn get(&self, cluster_id: i64) -> Result<Option<Cluster>, DomainError>;

  /// Obtiene todos los clústeres pedidos; falla si alguno no existe.
  fn get_many(&self, cluster_ids: &[i64]) -> Result<Vec<Cluster>, DomainError> {
    let mut out = Vec::with_capacity(cluster_ids.len());
    for id in cluster_ids {
      out.push(self.get(*id)?.ok_or_else(|| DomainError::NotFound(format!("cluster {}", id)))?);
    }
    Ok(out)
  }

  fn save(&self, cluster: Cluster) -> Result<(), DomainError>;
}
