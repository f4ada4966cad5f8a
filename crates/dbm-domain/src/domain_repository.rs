use crate::{Cluster, ClusterRepository, DomainError, Spec, SpecCatalog};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Catálogo de especificaciones en memoria para tests y desarrollo.
pub struct InMemorySpecCatalog {
  specs: Arc<Mutex<HashMap<i64, Spec>>>,
}

impl InMemorySpecCatalog {
  pub fn new() -> Self {
    Self { specs: Arc::new(Mutex::new(HashMap::new())) }
  }

  pub fn insert(&self, spec: Spec) -> Result<(), DomainError> {
    spec.validate()?;
    let mut specs = self.specs.lock().map_err(|e| DomainError::ExternalError(format!("mutex poisoned: {:?}", e)))?;
    specs.insert(spec.spec_id, spec);
    Ok(())
  }
}

impl Default for InMemorySpecCatalog {
  fn default() -> Self {
    Self::new()
  }
}

impl SpecCatalog for InMemorySpecCatalog {
  fn get_spec(&self, spec_id: i64) -> Result<Option<Spec>, DomainError> {
    let specs = self.specs.lock().map_err(|e| DomainError::ExternalError(format!("mutex poisoned: {:?}", e)))?;
    Ok(specs.get(&spec_id).cloned())
  }
}

/// Repositorio de clústeres en memoria.
pub struct InMemoryClusterRepository {
  clusters: Arc<Mutex<HashMap<i64, Cluster>>>,
}

impl InMemoryClusterRepository {
  pub fn new() -> Self {
    Self { clusters: Arc::new(Mutex::new(HashMap::new())) }
  }

  /// Elimina un clúster (simula bajas posteriores al envío del ticket).
  pub fn remove(&self, cluster_id: i64) -> Result<Option<Cluster>, DomainError> {
    let mut clusters =
      self.clusters.lock().map_err(|e| DomainError::ExternalError(format!("mutex poisoned: {:?}", e)))?;
    Ok(clusters.remove(&cluster_id))
  }
}

impl Default for InMemoryClusterRepository {
  fn default() -> Self {
    Self::new()
  }
}

impl ClusterRepository for InMemoryClusterRepository {
  fn get(&self, cluster_id: i64) -> Result<Option<Cluster>, DomainError> {
    let clusters =
      self.clusters.lock().map_err(|e| DomainError::ExternalError(format!("mutex poisoned: {:?}", e)))?;
    Ok(clusters.get(&cluster_id).cloned())
  }

  fn save(&self, cluster: Cluster) -> Result<(), DomainError> {
    let mut clusters =
      self.clusters.lock().map_err(|e| DomainError::ExternalError(format!("mutex poisoned: {:?}", e)))?;
    clusters.insert(cluster.id, cluster);
    Ok(())
  }
}
