use crate::builder::registry::BuilderRegistry;
use crate::callbacks::CallbackRegistry;
use crate::config::TicketConfig;
use crate::errors::{Result, TicketError};
use dbm_domain::{ClusterRepository, SpecCatalog};
use dbm_flow::{FlowError, TicketRepository, TicketRepositoryExt, TicketStore};
use dbm_providers::{AdminDirectory, ApprovalService, PipelineEngine, ResourcePoolClient};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Servicios externos que consume el motor.
#[derive(Clone)]
pub struct Collaborators {
  pub clusters: Arc<dyn ClusterRepository>,
  pub specs: Arc<dyn SpecCatalog>,
  pub admins: Arc<dyn AdminDirectory>,
  pub resource_pool: Arc<dyn ResourcePoolClient>,
  pub pipeline: Arc<dyn PipelineEngine>,
  pub approval: Arc<dyn ApprovalService>,
}

/// Contexto compartido por constructores, ejecutores y el gestor.
///
/// Agrupa el repositorio de tickets, los colaboradores externos, los
/// registros de constructores y callbacks, y la configuración.
pub struct TicketContext {
  pub repo: Arc<dyn TicketRepository>,
  pub clusters: Arc<dyn ClusterRepository>,
  pub specs: Arc<dyn SpecCatalog>,
  pub admins: Arc<dyn AdminDirectory>,
  pub resource_pool: Arc<dyn ResourcePoolClient>,
  pub pipeline: Arc<dyn PipelineEngine>,
  pub approval: Arc<dyn ApprovalService>,
  pub builders: Arc<BuilderRegistry>,
  pub callbacks: Arc<CallbackRegistry>,
  pub config: TicketConfig,
  itsm_service_id: OnceCell<i64>,
}

impl TicketContext {
  /// Contexto con la tabla de constructores incorporada.
  pub fn new(repo: Arc<dyn TicketRepository>, collaborators: Collaborators, config: TicketConfig) -> Self {
    Self::with_builders(repo, collaborators, config, BuilderRegistry::builtin().clone())
  }

  /// Contexto con una tabla de constructores explícita. El registro de
  /// callbacks se deriva de ella.
  pub fn with_builders(repo: Arc<dyn TicketRepository>,
                       collaborators: Collaborators,
                       config: TicketConfig,
                       builders: BuilderRegistry)
                       -> Self {
    let callbacks = CallbackRegistry::from_builders(&builders);
    Self { repo,
           clusters: collaborators.clusters,
           specs: collaborators.specs,
           admins: collaborators.admins,
           resource_pool: collaborators.resource_pool,
           pipeline: collaborators.pipeline,
           approval: collaborators.approval,
           builders: Arc::new(builders),
           callbacks: Arc::new(callbacks),
           config,
           itsm_service_id: OnceCell::new() }
  }

  /// Id del servicio de aprobación; se consulta (o crea) una sola vez.
  pub fn itsm_service_id(&self) -> Result<i64> {
    self.itsm_service_id
        .get_or_try_init(|| -> Result<i64> {
          let id = self.approval.get_or_create_service(&self.config.itsm_service_name)?;
          log::info!("servicio ITSM '{}' resuelto con id {}", self.config.itsm_service_name, id);
          Ok(id)
        })
        .copied()
  }

  /// Ejecuta `work` en una transacción del repositorio. Si `work` falla,
  /// nada se aplica y se devuelve el error original.
  pub fn transaction<T, F>(&self, work: F) -> Result<T>
    where F: FnOnce(&mut dyn TicketStore) -> Result<T>
  {
    let mut failure: Option<TicketError> = None;
    let res = self.repo.atomic(|store| {
                         work(store).map_err(|e| {
                                      let msg = e.to_string();
                                      failure = Some(e);
                                      FlowError::Other(msg)
                                    })
                       });
    match res {
      Ok(v) => Ok(v),
      Err(e) => Err(failure.take().unwrap_or(TicketError::Flow(e))),
    }
  }
}
