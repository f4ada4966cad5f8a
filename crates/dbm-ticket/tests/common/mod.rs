#![allow(dead_code)]
// Utilidades compartidas por las pruebas de integración: contexto con
// repositorio en memoria y colaboradores stub.
use dbm_domain::DomainStubs;
use dbm_flow::{Flow, FlowType, InMemoryTicketRepository, Ticket, TicketRepository, TicketRepositoryExt, Todo};
use dbm_providers::stubs::{InMemoryApprovalService, InMemoryPipelineEngine, InMemoryResourcePool, StaticAdminDirectory};
use dbm_ticket::{BuilderRegistry, Collaborators, FlowManager, NewTicketRequest, TicketConfig, TicketContext, TicketType};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
  pub repo: Arc<InMemoryTicketRepository>,
  pub pool: Arc<InMemoryResourcePool>,
  pub pipeline: Arc<InMemoryPipelineEngine>,
  pub approval: Arc<InMemoryApprovalService>,
  pub manager: FlowManager,
}

impl Harness {
  /// Pool con `hosts` máquinas en la nube 0 y la tabla de constructores
  /// incorporada.
  pub fn new(hosts: usize) -> Self {
    Self::with_builders(hosts, BuilderRegistry::builtin().clone())
  }

  pub fn with_builders(hosts: usize, builders: BuilderRegistry) -> Self {
    Self::with_parts(hosts, builders, TicketConfig::default())
  }

  pub fn with_config(hosts: usize, config: TicketConfig) -> Self {
    Self::with_parts(hosts, BuilderRegistry::builtin().clone(), config)
  }

  fn with_parts(hosts: usize, builders: BuilderRegistry, config: TicketConfig) -> Self {
    let repo = Arc::new(InMemoryTicketRepository::new());
    let pool = Arc::new(InMemoryResourcePool::with_generated_hosts(hosts, 0));
    let pipeline = Arc::new(InMemoryPipelineEngine::new());
    let approval = Arc::new(InMemoryApprovalService::new());
    let admins = StaticAdminDirectory::new().with_platform_admins("mysql", &["dba-mysql"])
                                            .with_platform_admins("mongodb", &["dba-mongo"])
                                            .with_platform_admins("kafka", &["dba-kafka"])
                                            .with_biz_admins(3, "redis", &["ops-redis"]);
    let collaborators = Collaborators { clusters: Arc::new(DomainStubs::sample_clusters()),
                                        specs: Arc::new(DomainStubs::sample_specs()),
                                        admins: Arc::new(admins),
                                        resource_pool: pool.clone(),
                                        pipeline: pipeline.clone(),
                                        approval: approval.clone() };
    let repo_dyn: Arc<dyn TicketRepository> = repo.clone();
    let ctx = TicketContext::with_builders(repo_dyn, collaborators, config, builders);
    let manager = FlowManager::new(Arc::new(ctx));
    Harness { repo, pool, pipeline, approval, manager }
  }

  pub fn ctx(&self) -> &TicketContext {
    self.manager.context().as_ref()
  }

  pub fn create(&self, ticket_type: TicketType, details: JsonValue) -> Ticket {
    self.manager.create_ticket(NewTicketRequest::new(ticket_type, "alice", 3, details)).expect("crear ticket")
  }

  pub fn ticket(&self, id: &Uuid) -> Ticket {
    self.repo.atomic(|store| store.get_ticket(id)).expect("ticket")
  }

  pub fn flows(&self, id: &Uuid) -> Vec<Flow> {
    self.repo.atomic(|store| store.list_flows(id)).expect("flows")
  }

  pub fn todos(&self, id: &Uuid) -> Vec<Todo> {
    self.repo.atomic(|store| store.list_todos(id)).expect("todos")
  }

  pub fn flow_of(&self, id: &Uuid, flow_type: FlowType) -> Flow {
    self.flows(id).into_iter().find(|f| f.flow_type == flow_type).expect("flow del tipo pedido")
  }

  /// Arranca el ticket y aprueba el flow ITSM.
  pub fn run_and_approve(&self, id: &Uuid) -> dbm_flow::TicketStatus {
    self.manager.run(id).expect("run");
    self.manager.approve(id, "dba", true, "ok").expect("approve")
  }

  /// Termina con éxito la ejecución de pipeline del flow interno en curso.
  pub fn finish_running_pipeline(&self, id: &Uuid, succeeded: bool) -> dbm_flow::TicketStatus {
    let flow = self.flows(id)
                   .into_iter()
                   .find(|f| f.flow_type == FlowType::InnerFlow && f.status == dbm_flow::FlowStatus::Running)
                   .expect("flujo interno en ejecución");
    let root_id = flow.flow_obj_id.expect("root id");
    self.manager.on_pipeline_finished(&root_id, succeeded, "fin").expect("pipeline finished")
  }
}

/// `details.ticket_data` de un flow.
pub fn ticket_data(flow: &Flow) -> &JsonValue {
  flow.details.get("ticket_data").expect("ticket_data")
}
