// Archivo: registry.rs
// Propósito: tabla explícita `tipo de ticket -> fábrica de constructor`.
// La tabla incorporada se arma una sola vez al primer uso.
use crate::builder::kafka::KafkaApplyFlowBuilder;
use crate::builder::mongodb::MongoReplicaSetApplyFlowBuilder;
use crate::builder::mysql::{MysqlAddSlaveFlowBuilder, MysqlHaApplyFlowBuilder, MysqlHaDestroyFlowBuilder,
                            MysqlRollbackClusterFlowBuilder};
use crate::builder::redis::{RedisClusterApplyFlowBuilder, RedisScaleUpdownFlowBuilder};
use crate::builder::TicketFlowBuilder;
use crate::errors::{Result, TicketError};
use crate::ticket_type::TicketType;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

pub type BuilderFactory = fn() -> Box<dyn TicketFlowBuilder>;

static BUILTIN: Lazy<BuilderRegistry> = Lazy::new(|| {
  let mut reg = BuilderRegistry::new();
  reg.register(TicketType::MysqlHaApply, || Box::new(MysqlHaApplyFlowBuilder));
  reg.register(TicketType::MysqlAddSlave, || Box::new(MysqlAddSlaveFlowBuilder));
  reg.register(TicketType::MysqlRollbackCluster, || Box::new(MysqlRollbackClusterFlowBuilder));
  reg.register(TicketType::MysqlHaDestroy, || Box::new(MysqlHaDestroyFlowBuilder));
  reg.register(TicketType::RedisClusterApply, || Box::new(RedisClusterApplyFlowBuilder));
  reg.register(TicketType::RedisScaleUpdown, || Box::new(RedisScaleUpdownFlowBuilder));
  reg.register(TicketType::MongodbReplicasetApply, || Box::new(MongoReplicaSetApplyFlowBuilder));
  reg.register(TicketType::KafkaApply, || Box::new(KafkaApplyFlowBuilder));
  reg
});

/// Registro de constructores por tipo de ticket, en orden de alta.
#[derive(Clone, Default)]
pub struct BuilderRegistry {
  factories: IndexMap<TicketType, BuilderFactory>,
}

impl BuilderRegistry {
  pub fn new() -> Self {
    Self { factories: IndexMap::new() }
  }

  /// Tabla incorporada con todos los tipos de ticket conocidos.
  pub fn builtin() -> &'static BuilderRegistry {
    &BUILTIN
  }

  pub fn register(&mut self, ticket_type: TicketType, factory: BuilderFactory) {
    if self.factories.insert(ticket_type, factory).is_some() {
      log::warn!("constructor de {} registrado dos veces; gana el último", ticket_type);
    }
  }

  /// Instancia el constructor de `ticket_type`.
  pub fn get(&self, ticket_type: TicketType) -> Result<Box<dyn TicketFlowBuilder>> {
    let factory = self.factories
                      .get(&ticket_type)
                      .ok_or_else(|| TicketError::Build(format!("no hay constructor registrado para {}", ticket_type)))?;
    Ok(factory())
  }

  pub fn contains(&self, ticket_type: TicketType) -> bool {
    self.factories.contains_key(&ticket_type)
  }

  pub fn iter(&self) -> impl Iterator<Item = (TicketType, BuilderFactory)> + '_ {
    self.factories.iter().map(|(t, f)| (*t, *f))
  }

  pub fn len(&self) -> usize {
    self.factories.len()
  }

  pub fn is_empty(&self) -> bool {
    self.factories.is_empty()
  }
}
