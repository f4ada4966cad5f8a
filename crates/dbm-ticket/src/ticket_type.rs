use crate::errors::TicketError;
use dbm_domain::DbType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tipos de ticket (operaciones) que conoce el motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
  MysqlHaApply,
  MysqlAddSlave,
  MysqlRollbackCluster,
  MysqlHaDestroy,
  RedisClusterApply,
  RedisScaleUpdown,
  MongodbReplicasetApply,
  KafkaApply,
}

impl TicketType {
  pub const ALL: [TicketType; 8] = [TicketType::MysqlHaApply,
                                    TicketType::MysqlAddSlave,
                                    TicketType::MysqlRollbackCluster,
                                    TicketType::MysqlHaDestroy,
                                    TicketType::RedisClusterApply,
                                    TicketType::RedisScaleUpdown,
                                    TicketType::MongodbReplicasetApply,
                                    TicketType::KafkaApply];

  pub fn as_str(&self) -> &'static str {
    match self {
      TicketType::MysqlHaApply => "MYSQL_HA_APPLY",
      TicketType::MysqlAddSlave => "MYSQL_ADD_SLAVE",
      TicketType::MysqlRollbackCluster => "MYSQL_ROLLBACK_CLUSTER",
      TicketType::MysqlHaDestroy => "MYSQL_HA_DESTROY",
      TicketType::RedisClusterApply => "REDIS_CLUSTER_APPLY",
      TicketType::RedisScaleUpdown => "REDIS_SCALE_UPDOWN",
      TicketType::MongodbReplicasetApply => "MONGODB_REPLICASET_APPLY",
      TicketType::KafkaApply => "KAFKA_APPLY",
    }
  }

  /// Familia de motor dueña del ticket (columna `group`).
  pub fn db_type(&self) -> DbType {
    match self {
      TicketType::MysqlHaApply
      | TicketType::MysqlAddSlave
      | TicketType::MysqlRollbackCluster
      | TicketType::MysqlHaDestroy => DbType::Mysql,
      TicketType::RedisClusterApply | TicketType::RedisScaleUpdown => DbType::Redis,
      TicketType::MongodbReplicasetApply => DbType::MongoDb,
      TicketType::KafkaApply => DbType::Kafka,
    }
  }

  /// Nombre legible usado en títulos de aprobación y alias de flows.
  pub fn display_name(&self) -> &'static str {
    match self {
      TicketType::MysqlHaApply => "MySQL: alta de clúster HA",
      TicketType::MysqlAddSlave => "MySQL: añadir esclavo",
      TicketType::MysqlRollbackCluster => "MySQL: retroceso a punto en el tiempo",
      TicketType::MysqlHaDestroy => "MySQL: baja de clúster HA",
      TicketType::RedisClusterApply => "Redis: alta de clúster",
      TicketType::RedisScaleUpdown => "Redis: escalado de capacidad",
      TicketType::MongodbReplicasetApply => "MongoDB: alta de replica set",
      TicketType::KafkaApply => "Kafka: alta de clúster",
    }
  }
}

impl fmt::Display for TicketType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for TicketType {
  type Err = TicketError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    TicketType::ALL.iter()
                   .find(|t| t.as_str().eq_ignore_ascii_case(s))
                   .copied()
                   .ok_or_else(|| TicketError::Validation(format!("tipo de ticket desconocido: {}", s)))
  }
}
