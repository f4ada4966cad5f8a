use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Familia de motor a la que pertenece un ticket o un clúster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
  Mysql,
  TenDbCluster,
  Redis,
  MongoDb,
  Kafka,
  Pulsar,
  Hdfs,
  Es,
  Doris,
  InfluxDb,
  Vm,
  Riak,
}

impl DbType {
  pub fn as_str(&self) -> &'static str {
    match self {
      DbType::Mysql => "mysql",
      DbType::TenDbCluster => "tendbcluster",
      DbType::Redis => "redis",
      DbType::MongoDb => "mongodb",
      DbType::Kafka => "kafka",
      DbType::Pulsar => "pulsar",
      DbType::Hdfs => "hdfs",
      DbType::Es => "es",
      DbType::Doris => "doris",
      DbType::InfluxDb => "influxdb",
      DbType::Vm => "vm",
      DbType::Riak => "riak",
    }
  }
}

impl fmt::Display for DbType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for DbType {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let t = match s.to_lowercase().as_str() {
      "mysql" => DbType::Mysql,
      "tendbcluster" => DbType::TenDbCluster,
      "redis" => DbType::Redis,
      "mongodb" => DbType::MongoDb,
      "kafka" => DbType::Kafka,
      "pulsar" => DbType::Pulsar,
      "hdfs" => DbType::Hdfs,
      "es" => DbType::Es,
      "doris" => DbType::Doris,
      "influxdb" => DbType::InfluxDb,
      "vm" => DbType::Vm,
      "riak" => DbType::Riak,
      other => return Err(DomainError::ValidationError(format!("tipo de BD desconocido: {}", other))),
    };
    Ok(t)
  }
}
