use crate::builder::TicketFlowBuilder;
use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::params::FlowParamBuilder;
use crate::ticket_type::TicketType;
use dbm_flow::Ticket;
use dbm_providers::ControllerInfo;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub const MONGODB_ROLE: &str = "mongodb";

/// Alta de replica set de un solo shard. Usa el constructor de recursos
/// por defecto.
pub struct MongoReplicaSetApplyParamBuilder;

impl FlowParamBuilder for MongoReplicaSetApplyParamBuilder {
  fn controller(&self) -> ControllerInfo {
    ControllerInfo::new("MongoDBController", "replicaset_apply")
  }

  fn format_ticket_data(&self, _ctx: &TicketContext, _ticket: &Ticket, data: &mut JsonValue) -> Result<()> {
    let replicas = data.pointer("/resource_spec/mongodb/count").and_then(JsonValue::as_u64);
    let obj = data.as_object_mut()
                  .ok_or_else(|| TicketError::Validation("datos de replica set no son un objeto".into()))?;
    if let Some(n) = replicas {
      if n == 0 {
        return Err(TicketError::Validation("un replica set necesita al menos un nodo".into()));
      }
      obj.insert("node_replica_count".into(), JsonValue::from(n));
    }
    obj.entry("port").or_insert(JsonValue::from(27017));
    Ok(())
  }
}

pub struct MongoReplicaSetApplyFlowBuilder;

impl TicketFlowBuilder for MongoReplicaSetApplyFlowBuilder {
  fn ticket_type(&self) -> TicketType {
    TicketType::MongodbReplicasetApply
  }

  fn inner_flow_builder(&self) -> Arc<dyn FlowParamBuilder> {
    Arc::new(MongoReplicaSetApplyParamBuilder)
  }
}
