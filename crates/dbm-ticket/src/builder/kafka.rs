use crate::builder::{next_ticket_data, TicketFlowBuilder};
use crate::context::TicketContext;
use crate::errors::Result;
use crate::nodes::{nodes_from_json, nodes_to_json};
use crate::params::{FlowParamBuilder, ResourceApplyParamBuilder};
use crate::ticket_type::TicketType;
use dbm_flow::{Flow, Ticket};
use dbm_providers::ControllerInfo;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub const DEFAULT_KAFKA_PORT: i64 = 9092;

pub struct KafkaApplyParamBuilder;

impl FlowParamBuilder for KafkaApplyParamBuilder {
  fn controller(&self) -> ControllerInfo {
    ControllerInfo::new("KafkaController", "kafka_apply_scene")
  }

  fn format_ticket_data(&self, _ctx: &TicketContext, _ticket: &Ticket, data: &mut JsonValue) -> Result<()> {
    if let Some(obj) = data.as_object_mut() {
      obj.entry("port").or_insert(JsonValue::from(DEFAULT_KAFKA_PORT));
    }
    Ok(())
  }
}

/// El despliegue de Kafka espera el rol de zookeeper como `zk`.
pub struct KafkaApplyResourceParamBuilder;

impl ResourceApplyParamBuilder for KafkaApplyResourceParamBuilder {
  fn post_callback(&self,
                   _ctx: &TicketContext,
                   _ticket: &mut Ticket,
                   _flow: &Flow,
                   next: Option<&mut Flow>)
                   -> Result<()> {
    let data = next_ticket_data(next)?;
    let mut nodes = nodes_from_json(data.get("nodes").unwrap_or(&JsonValue::Null))?;
    if let Some(zk) = nodes.shift_remove("zookeeper") {
      nodes.insert("zk".into(), zk);
    }
    data.insert("nodes".into(), nodes_to_json(&nodes)?);
    Ok(())
  }
}

pub struct KafkaApplyFlowBuilder;

impl TicketFlowBuilder for KafkaApplyFlowBuilder {
  fn ticket_type(&self) -> TicketType {
    TicketType::KafkaApply
  }

  fn inner_flow_builder(&self) -> Arc<dyn FlowParamBuilder> {
    Arc::new(KafkaApplyParamBuilder)
  }

  fn resource_apply_builder(&self) -> Option<Arc<dyn ResourceApplyParamBuilder>> {
    Some(Arc::new(KafkaApplyResourceParamBuilder))
  }
}
