use crate::builder::{next_ticket_data, role_hosts, TicketFlowBuilder};
use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::nodes::{nodes_from_json, RoleHosts};
use crate::params::{FlowParamBuilder, ResourceApplyParamBuilder};
use crate::ticket_type::TicketType;
use dbm_domain::BACKEND_GROUP;
use dbm_flow::{Flow, Ticket};
use dbm_providers::ControllerInfo;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

const REDIS_CONTROLLER: &str = "RedisController";

/// Listas de ips por lado a partir de los pares de backend.
fn write_backend_ips(target: &mut Map<String, JsonValue>, hosts: &RoleHosts) -> Result<()> {
  let pairs = match hosts {
    RoleHosts::Pairs(p) => p,
    RoleHosts::Hosts(_) => return Err(TicketError::Validation("backend_group sin emparejar".into())),
  };
  let masters: Vec<String> = pairs.iter().map(|p| p.master.ip.clone()).collect();
  let slaves: Vec<String> = pairs.iter().map(|p| p.slave.ip.clone()).collect();
  target.insert("master_ips".into(), JsonValue::from(masters));
  target.insert("slave_ips".into(), JsonValue::from(slaves));
  Ok(())
}

pub struct RedisClusterApplyParamBuilder;

impl FlowParamBuilder for RedisClusterApplyParamBuilder {
  fn controller(&self) -> ControllerInfo {
    ControllerInfo::new(REDIS_CONTROLLER, "redis_cluster_apply_flow")
  }

  fn format_ticket_data(&self, _ctx: &TicketContext, _ticket: &Ticket, data: &mut JsonValue) -> Result<()> {
    if let Some(obj) = data.as_object_mut() {
      obj.entry("proxy_port").or_insert(JsonValue::from(50000));
      obj.entry("shard_num").or_insert(JsonValue::from(1));
    }
    Ok(())
  }
}

pub struct RedisClusterApplyResourceParamBuilder;

impl ResourceApplyParamBuilder for RedisClusterApplyResourceParamBuilder {
  fn post_callback(&self,
                   _ctx: &TicketContext,
                   _ticket: &mut Ticket,
                   _flow: &Flow,
                   next: Option<&mut Flow>)
                   -> Result<()> {
    let data = next_ticket_data(next)?;
    let nodes = nodes_from_json(data.get("nodes").unwrap_or(&JsonValue::Null))?;
    let proxy_ips = nodes.get("proxy").map(RoleHosts::ips).unwrap_or_default();
    data.insert("proxy_ips".into(), JsonValue::from(proxy_ips));
    let backend = nodes.get(BACKEND_GROUP)
                       .ok_or_else(|| TicketError::Validation("alta Redis sin backend_group asignado".into()))?;
    write_backend_ips(data, backend)
  }
}

pub struct RedisClusterApplyFlowBuilder;

impl TicketFlowBuilder for RedisClusterApplyFlowBuilder {
  fn ticket_type(&self) -> TicketType {
    TicketType::RedisClusterApply
  }

  fn inner_flow_builder(&self) -> Arc<dyn FlowParamBuilder> {
    Arc::new(RedisClusterApplyParamBuilder)
  }

  fn resource_apply_builder(&self) -> Option<Arc<dyn ResourceApplyParamBuilder>> {
    Some(Arc::new(RedisClusterApplyResourceParamBuilder))
  }
}

pub struct RedisScaleUpdownParamBuilder;

impl FlowParamBuilder for RedisScaleUpdownParamBuilder {
  fn controller(&self) -> ControllerInfo {
    ControllerInfo::new(REDIS_CONTROLLER, "redis_scale_updown_flow")
  }
}

/// Por cada `infos[i]`, ips master/slave del backend group asignado.
pub struct RedisScaleUpdownResourceParamBuilder;

impl ResourceApplyParamBuilder for RedisScaleUpdownResourceParamBuilder {
  fn post_callback(&self,
                   _ctx: &TicketContext,
                   _ticket: &mut Ticket,
                   _flow: &Flow,
                   next: Option<&mut Flow>)
                   -> Result<()> {
    let data = next_ticket_data(next)?;
    let infos = data.get_mut("infos")
                    .and_then(JsonValue::as_array_mut)
                    .ok_or_else(|| TicketError::Validation("REDIS_SCALE_UPDOWN sin 'infos'".into()))?;
    for (i, info) in infos.iter_mut().enumerate() {
      let obj = info.as_object_mut()
                    .ok_or_else(|| TicketError::Validation(format!("infos[{}] no es un objeto", i)))?;
      if let Some(hosts) = role_hosts(obj, BACKEND_GROUP)? {
        write_backend_ips(obj, &hosts)?;
      }
    }
    Ok(())
  }
}

pub struct RedisScaleUpdownFlowBuilder;

impl TicketFlowBuilder for RedisScaleUpdownFlowBuilder {
  fn ticket_type(&self) -> TicketType {
    TicketType::RedisScaleUpdown
  }

  fn inner_flow_builder(&self) -> Arc<dyn FlowParamBuilder> {
    Arc::new(RedisScaleUpdownParamBuilder)
  }

  fn resource_batch_apply_builder(&self) -> Option<Arc<dyn ResourceApplyParamBuilder>> {
    Some(Arc::new(RedisScaleUpdownResourceParamBuilder))
  }
}
