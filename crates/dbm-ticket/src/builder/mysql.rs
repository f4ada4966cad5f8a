// Archivo: mysql.rs
// Propósito: constructores de tickets MySQL (alta HA, añadir esclavo,
// retroceso a punto en el tiempo y baja de clúster).
use crate::builder::{inner_flow, next_ticket_data, role_hosts, TicketFlowBuilder};
use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::nodes::{nodes_from_json, BackendPair, RoleHosts};
use crate::params::{ticket_data_mut, FlowParamBuilder, PauseType, ResourceApplyParamBuilder, STAGE_INNER};
use crate::ticket_type::TicketType;
use dbm_domain::BACKEND_GROUP;
use dbm_flow::{Flow, NewFlow, RetryType, Ticket};
use dbm_providers::{ControllerInfo, HostInfo};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

const MYSQL_CONTROLLER: &str = "MySQLController";
pub const DEFAULT_MYSQL_PORT: i64 = 20000;
pub const DEFAULT_PROXY_PORT: i64 = 10000;
/// Etapa extra del retroceso: despliegue del clúster temporal.
pub const STAGE_DEPLOY_TMP: &str = "deploy_tmp";

fn require_key(data: &JsonValue, key: &str, ticket_type: TicketType) -> Result<()> {
  match data.get(key) {
    None | Some(JsonValue::Null) => Err(TicketError::Validation(format!("{}: falta '{}'", ticket_type, key))),
    Some(_) => Ok(()),
  }
}

// ---------------------------------------------------------------------------
// Alta de clúster HA
// ---------------------------------------------------------------------------

pub struct MysqlHaApplyParamBuilder;

impl FlowParamBuilder for MysqlHaApplyParamBuilder {
  fn controller(&self) -> ControllerInfo {
    ControllerInfo::new(MYSQL_CONTROLLER, "mysql_ha_apply_scene")
  }

  fn format_ticket_data(&self, _ctx: &TicketContext, _ticket: &Ticket, data: &mut JsonValue) -> Result<()> {
    if let Some(obj) = data.as_object_mut() {
      obj.entry("start_mysql_port").or_insert(JsonValue::from(DEFAULT_MYSQL_PORT));
      obj.entry("start_proxy_port").or_insert(JsonValue::from(DEFAULT_PROXY_PORT));
    }
    Ok(())
  }
}

/// Asignación final de un clúster del alta HA.
#[derive(Debug, Serialize)]
struct HaApplyInfo {
  new_master: HostInfo,
  new_slave: HostInfo,
  new_proxy: Vec<HostInfo>,
  mysql_port: i64,
  proxy_port: i64,
}

/// Reparte los pares de backend y los proxys en `apply_infos`: el clúster
/// `i` recibe el par `i` y los proxys `2i` y `2i+1`.
pub struct MysqlHaResourceParamBuilder;

impl ResourceApplyParamBuilder for MysqlHaResourceParamBuilder {
  fn post_callback(&self,
                   _ctx: &TicketContext,
                   _ticket: &mut Ticket,
                   _flow: &Flow,
                   next: Option<&mut Flow>)
                   -> Result<()> {
    let data = next_ticket_data(next)?;
    let nodes = nodes_from_json(data.get("nodes").unwrap_or(&JsonValue::Null))?;
    let pairs: Vec<BackendPair> = match nodes.get(BACKEND_GROUP) {
      Some(RoleHosts::Pairs(p)) => p.clone(),
      _ => return Err(TicketError::Validation("alta HA sin backend_group asignado".into())),
    };
    let proxies: Vec<HostInfo> = match nodes.get("proxy") {
      Some(RoleHosts::Hosts(h)) => h.clone(),
      _ => Vec::new(),
    };
    let mysql_port = data.get("start_mysql_port").and_then(JsonValue::as_i64).unwrap_or(DEFAULT_MYSQL_PORT);
    let proxy_port = data.get("start_proxy_port").and_then(JsonValue::as_i64).unwrap_or(DEFAULT_PROXY_PORT);
    let apply_infos: Vec<HaApplyInfo> =
      pairs.into_iter()
           .enumerate()
           .map(|(i, pair)| HaApplyInfo { new_master: pair.master,
                                          new_slave: pair.slave,
                                          new_proxy: proxies.iter().skip(2 * i).take(2).cloned().collect(),
                                          mysql_port,
                                          proxy_port })
           .collect();
    data.insert("apply_infos".into(), serde_json::to_value(&apply_infos)?);
    Ok(())
  }
}

pub struct MysqlHaApplyFlowBuilder;

impl TicketFlowBuilder for MysqlHaApplyFlowBuilder {
  fn ticket_type(&self) -> TicketType {
    TicketType::MysqlHaApply
  }

  fn inner_flow_builder(&self) -> Arc<dyn FlowParamBuilder> {
    Arc::new(MysqlHaApplyParamBuilder)
  }

  fn resource_apply_builder(&self) -> Option<Arc<dyn ResourceApplyParamBuilder>> {
    Some(Arc::new(MysqlHaResourceParamBuilder))
  }
}

// ---------------------------------------------------------------------------
// Añadir esclavo (por lotes)
// ---------------------------------------------------------------------------

pub struct MysqlAddSlaveParamBuilder;

impl FlowParamBuilder for MysqlAddSlaveParamBuilder {
  fn controller(&self) -> ControllerInfo {
    ControllerInfo::new(MYSQL_CONTROLLER, "mysql_add_slave_scene")
  }

  fn format_ticket_data(&self, _ctx: &TicketContext, _ticket: &Ticket, data: &mut JsonValue) -> Result<()> {
    let infos = data.get("infos")
                    .and_then(JsonValue::as_array)
                    .ok_or_else(|| TicketError::Validation("MYSQL_ADD_SLAVE necesita 'infos'".into()))?;
    for info in infos {
      require_key(info, "cluster_id", TicketType::MysqlAddSlave)?;
    }
    Ok(())
  }
}

/// Deja `new_slave_ip` en cada `infos[i]` a partir del host asignado.
pub struct MysqlAddSlaveResourceParamBuilder;

impl ResourceApplyParamBuilder for MysqlAddSlaveResourceParamBuilder {
  fn post_callback(&self,
                   _ctx: &TicketContext,
                   _ticket: &mut Ticket,
                   _flow: &Flow,
                   next: Option<&mut Flow>)
                   -> Result<()> {
    let data = next_ticket_data(next)?;
    let infos = data.get_mut("infos")
                    .and_then(JsonValue::as_array_mut)
                    .ok_or_else(|| TicketError::Validation("MYSQL_ADD_SLAVE sin 'infos' en el flow siguiente".into()))?;
    for (i, info) in infos.iter_mut().enumerate() {
      let obj = info.as_object_mut()
                    .ok_or_else(|| TicketError::Validation(format!("infos[{}] no es un objeto", i)))?;
      let hosts = role_hosts(obj, "new_slave")?.ok_or_else(|| {
                                                  TicketError::Validation(format!("infos[{}] sin new_slave asignado", i))
                                                })?;
      let ip = hosts.ips()
                    .into_iter()
                    .next()
                    .ok_or_else(|| TicketError::Validation(format!("infos[{}] con new_slave vacío", i)))?;
      obj.insert("new_slave_ip".into(), JsonValue::from(ip));
    }
    Ok(())
  }
}

pub struct MysqlAddSlaveFlowBuilder;

impl TicketFlowBuilder for MysqlAddSlaveFlowBuilder {
  fn ticket_type(&self) -> TicketType {
    TicketType::MysqlAddSlave
  }

  fn inner_flow_builder(&self) -> Arc<dyn FlowParamBuilder> {
    Arc::new(MysqlAddSlaveParamBuilder)
  }

  fn resource_batch_apply_builder(&self) -> Option<Arc<dyn ResourceApplyParamBuilder>> {
    Some(Arc::new(MysqlAddSlaveResourceParamBuilder))
  }
}

// ---------------------------------------------------------------------------
// Retroceso a punto en el tiempo: clúster temporal + restauración
// ---------------------------------------------------------------------------

/// Primera etapa: despliega el clúster temporal sobre `rollback_host`.
pub struct MysqlDeployTmpParamBuilder;

impl FlowParamBuilder for MysqlDeployTmpParamBuilder {
  fn controller(&self) -> ControllerInfo {
    ControllerInfo::new(MYSQL_CONTROLLER, "mysql_deploy_tmp_cluster_scene")
  }

  /// Pasa el host temporal a la etapa de restauración y lo anota en el
  /// ticket.
  fn post_callback(&self,
                   _ctx: &TicketContext,
                   ticket: &mut Ticket,
                   flow: &Flow,
                   next: Option<&mut Flow>)
                   -> Result<()> {
    let rollback_host = flow.details
                            .get("ticket_data")
                            .and_then(|d| d.get("nodes"))
                            .and_then(|n| n.get("rollback_host"))
                            .cloned()
                            .unwrap_or(JsonValue::Null);
    let data = next_ticket_data(next)?;
    data.insert("rollback_host".into(), rollback_host);
    data.insert("tmp_cluster_ready".into(), JsonValue::Bool(true));
    if let Some(details) = ticket.details.as_object_mut() {
      details.insert("tmp_cluster_ready".into(), JsonValue::Bool(true));
    }
    Ok(())
  }
}

pub struct MysqlRollbackParamBuilder;

impl FlowParamBuilder for MysqlRollbackParamBuilder {
  fn controller(&self) -> ControllerInfo {
    ControllerInfo::new(MYSQL_CONTROLLER, "mysql_rollback_data_scene")
  }

  fn format_ticket_data(&self, _ctx: &TicketContext, _ticket: &Ticket, data: &mut JsonValue) -> Result<()> {
    require_key(data, "cluster_id", TicketType::MysqlRollbackCluster)?;
    require_key(data, "rollback_time", TicketType::MysqlRollbackCluster)
  }

  /// La restauración sólo arranca con el clúster temporal listo.
  fn pre_callback(&self, _ctx: &TicketContext, _ticket: &Ticket, flow: &mut Flow) -> Result<()> {
    let ready = ticket_data_mut(flow)?.get("tmp_cluster_ready").and_then(JsonValue::as_bool).unwrap_or(false);
    if !ready {
      return Err(TicketError::Validation("el clúster temporal no está desplegado".into()));
    }
    Ok(())
  }
}

pub struct MysqlRollbackClusterFlowBuilder;

impl TicketFlowBuilder for MysqlRollbackClusterFlowBuilder {
  fn ticket_type(&self) -> TicketType {
    TicketType::MysqlRollbackCluster
  }

  fn inner_flow_builder(&self) -> Arc<dyn FlowParamBuilder> {
    Arc::new(MysqlRollbackParamBuilder)
  }

  fn extra_inner_builders(&self) -> Vec<(&'static str, Arc<dyn FlowParamBuilder>)> {
    vec![(STAGE_DEPLOY_TMP, Arc::new(MysqlDeployTmpParamBuilder))]
  }

  fn custom_flows(&self, ctx: &TicketContext, ticket: &Ticket) -> Result<Option<Vec<NewFlow>>> {
    let deploy = inner_flow(self, &MysqlDeployTmpParamBuilder, ctx, ticket, STAGE_DEPLOY_TMP, "Desplegar clúster temporal")?;
    let rollback = inner_flow(self, &MysqlRollbackParamBuilder, ctx, ticket, STAGE_INNER, &self.inner_flow_alias())?;
    Ok(Some(vec![deploy, rollback]))
  }
}

// ---------------------------------------------------------------------------
// Baja de clúster HA
// ---------------------------------------------------------------------------

pub struct MysqlHaDestroyParamBuilder;

impl FlowParamBuilder for MysqlHaDestroyParamBuilder {
  fn controller(&self) -> ControllerInfo {
    ControllerInfo::new(MYSQL_CONTROLLER, "mysql_ha_destroy_scene")
  }

  fn format_ticket_data(&self, _ctx: &TicketContext, _ticket: &Ticket, data: &mut JsonValue) -> Result<()> {
    let empty = data.get("cluster_ids").and_then(JsonValue::as_array).map(|a| a.is_empty()).unwrap_or(true);
    if empty {
      return Err(TicketError::Validation("MYSQL_HA_DESTROY necesita 'cluster_ids'".into()));
    }
    Ok(())
  }
}

pub struct MysqlHaDestroyFlowBuilder;

impl TicketFlowBuilder for MysqlHaDestroyFlowBuilder {
  fn ticket_type(&self) -> TicketType {
    TicketType::MysqlHaDestroy
  }

  fn needs_manual_confirmation(&self) -> bool {
    true
  }

  fn pause_type(&self) -> PauseType {
    PauseType::DestroyConfirm
  }

  fn needs_resource_pool(&self, _ticket: &Ticket) -> bool {
    false
  }

  fn inner_flow_builder(&self) -> Arc<dyn FlowParamBuilder> {
    Arc::new(MysqlHaDestroyParamBuilder)
  }

  fn retry_type(&self) -> RetryType {
    RetryType::ManualRetry
  }
}
