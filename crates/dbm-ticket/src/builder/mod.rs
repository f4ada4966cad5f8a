//! Constructores de flows por tipo de ticket.
//!
//! Cada tipo de ticket tiene un `TicketFlowBuilder` que decide qué etapas
//! lleva su plan (aprobación, confirmación, recursos, flujos internos,
//! entrega) y qué constructores de parámetros usa en cada una.
pub mod kafka;
pub mod mongodb;
pub mod mysql;
pub mod redis;
pub mod registry;

use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::params::resource::build_resource_flow_details;
use crate::nodes::RoleHosts;
use crate::params::{build_inner_flow_details, referenced_cluster_ids, ticket_data_mut, CallbackDescriptor,
                    DefaultResourceParamBuilder, FlowParamBuilder, ItsmParamBuilder, PauseParamBuilder, PauseType,
                    ResourceApplyParamBuilder, STAGE_INNER, STAGE_PAUSE, STAGE_RESOURCE_APPLY,
                    STAGE_RESOURCE_BATCH_APPLY};
use crate::ticket_type::TicketType;
use dbm_domain::Cluster;
use dbm_flow::{Flow, FlowType, NewFlow, RetryType, Ticket};
use serde_json::{json, Map, Value as JsonValue};
use std::sync::Arc;

pub use registry::{BuilderFactory, BuilderRegistry};

/// Valor de `ip_source` que activa el pool de recursos.
pub const IP_SOURCE_RESOURCE_POOL: &str = "resource_pool";

/// Estrategia de construcción del plan de un tipo de ticket.
pub trait TicketFlowBuilder: Send + Sync {
  fn ticket_type(&self) -> TicketType;

  fn needs_approval(&self) -> bool {
    true
  }

  fn needs_manual_confirmation(&self) -> bool {
    false
  }

  fn pause_type(&self) -> PauseType {
    PauseType::ManualConfirm
  }

  /// Por defecto, según `ip_source == "resource_pool"` en el ticket.
  fn needs_resource_pool(&self, ticket: &Ticket) -> bool {
    ticket.details.get("ip_source").and_then(JsonValue::as_str) == Some(IP_SOURCE_RESOURCE_POOL)
  }

  /// Constructor del flujo interno genérico.
  fn inner_flow_builder(&self) -> Arc<dyn FlowParamBuilder>;

  fn inner_flow_alias(&self) -> String {
    self.ticket_type().display_name().to_string()
  }

  fn resource_apply_builder(&self) -> Option<Arc<dyn ResourceApplyParamBuilder>> {
    None
  }

  /// Si existe, el ticket usa resource-apply por lotes.
  fn resource_batch_apply_builder(&self) -> Option<Arc<dyn ResourceApplyParamBuilder>> {
    None
  }

  /// Constructores extra (etapa, constructor) usados por planes propios.
  fn extra_inner_builders(&self) -> Vec<(&'static str, Arc<dyn FlowParamBuilder>)> {
    Vec::new()
  }

  /// Plan propio que sustituye al flujo interno genérico.
  fn custom_flows(&self, _ctx: &TicketContext, _ticket: &Ticket) -> Result<Option<Vec<NewFlow>>> {
    Ok(None)
  }

  fn retry_type(&self) -> RetryType {
    RetryType::AutoRetry
  }

  /// Enriquecimiento del ticket tras construir el plan.
  fn patch_ticket_detail(&self, ctx: &TicketContext, ticket: &mut Ticket) -> Result<()> {
    snapshot_clusters(ctx, ticket)
  }
}

/// Flow interno para una etapa de `builder`.
pub fn inner_flow(builder: &dyn TicketFlowBuilder,
                  param_builder: &dyn FlowParamBuilder,
                  ctx: &TicketContext,
                  ticket: &Ticket,
                  stage: &str,
                  alias: &str)
                  -> Result<NewFlow> {
  let callback = CallbackDescriptor::new(builder.ticket_type(), stage);
  let details = build_inner_flow_details(param_builder, ctx, ticket, callback)?;
  Ok(NewFlow::new(FlowType::InnerFlow, alias, details).with_retry_type(builder.retry_type()))
}

/// Arma la lista ordenada de flows del ticket. No persiste nada.
pub fn build_flows(builder: &dyn TicketFlowBuilder, ctx: &TicketContext, ticket: &Ticket) -> Result<Vec<NewFlow>> {
  let ticket_type = builder.ticket_type();
  let retry_type = builder.retry_type();
  let mut flows = Vec::new();

  if builder.needs_approval() {
    let details = ItsmParamBuilder::new(ticket_type).build(ctx, ticket)?;
    flows.push(NewFlow::new(FlowType::ItsmApproval, "Aprobación ITSM", details).with_retry_type(retry_type));
  }

  if builder.needs_manual_confirmation() {
    let details =
      PauseParamBuilder::new(builder.pause_type()).build(CallbackDescriptor::new(ticket_type, STAGE_PAUSE))?;
    flows.push(NewFlow::new(FlowType::Pause, "Confirmación manual", details).with_retry_type(retry_type));
  }

  let use_pool = builder.needs_resource_pool(ticket);
  let mut batch = false;
  if use_pool {
    let (flow_type, stage, param_builder) = match builder.resource_batch_apply_builder() {
      Some(b) => {
        batch = true;
        (FlowType::ResourceBatchApply, STAGE_RESOURCE_BATCH_APPLY, b)
      }
      None => {
        let b: Arc<dyn ResourceApplyParamBuilder> = match builder.resource_apply_builder() {
          Some(b) => b,
          None => Arc::new(DefaultResourceParamBuilder),
        };
        (FlowType::ResourceApply, STAGE_RESOURCE_APPLY, b)
      }
    };
    let details =
      build_resource_flow_details(param_builder.as_ref(), ctx, ticket, batch, CallbackDescriptor::new(ticket_type, stage))?;
    flows.push(NewFlow::new(flow_type, "Solicitud de recursos", details).with_retry_type(retry_type));
  }

  match builder.custom_flows(ctx, ticket)? {
    Some(custom) => flows.extend(custom),
    None => {
      let param_builder = builder.inner_flow_builder();
      flows.push(inner_flow(builder,
                            param_builder.as_ref(),
                            ctx,
                            ticket,
                            STAGE_INNER,
                            &builder.inner_flow_alias())?);
    }
  }

  if use_pool {
    let flow_type = if batch { FlowType::ResourceBatchDelivery } else { FlowType::ResourceDelivery };
    flows.push(NewFlow::new(flow_type, "Entrega de recursos", json!({})).with_retry_type(retry_type));
  }

  validate_plan(&flows)?;
  Ok(flows)
}

/// Reglas estructurales del plan:
/// - todo resource-apply va seguido inmediatamente de un flujo interno;
/// - toda entrega tiene antes un resource-apply del mismo tipo.
pub fn validate_plan(flows: &[NewFlow]) -> Result<()> {
  for (i, flow) in flows.iter().enumerate() {
    if flow.flow_type.is_resource_apply() {
      let next = flows.get(i + 1).map(|f| f.flow_type);
      if next != Some(FlowType::InnerFlow) {
        return Err(TicketError::Build(format!("el flow {} ({}) debe ir seguido de un flujo interno, encontrado {:?}",
                                              i,
                                              flow.flow_type,
                                              next.map(|t| t.as_str()))));
      }
    }
    if flow.flow_type.is_resource_delivery() {
      let expected = match flow.flow_type {
        FlowType::ResourceBatchDelivery => FlowType::ResourceBatchApply,
        _ => FlowType::ResourceApply,
      };
      if !flows[..i].iter().any(|f| f.flow_type == expected) {
        return Err(TicketError::Build(format!("el flow {} ({}) no tiene un {} previo", i, flow.flow_type, expected)));
      }
    }
  }
  Ok(())
}

/// `ticket_data` del flow siguiente, que un `post_callback` va a completar.
pub(crate) fn next_ticket_data(next: Option<&mut Flow>) -> Result<&mut Map<String, JsonValue>> {
  let next = next.ok_or_else(|| TicketError::Validation("el callback necesita un flow siguiente".into()))?;
  ticket_data_mut(next)
}

/// Hosts de `role` dentro de un objeto de datos, si los hay.
pub(crate) fn role_hosts(data: &Map<String, JsonValue>, role: &str) -> Result<Option<RoleHosts>> {
  match data.get(role) {
    None | Some(JsonValue::Null) => Ok(None),
    Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
  }
}

/// Guarda en `details.clusters` la configuración de los clústeres
/// referenciados (y su huella), para auditoría aunque luego se borren.
pub fn snapshot_clusters(ctx: &TicketContext, ticket: &mut Ticket) -> Result<()> {
  let mut ids = referenced_cluster_ids(&ticket.details);
  if let Some(infos) = ticket.details.get("infos").and_then(JsonValue::as_array) {
    for info in infos {
      ids.extend(referenced_cluster_ids(info));
    }
  }
  ids.sort_unstable();
  ids.dedup();
  if ids.is_empty() {
    return Ok(());
  }
  let clusters: Vec<Cluster> = ctx.clusters.get_many(&ids)?;
  let digest = Cluster::config_digest(&clusters)?;
  let mut snapshot = Map::new();
  for c in clusters.iter() {
    snapshot.insert(c.id.to_string(), serde_json::to_value(c)?);
  }
  let details = ticket.details
                      .as_object_mut()
                      .ok_or_else(|| TicketError::Validation(format!("details del ticket {} no es un objeto", ticket.id)))?;
  details.insert("clusters".into(), JsonValue::Object(snapshot));
  details.insert("clusters_digest".into(), JsonValue::from(digest));
  Ok(())
}
