use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::params::{base_ticket_data, referenced_cluster_ids, CallbackDescriptor};
use dbm_flow::{Flow, Ticket};
use dbm_providers::{Affinity, LocationSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Petición de un rol dentro de `resource_spec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
  pub spec_id: i64,
  pub count: u32,
  #[serde(default)]
  pub affinity: Affinity,
  #[serde(default)]
  pub location_spec: LocationSpec,
}

/// `details` del flow de resource-apply (simple o por lotes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceParams {
  pub ticket_data: JsonValue,
  pub callback: CallbackDescriptor,
}

impl ResourceParams {
  pub fn from_details(details: &JsonValue) -> Result<Self> {
    Ok(serde_json::from_value(details.clone())?)
  }
}

/// Constructor de parámetros de resource-apply.
///
/// `format` por defecto completa `bk_cloud_id` y `bk_biz_id` de cada
/// elemento a partir de los clústeres referenciados. `post_callback` recibe
/// el flow siguiente cuando la asignación ya se escribió en él.
pub trait ResourceApplyParamBuilder: Send + Sync {
  fn format(&self, ctx: &TicketContext, ticket: &Ticket, data: &mut JsonValue, batch: bool) -> Result<()> {
    default_format(ctx, ticket, data, batch)
  }

  fn post_callback(&self,
                   _ctx: &TicketContext,
                   _ticket: &mut Ticket,
                   _flow: &Flow,
                   _next: Option<&mut Flow>)
                   -> Result<()> {
    Ok(())
  }
}

/// Constructor sin ajustes propios del motor.
pub struct DefaultResourceParamBuilder;

impl ResourceApplyParamBuilder for DefaultResourceParamBuilder {}

/// `format` por defecto: por ticket (simple) o por cada `infos[i]` (lote).
pub fn default_format(ctx: &TicketContext, ticket: &Ticket, data: &mut JsonValue, batch: bool) -> Result<()> {
  if !batch {
    return fill_cloud_and_biz(ctx, ticket, data);
  }
  let infos = data.get_mut("infos")
                  .and_then(JsonValue::as_array_mut)
                  .ok_or_else(|| TicketError::Validation("la solicitud por lotes necesita 'infos'".into()))?;
  for info in infos.iter_mut() {
    fill_cloud_and_biz(ctx, ticket, info)?;
  }
  Ok(())
}

fn fill_cloud_and_biz(ctx: &TicketContext, ticket: &Ticket, item: &mut JsonValue) -> Result<()> {
  let cluster = match referenced_cluster_ids(item).first() {
    Some(id) => Some(ctx.clusters
                        .get(*id)?
                        .ok_or_else(|| TicketError::Validation(format!("clúster {} no existe", id)))?),
    None => None,
  };
  let obj = item.as_object_mut()
                .ok_or_else(|| TicketError::Validation("elemento de solicitud no es un objeto".into()))?;
  match cluster {
    Some(c) => {
      obj.insert("bk_cloud_id".into(), JsonValue::from(c.bk_cloud_id));
      obj.insert("bk_biz_id".into(), JsonValue::from(c.bk_biz_id));
    }
    None => {
      obj.entry("bk_cloud_id").or_insert(JsonValue::from(0));
      obj.entry("bk_biz_id").or_insert(JsonValue::from(ticket.bk_biz_id));
    }
  }
  Ok(())
}

/// `details` completo del flow de resource-apply.
pub fn build_resource_flow_details(builder: &dyn ResourceApplyParamBuilder,
                                   ctx: &TicketContext,
                                   ticket: &Ticket,
                                   batch: bool,
                                   callback: CallbackDescriptor)
                                   -> Result<JsonValue> {
  let mut ticket_data = base_ticket_data(ticket)?;
  builder.format(ctx, ticket, &mut ticket_data, batch)?;
  Ok(serde_json::to_value(ResourceParams { ticket_data, callback })?)
}
