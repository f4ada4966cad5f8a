//! Constructores de parámetros: transforman el `details` de un ticket en
//! los parámetros exactos que necesita el ejecutor de cada flow. No
//! ejecutan nada ni llaman al pool o al motor de pipelines.
pub mod itsm;
pub mod pause;
pub mod resource;

use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::ticket_type::TicketType;
use dbm_flow::{Flow, Ticket};
use dbm_providers::ControllerInfo;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub use itsm::ItsmParamBuilder;
pub use pause::{PauseParamBuilder, PauseType};
pub use resource::{DefaultResourceParamBuilder, ResourceApplyParamBuilder, ResourceParams};

pub const STAGE_INNER: &str = "inner";
pub const STAGE_RESOURCE_APPLY: &str = "resource_apply";
pub const STAGE_RESOURCE_BATCH_APPLY: &str = "resource_batch_apply";
pub const STAGE_PAUSE: &str = "pause";

/// Referencia a un manejador del `CallbackRegistry`, guardada dentro del
/// `details` del flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackDescriptor {
  pub key: String,
}

impl CallbackDescriptor {
  pub fn new(ticket_type: TicketType, stage: &str) -> Self {
    Self { key: format!("{}/{}", ticket_type.as_str(), stage) }
  }

  /// Lee el descriptor de `details.callback`, si lo hay.
  pub fn from_details(details: &JsonValue) -> Result<Option<Self>> {
    match details.get("callback") {
      None | Some(JsonValue::Null) => Ok(None),
      Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
    }
  }
}

/// Parámetros de un flujo interno tal como se guardan en el flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowParams {
  pub ticket_data: JsonValue,
  pub controller_info: ControllerInfo,
  pub callback: CallbackDescriptor,
}

impl FlowParams {
  pub fn from_details(details: &JsonValue) -> Result<Self> {
    Ok(serde_json::from_value(details.clone())?)
  }
}

/// Constructor de parámetros de un flujo interno.
///
/// Cada operación declara el punto de entrada en el motor de pipelines
/// (`controller`) y puede ajustar los datos con `format_ticket_data`.
/// `pre_callback` corre antes de arrancar la ejecución y `post_callback`
/// cuando el flow termina bien, con acceso al flow siguiente.
pub trait FlowParamBuilder: Send + Sync {
  fn controller(&self) -> ControllerInfo;

  fn format_ticket_data(&self, _ctx: &TicketContext, _ticket: &Ticket, _data: &mut JsonValue) -> Result<()> {
    Ok(())
  }

  fn pre_callback(&self, _ctx: &TicketContext, _ticket: &Ticket, _flow: &mut Flow) -> Result<()> {
    Ok(())
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

/// Copia del `details` del ticket con los campos comunes añadidos.
pub fn base_ticket_data(ticket: &Ticket) -> Result<JsonValue> {
  let mut data = match &ticket.details {
    JsonValue::Object(map) => map.clone(),
    JsonValue::Null => Map::new(),
    _ => return Err(TicketError::Validation(format!("details del ticket {} no es un objeto", ticket.id))),
  };
  data.insert("uid".into(), JsonValue::from(ticket.id.to_string()));
  data.insert("ticket_type".into(), JsonValue::from(ticket.ticket_type.clone()));
  data.insert("created_by".into(), JsonValue::from(ticket.creator.clone()));
  data.insert("bk_biz_id".into(), JsonValue::from(ticket.bk_biz_id));
  Ok(JsonValue::Object(data))
}

/// `details` completo de un flujo interno.
pub fn build_inner_flow_details(builder: &dyn FlowParamBuilder,
                                ctx: &TicketContext,
                                ticket: &Ticket,
                                callback: CallbackDescriptor)
                                -> Result<JsonValue> {
  let mut ticket_data = base_ticket_data(ticket)?;
  builder.format_ticket_data(ctx, ticket, &mut ticket_data)?;
  let params = FlowParams { ticket_data, controller_info: builder.controller(), callback };
  Ok(serde_json::to_value(params)?)
}

/// Acceso mutable a `details.ticket_data` de un flow.
pub fn ticket_data_mut(flow: &mut Flow) -> Result<&mut Map<String, JsonValue>> {
  let flow_id = flow.id;
  flow.details
      .get_mut("ticket_data")
      .and_then(JsonValue::as_object_mut)
      .ok_or_else(|| TicketError::Validation(format!("el flow {} no tiene ticket_data", flow_id)))
}

/// Ids de clúster referenciados por un objeto de datos (`cluster_id` o
/// `cluster_ids`).
pub fn referenced_cluster_ids(data: &JsonValue) -> Vec<i64> {
  let mut ids = Vec::new();
  if let Some(id) = data.get("cluster_id").and_then(JsonValue::as_i64) {
    ids.push(id);
  }
  if let Some(list) = data.get("cluster_ids").and_then(JsonValue::as_array) {
    ids.extend(list.iter().filter_map(JsonValue::as_i64));
  }
  ids
}
