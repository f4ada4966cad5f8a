use crate::context::TicketContext;
use crate::errors::Result;
use crate::executors::{start_flow, FlowExecutor, FlowOutcome};
use crate::nodes::{flatten_host_ids, nodes_from_json, split_batch_nodes};
use dbm_flow::{FlowType, Ticket};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

/// Confirma en el pool los hosts asignados al ticket. Devuelve el
/// `request_id` y los hosts confirmados, o `None` si no hubo asignación.
///
/// El pool trata la confirmación como idempotente: repetirla con los
/// mismos datos no cambia nada.
pub fn confirm_resource(ctx: &TicketContext, ticket: &Ticket, batch: bool) -> Result<Option<(String, Vec<i64>)>> {
  let request_id = ticket.details.get("resource_request_id").and_then(JsonValue::as_str).unwrap_or("");
  if request_id.is_empty() {
    return Ok(None);
  }
  let nodes = nodes_from_json(ticket.details.get("nodes").unwrap_or(&JsonValue::Null))?;
  if batch {
    // sólo valida que todos los roles lleven prefijo de índice
    split_batch_nodes(&nodes)?;
  }
  let host_ids = flatten_host_ids(&nodes);
  ctx.resource_pool.confirm(request_id, &host_ids)?;
  log::info!("ticket {}: confirmados {} hosts de {}", ticket.id, host_ids.len(), request_id);
  Ok(Some((request_id.to_string(), host_ids)))
}

pub struct ResourceDeliveryExecutor;

impl FlowExecutor for ResourceDeliveryExecutor {
  fn run(&self, ctx: &TicketContext, ticket_id: &Uuid, flow_id: &Uuid) -> Result<FlowOutcome> {
    let (ticket, flow) = start_flow(ctx, ticket_id, flow_id)?;
    let confirmed = confirm_resource(ctx, &ticket, flow.flow_type == FlowType::ResourceBatchDelivery)?;
    ctx.transaction(|store| {
         let mut flow = store.get_flow(flow_id)?;
         if let Some((request_id, host_ids)) = &confirmed {
           if let Some(obj) = flow.details.as_object_mut() {
             obj.insert("confirmed".into(), json!({ "request_id": request_id, "host_ids": host_ids }));
           }
         }
         flow.succeed();
         store.save_flow(&flow)?;
         Ok(())
       })?;
    Ok(FlowOutcome::Succeeded)
  }
}
