// Archivo: resource_apply.rs
// Propósito: ejecutor de resource-apply (simple y por lotes).
//
// 1. Marca el flow en ejecución y pre-asigna el root id del flujo interno
//    siguiente.
// 2. Arma la solicitud al pool (un detalle por rol con count > 0; los
//    backend groups se expanden en master/slave) y la envía.
// 3. Según el código: reposición pendiente (suspendido), error de sistema,
//    o reserva concedida. La reserva se guarda en el flow antes de nada más;
//    un reintento la reutiliza en lugar de pedir máquinas otra vez.
// 4. Escritura de la asignación y callback en una sola transacción.
use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::executors::{new_root_id, FlowExecutor, FlowOutcome};
use crate::nodes::{nodes_to_json, reconstitute_nodes, split_batch_nodes, NodeMap};
use crate::params::resource::RoleSpec;
use crate::params::{ticket_data_mut, ResourceParams};
use dbm_domain::spec::is_backend_group;
use dbm_domain::BackendSide;
use dbm_flow::{Flow, FlowErrCode, FlowStatus, FlowType, NewTodo, Ticket, TicketStatus, TodoStatus, TodoType};
use dbm_providers::{ApplyDetail, ApplyErrCode, ApplyItem, ApplyRequest};
use indexmap::IndexMap;
use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

pub struct ResourceApplyExecutor;

impl FlowExecutor for ResourceApplyExecutor {
  fn run(&self, ctx: &TicketContext, ticket_id: &Uuid, flow_id: &Uuid) -> Result<FlowOutcome> {
    let (ticket, flow) = ctx.transaction(|store| {
                              let ticket = store.get_ticket(ticket_id)?;
                              let mut flow = store.get_flow(flow_id)?;
                              flow.status = FlowStatus::Running;
                              store.save_flow(&flow)?;
                              if let Some(mut next) = store.next_flow(&flow)? {
                                if next.flow_obj_id.is_none() {
                                  next.flow_obj_id = Some(new_root_id());
                                  store.save_flow(&next)?;
                                }
                              }
                              Ok((ticket, flow))
                            })?;
    let batch = flow.flow_type == FlowType::ResourceBatchApply;
    let params = ResourceParams::from_details(&flow.details)?;

    let (request_id, items) = match stored_reservation(&flow)? {
      Some(reserved) => {
        log::info!("flow {}: se reutiliza la reserva {} de un intento anterior", flow.id, reserved.0);
        reserved
      }
      None => {
        let request = fetch_apply_params(ctx, &ticket, &flow, &params.ticket_data, batch)?;
        if request.details.is_empty() {
          log::info!("flow {}: ningún rol pide máquinas; no se llama al pool", flow.id);
          (String::new(), Vec::new())
        } else {
          let response = ctx.resource_pool.pre_apply(&request)?;
          match ApplyErrCode::from_code(response.code) {
            ApplyErrCode::Ok => {
              store_reservation(ctx, flow_id, &response.request_id, &response.data)?;
              (response.request_id, response.data)
            }
            ApplyErrCode::ResourceInsufficient => {
              suspend_for_replenish(ctx, &ticket, &flow, &response.message)?;
              return Ok(FlowOutcome::Suspended);
            }
            _ => {
              return Err(TicketError::ResourceApply { code: response.code, message: response.message });
            }
          }
        }
      }
    };
    let nodes = reconstitute_nodes(&items)?;
    log::info!("flow {}: asignados {} roles (request_id='{}')", flow.id, nodes.len(), request_id);

    let nodes_json = nodes_to_json(&nodes)?;
    ctx.transaction(|store| {
         let mut ticket = store.get_ticket(ticket_id)?;
         let mut flow = store.get_flow(flow_id)?;
         let mut next = store.next_flow(&flow)?;
         if let Some(next) = next.as_mut() {
           write_node_infos(ctx, next, &nodes, batch)?;
         }

         let details = ticket.details
                             .as_object_mut()
                             .ok_or_else(|| TicketError::Validation(format!("details del ticket {} no es un objeto", ticket_id)))?;
         details.insert("resource_request_id".into(), JsonValue::from(request_id.clone()));
         details.insert("nodes".into(), nodes_json.clone());

         if let Some(obj) = flow.details.as_object_mut() {
           obj.insert("resource_request_id".into(), JsonValue::from(request_id.clone()));
           obj.insert("nodes".into(), nodes_json.clone());
           obj.insert("resource_apply_status".into(), JsonValue::Bool(true));
         }

         ctx.callbacks.post_callback(&params.callback, ctx, &mut ticket, &flow, next.as_mut())?;

         if let Some(next) = next.as_ref() {
           store.save_flow(next)?;
         }
         for mut todo in store.list_todos(ticket_id)? {
           if todo.flow_id == flow.id && todo.todo_type == TodoType::ResourceReplenish && todo.is_open() {
             todo.close(TodoStatus::DoneSuccess, &ctx.config.system_operator);
             store.save_todo(&todo)?;
           }
         }
         flow.succeed();
         store.save_flow(&flow)?;
         store.save_ticket(&ticket)?;
         Ok(())
       })?;
    Ok(FlowOutcome::Succeeded)
  }
}

/// Reserva guardada por un intento anterior del mismo flow:
/// `(resource_request_id, allocation)`.
fn stored_reservation(flow: &Flow) -> Result<Option<(String, Vec<ApplyItem>)>> {
  let request_id = flow.details.get("resource_request_id").and_then(JsonValue::as_str).unwrap_or("");
  match flow.details.get("allocation") {
    Some(allocation) if !request_id.is_empty() && !allocation.is_null() => {
      Ok(Some((request_id.to_string(), serde_json::from_value(allocation.clone())?)))
    }
    _ => Ok(None),
  }
}

/// Guarda el request id y la asignación en bruto en el flow, en su propia
/// transacción: las máquinas quedan reservadas en el pool aunque falle
/// todo lo que viene después.
fn store_reservation(ctx: &TicketContext, flow_id: &Uuid, request_id: &str, items: &[ApplyItem]) -> Result<()> {
  let allocation = serde_json::to_value(items)?;
  ctx.transaction(|store| {
       let mut flow = store.get_flow(flow_id)?;
       let obj = flow.details
                     .as_object_mut()
                     .ok_or_else(|| TicketError::Validation(format!("details del flow {} no es un objeto", flow_id)))?;
       obj.insert("resource_request_id".into(), JsonValue::from(request_id));
       obj.insert("allocation".into(), allocation.clone());
       store.save_flow(&flow)?;
       Ok(())
     })
}

/// Solicitud de pre-asignación para los datos de un flow de resource-apply.
///
/// En lotes cada `infos[i]` aporta sus roles con el prefijo `"{i}_"`.
pub fn fetch_apply_params(ctx: &TicketContext,
                          ticket: &Ticket,
                          flow: &Flow,
                          ticket_data: &JsonValue,
                          batch: bool)
                          -> Result<ApplyRequest> {
  let mut details = Vec::new();
  if batch {
    let infos = ticket_data.get("infos")
                           .and_then(JsonValue::as_array)
                           .ok_or_else(|| TicketError::Validation("la solicitud por lotes necesita 'infos'".into()))?;
    for (i, info) in infos.iter().enumerate() {
      details.extend(role_apply_details(ctx, info, Some(i))?);
    }
  } else {
    details = role_apply_details(ctx, ticket_data, None)?;
  }
  Ok(ApplyRequest { for_biz_id: ticket.bk_biz_id,
                    resource_type: ctx.config.resource_type(&ticket.group),
                    bill_id: ticket.id.to_string(),
                    bill_type: ticket.ticket_type.clone(),
                    task_id: flow.id.to_string(),
                    operator: ticket.creator.clone(),
                    details })
}

fn resource_specs(item: &JsonValue) -> Result<IndexMap<String, RoleSpec>> {
  match item.get("resource_spec") {
    None | Some(JsonValue::Null) => Ok(IndexMap::new()),
    Some(v) => Ok(serde_json::from_value(v.clone())?),
  }
}

fn role_apply_details(ctx: &TicketContext, item: &JsonValue, index: Option<usize>) -> Result<Vec<ApplyDetail>> {
  let bk_cloud_id = item.get("bk_cloud_id").and_then(JsonValue::as_i64).unwrap_or(0);
  let mut out = Vec::new();
  for (role, role_spec) in resource_specs(item)? {
    if role_spec.count == 0 {
      continue;
    }
    let spec = ctx.specs.require_spec(role_spec.spec_id)?;
    let group_key = match index {
      Some(i) => format!("{}_{}", i, role),
      None => role.clone(),
    };
    if is_backend_group(&role) {
      out.extend(spec.backend_group_apply_details(&group_key,
                                                  role_spec.count,
                                                  bk_cloud_id,
                                                  role_spec.affinity,
                                                  role_spec.location_spec)?);
    } else {
      out.push(spec.apply_detail(&group_key, role_spec.count, bk_cloud_id, role_spec.affinity, role_spec.location_spec));
    }
  }
  Ok(out)
}

/// Escribe la asignación en el flow siguiente: `nodes` (simple) o
/// `infos[i][rol]` (lotes), y expande `resource_spec`.
fn write_node_infos(ctx: &TicketContext, next: &mut Flow, nodes: &NodeMap, batch: bool) -> Result<()> {
  let data = ticket_data_mut(next)?;
  if !batch {
    data.insert("nodes".into(), nodes_to_json(nodes)?);
    return expand_resource_spec(ctx, data);
  }
  let per_info = split_batch_nodes(nodes)?;
  let infos = data.get_mut("infos")
                  .and_then(JsonValue::as_array_mut)
                  .ok_or_else(|| TicketError::Validation("el flow siguiente no tiene 'infos'".into()))?;
  for (idx, role_nodes) in per_info {
    let info = infos.get_mut(idx)
                    .and_then(JsonValue::as_object_mut)
                    .ok_or_else(|| TicketError::Validation(format!("infos[{}] no existe en el flow siguiente", idx)))?;
    for (role, hosts) in role_nodes {
      info.insert(role, serde_json::to_value(&hosts)?);
    }
  }
  for info in infos.iter_mut() {
    if let Some(obj) = info.as_object_mut() {
      expand_resource_spec(ctx, obj)?;
    }
  }
  Ok(())
}

/// Sustituye cada `{spec_id, count}` por los atributos de la spec más el
/// count. Un backend group deja la misma spec también en `master` y `slave`.
fn expand_resource_spec(ctx: &TicketContext, data: &mut Map<String, JsonValue>) -> Result<()> {
  let specs = resource_specs(&JsonValue::Object(data.clone()))?;
  if specs.is_empty() {
    return Ok(());
  }
  let mut expanded = Map::new();
  for (role, role_spec) in specs {
    let info = ctx.specs.require_spec(role_spec.spec_id)?.spec_info_with_count(role_spec.count);
    if is_backend_group(&role) {
      expanded.insert(BackendSide::Master.as_str().into(), info.clone());
      expanded.insert(BackendSide::Slave.as_str().into(), info.clone());
    }
    expanded.insert(role, info);
  }
  data.insert("resource_spec".into(), JsonValue::Object(expanded));
  Ok(())
}

/// Suspende el flow por falta de inventario y deja un todo de reposición
/// para el creador (uno por flow).
fn suspend_for_replenish(ctx: &TicketContext, ticket: &Ticket, flow: &Flow, message: &str) -> Result<()> {
  log::warn!("flow {}: recursos insuficientes ({}); se crea todo de reposición", flow.id, message);
  ctx.transaction(|store| {
       let mut current = store.get_flow(&flow.id)?;
       current.suspend(FlowErrCode::ResourceInsufficient, message);
       store.save_flow(&current)?;
       let created = store.create_todo(NewTodo { ticket_id: ticket.id,
                                                 flow_id: flow.id,
                                                 todo_type: TodoType::ResourceReplenish,
                                                 operators: vec![ticket.creator.clone()],
                                                 context: json!({ "message": message, "resource_type": ctx.config.resource_type(&ticket.group) }) })?;
       if created.is_none() {
         log::debug!("flow {}: ya había un todo de reposición abierto", flow.id);
       }
       let mut t = store.get_ticket(&ticket.id)?;
       t.status = TicketStatus::Suspended;
       store.save_ticket(&t)?;
       Ok(())
     })
}
