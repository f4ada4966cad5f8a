// Archivo: manager.rs
// Propósito: gestor de flujos. Busca el primer flow sin completar de un
// ticket, lo ejecuta y avanza mientras termine bien; se detiene cuando un
// flow espera un evento externo, se suspende o falla.
//
// Los eventos externos (aprobación ITSM, confirmación manual, fin del
// pipeline) y los reintentos entran también por aquí. Un cerrojo por
// ticket impide que dos llamadas conduzcan el mismo ticket a la vez.
use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::executors::{classify, execute, record_failure, FlowOutcome};
use crate::factory::{NewTicketRequest, TicketFactory};
use crate::params::{CallbackDescriptor, FlowParams};
use crate::view::TicketView;
use dashmap::DashMap;
use dbm_flow::{Flow, FlowErrCode, FlowStatus, FlowType, RetryType, Ticket, TicketStatus, TicketStore, TodoStatus,
               TodoType};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Quién pide un reintento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryTrigger {
  /// Planificador externo; sólo para flows `AUTO_RETRY` y con tope.
  Auto,
  /// Acción explícita de un operador.
  Manual { operator: String },
}

pub struct FlowManager {
  ctx: Arc<TicketContext>,
  locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl FlowManager {
  pub fn new(ctx: Arc<TicketContext>) -> Self {
    Self { ctx, locks: DashMap::new() }
  }

  pub fn context(&self) -> &Arc<TicketContext> {
    &self.ctx
  }

  /// Crea un ticket con su plan (ver `TicketFactory::create`).
  pub fn create_ticket(&self, request: NewTicketRequest) -> Result<Ticket> {
    TicketFactory::create(&self.ctx, request)
  }

  /// Conduce el ticket hasta que un flow espere, se suspenda o falle, o
  /// hasta completarlo. Devuelve el estado resultante del ticket.
  pub fn run(&self, ticket_id: &Uuid) -> Result<TicketStatus> {
    self.with_ticket_lock(ticket_id, || self.drive(ticket_id))
  }

  /// Resultado de la aprobación ITSM del flow en curso.
  pub fn approve(&self, ticket_id: &Uuid, operator: &str, approved: bool, message: &str) -> Result<TicketStatus> {
    self.with_ticket_lock(ticket_id, || {
          self.ctx.transaction(|store| {
                    let mut flow = running_flow(store, ticket_id, FlowType::ItsmApproval)?;
                    if let Some(obj) = flow.details.as_object_mut() {
                      obj.insert("approved_by".into(), JsonValue::from(operator));
                    }
                    if approved {
                      flow.succeed();
                      store.save_flow(&flow)?;
                    } else {
                      flow.fail(FlowErrCode::Rejected, format!("{}: {}", operator, message));
                      store.save_flow(&flow)?;
                      set_ticket_status(store, ticket_id, TicketStatus::Failed)?;
                    }
                    Ok(())
                  })?;
          log::info!("ticket {}: aprobación {} por {}", ticket_id, if approved { "concedida" } else { "rechazada" }, operator);
          if approved {
            self.drive(ticket_id)
          } else {
            Ok(TicketStatus::Failed)
          }
        })
  }

  /// Confirmación (o rechazo) manual de la pausa en curso. Cierra el todo
  /// de confirmación.
  pub fn confirm_pause(&self, ticket_id: &Uuid, operator: &str, confirmed: bool) -> Result<TicketStatus> {
    self.with_ticket_lock(ticket_id, || {
          let ctx = &self.ctx;
          ctx.transaction(|store| {
               let mut flow = running_flow(store, ticket_id, FlowType::Pause)?;
               let todo_status = if confirmed { TodoStatus::DoneSuccess } else { TodoStatus::DoneFailed };
               for mut todo in store.list_todos(ticket_id)? {
                 if todo.flow_id == flow.id && todo.todo_type == TodoType::InnerFlowConfirm && todo.is_open() {
                   todo.close(todo_status, operator);
                   store.save_todo(&todo)?;
                 }
               }
               if confirmed {
                 let mut ticket = store.get_ticket(ticket_id)?;
                 let mut next = store.next_flow(&flow)?;
                 if let Some(descriptor) = CallbackDescriptor::from_details(&flow.details)? {
                   ctx.callbacks.post_callback(&descriptor, ctx, &mut ticket, &flow, next.as_mut())?;
                 }
                 if let Some(next) = next.as_ref() {
                   store.save_flow(next)?;
                 }
                 flow.succeed();
                 store.save_flow(&flow)?;
                 store.save_ticket(&ticket)?;
               } else {
                 flow.fail(FlowErrCode::Rejected, format!("confirmación denegada por {}", operator));
                 store.save_flow(&flow)?;
                 set_ticket_status(store, ticket_id, TicketStatus::Failed)?;
               }
               Ok(())
             })?;
          if confirmed {
            self.drive(ticket_id)
          } else {
            Ok(TicketStatus::Failed)
          }
        })
  }

  /// Fin de una ejecución del motor de pipelines, identificada por su
  /// root id. Si terminó bien, el `post_callback` del flujo interno se
  /// aplica sobre el flow siguiente en la misma transacción que marca el
  /// éxito.
  pub fn on_pipeline_finished(&self, flow_obj_id: &str, succeeded: bool, message: &str) -> Result<TicketStatus> {
    let flow = self.ctx
                   .transaction(|store| Ok(store.find_flow_by_obj_id(flow_obj_id)?))?
                   .ok_or_else(|| TicketError::Validation(format!("ningún flow con root id {}", flow_obj_id)))?;
    let ticket_id = flow.ticket_id;
    self.with_ticket_lock(&ticket_id, || {
          let ctx = &self.ctx;
          let res = ctx.transaction(|store| {
                         let mut flow = store.get_flow(&flow.id)?;
                         if flow.flow_type != FlowType::InnerFlow || flow.status != FlowStatus::Running {
                           return Err(TicketError::Validation(format!("el flow {} no es un flujo interno en ejecución",
                                                                      flow.id)));
                         }
                         if !succeeded {
                           flow.fail(FlowErrCode::PipelineFailed, message);
                           store.save_flow(&flow)?;
                           set_ticket_status(store, &ticket_id, TicketStatus::Failed)?;
                           return Ok(false);
                         }
                         let mut ticket = store.get_ticket(&ticket_id)?;
                         let mut next = store.next_flow(&flow)?;
                         let params = FlowParams::from_details(&flow.details)?;
                         ctx.callbacks.post_callback(&params.callback, ctx, &mut ticket, &flow, next.as_mut())?;
                         if let Some(next) = next.as_ref() {
                           store.save_flow(next)?;
                         }
                         flow.succeed();
                         store.save_flow(&flow)?;
                         store.save_ticket(&ticket)?;
                         Ok(true)
                       });
          match res {
            Ok(true) => self.drive(&ticket_id),
            Ok(false) => {
              log::warn!("ticket {}: pipeline {} falló: {}", ticket_id, flow_obj_id, message);
              Ok(TicketStatus::Failed)
            }
            Err(e @ TicketError::Validation(_)) => Err(e),
            Err(e) => {
              log::error!("ticket {}: callback del flow {} falló: {}", ticket_id, flow.id, e);
              record_failure(ctx, &flow.id, classify(&e), &e.to_string())?;
              Ok(TicketStatus::Failed)
            }
          }
        })
  }

  /// Reintenta el flow fallido o suspendido del ticket y vuelve a
  /// conducirlo.
  pub fn retry_flow(&self, ticket_id: &Uuid, trigger: RetryTrigger) -> Result<TicketStatus> {
    let max_auto = self.ctx.config.auto_retry_max_attempts;
    let system_operator = self.ctx.config.system_operator.clone();
    self.with_ticket_lock(ticket_id, || {
          self.ctx.transaction(|store| {
                    let flows = store.list_flows(ticket_id)?;
                    let mut flow = flows.into_iter()
                                        .find(|f| f.status != FlowStatus::Succeeded)
                                        .ok_or_else(|| TicketError::Validation(format!("el ticket {} no tiene flows pendientes", ticket_id)))?;
                    if !matches!(flow.status, FlowStatus::Failed | FlowStatus::Suspended) {
                      return Err(TicketError::Validation(format!("el flow {} está {} y no se puede reintentar",
                                                                 flow.id, flow.status)));
                    }
                    let operator = match &trigger {
                      RetryTrigger::Auto => {
                        if flow.retry_type == RetryType::ManualRetry {
                          return Err(TicketError::Validation(format!("el flow {} requiere reintento manual", flow.id)));
                        }
                        if flow.retry_count >= max_auto {
                          return Err(TicketError::Validation(format!("el flow {} alcanzó el máximo de {} reintentos automáticos",
                                                                     flow.id, max_auto)));
                        }
                        system_operator.clone()
                      }
                      RetryTrigger::Manual { operator } => operator.clone(),
                    };
                    flow.reset_for_retry();
                    if let Some(obj) = flow.details.as_object_mut() {
                      obj.insert("last_retry_by".into(), JsonValue::from(operator.clone()));
                    }
                    store.save_flow(&flow)?;
                    set_ticket_status(store, ticket_id, TicketStatus::Running)?;
                    log::info!("ticket {}: reintento {} del flow {} por {}", ticket_id, flow.retry_count, flow.id, operator);
                    Ok(())
                  })?;
          self.drive(ticket_id)
        })
  }

  /// Vista legible del ticket: cada flow con su estado y mensaje.
  pub fn ticket_view(&self, ticket_id: &Uuid) -> Result<TicketView> {
    self.ctx.transaction(|store| {
              let ticket = store.get_ticket(ticket_id)?;
              let flows = store.list_flows(ticket_id)?;
              let todos = store.list_todos(ticket_id)?;
              Ok(TicketView::new(&ticket, &flows, todos))
            })
  }

  pub fn list_tickets(&self) -> Result<Vec<Ticket>> {
    self.ctx.transaction(|store| Ok(store.list_tickets()?))
  }

  fn with_ticket_lock<T>(&self, ticket_id: &Uuid, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let lock = self.locks.entry(*ticket_id).or_insert_with(|| Arc::new(Mutex::new(()))).value().clone();
    let _guard = lock.lock()
                     .map_err(|e| TicketError::Other(format!("cerrojo del ticket {} envenenado: {}", ticket_id, e)))?;
    f()
  }

  /// Bucle de avance. Debe llamarse con el cerrojo del ticket tomado.
  fn drive(&self, ticket_id: &Uuid) -> Result<TicketStatus> {
    loop {
      let flows = self.ctx.transaction(|store| {
                             let mut ticket = store.get_ticket(ticket_id)?;
                             if ticket.status == TicketStatus::Pending {
                               ticket.status = TicketStatus::Running;
                               store.save_ticket(&ticket)?;
                             }
                             Ok(store.list_flows(ticket_id)?)
                           })?;

      let current = match flows.into_iter().find(|f| f.status != FlowStatus::Succeeded) {
        Some(flow) => flow,
        None => {
          self.ctx.transaction(|store| set_ticket_status(store, ticket_id, TicketStatus::Succeeded))?;
          log::info!("ticket {} completado", ticket_id);
          return Ok(TicketStatus::Succeeded);
        }
      };

      match current.status {
        FlowStatus::Pending => {}
        FlowStatus::Running => return Ok(TicketStatus::Running),
        FlowStatus::Suspended => return Ok(TicketStatus::Suspended),
        FlowStatus::Failed | FlowStatus::Succeeded => return Ok(TicketStatus::Failed),
      }

      match execute(&self.ctx, &current)? {
        FlowOutcome::Succeeded => continue,
        FlowOutcome::Waiting => return Ok(TicketStatus::Running),
        FlowOutcome::Suspended => return Ok(TicketStatus::Suspended),
        FlowOutcome::Failed => return Ok(TicketStatus::Failed),
      }
    }
  }
}

/// Flow en ejecución del tipo indicado; error si el ticket no está
/// esperando ese evento.
fn running_flow(store: &mut dyn TicketStore, ticket_id: &Uuid, flow_type: FlowType) -> Result<Flow> {
  store.list_flows(ticket_id)?
       .into_iter()
       .find(|f| f.flow_type == flow_type && f.status == FlowStatus::Running)
       .ok_or_else(|| TicketError::Validation(format!("el ticket {} no espera un evento {}", ticket_id, flow_type)))
}

fn set_ticket_status(store: &mut dyn TicketStore, ticket_id: &Uuid, status: TicketStatus) -> Result<()> {
  let mut ticket = store.get_ticket(ticket_id)?;
  ticket.status = status;
  store.save_ticket(&ticket)?;
  Ok(())
}
