use crate::context::TicketContext;
use crate::errors::Result;
use crate::executors::{FlowExecutor, FlowOutcome};
use dbm_flow::{FlowStatus, NewTodo, TodoType};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

/// Deja un todo de confirmación para el creador y espera a
/// `FlowManager::confirm_pause`.
pub struct PauseExecutor;

impl FlowExecutor for PauseExecutor {
  fn run(&self, ctx: &TicketContext, ticket_id: &Uuid, flow_id: &Uuid) -> Result<FlowOutcome> {
    ctx.transaction(|store| {
         let ticket = store.get_ticket(ticket_id)?;
         let mut flow = store.get_flow(flow_id)?;
         flow.status = FlowStatus::Running;
         store.save_flow(&flow)?;
         let pause_type = flow.details.get("pause_type").cloned().unwrap_or(JsonValue::Null);
         let todo = store.create_todo(NewTodo { ticket_id: ticket.id,
                                                flow_id: flow.id,
                                                todo_type: TodoType::InnerFlowConfirm,
                                                operators: vec![ticket.creator.clone()],
                                                context: json!({ "pause_type": pause_type }) })?;
         if let Some(todo) = todo {
           log::info!("ticket {}: esperando confirmación de {:?} (todo {})", ticket.id, todo.operators, todo.id);
         }
         Ok(())
       })?;
    Ok(FlowOutcome::Waiting)
  }
}
