use dbm_flow::{Flow, FlowErrCode, FlowStatus, FlowType, RetryType, Ticket, TicketStatus, Todo};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Estado de un flow tal como se muestra al operador.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowView {
  pub id: Uuid,
  pub ordinal: i64,
  pub flow_type: FlowType,
  pub flow_alias: String,
  pub status: FlowStatus,
  pub message: String,
  pub err_code: Option<FlowErrCode>,
  pub retry_type: RetryType,
  pub retry_count: i64,
  pub flow_obj_id: Option<String>,
}

impl From<&Flow> for FlowView {
  fn from(f: &Flow) -> Self {
    FlowView { id: f.id,
               ordinal: f.ordinal,
               flow_type: f.flow_type,
               flow_alias: f.flow_alias.clone(),
               status: f.status,
               message: f.status_message(),
               err_code: f.err_code,
               retry_type: f.retry_type,
               retry_count: f.retry_count,
               flow_obj_id: f.flow_obj_id.clone() }
  }
}

/// Vista de detalle de un ticket: sus flows en orden y los todos.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketView {
  pub id: Uuid,
  pub ticket_type: String,
  pub creator: String,
  pub bk_biz_id: i64,
  pub status: TicketStatus,
  pub flows: Vec<FlowView>,
  pub todos: Vec<Todo>,
}

impl TicketView {
  pub fn new(ticket: &Ticket, flows: &[Flow], todos: Vec<Todo>) -> Self {
    TicketView { id: ticket.id,
                 ticket_type: ticket.ticket_type.clone(),
                 creator: ticket.creator.clone(),
                 bk_biz_id: ticket.bk_biz_id,
                 status: ticket.status,
                 flows: flows.iter().map(FlowView::from).collect(),
                 todos }
  }

  /// Primer flow sin completar.
  pub fn current_flow(&self) -> Option<&FlowView> {
    self.flows.iter().find(|f| f.status != FlowStatus::Succeeded)
  }

  pub fn open_todos(&self) -> impl Iterator<Item = &Todo> {
    self.todos.iter().filter(|t| t.is_open())
  }
}

impl fmt::Display for TicketView {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Ticket {} [{}] {} (biz {}, creador {})",
             self.id, self.status, self.ticket_type, self.bk_biz_id, self.creator)?;
    for flow in &self.flows {
      writeln!(f, "  {:>2}. {:<26} {:<10} {}", flow.ordinal, flow.flow_alias, flow.status.as_str(), flow.message)?;
    }
    for todo in self.open_todos() {
      writeln!(f, "  todo {} {} -> {}", todo.id, todo.todo_type, todo.operators.join(","))?;
    }
    Ok(())
  }
}
