// Archivo: stubs.rs
// Propósito: repositorio de tickets en memoria para pruebas y wiring rápido.
//
// Cada transacción trabaja sobre una copia del estado y la publica sólo si
// el trabajo termina con `Ok`. El mutex se mantiene durante toda la
// transacción, por lo que las transacciones quedan serializadas.
use crate::domain::{Flow, FlowStatus, NewFlow, NewTicket, NewTodo, Ticket, TicketStatus, Todo, TodoStatus};
use crate::errors::{FlowError, Result};
use crate::repository::{TicketRepository, TicketStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tickets: HashMap<Uuid, Ticket>,
    flows: HashMap<Uuid, Flow>,
    todos: HashMap<Uuid, Todo>,
    /// Orden de inserción de tickets, para listados estables.
    ticket_order: Vec<Uuid>,
}

/// Repositorio en memoria. No es durable.
#[derive(Debug, Default)]
pub struct InMemoryTicketRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self { state: Mutex::new(MemoryState::default()) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|e| FlowError::Storage(format!("mutex envenenado: {}", e)))
    }

    /// Cantidad total de flows confirmados (todos los tickets).
    pub fn flow_count(&self) -> usize {
        self.lock().map(|s| s.flows.len()).unwrap_or(0)
    }
}

impl TicketRepository for InMemoryTicketRepository {
    fn transaction(&self, work: &mut dyn FnMut(&mut dyn TicketStore) -> Result<()>) -> Result<()> {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let mut store = MemoryStore { state: &mut working };
        match work(&mut store) {
            Ok(()) => {
                *guard = working;
                Ok(())
            }
            Err(e) => {
                log::debug!("rollback de transacción en memoria: {}", e);
                Err(e)
            }
        }
    }
}

struct MemoryStore<'a> {
    state: &'a mut MemoryState,
}

impl TicketStore for MemoryStore<'_> {
    fn insert_ticket(&mut self, new: NewTicket) -> Result<Ticket> {
        let now = Utc::now();
        let ticket = Ticket { id: Uuid::new_v4(),
                              ticket_type: new.ticket_type,
                              creator: new.creator,
                              bk_biz_id: new.bk_biz_id,
                              group: new.group,
                              remark: new.remark,
                              details: new.details,
                              status: TicketStatus::Pending,
                              created_at: now,
                              updated_at: now };
        self.state.ticket_order.push(ticket.id);
        self.state.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    fn get_ticket(&mut self, ticket_id: &Uuid) -> Result<Ticket> {
        self.state
            .tickets
            .get(ticket_id)
            .cloned()
            .ok_or_else(|| FlowError::NotFound(format!("ticket {}", ticket_id)))
    }

    fn save_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        let slot = self.state
                       .tickets
                       .get_mut(&ticket.id)
                       .ok_or_else(|| FlowError::NotFound(format!("ticket {}", ticket.id)))?;
        *slot = ticket.clone();
        slot.updated_at = Utc::now();
        Ok(())
    }

    fn list_tickets(&mut self) -> Result<Vec<Ticket>> {
        Ok(self.state.ticket_order.iter().filter_map(|id| self.state.tickets.get(id).cloned()).collect())
    }

    fn insert_flows(&mut self, ticket_id: &Uuid, flows: Vec<NewFlow>) -> Result<Vec<Flow>> {
        if !self.state.tickets.contains_key(ticket_id) {
            return Err(FlowError::NotFound(format!("ticket {}", ticket_id)));
        }
        let base = self.state.flows.values().filter(|f| &f.ticket_id == ticket_id).count() as i64;
        let now = Utc::now();
        let mut created = Vec::with_capacity(flows.len());
        for (i, new) in flows.into_iter().enumerate() {
            let flow = Flow { id: Uuid::new_v4(),
                              ticket_id: *ticket_id,
                              ordinal: base + i as i64,
                              flow_type: new.flow_type,
                              flow_alias: new.flow_alias,
                              flow_obj_id: None,
                              details: new.details,
                              status: FlowStatus::Pending,
                              retry_type: new.retry_type,
                              retry_count: 0,
                              err_code: None,
                              err_msg: None,
                              created_at: now,
                              updated_at: now };
            self.state.flows.insert(flow.id, flow.clone());
            created.push(flow);
        }
        Ok(created)
    }

    fn list_flows(&mut self, ticket_id: &Uuid) -> Result<Vec<Flow>> {
        let mut flows: Vec<Flow> =
            self.state.flows.values().filter(|f| &f.ticket_id == ticket_id).cloned().collect();
        flows.sort_by_key(|f| f.ordinal);
        Ok(flows)
    }

    fn get_flow(&mut self, flow_id: &Uuid) -> Result<Flow> {
        self.state
            .flows
            .get(flow_id)
            .cloned()
            .ok_or_else(|| FlowError::NotFound(format!("flow {}", flow_id)))
    }

    fn find_flow_by_obj_id(&mut self, flow_obj_id: &str) -> Result<Option<Flow>> {
        Ok(self.state.flows.values().find(|f| f.flow_obj_id.as_deref() == Some(flow_obj_id)).cloned())
    }

    fn save_flow(&mut self, flow: &Flow) -> Result<()> {
        let slot = self.state
                       .flows
                       .get_mut(&flow.id)
                       .ok_or_else(|| FlowError::NotFound(format!("flow {}", flow.id)))?;
        *slot = flow.clone();
        slot.updated_at = Utc::now();
        Ok(())
    }

    fn create_todo(&mut self, new: NewTodo) -> Result<Option<Todo>> {
        let duplicated = self.state
                             .todos
                             .values()
                             .any(|t| t.flow_id == new.flow_id && t.todo_type == new.todo_type && t.is_open());
        if duplicated {
            return Ok(None);
        }
        let todo = Todo { id: Uuid::new_v4(),
                          ticket_id: new.ticket_id,
                          flow_id: new.flow_id,
                          todo_type: new.todo_type,
                          operators: new.operators,
                          status: TodoStatus::Todo,
                          context: new.context,
                          done_by: None,
                          created_at: Utc::now(),
                          done_at: None };
        self.state.todos.insert(todo.id, todo.clone());
        Ok(Some(todo))
    }

    fn list_todos(&mut self, ticket_id: &Uuid) -> Result<Vec<Todo>> {
        let mut todos: Vec<Todo> =
            self.state.todos.values().filter(|t| &t.ticket_id == ticket_id).cloned().collect();
        todos.sort_by_key(|t| t.created_at);
        Ok(todos)
    }

    fn save_todo(&mut self, todo: &Todo) -> Result<()> {
        let slot = self.state
                       .todos
                       .get_mut(&todo.id)
                       .ok_or_else(|| FlowError::NotFound(format!("todo {}", todo.id)))?;
        *slot = todo.clone();
        Ok(())
    }
}
