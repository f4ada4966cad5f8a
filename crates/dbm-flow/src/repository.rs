// Archivo: repository.rs
// Propósito: contrato de persistencia de tickets, flows y todos. Toda
// escritura ocurre dentro de una transacción (`TicketRepository::transaction`)
// sobre una vista `TicketStore`; si el trabajo devuelve error nada se aplica.
use crate::domain::{Flow, NewFlow, NewTicket, NewTodo, Ticket, Todo};
use crate::errors::{FlowError, Result};
use uuid::Uuid;

/// Vista transaccional del almacén. Sólo existe mientras dura una
/// transacción abierta por `TicketRepository`.
pub trait TicketStore {
    /// Inserta un ticket nuevo en estado `PENDING`.
    fn insert_ticket(&mut self, new: NewTicket) -> Result<Ticket>;

    fn get_ticket(&mut self, ticket_id: &Uuid) -> Result<Ticket>;

    /// Guarda todos los campos mutables del ticket y refresca `updated_at`.
    fn save_ticket(&mut self, ticket: &Ticket) -> Result<()>;

    fn list_tickets(&mut self) -> Result<Vec<Ticket>>;

    /// Inserta los flows en bloque. El ordinal de cada flow es su posición
    /// en la lista, a continuación de los flows que ya tenga el ticket.
    fn insert_flows(&mut self, ticket_id: &Uuid, flows: Vec<NewFlow>) -> Result<Vec<Flow>>;

    /// Flows del ticket ordenados por ordinal.
    fn list_flows(&mut self, ticket_id: &Uuid) -> Result<Vec<Flow>>;

    fn get_flow(&mut self, flow_id: &Uuid) -> Result<Flow>;

    /// Busca un flow por su id externo (número ITSM, root id, ...).
    fn find_flow_by_obj_id(&mut self, flow_obj_id: &str) -> Result<Option<Flow>>;

    fn save_flow(&mut self, flow: &Flow) -> Result<()>;

    /// Crea un todo salvo que ya exista uno abierto del mismo tipo para el
    /// mismo flow; en ese caso devuelve `None`.
    fn create_todo(&mut self, new: NewTodo) -> Result<Option<Todo>>;

    fn list_todos(&mut self, ticket_id: &Uuid) -> Result<Vec<Todo>>;

    fn save_todo(&mut self, todo: &Todo) -> Result<()>;

    /// Flow inmediatamente posterior a `flow` en su ticket, si existe.
    fn next_flow(&mut self, flow: &Flow) -> Result<Option<Flow>> {
        let flows = self.list_flows(&flow.ticket_id)?;
        Ok(flows.into_iter().find(|f| f.ordinal == flow.ordinal + 1))
    }

    /// Flow inmediatamente anterior a `flow` en su ticket, si existe.
    fn previous_flow(&mut self, flow: &Flow) -> Result<Option<Flow>> {
        if flow.ordinal == 0 {
            return Ok(None);
        }
        let flows = self.list_flows(&flow.ticket_id)?;
        Ok(flows.into_iter().find(|f| f.ordinal == flow.ordinal - 1))
    }
}

/// Repositorio de tickets. Las implementaciones deben garantizar que el
/// trabajo se aplica completo o no se aplica (commit/rollback).
///
/// El closure puede no ser reentrante: no abra una transacción dentro de otra.
pub trait TicketRepository: Send + Sync {
    fn transaction(&self, work: &mut dyn FnMut(&mut dyn TicketStore) -> Result<()>) -> Result<()>;
}

/// Azúcar sobre `transaction` para closures `FnOnce` que devuelven valor.
pub trait TicketRepositoryExt {
    fn atomic<T, F>(&self, f: F) -> Result<T>
        where F: FnOnce(&mut dyn TicketStore) -> Result<T>;
}

impl<R: TicketRepository + ?Sized> TicketRepositoryExt for R {
    fn atomic<T, F>(&self, f: F) -> Result<T>
        where F: FnOnce(&mut dyn TicketStore) -> Result<T>
    {
        let mut f = Some(f);
        let mut out: Option<T> = None;
        self.transaction(&mut |store| {
                let work = f.take()
                            .ok_or_else(|| FlowError::Storage("transacción reintentada sin trabajo".into()))?;
                out = Some(work(store)?);
                Ok(())
            })?;
        out.ok_or_else(|| FlowError::Storage("transacción sin resultado".into()))
    }
}
