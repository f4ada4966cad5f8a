//! Ejecutores de flows: uno por tipo de flow.
//!
//! Un ejecutor recibe los ids del ticket y del flow, hace su trabajo
//! (llamar al pool, al motor de pipelines, a ITSM...) y escribe el
//! resultado en transacciones explícitas. `execute` envuelve la ejecución:
//! cualquier error queda registrado en el propio flow y el ticket pasa a
//! `FAILED`; nunca hace avanzar al gestor.
pub mod delivery;
pub mod inner;
pub mod itsm;
pub mod pause;
pub mod resource_apply;

use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use dbm_flow::{Flow, FlowErrCode, FlowStatus, FlowType, TicketStatus};
use uuid::Uuid;

pub use delivery::{confirm_resource, ResourceDeliveryExecutor};
pub use inner::InnerFlowExecutor;
pub use itsm::ItsmExecutor;
pub use pause::PauseExecutor;
pub use resource_apply::{fetch_apply_params, ResourceApplyExecutor};

/// Resultado de ejecutar un flow desde el punto de vista del gestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
  /// Terminó; el gestor pasa al siguiente.
  Succeeded,
  /// Espera un evento externo (aprobación, confirmación, pipeline).
  Waiting,
  /// Condición recuperable (falta de inventario); reintentable.
  Suspended,
  Failed,
}

pub trait FlowExecutor: Send + Sync {
  fn run(&self, ctx: &TicketContext, ticket_id: &Uuid, flow_id: &Uuid) -> Result<FlowOutcome>;
}

pub fn executor_for(flow_type: FlowType) -> Box<dyn FlowExecutor> {
  match flow_type {
    FlowType::ItsmApproval => Box::new(ItsmExecutor),
    FlowType::Pause => Box::new(PauseExecutor),
    FlowType::ResourceApply | FlowType::ResourceBatchApply => Box::new(ResourceApplyExecutor),
    FlowType::InnerFlow => Box::new(InnerFlowExecutor),
    FlowType::ResourceDelivery | FlowType::ResourceBatchDelivery => Box::new(ResourceDeliveryExecutor),
  }
}

/// Ejecuta `flow` con su ejecutor. Los errores se registran en el flow y
/// se devuelven como `FlowOutcome::Failed`; sólo falla si ni siquiera se
/// pudo registrar el error.
pub fn execute(ctx: &TicketContext, flow: &Flow) -> Result<FlowOutcome> {
  log::info!("ticket {}: ejecutando flow {} ({}, ordinal {})",
             flow.ticket_id,
             flow.id,
             flow.flow_type,
             flow.ordinal);
  match executor_for(flow.flow_type).run(ctx, &flow.ticket_id, &flow.id) {
    Ok(outcome) => {
      log::debug!("flow {} -> {:?}", flow.id, outcome);
      Ok(outcome)
    }
    Err(e) => {
      let code = classify(&e);
      log::error!("flow {} ({}) falló [{}]: {}", flow.id, flow.flow_type, code, e);
      record_failure(ctx, &flow.id, code, &e.to_string())?;
      Ok(FlowOutcome::Failed)
    }
  }
}

/// Código de error que se muestra al operador para `e`.
pub fn classify(e: &TicketError) -> FlowErrCode {
  match e {
    TicketError::CallbackNotFound(_) | TicketError::Callback { .. } => FlowErrCode::CallbackError,
    _ => FlowErrCode::SystemError,
  }
}

/// Marca el flow como fallido y el ticket como `FAILED` en una sola
/// transacción.
pub fn record_failure(ctx: &TicketContext, flow_id: &Uuid, code: FlowErrCode, message: &str) -> Result<()> {
  ctx.transaction(|store| {
       let mut flow = store.get_flow(flow_id)?;
       flow.fail(code, message);
       store.save_flow(&flow)?;
       let mut ticket = store.get_ticket(&flow.ticket_id)?;
       ticket.status = TicketStatus::Failed;
       store.save_ticket(&ticket)?;
       Ok(())
     })
}

/// Pasa el flow a `RUNNING` y devuelve el ticket y el flow actualizados.
pub(crate) fn start_flow(ctx: &TicketContext, ticket_id: &Uuid, flow_id: &Uuid) -> Result<(dbm_flow::Ticket, Flow)> {
  ctx.transaction(|store| {
       let ticket = store.get_ticket(ticket_id)?;
       let mut flow = store.get_flow(flow_id)?;
       flow.status = FlowStatus::Running;
       store.save_flow(&flow)?;
       Ok((ticket, flow))
     })
}

/// Id de correlación para una ejecución del motor de pipelines.
pub fn new_root_id() -> String {
  Uuid::new_v4().simple().to_string()
}
