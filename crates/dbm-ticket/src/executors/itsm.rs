use crate::context::TicketContext;
use crate::errors::Result;
use crate::executors::{start_flow, FlowExecutor, FlowOutcome};
use crate::params::itsm::ItsmParams;
use serde_json::json;
use uuid::Uuid;

/// Crea la aprobación en ITSM y guarda su número como `flow_obj_id`. El
/// flow sigue en `RUNNING` hasta `FlowManager::approve`.
pub struct ItsmExecutor;

impl FlowExecutor for ItsmExecutor {
  fn run(&self, ctx: &TicketContext, ticket_id: &Uuid, flow_id: &Uuid) -> Result<FlowOutcome> {
    let (ticket, flow) = start_flow(ctx, ticket_id, flow_id)?;
    let params: ItsmParams = serde_json::from_value(flow.details.clone())?;
    let callback_meta = json!({ "ticket_id": ticket.id.to_string(), "flow_id": flow.id.to_string() });
    let sn = ctx.approval.create_ticket(params.service_id, &ticket.creator, &params.fields, &callback_meta)?;
    log::info!("ticket {}: aprobación {} creada para {:?}", ticket.id, sn, params.approvers);
    ctx.transaction(|store| {
         let mut flow = store.get_flow(flow_id)?;
         flow.flow_obj_id = Some(sn.clone());
         store.save_flow(&flow)?;
         Ok(())
       })?;
    Ok(FlowOutcome::Waiting)
  }
}
