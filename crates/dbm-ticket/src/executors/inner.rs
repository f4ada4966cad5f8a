use crate::context::TicketContext;
use crate::errors::Result;
use crate::executors::{new_root_id, record_failure, FlowExecutor, FlowOutcome};
use crate::params::FlowParams;
use dbm_flow::{FlowErrCode, FlowStatus};
use uuid::Uuid;

/// Arranca el flujo interno en el motor de pipelines. El flow queda en
/// `RUNNING` hasta `FlowManager::on_pipeline_finished`.
pub struct InnerFlowExecutor;

impl FlowExecutor for InnerFlowExecutor {
  fn run(&self, ctx: &TicketContext, ticket_id: &Uuid, flow_id: &Uuid) -> Result<FlowOutcome> {
    let flow = ctx.transaction(|store| {
                    let ticket = store.get_ticket(ticket_id)?;
                    let mut flow = store.get_flow(flow_id)?;
                    let params = FlowParams::from_details(&flow.details)?;
                    ctx.callbacks.pre_callback(&params.callback, ctx, &ticket, &mut flow)?;
                    // el root id pre-asignado sólo vale para la primera ejecución
                    let root_id = match (&flow.flow_obj_id, flow.retry_count) {
                      (Some(id), 0) => id.clone(),
                      _ => new_root_id(),
                    };
                    flow.flow_obj_id = Some(root_id);
                    flow.status = FlowStatus::Running;
                    store.save_flow(&flow)?;
                    Ok(flow)
                  })?;

    let params = FlowParams::from_details(&flow.details)?;
    let root_id = flow.flow_obj_id.clone().unwrap_or_default();
    match ctx.pipeline.start_run(&root_id, &params.controller_info, &params.ticket_data) {
      Ok(run_id) => {
        log::info!("flow {}: pipeline {}.{} arrancado (root_id={}, run={})",
                   flow.id,
                   params.controller_info.controller,
                   params.controller_info.func_name,
                   root_id,
                   run_id);
        Ok(FlowOutcome::Waiting)
      }
      Err(e) => {
        log::error!("flow {}: no se pudo arrancar el pipeline: {}", flow.id, e);
        record_failure(ctx, flow_id, FlowErrCode::PipelineFailed, &e.to_string())?;
        Ok(FlowOutcome::Failed)
      }
    }
  }
}
