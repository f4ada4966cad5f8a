use crate::builder::build_flows;
use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::ticket_type::TicketType;
use dbm_flow::{NewTicket, Ticket};
use serde_json::Value as JsonValue;

/// Solicitud de creación de un ticket.
#[derive(Debug, Clone)]
pub struct NewTicketRequest {
  pub ticket_type: TicketType,
  pub creator: String,
  pub bk_biz_id: i64,
  pub remark: String,
  pub details: JsonValue,
}

impl NewTicketRequest {
  pub fn new(ticket_type: TicketType, creator: &str, bk_biz_id: i64, details: JsonValue) -> Self {
    Self { ticket_type, creator: creator.to_string(), bk_biz_id, remark: String::new(), details }
  }

  pub fn with_remark(mut self, remark: &str) -> Self {
    self.remark = remark.to_string();
    self
  }
}

/// Crea tickets con su plan de flows.
pub struct TicketFactory;

impl TicketFactory {
  /// Inserta el ticket, construye y persiste sus flows y aplica
  /// `patch_ticket_detail`, todo en una transacción: si el plan no es
  /// válido no queda ni el ticket ni ningún flow.
  pub fn create(ctx: &TicketContext, request: NewTicketRequest) -> Result<Ticket> {
    if !request.details.is_object() {
      return Err(TicketError::Validation("details debe ser un objeto JSON".into()));
    }
    let builder = ctx.builders.get(request.ticket_type)?;
    let ticket_type = request.ticket_type;
    let ticket = ctx.transaction(|store| {
                      let mut ticket = store.insert_ticket(NewTicket { ticket_type: ticket_type.as_str().to_string(),
                                                                       creator: request.creator,
                                                                       bk_biz_id: request.bk_biz_id,
                                                                       group: ticket_type.db_type().as_str().to_string(),
                                                                       remark: request.remark,
                                                                       details: request.details })?;
                      let flows = build_flows(builder.as_ref(), ctx, &ticket)?;
                      let inserted = store.insert_flows(&ticket.id, flows)?;
                      builder.patch_ticket_detail(ctx, &mut ticket)?;
                      store.save_ticket(&ticket)?;
                      log::info!("ticket {} ({}) creado con {} flows", ticket.id, ticket_type, inserted.len());
                      Ok(ticket)
                    })?;
    Ok(ticket)
  }
}
