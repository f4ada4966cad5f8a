use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::params::base_ticket_data;
use crate::ticket_type::TicketType;
use dbm_flow::Ticket;
use dbm_providers::ApprovalField;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Subestructuras que no se vuelven a copiar en la aprobación.
const STRIPPED_KEYS: [&str; 1] = ["clusters"];

/// Parámetros del flow de aprobación ITSM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItsmParams {
  pub service_id: i64,
  pub title: String,
  pub summary: String,
  pub approvers: Vec<String>,
  pub fields: Vec<ApprovalField>,
  pub ticket_data: JsonValue,
}

/// Construye los parámetros de aprobación: aprobadores según el
/// directorio de administradores, título y resumen legibles, y el id del
/// servicio ITSM (se obtiene o crea la primera vez).
pub struct ItsmParamBuilder {
  ticket_type: TicketType,
}

impl ItsmParamBuilder {
  pub fn new(ticket_type: TicketType) -> Self {
    Self { ticket_type }
  }

  pub fn build(&self, ctx: &TicketContext, ticket: &Ticket) -> Result<JsonValue> {
    let mut approvers = ctx.admins.get_admins(ticket.bk_biz_id, &ticket.group)?;
    if approvers.is_empty() {
      if ctx.config.fallback_approvers.is_empty() {
        return Err(TicketError::Validation(format!("sin aprobadores para biz={} grupo={}",
                                                   ticket.bk_biz_id, ticket.group)));
      }
      log::warn!("sin administradores para biz={} grupo={}; aprueban los administradores de plataforma",
                 ticket.bk_biz_id,
                 ticket.group);
      approvers = ctx.config.fallback_approvers.clone();
    }

    let mut ticket_data = base_ticket_data(ticket)?;
    if let Some(obj) = ticket_data.as_object_mut() {
      for key in STRIPPED_KEYS {
        obj.remove(key);
      }
    }

    let title = format!("{} (ticket {})", self.ticket_type.display_name(), ticket.id);
    let mut summary = format!("Solicitado por {} para el negocio {}", ticket.creator, ticket.bk_biz_id);
    if !ticket.remark.is_empty() {
      summary.push_str(&format!(". Nota: {}", ticket.remark));
    }
    let fields = vec![ApprovalField::new("title", title.clone()),
                      ApprovalField::new("summary", summary.clone()),
                      ApprovalField::new("approver", approvers.join(",")),
                      ApprovalField::new("ticket_type", self.ticket_type.as_str()),
                      ApprovalField::new("bk_biz_id", ticket.bk_biz_id.to_string())];

    let params = ItsmParams { service_id: ctx.itsm_service_id()?,
                              title,
                              summary,
                              approvers,
                              fields,
                              ticket_data };
    Ok(serde_json::to_value(params)?)
  }
}
