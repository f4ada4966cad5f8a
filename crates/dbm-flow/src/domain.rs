// Archivo: domain.rs
// Propósito: registros persistidos del orquestador: tickets, flows ordenados
// y todos (tareas pendientes para humanos), junto con sus estados.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::FlowError;

/// Genera `as_str`, `Display` y `FromStr` para enums que se almacenan como
/// texto (columna `VARCHAR` o clave JSON).
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = FlowError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(FlowError::Other(format!("{} desconocido: {}", stringify!($name), other))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Pending,
    Running,
    Suspended,
    Succeeded,
    Failed,
}
text_enum!(TicketStatus { Pending => "PENDING", Running => "RUNNING", Suspended => "SUSPENDED",
                          Succeeded => "SUCCEEDED", Failed => "FAILED" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    Pending,
    Running,
    Suspended,
    Succeeded,
    Failed,
}
text_enum!(FlowStatus { Pending => "PENDING", Running => "RUNNING", Suspended => "SUSPENDED",
                        Succeeded => "SUCCEEDED", Failed => "FAILED" });

/// Tipo de flow: determina qué ejecutor lo procesa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowType {
    ItsmApproval,
    Pause,
    ResourceApply,
    ResourceBatchApply,
    InnerFlow,
    ResourceDelivery,
    ResourceBatchDelivery,
}
text_enum!(FlowType { ItsmApproval => "ITSM_APPROVAL", Pause => "PAUSE", ResourceApply => "RESOURCE_APPLY",
                      ResourceBatchApply => "RESOURCE_BATCH_APPLY", InnerFlow => "INNER_FLOW",
                      ResourceDelivery => "RESOURCE_DELIVERY", ResourceBatchDelivery => "RESOURCE_BATCH_DELIVERY" });

impl FlowType {
    /// Flows que reservan máquinas en el pool.
    pub fn is_resource_apply(&self) -> bool {
        matches!(self, FlowType::ResourceApply | FlowType::ResourceBatchApply)
    }

    /// Flows que confirman (entregan) una reserva previa.
    pub fn is_resource_delivery(&self) -> bool {
        matches!(self, FlowType::ResourceDelivery | FlowType::ResourceBatchDelivery)
    }
}

/// Política de reintento de un flow fallido/suspendido.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryType {
    AutoRetry,
    ManualRetry,
}
text_enum!(RetryType { AutoRetry => "AUTO_RETRY", ManualRetry => "MANUAL_RETRY" });

/// Clasificación del error de un flow. Permite al operador distinguir
/// "esperando máquinas" de "error de sistema".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowErrCode {
    ResourceInsufficient,
    SystemError,
    CallbackError,
    Rejected,
    PipelineFailed,
}
text_enum!(FlowErrCode { ResourceInsufficient => "RESOURCE_INSUFFICIENT", SystemError => "SYSTEM_ERROR",
                         CallbackError => "CALLBACK_ERROR", Rejected => "REJECTED",
                         PipelineFailed => "PIPELINE_FAILED" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoType {
    /// El pool no tenía inventario; alguien debe reponer máquinas.
    ResourceReplenish,
    /// Pausa de confirmación manual antes de continuar.
    InnerFlowConfirm,
}
text_enum!(TodoType { ResourceReplenish => "RESOURCE_REPLENISH", InnerFlowConfirm => "INNER_FLOW_CONFIRM" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoStatus {
    Todo,
    DoneSuccess,
    DoneFailed,
}
text_enum!(TodoStatus { Todo => "TODO", DoneSuccess => "DONE_SUCCESS", DoneFailed => "DONE_FAILED" });

/// Ticket: solicitud de operación de un usuario. `details` es el documento
/// JSON que los constructores y callbacks van completando.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_type: String,
    pub creator: String,
    pub bk_biz_id: i64,
    pub group: String,
    pub remark: String,
    pub details: JsonValue,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Datos de entrada para crear un ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub ticket_type: String,
    pub creator: String,
    pub bk_biz_id: i64,
    pub group: String,
    pub remark: String,
    pub details: JsonValue,
}

/// Etapa ordenada de un ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    pub ticket_id: Uuid,
    /// Posición dentro del ticket (0..n), igual al orden de construcción.
    pub ordinal: i64,
    pub flow_type: FlowType,
    pub flow_alias: String,
    /// Id externo: número ITSM, root id del pipeline o request id del pool.
    pub flow_obj_id: Option<String>,
    pub details: JsonValue,
    pub status: FlowStatus,
    pub retry_type: RetryType,
    pub retry_count: i64,
    pub err_code: Option<FlowErrCode>,
    pub err_msg: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flow {
    /// Marca el flow como fallido con el código y mensaje dados.
    pub fn fail(&mut self, code: FlowErrCode, msg: impl Into<String>) {
        self.status = FlowStatus::Failed;
        self.err_code = Some(code);
        self.err_msg = Some(msg.into());
    }

    /// Suspende el flow (p.ej. falta de inventario). No es un fallo terminal.
    pub fn suspend(&mut self, code: FlowErrCode, msg: impl Into<String>) {
        self.status = FlowStatus::Suspended;
        self.err_code = Some(code);
        self.err_msg = Some(msg.into());
    }

    pub fn succeed(&mut self) {
        self.status = FlowStatus::Succeeded;
        self.err_code = None;
        self.err_msg = None;
    }

    /// Limpia el error y deja el flow listo para volver a ejecutarse.
    pub fn reset_for_retry(&mut self) {
        self.status = FlowStatus::Pending;
        self.err_code = None;
        self.err_msg = None;
        self.retry_count += 1;
    }

    /// Mensaje legible para el operador según estado y código de error.
    pub fn status_message(&self) -> String {
        let detail = self.err_msg.clone().unwrap_or_default();
        match (self.status, self.err_code) {
            (FlowStatus::Pending, _) => "Pendiente".to_string(),
            (FlowStatus::Running, _) => "En ejecución".to_string(),
            (FlowStatus::Succeeded, _) => "Completado".to_string(),
            (_, Some(FlowErrCode::ResourceInsufficient)) => {
                format!("Esperando reposición de máquinas en el pool de recursos; reintente cuando haya inventario ({})",
                        detail)
            }
            (_, Some(FlowErrCode::Rejected)) => format!("Rechazado en aprobación: {}", detail),
            (_, Some(FlowErrCode::PipelineFailed)) => format!("Falló el flujo interno: {}", detail),
            (_, Some(FlowErrCode::CallbackError)) => {
                format!("Error de callback, contacte al administrador: {}", detail)
            }
            (_, Some(FlowErrCode::SystemError)) | (_, None) => {
                format!("Error de sistema, contacte al administrador: {}", detail)
            }
        }
    }
}

/// Datos de entrada para crear un flow; el almacén asigna id y ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFlow {
    pub flow_type: FlowType,
    pub flow_alias: String,
    pub details: JsonValue,
    pub retry_type: RetryType,
}

impl NewFlow {
    pub fn new(flow_type: FlowType, flow_alias: impl Into<String>, details: JsonValue) -> Self {
        Self { flow_type, flow_alias: flow_alias.into(), details, retry_type: RetryType::AutoRetry }
    }

    pub fn with_retry_type(mut self, retry_type: RetryType) -> Self {
        self.retry_type = retry_type;
        self
    }
}

/// Tarea pendiente asignada a operadores humanos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub flow_id: Uuid,
    pub todo_type: TodoType,
    pub operators: Vec<String>,
    pub status: TodoStatus,
    pub context: JsonValue,
    pub done_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub done_at: Option<DateTime<Utc>>,
}

impl Todo {
    pub fn is_open(&self) -> bool {
        self.status == TodoStatus::Todo
    }

    /// Cierra el todo registrando quién lo resolvió.
    pub fn close(&mut self, status: TodoStatus, done_by: &str) {
        self.status = status;
        self.done_by = Some(done_by.to_string());
        self.done_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone)]
pub struct NewTodo {
    pub ticket_id: Uuid,
    pub flow_id: Uuid,
    pub todo_type: TodoType,
    pub operators: Vec<String>,
    pub context: JsonValue,
}
