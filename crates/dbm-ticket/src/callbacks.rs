use crate::builder::registry::BuilderRegistry;
use crate::context::TicketContext;
use crate::errors::{Result, TicketError};
use crate::params::{CallbackDescriptor, DefaultResourceParamBuilder, FlowParamBuilder, ResourceApplyParamBuilder,
                    STAGE_INNER, STAGE_PAUSE, STAGE_RESOURCE_APPLY, STAGE_RESOURCE_BATCH_APPLY};
use dbm_flow::{Flow, Ticket};
use std::collections::HashMap;
use std::sync::Arc;

/// Manejador al que apunta un descriptor de callback.
#[derive(Clone)]
pub enum CallbackTarget {
  Inner(Arc<dyn FlowParamBuilder>),
  ResourceApply(Arc<dyn ResourceApplyParamBuilder>),
  /// La pausa no tiene ganchos propios; se registra para que su
  /// descriptor sea resoluble.
  Pause,
}

impl CallbackTarget {
  pub fn pre_callback(&self, ctx: &TicketContext, ticket: &Ticket, flow: &mut Flow) -> Result<()> {
    match self {
      CallbackTarget::Inner(b) => b.pre_callback(ctx, ticket, flow),
      CallbackTarget::ResourceApply(_) | CallbackTarget::Pause => Ok(()),
    }
  }

  pub fn post_callback(&self, ctx: &TicketContext, ticket: &mut Ticket, flow: &Flow, next: Option<&mut Flow>) -> Result<()> {
    match self {
      CallbackTarget::Inner(b) => b.post_callback(ctx, ticket, flow, next),
      CallbackTarget::ResourceApply(b) => b.post_callback(ctx, ticket, flow, next),
      CallbackTarget::Pause => Ok(()),
    }
  }
}

/// Registro explícito `clave -> manejador`. Se llena al arrancar a partir
/// de la tabla de constructores; un flow sólo guarda la clave.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
  handlers: HashMap<String, CallbackTarget>,
}

impl CallbackRegistry {
  pub fn new() -> Self {
    Self { handlers: HashMap::new() }
  }

  pub fn register(&mut self, key: String, target: CallbackTarget) {
    if self.handlers.insert(key.clone(), target).is_some() {
      log::warn!("callback {} registrado dos veces; gana el último", key);
    }
  }

  /// Registra los manejadores de cada constructor de la tabla.
  pub fn from_builders(builders: &BuilderRegistry) -> Self {
    let mut reg = CallbackRegistry::new();
    for (ticket_type, factory) in builders.iter() {
      let builder = factory();
      let key = |stage: &str| CallbackDescriptor::new(ticket_type, stage).key;
      reg.register(key(STAGE_INNER), CallbackTarget::Inner(builder.inner_flow_builder()));
      reg.register(key(STAGE_PAUSE), CallbackTarget::Pause);
      let apply: Arc<dyn ResourceApplyParamBuilder> = match builder.resource_apply_builder() {
        Some(b) => b,
        None => Arc::new(DefaultResourceParamBuilder),
      };
      reg.register(key(STAGE_RESOURCE_APPLY), CallbackTarget::ResourceApply(apply));
      if let Some(b) = builder.resource_batch_apply_builder() {
        reg.register(key(STAGE_RESOURCE_BATCH_APPLY), CallbackTarget::ResourceApply(b));
      }
      for (stage, b) in builder.extra_inner_builders() {
        reg.register(key(stage), CallbackTarget::Inner(b));
      }
    }
    log::debug!("registro de callbacks con {} entradas", reg.handlers.len());
    reg
  }

  pub fn resolve(&self, descriptor: &CallbackDescriptor) -> Result<CallbackTarget> {
    self.handlers.get(&descriptor.key).cloned().ok_or_else(|| TicketError::CallbackNotFound(descriptor.key.clone()))
  }

  /// Resuelve el descriptor y ejecuta su `pre_callback`.
  pub fn pre_callback(&self,
                      descriptor: &CallbackDescriptor,
                      ctx: &TicketContext,
                      ticket: &Ticket,
                      flow: &mut Flow)
                      -> Result<()> {
    let target = self.resolve(descriptor)?;
    target.pre_callback(ctx, ticket, flow).map_err(|e| callback_failure(descriptor, e))
  }

  /// Resuelve el descriptor y ejecuta su `post_callback` con el flow
  /// siguiente. Se llama dentro de la transacción que marca el éxito.
  pub fn post_callback(&self,
                       descriptor: &CallbackDescriptor,
                       ctx: &TicketContext,
                       ticket: &mut Ticket,
                       flow: &Flow,
                       next: Option<&mut Flow>)
                       -> Result<()> {
    let target = self.resolve(descriptor)?;
    target.post_callback(ctx, ticket, flow, next).map_err(|e| callback_failure(descriptor, e))
  }

  pub fn contains(&self, key: &str) -> bool {
    self.handlers.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.handlers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.handlers.is_empty()
  }
}

fn callback_failure(descriptor: &CallbackDescriptor, e: TicketError) -> TicketError {
  match e {
    TicketError::Callback { .. } | TicketError::CallbackNotFound(_) => e,
    other => TicketError::Callback { key: descriptor.key.clone(), message: other.to_string() },
  }
}
