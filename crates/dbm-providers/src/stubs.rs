// Archivo: stubs.rs
// Propósito: implementaciones en memoria de los colaboradores externos.
//
// No son durables ni distribuidas; se usan en pruebas, demos y en el
// binario `main-core` cuando no hay servicios reales configurados.
use crate::admin::AdminDirectory;
use crate::approval::{ApprovalField, ApprovalService};
use crate::errors::{ProviderError, Result};
use crate::host::HostInfo;
use crate::pipeline::{ControllerInfo, PipelineEngine};
use crate::resource_pool::{ApplyErrCode, ApplyItem, ApplyRequest, ApplyResponse, ResourcePoolClient};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

fn lock<'a, T>(m: &'a Mutex<T>) -> Result<MutexGuard<'a, T>> {
    m.lock().map_err(|e| ProviderError::Unavailable(format!("mutex poisoned: {:?}", e)))
}

#[derive(Default)]
struct PoolState {
    available: Vec<HostInfo>,
    reserved: HashMap<String, Vec<i64>>,
    confirmed: HashMap<String, Vec<i64>>,
    forced: Option<(i64, String)>,
    requests: Vec<ApplyRequest>,
    confirm_calls: usize,
}

/// Pool de recursos en memoria.
///
/// Reserva máquinas por `bk_cloud_id` en orden de inserción. La asignación es
/// todo-o-nada: si algún grupo no puede cubrirse se responde
/// `RESOURCE_INSUFFICIENT` sin reservar nada.
pub struct InMemoryResourcePool {
    state: Mutex<PoolState>,
}

impl InMemoryResourcePool {
    /// Crea un pool vacío.
    pub fn new() -> Self {
        Self { state: Mutex::new(PoolState::default()) }
    }

    /// Crea un pool con los hosts indicados disponibles.
    pub fn with_hosts(hosts: Vec<HostInfo>) -> Self {
        let pool = Self::new();
        pool.add_hosts(hosts);
        pool
    }

    /// Crea un pool con `n` hosts sintéticos (`10.0.<cloud>.<i>`).
    pub fn with_generated_hosts(n: usize, bk_cloud_id: i64) -> Self {
        Self::with_hosts(Self::generate_hosts(n, bk_cloud_id, 1))
    }

    /// Genera `n` hosts con ids consecutivos a partir de `first_host_id`.
    pub fn generate_hosts(n: usize, bk_cloud_id: i64, first_host_id: i64) -> Vec<HostInfo> {
        (0..n).map(|i| {
                  let host_id = first_host_id + i as i64;
                  let mut h = HostInfo::new(format!("10.0.{}.{}", bk_cloud_id, host_id), bk_cloud_id, host_id);
                  h.bk_cpu = 8;
                  h.bk_mem = 16384;
                  h.bk_disk = 500;
                  h
              })
              .collect()
    }

    /// Añade hosts al inventario (reposición).
    pub fn add_hosts(&self, hosts: Vec<HostInfo>) {
        if let Ok(mut st) = lock(&self.state) {
            st.available.extend(hosts);
        }
    }

    /// Fuerza que la siguiente(s) pre-asignación(es) respondan con `code`.
    pub fn force_response_code(&self, code: i64, message: &str) {
        if let Ok(mut st) = lock(&self.state) {
            st.forced = Some((code, message.to_string()));
        }
    }

    /// Elimina un código forzado previo.
    pub fn clear_forced_code(&self) {
        if let Ok(mut st) = lock(&self.state) {
            st.forced = None;
        }
    }

    /// Número de hosts libres.
    pub fn available_count(&self) -> usize {
        lock(&self.state).map(|st| st.available.len()).unwrap_or(0)
    }

    /// Peticiones recibidas (para aserciones).
    pub fn requests(&self) -> Vec<ApplyRequest> {
        lock(&self.state).map(|st| st.requests.clone()).unwrap_or_default()
    }

    /// Hosts confirmados para `request_id`, si la petición fue confirmada.
    pub fn confirmed_hosts(&self, request_id: &str) -> Option<Vec<i64>> {
        lock(&self.state).ok().and_then(|st| st.confirmed.get(request_id).cloned())
    }

    /// Número de llamadas a `confirm` recibidas.
    pub fn confirm_calls(&self) -> usize {
        lock(&self.state).map(|st| st.confirm_calls).unwrap_or(0)
    }
}

impl Default for InMemoryResourcePool {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourcePoolClient for InMemoryResourcePool {
    fn pre_apply(&self, request: &ApplyRequest) -> Result<ApplyResponse> {
        let mut st = lock(&self.state)?;
        st.requests.push(request.clone());
        if let Some((code, message)) = st.forced.clone() {
            return Ok(ApplyResponse { code, message, request_id: String::new(), data: vec![] });
        }

        // Se trabaja sobre una copia: sólo se confirma si todos los grupos
        // quedan cubiertos.
        let mut remaining = st.available.clone();
        let mut items = Vec::with_capacity(request.details.len());
        for detail in request.details.iter() {
            let mut taken = Vec::with_capacity(detail.count as usize);
            let mut idx = 0;
            while idx < remaining.len() && taken.len() < detail.count as usize {
                if remaining[idx].bk_cloud_id == detail.bk_cloud_id {
                    let mut host = remaining.remove(idx);
                    host.bk_biz_id = request.for_biz_id;
                    taken.push(host);
                } else {
                    idx += 1;
                }
            }
            if taken.len() < detail.count as usize {
                log::info!("pool en memoria: grupo {} pide {} y sólo hay {}",
                           detail.group_mark,
                           detail.count,
                           taken.len());
                return Ok(ApplyResponse { code: ApplyErrCode::RESOURCE_INSUFFICIENT,
                                          message: format!("recursos insuficientes para {}", detail.group_mark),
                                          request_id: String::new(),
                                          data: vec![] });
            }
            items.push(ApplyItem { item: detail.group_mark.clone(), data: taken });
        }

        let request_id = Uuid::new_v4().simple().to_string();
        let host_ids: Vec<i64> = items.iter().flat_map(|i| i.data.iter().map(|h| h.bk_host_id)).collect();
        st.available = remaining;
        st.reserved.insert(request_id.clone(), host_ids);
        Ok(ApplyResponse { code: ApplyErrCode::OK, message: "ok".into(), request_id, data: items })
    }

    fn confirm(&self, request_id: &str, host_ids: &[i64]) -> Result<()> {
        let mut st = lock(&self.state)?;
        st.confirm_calls += 1;
        if st.confirmed.contains_key(request_id) {
            return Ok(());
        }
        let reserved = st.reserved
                         .get(request_id)
                         .cloned()
                         .ok_or_else(|| ProviderError::NotFound(format!("request_id {}", request_id)))?;
        let reserved_set: HashSet<i64> = reserved.iter().copied().collect();
        if let Some(stray) = host_ids.iter().find(|h| !reserved_set.contains(h)) {
            return Err(ProviderError::InvalidRequest(format!("host {} no pertenece a {}", stray, request_id)));
        }
        st.reserved.remove(request_id);
        st.confirmed.insert(request_id.to_string(), host_ids.to_vec());
        Ok(())
    }
}

/// Ejecución registrada por `InMemoryPipelineEngine`.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub root_id: String,
    pub controller: ControllerInfo,
    pub params: JsonValue,
}

/// Motor de pipelines en memoria: registra las ejecuciones arrancadas. El
/// resultado se simula llamando a `FlowManager::on_pipeline_finished`.
pub struct InMemoryPipelineEngine {
    runs: Mutex<Vec<PipelineRun>>,
    fail_start: Mutex<Option<String>>,
}

impl InMemoryPipelineEngine {
    pub fn new() -> Self {
        Self { runs: Mutex::new(Vec::new()), fail_start: Mutex::new(None) }
    }

    /// Hace que los siguientes `start_run` fallen con `reason`.
    pub fn fail_starts(&self, reason: Option<&str>) {
        if let Ok(mut f) = lock(&self.fail_start) {
            *f = reason.map(|s| s.to_string());
        }
    }

    pub fn runs(&self) -> Vec<PipelineRun> {
        lock(&self.runs).map(|r| r.clone()).unwrap_or_default()
    }

    /// Última ejecución arrancada, si existe.
    pub fn last_run(&self) -> Option<PipelineRun> {
        lock(&self.runs).ok().and_then(|r| r.last().cloned())
    }
}

impl Default for InMemoryPipelineEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineEngine for InMemoryPipelineEngine {
    fn start_run(&self, root_id: &str, controller: &ControllerInfo, params: &JsonValue) -> Result<String> {
        if let Some(reason) = lock(&self.fail_start)?.clone() {
            return Err(ProviderError::Unavailable(reason));
        }
        lock(&self.runs)?.push(PipelineRun { root_id: root_id.to_string(),
                                             controller: controller.clone(),
                                             params: params.clone() });
        Ok(root_id.to_string())
    }
}

/// Ticket de aprobación creado en `InMemoryApprovalService`.
#[derive(Debug, Clone)]
pub struct ApprovalTicket {
    pub sn: String,
    pub service_id: i64,
    pub creator: String,
    pub fields: Vec<ApprovalField>,
    pub callback_meta: JsonValue,
}

/// Servicio ITSM en memoria.
pub struct InMemoryApprovalService {
    services: Mutex<HashMap<String, i64>>,
    tickets: Mutex<Vec<ApprovalTicket>>,
    service_lookups: Mutex<usize>,
}

impl InMemoryApprovalService {
    pub fn new() -> Self {
        Self { services: Mutex::new(HashMap::new()),
               tickets: Mutex::new(Vec::new()),
               service_lookups: Mutex::new(0) }
    }

    pub fn tickets(&self) -> Vec<ApprovalTicket> {
        lock(&self.tickets).map(|t| t.clone()).unwrap_or_default()
    }

    /// Veces que se consultó/creó un servicio.
    pub fn service_lookups(&self) -> usize {
        lock(&self.service_lookups).map(|n| *n).unwrap_or(0)
    }
}

impl Default for InMemoryApprovalService {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalService for InMemoryApprovalService {
    fn get_or_create_service(&self, name: &str) -> Result<i64> {
        *lock(&self.service_lookups)? += 1;
        let mut services = lock(&self.services)?;
        let next_id = services.len() as i64 + 1;
        Ok(*services.entry(name.to_string()).or_insert(next_id))
    }

    fn create_ticket(&self,
                     service_id: i64,
                     creator: &str,
                     fields: &[ApprovalField],
                     callback_meta: &JsonValue)
                     -> Result<String> {
        let mut tickets = lock(&self.tickets)?;
        let sn = format!("REQ{:06}", tickets.len() + 1);
        tickets.push(ApprovalTicket { sn: sn.clone(),
                                      service_id,
                                      creator: creator.to_string(),
                                      fields: fields.to_vec(),
                                      callback_meta: callback_meta.clone() });
        Ok(sn)
    }
}

/// Directorio de administradores estático: primero los DBA del negocio,
/// luego los de plataforma para la familia de motor.
pub struct StaticAdminDirectory {
    per_biz: HashMap<(i64, String), Vec<String>>,
    platform: HashMap<String, Vec<String>>,
}

impl StaticAdminDirectory {
    pub fn new() -> Self {
        Self { per_biz: HashMap::new(), platform: HashMap::new() }
    }

    /// Registra administradores de un negocio concreto.
    pub fn with_biz_admins(mut self, bk_biz_id: i64, group: &str, users: &[&str]) -> Self {
        self.per_biz.insert((bk_biz_id, group.to_string()), users.iter().map(|u| u.to_string()).collect());
        self
    }

    /// Registra administradores de plataforma (respaldo).
    pub fn with_platform_admins(mut self, group: &str, users: &[&str]) -> Self {
        self.platform.insert(group.to_string(), users.iter().map(|u| u.to_string()).collect());
        self
    }
}

impl Default for StaticAdminDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminDirectory for StaticAdminDirectory {
    fn get_admins(&self, bk_biz_id: i64, group: &str) -> Result<Vec<String>> {
        if let Some(users) = self.per_biz.get(&(bk_biz_id, group.to_string())) {
            if !users.is_empty() {
                return Ok(users.clone());
            }
        }
        Ok(self.platform.get(group).cloned().unwrap_or_default())
    }
}
