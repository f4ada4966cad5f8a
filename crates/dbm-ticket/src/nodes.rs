// Archivo: nodes.rs
// Propósito: mapa rol -> hosts asignados por el pool. Reconstruye los pares
// master/slave de los backend groups, separa los prefijos `{i}_` de los
// lotes y aplana los ids de host para la confirmación.
use crate::errors::{Result, TicketError};
use dbm_domain::spec::parse_backend_group_mark;
use dbm_domain::BackendSide;
use dbm_providers::{ApplyItem, HostInfo};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Un grupo de backend: master y slave asignados juntos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPair {
  pub master: HostInfo,
  pub slave: HostInfo,
}

/// Hosts de un rol: lista plana o pares de backend group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleHosts {
  Hosts(Vec<HostInfo>),
  Pairs(Vec<BackendPair>),
}

impl RoleHosts {
  pub fn len(&self) -> usize {
    match self {
      RoleHosts::Hosts(h) => h.len(),
      RoleHosts::Pairs(p) => p.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Ids de host en orden; cada par aporta master y luego slave.
  pub fn host_ids(&self) -> Vec<i64> {
    match self {
      RoleHosts::Hosts(h) => h.iter().map(|h| h.bk_host_id).collect(),
      RoleHosts::Pairs(p) => p.iter().flat_map(|p| [p.master.bk_host_id, p.slave.bk_host_id]).collect(),
    }
  }

  pub fn ips(&self) -> Vec<String> {
    match self {
      RoleHosts::Hosts(h) => h.iter().map(|h| h.ip.clone()).collect(),
      RoleHosts::Pairs(p) => p.iter().flat_map(|p| [p.master.ip.clone(), p.slave.ip.clone()]).collect(),
    }
  }
}

/// Rol -> hosts, en el orden en que el pool devolvió los grupos.
pub type NodeMap = IndexMap<String, RoleHosts>;

/// Convierte la respuesta del pool en el mapa de nodos. Las marcas
/// `{prefijo}master_backend_group` / `{prefijo}slave_backend_group` se
/// emparejan por posición bajo `{prefijo}backend_group`.
pub fn reconstitute_nodes(items: &[ApplyItem]) -> Result<NodeMap> {
  let mut nodes = NodeMap::new();
  let mut groups: IndexMap<String, (Vec<HostInfo>, Vec<HostInfo>)> = IndexMap::new();
  for item in items {
    match parse_backend_group_mark(&item.item) {
      Some((group_key, side)) => {
        let entry = groups.entry(group_key).or_default();
        match side {
          BackendSide::Master => entry.0.extend(item.data.iter().cloned()),
          BackendSide::Slave => entry.1.extend(item.data.iter().cloned()),
        }
      }
      None => match nodes.entry(item.item.clone()).or_insert_with(|| RoleHosts::Hosts(Vec::new())) {
        RoleHosts::Hosts(hosts) => hosts.extend(item.data.iter().cloned()),
        RoleHosts::Pairs(_) => {
          return Err(TicketError::Validation(format!("rol {} mezclado con backend group", item.item)));
        }
      },
    }
  }
  for (group_key, (masters, slaves)) in groups {
    if masters.len() != slaves.len() {
      return Err(TicketError::Validation(format!("backend group {}: {} master y {} slave no emparejan",
                                                 group_key,
                                                 masters.len(),
                                                 slaves.len())));
    }
    let pairs = masters.into_iter().zip(slaves).map(|(master, slave)| BackendPair { master, slave }).collect();
    nodes.insert(group_key, RoleHosts::Pairs(pairs));
  }
  Ok(nodes)
}

/// Separa `"{i}_{rol}"` en `(i, rol)`.
pub fn split_prefixed(key: &str) -> Option<(usize, &str)> {
  let (idx, role) = key.split_once('_')?;
  let idx = idx.parse::<usize>().ok()?;
  if role.is_empty() {
    return None;
  }
  Some((idx, role))
}

/// Reparte un mapa de nodos de lote por índice de `infos`, quitando el
/// prefijo de cada rol.
pub fn split_batch_nodes(nodes: &NodeMap) -> Result<BTreeMap<usize, NodeMap>> {
  let mut out: BTreeMap<usize, NodeMap> = BTreeMap::new();
  for (key, hosts) in nodes {
    let (idx, role) =
      split_prefixed(key).ok_or_else(|| TicketError::Validation(format!("rol de lote sin prefijo de índice: {}", key)))?;
    out.entry(idx).or_default().insert(role.to_string(), hosts.clone());
  }
  Ok(out)
}

/// Todos los ids de host del mapa, en orden.
pub fn flatten_host_ids(nodes: &NodeMap) -> Vec<i64> {
  nodes.values().flat_map(RoleHosts::host_ids).collect()
}

pub fn nodes_from_json(value: &JsonValue) -> Result<NodeMap> {
  match value {
    JsonValue::Null => Ok(NodeMap::new()),
    v => Ok(serde_json::from_value(v.clone())?),
  }
}

pub fn nodes_to_json(nodes: &NodeMap) -> Result<JsonValue> {
  Ok(serde_json::to_value(nodes)?)
}
