mod common;

use common::Harness;
use dbm_flow::{Flow, FlowStatus, FlowType, NewFlow, Ticket, TicketStatus, TodoType};
use dbm_providers::{ApplyItem, ControllerInfo, HostInfo};
use dbm_ticket::nodes::{reconstitute_nodes, split_batch_nodes};
use dbm_ticket::params::FlowParamBuilder;
use dbm_ticket::{confirm_resource, validate_plan, BuilderFactory, BuilderRegistry, NewTicketRequest, NodeMap, RetryTrigger, RoleHosts,
                 TicketContext, TicketError, TicketFlowBuilder, TicketType};
use serde_json::json;
use std::sync::Arc;

fn hosts(first: i64, n: i64) -> Vec<HostInfo> {
  (first..first + n).map(|i| HostInfo::new(format!("10.9.0.{}", i), 0, i)).collect()
}

#[test]
fn flows_advance_in_strict_ordinal_order() {
  let h = Harness::new(3);
  let ticket = h.create(TicketType::MongodbReplicasetApply,
                        json!({"ip_source": "resource_pool",
                               "resource_spec": {"mongodb": {"spec_id": 1, "count": 3}}}));

  let check = |flows: &[Flow]| {
    for (i, f) in flows.iter().enumerate() {
      assert_eq!(f.ordinal, i as i64);
      if f.status != FlowStatus::Pending {
        assert!(flows[..i].iter().all(|p| p.status == FlowStatus::Succeeded),
                "flow {} avanzó sin que sus predecesores terminaran",
                i);
      }
    }
  };

  check(&h.flows(&ticket.id));
  h.manager.run(&ticket.id).unwrap();
  check(&h.flows(&ticket.id));
  // correr de nuevo mientras se espera la aprobación no avanza nada
  h.manager.run(&ticket.id).unwrap();
  assert_eq!(h.approval.tickets().len(), 1);
  h.manager.approve(&ticket.id, "dba", true, "").unwrap();
  check(&h.flows(&ticket.id));
  h.finish_running_pipeline(&ticket.id, true);
  check(&h.flows(&ticket.id));
}

#[test]
fn confirming_twice_leaves_the_same_state() {
  let h = Harness::new(3);
  let ticket = h.create(TicketType::MongodbReplicasetApply,
                        json!({"ip_source": "resource_pool",
                               "resource_spec": {"mongodb": {"spec_id": 1, "count": 3}}}));
  h.run_and_approve(&ticket.id);
  assert_eq!(h.finish_running_pipeline(&ticket.id, true), TicketStatus::Succeeded);

  let before_ticket: Ticket = h.ticket(&ticket.id);
  let before_flows = h.flows(&ticket.id);
  let request_id = before_ticket.details["resource_request_id"].as_str().unwrap().to_string();
  let confirmed = h.pool.confirmed_hosts(&request_id).unwrap();

  let again = confirm_resource(h.ctx(), &before_ticket, false).unwrap().unwrap();
  assert_eq!(again.0, request_id);
  assert_eq!(again.1, confirmed);
  assert_eq!(h.pool.confirm_calls(), 2);
  assert_eq!(h.pool.confirmed_hosts(&request_id).unwrap(), confirmed);
  assert_eq!(h.ticket(&ticket.id), before_ticket);
  assert_eq!(h.flows(&ticket.id), before_flows);
}

#[test]
fn backend_group_marks_are_reconstituted_into_pairs() {
  let k = 3;
  let items = vec![ApplyItem { item: "proxy".into(), data: hosts(1, 2) },
                   ApplyItem { item: "master_backend_group".into(), data: hosts(10, k) },
                   ApplyItem { item: "slave_backend_group".into(), data: hosts(20, k) }];
  let nodes = reconstitute_nodes(&items).unwrap();

  assert!(nodes.keys().all(|key| !key.ends_with("_backend_group")));
  match nodes.get("backend_group") {
    Some(RoleHosts::Pairs(pairs)) => {
      assert_eq!(pairs.len(), k as usize);
      for (i, p) in pairs.iter().enumerate() {
        assert_eq!(p.master.bk_host_id, 10 + i as i64);
        assert_eq!(p.slave.bk_host_id, 20 + i as i64);
      }
    }
    other => panic!("backend_group esperado como pares, obtenido {:?}", other),
  }
  assert_eq!(nodes.get("proxy").map(RoleHosts::len), Some(2));

  // nunca se trunca un grupo desparejado
  let odd = vec![ApplyItem { item: "master_backend_group".into(), data: hosts(10, 2) },
                 ApplyItem { item: "slave_backend_group".into(), data: hosts(20, 1) }];
  assert!(matches!(reconstitute_nodes(&odd), Err(TicketError::Validation(_))));
}

#[test]
fn batch_prefixes_route_to_their_own_info() {
  let n = 4;
  let mut nodes = NodeMap::new();
  for i in 0..n {
    nodes.insert(format!("{}_new_slave", i), RoleHosts::Hosts(hosts(100 * (i as i64 + 1), 1)));
  }
  let split = split_batch_nodes(&nodes).unwrap();
  assert_eq!(split.len(), n);
  for i in 0..n {
    let role_nodes = &split[&i];
    assert_eq!(role_nodes.len(), 1);
    assert_eq!(role_nodes["new_slave"].host_ids(), vec![100 * (i as i64 + 1)]);
  }

  let mut bad = NodeMap::new();
  bad.insert("new_slave".into(), RoleHosts::Hosts(hosts(1, 1)));
  assert!(split_batch_nodes(&bad).is_err());
}

#[test]
fn scarcity_keeps_a_single_todo_per_flow() {
  let h = Harness::new(0);
  let ticket = h.create(TicketType::MongodbReplicasetApply,
                        json!({"ip_source": "resource_pool",
                               "resource_spec": {"mongodb": {"spec_id": 1, "count": 3}}}));
  assert_eq!(h.run_and_approve(&ticket.id), TicketStatus::Suspended);
  // volver a conducir un ticket suspendido no repite la solicitud
  assert_eq!(h.manager.run(&ticket.id).unwrap(), TicketStatus::Suspended);
  assert_eq!(h.pool.requests().len(), 1);

  // reintentar sin inventario vuelve a suspender sin duplicar el todo
  for _ in 0..2 {
    let status = h.manager.retry_flow(&ticket.id, RetryTrigger::Manual { operator: "dba".into() }).unwrap();
    assert_eq!(status, TicketStatus::Suspended);
  }
  assert_eq!(h.pool.requests().len(), 3);
  let apply = h.flow_of(&ticket.id, FlowType::ResourceApply);
  assert_eq!(apply.status, FlowStatus::Suspended);
  assert_eq!(apply.retry_count, 2);
  let replenish: Vec<_> =
    h.todos(&ticket.id).into_iter().filter(|t| t.todo_type == TodoType::ResourceReplenish).collect();
  assert_eq!(replenish.len(), 1);
  assert!(replenish[0].is_open());
  assert_eq!(h.pool.available_count(), 0);
}

struct NoopParams;

impl FlowParamBuilder for NoopParams {
  fn controller(&self) -> ControllerInfo {
    ControllerInfo::new("TestController", "noop")
  }
}

/// Plan propio que deja una pausa justo después de resource-apply.
struct BrokenPlanBuilder;

impl TicketFlowBuilder for BrokenPlanBuilder {
  fn ticket_type(&self) -> TicketType {
    TicketType::MysqlRollbackCluster
  }

  fn inner_flow_builder(&self) -> Arc<dyn FlowParamBuilder> {
    Arc::new(NoopParams)
  }

  fn custom_flows(&self, _ctx: &TicketContext, _ticket: &Ticket) -> dbm_ticket::Result<Option<Vec<NewFlow>>> {
    Ok(Some(vec![NewFlow::new(FlowType::Pause, "pausa fuera de sitio", json!({})),
                 NewFlow::new(FlowType::InnerFlow, "restaurar", json!({}))]))
  }
}

fn broken_plan() -> Box<dyn TicketFlowBuilder> {
  Box::new(BrokenPlanBuilder)
}

#[test]
fn invalid_plan_persists_nothing() {
  let mut builders = BuilderRegistry::new();
  let factory: BuilderFactory = broken_plan;
  builders.register(TicketType::MysqlRollbackCluster, factory);
  let h = Harness::with_builders(4, builders);

  let res = h.manager.create_ticket(NewTicketRequest::new(TicketType::MysqlRollbackCluster,
                                                          "alice",
                                                          3,
                                                          json!({"ip_source": "resource_pool",
                                                                 "cluster_id": 10,
                                                                 "resource_spec": {"rollback_host": {"spec_id": 5, "count": 1}}})));
  assert!(matches!(res, Err(TicketError::Build(_))), "obtenido {:?}", res.map(|t| t.id));
  assert_eq!(h.repo.flow_count(), 0);
  assert!(h.manager.list_tickets().unwrap().is_empty());
  assert!(h.pool.requests().is_empty());
}

#[test]
fn validate_plan_checks_delivery_has_matching_apply() {
  let ok = vec![NewFlow::new(FlowType::ResourceBatchApply, "a", json!({})),
                NewFlow::new(FlowType::InnerFlow, "b", json!({})),
                NewFlow::new(FlowType::ResourceBatchDelivery, "c", json!({}))];
  assert!(validate_plan(&ok).is_ok());

  let mismatched = vec![NewFlow::new(FlowType::ResourceApply, "a", json!({})),
                        NewFlow::new(FlowType::InnerFlow, "b", json!({})),
                        NewFlow::new(FlowType::ResourceBatchDelivery, "c", json!({}))];
  assert!(matches!(validate_plan(&mismatched), Err(TicketError::Build(_))));

  let apply_last = vec![NewFlow::new(FlowType::InnerFlow, "b", json!({})),
                        NewFlow::new(FlowType::ResourceApply, "a", json!({}))];
  assert!(validate_plan(&apply_last).is_err());
}
