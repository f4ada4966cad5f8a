mod common;

use common::{ticket_data, Harness};
use dbm_flow::{FlowType, RetryType, TicketStatus};
use dbm_ticket::params::itsm::ItsmParams;
use dbm_ticket::params::CallbackDescriptor;
use dbm_ticket::{BuilderRegistry, CallbackRegistry, NewTicketRequest, TicketConfig, TicketError, TicketType};
use serde_json::json;

fn kinds(h: &Harness, id: &uuid::Uuid) -> Vec<FlowType> {
  h.flows(id).iter().map(|f| f.flow_type).collect()
}

#[test]
fn builtin_registry_covers_every_ticket_type() {
  let registry = BuilderRegistry::builtin();
  assert_eq!(registry.len(), TicketType::ALL.len());
  for tt in TicketType::ALL {
    let builder = registry.get(tt).unwrap();
    assert_eq!(builder.ticket_type(), tt);
  }
  assert!(BuilderRegistry::new().get(TicketType::KafkaApply).is_err());
}

#[test]
fn callback_registry_has_a_key_per_stage() {
  let callbacks = CallbackRegistry::from_builders(BuilderRegistry::builtin());
  for tt in TicketType::ALL {
    for stage in ["inner", "pause", "resource_apply"] {
      assert!(callbacks.contains(&CallbackDescriptor::new(tt, stage).key), "{}/{}", tt, stage);
    }
  }
  assert!(callbacks.contains("MYSQL_ADD_SLAVE/resource_batch_apply"));
  assert!(callbacks.contains("REDIS_SCALE_UPDOWN/resource_batch_apply"));
  assert!(callbacks.contains("MYSQL_ROLLBACK_CLUSTER/deploy_tmp"));
  assert!(!callbacks.contains("KAFKA_APPLY/resource_batch_apply"));
  assert_eq!(callbacks.len(), 8 * 3 + 2 + 1);
}

#[test]
fn plan_without_pool_has_no_apply_or_delivery() {
  let h = Harness::new(0);
  let ticket = h.create(TicketType::MongodbReplicasetApply,
                        json!({"ip_source": "manual_input",
                               "nodes": {"mongodb": []},
                               "resource_spec": {"mongodb": {"spec_id": 1, "count": 3}}}));
  assert_eq!(kinds(&h, &ticket.id), vec![FlowType::ItsmApproval, FlowType::InnerFlow]);

  // las ordinales son contiguas desde cero
  let ordinals: Vec<i64> = h.flows(&ticket.id).iter().map(|f| f.ordinal).collect();
  assert_eq!(ordinals, vec![0, 1]);
  assert!(h.flows(&ticket.id).iter().all(|f| f.retry_type == RetryType::AutoRetry));
}

#[test]
fn itsm_params_strip_cluster_snapshot_and_share_service() {
  let h = Harness::new(0);
  let a = h.create(TicketType::MysqlHaDestroy, json!({"cluster_ids": [10], "clusters": {"10": "antiguo"}}));
  let b = h.create(TicketType::MysqlHaDestroy, json!({"cluster_ids": [11]}));

  for id in [a.id, b.id] {
    let itsm = h.flow_of(&id, FlowType::ItsmApproval);
    let params: ItsmParams = serde_json::from_value(itsm.details.clone()).unwrap();
    assert!(params.ticket_data.get("clusters").is_none());
    assert_eq!(params.ticket_data["uid"], json!(id.to_string()));
    assert_eq!(params.approvers, vec!["dba-mysql".to_string()]);
    assert_eq!(params.service_id, 1);
  }
  assert_eq!(h.approval.service_lookups(), 1);
}

#[test]
fn missing_approvers_abort_creation() {
  let h = Harness::new(2);
  // el negocio 4 no tiene administradores de redis ni hay lista de plataforma
  let res = h.manager.create_ticket(NewTicketRequest::new(TicketType::RedisClusterApply,
                                                          "alice",
                                                          4,
                                                          json!({"ip_source": "resource_pool",
                                                                 "resource_spec": {"proxy": {"spec_id": 2, "count": 2}}})));
  assert!(matches!(res, Err(TicketError::Validation(_))), "obtenido {:?}", res.map(|t| t.id));
  assert!(h.manager.list_tickets().unwrap().is_empty());
  assert_eq!(h.repo.flow_count(), 0);
}

#[test]
fn approvers_fall_back_to_configured_platform_admins() {
  let config = TicketConfig { fallback_approvers: vec!["dba-platform".into()], ..TicketConfig::default() };
  let h = Harness::with_config(2, config);
  let ticket = h.manager
                .create_ticket(NewTicketRequest::new(TicketType::RedisClusterApply,
                                                     "alice",
                                                     4,
                                                     json!({"ip_source": "resource_pool",
                                                            "resource_spec": {"proxy": {"spec_id": 2, "count": 2}}})))
                .unwrap();
  let itsm = h.flow_of(&ticket.id, FlowType::ItsmApproval);
  let params: ItsmParams = serde_json::from_value(itsm.details.clone()).unwrap();
  assert_eq!(params.approvers, vec!["dba-platform".to_string()]);
  assert!(!params.approvers.contains(&ticket.creator));

  // con administradores del negocio la lista de plataforma no se usa
  let own = h.create(TicketType::RedisClusterApply,
                     json!({"ip_source": "resource_pool",
                            "resource_spec": {"proxy": {"spec_id": 2, "count": 2}}}));
  assert_eq!(h.flow_of(&own.id, FlowType::ItsmApproval).details["approvers"], json!(["ops-redis"]));
}

#[test]
fn referenced_clusters_are_snapshotted() {
  let h = Harness::new(0);
  let ticket = h.create(TicketType::MysqlHaDestroy, json!({"cluster_ids": [11, 10, 11]}));
  let details = h.ticket(&ticket.id).details;
  let clusters = details["clusters"].as_object().unwrap();
  let mut keys: Vec<&String> = clusters.keys().collect();
  keys.sort();
  assert_eq!(keys, vec!["10", "11"]);
  let digest = details["clusters_digest"].as_str().unwrap();
  assert_eq!(digest.len(), 64);
  assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));

  // mismo conjunto de clústeres, mismo digest
  let again = h.create(TicketType::MysqlHaDestroy, json!({"cluster_ids": [10, 11]}));
  assert_eq!(h.ticket(&again.id).details["clusters_digest"], json!(digest));
}

#[test]
fn unknown_cluster_aborts_creation() {
  let h = Harness::new(2);
  let res = h.manager.create_ticket(dbm_ticket::NewTicketRequest::new(
    TicketType::MysqlAddSlave,
    "alice",
    3,
    json!({"ip_source": "resource_pool",
           "infos": [{"cluster_id": 10, "resource_spec": {"new_slave": {"spec_id": 5, "count": 1}}},
                     {"cluster_id": 99, "resource_spec": {"new_slave": {"spec_id": 5, "count": 1}}}]}),
  ));
  assert!(res.is_err());
  assert!(h.manager.list_tickets().unwrap().is_empty());
  assert_eq!(h.repo.flow_count(), 0);
}

#[test]
fn details_must_be_an_object() {
  let h = Harness::new(0);
  let res = h.manager.create_ticket(dbm_ticket::NewTicketRequest::new(TicketType::KafkaApply, "alice", 3, json!([1, 2])));
  assert!(res.is_err());
  assert!(h.manager.list_tickets().unwrap().is_empty());
}

#[test]
fn apply_request_skips_empty_roles_and_carries_bill_fields() {
  let h = Harness::new(3);
  let ticket = h.create(TicketType::MongodbReplicasetApply,
                        json!({"ip_source": "resource_pool",
                               "resource_spec": {"mongodb": {"spec_id": 1, "count": 3},
                                                 "arbiter": {"spec_id": 1, "count": 0}}}));
  h.run_and_approve(&ticket.id);

  let request = h.pool.requests().pop().unwrap();
  let apply = h.flow_of(&ticket.id, FlowType::ResourceApply);
  assert_eq!(request.details.len(), 1);
  assert_eq!(request.details[0].group_mark, "mongodb");
  assert_eq!(request.details[0].count, 3);
  assert_eq!(request.details[0].spec_id, Some(1));
  assert_eq!(request.for_biz_id, 3);
  assert_eq!(request.bill_id, ticket.id.to_string());
  assert_eq!(request.bill_type, "MONGODB_REPLICASET_APPLY");
  assert_eq!(request.task_id, apply.id.to_string());
  assert_eq!(request.operator, "alice");
  assert_eq!(request.resource_type, "mongodb");
}

#[test]
fn mongodb_replica_count_must_be_positive() {
  let h = Harness::new(0);
  let res = h.manager.create_ticket(dbm_ticket::NewTicketRequest::new(
    TicketType::MongodbReplicasetApply,
    "alice",
    3,
    json!({"ip_source": "resource_pool", "resource_spec": {"mongodb": {"spec_id": 1, "count": 0}}}),
  ));
  assert!(matches!(res, Err(dbm_ticket::TicketError::Validation(_))));
}

#[test]
fn kafka_zookeeper_nodes_are_renamed() {
  let h = Harness::new(2);
  let ticket = h.create(TicketType::KafkaApply,
                        json!({"ip_source": "resource_pool",
                               "resource_spec": {"broker": {"spec_id": 6, "count": 1},
                                                 "zookeeper": {"spec_id": 7, "count": 1}}}));
  assert_eq!(h.run_and_approve(&ticket.id), TicketStatus::Running);
  let data = ticket_data(&h.flow_of(&ticket.id, FlowType::InnerFlow)).clone();
  assert!(data["nodes"].get("zookeeper").is_none());
  assert_eq!(data["nodes"]["zk"].as_array().unwrap().len(), 1);
  assert_eq!(data["nodes"]["broker"].as_array().unwrap().len(), 1);
  assert_eq!(data["port"], json!(9092));
}

#[test]
fn redis_cluster_apply_exposes_ips_per_role() {
  let h = Harness::new(4);
  let ticket = h.create(TicketType::RedisClusterApply,
                        json!({"ip_source": "resource_pool",
                               "resource_spec": {"proxy": {"spec_id": 2, "count": 2},
                                                 "backend_group": {"spec_id": 3, "count": 1}}}));
  let itsm = h.flow_of(&ticket.id, FlowType::ItsmApproval);
  assert_eq!(itsm.details["approvers"], json!(["ops-redis"]));

  assert_eq!(h.run_and_approve(&ticket.id), TicketStatus::Running);
  let data = ticket_data(&h.flow_of(&ticket.id, FlowType::InnerFlow)).clone();
  assert_eq!(data["proxy_ips"].as_array().unwrap().len(), 2);
  assert_eq!(data["master_ips"].as_array().unwrap().len(), 1);
  assert_eq!(data["slave_ips"].as_array().unwrap().len(), 1);
  assert_ne!(data["master_ips"][0], data["slave_ips"][0]);
  assert_eq!(data["proxy_port"], json!(50000));
}

#[test]
fn redis_scale_updown_writes_ips_per_info() {
  let h = Harness::new(2);
  let ticket = h.create(TicketType::RedisScaleUpdown,
                        json!({"ip_source": "resource_pool",
                               "infos": [{"cluster_id": 20,
                                          "resource_spec": {"backend_group": {"spec_id": 3, "count": 1}}}]}));
  assert_eq!(kinds(&h, &ticket.id),
             vec![FlowType::ItsmApproval, FlowType::ResourceBatchApply, FlowType::InnerFlow, FlowType::ResourceBatchDelivery]);
  assert_eq!(h.run_and_approve(&ticket.id), TicketStatus::Running);

  let request = h.pool.requests().pop().unwrap();
  let marks: Vec<&str> = request.details.iter().map(|d| d.group_mark.as_str()).collect();
  assert_eq!(marks, vec!["0_master_backend_group", "0_slave_backend_group"]);

  let data = ticket_data(&h.flow_of(&ticket.id, FlowType::InnerFlow)).clone();
  let info = &data["infos"][0];
  assert_eq!(info["backend_group"].as_array().unwrap().len(), 1);
  assert_eq!(info["master_ips"].as_array().unwrap().len(), 1);
  assert_eq!(info["slave_ips"].as_array().unwrap().len(), 1);
  assert_eq!(h.finish_running_pipeline(&ticket.id, true), TicketStatus::Succeeded);
}
