mod common;

use common::{ticket_data, Harness};
use dbm_flow::{FlowErrCode, FlowStatus, FlowType, RetryType, TicketRepositoryExt, TicketStatus, TodoStatus, TodoType};
use dbm_ticket::{RetryTrigger, TicketError, TicketType};
use serde_json::json;
use std::thread;

fn mongo_details() -> serde_json::Value {
  json!({"ip_source": "resource_pool",
         "resource_spec": {"mongodb": {"spec_id": 1, "count": 3}}})
}

#[test]
fn rejected_approval_fails_the_ticket() {
  let h = Harness::new(3);
  let ticket = h.create(TicketType::MongodbReplicasetApply, mongo_details());
  h.manager.run(&ticket.id).unwrap();

  let status = h.manager.approve(&ticket.id, "dba-mongo", false, "sin presupuesto").unwrap();
  assert_eq!(status, TicketStatus::Failed);
  let itsm = h.flow_of(&ticket.id, FlowType::ItsmApproval);
  assert_eq!(itsm.status, FlowStatus::Failed);
  assert_eq!(itsm.err_code, Some(FlowErrCode::Rejected));
  assert_eq!(h.ticket(&ticket.id).status, TicketStatus::Failed);

  let view = h.manager.ticket_view(&ticket.id).unwrap();
  let msg = &view.current_flow().unwrap().message;
  assert!(msg.starts_with("Rechazado en aprobación"), "{}", msg);
  assert!(msg.contains("sin presupuesto"));
  // nada se pidió al pool
  assert!(h.pool.requests().is_empty());
  // y ya no hay aprobación pendiente
  assert!(matches!(h.manager.approve(&ticket.id, "dba-mongo", true, ""), Err(TicketError::Validation(_))));
}

#[test]
fn itsm_ticket_carries_admins_and_callback_meta() {
  let h = Harness::new(3);
  let ticket = h.create(TicketType::MongodbReplicasetApply, mongo_details());
  h.manager.run(&ticket.id).unwrap();

  let created = h.approval.tickets();
  assert_eq!(created.len(), 1);
  assert_eq!(created[0].creator, "alice");
  let itsm = h.flow_of(&ticket.id, FlowType::ItsmApproval);
  assert_eq!(created[0].callback_meta["ticket_id"], json!(ticket.id.to_string()));
  assert_eq!(created[0].callback_meta["flow_id"], json!(itsm.id.to_string()));
  let approvers = created[0].fields.iter().find(|f| f.key == "approver").map(|f| f.value.clone()).unwrap_or_default();
  assert!(approvers.contains("dba-mongo"), "{}", approvers);
}

#[test]
fn destroy_waits_for_manual_confirmation() {
  let h = Harness::new(0);
  let ticket = h.create(TicketType::MysqlHaDestroy, json!({"cluster_ids": [10, 11]}));
  let kinds: Vec<FlowType> = h.flows(&ticket.id).iter().map(|f| f.flow_type).collect();
  assert_eq!(kinds, vec![FlowType::ItsmApproval, FlowType::Pause, FlowType::InnerFlow]);
  assert!(h.flows(&ticket.id).iter().all(|f| f.retry_type == RetryType::ManualRetry));

  assert_eq!(h.run_and_approve(&ticket.id), TicketStatus::Running);
  let pause = h.flow_of(&ticket.id, FlowType::Pause);
  assert_eq!(pause.status, FlowStatus::Running);
  let todos = h.todos(&ticket.id);
  assert_eq!(todos.len(), 1);
  assert_eq!(todos[0].todo_type, TodoType::InnerFlowConfirm);
  assert_eq!(todos[0].context["pause_type"], json!("destroy_confirm"));
  assert!(h.pipeline.runs().is_empty());

  assert_eq!(h.manager.confirm_pause(&ticket.id, "alice", true).unwrap(), TicketStatus::Running);
  let todos = h.todos(&ticket.id);
  assert_eq!(todos[0].status, TodoStatus::DoneSuccess);
  assert_eq!(todos[0].done_by.as_deref(), Some("alice"));
  assert_eq!(h.pipeline.last_run().unwrap().controller.func_name, "mysql_ha_destroy_scene");

  assert_eq!(h.finish_running_pipeline(&ticket.id, true), TicketStatus::Succeeded);
  assert!(h.pool.requests().is_empty());
}

#[test]
fn denied_pause_closes_todo_as_failed() {
  let h = Harness::new(0);
  let ticket = h.create(TicketType::MysqlHaDestroy, json!({"cluster_ids": [10]}));
  h.run_and_approve(&ticket.id);

  assert_eq!(h.manager.confirm_pause(&ticket.id, "alice", false).unwrap(), TicketStatus::Failed);
  let todos = h.todos(&ticket.id);
  assert_eq!(todos[0].status, TodoStatus::DoneFailed);
  assert_eq!(h.flow_of(&ticket.id, FlowType::Pause).err_code, Some(FlowErrCode::Rejected));
  assert_eq!(h.flow_of(&ticket.id, FlowType::InnerFlow).status, FlowStatus::Pending);
}

#[test]
fn failed_pipeline_needs_manual_retry_with_new_root_id() {
  let h = Harness::new(0);
  let ticket = h.create(TicketType::MysqlHaDestroy, json!({"cluster_ids": [10]}));
  h.run_and_approve(&ticket.id);
  h.manager.confirm_pause(&ticket.id, "alice", true).unwrap();
  let first_root = h.flow_of(&ticket.id, FlowType::InnerFlow).flow_obj_id.unwrap();

  assert_eq!(h.finish_running_pipeline(&ticket.id, false), TicketStatus::Failed);
  let inner = h.flow_of(&ticket.id, FlowType::InnerFlow);
  assert_eq!(inner.err_code, Some(FlowErrCode::PipelineFailed));
  let view = h.manager.ticket_view(&ticket.id).unwrap();
  assert!(view.current_flow().unwrap().message.starts_with("Falló el flujo interno"));

  // el planificador no puede reintentar un flow manual
  assert!(matches!(h.manager.retry_flow(&ticket.id, RetryTrigger::Auto), Err(TicketError::Validation(_))));
  assert_eq!(h.flow_of(&ticket.id, FlowType::InnerFlow).retry_count, 0);

  let status = h.manager.retry_flow(&ticket.id, RetryTrigger::Manual { operator: "dba".into() }).unwrap();
  assert_eq!(status, TicketStatus::Running);
  let inner = h.flow_of(&ticket.id, FlowType::InnerFlow);
  assert_eq!(inner.retry_count, 1);
  assert_eq!(inner.details["last_retry_by"], json!("dba"));
  let second_root = inner.flow_obj_id.clone().unwrap();
  assert_ne!(first_root, second_root);
  assert_eq!(h.pipeline.runs().len(), 2);

  // el aviso tardío de la ejecución anterior ya no encuentra flow
  assert!(h.manager.on_pipeline_finished(&first_root, true, "tarde").is_err());
  assert_eq!(h.manager.on_pipeline_finished(&second_root, true, "ok").unwrap(), TicketStatus::Succeeded);
}

#[test]
fn auto_retry_stops_at_the_ceiling() {
  let h = Harness::new(3);
  let ticket = h.create(TicketType::MongodbReplicasetApply, mongo_details());
  h.pipeline.fail_starts(Some("motor caído"));
  assert_eq!(h.run_and_approve(&ticket.id), TicketStatus::Failed);
  assert_eq!(h.flow_of(&ticket.id, FlowType::InnerFlow).err_code, Some(FlowErrCode::PipelineFailed));

  let max = h.ctx().config.auto_retry_max_attempts;
  for attempt in 1..=max {
    assert_eq!(h.manager.retry_flow(&ticket.id, RetryTrigger::Auto).unwrap(), TicketStatus::Failed);
    assert_eq!(h.flow_of(&ticket.id, FlowType::InnerFlow).retry_count, attempt);
  }
  assert!(matches!(h.manager.retry_flow(&ticket.id, RetryTrigger::Auto), Err(TicketError::Validation(_))));

  // un operador siempre puede reintentar
  h.pipeline.fail_starts(None);
  let status = h.manager.retry_flow(&ticket.id, RetryTrigger::Manual { operator: "dba".into() }).unwrap();
  assert_eq!(status, TicketStatus::Running);
  assert_eq!(h.flow_of(&ticket.id, FlowType::InnerFlow).retry_count, max + 1);
  // el pool sólo se consultó una vez; el reintento empieza en el flow fallido
  assert_eq!(h.pool.requests().len(), 1);
}

#[test]
fn unknown_callback_key_is_a_callback_error() {
  let h = Harness::new(3);
  let ticket = h.create(TicketType::MongodbReplicasetApply, mongo_details());
  h.run_and_approve(&ticket.id);

  let mut inner = h.flow_of(&ticket.id, FlowType::InnerFlow);
  inner.details["callback"]["key"] = json!("DESCONOCIDO/inner");
  h.repo.atomic(|store| store.save_flow(&inner)).unwrap();

  assert_eq!(h.finish_running_pipeline(&ticket.id, true), TicketStatus::Failed);
  let inner = h.flow_of(&ticket.id, FlowType::InnerFlow);
  assert_eq!(inner.status, FlowStatus::Failed);
  assert_eq!(inner.err_code, Some(FlowErrCode::CallbackError));
  assert!(inner.status_message().starts_with("Error de callback"));
  assert!(inner.status_message().contains("DESCONOCIDO/inner"));
  // la entrega no llegó a correr
  assert_eq!(h.flow_of(&ticket.id, FlowType::ResourceDelivery).status, FlowStatus::Pending);
  assert_eq!(h.pool.confirm_calls(), 0);
}

#[test]
fn rollback_runs_both_stages_in_order() {
  let h = Harness::new(1);
  let ticket = h.create(TicketType::MysqlRollbackCluster,
                        json!({"ip_source": "resource_pool",
                               "cluster_id": 10,
                               "rollback_time": "2026-10-01 03:00:00",
                               "resource_spec": {"rollback_host": {"spec_id": 5, "count": 1}}}));
  let flows = h.flows(&ticket.id);
  let kinds: Vec<FlowType> = flows.iter().map(|f| f.flow_type).collect();
  assert_eq!(kinds,
             vec![FlowType::ItsmApproval,
                  FlowType::ResourceApply,
                  FlowType::InnerFlow,
                  FlowType::InnerFlow,
                  FlowType::ResourceDelivery]);

  assert_eq!(h.run_and_approve(&ticket.id), TicketStatus::Running);
  assert_eq!(h.pipeline.last_run().unwrap().controller.func_name, "mysql_deploy_tmp_cluster_scene");

  assert_eq!(h.finish_running_pipeline(&ticket.id, true), TicketStatus::Running);
  let flows = h.flows(&ticket.id);
  let deploy = &flows[2];
  let rollback = &flows[3];
  assert_eq!(deploy.status, FlowStatus::Succeeded);
  assert_eq!(rollback.status, FlowStatus::Running);
  let data = ticket_data(rollback);
  assert_eq!(data["tmp_cluster_ready"], json!(true));
  assert_eq!(data["rollback_host"], ticket_data(deploy)["nodes"]["rollback_host"]);
  assert_eq!(h.ticket(&ticket.id).details["tmp_cluster_ready"], json!(true));
  assert_eq!(h.pipeline.last_run().unwrap().controller.func_name, "mysql_rollback_data_scene");

  assert_eq!(h.finish_running_pipeline(&ticket.id, true), TicketStatus::Succeeded);
  assert_eq!(h.pool.confirm_calls(), 1);
}

#[test]
fn concurrent_runs_start_only_one_approval() {
  let h = Harness::new(3);
  let ticket = h.create(TicketType::MongodbReplicasetApply, mongo_details());

  thread::scope(|s| {
    let a = s.spawn(|| h.manager.run(&ticket.id));
    let b = s.spawn(|| h.manager.run(&ticket.id));
    assert_eq!(a.join().unwrap().unwrap(), TicketStatus::Running);
    assert_eq!(b.join().unwrap().unwrap(), TicketStatus::Running);
  });

  assert_eq!(h.approval.tickets().len(), 1);
  assert_eq!(h.flow_of(&ticket.id, FlowType::ItsmApproval).status, FlowStatus::Running);
}

#[test]
fn view_renders_flows_and_open_todos() {
  let h = Harness::new(0);
  let ticket = h.create(TicketType::MongodbReplicasetApply, mongo_details());
  h.run_and_approve(&ticket.id);

  let view = h.manager.ticket_view(&ticket.id).unwrap();
  assert_eq!(view.status, TicketStatus::Suspended);
  assert_eq!(view.flows.len(), 4);
  assert_eq!(view.open_todos().count(), 1);
  let text = view.to_string();
  assert!(text.contains("MONGODB_REPLICASET_APPLY"));
  assert!(text.contains("Solicitud de recursos"));
  assert!(text.contains("RESOURCE_REPLENISH"));
}

#[test]
fn failed_callback_after_reservation_keeps_it_for_retry() {
  let h = Harness::new(10);
  // alta HA con proxys pero sin backend_group: el pool reserva y el
  // post_callback del alta falla después
  let ticket = h.create(TicketType::MysqlHaApply,
                        json!({"ip_source": "resource_pool",
                               "resource_spec": {"proxy": {"spec_id": 4, "count": 2}}}));
  assert_eq!(h.run_and_approve(&ticket.id), TicketStatus::Failed);

  let apply = h.flow_of(&ticket.id, FlowType::ResourceApply);
  assert_eq!(apply.status, FlowStatus::Failed);
  assert_eq!(apply.err_code, Some(FlowErrCode::CallbackError));
  assert!(apply.status_message().contains("MYSQL_HA_APPLY/resource_apply"));
  assert_eq!(h.pool.available_count(), 8);
  let request_id = apply.details["resource_request_id"].as_str().unwrap().to_string();
  assert!(!request_id.is_empty());
  assert_eq!(apply.details["allocation"].as_array().unwrap().len(), 1);

  let status = h.manager.retry_flow(&ticket.id, RetryTrigger::Manual { operator: "dba".into() }).unwrap();
  assert_eq!(status, TicketStatus::Failed);
  // el reintento no vuelve a pedir máquinas
  assert_eq!(h.pool.requests().len(), 1);
  assert_eq!(h.pool.available_count(), 8);
  let apply = h.flow_of(&ticket.id, FlowType::ResourceApply);
  assert_eq!(apply.retry_count, 1);
  assert_eq!(apply.err_code, Some(FlowErrCode::CallbackError));
  assert_eq!(apply.details["resource_request_id"], json!(request_id));
}

#[test]
fn retried_apply_delivers_the_original_reservation() {
  let h = Harness::new(3);
  let ticket = h.create(TicketType::MongodbReplicasetApply, mongo_details());
  h.manager.run(&ticket.id).unwrap();
  let mut apply = h.flow_of(&ticket.id, FlowType::ResourceApply);
  let key = apply.details["callback"]["key"].clone();
  apply.details["callback"]["key"] = json!("DESCONOCIDO/resource_apply");
  h.repo.atomic(|store| store.save_flow(&apply)).unwrap();
  assert_eq!(h.manager.approve(&ticket.id, "dba", true, "").unwrap(), TicketStatus::Failed);
  assert_eq!(h.pool.available_count(), 0);

  let mut apply = h.flow_of(&ticket.id, FlowType::ResourceApply);
  let request_id = apply.details["resource_request_id"].as_str().unwrap().to_string();
  apply.details["callback"]["key"] = key;
  h.repo.atomic(|store| store.save_flow(&apply)).unwrap();

  let status = h.manager.retry_flow(&ticket.id, RetryTrigger::Manual { operator: "dba".into() }).unwrap();
  assert_eq!(status, TicketStatus::Running);
  assert_eq!(h.pool.requests().len(), 1);
  assert_eq!(h.ticket(&ticket.id).details["resource_request_id"], json!(request_id));
  assert_eq!(ticket_data(&h.flow_of(&ticket.id, FlowType::InnerFlow))["nodes"]["mongodb"].as_array().unwrap().len(), 3);

  assert_eq!(h.finish_running_pipeline(&ticket.id, true), TicketStatus::Succeeded);
  assert_eq!(h.pool.confirmed_hosts(&request_id).unwrap().len(), 3);
  // el request id sólo vive en los details; el root id es del flujo interno
  assert!(h.flow_of(&ticket.id, FlowType::ResourceApply).flow_obj_id.is_none());
  let delivery = h.flow_of(&ticket.id, FlowType::ResourceDelivery);
  assert!(delivery.flow_obj_id.is_none());
  assert_eq!(delivery.details["confirmed"]["request_id"], json!(request_id));
}
