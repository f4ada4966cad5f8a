use dbm_flow::{FlowError, FlowErrCode, FlowStatus, FlowType, NewFlow, NewTicket, NewTodo, RetryType, TicketRepositoryExt,
               TicketStatus, TodoStatus, TodoType};
use dbm_persistence::DieselTicketRepository;
use serde_json::json;
use uuid::Uuid;

fn temp_repo() -> Option<DieselTicketRepository> {
  // Los tests usan SQLite; con la feature `pg` se omiten.
  if cfg!(feature = "pg") {
    eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
    return None;
  }
  let tmp_path = std::env::temp_dir().join(format!("dbm_test_{}.db", Uuid::new_v4()));
  let db_url = tmp_path.to_str().unwrap().to_string();
  Some(DieselTicketRepository::new(&db_url).expect("repo sqlite"))
}

fn new_ticket() -> NewTicket {
  NewTicket { ticket_type: "REDIS_CLUSTER_APPLY".into(),
              creator: "bob".into(),
              bk_biz_id: 7,
              group: "redis".into(),
              remark: "alta".into(),
              details: json!({"bk_cloud_id": 0, "cluster_count": 2}) }
}

#[test]
fn diesel_ticket_and_flow_lifecycle() {
  let Some(repo) = temp_repo() else { return };
  let (ticket, flows) = repo.atomic(|store| {
                              let ticket = store.insert_ticket(new_ticket())?;
                              let flows = store.insert_flows(&ticket.id,
                                                             vec![NewFlow::new(FlowType::ResourceApply, "apply", json!({"a": 1})),
                                                                  NewFlow::new(FlowType::InnerFlow, "deploy", json!({}))
                                                                  .with_retry_type(RetryType::ManualRetry)])?;
                              Ok((ticket, flows))
                            })
                            .expect("create ticket");
  assert_eq!(ticket.status, TicketStatus::Pending);

  let mut apply = flows[0].clone();
  apply.flow_obj_id = Some("req-1".into());
  apply.suspend(FlowErrCode::ResourceInsufficient, "sin inventario");
  let mut t = ticket.clone();
  t.details["nodes"] = json!({"redis": []});
  t.status = TicketStatus::Suspended;
  repo.atomic(|store| {
        store.save_flow(&apply)?;
        store.save_ticket(&t)
      })
      .expect("save");

  let (loaded_ticket, loaded_flows, by_obj) = repo.atomic(|store| {
                                                    let lt = store.get_ticket(&ticket.id)?;
                                                    let lf = store.list_flows(&ticket.id)?;
                                                    let by_obj = store.find_flow_by_obj_id("req-1")?;
                                                    Ok((lt, lf, by_obj))
                                                  })
                                                  .expect("load");
  assert_eq!(loaded_ticket.status, TicketStatus::Suspended);
  assert_eq!(loaded_ticket.details["nodes"], json!({"redis": []}));
  assert_eq!(loaded_ticket.group, "redis");
  assert_eq!(loaded_flows.len(), 2);
  assert_eq!(loaded_flows[0].status, FlowStatus::Suspended);
  assert_eq!(loaded_flows[0].err_code, Some(FlowErrCode::ResourceInsufficient));
  assert_eq!(loaded_flows[1].retry_type, RetryType::ManualRetry);
  assert_eq!(loaded_flows[1].ordinal, 1);
  assert_eq!(by_obj.map(|f| f.id), Some(apply.id));
}

#[test]
fn diesel_rollback_discards_partial_work() {
  let Some(repo) = temp_repo() else { return };
  let res: Result<(), FlowError> = repo.atomic(|store| {
                                         let ticket = store.insert_ticket(new_ticket())?;
                                         store.insert_flows(&ticket.id,
                                                            vec![NewFlow::new(FlowType::InnerFlow, "deploy", json!({}))])?;
                                         Err(FlowError::Other("constructor inválido".into()))
                                       });
  assert!(matches!(res, Err(FlowError::Other(_))));
  let tickets = repo.atomic(|store| store.list_tickets()).unwrap();
  assert!(tickets.is_empty());
}

#[test]
fn diesel_todos_deduplicate_open_entries() {
  let Some(repo) = temp_repo() else { return };
  let (ticket, flow) = repo.atomic(|store| {
                             let ticket = store.insert_ticket(new_ticket())?;
                             let flows = store.insert_flows(&ticket.id,
                                                            vec![NewFlow::new(FlowType::Pause, "confirm", json!({}))])?;
                             Ok((ticket, flows[0].clone()))
                           })
                           .unwrap();
  let new_todo = || NewTodo { ticket_id: ticket.id,
                              flow_id: flow.id,
                              todo_type: TodoType::InnerFlowConfirm,
                              operators: vec!["dba1".into(), "dba2".into()],
                              context: json!({"pause_type": "manual"}) };
  let first = repo.atomic(|store| store.create_todo(new_todo())).unwrap().expect("first todo");
  assert!(repo.atomic(|store| store.create_todo(new_todo())).unwrap().is_none());

  let mut done = first.clone();
  done.close(TodoStatus::DoneSuccess, "dba1");
  repo.atomic(|store| store.save_todo(&done)).unwrap();
  let todos = repo.atomic(|store| store.list_todos(&ticket.id)).unwrap();
  assert_eq!(todos.len(), 1);
  assert_eq!(todos[0].status, TodoStatus::DoneSuccess);
  assert_eq!(todos[0].operators, vec!["dba1".to_string(), "dba2".to_string()]);
  assert_eq!(todos[0].done_by.as_deref(), Some("dba1"));
}
