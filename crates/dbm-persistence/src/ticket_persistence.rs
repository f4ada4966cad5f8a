use crate::schema;
use crate::schema::flows::dsl as flows_dsl;
use crate::schema::tickets::dsl as tickets_dsl;
use crate::schema::todos::dsl as todos_dsl;
use chrono::{DateTime, TimeZone, Utc};
use dbm_flow::{Flow, FlowError, FlowStatus, NewFlow, NewTicket, NewTodo, Result, Ticket, TicketRepository,
               TicketStatus, TicketStore, Todo, TodoStatus};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::Error as DieselError;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
#[cfg(feature = "pg")]
type DbConn = PgConnection;
#[cfg(not(feature = "pg"))]
type DbConn = SqliteConnection;
type DbPool = Pool<ConnectionManager<DbConn>>;

/// Repo Diesel que implementa `TicketRepository`. Cada llamada a
/// `transaction` toma una conexión del pool y abre una transacción real.
pub struct DieselTicketRepository {
  pool: Arc<DbPool>,
}

impl DieselTicketRepository {
  /// Crea el pool y aplica las migraciones pendientes.
  pub fn new(database_url: &str) -> Result<Self> {
    let manager = ConnectionManager::<DbConn>::new(database_url);
    let pool = Pool::builder().max_size(4)
                              .build(manager)
                              .map_err(|e| FlowError::Storage(format!("no se pudo crear el pool de conexiones: {}", e)))?;
    let repo = DieselTicketRepository { pool: Arc::new(pool) };
    let mut c = repo.conn()?;
    configure_connection(&mut c);
    c.run_pending_migrations(MIGRATIONS).map_err(|e| FlowError::Storage(format!("migraciones: {}", e)))?;
    Ok(repo)
  }

  fn conn(&self) -> Result<PooledConnection<ConnectionManager<DbConn>>> {
    self.pool.get().map_err(|e| FlowError::Storage(format!("pool: {}", e)))
  }
}

#[cfg(not(feature = "pg"))]
fn configure_connection(c: &mut DbConn) {
  for pragma in ["PRAGMA journal_mode = WAL;", "PRAGMA busy_timeout = 5000;"] {
    if let Err(e) = diesel::sql_query(pragma).execute(c) {
      log::warn!("sqlite: no se pudo aplicar '{}': {}", pragma, e);
    }
  }
}
#[cfg(feature = "pg")]
fn configure_connection(_c: &mut DbConn) {}

/// Error interno de la transacción Diesel: mezcla errores del driver con
/// los que devuelve el trabajo del caller.
#[derive(Debug, thiserror::Error)]
enum TxError {
  #[error("db: {0}")]
  Db(#[from] DieselError),
  #[error("{0}")]
  Flow(FlowError),
}

impl From<TxError> for FlowError {
  fn from(e: TxError) -> Self {
    match e {
      TxError::Db(e) => FlowError::Storage(format!("db: {}", e)),
      TxError::Flow(e) => e,
    }
  }
}

impl TicketRepository for DieselTicketRepository {
  fn transaction(&self, work: &mut dyn FnMut(&mut dyn TicketStore) -> Result<()>) -> Result<()> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    conn.transaction::<(), TxError, _>(|c| {
          let mut store = DieselStore { conn: c };
          work(&mut store).map_err(TxError::Flow)
        })
        .map_err(|e| {
          log::debug!("rollback de transacción: {}", e);
          FlowError::from(e)
        })
  }
}

// Filas Diesel. El orden de campos debe coincidir con `schema.rs`.
#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = schema::tickets, treat_none_as_null = true)]
struct TicketRow {
  pub id: String,
  pub ticket_type: String,
  pub creator: String,
  pub bk_biz_id: i64,
  pub group_name: String,
  pub remark: String,
  pub details: String,
  pub status: String,
  pub created_at_ts: i64,
  pub updated_at_ts: i64,
}
#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = schema::flows, treat_none_as_null = true)]
struct FlowRow {
  pub id: String,
  pub ticket_id: String,
  pub ordinal: i64,
  pub flow_type: String,
  pub flow_alias: String,
  pub flow_obj_id: Option<String>,
  pub details: String,
  pub status: String,
  pub retry_type: String,
  pub retry_count: i64,
  pub err_code: Option<String>,
  pub err_msg: Option<String>,
  pub created_at_ts: i64,
  pub updated_at_ts: i64,
}
#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = schema::todos, treat_none_as_null = true)]
struct TodoRow {
  pub id: String,
  pub ticket_id: String,
  pub flow_id: String,
  pub todo_type: String,
  pub operators: String,
  pub status: String,
  pub context: String,
  pub done_by: Option<String>,
  pub created_at_ts: i64,
  pub done_at_ts: Option<i64>,
}

fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T> {
  res.map_err(|e| FlowError::Storage(format!("db: {}", e)))
}
fn parse_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(|e| FlowError::Storage(format!("uuid inválido '{}': {}", s, e)))
}
fn parse_json(s: &str) -> Result<JsonValue> {
  serde_json::from_str(s).map_err(|e| FlowError::Storage(format!("json inválido: {}", e)))
}
fn to_ts(dt: &DateTime<Utc>) -> i64 {
  dt.timestamp_millis()
}
fn from_ts(ms: i64) -> Result<DateTime<Utc>> {
  Utc.timestamp_millis_opt(ms).single().ok_or_else(|| FlowError::Storage(format!("timestamp inválido: {}", ms)))
}
fn parse_text<T: FromStr<Err = FlowError>>(s: &str) -> Result<T> {
  s.parse::<T>().map_err(|e| FlowError::Storage(e.to_string()))
}

impl TicketRow {
  fn from_ticket(t: &Ticket) -> Self {
    TicketRow { id: t.id.to_string(),
                ticket_type: t.ticket_type.clone(),
                creator: t.creator.clone(),
                bk_biz_id: t.bk_biz_id,
                group_name: t.group.clone(),
                remark: t.remark.clone(),
                details: t.details.to_string(),
                status: t.status.as_str().to_string(),
                created_at_ts: to_ts(&t.created_at),
                updated_at_ts: to_ts(&t.updated_at) }
  }
  fn into_ticket(self) -> Result<Ticket> {
    Ok(Ticket { id: parse_uuid(&self.id)?,
                ticket_type: self.ticket_type,
                creator: self.creator,
                bk_biz_id: self.bk_biz_id,
                group: self.group_name,
                remark: self.remark,
                details: parse_json(&self.details)?,
                status: parse_text::<TicketStatus>(&self.status)?,
                created_at: from_ts(self.created_at_ts)?,
                updated_at: from_ts(self.updated_at_ts)? })
  }
}

impl FlowRow {
  fn from_flow(f: &Flow) -> Self {
    FlowRow { id: f.id.to_string(),
              ticket_id: f.ticket_id.to_string(),
              ordinal: f.ordinal,
              flow_type: f.flow_type.as_str().to_string(),
              flow_alias: f.flow_alias.clone(),
              flow_obj_id: f.flow_obj_id.clone(),
              details: f.details.to_string(),
              status: f.status.as_str().to_string(),
              retry_type: f.retry_type.as_str().to_string(),
              retry_count: f.retry_count,
              err_code: f.err_code.map(|c| c.as_str().to_string()),
              err_msg: f.err_msg.clone(),
              created_at_ts: to_ts(&f.created_at),
              updated_at_ts: to_ts(&f.updated_at) }
  }
  fn into_flow(self) -> Result<Flow> {
    let err_code = match self.err_code.as_deref() {
      Some(code) => Some(parse_text(code)?),
      None => None,
    };
    Ok(Flow { id: parse_uuid(&self.id)?,
              ticket_id: parse_uuid(&self.ticket_id)?,
              ordinal: self.ordinal,
              flow_type: parse_text(&self.flow_type)?,
              flow_alias: self.flow_alias,
              flow_obj_id: self.flow_obj_id,
              details: parse_json(&self.details)?,
              status: parse_text(&self.status)?,
              retry_type: parse_text(&self.retry_type)?,
              retry_count: self.retry_count,
              err_code,
              err_msg: self.err_msg,
              created_at: from_ts(self.created_at_ts)?,
              updated_at: from_ts(self.updated_at_ts)? })
  }
}

impl TodoRow {
  fn from_todo(t: &Todo) -> Result<Self> {
    let operators =
      serde_json::to_string(&t.operators).map_err(|e| FlowError::Storage(format!("operadores del todo: {}", e)))?;
    Ok(TodoRow { id: t.id.to_string(),
                 ticket_id: t.ticket_id.to_string(),
                 flow_id: t.flow_id.to_string(),
                 todo_type: t.todo_type.as_str().to_string(),
                 operators,
                 status: t.status.as_str().to_string(),
                 context: t.context.to_string(),
                 done_by: t.done_by.clone(),
                 created_at_ts: to_ts(&t.created_at),
                 done_at_ts: t.done_at.as_ref().map(to_ts) })
  }
  fn into_todo(self) -> Result<Todo> {
    let operators: Vec<String> =
      serde_json::from_str(&self.operators).map_err(|e| FlowError::Storage(format!("operadores del todo: {}", e)))?;
    let done_at = match self.done_at_ts {
      Some(ms) => Some(from_ts(ms)?),
      None => None,
    };
    Ok(Todo { id: parse_uuid(&self.id)?,
              ticket_id: parse_uuid(&self.ticket_id)?,
              flow_id: parse_uuid(&self.flow_id)?,
              todo_type: parse_text(&self.todo_type)?,
              operators,
              status: parse_text(&self.status)?,
              context: parse_json(&self.context)?,
              done_by: self.done_by,
              created_at: from_ts(self.created_at_ts)?,
              done_at })
  }
}

/// Vista transaccional sobre una conexión con transacción abierta.
struct DieselStore<'a> {
  conn: &'a mut DbConn,
}

impl TicketStore for DieselStore<'_> {
  fn insert_ticket(&mut self, new: NewTicket) -> Result<Ticket> {
    let now = Utc::now();
    let ticket = Ticket { id: Uuid::new_v4(),
                          ticket_type: new.ticket_type,
                          creator: new.creator,
                          bk_biz_id: new.bk_biz_id,
                          group: new.group,
                          remark: new.remark,
                          details: new.details,
                          status: TicketStatus::Pending,
                          created_at: now,
                          updated_at: now };
    let row = TicketRow::from_ticket(&ticket);
    map_db_err(diesel::insert_into(tickets_dsl::tickets).values(&row).execute(&mut *self.conn))?;
    Ok(ticket)
  }

  fn get_ticket(&mut self, ticket_id: &Uuid) -> Result<Ticket> {
    let row = map_db_err(tickets_dsl::tickets.filter(tickets_dsl::id.eq(ticket_id.to_string()))
                                             .first::<TicketRow>(&mut *self.conn)
                                             .optional())?;
    row.ok_or_else(|| FlowError::NotFound(format!("ticket {}", ticket_id)))?.into_ticket()
  }

  fn save_ticket(&mut self, ticket: &Ticket) -> Result<()> {
    let mut row = TicketRow::from_ticket(ticket);
    row.updated_at_ts = to_ts(&Utc::now());
    let n = map_db_err(diesel::update(tickets_dsl::tickets.filter(tickets_dsl::id.eq(&row.id))).set(&row)
                                                                                              .execute(&mut *self.conn))?;
    if n == 0 {
      return Err(FlowError::NotFound(format!("ticket {}", ticket.id)));
    }
    Ok(())
  }

  fn list_tickets(&mut self) -> Result<Vec<Ticket>> {
    let rows = map_db_err(tickets_dsl::tickets.order((tickets_dsl::created_at_ts.asc(), tickets_dsl::id.asc()))
                                              .load::<TicketRow>(&mut *self.conn))?;
    rows.into_iter().map(TicketRow::into_ticket).collect()
  }

  fn insert_flows(&mut self, ticket_id: &Uuid, new_flows: Vec<NewFlow>) -> Result<Vec<Flow>> {
    let tid = ticket_id.to_string();
    let exists = map_db_err(tickets_dsl::tickets.filter(tickets_dsl::id.eq(&tid))
                                                .count()
                                                .get_result::<i64>(&mut *self.conn))?;
    if exists == 0 {
      return Err(FlowError::NotFound(format!("ticket {}", ticket_id)));
    }
    let base = map_db_err(flows_dsl::flows.filter(flows_dsl::ticket_id.eq(&tid)).count().get_result::<i64>(&mut *self.conn))?;
    let now = Utc::now();
    let mut created = Vec::with_capacity(new_flows.len());
    for (i, new) in new_flows.into_iter().enumerate() {
      let flow = Flow { id: Uuid::new_v4(),
                        ticket_id: *ticket_id,
                        ordinal: base + i as i64,
                        flow_type: new.flow_type,
                        flow_alias: new.flow_alias,
                        flow_obj_id: None,
                        details: new.details,
                        status: FlowStatus::Pending,
                        retry_type: new.retry_type,
                        retry_count: 0,
                        err_code: None,
                        err_msg: None,
                        created_at: now,
                        updated_at: now };
      map_db_err(diesel::insert_into(flows_dsl::flows).values(&FlowRow::from_flow(&flow)).execute(&mut *self.conn))?;
      created.push(flow);
    }
    Ok(created)
  }

  fn list_flows(&mut self, ticket_id: &Uuid) -> Result<Vec<Flow>> {
    let rows = map_db_err(flows_dsl::flows.filter(flows_dsl::ticket_id.eq(ticket_id.to_string()))
                                          .order(flows_dsl::ordinal.asc())
                                          .load::<FlowRow>(&mut *self.conn))?;
    rows.into_iter().map(FlowRow::into_flow).collect()
  }

  fn get_flow(&mut self, flow_id: &Uuid) -> Result<Flow> {
    let row = map_db_err(flows_dsl::flows.filter(flows_dsl::id.eq(flow_id.to_string()))
                                         .first::<FlowRow>(&mut *self.conn)
                                         .optional())?;
    row.ok_or_else(|| FlowError::NotFound(format!("flow {}", flow_id)))?.into_flow()
  }

  fn find_flow_by_obj_id(&mut self, flow_obj_id: &str) -> Result<Option<Flow>> {
    let row = map_db_err(flows_dsl::flows.filter(flows_dsl::flow_obj_id.eq(flow_obj_id))
                                         .first::<FlowRow>(&mut *self.conn)
                                         .optional())?;
    row.map(FlowRow::into_flow).transpose()
  }

  fn save_flow(&mut self, flow: &Flow) -> Result<()> {
    let mut row = FlowRow::from_flow(flow);
    row.updated_at_ts = to_ts(&Utc::now());
    let n = map_db_err(diesel::update(flows_dsl::flows.filter(flows_dsl::id.eq(&row.id))).set(&row).execute(&mut *self.conn))?;
    if n == 0 {
      return Err(FlowError::NotFound(format!("flow {}", flow.id)));
    }
    Ok(())
  }

  fn create_todo(&mut self, new: NewTodo) -> Result<Option<Todo>> {
    let open = map_db_err(todos_dsl::todos.filter(todos_dsl::flow_id.eq(new.flow_id.to_string()))
                                          .filter(todos_dsl::todo_type.eq(new.todo_type.as_str()))
                                          .filter(todos_dsl::status.eq(TodoStatus::Todo.as_str()))
                                          .count()
                                          .get_result::<i64>(&mut *self.conn))?;
    if open > 0 {
      return Ok(None);
    }
    let todo = Todo { id: Uuid::new_v4(),
                      ticket_id: new.ticket_id,
                      flow_id: new.flow_id,
                      todo_type: new.todo_type,
                      operators: new.operators,
                      status: TodoStatus::Todo,
                      context: new.context,
                      done_by: None,
                      created_at: Utc::now(),
                      done_at: None };
    map_db_err(diesel::insert_into(todos_dsl::todos).values(&TodoRow::from_todo(&todo)?).execute(&mut *self.conn))?;
    Ok(Some(todo))
  }

  fn list_todos(&mut self, ticket_id: &Uuid) -> Result<Vec<Todo>> {
    let rows = map_db_err(todos_dsl::todos.filter(todos_dsl::ticket_id.eq(ticket_id.to_string()))
                                          .order((todos_dsl::created_at_ts.asc(), todos_dsl::id.asc()))
                                          .load::<TodoRow>(&mut *self.conn))?;
    rows.into_iter().map(TodoRow::into_todo).collect()
  }

  fn save_todo(&mut self, todo: &Todo) -> Result<()> {
    let row = TodoRow::from_todo(todo)?;
    let n = map_db_err(diesel::update(todos_dsl::todos.filter(todos_dsl::id.eq(&row.id))).set(&row).execute(&mut *self.conn))?;
    if n == 0 {
      return Err(FlowError::NotFound(format!("todo {}", todo.id)));
    }
    Ok(())
  }
}

/// Construye el repositorio a partir de `DBM_DB_URL` (o `DATABASE_URL`).
/// Lee `.env` si existe.
pub fn new_from_env() -> Result<DieselTicketRepository> {
  dotenvy::dotenv().ok();
  let url = std::env::var("DBM_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                       .map_err(|_| FlowError::Storage("DBM_DB_URL / DATABASE_URL no definido".into()))?;
  check_backend_url(&url)?;
  log::info!("abriendo repositorio de tickets");
  DieselTicketRepository::new(&url)
}

#[cfg(feature = "pg")]
fn check_backend_url(url: &str) -> Result<()> {
  if !(url.starts_with("postgres") || url.contains('@')) {
    return Err(FlowError::Storage("dbm-persistence: DBM_DB_URL no parece una URL de Postgres".into()));
  }
  Ok(())
}
#[cfg(not(feature = "pg"))]
fn check_backend_url(url: &str) -> Result<()> {
  if url.starts_with("postgres") {
    return Err(FlowError::Storage("dbm-persistence se compiló sin la feature 'pg'; habilítela para usar Postgres".into()));
  }
  Ok(())
}
