use anyhow::{anyhow, Context, Result};
use dbm_domain::DomainStubs;
use dbm_flow::{InMemoryTicketRepository, TicketRepository, TicketStatus};
use dbm_providers::stubs::{InMemoryApprovalService, InMemoryPipelineEngine, InMemoryResourcePool, StaticAdminDirectory};
use dbm_ticket::{Collaborators, FlowManager, NewTicketRequest, RetryTrigger, TicketConfig, TicketContext, TicketType};
use std::io::{self, Write};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

// Ids de las máquinas añadidas desde el menú; el pool inicial usa 1..=8.
static NEXT_HOST_ID: AtomicI64 = AtomicI64::new(1000);

/// Menú interactivo de operador sobre el motor de tickets.
///
/// Los tickets se guardan con `dbm-persistence` si `DBM_DB_URL` (o
/// `DATABASE_URL`) está definido; si no, en memoria. Pool de recursos,
/// motor de pipelines e ITSM son stubs en memoria: las aprobaciones y el
/// fin de cada pipeline se simulan desde el menú.
///
/// Opciones:
/// 1) Listar tickets
/// 2) Crear ticket
/// 3) Ejecutar ticket
/// 4) Ver ticket
/// 5) Resolver aprobación ITSM
/// 6) Resolver confirmación manual
/// 7) Notificar fin de pipeline
/// 8) Reintentar flow
/// 9) Reponer máquinas en el pool
/// 0) Salir
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let repo: Arc<dyn TicketRepository> = match dbm_persistence::new_from_env() {
        Ok(r) => Arc::new(r),
        Err(e) => {
            log::warn!("sin base de datos ({}); se usa un repositorio en memoria", e);
            Arc::new(InMemoryTicketRepository::new())
        }
    };

    let pool = Arc::new(InMemoryResourcePool::with_generated_hosts(8, 0));
    let pipeline = Arc::new(InMemoryPipelineEngine::new());
    let approval = Arc::new(InMemoryApprovalService::new());
    let admins = StaticAdminDirectory::new().with_platform_admins("mysql", &["dba-mysql"])
                                            .with_platform_admins("redis", &["dba-redis"])
                                            .with_platform_admins("mongodb", &["dba-mongo"])
                                            .with_platform_admins("kafka", &["dba-kafka"]);
    let collaborators = Collaborators { clusters: Arc::new(DomainStubs::sample_clusters()),
                                        specs: Arc::new(DomainStubs::sample_specs()),
                                        admins: Arc::new(admins),
                                        resource_pool: pool.clone(),
                                        pipeline: pipeline.clone(),
                                        approval };
    let config = TicketConfig::from_env().context("configuración del motor")?;
    let manager = FlowManager::new(Arc::new(TicketContext::new(repo, collaborators, config)));

    loop {
        println!("\n== Tickets DBM ==");
        println!("1) Listar tickets");
        println!("2) Crear ticket");
        println!("3) Ejecutar ticket");
        println!("4) Ver ticket");
        println!("5) Resolver aprobación ITSM");
        println!("6) Resolver confirmación manual");
        println!("7) Notificar fin de pipeline");
        println!("8) Reintentar flow");
        println!("9) Reponer máquinas en el pool ({} libres)", pool.available_count());
        println!("0) Salir");
        let choice = prompt("Elige una opción: ")?;
        if choice.trim() == "0" {
            println!("Saliendo...");
            break;
        }
        if let Err(e) = dispatch(choice.trim(), &manager, &pool, &pipeline) {
            eprintln!("Error: {:#}", e);
        }
    }

    Ok(())
}

fn dispatch(choice: &str, manager: &FlowManager, pool: &InMemoryResourcePool, pipeline: &InMemoryPipelineEngine) -> Result<()> {
    let report = |status: TicketStatus| println!("Estado: {}", status);
    match choice {
        "1" => list(manager),
        "2" => create(manager),
        "3" => {
            let id = prompt_uuid("Ticket id: ")?;
            report(manager.run(&id)?);
            Ok(())
        }
        "4" => {
            let id = prompt_uuid("Ticket id: ")?;
            print!("{}", manager.ticket_view(&id)?);
            Ok(())
        }
        "5" => {
            let id = prompt_uuid("Ticket id: ")?;
            let operator = prompt("Aprobador: ")?;
            let approved = prompt_yes("¿Aprobar? (yes/no): ")?;
            let message = prompt("Comentario: ")?;
            report(manager.approve(&id, operator.trim(), approved, message.trim())?);
            Ok(())
        }
        "6" => {
            let id = prompt_uuid("Ticket id: ")?;
            let operator = prompt("Operador: ")?;
            let confirmed = prompt_yes("¿Confirmar? (yes/no): ")?;
            report(manager.confirm_pause(&id, operator.trim(), confirmed)?);
            Ok(())
        }
        "7" => {
            if let Some(run) = pipeline.last_run() {
                println!("Última ejecución: {} ({}.{})", run.root_id, run.controller.controller, run.controller.func_name);
            }
            let root_id = prompt("Root id: ")?;
            let succeeded = prompt_yes("¿Terminó bien? (yes/no): ")?;
            report(manager.on_pipeline_finished(root_id.trim(), succeeded, "notificado desde el menú")?);
            Ok(())
        }
        "8" => {
            let id = prompt_uuid("Ticket id: ")?;
            let operator = prompt("Operador (enter = reintento automático): ")?;
            let trigger = if operator.trim().is_empty() {
                RetryTrigger::Auto
            } else {
                RetryTrigger::Manual { operator: operator.trim().to_string() }
            };
            report(manager.retry_flow(&id, trigger)?);
            Ok(())
        }
        "9" => replenish(pool),
        other => {
            println!("Opción inválida: {}", other);
            Ok(())
        }
    }
}

fn list(manager: &FlowManager) -> Result<()> {
    println!("\nID                                   | TIPO                       | ESTADO     | CREADOR");
    println!("------------------------------------------------------------------------------------------");
    for t in manager.list_tickets()? {
        println!("{} | {:<26} | {:<10} | {}", t.id, t.ticket_type, t.status.as_str(), t.creator);
    }
    Ok(())
}

fn create(manager: &FlowManager) -> Result<()> {
    println!("Tipos:");
    for tt in TicketType::ALL {
        println!("  {:<26} {}", tt.as_str(), tt.display_name());
    }
    let ticket_type: TicketType = prompt("Tipo: ")?.trim().parse()?;
    let creator = prompt("Creador: ")?;
    let bk_biz_id: i64 = prompt("Negocio (bk_biz_id): ")?.trim().parse().context("bk_biz_id inválido")?;
    let details_s = prompt("Detalles (JSON): ")?;
    let details: serde_json::Value = serde_json::from_str(details_s.trim()).context("detalles no son JSON")?;
    let ticket = manager.create_ticket(NewTicketRequest::new(ticket_type, creator.trim(), bk_biz_id, details))?;
    println!("Ticket creado: {}", ticket.id);
    Ok(())
}

fn replenish(pool: &InMemoryResourcePool) -> Result<()> {
    let n: usize = prompt("Máquinas a añadir: ")?.trim().parse().context("número inválido")?;
    let first_id = NEXT_HOST_ID.fetch_add(n as i64, Ordering::SeqCst);
    pool.add_hosts(InMemoryResourcePool::generate_hosts(n, 0, first_id));
    println!("Pool con {} máquinas libres", pool.available_count());
    Ok(())
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}

fn prompt_uuid(msg: &str) -> Result<Uuid> {
    let s = prompt(msg)?;
    Uuid::parse_str(s.trim()).map_err(|_| anyhow!("UUID inválido: {}", s.trim()))
}

fn prompt_yes(msg: &str) -> io::Result<bool> {
    Ok(prompt(msg)?.trim().eq_ignore_ascii_case("yes"))
}
