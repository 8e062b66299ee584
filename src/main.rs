use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use leave_desk::advisory::{Advisor, HttpAdvisor, StaticAdvisor};
use leave_desk::auth::session::SessionRegistry;
use leave_desk::config::Config;
use leave_desk::db::init_db;
use leave_desk::docs::ApiDoc;
use leave_desk::gateway::{HttpGateway, MySqlGateway, OfflineGateway, SyncGateway};
use leave_desk::model::Pin;
use leave_desk::routes;
use leave_desk::store::{LeaveDesk, Seed};
use leave_desk::utils::local_store::LocalStore;

#[get("/")]
async fn index(desk: Data<LeaveDesk>) -> impl Responder {
    let users = desk.read(|s| s.users.len());
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok", "users": users }))
}

async fn connect_gateway(config: &Config) -> anyhow::Result<Arc<dyn SyncGateway>> {
    if let Some(url) = &config.database_url {
        let pool = init_db(url).await.context("Failed to connect to database")?;
        return Ok(Arc::new(MySqlGateway::new(pool)));
    }
    if let Some(url) = &config.sync_base_url {
        let timeout = Duration::from_secs(config.sync_timeout_secs.max(1));
        return Ok(Arc::new(HttpGateway::new(url, timeout)?));
    }
    warn!("no durable store configured, running from the local fallback only");
    Ok(Arc::new(OfflineGateway))
}

fn build_advisor(config: &Config) -> anyhow::Result<Arc<dyn Advisor>> {
    Ok(match &config.advisory_url {
        Some(url) => Arc::new(HttpAdvisor::new(url, config.advisory_api_key.clone())?),
        None => Arc::new(StaticAdvisor),
    })
}

fn seed(config: &Config) -> anyhow::Result<Option<Seed>> {
    match (&config.bootstrap_admin_name, &config.bootstrap_admin_pin) {
        (Some(name), Some(pin)) => Ok(Some(Seed {
            name: name.clone(),
            pin: Pin::parse(pin.trim()).context("BOOTSTRAP_ADMIN_PIN")?,
        })),
        _ => Ok(None),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let gateway = connect_gateway(&config).await?;
    let local = LocalStore::new(&config.fallback_dir);
    let desk = LeaveDesk::bootstrap(gateway, Some(local), config.desk.clone(), seed(&config)?)
        .await
        .context("Failed to initialise the desk")?;
    let desk = Data::new(desk);

    let sessions = Data::new(SessionRegistry::new(
        config.desk.session_timeout,
        config.desk.session_warning,
    ));
    let advisor: Data<dyn Advisor> = Data::from(build_advisor(&config)?);

    // Clone values for the closure (avoid move issues)
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(desk.clone())
            .app_data(sessions.clone())
            .app_data(advisor.clone())
            .app_data(Data::new(config.clone()))
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
