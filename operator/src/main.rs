pub use controller::*;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Responder, get, middleware, web::Data};

#[get("/metrics")]
async fn metrics(c: Data<Manager>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    HttpResponse::Ok()
        .content_type("application/openmetrics-text; version=1.0.0; charset=utf-8")
        .body(metrics)
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<Manager>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = OperatorConfig::from_env()?;

    // Setup tracing layers
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (text, json) = if config.log_json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };
    Registry::default().with(text).with(json).with(env_filter).try_init()?;

    // Start kubernetes controller
    let listen_addr = config.listen_addr.clone();
    let (manager, controller, cache) = Manager::new(config).await?;

    // Start web server
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(manager.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
    })
    .bind(&listen_addr)?
    .shutdown_timeout(5);

    tokio::select! {
        _ = controller => tracing::warn!("Tenant controller exited"),
        _ = cache => tracing::warn!("ConfigMap cache exited"),
        _ = server.run() => tracing::info!("actix exited"),
    }
    Ok(())
}
