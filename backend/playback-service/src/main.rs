/// Playback Service - HTTP Server
///
/// Serves the catalog, playback resolution, and the license and stream
/// proxies for the web and mobile surfaces.
use actix_middleware::MetricsMiddleware;
use actix_web::{App, HttpServer};
use anyhow::Result;
use playback_service::config::LogFormat;
use playback_service::{routes, startup, Config};
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Tracing first, so configuration warnings are not lost
    startup::init_tracing(LogFormat::from_env());
    let config = Config::from_env()?;

    tracing::info!(env = %config.app.env, "Starting playback-service");

    let (state, deps) = startup::build(&config).await?;
    let bind_address = (config.app.host.clone(), config.app.port);

    tracing::info!("HTTP server listening on {}:{}", bind_address.0, bind_address.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(MetricsMiddleware)
            .wrap(TracingLogger::default())
            .configure(|cfg| routes::configure(cfg, &deps))
    })
    .bind(bind_address)?
    .run()
    .await?;

    tracing::info!("Playback-service shutting down");
    Ok(())
}
