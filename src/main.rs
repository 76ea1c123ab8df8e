use axum::serve;
use fake_service_broker::api::routes::build_app;
use fake_service_broker::broker_from_config;
use fake_service_broker::config::AppConfig;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Fake Service Broker");

    // Load configuration
    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );

    let broker = Arc::new(broker_from_config(&config)?);
    log::info!("Broker instance {}", broker.instance_id());

    run_server(build_app(broker), &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    println!("Fake service broker running on http://{}", bind_address);
    println!(
        "Behavior configuration available at http://{}/config",
        bind_address
    );

    serve(listener, app).await?;

    Ok(())
}
