use order_server::{Config, Server, ServerState, init_logger_from_env, print_banner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment and logging
    dotenv::dotenv().ok();
    init_logger_from_env();

    print_banner();
    tracing::info!("Order server starting...");

    // 2. Configuration
    let config = Config::from_env()?;

    // 3. State: store, directory, bus, lifecycle engine
    let state = ServerState::initialize(&config)?;

    // 4. HTTP + WebSocket
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
