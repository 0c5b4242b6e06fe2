use atelier_server::{setup_environment, Config, Server, ServerState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Environment (dotenv, logging)
    setup_environment()?;

    tracing::info!("Atelier back-office starting...");

    // 2. Configuration
    let config = Config::from_env();

    // 3. Server state (storage, tokens, mailer)
    let state = ServerState::initialize(&config)?;

    // 4. HTTP server (background tasks start inside run)
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
