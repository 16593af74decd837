//! Session lifecycle demo
//!
//! Usage:
//!   TOKEN_RENEWAL_BASE_URL=http://localhost:5000 \
//!   ACCESS_TOKEN=... REFRESH_TOKEN=... \
//!   cargo run --example session

use token_renewal_client::{
    ApiRequest, ClientConfig, CredentialManager, FileTokenStore, HttpTransport, SessionEvent,
    Transport,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::from_env()?;
    let state_path = std::env::var("SESSION_FILE").unwrap_or_else(|_| "session.toml".to_string());
    let resource = std::env::var("RESOURCE_PATH").unwrap_or_else(|_| "/api/profile".to_string());

    println!("=== Token Renewal Client Example ===");
    println!("API: {}", config.base_url);
    println!("Session file: {}", state_path);
    println!();

    let transport = HttpTransport::new(config.request_timeout())?;
    let store = FileTokenStore::open(&state_path)?;
    let manager = CredentialManager::new(config.clone(), transport, store)?;
    let mut events = manager.subscribe();

    // Hand over a fresh login if one was provided, otherwise resume the stored session
    match (std::env::var("ACCESS_TOKEN"), std::env::var("REFRESH_TOKEN")) {
        (Ok(access), Ok(refresh)) => {
            manager.establish_session(access, refresh, std::env::var("USER_ROLE").ok())
        }
        _ => manager.start(),
    }

    if !manager.is_authenticated() {
        println!("! No session. Provide ACCESS_TOKEN and REFRESH_TOKEN.");
        return Ok(());
    }
    println!("✓ Session active (role: {})", manager.role().unwrap_or_default());
    println!("  Scheduler: {:?}", manager.scheduler_state());
    println!();

    // Requests through the interceptor renew and retry on an expired token
    let client = manager.interceptor();
    let url = config.base_url.join(&resource)?;
    let response = client
        .send(manager.authorize(ApiRequest::get(url.as_str()))?)
        .await?;
    println!("GET {} -> {}", url, response.status);
    println!();

    println!("Waiting for session events (Ctrl+C to exit)...");
    while let Ok(event) = events.recv().await {
        match event {
            SessionEvent::Renewed => println!("✓ Access token renewed"),
            other => {
                println!("! Session ended: {:?}", other);
                break;
            }
        }
    }

    Ok(())
}
