use std::error::Error;
use std::sync::Arc;

use dotenv::dotenv;
use setup::tracing::init_tracing;
use signin::config::Config;
use signin::{SERVICE_NAME, authenticator, router};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    init_tracing(SERVICE_NAME)?;

    let cfg = Config::from_env()?;
    let authenticator = authenticator(&cfg)?;
    let router = router(Arc::new(authenticator));

    let listener = TcpListener::bind(("0.0.0.0", cfg.port)).await?;
    info!(addr = %listener.local_addr()?, client_id = %cfg.client_id, "listening");

    axum::serve(listener, router).await?;

    Ok(())
}
