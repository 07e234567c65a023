//! crud-scaffold server: loads `.env` and environment settings, builds the store and
//! services, and serves the `/samples` API plus the common routes.

use crud_scaffold::{build_router, build_state, init_tracing, AppConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing("crud_scaffold=info,tower_http=info");

    let address = config.bind_address();
    let state = build_state(config).await?;
    let app = build_router(state);

    let listener = TcpListener::bind(&address).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
