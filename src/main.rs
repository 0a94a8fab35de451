//! Service Dispatch - Axum Server

use std::net::SocketAddr;

/// Listen address when `DISPATCH_ADDR` is unset.
const DEFAULT_ADDR: &str = "0.0.0.0:7860";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    service_dispatch::console::init_tracing()?;

    service_dispatch::console::print_banner();

    let addr: SocketAddr = std::env::var("DISPATCH_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    let app = service_dispatch::api::create_router();
    println!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
