#[tokio::main]
async fn main() {
    plasticflow_observability::init();

    let app = plasticflow_api::app::build_app();

    let addr =
        std::env::var("PLASTICFLOW_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    tracing::info!(addr = %addr, "plasticflow api listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited with error");
    }
}
