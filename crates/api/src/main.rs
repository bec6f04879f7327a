use std::sync::Arc;

#[tokio::main]
async fn main() {
    shopcart_observability::init();

    let services = Arc::new(shopcart_api::app::services::build_services().await);

    let runner = shopcart_api::app::services::spawn_task_runner(
        &services,
        tokio::runtime::Handle::current(),
    )
    .expect("failed to spawn task runner");

    let app = shopcart_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();

    runner.shutdown();
}
