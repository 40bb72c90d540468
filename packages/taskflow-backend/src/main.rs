#[tokio::main]
async fn main() {
    if let Err(e) = taskflow_backend::run().await {
        log::error!("taskflow-backend failed: {}", e);
        std::process::exit(1);
    }
}
