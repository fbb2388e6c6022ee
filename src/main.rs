use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    deskbotti::startup::init_logging()?;

    info!("Starting deskbotti");

    // Load configuration
    let config = deskbotti::startup::load_config().await?;

    // Serve tool calls until the agent runtime hangs up
    deskbotti::startup::serve(config).await
}
