use crate::components::google_calendar::token::TokenManager;
use crate::components::google_calendar::{CalendarApi, GoogleCalendarHandle};
use crate::components::scheduling::BookingService;
use crate::config::Config;
use crate::error::Error;
use crate::shutdown;
use crate::tools::Toolbox;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, RwLock};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub async fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Wire the components together and serve tool calls from the agent
/// runtime: one JSON request per stdin line, one JSON response per
/// stdout line.
pub async fn serve(config: Arc<RwLock<Config>>) -> miette::Result<()> {
    let (tz, title) = {
        let config_read = config.read().await;
        (config_read.tz()?, config_read.appointment_title.clone())
    };

    let token_manager = TokenManager::new(Arc::clone(&config));
    let calendar_handle = GoogleCalendarHandle::new(Arc::clone(&config), token_manager);
    let calendar: Arc<dyn CalendarApi> = Arc::new(calendar_handle.clone());
    let booking = Arc::new(BookingService::new(Arc::clone(&calendar), tz, title));
    let toolbox = Toolbox::new(calendar, booking, tz);

    // Create shutdown channel and spawn the signal handler
    let (shutdown_send, shutdown_recv) = oneshot::channel();
    tokio::spawn(shutdown::handle_signals(shutdown_send, calendar_handle));

    info!("Tool server ready; reading requests from stdin");

    let serve_task = async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await.map_err(Error::from)? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = toolbox.handle_line(line).await;
            let mut payload = serde_json::to_vec(&response).map_err(Error::from)?;
            payload.push(b'\n');
            stdout.write_all(&payload).await.map_err(Error::from)?;
            stdout.flush().await.map_err(Error::from)?;
        }

        info!("Input closed; tool server stopping");
        Ok::<(), Error>(())
    };

    // Wait for either the input stream to end or a shutdown signal
    tokio::select! {
        result = serve_task => {
            match result {
                Ok(()) => Ok(()),
                Err(e) => {
                    error!("Tool server error: {:?}", e);
                    Err(e.into())
                }
            }
        }
        _ = shutdown_recv => {
            info!("Received shutdown signal, stopping tool server");
            Ok(())
        }
    }
}
