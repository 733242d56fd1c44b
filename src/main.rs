use std::env;
use std::sync::Arc;
use std::time::Duration;

use chatwarden::client::NullClient;
use chatwarden::handlers::Moderator;
use chatwarden::schedule::{ActionExecutor, Scheduler};
use chatwarden::{Data, Error, logging};
use tokio::sync::mpsc;
use tracing::info;

/// Interval between scheduler due-task sweeps
const SCHEDULER_TICK: Duration = Duration::from_secs(1);

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    // Initialize logging
    logging::init()?;

    // The transport adapter consumes the credential; the engine only
    // requires that it exists before starting.
    let _token =
        env::var("BOT_TOKEN").map_err(|_| "BOT_TOKEN not found in environment variables")?;

    // Wire the engine
    let data = Data::new();
    let scheduler = Scheduler::new();
    let moderator = Arc::new(Moderator::new(data, scheduler.clone(), NullClient::new()));

    scheduler.spawn(
        Arc::clone(&moderator) as Arc<dyn ActionExecutor>,
        SCHEDULER_TICK,
    );

    // The chat-client adapter feeds inbound events through this channel
    let (event_tx, event_rx) = mpsc::channel(256);
    let pipeline = {
        let moderator = Arc::clone(&moderator);
        tokio::spawn(async move { moderator.run(event_rx).await })
    };

    logging::log_console("chatwarden is running, press Ctrl-C to stop".to_string());
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    scheduler.shutdown().await;
    drop(event_tx);
    pipeline.await?;

    Ok(())
}

fn main() {
    // Run the async main function
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Error::from)
        .and_then(|runtime| runtime.block_on(async_main()));

    // A startup failure is fatal and must not look like a clean exit
    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
