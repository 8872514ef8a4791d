//! services/bot/src/bin/feedback_bot.rs

use bot_lib::{
    adapters::{EmployeeDirectory, FeedbackStore, TelegramTransport},
    bot::{dispatcher, AppState, ConversationEngine},
    config::Config,
    error::BotError,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), BotError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting feedback bot...");

    // --- 2. Open Storage ---
    info!("Opening feedback storage at {}", config.feedback_path.display());
    let feedback = Arc::new(FeedbackStore::open(config.feedback_path.clone()).await?);

    let directory = Arc::new(EmployeeDirectory::new(config.employees_path.clone()));
    // A broken employee file must not keep the bot from starting; lookups report it.
    if let Err(e) = directory.ensure_loaded().await {
        warn!(
            "Employee data at {} could not be loaded: {}",
            config.employees_path.display(),
            e
        );
    }

    // --- 3. Connect the Chat Transport ---
    let transport = Arc::new(TelegramTransport::new(
        &config.telegram_api_url,
        &config.bot_token,
        config.poll_timeout_secs,
    )?);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        feedback,
        directory,
        conversations: Arc::new(ConversationEngine::new()),
    });

    // --- 5. Run Until Ctrl-C ---
    let shutdown = CancellationToken::new();
    let mut dispatcher = tokio::spawn(dispatcher::run(app_state, transport, shutdown.clone()));
    info!("Bot is running. Admin chat: {}", config.admin_chat_id);

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Ctrl-C received. Shutting down...");
        }
        result = &mut dispatcher => {
            error!("Dispatcher exited unexpectedly.");
            return result.map_err(|e| BotError::Internal(format!("Dispatcher task failed: {}", e)));
        }
    }

    shutdown.cancel();
    dispatcher
        .await
        .map_err(|e| BotError::Internal(format!("Dispatcher task failed: {}", e)))?;
    info!("Shutdown complete.");

    Ok(())
}
