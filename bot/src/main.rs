mod commands;
mod config;
mod telegram;

use std::sync::Arc;
use std::time::Duration;

use commands::CommandHandler;
use config::BotConfig;
use semangat_core::{
    CatalogHandle, CliSpeechSynthesizer, DeliveryPipeline, GeminiClient, GenerationEngine,
    MessageTransport, Scheduler, SpeechAdapter,
};
use telegram::TelegramClient;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,semangat_core=info,semangat_bot=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(target = "semangat", "Starting Zona Semangat: Gemini → text → voice, every hour");

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = BotConfig::load();
    let missing = cfg.missing_credentials();
    if !missing.is_empty() {
        error!(target = "semangat", missing = ?missing, "Required credentials are not set");
        return Err(format!("missing credentials: {}", missing.join(", ")).into());
    }

    // 1) Model catalog, discovered once at startup
    let gemini = Arc::new(GeminiClient::new(cfg.gemini.clone())?);
    let catalog = CatalogHandle::new(cfg.gemini.default_model.clone());
    let initial = catalog.refresh(gemini.as_ref()).await;
    info!(
        target = "semangat",
        models = initial.len(),
        degraded = initial.is_degraded(),
        "Model catalog ready"
    );

    // 2) Generation engine over the catalog
    let engine = Arc::new(
        GenerationEngine::new(gemini, catalog, cfg.gemini.temperature)
            .with_topics(cfg.topics.clone()),
    );

    // 3) Speech via local CLI engines
    let synthesizer = Arc::new(CliSpeechSynthesizer::new(Some(cfg.speech.clone())));
    let speech = SpeechAdapter::new(
        synthesizer,
        cfg.speech.temp_dir.clone(),
        cfg.speech.voice.clone(),
    );

    // 4) Telegram transport; getMe fails fast on a bad token
    let telegram = Arc::new(TelegramClient::new(&cfg.telegram)?);
    let me = telegram.get_me().await?;
    info!(target = "semangat", bot = ?me.username, "Connected to Telegram");

    // 5) Delivery pipeline + scheduler
    let transport: Arc<dyn MessageTransport> = telegram.clone();
    let pipeline = Arc::new(DeliveryPipeline::new(Arc::clone(&engine), speech, transport));
    let scheduler = Arc::new(Scheduler::new(pipeline, &cfg.schedule)?);

    let handler = Arc::new(CommandHandler::new(
        Arc::clone(&scheduler),
        engine,
        Arc::clone(&telegram),
        me.username.clone(),
        cfg.telegram.admin_chat_id,
    ));

    info!(target = "semangat", "Bot siap menebar semangat! 🚀");

    // Ctrl+C handler to shutdown gracefully
    tokio::select! {
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                error!(target = "semangat", error = %e, "Failed to listen for Ctrl+C");
            }
            info!(target = "semangat", "Shutting down...");
        }
        _ = poll_updates(telegram, handler) => {}
    }

    scheduler.shutdown();
    Ok(())
}

/// Long-poll Telegram forever, handing each message to the command handler
async fn poll_updates(telegram: Arc<TelegramClient>, handler: Arc<CommandHandler>) {
    let mut offset = 0_i64;
    loop {
        match telegram.get_updates(offset).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if let Some(msg) = update.message {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            handler.handle(&msg).await;
                        });
                    }
                }
            }
            Err(e) => {
                warn!(target = "telegram", error = %e, "Polling failed; retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}
