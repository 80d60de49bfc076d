//! Chat command surface: /start, /stop, /test and the admin-only /refresh.

use std::sync::Arc;

use tracing::{debug, info, warn};

use semangat_core::delivery::escape_html;
use semangat_core::{GenerationEngine, Scheduler, SubscriberId, UnsubscribeOutcome};

use crate::telegram::{Message, TelegramClient};

const NOT_SUBSCRIBED: &str = "Kamu belum berlangganan kok. Ketik /start untuk mulai! 😊";
const STOPPED: &str =
    "Oke, jadwal motivasi dimatikan. Kalau butuh semangat lagi, ketik /start ya! 👋";
const PREPARING: &str = "⏳ <i>Meracik kata-kata terbaik untukmu...</i>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Test,
    Refresh,
}

impl Command {
    /// Parse the leading `/command[@bot]` token of a message.
    ///
    /// A command addressed to a different bot is ignored.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let token = token.strip_prefix('/')?;
        let (name, addressee) = match token.split_once('@') {
            Some((name, bot)) => (name, Some(bot)),
            None => (token, None),
        };
        if let (Some(addressee), Some(me)) = (addressee, bot_username) {
            if !addressee.eq_ignore_ascii_case(me) {
                return None;
            }
        }
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "test" => Some(Self::Test),
            "refresh" => Some(Self::Refresh),
            _ => None,
        }
    }
}

pub fn welcome_text(first_name: &str, first_fire: &str) -> String {
    let name = if first_name.trim().is_empty() {
        "teman".to_string()
    } else {
        escape_html(first_name.trim())
    };
    format!(
        "👋 <b>Halo, {name}! Selamat datang di Zona Semangat!</b> 🌟\n\n\
         Senang banget kamu ada di sini. Mulai sekarang, aku bakal jadi teman setia yang ngirimin \
         booster energi positif buat kamu setiap jam. 🔋\n\n\
         Kiriman pertama datang pukul <b>{first_fire}</b>, lengkap dengan versi suaranya. 🎧\n\n\
         👇 <i>Menu Singkat:</i>\n\
         ✨ /test - Minta motivasi sekarang juga\n\
         🛑 /stop - Berhenti berlangganan"
    )
}

pub fn refresh_text(models: usize, degraded: bool) -> String {
    if degraded {
        format!("⚠️ Gagal scan model. Mode darurat dengan {models} model.")
    } else {
        format!("🔄 Katalog diperbarui: {models} model siap.")
    }
}

/// Routes parsed commands to the scheduler and replies through Telegram
pub struct CommandHandler {
    scheduler: Arc<Scheduler>,
    engine: Arc<GenerationEngine>,
    telegram: Arc<TelegramClient>,
    bot_username: Option<String>,
    admin_chat_id: Option<i64>,
}

impl CommandHandler {
    pub fn new(
        scheduler: Arc<Scheduler>,
        engine: Arc<GenerationEngine>,
        telegram: Arc<TelegramClient>,
        bot_username: Option<String>,
        admin_chat_id: Option<i64>,
    ) -> Self {
        Self {
            scheduler,
            engine,
            telegram,
            bot_username,
            admin_chat_id,
        }
    }

    pub async fn handle(&self, msg: &Message) {
        let Some(text) = msg.text.as_deref() else {
            return;
        };
        let Some(command) = Command::parse(text, self.bot_username.as_deref()) else {
            return;
        };
        let chat = SubscriberId(msg.chat.id);
        info!(
            target = "telegram",
            chat = %chat,
            message_id = msg.message_id,
            user = ?msg.sender_id(),
            command = ?command,
            "Command received"
        );

        match command {
            Command::Start => {
                let outcome = self.scheduler.subscribe(chat);
                let first_name = msg.from.as_ref().map(|u| u.first_name.as_str()).unwrap_or("");
                let first_fire = outcome.schedule.next_fire.format("%H:%M").to_string();
                self.reply(chat, &welcome_text(first_name, &first_fire)).await;
            }
            Command::Stop => match self.scheduler.unsubscribe(chat) {
                UnsubscribeOutcome::Cancelled(_) => self.reply(chat, STOPPED).await,
                UnsubscribeOutcome::NothingToCancel => self.reply(chat, NOT_SUBSCRIBED).await,
            },
            Command::Test => {
                self.reply(chat, PREPARING).await;
                // runs detached; the poll loop keeps going
                let _ = self.scheduler.trigger_now(chat);
            }
            Command::Refresh => {
                if self.admin_chat_id != Some(chat.0) {
                    debug!(target = "telegram", chat = %chat, "Refresh ignored for non-admin chat");
                    return;
                }
                let provider = self.engine.provider();
                let catalog = self.engine.catalog().refresh(provider.as_ref()).await;
                self.reply(chat, &refresh_text(catalog.len(), catalog.is_degraded()))
                    .await;
            }
        }
    }

    async fn reply(&self, chat: SubscriberId, text: &str) {
        if let Err(e) = self.telegram.send_message(chat.0, text).await {
            warn!(target = "telegram", chat = %chat, error = %e, "Reply failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_commands() {
        assert_eq!(Command::parse("/start", None), Some(Command::Start));
        assert_eq!(Command::parse("  /stop now", None), Some(Command::Stop));
        assert_eq!(Command::parse("/TEST", None), Some(Command::Test));
        assert_eq!(Command::parse("/refresh", None), Some(Command::Refresh));
    }

    #[test]
    fn ignores_non_commands() {
        assert_eq!(Command::parse("halo", None), None);
        assert_eq!(Command::parse("/help", None), None);
        assert_eq!(Command::parse("", None), None);
    }

    #[test]
    fn handles_bot_suffix() {
        assert_eq!(
            Command::parse("/start@ZonaSemangatBot", Some("zonasemangatbot")),
            Some(Command::Start)
        );
        assert_eq!(Command::parse("/start@OtherBot", Some("ZonaSemangatBot")), None);
        assert_eq!(Command::parse("/stop@AnyBot", None), Some(Command::Stop));
    }

    #[test]
    fn welcome_escapes_name_and_shows_first_fire() {
        let text = welcome_text("<Budi>", "08:00");
        assert!(text.contains("Halo, &lt;Budi&gt;!"));
        assert!(text.contains("<b>08:00</b>"));
        assert!(text.contains("/stop"));
        assert!(welcome_text("  ", "09:00").contains("Halo, teman!"));
    }

    #[test]
    fn refresh_text_reports_mode() {
        assert!(refresh_text(5, false).contains("5 model"));
        assert!(refresh_text(1, true).contains("darurat"));
    }
}
