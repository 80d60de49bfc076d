//! Delivery pipeline: one subscriber, one text message, at most one audio clip.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::content::{ContentResult, GenerationEngine};
use crate::scheduler::SubscriberId;
use crate::speech::{AudioArtifact, SpeechAdapter};
use crate::Result;

pub const AUDIO_CAPTION: &str = "🎧 Versi suara motivasi jam ini";

/// Outbound messaging sink (chat platform). Delivery guarantees are the transport's own.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_text(&self, subscriber: SubscriberId, text: &str) -> Result<()>;

    async fn send_audio(
        &self,
        subscriber: SubscriberId,
        audio: &AudioArtifact,
        caption: &str,
    ) -> Result<()>;

    async fn send_typing(&self, subscriber: SubscriberId) -> Result<()>;
}

/// Anything the scheduler can fire for a subscriber
#[async_trait]
pub trait DeliveryTarget: Send + Sync {
    /// Best-effort; must never panic or surface errors to the timer
    async fn deliver(&self, subscriber: SubscriberId);
}

/// Generate → send text → synthesize → send audio → release artifact
pub struct DeliveryPipeline {
    engine: Arc<GenerationEngine>,
    speech: SpeechAdapter,
    transport: Arc<dyn MessageTransport>,
}

impl DeliveryPipeline {
    pub fn new(
        engine: Arc<GenerationEngine>,
        speech: SpeechAdapter,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            engine,
            speech,
            transport,
        }
    }

    pub fn engine(&self) -> &Arc<GenerationEngine> {
        &self.engine
    }

    /// Deliver already generated content
    pub async fn deliver_content(&self, subscriber: SubscriberId, content: &ContentResult) {
        let text = format_message(content);
        if let Err(e) = self.transport.send_text(subscriber, &text).await {
            error!(target = "delivery", subscriber = %subscriber, error = %e, "Text send failed; skipping audio");
            return;
        }

        let artifact = match self.speech.render(&content.script).await {
            Ok(a) => a,
            Err(e) => {
                warn!(target = "delivery", subscriber = %subscriber, error = %e, "Synthesis failed; delivered text only");
                return;
            }
        };

        let sent = self
            .transport
            .send_audio(subscriber, &artifact, AUDIO_CAPTION)
            .await;
        // released whether or not the upload worked
        let path = artifact.release();
        match sent {
            Ok(()) => debug!(target = "delivery", subscriber = %subscriber, path = ?path, "Audio sent"),
            Err(e) => error!(target = "delivery", subscriber = %subscriber, error = %e, "Audio send failed"),
        }
    }
}

#[async_trait]
impl DeliveryTarget for DeliveryPipeline {
    async fn deliver(&self, subscriber: SubscriberId) {
        let start = Instant::now();
        if let Err(e) = self.transport.send_typing(subscriber).await {
            debug!(target = "delivery", subscriber = %subscriber, error = %e, "Typing indicator failed");
        }

        let content = self.engine.generate().await;
        self.deliver_content(subscriber, &content).await;

        info!(
            target = "delivery",
            subscriber = %subscriber,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Delivery finished"
        );
    }
}

/// Chat text for a delivery (Telegram HTML). The script is never shown.
pub fn format_message(content: &ContentResult) -> String {
    format!(
        "🔔 <b>Pengingat Jam Ini</b>\n\n💡 <b>Insight:</b>\n{}\n\n🎯 <b>Aksi 15 Menit:</b>\n{}",
        escape_html(&content.insight),
        escape_html(&content.action)
    )
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
