use async_trait::async_trait;
use semangat_core::delivery::{DeliveryTarget, AUDIO_CAPTION};
use semangat_core::{
    AudioArtifact, CatalogHandle, DeliveryPipeline, GenerationEngine, GenerationError,
    GenerationProvider, MessageTransport, SemangatError, SpeechAdapter, SpeechSynthesizer,
    SubscriberId,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const VALID: &str = r#"{"insight":"Istirahat juga bagian dari kerja","action":"Minum segelas air","script":"NARASI: pelan pelan saja, kamu pasti bisa."}"#;

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Typing,
    Text(String),
    Audio { path: PathBuf, existed: bool, caption: String },
}

// Transport that records every outbound call in order
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    fail_text: bool,
    fail_audio: bool,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    fn audio_paths(&self) -> Vec<PathBuf> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Audio { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send_text(&self, _: SubscriberId, text: &str) -> semangat_core::Result<()> {
        self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
        if self.fail_text {
            return Err(SemangatError::TransportError("chat not found".into()));
        }
        Ok(())
    }

    async fn send_audio(
        &self,
        _: SubscriberId,
        audio: &AudioArtifact,
        caption: &str,
    ) -> semangat_core::Result<()> {
        self.sent.lock().unwrap().push(Sent::Audio {
            path: audio.path().to_path_buf(),
            existed: audio.path().exists(),
            caption: caption.to_string(),
        });
        if self.fail_audio {
            return Err(SemangatError::TransportError("upload rejected".into()));
        }
        Ok(())
    }

    async fn send_typing(&self, _: SubscriberId) -> semangat_core::Result<()> {
        self.sent.lock().unwrap().push(Sent::Typing);
        Ok(())
    }
}

struct FakeSynthesizer {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeSynthesizer {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &str) -> semangat_core::Result<Vec<u8>> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(SemangatError::SpeechError("engine crashed".into()));
        }
        Ok(b"RIFF....WAVEfmt ".to_vec())
    }
}

struct FixedProvider;

#[async_trait]
impl GenerationProvider for FixedProvider {
    async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        Ok(vec!["models/gemini-2.0-flash".into()])
    }

    async fn generate(&self, _: &str, _: &str, _: f32) -> Result<String, GenerationError> {
        Ok(VALID.to_string())
    }
}

fn pipeline(
    dir: &Path,
    transport: Arc<RecordingTransport>,
    synth: Arc<FakeSynthesizer>,
) -> DeliveryPipeline {
    let engine = GenerationEngine::new(
        Arc::new(FixedProvider),
        CatalogHandle::new("gemini-2.0-flash"),
        0.9,
    );
    DeliveryPipeline::new(
        Arc::new(engine),
        SpeechAdapter::new(synth, dir, "id"),
        transport,
    )
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn text_then_audio_and_nothing_left_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let synth = Arc::new(FakeSynthesizer::new(false));
    let pipeline = pipeline(dir.path(), Arc::clone(&transport), Arc::clone(&synth));

    pipeline.deliver(SubscriberId(42)).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0], Sent::Typing);
    assert!(matches!(sent[1], Sent::Text(_)));
    match &sent[2] {
        Sent::Audio { existed, caption, .. } => {
            assert!(*existed);
            assert_eq!(caption, AUDIO_CAPTION);
        }
        other => panic!("expected audio, got {other:?}"),
    }
    assert!(dir_is_empty(dir.path()));
    assert_eq!(synth.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn synthesis_failure_still_delivers_text() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = pipeline(
        dir.path(),
        Arc::clone(&transport),
        Arc::new(FakeSynthesizer::new(true)),
    );

    pipeline.deliver(SubscriberId(7)).await;

    assert_eq!(transport.texts().len(), 1);
    assert!(transport.audio_paths().is_empty());
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn failed_audio_send_still_removes_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport {
        fail_audio: true,
        ..Default::default()
    });
    let pipeline = pipeline(
        dir.path(),
        Arc::clone(&transport),
        Arc::new(FakeSynthesizer::new(false)),
    );

    pipeline.deliver(SubscriberId(7)).await;

    let paths = transport.audio_paths();
    assert_eq!(paths.len(), 1);
    assert!(!paths[0].exists());
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn failed_text_send_skips_synthesis() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport {
        fail_text: true,
        ..Default::default()
    });
    let synth = Arc::new(FakeSynthesizer::new(false));
    let pipeline = pipeline(dir.path(), Arc::clone(&transport), Arc::clone(&synth));

    pipeline.deliver(SubscriberId(7)).await;

    assert!(transport.audio_paths().is_empty());
    assert!(synth.calls.lock().unwrap().is_empty());
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn script_is_spoken_but_never_shown() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let synth = Arc::new(FakeSynthesizer::new(false));
    let pipeline = pipeline(dir.path(), Arc::clone(&transport), Arc::clone(&synth));

    pipeline.deliver(SubscriberId(1)).await;

    let text = &transport.texts()[0];
    assert!(text.contains("Istirahat juga bagian dari kerja"));
    assert!(text.contains("Minum segelas air"));
    assert!(!text.contains("NARASI"));
    assert!(synth.calls.lock().unwrap()[0].contains("NARASI"));
}
