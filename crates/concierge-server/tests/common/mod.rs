//! Shared test fixtures: an app wired to a temp database and fake
//! agent/voice collaborators.

use async_trait::async_trait;
use axum::Router;
use concierge_agent::{Agent, AgentError};
use concierge_db::{create_pool, DbPool, DbRuntimeSettings};
use concierge_server::{app, AppState};
use concierge_voice::{
    RecognizerFactory, RecognizerSession, Transcriber, TranscriptEvent, VoiceError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Records every (input, history) pair the orchestrator passes in and
/// answers with a canned reply.
pub struct FakeAgent {
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
    pub reply: String,
    pub fail: AtomicBool,
}

impl FakeAgent {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply: reply.to_string(),
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Agent for FakeAgent {
    async fn respond(&self, input: &str, history: &[String]) -> Result<String, AgentError> {
        self.calls
            .lock()
            .unwrap()
            .push((input.to_string(), history.to_vec()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(AgentError::Invocation("fake agent down".to_string()));
        }
        Ok(self.reply.clone())
    }
}

pub struct FakeTranscriber {
    pub text: String,
    pub fail: bool,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe_source(&self) -> Result<String, VoiceError> {
        if self.fail {
            return Err(VoiceError::Transcription("fake provider error".to_string()));
        }
        Ok(self.text.clone())
    }
}

/// Records audio chunks forwarded by the bridge.
pub struct FakeRecognizerSession {
    pub chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    pub closed: Arc<AtomicBool>,
    transcript_tx: broadcast::Sender<TranscriptEvent>,
}

#[async_trait]
impl RecognizerSession for FakeRecognizerSession {
    async fn send_audio(&mut self, audio: &[u8]) -> Result<(), VoiceError> {
        self.chunks.lock().unwrap().push(audio.to_vec());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn transcripts(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.transcript_tx.subscribe()
    }
}

pub struct FakeRecognizerFactory {
    pub chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    pub closed: Arc<AtomicBool>,
}

impl FakeRecognizerFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            chunks: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl RecognizerFactory for FakeRecognizerFactory {
    async fn open(&self) -> Result<Box<dyn RecognizerSession>, VoiceError> {
        let (transcript_tx, _) = broadcast::channel(16);
        Ok(Box::new(FakeRecognizerSession {
            chunks: self.chunks.clone(),
            closed: self.closed.clone(),
            transcript_tx,
        }))
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub agent: Arc<FakeAgent>,
    pub recognizer_factory: Arc<FakeRecognizerFactory>,
    // Keeps the backing database file alive for the test's duration.
    _db_file: tempfile::NamedTempFile,
}

/// Builds an app over a migrated temp-file database and fake collaborators.
///
/// A file-backed database (not `:memory:`) so every pooled connection sees
/// the same data.
pub fn test_app(agent_reply: &str) -> TestApp {
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let db_path = db_file.path().to_str().unwrap();
    let pool = create_pool(db_path, DbRuntimeSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        concierge_db::run_migrations(&conn).unwrap();
    }

    let agent = FakeAgent::new(agent_reply);
    let recognizer_factory = FakeRecognizerFactory::new();

    let state = AppState {
        pool: pool.clone(),
        agent: agent.clone(),
        transcriber: Arc::new(FakeTranscriber {
            text: "hello from the fake transcriber".to_string(),
            fail: false,
        }),
        recognizer_factory: recognizer_factory.clone(),
        public_host: "concierge.test".to_string(),
    };

    TestApp {
        router: app(state),
        pool,
        agent,
        recognizer_factory,
        _db_file: db_file,
    }
}
