use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use tempfile::TempDir;

use oidc_web::browser::MemoryBrowsingContext;
use oidc_web::rp::FakeRelyingParty;
use oidc_web::storage::{MemoryStorage, SqliteStorage, StorageMedium};
use oidc_web::{ClientOptions, OidcWebClient};

/// Memory medium that counts every access.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    reads: AtomicUsize,
    writes: AtomicUsize,
    clears: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn accesses(&self) -> usize {
        self.reads() + self.writes() + self.clears()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

impl StorageMedium for RecordingStorage {
    fn get_item(&self, key: &str) -> oidc_web::Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> oidc_web::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_item(key, value)
    }

    fn clear(&self) -> oidc_web::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}

/// Orchestrator wired to a fake relying party, a recording medium and an
/// in-memory browsing context at `location`.
#[allow(dead_code)]
pub struct Harness {
    pub client: OidcWebClient,
    pub rp: Arc<FakeRelyingParty>,
    pub storage: Arc<RecordingStorage>,
    pub browser: Arc<MemoryBrowsingContext>,
}

#[allow(dead_code)]
pub fn harness(location: &str, rp: FakeRelyingParty) -> Harness {
    let rp = Arc::new(rp);
    let storage = Arc::new(RecordingStorage::new());
    let browser = Arc::new(MemoryBrowsingContext::new(location));
    let client = OidcWebClient::new(
        ClientOptions::default(),
        rp.clone(),
        storage.clone(),
        browser.clone(),
    );
    Harness {
        client,
        rp,
        storage,
        browser,
    }
}

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("storage.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("oidc-web.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Unsigned compact JWT carrying `claims`.
#[allow(dead_code)]
pub fn encode_id_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims serialize"));
    format!("{header}.{payload}.c2ln")
}

/// In-memory sink for formatted log lines.
#[allow(dead_code)]
#[derive(Clone, Debug, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Installs a thread-local subscriber writing plain text into the returned
/// buffer. Events are captured until the guard is dropped, so the test must
/// run on a current-thread runtime.
#[allow(dead_code)]
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
