#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use url::Url;
use uuid::Uuid;
use veml_loader::{
    Collaborators, CreateEntityRequest, CreationTicket, DocumentLoader, EntityHandle,
    EntityRuntime, InputManager, LoaderConfig, LogEnvelope, LogForwardLayer, MemoryFetcher,
    MemoryStore, ResolvedBackground, ScriptEngine, SynchronizationManager, SynchronizerBinding,
};
use veml_runtime::{Effects, SyncTransport, SynchronizerEndpoint};

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixtures_dir().join("test_loader_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test loader config at {}",
            config_path.display()
        );

        std::env::set_var(veml_loader::LOADER_CONFIG_ENV, &config_path);
    });
}

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {err}", path.display()))
}

/// Every per-revision fixture with the label it declares, oldest first.
pub fn version_fixtures() -> Vec<(&'static str, String)> {
    [
        ("1.0", "v1_0.json"),
        ("1.1", "v1_1.json"),
        ("1.2", "v1_2.json"),
        ("1.3", "v1_3.json"),
        ("1.4", "v1_4.json"),
        ("2.0", "v2_0.json"),
        ("2.1", "v2_1.json"),
        ("2.2", "v2_2.json"),
        ("2.3", "v2_3.json"),
        ("2.4", "v2_4.json"),
        ("3.0", "v3_0.json"),
    ]
    .into_iter()
    .map(|(label, name)| (label, fixture(name)))
    .collect()
}

pub fn url(text: &str) -> Url {
    Url::parse(text).expect("test URL")
}

/// Installs a log capture layer for the current thread.
pub fn capture_logs() -> (tracing::subscriber::DefaultGuard, Receiver<LogEnvelope>) {
    let (layer, receiver) = LogForwardLayer::channel();
    let subscriber = tracing_subscriber::registry().with(layer);
    (tracing::subscriber::set_default(subscriber), receiver)
}

pub fn warnings(receiver: &Receiver<LogEnvelope>) -> Vec<LogEnvelope> {
    receiver.try_iter().filter(LogEnvelope::is_warning).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Immediate,
    Never,
}

/// Host double recording every call the loader makes.
#[derive(Debug)]
pub struct RecordingHost {
    completion: Completion,
    /// Tags whose creation is never reported complete.
    stalled: HashSet<String>,
    /// Tags that report completion but cannot be looked up afterwards.
    unfindable: HashSet<String>,
    /// Tags whose ticket is dropped, reporting a failed creation.
    failed: HashSet<String>,
    next_handle: AtomicU64,
    handles: Mutex<HashMap<Uuid, EntityHandle>>,
    held: Mutex<Vec<CreationTicket>>,
    pub created: Mutex<Vec<CreateEntityRequest>>,
    pub parents: Mutex<Vec<(EntityHandle, Option<EntityHandle>)>>,
    pub revealed: Mutex<Vec<EntityHandle>>,
    pub backgrounds: Mutex<Vec<ResolvedBackground>>,
    pub scripts: Mutex<Vec<String>>,
    pub inputs: Mutex<Vec<(String, String)>>,
    pub synchronizers: Mutex<Vec<(String, SynchronizerEndpoint, SyncTransport)>>,
    sessions: Mutex<HashMap<String, SynchronizerBinding>>,
}

impl RecordingHost {
    pub fn new(completion: Completion) -> Self {
        Self {
            completion,
            stalled: HashSet::new(),
            unfindable: HashSet::new(),
            failed: HashSet::new(),
            next_handle: AtomicU64::new(1),
            handles: Mutex::new(HashMap::new()),
            held: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            parents: Mutex::new(Vec::new()),
            revealed: Mutex::new(Vec::new()),
            backgrounds: Mutex::new(Vec::new()),
            scripts: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
            synchronizers: Mutex::new(Vec::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn stalling(mut self, tag: &str) -> Self {
        self.stalled.insert(tag.to_string());
        self
    }

    pub fn losing(mut self, tag: &str) -> Self {
        self.unfindable.insert(tag.to_string());
        self
    }

    pub fn failing(mut self, tag: &str) -> Self {
        self.failed.insert(tag.to_string());
        self
    }

    pub fn created_tags(&self) -> Vec<String> {
        self.created.lock().iter().map(|r| r.tag.clone()).collect()
    }

    pub fn request(&self, tag: &str) -> Option<CreateEntityRequest> {
        self.created.lock().iter().find(|r| r.tag == tag).cloned()
    }

    pub fn handle_of(&self, id: Uuid) -> Option<EntityHandle> {
        self.handles.lock().get(&id).copied()
    }
}

impl EntityRuntime for RecordingHost {
    fn create_entity(&self, request: CreateEntityRequest, ticket: CreationTicket) {
        let handle = EntityHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let tag = request.tag.clone();
        if !self.unfindable.contains(&tag) {
            self.handles.lock().insert(request.id, handle);
        }
        self.created.lock().push(request);
        if self.failed.contains(&tag) {
            drop(ticket);
        } else if self.completion == Completion::Never || self.stalled.contains(&tag) {
            self.held.lock().push(ticket);
        } else {
            ticket.complete();
        }
    }

    fn find_entity(&self, id: Uuid) -> Option<EntityHandle> {
        self.handle_of(id)
    }

    fn set_parent(&self, entity: EntityHandle, parent: Option<EntityHandle>) {
        self.parents.lock().push((entity, parent));
    }

    fn set_visible(&self, entity: EntityHandle, visible: bool) {
        if visible {
            self.revealed.lock().push(entity);
        }
    }

    fn apply_background(&self, background: ResolvedBackground, _effects: &Effects) {
        self.backgrounds.lock().push(background);
    }
}

impl ScriptEngine for RecordingHost {
    fn run(&self, source: &str) {
        self.scripts.lock().push(source.to_string());
    }
}

impl InputManager for RecordingHost {
    fn register_input_event(&self, input: &str, event_template: &str) {
        self.inputs
            .lock()
            .push((input.to_string(), event_template.to_string()));
    }
}

impl SynchronizationManager for RecordingHost {
    fn add_synchronizer_and_session(
        &self,
        id: &str,
        endpoint: &SynchronizerEndpoint,
        transport: SyncTransport,
        session: &str,
    ) {
        self.synchronizers
            .lock()
            .push((id.to_string(), endpoint.clone(), transport));
        self.sessions.lock().insert(
            id.to_string(),
            SynchronizerBinding {
                synchronizer: id.to_string(),
                session: session.to_string(),
            },
        );
    }

    fn get_synchronizer_and_session(&self, name: &str) -> Option<SynchronizerBinding> {
        self.sessions.lock().get(name).cloned()
    }
}

/// A loader wired to `host`, serving resources from `fetcher`.
pub struct Harness {
    pub host: Arc<RecordingHost>,
    pub fetcher: Arc<MemoryFetcher>,
    pub store: Arc<MemoryStore>,
    pub loader: DocumentLoader,
}

impl Harness {
    pub fn new(host: RecordingHost) -> Self {
        Self::with_config(host, LoaderConfig::default().with_timeout(Duration::from_secs(10)))
    }

    pub fn with_config(host: RecordingHost, config: LoaderConfig) -> Self {
        let host = Arc::new(host);
        let fetcher = Arc::new(MemoryFetcher::new());
        let store = Arc::new(MemoryStore::new());
        let collaborators = Collaborators {
            fetcher: fetcher.clone(),
            store: store.clone(),
            runtime: host.clone(),
            scripts: host.clone(),
            input: host.clone(),
            sync: host.clone(),
        };
        let loader = DocumentLoader::new(Arc::new(config), collaborators);
        Self {
            host,
            fetcher,
            store,
            loader,
        }
    }

    pub fn serve(&self, uri: &str, body: impl Into<Vec<u8>>) -> Url {
        let uri = url(uri);
        self.fetcher.insert(&uri, body);
        uri
    }
}
