use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;
use veml_loader::{
    CreateEntityRequest, CreationTicket, EntityHandle, EntityRuntime, InputManager,
    ResolvedBackground, ScriptEngine, SynchronizationManager, SynchronizerBinding,
};
use veml_runtime::{Effects, SyncTransport, SynchronizerEndpoint};

/// A host that instantiates nothing: every creation succeeds immediately and
/// every other call is logged.
#[derive(Debug, Default)]
pub struct DryRunHost {
    next_handle: AtomicU64,
    entities: Mutex<HashMap<Uuid, EntityHandle>>,
    sessions: Mutex<HashMap<String, SynchronizerBinding>>,
}

impl DryRunHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityRuntime for DryRunHost {
    fn create_entity(&self, request: CreateEntityRequest, ticket: CreationTicket) {
        let handle = EntityHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        debug!(
            id = %request.id,
            tag = %request.tag,
            kind = request.kind.tag(),
            resources = request.resources.len() as u64,
            "dry_run.create"
        );
        self.entities.lock().insert(request.id, handle);
        ticket.complete();
    }

    fn find_entity(&self, id: Uuid) -> Option<EntityHandle> {
        self.entities.lock().get(&id).copied()
    }

    fn set_parent(&self, entity: EntityHandle, parent: Option<EntityHandle>) {
        debug!(entity = entity.0, parent = ?parent.map(|p| p.0), "dry_run.set_parent");
    }

    fn set_visible(&self, _entity: EntityHandle, _visible: bool) {}

    fn apply_background(&self, background: ResolvedBackground, _effects: &Effects) {
        let description = match &background {
            ResolvedBackground::Solid(color) => format!("solid {color:?}"),
            ResolvedBackground::Texture { uri, bytes } => {
                format!("texture {uri} ({} bytes)", bytes.len())
            }
            ResolvedBackground::Panorama { uri, bytes } => {
                format!("panorama {uri} ({} bytes)", bytes.len())
            }
            ResolvedBackground::ProceduralSky(_) => "procedural sky".to_string(),
        };
        info!(background = %description, "dry_run.background");
    }
}

impl ScriptEngine for DryRunHost {
    fn run(&self, source: &str) {
        info!(bytes = source.len() as u64, "dry_run.script");
    }
}

impl InputManager for DryRunHost {
    fn register_input_event(&self, input: &str, event_template: &str) {
        info!(input, event = event_template, "dry_run.input_event");
    }
}

impl SynchronizationManager for DryRunHost {
    fn add_synchronizer_and_session(
        &self,
        id: &str,
        endpoint: &SynchronizerEndpoint,
        transport: SyncTransport,
        session: &str,
    ) {
        info!(
            id,
            endpoint = %endpoint,
            transport = transport.as_str(),
            session,
            "dry_run.synchronizer"
        );
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
