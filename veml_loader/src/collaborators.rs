//! Narrow interfaces to everything the loader does not own: transport,
//! local storage, the entity runtime, script execution, input and
//! synchronization.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;
use uuid::Uuid;
use veml_runtime::{Grid, SyncTransport, SynchronizerEndpoint};
use veml_schema::{Effects, EntityKind, PlacementSocket, ProceduralSky, Rgba, Transform};

use crate::pending::CreationTicket;

pub const STATUS_OK: u16 = 200;
pub const STATUS_NOT_FOUND: u16 = 404;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: STATUS_OK,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: STATUS_NOT_FOUND,
            body: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{uri} returned status {status}")]
    Status { uri: Url, status: u16 },
    #[error("unsupported scheme for {0}")]
    UnsupportedScheme(Url),
    #[error("transport failure for {uri}: {message}")]
    Transport { uri: Url, message: String },
}

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, uri: &Url) -> Result<FetchResponse, FetchError>;
}

/// Fetches `uri` and treats any status other than 200 as a failure.
pub async fn fetch_ok(fetcher: &dyn ResourceFetcher, uri: &Url) -> Result<Vec<u8>, FetchError> {
    let response = fetcher.fetch(uri).await?;
    if response.is_ok() {
        Ok(response.body)
    } else {
        Err(FetchError::Status {
            uri: uri.clone(),
            status: response.status,
        })
    }
}

/// URI-keyed byte cache consulted before fetching documents.
pub trait LocalStore: Send + Sync {
    fn contains(&self, uri: &Url) -> bool;
    fn read(&self, uri: &Url) -> Option<Vec<u8>>;
    fn write(&self, uri: &Url, bytes: &[u8]);
}

/// Opaque handle to a live entity in the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTerrain {
    pub heights: Option<Grid>,
    pub layer_masks: Vec<Grid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchronizerBinding {
    pub synchronizer: String,
    pub session: String,
}

/// Everything the runtime needs to instantiate one entity. Entities are
/// always created without a parent and hidden; the loader attaches and
/// reveals them once the whole document has been instantiated.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateEntityRequest {
    pub id: Uuid,
    pub tag: String,
    pub kind: EntityKind,
    pub transform: Transform,
    pub parentless: bool,
    pub visible: bool,
    pub placement_sockets: Vec<PlacementSocket>,
    /// Resource references of the payload, resolved against the document.
    pub resources: Vec<Url>,
    pub terrain: Option<DecodedTerrain>,
    pub synchronizer: Option<SynchronizerBinding>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedBackground {
    Solid(Rgba),
    Texture { uri: Url, bytes: Vec<u8> },
    Panorama { uri: Url, bytes: Vec<u8> },
    ProceduralSky(ProceduralSky),
}

pub trait EntityRuntime: Send + Sync {
    /// Starts instantiation. The runtime completes `ticket` once the entity
    /// exists and can be found by id; dropping it marks the creation failed.
    fn create_entity(&self, request: CreateEntityRequest, ticket: CreationTicket);
    fn find_entity(&self, id: Uuid) -> Option<EntityHandle>;
    fn set_parent(&self, entity: EntityHandle, parent: Option<EntityHandle>);
    fn set_visible(&self, entity: EntityHandle, visible: bool);
    fn apply_background(&self, background: ResolvedBackground, effects: &Effects);
}

pub trait ScriptEngine: Send + Sync {
    fn run(&self, source: &str);
}

pub trait InputManager: Send + Sync {
    fn register_input_event(&self, input: &str, event_template: &str);
}

pub trait SynchronizationManager: Send + Sync {
    fn add_synchronizer_and_session(
        &self,
        id: &str,
        endpoint: &SynchronizerEndpoint,
        transport: SyncTransport,
        session: &str,
    );
    fn get_synchronizer_and_session(&self, name: &str) -> Option<SynchronizerBinding>;
}

/// The set of host services one loader drives.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub store: Arc<dyn LocalStore>,
    pub runtime: Arc<dyn EntityRuntime>,
    pub scripts: Arc<dyn ScriptEngine>,
    pub input: Arc<dyn InputManager>,
    pub sync: Arc<dyn SynchronizationManager>,
}
