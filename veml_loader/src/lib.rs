//! Asynchronous application of VEML documents to a host runtime.
//!
//! [`DocumentLoader`] fetches a document, runs it through the `veml_runtime`
//! pipeline, and then drives the host collaborators: synchronizer and input
//! registration, background, hidden parentless entity creation, hierarchy
//! attachment, and finally scripts.

pub mod cancel;
pub mod collaborators;
pub mod config;
pub mod fetch;
pub mod log_stream;
pub mod metrics;
pub mod orchestrator;
pub mod pending;

pub use cancel::CancelToken;
pub use collaborators::{
    fetch_ok, Collaborators, CreateEntityRequest, DecodedTerrain, EntityHandle, EntityRuntime,
    FetchError, FetchResponse, InputManager, LocalStore, ResolvedBackground, ResourceFetcher,
    ScriptEngine, SynchronizationManager, SynchronizerBinding, STATUS_NOT_FOUND, STATUS_OK,
};
pub use config::{
    load_loader_config_from_env, DeploymentMode, LoaderConfig, LoaderConfigError,
    LoaderConfigMetadata, BUILTIN_LOADER_CONFIG, LOADER_CONFIG_ENV,
};
pub use fetch::{FileFetcher, MemoryFetcher, MemoryStore};
pub use log_stream::{LogEnvelope, LogForwardLayer};
pub use metrics::{LoadMetrics, LoadReport, LoadState};
pub use orchestrator::{DocumentLoader, LoadError};
pub use pending::{CreationTicket, PendingCreations};
