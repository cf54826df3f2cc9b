//! The document application state machine.
//!
//! One [`DocumentLoader::load`] call walks a document from its URI to a fully
//! attached entity hierarchy:
//!
//! `Idle → Downloading → Parsed → Migrated → Validated → ProcessingMetadata →
//! ProcessingEnvironment → WaitingForEntities → ApplyingHierarchy → Done`,
//! or `Failed` from any stage.
//!
//! Entity and script waits are bounded by the configured timeouts and proceed
//! with whatever finished. Hierarchy application either attaches every
//! completed entity or attaches nothing. Script and background fetches still
//! running when the load returns are aborted.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;
use veml_runtime::{
    assign_and_flatten, classify_background, decode_grid, decode_layer_masks, detect_version,
    migrate_to_canonical, named_color, parse_color, parse_sync_address, parse_sync_transport,
    resolve_reference, validate, BackgroundToken, DocumentError, EntityGraph, FlatEntity,
    FlattenError, ValidationError,
};
use veml_schema::{
    Background, CapabilityHints, Document, Effects, EntityKind, Metadata, Rgba, ScriptEntry,
    Transform,
};

use crate::cancel::CancelToken;
use crate::collaborators::{
    fetch_ok, Collaborators, CreateEntityRequest, DecodedTerrain, EntityHandle, FetchError,
    ResolvedBackground,
};
use crate::config::LoaderConfig;
use crate::metrics::{LoadMetrics, LoadReport, LoadState};
use crate::pending::PendingCreations;

const LOG_TARGET: &str = "veml::loader";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch document {uri}: {source}")]
    Fetch {
        uri: Url,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Flatten(#[from] FlattenError),
    #[error("entity '{tag}' ({id}) reported creation but cannot be found")]
    EntityResolution { id: Uuid, tag: String },
    #[error("load of {0} was cancelled")]
    Cancelled(Url),
}

pub struct DocumentLoader {
    config: Arc<LoaderConfig>,
    collaborators: Collaborators,
}

impl DocumentLoader {
    pub fn new(config: Arc<LoaderConfig>, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub async fn load(&self, uri: &Url, cancel: &CancelToken) -> Result<LoadReport, LoadError> {
        let mut run = LoadRun::new(uri.clone());
        match self.drive(&mut run, cancel).await {
            Ok(report) => Ok(report),
            Err(err) => {
                run.enter(LoadState::Failed);
                tracing::warn!(
                    target: LOG_TARGET,
                    uri = %uri,
                    error = %err,
                    "load.failed"
                );
                Err(err)
            }
        }
    }

    async fn drive(&self, run: &mut LoadRun, cancel: &CancelToken) -> Result<LoadReport, LoadError> {
        let uri = run.uri.clone();

        run.enter(LoadState::Downloading);
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoadError::Cancelled(uri.clone())),
            bytes = self.download(&uri, &mut run.metrics) => bytes?,
        };

        let versioned = detect_version(&bytes)?;
        let source_version = versioned.version;
        run.enter(LoadState::Parsed);
        tracing::debug!(target: LOG_TARGET, version = %source_version, "document.detected");

        let migration = migrate_to_canonical(versioned).map_err(DocumentError::from)?;
        for warning in &migration.warnings {
            tracing::warn!(target: "veml::migration", uri = %uri, "{warning}");
        }
        let warnings = migration.warnings;
        let mut document = migration.document;
        run.enter(LoadState::Migrated);

        let graph = assign_and_flatten(&mut document.environment.entities)?;
        validate(&document, &graph)?;
        run.enter(LoadState::Validated);

        let base = self.base_uri(&uri);

        run.check(cancel)?;
        run.enter(LoadState::ProcessingMetadata);
        let capabilities = self.process_metadata_registrations(&document.metadata, &mut run.metrics);
        let scripts = self.start_script_fetches(&document.metadata, &base);
        let mut in_flight = InFlight::default();
        in_flight.extend(scripts.iter().filter_map(ScriptSlot::abort_handle));

        run.check(cancel)?;
        run.enter(LoadState::ProcessingEnvironment);
        let background = self.process_background(&document, &base);
        in_flight.extend(background.as_ref().map(JoinHandle::abort_handle));
        let pending = self.request_entities(&graph, &base, &mut run.metrics);

        run.enter(LoadState::WaitingForEntities);
        let timeout = self.config.timeout();
        let entities_timed_out = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoadError::Cancelled(uri)),
            _ = pending.wait() => false,
            _ = tokio::time::sleep(timeout) => true,
        };
        let completed = pending.completed();
        run.metrics.entities_completed = completed.len();
        if entities_timed_out {
            tracing::warn!(
                target: LOG_TARGET,
                uri = %uri,
                timeout_secs = timeout.as_secs_f64(),
                outstanding = pending.outstanding() as u64,
                "entities.timeout"
            );
        }

        run.enter(LoadState::ApplyingHierarchy);
        self.apply_hierarchy(&graph, &completed, &mut run.metrics)?;

        let deadline = Instant::now() + self.config.script_timeout();
        let sources = self.resolve_scripts(scripts, deadline, cancel, run).await?;
        for source in sources.iter().flatten() {
            self.collaborators.scripts.run(source);
            run.metrics.scripts_run += 1;
        }
        self.run_on_load_events(&graph, &completed, &mut run.metrics);

        if let Some(background) = background {
            match tokio::time::timeout_at(deadline, background).await {
                Ok(Ok(true)) => {}
                Ok(_) => run.metrics.resource_failures += 1,
                Err(_) => {
                    run.metrics.resource_failures += 1;
                    tracing::warn!(target: LOG_TARGET, uri = %uri, "background.timeout");
                }
            }
        }

        run.enter(LoadState::Done);
        Ok(LoadReport {
            uri,
            source_version,
            title: document.metadata.title.clone().unwrap_or_default(),
            capabilities,
            states: std::mem::take(&mut run.states),
            warnings,
            entity_ids: graph.ids().collect(),
            entities_timed_out,
            metrics: std::mem::take(&mut run.metrics),
        })
    }

    async fn download(&self, uri: &Url, metrics: &mut LoadMetrics) -> Result<Vec<u8>, LoadError> {
        let store = &self.collaborators.store;
        if store.contains(uri) {
            if let Some(bytes) = store.read(uri) {
                tracing::debug!(target: LOG_TARGET, uri = %uri, "document.cached");
                metrics.served_from_store = true;
                return Ok(bytes);
            }
        }
        let bytes = fetch_ok(self.collaborators.fetcher.as_ref(), uri)
            .await
            .map_err(|source| LoadError::Fetch {
                uri: uri.clone(),
                source,
            })?;
        store.write(uri, &bytes);
        Ok(bytes)
    }

    fn base_uri(&self, document_uri: &Url) -> Url {
        match self.config.base_uri.as_deref().map(Url::parse) {
            Some(Ok(base)) => base,
            Some(Err(err)) => {
                tracing::warn!(
                    target: "veml::config",
                    error = %err,
                    "loader_config.base_uri_invalid"
                );
                document_uri.clone()
            }
            None => document_uri.clone(),
        }
    }

    fn process_metadata_registrations(
        &self,
        metadata: &Metadata,
        metrics: &mut LoadMetrics,
    ) -> CapabilityHints {
        let (capabilities, unknown) =
            CapabilityHints::from_names(metadata.capabilities.iter().map(String::as_str));
        for name in unknown {
            tracing::warn!(target: LOG_TARGET, capability = name, "capability.unknown");
        }

        for binding in &metadata.input_events {
            self.collaborators
                .input
                .register_input_event(&binding.input, &binding.event);
            metrics.input_events_registered += 1;
        }

        for service in &metadata.synchronization_services {
            let parsed = parse_sync_address(&service.address)
                .and_then(|endpoint| Ok((endpoint, parse_sync_transport(&service.transport)?)));
            match parsed {
                Ok((endpoint, transport)) => {
                    self.collaborators.sync.add_synchronizer_and_session(
                        &service.id,
                        &endpoint,
                        transport,
                        &service.session,
                    );
                    metrics.sync_services_registered += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        id = %service.id,
                        address = %service.address,
                        error = %err,
                        "sync.descriptor_skipped"
                    );
                    metrics.sync_services_skipped += 1;
                }
            }
        }
        capabilities
    }

    fn start_script_fetches(&self, metadata: &Metadata, base: &Url) -> Vec<ScriptSlot> {
        metadata
            .script_entries()
            .map(|entry| match entry {
                ScriptEntry::Inline(source) => ScriptSlot::Ready(source.to_string()),
                ScriptEntry::Resource(reference) => match resolve_reference(Some(base), reference)
                {
                    Ok(uri) => {
                        let fetcher = Arc::clone(&self.collaborators.fetcher);
                        let target = uri.clone();
                        let handle =
                            tokio::spawn(async move { fetch_ok(fetcher.as_ref(), &target).await });
                        ScriptSlot::Fetching { uri, handle }
                    }
                    Err(err) => {
                        tracing::warn!(
                            target: LOG_TARGET,
                            script = reference,
                            error = %err,
                            "script.unresolvable"
                        );
                        ScriptSlot::Unavailable
                    }
                },
            })
            .collect()
    }

    /// Waits for every fetched script, in document order, sharing one deadline.
    async fn resolve_scripts(
        &self,
        slots: Vec<ScriptSlot>,
        deadline: Instant,
        cancel: &CancelToken,
        run: &mut LoadRun,
    ) -> Result<Vec<Option<String>>, LoadError> {
        let mut sources = Vec::with_capacity(slots.len());
        for slot in slots {
            let source = match slot {
                ScriptSlot::Ready(source) => Some(source),
                ScriptSlot::Unavailable => None,
                ScriptSlot::Fetching { uri, handle } => {
                    let abort = handle.abort_handle();
                    let joined = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(LoadError::Cancelled(run.uri.clone())),
                        joined = tokio::time::timeout_at(deadline, handle) => joined,
                    };
                    match joined {
                        Ok(Ok(Ok(bytes))) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                        Ok(Ok(Err(err))) => {
                            run.metrics.resource_failures += 1;
                            tracing::warn!(
                                target: LOG_TARGET,
                                script = %uri,
                                error = %err,
                                "script.fetch_failed"
                            );
                            None
                        }
                        Ok(Err(err)) => {
                            tracing::warn!(
                                target: LOG_TARGET,
                                script = %uri,
                                error = %err,
                                "script.fetch_aborted"
                            );
                            None
                        }
                        Err(_) => {
                            abort.abort();
                            tracing::warn!(target: LOG_TARGET, script = %uri, "scripts.timeout");
                            None
                        }
                    }
                }
            };
            if source.is_none() {
                run.metrics.scripts_skipped += 1;
            }
            sources.push(source);
        }
        Ok(sources)
    }

    fn process_background(&self, document: &Document, base: &Url) -> Option<JoinHandle<bool>> {
        let effects = &document.environment.effects;
        let runtime = &self.collaborators.runtime;
        match document.environment.background.as_ref()? {
            Background::Color(token) => match classify_background(token) {
                BackgroundToken::Keyword(color) | BackgroundToken::Hex(color) => {
                    runtime.apply_background(ResolvedBackground::Solid(color), effects);
                    None
                }
                BackgroundToken::Texture(reference) => {
                    self.spawn_background_fetch(reference, base, effects, |uri, bytes| {
                        ResolvedBackground::Texture { uri, bytes }
                    })
                }
            },
            Background::Panorama(reference) => {
                self.spawn_background_fetch(reference, base, effects, |uri, bytes| {
                    ResolvedBackground::Panorama { uri, bytes }
                })
            }
            Background::LiteProceduralSky(sky) => {
                runtime.apply_background(ResolvedBackground::ProceduralSky(sky.clone()), effects);
                None
            }
        }
    }

    fn spawn_background_fetch(
        &self,
        reference: &str,
        base: &Url,
        effects: &Effects,
        resolved: fn(Url, Vec<u8>) -> ResolvedBackground,
    ) -> Option<JoinHandle<bool>> {
        let runtime = Arc::clone(&self.collaborators.runtime);
        let fallback = self.fallback_background();
        let uri = match resolve_reference(Some(base), reference) {
            Ok(uri) => uri,
            Err(err) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    background = reference,
                    error = %err,
                    "background.unresolvable"
                );
                runtime.apply_background(ResolvedBackground::Solid(fallback), effects);
                return None;
            }
        };
        let fetcher = Arc::clone(&self.collaborators.fetcher);
        let effects = effects.clone();
        Some(tokio::spawn(async move {
            match fetch_ok(fetcher.as_ref(), &uri).await {
                Ok(bytes) => {
                    runtime.apply_background(resolved(uri, bytes), &effects);
                    true
                }
                Err(err) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        background = %uri,
                        error = %err,
                        "background.fetch_failed"
                    );
                    runtime.apply_background(ResolvedBackground::Solid(fallback), &effects);
                    false
                }
            }
        }))
    }

    fn fallback_background(&self) -> Rgba {
        let token = self.config.fallback_background.as_str();
        named_color(token).unwrap_or_else(|| parse_color(token))
    }

    /// Issues one creation request per flattened entity, in flatten order.
    fn request_entities(
        &self,
        graph: &EntityGraph,
        base: &Url,
        metrics: &mut LoadMetrics,
    ) -> PendingCreations {
        let ids: Vec<Uuid> = graph.ids().collect();
        let (pending, tickets) = PendingCreations::issue(&ids);
        for (entry, ticket) in graph.iter().zip(tickets) {
            let request = self.creation_request(entry, base);
            tracing::trace!(
                target: LOG_TARGET,
                id = %entry.id,
                kind = entry.entity.kind.tag(),
                "entity.create"
            );
            self.collaborators.runtime.create_entity(request, ticket);
            metrics.entities_requested += 1;
        }
        pending
    }

    fn creation_request(&self, entry: &FlatEntity, base: &Url) -> CreateEntityRequest {
        let entity = &entry.entity;
        let resources = resource_references(&entity.kind)
            .into_iter()
            .filter_map(|reference| match resolve_reference(Some(base), reference) {
                Ok(uri) => Some(uri),
                Err(err) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        tag = %entity.tag,
                        resource = reference,
                        error = %err,
                        "resource.unresolvable"
                    );
                    None
                }
            })
            .collect();

        let synchronizer = entity.synchronizer.as_deref().and_then(|name| {
            let binding = self.collaborators.sync.get_synchronizer_and_session(name);
            if binding.is_none() {
                tracing::warn!(
                    target: LOG_TARGET,
                    tag = %entity.tag,
                    synchronizer = name,
                    "entity.unknown_synchronizer"
                );
            }
            binding
        });

        CreateEntityRequest {
            id: entry.id,
            tag: entity.tag.clone(),
            kind: entity.kind.clone(),
            transform: entity.transform.unwrap_or_else(Transform::identity_scale),
            parentless: true,
            visible: false,
            placement_sockets: entity.placement_sockets.clone(),
            resources,
            terrain: decode_terrain(entity.tag.as_str(), &entity.kind),
            synchronizer,
        }
    }

    /// Resolves every pair before attaching any, so a failure leaves nothing
    /// half attached. Pairs involving an entity outside `completed` are
    /// skipped.
    fn apply_hierarchy(
        &self,
        graph: &EntityGraph,
        completed: &HashSet<Uuid>,
        metrics: &mut LoadMetrics,
    ) -> Result<(), LoadError> {
        let runtime = &self.collaborators.runtime;
        let resolve = |id: Uuid| {
            runtime.find_entity(id).ok_or_else(|| LoadError::EntityResolution {
                id,
                tag: graph
                    .get(&id)
                    .map(|entry| entry.entity.tag.clone())
                    .unwrap_or_default(),
            })
        };

        let mut attachments: Vec<(EntityHandle, Option<EntityHandle>)> = Vec::new();
        for entry in graph {
            let parent_incomplete = entry.parent.is_some_and(|parent| !completed.contains(&parent));
            if !completed.contains(&entry.id) || parent_incomplete {
                tracing::warn!(
                    target: LOG_TARGET,
                    id = %entry.id,
                    tag = %entry.entity.tag,
                    "hierarchy.skip_incomplete"
                );
                metrics.hierarchy_skipped += 1;
                continue;
            }
            let handle = resolve(entry.id)?;
            let parent = entry.parent.map(&resolve).transpose()?;
            attachments.push((handle, parent));
        }

        for (handle, parent) in &attachments {
            runtime.set_parent(*handle, *parent);
        }
        for (handle, _) in &attachments {
            runtime.set_visible(*handle, true);
        }
        metrics.hierarchy_applied = attachments.len();
        Ok(())
    }

    fn run_on_load_events(
        &self,
        graph: &EntityGraph,
        completed: &HashSet<Uuid>,
        metrics: &mut LoadMetrics,
    ) {
        for entry in graph {
            let Some(template) = entry.entity.on_load_event.as_deref() else {
                continue;
            };
            if !completed.contains(&entry.id) {
                continue;
            }
            self.collaborators
                .scripts
                .run(&template.replace('?', &entry.id.to_string()));
            metrics.on_load_events_run += 1;
        }
    }
}

enum ScriptSlot {
    Ready(String),
    Fetching {
        uri: Url,
        handle: JoinHandle<Result<Vec<u8>, FetchError>>,
    },
    Unavailable,
}

impl ScriptSlot {
    fn abort_handle(&self) -> Option<AbortHandle> {
        match self {
            ScriptSlot::Fetching { handle, .. } => Some(handle.abort_handle()),
            _ => None,
        }
    }
}

/// Fetch tasks spawned by one load; aborted when the load returns, whether
/// it succeeded, failed or was cancelled.
#[derive(Default)]
struct InFlight(Vec<AbortHandle>);

impl Extend<AbortHandle> for InFlight {
    fn extend<I: IntoIterator<Item = AbortHandle>>(&mut self, handles: I) {
        self.0.extend(handles);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

struct LoadRun {
    uri: Url,
    states: Vec<LoadState>,
    metrics: LoadMetrics,
}

impl LoadRun {
    fn new(uri: Url) -> Self {
        Self {
            uri,
            states: vec![LoadState::Idle],
            metrics: LoadMetrics::default(),
        }
    }

    fn enter(&mut self, state: LoadState) {
        tracing::info!(target: LOG_TARGET, uri = %self.uri, state = %state, "load.state");
        self.states.push(state);
    }

    fn check(&self, cancel: &CancelToken) -> Result<(), LoadError> {
        if cancel.is_cancelled() {
            Err(LoadError::Cancelled(self.uri.clone()))
        } else {
            Ok(())
        }
    }
}

/// Payload references the runtime will need to load for `kind`.
fn resource_references(kind: &EntityKind) -> Vec<&str> {
    fn list(resources: &Option<Vec<String>>) -> Vec<&str> {
        resources
            .iter()
            .flatten()
            .map(String::as_str)
            .collect()
    }
    match kind {
        EntityKind::Mesh(mesh) => list(&mesh.mesh_resource),
        EntityKind::Character(character) => list(&character.mesh_resource),
        EntityKind::Automobile(automobile) => list(&automobile.mesh_resource),
        EntityKind::Airplane(airplane) => list(&airplane.mesh_resource),
        EntityKind::Audio(audio) => audio.audio_file.as_deref().into_iter().collect(),
        EntityKind::Image(image) => image.image_file.as_deref().into_iter().collect(),
        EntityKind::Html(html) => html.url.as_deref().into_iter().collect(),
        _ => Vec::new(),
    }
}

fn decode_terrain(tag: &str, kind: &EntityKind) -> Option<DecodedTerrain> {
    let EntityKind::Terrain(terrain) = kind else {
        return None;
    };
    let heights = terrain
        .heights
        .as_deref()
        .and_then(|text| match decode_grid(text) {
            Ok(grid) => Some(grid),
            Err(err) => {
                tracing::warn!(target: LOG_TARGET, tag, error = %err, "terrain.heights_invalid");
                None
            }
        });
    let layer_masks = match terrain.layer_masks.as_deref().map(decode_layer_masks) {
        Some(Ok(masks)) => masks,
        Some(Err(err)) => {
            tracing::warn!(target: LOG_TARGET, tag, error = %err, "terrain.layer_masks_invalid");
            Vec::new()
        }
        None => Vec::new(),
    };
    Some(DecodedTerrain {
        heights,
        layer_masks,
    })
}
