use thiserror::Error;
use veml_schema::SchemaVersion;

/// Failure to read raw bytes into a versioned document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unrecognized document version (namespace {namespace:?})")]
    UnknownVersion { namespace: Option<String> },
    #[error("malformed document{}: {source}", version_suffix(.version))]
    Malformed {
        version: Option<SchemaVersion>,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

fn version_suffix(version: &Option<SchemaVersion>) -> String {
    version.map(|v| format!(" ({v})")).unwrap_or_default()
}

/// Failure to express migrated content in the canonical typed model.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("entity '{tag}' of kind {kind} has an invalid payload: {source}")]
    InvalidPayload {
        tag: String,
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("entity '{tag}' has an invalid {kind} transform: {source}")]
    InvalidTransform {
        tag: String,
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid background: {0}")]
    InvalidBackground(#[source] serde_json::Error),
    #[error("invalid environment effects: {0}")]
    InvalidEffects(#[source] serde_json::Error),
}

/// Content that could not be carried forward as written and was degraded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationWarning {
    #[error("{version}: unknown entity kind '{kind}' on '{tag}', treated as base entity")]
    UnknownEntityKind {
        version: SchemaVersion,
        tag: String,
        kind: String,
    },
    #[error("{version}: unknown transform '{kind}' on '{tag}', replaced with a default transform")]
    UnknownTransform {
        version: SchemaVersion,
        tag: String,
        kind: String,
    },
    #[error("{version}: unsupported background '{variant}', using the default color")]
    UnknownBackground {
        version: SchemaVersion,
        variant: String,
    },
}
