//! Document pipeline for VEML: revision detection, table-driven migration to
//! the canonical revision, validation, and entity forest flattening, plus the
//! small codecs documents rely on (CSV grids, colors, synchronizer
//! addresses, resource URIs).
//!
//! Everything here is synchronous and free of I/O; `veml_loader` drives it.

pub mod color;
pub mod csv_grid;
pub mod detect;
pub mod error;
pub mod flatten;
pub mod forest;
pub mod migration;
pub mod schema;
pub mod sync_address;
pub mod uri;
pub mod validate;

pub use veml_schema::*;

pub use color::{classify_background, named_color, parse_color, BackgroundToken};
pub use csv_grid::{
    decode_grid, decode_layer_masks, encode_grid, encode_layer_masks, Grid, GridError,
};
pub use detect::{detect_version, load_document};
pub use error::{DocumentError, MigrationError, MigrationWarning};
pub use flatten::{
    assign_and_flatten, assign_ids, assign_ids_with, flatten, EntityGraph, FlatEntity,
    FlattenError,
};
pub use forest::{count_nodes, walk_breadth_first, TreeNode};
pub use migration::{migrate_step, migrate_to_canonical, migrate_to_latest, Migration};
pub use schema::document_schema;
pub use sync_address::{
    parse_sync_address, parse_sync_transport, SyncAddressError, SyncTransport,
    SynchronizerEndpoint,
};
pub use uri::{document_url, resolve_reference, UriError};
pub use validate::{validate, validate_document, TransformRule, ValidationError};
