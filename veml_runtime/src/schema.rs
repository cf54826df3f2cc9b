use veml_schema::Document;

/// JSON schema of the canonical document revision.
pub fn document_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(Document)
}
