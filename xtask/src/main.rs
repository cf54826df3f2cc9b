use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use veml_runtime::{assign_and_flatten, document_schema, load_document, validate};

const SCHEMA_OUTPUT: &str = "docs/veml-document.schema.json";
const FIXTURE_PATTERN: &str = "integration_tests/tests/fixtures/v*.json";

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("schema") => export_schema(args.next().map(PathBuf::from)),
        Some("check-fixtures") => check_fixtures(),
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(cmd) => {
            eprintln!("Unknown xtask '{cmd}'.");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: cargo xtask schema [output]");
    eprintln!("       cargo xtask check-fixtures");
    eprintln!("       cargo xtask help");
}

fn export_schema(output: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let output = output.unwrap_or_else(|| PathBuf::from(SCHEMA_OUTPUT));
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let schema = serde_json::to_string_pretty(&document_schema())?;
    fs::write(&output, schema)?;
    println!("Wrote canonical document schema to {}", output.display());
    Ok(())
}

/// Migrates every fixture, validates it, and checks the migrated document
/// against the exported schema.
fn check_fixtures() -> Result<(), Box<dyn Error>> {
    let schema = serde_json::to_value(document_schema())?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| format!("canonical schema does not compile: {err}"))?;

    let mut checked = 0;
    let mut failures = Vec::new();
    for entry in glob::glob(FIXTURE_PATTERN)? {
        let path = entry?;
        match check_fixture(&path, &compiled) {
            Ok(()) => checked += 1,
            Err(err) => failures.push(format!("{}: {err}", path.display())),
        }
    }

    if checked == 0 && failures.is_empty() {
        return Err(format!("no fixtures matched {FIXTURE_PATTERN}").into());
    }
    for failure in &failures {
        eprintln!("{failure}");
    }
    if !failures.is_empty() {
        return Err(format!("{} fixture(s) failed", failures.len()).into());
    }
    println!("{checked} fixture(s) migrate, validate and match the schema");
    Ok(())
}

fn check_fixture(path: &Path, schema: &JSONSchema) -> Result<(), Box<dyn Error>> {
    let bytes = fs::read(path)?;
    let mut migration = load_document(&bytes)?;
    if !migration.warnings.is_empty() {
        let warnings: Vec<String> = migration.warnings.iter().map(ToString::to_string).collect();
        return Err(format!("migration warnings: {}", warnings.join("; ")).into());
    }
    let graph = assign_and_flatten(&mut migration.document.environment.entities)?;
    validate(&migration.document, &graph)?;

    let instance = serde_json::to_value(&migration.document)?;
    if let Err(errors) = schema.validate(&instance) {
        let messages: Vec<String> = errors
            .map(|err| format!("{} at {}", err, err.instance_path))
            .collect();
        return Err(messages.join("; ").into());
    }
    Ok(())
}
