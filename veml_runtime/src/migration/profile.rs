use std::collections::BTreeMap;
use std::sync::OnceLock;

use veml_schema::SchemaVersion;

use super::table::{
    MigrationStep, TransformNames, BASE_BACKGROUNDS, BASE_KINDS, BASE_TRANSFORMS, STEPS,
};

/// What a single revision can express: its entity kinds with their payload
/// fields, the wire names of its transforms, and its background variants.
#[derive(Debug, Clone)]
pub struct VersionProfile {
    pub version: SchemaVersion,
    kinds: BTreeMap<&'static str, Vec<&'static str>>,
    pub transforms: TransformNames,
    backgrounds: Vec<&'static str>,
    /// Whether synchronization descriptors carry a `type` member.
    pub sync_transport: bool,
}

impl VersionProfile {
    fn base() -> Self {
        Self {
            version: SchemaVersion::V1_0,
            kinds: BASE_KINDS
                .iter()
                .map(|def| (def.kind, def.fields.to_vec()))
                .collect(),
            transforms: BASE_TRANSFORMS,
            backgrounds: BASE_BACKGROUNDS.to_vec(),
            sync_transport: false,
        }
    }

    fn advance(&self, step: &MigrationStep) -> Self {
        let mut next = self.clone();
        next.version = step.to;
        for def in step.kinds_added {
            next.kinds.insert(def.kind, def.fields.to_vec());
        }
        for rename in step.field_renames {
            if let Some(fields) = next.kinds.get_mut(rename.kind) {
                for field in fields.iter_mut().filter(|field| **field == rename.from) {
                    *field = rename.to;
                }
            }
        }
        for retired in step.fields_retired {
            if let Some(fields) = next.kinds.get_mut(retired.kind) {
                fields.retain(|field| *field != retired.field);
            }
        }
        for added in step.fields_added {
            if let Some(fields) = next.kinds.get_mut(added.kind) {
                if !fields.contains(&added.field) {
                    fields.push(added.field);
                }
            }
        }
        if let Some(names) = step.transform_names {
            next.transforms = names;
        }
        next.backgrounds.extend_from_slice(step.backgrounds_added);
        next.sync_transport |= step.sync_transport_default.is_some();
        next
    }

    pub fn knows_kind(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn fields(&self, kind: &str) -> Option<&[&'static str]> {
        self.kinds.get(kind).map(Vec::as_slice)
    }

    pub fn knows_field(&self, kind: &str, field: &str) -> bool {
        self.fields(kind)
            .map(|fields| fields.contains(&field))
            .unwrap_or(false)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }

    pub fn knows_background(&self, variant: &str) -> bool {
        self.backgrounds.contains(&variant)
    }
}

/// Profile of `version`, derived once from the base profile and step table.
pub fn profile(version: SchemaVersion) -> &'static VersionProfile {
    static PROFILES: OnceLock<Vec<VersionProfile>> = OnceLock::new();
    let profiles = PROFILES.get_or_init(|| {
        let mut profiles = vec![VersionProfile::base()];
        for step in &STEPS {
            let next = profiles[profiles.len() - 1].advance(step);
            profiles.push(next);
        }
        profiles
    });
    &profiles[version.index()]
}
