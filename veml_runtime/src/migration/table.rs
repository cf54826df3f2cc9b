//! Per-revision change tables driving the generic migrator.
//!
//! The 1.0 base profile plus one [`MigrationStep`] row per adjacent revision
//! pair fully describe what every historical revision knows. Field lists are
//! keyed by the entity kind tag as it appears on the wire.

use veml_schema::{SchemaVersion, TransformKind};

/// An entity kind introduced by a revision, with its payload fields.
#[derive(Debug)]
pub struct KindDef {
    pub kind: &'static str,
    pub fields: &'static [&'static str],
}

/// Value written into a field the first time a revision introduces it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(&'static str),
    EmptyList,
}

/// A payload field introduced on an already existing kind.
#[derive(Debug)]
pub struct FieldDefault {
    pub kind: &'static str,
    pub field: &'static str,
    pub default: Option<DefaultValue>,
}

#[derive(Debug)]
pub struct FieldRef {
    pub kind: &'static str,
    pub field: &'static str,
}

#[derive(Debug)]
pub struct FieldRename {
    pub kind: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldChange {
    /// A scalar value becomes a one-element list.
    WrapInList,
}

#[derive(Debug)]
pub struct FieldConversion {
    pub kind: &'static str,
    pub field: &'static str,
    pub change: FieldChange,
}

/// Wire names of the three transform kinds in one revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformNames {
    pub scale: &'static str,
    pub size: &'static str,
    pub canvas: &'static str,
}

impl TransformNames {
    pub fn name(&self, kind: TransformKind) -> &'static str {
        match kind {
            TransformKind::Scale => self.scale,
            TransformKind::Size => self.size,
            TransformKind::Canvas => self.canvas,
        }
    }

    pub fn kind_of(&self, name: &str) -> Option<TransformKind> {
        [TransformKind::Scale, TransformKind::Size, TransformKind::Canvas]
            .into_iter()
            .find(|kind| self.name(*kind) == name)
    }
}

#[derive(Debug)]
pub struct TransformFieldRename {
    pub transform: TransformKind,
    pub from: &'static str,
    pub to: &'static str,
}

/// Everything that changes between `from` and `to`.
#[derive(Debug)]
pub struct MigrationStep {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub kinds_added: &'static [KindDef],
    pub fields_added: &'static [FieldDefault],
    pub fields_retired: &'static [FieldRef],
    pub field_renames: &'static [FieldRename],
    pub field_conversions: &'static [FieldConversion],
    pub transform_names: Option<TransformNames>,
    pub transform_field_renames: &'static [TransformFieldRename],
    pub backgrounds_added: &'static [&'static str],
    /// Set when synchronization descriptors gain a `type` member.
    pub sync_transport_default: Option<&'static str>,
}

impl MigrationStep {
    /// Default this step declares for a field it adds to `kind`.
    pub fn introduced_default(&self, kind: &str, field: &str) -> Option<DefaultValue> {
        self.fields_added
            .iter()
            .find(|added| added.kind == kind && added.field == field)
            .and_then(|added| added.default)
    }
}

const NO_CHANGES: MigrationStep = MigrationStep {
    from: SchemaVersion::V1_0,
    to: SchemaVersion::V1_0,
    kinds_added: &[],
    fields_added: &[],
    fields_retired: &[],
    field_renames: &[],
    field_conversions: &[],
    transform_names: None,
    transform_field_renames: &[],
    backgrounds_added: &[],
    sync_transport_default: None,
};

/// Kinds whose only valid placement is a canvas transform.
pub const UI_KINDS: &[&str] = &["textentity", "buttonentity", "inputentity", "canvasentity"];

/// Generic kind that unrecognized kinds degrade to.
pub const BASE_KIND: &str = "entity";

/// Color written in place of a background variant the revision cannot express.
pub const FALLBACK_BACKGROUND_COLOR: &str = "#808080";

pub const BASE_KINDS: &[KindDef] = &[
    KindDef {
        kind: BASE_KIND,
        fields: &[],
    },
    KindDef {
        kind: "meshentity",
        fields: &["mesh-name", "mesh-resource"],
    },
    KindDef {
        kind: "characterentity",
        fields: &["mesh-name", "mesh-resource", "mesh-offset", "mesh-rotation"],
    },
    KindDef {
        kind: "lightentity",
        fields: &["light-type", "color", "intensity"],
    },
    KindDef {
        kind: "terrainentity",
        fields: &["length", "width", "height", "heights"],
    },
    KindDef {
        kind: "textentity",
        fields: &["text", "font-size", "font"],
    },
    KindDef {
        kind: "buttonentity",
        fields: &["on-click-event"],
    },
    KindDef {
        kind: "canvasentity",
        fields: &[],
    },
    KindDef {
        kind: "inputentity",
        fields: &[],
    },
];

pub const BASE_TRANSFORMS: TransformNames = TransformNames {
    scale: "scaletransform",
    size: "sizetransform",
    canvas: "canvastransform",
};

pub const BASE_BACKGROUNDS: &[&str] = &["color", "panorama"];

const PRIMITIVE_FIELDS: &[&str] = &["color"];

pub const STEPS: [MigrationStep; 10] = [
    MigrationStep {
        from: SchemaVersion::V1_0,
        to: SchemaVersion::V1_1,
        kinds_added: &[KindDef {
            kind: "voxelentity",
            fields: &[],
        }],
        fields_added: &[FieldDefault {
            kind: "lightentity",
            field: "range",
            default: Some(DefaultValue::Number(10.0)),
        }],
        ..NO_CHANGES
    },
    MigrationStep {
        from: SchemaVersion::V1_1,
        to: SchemaVersion::V1_2,
        kinds_added: &[
            KindDef {
                kind: "htmlentity",
                fields: &["url"],
            },
            KindDef {
                kind: "imageentity",
                fields: &["image-file"],
            },
        ],
        ..NO_CHANGES
    },
    MigrationStep {
        from: SchemaVersion::V1_2,
        to: SchemaVersion::V1_3,
        kinds_added: &[KindDef {
            kind: "audioentity",
            fields: &["audio-file", "autoplay", "looping", "volume", "pitch"],
        }],
        fields_added: &[
            FieldDefault {
                kind: "textentity",
                field: "color",
                default: None,
            },
            FieldDefault {
                kind: "characterentity",
                field: "label-offset",
                default: None,
            },
        ],
        ..NO_CHANGES
    },
    MigrationStep {
        from: SchemaVersion::V1_3,
        to: SchemaVersion::V1_4,
        kinds_added: &[
            KindDef {
                kind: "waterentity",
                fields: &["shallow-color", "deep-color", "wave-height", "wave-speed"],
            },
            KindDef {
                kind: "waterblockerentity",
                fields: &[],
            },
        ],
        field_conversions: &[
            FieldConversion {
                kind: "meshentity",
                field: "mesh-resource",
                change: FieldChange::WrapInList,
            },
            FieldConversion {
                kind: "characterentity",
                field: "mesh-resource",
                change: FieldChange::WrapInList,
            },
        ],
        ..NO_CHANGES
    },
    MigrationStep {
        from: SchemaVersion::V1_4,
        to: SchemaVersion::V2_0,
        fields_added: &[FieldDefault {
            kind: "inputentity",
            field: "placeholder",
            default: None,
        }],
        transform_names: Some(TransformNames {
            scale: "scale",
            size: "size",
            canvas: "canvas",
        }),
        transform_field_renames: &[
            TransformFieldRename {
                transform: TransformKind::Canvas,
                from: "position",
                to: "position-percent",
            },
            TransformFieldRename {
                transform: TransformKind::Canvas,
                from: "size",
                to: "size-percent",
            },
        ],
        backgrounds_added: &["liteproceduralsky"],
        sync_transport_default: Some("tcp"),
        ..NO_CHANGES
    },
    MigrationStep {
        from: SchemaVersion::V2_0,
        to: SchemaVersion::V2_1,
        kinds_added: &[KindDef {
            kind: "automobileentity",
            fields: &["mesh-name", "mesh-resource", "wheels", "mass", "automobile-type"],
        }],
        fields_added: &[
            FieldDefault {
                kind: "terrainentity",
                field: "terrain-type",
                default: Some(DefaultValue::Text("heightmap")),
            },
            FieldDefault {
                kind: "terrainentity",
                field: "layers",
                default: Some(DefaultValue::EmptyList),
            },
            FieldDefault {
                kind: "terrainentity",
                field: "layer-masks",
                default: None,
            },
        ],
        ..NO_CHANGES
    },
    MigrationStep {
        from: SchemaVersion::V2_1,
        to: SchemaVersion::V2_2,
        kinds_added: &[
            KindDef {
                kind: "cubemeshentity",
                fields: PRIMITIVE_FIELDS,
            },
            KindDef {
                kind: "spheremeshentity",
                fields: PRIMITIVE_FIELDS,
            },
            KindDef {
                kind: "capsulemeshentity",
                fields: PRIMITIVE_FIELDS,
            },
            KindDef {
                kind: "cylindermeshentity",
                fields: PRIMITIVE_FIELDS,
            },
            KindDef {
                kind: "conemeshentity",
                fields: PRIMITIVE_FIELDS,
            },
            KindDef {
                kind: "planemeshentity",
                fields: PRIMITIVE_FIELDS,
            },
            KindDef {
                kind: "torusmeshentity",
                fields: PRIMITIVE_FIELDS,
            },
            KindDef {
                kind: "prismmeshentity",
                fields: PRIMITIVE_FIELDS,
            },
            KindDef {
                kind: "archmeshentity",
                fields: PRIMITIVE_FIELDS,
            },
        ],
        ..NO_CHANGES
    },
    MigrationStep {
        from: SchemaVersion::V2_2,
        to: SchemaVersion::V2_3,
        kinds_added: &[KindDef {
            kind: "airplaneentity",
            fields: &["mesh-name", "mesh-resource", "mass"],
        }],
        fields_added: &[
            FieldDefault {
                kind: "audioentity",
                field: "pan",
                default: Some(DefaultValue::Number(0.0)),
            },
            FieldDefault {
                kind: "audioentity",
                field: "priority",
                default: Some(DefaultValue::Integer(128)),
            },
            FieldDefault {
                kind: "htmlentity",
                field: "on-message-event",
                default: None,
            },
        ],
        ..NO_CHANGES
    },
    MigrationStep {
        from: SchemaVersion::V2_3,
        to: SchemaVersion::V2_4,
        fields_added: &[FieldDefault {
            kind: "waterentity",
            field: "smoothness",
            default: Some(DefaultValue::Number(0.5)),
        }],
        field_renames: &[FieldRename {
            kind: "audioentity",
            from: "looping",
            to: "loop",
        }],
        ..NO_CHANGES
    },
    MigrationStep {
        from: SchemaVersion::V2_4,
        to: SchemaVersion::V3_0,
        fields_added: &[FieldDefault {
            kind: "buttonentity",
            field: "color",
            default: None,
        }],
        fields_retired: &[FieldRef {
            kind: "textentity",
            field: "font",
        }],
        ..NO_CHANGES
    },
];

/// The step leaving `from`, or `None` when `from` is canonical.
pub fn step_from(from: SchemaVersion) -> Option<&'static MigrationStep> {
    STEPS.iter().find(|step| step.from == from)
}
