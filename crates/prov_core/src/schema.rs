//! Per-format-version decoding rules.
//!
//! Each archive schema revision is one [`SchemaVersion`] variant with one
//! static [`SchemaRule`]. A rule describes which sidecar files and which
//! `action.yaml` features exist, and carries the function that decodes that
//! revision's action record. Supporting a new revision means
//! adding a variant, which the exhaustive matches below force a rule for.

use serde::Serialize;
use serde_yaml::Value;

use crate::action;
use crate::node::ActionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SchemaVersion {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}

impl SchemaVersion {
    pub const ALL: [SchemaVersion; 7] = [
        SchemaVersion::V0,
        SchemaVersion::V1,
        SchemaVersion::V2,
        SchemaVersion::V3,
        SchemaVersion::V4,
        SchemaVersion::V5,
        SchemaVersion::V6,
    ];

    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            0 => Some(SchemaVersion::V0),
            1 => Some(SchemaVersion::V1),
            2 => Some(SchemaVersion::V2),
            3 => Some(SchemaVersion::V3),
            4 => Some(SchemaVersion::V4),
            5 => Some(SchemaVersion::V5),
            6 => Some(SchemaVersion::V6),
            _ => None,
        }
    }

    pub fn number(&self) -> u32 {
        match self {
            SchemaVersion::V0 => 0,
            SchemaVersion::V1 => 1,
            SchemaVersion::V2 => 2,
            SchemaVersion::V3 => 3,
            SchemaVersion::V4 => 4,
            SchemaVersion::V5 => 5,
            SchemaVersion::V6 => 6,
        }
    }

    pub fn rule(&self) -> &'static SchemaRule {
        match self {
            SchemaVersion::V0 => &V0_RULE,
            SchemaVersion::V1 => &V1_RULE,
            SchemaVersion::V2 => &V2_RULE,
            SchemaVersion::V3 => &V3_RULE,
            SchemaVersion::V4 => &V4_RULE,
            SchemaVersion::V5 => &V5_RULE,
            SchemaVersion::V6 => &V6_RULE,
        }
    }
}

/// What a decoder gets to look at for one node.
pub struct DecodeInput<'a> {
    /// Parsed `action.yaml`, absent for schema revisions without one.
    pub action_yaml: Option<&'a Value>,
    /// Semantic type from the node's `metadata.yaml`, used when the action
    /// type must be inferred.
    pub semantic_type: Option<&'a str>,
}

pub type DecodeFn = fn(&SchemaRule, &DecodeInput<'_>) -> Result<Option<ActionRecord>, String>;

pub struct SchemaRule {
    pub version: SchemaVersion,
    /// Whether the revision records provenance at all.
    pub tracks_provenance: bool,
    /// `metadata.yaml` must carry a `uuid`.
    pub uuid_required: bool,
    /// `action.type` must be present (otherwise inferred from structure).
    pub action_type_required: bool,
    pub alias_of: bool,
    /// Inputs may be sequences or `!set` collections.
    pub variadic_inputs: bool,
    /// Citations live in a `citations.bib` sidecar.
    pub citations_sidecar: bool,
    pub transformers: bool,
    /// A `checksums.md5` manifest sits at the archive root.
    pub checksums: bool,
    pub execution_context: bool,
    pub decode: DecodeFn,
}

impl std::fmt::Debug for SchemaRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRule")
            .field("version", &self.version)
            .field("tracks_provenance", &self.tracks_provenance)
            .field("citations_sidecar", &self.citations_sidecar)
            .field("checksums", &self.checksums)
            .finish_non_exhaustive()
    }
}

impl SchemaRule {
    pub fn decode_action(&self, input: &DecodeInput<'_>) -> Result<Option<ActionRecord>, String> {
        (self.decode)(self, input)
    }
}

const V0_RULE: SchemaRule = SchemaRule {
    version: SchemaVersion::V0,
    tracks_provenance: false,
    uuid_required: false,
    action_type_required: false,
    alias_of: false,
    variadic_inputs: false,
    citations_sidecar: false,
    transformers: false,
    checksums: false,
    execution_context: false,
    decode: action::decode_untracked,
};

const V1_RULE: SchemaRule = SchemaRule {
    version: SchemaVersion::V1,
    tracks_provenance: true,
    uuid_required: true,
    action_type_required: false,
    alias_of: false,
    variadic_inputs: false,
    citations_sidecar: false,
    transformers: false,
    checksums: false,
    execution_context: false,
    decode: action::decode_tracked,
};

const V2_RULE: SchemaRule = SchemaRule {
    version: SchemaVersion::V2,
    action_type_required: true,
    alias_of: true,
    ..V1_RULE
};

const V3_RULE: SchemaRule = SchemaRule {
    version: SchemaVersion::V3,
    variadic_inputs: true,
    ..V2_RULE
};

const V4_RULE: SchemaRule = SchemaRule {
    version: SchemaVersion::V4,
    citations_sidecar: true,
    transformers: true,
    ..V3_RULE
};

const V5_RULE: SchemaRule = SchemaRule {
    version: SchemaVersion::V5,
    checksums: true,
    ..V4_RULE
};

const V6_RULE: SchemaRule = SchemaRule {
    version: SchemaVersion::V6,
    execution_context: true,
    ..V5_RULE
};

/// Read-only lookup over the rule table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaRegistry;

impl SchemaRegistry {
    /// Rule for a declared archive version, `None` for unknown versions.
    pub fn lookup(archive_version: u32) -> Option<&'static SchemaRule> {
        SchemaVersion::from_number(archive_version).map(|v| v.rule())
    }

    pub fn latest() -> &'static SchemaRule {
        SchemaVersion::V6.rule()
    }

    pub fn rules() -> impl Iterator<Item = &'static SchemaRule> {
        SchemaVersion::ALL.iter().map(|v| v.rule())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_version_maps_to_its_own_rule() {
        for version in SchemaVersion::ALL {
            let rule = SchemaRegistry::lookup(version.number()).unwrap();
            assert_eq!(rule.version, version);
        }
        assert!(SchemaRegistry::lookup(7).is_none());
        assert!(SchemaRegistry::lookup(99).is_none());
    }

    #[test]
    fn features_accumulate_across_versions() {
        let v0 = SchemaRegistry::lookup(0).unwrap();
        assert!(!v0.tracks_provenance && !v0.uuid_required);

        let v1 = SchemaRegistry::lookup(1).unwrap();
        assert!(v1.uuid_required && !v1.action_type_required && !v1.alias_of);

        let v3 = SchemaRegistry::lookup(3).unwrap();
        assert!(v3.variadic_inputs && v3.alias_of && !v3.citations_sidecar);

        let v4 = SchemaRegistry::lookup(4).unwrap();
        assert!(v4.citations_sidecar && v4.transformers);
        assert!(!v4.checksums);

        let v5 = SchemaRegistry::lookup(5).unwrap();
        assert!(v5.checksums && !v5.execution_context);

        assert!(SchemaRegistry::latest().execution_context);
        assert_eq!(SchemaRegistry::rules().count(), 7);
    }
}
