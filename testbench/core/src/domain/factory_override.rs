// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Factory override rules
//!
//! A [`FactoryOverride`] says: requests for `orig_type` whose full instance
//! path matches `full_inst_path` produce `ovrd_type` instead. Type overrides are
//! the special case of a `"*"` path.

use crate::domain::glob;
use crate::domain::wrapper::{display_name, same_type, ObjectWrapper, UNKNOWN_TYPE_NAME};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FactoryOverride {
    /// Unset while the original type is only known by name.
    pub orig_type: Option<Arc<dyn ObjectWrapper>>,
    pub orig_type_name: String,
    pub ovrd_type: Arc<dyn ObjectWrapper>,
    pub ovrd_type_name: String,
    pub full_inst_path: String,
    /// Set on the first candidate of a debug pass.
    pub selected: bool,
}

impl FactoryOverride {
    pub fn new(
        full_inst_path: impl Into<String>,
        orig_type: Option<Arc<dyn ObjectWrapper>>,
        orig_type_name: impl Into<String>,
        ovrd_type: Arc<dyn ObjectWrapper>,
    ) -> Self {
        let ovrd_type_name = display_name(ovrd_type.as_ref()).to_string();
        Self {
            orig_type,
            orig_type_name: orig_type_name.into(),
            ovrd_type,
            ovrd_type_name,
            full_inst_path: full_inst_path.into(),
            selected: false,
        }
    }

    /// Exact match on the original type: wrapper identity, or equal type
    /// names when both are known.
    pub fn matches_exact(&self, requested: Option<&dyn ObjectWrapper>, requested_name: &str) -> bool {
        if let (Some(orig), Some(req)) = (self.orig_type.as_deref(), requested) {
            if same_type(orig, req) {
                return true;
            }
        }

        let name = self.orig_type_name.as_str();
        !name.is_empty() && name != UNKNOWN_TYPE_NAME && name == requested_name
    }

    /// Like [`Self::matches_exact`], but a rule registered against a wildcard
    /// original name (`"drv_*"`) also applies to every type name it matches.
    pub fn matches_original(&self, requested: Option<&dyn ObjectWrapper>, requested_name: &str) -> bool {
        if self.matches_exact(requested, requested_name) {
            return true;
        }

        let name = self.orig_type_name.as_str();
        self.orig_type.is_none()
            && !requested_name.is_empty()
            && glob::has_wildcard(name)
            && glob::is_match(name, requested_name)
    }

    /// A copy of a wildcard rule seeded into a concrete type's queue.
    pub fn is_wildcard(&self) -> bool {
        self.orig_type.is_none() && glob::has_wildcard(&self.orig_type_name)
    }

    pub fn matches_path(&self, full_inst_path: &str) -> bool {
        glob::is_match(&self.full_inst_path, full_inst_path)
    }

    /// Same (original, override, path) tuple.
    pub fn is_duplicate_of(&self, other: &FactoryOverride) -> bool {
        let same_orig = match (self.orig_type.as_deref(), other.orig_type.as_deref()) {
            (Some(a), Some(b)) => same_type(a, b),
            (None, None) => self.orig_type_name == other.orig_type_name,
            _ => false,
        };
        same_orig
            && same_type(self.ovrd_type.as_ref(), other.ovrd_type.as_ref())
            && self.full_inst_path == other.full_inst_path
    }
}
