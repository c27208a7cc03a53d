// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Factory Application Service
//!
//! Owns every registered wrapper and every override rule, and resolves a
//! requested type to the type that must actually be created.
//!
//! # Resolution Order
//!
//! ```text
//! find_override(requested, path)
//!     requested already on the resolution path  -> OVRDLOOP, return requested
//!     first instance override (type + path glob) -> recurse into its target
//!     first type override (exact type)           -> recurse into its target
//!     otherwise                                  -> requested
//! ```
//!
//! A debug pass walks the same tables without short-circuiting and records
//! every candidate so [`Factory::debug_create_by_name`] can explain the result.
//!
//! One factory exists per [`crate::application::simulation::Simulation`];
//! every diagnostic goes through the simulation's reporter.

use crate::application::factory_print::{render_configuration, render_debug, PrintScope};
use crate::domain::component_tree::ComponentId;
use crate::domain::factory_override::FactoryOverride;
use crate::domain::glob;
use crate::domain::object::{Component, Object};
use crate::domain::report::{ids, Reporter};
use crate::domain::wrapper::{display_name, same_type, ObjectWrapper, TypeKey, WrapperKind};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Bookkeeping for a single resolution.
#[derive(Default)]
struct Resolution {
    debug: bool,
    /// Types entered so far, in order.
    path: Vec<TypeKey>,
    path_names: Vec<String>,
    /// Overrides that matched, in the order they were considered.
    considered: Vec<FactoryOverride>,
}

impl Resolution {
    fn debug_pass() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }
}

/// `parent_inst_path + "." + name`, or either alone if the other is empty.
pub fn full_inst_path(parent_inst_path: &str, name: &str) -> String {
    match (parent_inst_path.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => parent_inst_path.to_string(),
        (false, false) => format!("{}.{}", parent_inst_path, name),
    }
}

pub struct Factory {
    reporter: Arc<dyn Reporter>,
    /// Registered wrappers in registration order.
    types: Vec<Arc<dyn ObjectWrapper>>,
    type_keys: HashSet<TypeKey>,
    type_names: HashMap<String, Arc<dyn ObjectWrapper>>,
    type_overrides: Vec<FactoryOverride>,
    inst_override_queues: HashMap<TypeKey, Vec<FactoryOverride>>,
    /// Instance overrides for types known only by name so far.
    inst_override_name_queues: HashMap<String, Vec<FactoryOverride>>,
    wildcard_inst_overrides: Vec<FactoryOverride>,
    /// Original type names referenced by type overrides before registration.
    lookup_strs: HashSet<String>,
}

impl Factory {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            types: Vec::new(),
            type_keys: HashSet::new(),
            type_names: HashMap::new(),
            type_overrides: Vec::new(),
            inst_override_queues: HashMap::new(),
            inst_override_name_queues: HashMap::new(),
            wildcard_inst_overrides: Vec::new(),
            lookup_strs: HashSet::new(),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a wrapper. Re-registering a type, or claiming a type name that
    /// another type already owns, only warns.
    pub fn register(&mut self, wrapper: Arc<dyn ObjectWrapper>) {
        let name = wrapper.type_name().to_string();
        let key = wrapper.type_key();

        if !name.is_empty() {
            match self.type_names.get(&name) {
                Some(existing) if !same_type(existing.as_ref(), wrapper.as_ref()) => {
                    self.reporter.warning(
                        ids::TPRGED,
                        &format!(
                            "Type name '{}' already registered with factory. No string-based lookup \
                             support for multiple types with the same type name.",
                            name
                        ),
                    );
                }
                Some(_) => {}
                None => {
                    self.type_names.insert(name.clone(), wrapper.clone());
                }
            }
        }

        if self.type_keys.contains(&key) {
            self.reporter.warning(
                ids::TPRGED,
                &format!(
                    "Object type '{}' already registered with factory.",
                    display_name(wrapper.as_ref())
                ),
            );
            return;
        }

        self.type_keys.insert(key);
        self.types.push(wrapper.clone());
        debug!(type_name = %display_name(wrapper.as_ref()), kind = %wrapper.kind(), "Registered type with factory");

        if name.is_empty() {
            return;
        }

        // Instance overrides filed against the name before the type existed
        if let Some(pending) = self.inst_override_name_queues.remove(&name) {
            let queue = self.inst_override_queues.entry(key).or_default();
            for mut ovr in pending {
                ovr.orig_type = Some(wrapper.clone());
                queue.push(ovr);
            }
        }

        if !self.wildcard_inst_overrides.is_empty() {
            let seeded: Vec<FactoryOverride> = self
                .wildcard_inst_overrides
                .iter()
                .filter(|ovr| glob::is_match(&ovr.orig_type_name, &name))
                .cloned()
                .collect();
            self.inst_override_queues.entry(key).or_default().extend(seeded);
        }

        if self.lookup_strs.remove(&name) {
            for ovr in self
                .type_overrides
                .iter_mut()
                .filter(|ovr| ovr.orig_type.is_none() && ovr.orig_type_name == name)
            {
                ovr.orig_type = Some(wrapper.clone());
            }
        }
    }

    pub fn is_type_registered(&self, wrapper: &dyn ObjectWrapper) -> bool {
        self.type_keys.contains(&wrapper.type_key())
    }

    pub fn is_type_name_registered(&self, type_name: &str) -> bool {
        self.type_names.contains_key(type_name)
    }

    /// Wrapper registered under `type_name`, warning when there is none.
    pub fn find_wrapper_by_name(&self, type_name: &str) -> Option<Arc<dyn ObjectWrapper>> {
        let found = self.type_names.get(type_name).cloned();
        if found.is_none() {
            self.reporter.warning(
                ids::UNKNOWN_TYPE_NAME,
                &format!("find_wrapper_by_name: Type name '{}' not registered with the factory.", type_name),
            );
        }
        found
    }

    /// Registered type names, in registration order.
    pub fn registered_type_names(&self) -> Vec<String> {
        self.types
            .iter()
            .filter(|w| !w.type_name().is_empty())
            .map(|w| w.type_name().to_string())
            .collect()
    }

    pub fn type_override_count(&self) -> usize {
        self.type_overrides.len()
    }

    /// Instance overrides on file, counting queued copies of wildcard rules.
    pub fn inst_override_count(&self) -> usize {
        self.inst_override_queues.values().map(Vec::len).sum::<usize>()
            + self.inst_override_name_queues.values().map(Vec::len).sum::<usize>()
            + self.wildcard_inst_overrides.len()
    }

    // ========================================================================
    // Type overrides
    // ========================================================================

    pub fn set_type_override_by_type(
        &mut self,
        original: Arc<dyn ObjectWrapper>,
        override_type: Arc<dyn ObjectWrapper>,
        replace: bool,
    ) {
        if same_type(original.as_ref(), override_type.as_ref()) {
            self.reporter.warning(
                ids::TYPDUP,
                &format!(
                    "Original and override type arguments are identical: {}",
                    display_name(original.as_ref())
                ),
            );
            return;
        }

        if !self.is_type_registered(original.as_ref()) {
            self.register(original.clone());
        }
        if !self.is_type_registered(override_type.as_ref()) {
            self.register(override_type.clone());
        }

        let original_name = original.type_name().to_string();
        let entry = FactoryOverride::new("*", Some(original.clone()), original_name.clone(), override_type);
        let existing = self
            .type_overrides
            .iter()
            .position(|ovr| ovr.matches_exact(Some(original.as_ref()), &original_name));

        self.file_type_override(entry, existing, replace);
    }

    pub fn set_type_override_by_name(&mut self, original_type_name: &str, override_type_name: &str, replace: bool) {
        let original = self.type_names.get(original_type_name).cloned();
        let Some(override_type) = self.type_names.get(override_type_name).cloned() else {
            self.reporter.error(
                ids::TYPNTF,
                &format!(
                    "Cannot register override for original type '{}' because the override type '{}' \
                     is not registered with the factory.",
                    original_type_name, override_type_name
                ),
            );
            return;
        };

        if original_type_name == override_type_name {
            self.reporter.warning(
                ids::TYPDUP,
                &format!(
                    "Requested and actual type name arguments are identical: {}. Ignoring override.",
                    original_type_name
                ),
            );
            return;
        }

        if original.is_none() {
            self.lookup_strs.insert(original_type_name.to_string());
        }

        let entry = FactoryOverride::new("*", original, original_type_name, override_type);
        let existing = self
            .type_overrides
            .iter()
            .position(|ovr| ovr.orig_type_name == original_type_name);

        self.file_type_override(entry, existing, replace);
    }

    fn file_type_override(&mut self, entry: FactoryOverride, existing: Option<usize>, replace: bool) {
        let Some(index) = existing else {
            debug!(
                original = %entry.orig_type_name,
                override_type = %entry.ovrd_type_name,
                "Added type override"
            );
            self.type_overrides.push(entry);
            return;
        };

        let current = &mut self.type_overrides[index];
        let msg = format!(
            "Original object type '{}' already registered to produce '{}'",
            entry.orig_type_name, current.ovrd_type_name
        );
        if !replace {
            self.reporter.info(
                ids::TPREGD,
                &format!("{}.  Set 'replace' argument to replace the existing entry.", msg),
            );
            return;
        }

        self.reporter.info(
            ids::TPREGR,
            &format!("{}.  Replacing with override to produce type '{}'.", msg, entry.ovrd_type_name),
        );
        *current = entry;
    }

    // ========================================================================
    // Instance overrides
    // ========================================================================

    pub fn set_inst_override_by_type(
        &mut self,
        original: Arc<dyn ObjectWrapper>,
        override_type: Arc<dyn ObjectWrapper>,
        full_inst_path: &str,
    ) {
        if !self.is_type_registered(original.as_ref()) {
            self.register(original.clone());
        }
        if !self.is_type_registered(override_type.as_ref()) {
            self.register(override_type.clone());
        }

        let name = original.type_name().to_string();
        let entry = FactoryOverride::new(full_inst_path, Some(original.clone()), name, override_type);
        let queue = self.inst_override_queues.entry(original.type_key()).or_default();
        if Self::check_inst_override_exists(self.reporter.as_ref(), queue, &entry) {
            return;
        }
        queue.push(entry);
    }

    pub fn set_inst_override_by_name(&mut self, original_type_name: &str, override_type_name: &str, full_inst_path: &str) {
        let original = self.type_names.get(original_type_name).cloned();
        let Some(override_type) = self.type_names.get(override_type_name).cloned() else {
            self.reporter.error(
                ids::TYPNTF,
                &format!(
                    "Cannot register instance override with type name '{}' and instance path '{}' \
                     because the type it's supposed to produce, '{}', is not registered with the factory.",
                    original_type_name, full_inst_path, override_type_name
                ),
            );
            return;
        };

        let entry = FactoryOverride::new(full_inst_path, original.clone(), original_type_name, override_type);

        if let Some(original) = original {
            let queue = self.inst_override_queues.entry(original.type_key()).or_default();
            if Self::check_inst_override_exists(self.reporter.as_ref(), queue, &entry) {
                return;
            }
            queue.push(entry);
            return;
        }

        if glob::has_wildcard(original_type_name) {
            let mut matching: Vec<String> = self
                .type_names
                .keys()
                .filter(|name| glob::is_match(original_type_name, name))
                .cloned()
                .collect();
            matching.sort();
            for name in matching {
                self.set_inst_override_by_name(&name, override_type_name, full_inst_path);
            }
            if !Self::check_inst_override_exists(self.reporter.as_ref(), &self.wildcard_inst_overrides, &entry) {
                self.wildcard_inst_overrides.push(entry);
            }
            return;
        }

        let queue = self
            .inst_override_name_queues
            .entry(original_type_name.to_string())
            .or_default();
        if Self::check_inst_override_exists(self.reporter.as_ref(), queue, &entry) {
            return;
        }
        queue.push(entry);
    }

    fn check_inst_override_exists(reporter: &dyn Reporter, queue: &[FactoryOverride], entry: &FactoryOverride) -> bool {
        let exists = queue.iter().any(|ovr| ovr.is_duplicate_of(entry));
        if exists {
            reporter.warning(
                ids::DUPOVRD,
                &format!(
                    "Instance override for '{}' already exists: override type '{}' with full_inst_path '{}'",
                    entry.orig_type_name, entry.ovrd_type_name, entry.full_inst_path
                ),
            );
        }
        exists
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve `requested` at `full_inst_path` to the type that must be built.
    pub fn find_override_by_type(&self, requested: &Arc<dyn ObjectWrapper>, full_inst_path: &str) -> Arc<dyn ObjectWrapper> {
        let mut res = Resolution::default();
        self.resolve_by_type(requested, full_inst_path, &mut res)
    }

    /// Resolve a type name. `None` when neither the name nor any name-keyed
    /// override leads to a registered type.
    pub fn find_override_by_name(&mut self, requested_type_name: &str, full_inst_path: &str) -> Option<Arc<dyn ObjectWrapper>> {
        let mut res = Resolution::default();
        self.resolve_by_name(requested_type_name, full_inst_path, &mut res)
    }

    fn resolve_by_type(
        &self,
        requested: &Arc<dyn ObjectWrapper>,
        full_inst_path: &str,
        res: &mut Resolution,
    ) -> Arc<dyn ObjectWrapper> {
        let key = requested.type_key();
        let requested_name = requested.type_name();

        if res.path.contains(&key) {
            let mut chain = res.path_names.clone();
            chain.push(display_name(requested.as_ref()).to_string());
            self.reporter.error(
                ids::OVRDLOOP,
                &format!("Recursive loop detected while finding override: {}", chain.join(" -> ")),
            );
            return requested.clone();
        }
        res.path.push(key);
        res.path_names.push(display_name(requested.as_ref()).to_string());

        let mut chosen: Option<Arc<dyn ObjectWrapper>> = None;

        // Instance overrides take precedence over type overrides
        let inst_matches = self
            .inst_override_queues
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|ovr| ovr.matches_original(Some(requested.as_ref()), requested_name) && ovr.matches_path(full_inst_path));

        let type_matches = self
            .type_overrides
            .iter()
            .filter(|ovr| ovr.matches_exact(Some(requested.as_ref()), requested_name));

        for ovr in inst_matches.chain(type_matches) {
            let mut record = ovr.clone();
            if res.debug {
                if chosen.is_none() {
                    chosen = Some(ovr.ovrd_type.clone());
                    record.selected = true;
                }
                res.considered.push(record);
                continue;
            }

            res.considered.push(record);
            return self.follow(requested, &ovr.ovrd_type, full_inst_path, res);
        }

        match chosen {
            Some(target) => self.follow(requested, &target, full_inst_path, res),
            None => requested.clone(),
        }
    }

    /// Fixpoint step: an override onto the requested type itself ends the chain.
    fn follow(
        &self,
        requested: &Arc<dyn ObjectWrapper>,
        target: &Arc<dyn ObjectWrapper>,
        full_inst_path: &str,
        res: &mut Resolution,
    ) -> Arc<dyn ObjectWrapper> {
        if same_type(target.as_ref(), requested.as_ref()) {
            requested.clone()
        } else {
            self.resolve_by_type(target, full_inst_path, res)
        }
    }

    fn resolve_by_name(
        &mut self,
        requested_type_name: &str,
        full_inst_path: &str,
        res: &mut Resolution,
    ) -> Option<Arc<dyn ObjectWrapper>> {
        if let Some(rtype) = self.type_names.get(requested_type_name).cloned() {
            let key = rtype.type_key();
            if !self.inst_override_queues.contains_key(&key) && !self.wildcard_inst_overrides.is_empty() {
                let seeded: Vec<FactoryOverride> = self
                    .wildcard_inst_overrides
                    .iter()
                    .filter(|ovr| glob::is_match(&ovr.orig_type_name, requested_type_name))
                    .cloned()
                    .collect();
                self.inst_override_queues.insert(key, seeded);
            }
            return Some(self.resolve_by_type(&rtype, full_inst_path, res));
        }

        // Name-only: degrade to the pending queues, then to wildcard rules
        // whose original name covers the requested one
        let mut chosen: Option<Arc<dyn ObjectWrapper>> = None;
        let inst_matches = self
            .inst_override_name_queues
            .get(requested_type_name)
            .into_iter()
            .flatten()
            .chain(self.wildcard_inst_overrides.iter())
            .filter(|ovr| ovr.matches_original(None, requested_type_name) && ovr.matches_path(full_inst_path));
        let type_matches = self
            .type_overrides
            .iter()
            .filter(|ovr| ovr.orig_type_name == requested_type_name);

        for ovr in inst_matches.chain(type_matches) {
            let mut record = ovr.clone();
            if res.debug {
                if chosen.is_none() {
                    chosen = Some(ovr.ovrd_type.clone());
                    record.selected = true;
                }
                res.considered.push(record);
                continue;
            }

            res.considered.push(record);
            return Some(self.resolve_by_type(&ovr.ovrd_type, full_inst_path, res));
        }

        chosen.map(|target| self.resolve_by_type(&target, full_inst_path, res))
    }

    // ========================================================================
    // Creation
    // ========================================================================

    pub fn create_object_by_type(
        &self,
        requested: &Arc<dyn ObjectWrapper>,
        parent_inst_path: &str,
        name: &str,
    ) -> Option<Box<dyn Object>> {
        let path = full_inst_path(parent_inst_path, name);
        let resolved = self.find_override_by_type(requested, &path);
        self.instantiate_object(&resolved, &path, name)
    }

    pub fn create_object_by_name(
        &mut self,
        requested_type_name: &str,
        parent_inst_path: &str,
        name: &str,
    ) -> Option<Box<dyn Object>> {
        let path = full_inst_path(parent_inst_path, name);
        let resolved = self.resolve_requested_name(requested_type_name, &path, WrapperKind::Object)?;
        self.instantiate_object(&resolved, &path, name)
    }

    pub fn create_component_by_type(
        &self,
        requested: &Arc<dyn ObjectWrapper>,
        parent_inst_path: &str,
        name: &str,
        parent: ComponentId,
    ) -> Option<Arc<dyn Component>> {
        let path = full_inst_path(parent_inst_path, name);
        let resolved = self.find_override_by_type(requested, &path);
        self.instantiate_component(&resolved, &path, name, parent)
    }

    pub fn create_component_by_name(
        &mut self,
        requested_type_name: &str,
        parent_inst_path: &str,
        name: &str,
        parent: ComponentId,
    ) -> Option<Arc<dyn Component>> {
        let path = full_inst_path(parent_inst_path, name);
        let resolved = self.resolve_requested_name(requested_type_name, &path, WrapperKind::Component)?;
        self.instantiate_component(&resolved, &path, name, parent)
    }

    fn resolve_requested_name(
        &mut self,
        requested_type_name: &str,
        full_inst_path: &str,
        kind: WrapperKind,
    ) -> Option<Arc<dyn ObjectWrapper>> {
        let resolved = self
            .find_override_by_name(requested_type_name, full_inst_path)
            .or_else(|| self.type_names.get(requested_type_name).cloned());

        if resolved.is_none() {
            self.reporter.warning(
                ids::BDTYP,
                &format!(
                    "Cannot create {} of type '{}' because it is not registered with the factory.",
                    article(kind),
                    requested_type_name
                ),
            );
        }
        resolved
    }

    fn instantiate_object(&self, wrapper: &Arc<dyn ObjectWrapper>, path: &str, name: &str) -> Option<Box<dyn Object>> {
        let created = wrapper.create_object(name);
        match &created {
            Some(_) => debug!(type_name = %display_name(wrapper.as_ref()), path = %path, "Created object"),
            None => self.report_wrong_kind(wrapper, WrapperKind::Object, path),
        }
        created
    }

    fn instantiate_component(
        &self,
        wrapper: &Arc<dyn ObjectWrapper>,
        path: &str,
        name: &str,
        parent: ComponentId,
    ) -> Option<Arc<dyn Component>> {
        let created = wrapper.create_component(name, parent);
        match &created {
            Some(_) => debug!(type_name = %display_name(wrapper.as_ref()), path = %path, "Created component"),
            None => self.report_wrong_kind(wrapper, WrapperKind::Component, path),
        }
        created
    }

    fn report_wrong_kind(&self, wrapper: &Arc<dyn ObjectWrapper>, wanted: WrapperKind, path: &str) {
        self.reporter.warning(
            ids::CRTKIND,
            &format!(
                "Cannot create {} at '{}': the factory resolved type '{}', which is {}.",
                article(wanted),
                path,
                display_name(wrapper.as_ref()),
                article(wrapper.kind())
            ),
        );
    }

    // ========================================================================
    // Debug and printing
    // ========================================================================

    fn has_wildcard_inst_override_for(&self, requested_type_name: &str) -> bool {
        self.wildcard_inst_overrides
            .iter()
            .any(|ovr| ovr.matches_original(None, requested_type_name))
    }

    /// Explain how a by-name request at the given location would resolve.
    /// `None` when the name is unknown to the factory.
    pub fn debug_create_by_name(&mut self, requested_type_name: &str, parent_inst_path: &str, name: &str) -> Option<String> {
        if !self.type_names.contains_key(requested_type_name)
            && !self.lookup_strs.contains(requested_type_name)
            && !self.inst_override_name_queues.contains_key(requested_type_name)
            && !self.has_wildcard_inst_override_for(requested_type_name)
        {
            self.reporter.warning(
                ids::FACTORY,
                &format!("The factory does not recognize '{}' as a registered type.", requested_type_name),
            );
            return None;
        }

        let path = full_inst_path(parent_inst_path, name);
        let mut res = Resolution::debug_pass();
        let result = self.resolve_by_name(requested_type_name, &path, &mut res);
        let result_name = result
            .as_ref()
            .map(|w| display_name(w.as_ref()).to_string())
            .unwrap_or_else(|| requested_type_name.to_string());

        let text = render_debug(requested_type_name, &path, &res.considered, &result_name);
        self.reporter.info(ids::FACTORY, &text);
        Some(text)
    }

    /// Explain how a by-type request at the given location would resolve.
    pub fn debug_create_by_type(&mut self, requested: &Arc<dyn ObjectWrapper>, parent_inst_path: &str, name: &str) -> String {
        if !self.is_type_registered(requested.as_ref()) {
            self.register(requested.clone());
        }

        let path = full_inst_path(parent_inst_path, name);
        let mut res = Resolution::debug_pass();
        let result = self.resolve_by_type(requested, &path, &mut res);

        let text = render_debug(
            display_name(requested.as_ref()),
            &path,
            &res.considered,
            display_name(result.as_ref()),
        );
        self.reporter.info(ids::FACTORY, &text);
        text
    }

    /// Render the override tables and, depending on `scope`, the registered
    /// type names.
    pub fn render(&self, scope: PrintScope) -> String {
        // Seeded copies of wildcard rules are listed once, from the wildcard list
        let mut inst_overrides: Vec<&FactoryOverride> = self
            .types
            .iter()
            .filter_map(|w| self.inst_override_queues.get(&w.type_key()))
            .flatten()
            .filter(|ovr| !ovr.is_wildcard())
            .collect();

        let mut pending: Vec<&String> = self.inst_override_name_queues.keys().collect();
        pending.sort();
        for name in pending {
            inst_overrides.extend(self.inst_override_name_queues[name].iter());
        }
        inst_overrides.extend(self.wildcard_inst_overrides.iter());

        let type_names: Option<Vec<&str>> = match scope {
            PrintScope::Overrides => None,
            PrintScope::User | PrintScope::All => Some(
                self.types
                    .iter()
                    .map(|w| w.type_name())
                    .filter(|name| !name.is_empty())
                    .filter(|name| scope == PrintScope::All || !name.starts_with(LIBRARY_TYPE_PREFIX))
                    .collect(),
            ),
        };

        render_configuration(&inst_overrides, &self.type_overrides, type_names.as_deref(), self.types.len())
    }

    /// Render and emit the configuration through the reporter.
    pub fn print(&self, scope: PrintScope) -> String {
        let text = self.render(scope);
        self.reporter.info(ids::FACTORY, &text);
        text
    }
}

/// Type names reserved for types the library itself registers.
pub const LIBRARY_TYPE_PREFIX: &str = "tb_";

fn article(kind: WrapperKind) -> &'static str {
    match kind {
        WrapperKind::Object => "an object",
        WrapperKind::Component => "a component",
    }
}
