//! In-memory manifest registry
//!
//! An ordered keyed store. Iteration follows first-registration order;
//! re-registering an id replaces the manifest in its existing slot. Removed
//! slots are tombstoned and compacted once they outnumber live entries.
//!
//! Every entry keeps the manifest's JSON document next to the typed value so
//! discovery can evaluate path queries without re-serializing.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RegistryError;
use crate::models::{Manifest, ManifestMetadata};
use crate::validation::{validate_document, validate_manifest, ValidationIssue};

/// Tombstones tolerated before compaction is considered
const COMPACTION_FLOOR: usize = 32;

/// One stored manifest
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    manifest: Arc<Manifest>,
    document: Value,
}

impl RegistryEntry {
    fn new(manifest: Manifest) -> Result<Self, RegistryError> {
        let document = serde_json::to_value(&manifest)?;
        Ok(Self {
            manifest: Arc::new(manifest),
            document,
        })
    }

    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    /// The manifest as a JSON document
    pub fn document(&self) -> &Value {
        &self.document
    }
}

/// Outcome of `register`: `{success, errors}`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Registration {
    pub success: bool,
    pub id: String,
    /// True when an existing manifest with this id was overwritten
    pub replaced: bool,
    pub errors: Vec<ValidationIssue>,
}

impl Registration {
    fn accepted(id: &str, replaced: bool) -> Self {
        Self {
            success: true,
            id: id.to_string(),
            replaced,
            errors: Vec::new(),
        }
    }

    fn rejected(id: &str, errors: Vec<ValidationIssue>) -> Self {
        Self {
            success: false,
            id: id.to_string(),
            replaced: false,
            errors,
        }
    }

    /// All validation errors joined into one message
    pub fn error(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Ordered keyed store of manifests
#[derive(Debug)]
pub struct Registry {
    instance: Uuid,
    generation: u64,
    slots: Vec<Option<RegistryEntry>>,
    index: HashMap<String, usize>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            instance: Uuid::new_v4(),
            generation: 0,
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Unique id of this registry instance
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// Bumped by every mutation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store a manifest, composing it with its `extends` base first.
    ///
    /// Missing `id` or `element.type` and an unregistered base are reported
    /// in the returned [`Registration`]; only a circular `extends` chain is an
    /// error.
    pub fn register(&mut self, manifest: Manifest) -> Result<Registration, RegistryError> {
        self.register_from(manifest, None)
    }

    /// `source` is the document the manifest was parsed from, when there is
    /// one; composition merges its keys rather than the typed re-serialization.
    fn register_from(
        &mut self,
        manifest: Manifest,
        source: Option<Value>,
    ) -> Result<Registration, RegistryError> {
        let report = validate_manifest(&manifest);
        if !report.valid {
            debug!(id = %manifest.id, errors = report.errors.len(), "manifest rejected");
            return Ok(Registration::rejected(&manifest.id, report.errors));
        }

        let manifest = match manifest.extends.as_deref() {
            Some(base) if !self.has(base) => {
                let issue = ValidationIssue::new(
                    "extends",
                    format!("base manifest '{}' is not registered", base),
                );
                return Ok(Registration::rejected(&manifest.id, vec![issue]));
            }
            Some(_) => self.compose(manifest, source)?,
            None => manifest,
        };

        let id = manifest.id.clone();
        let entry = RegistryEntry::new(manifest)?;
        let replaced = match self.index.get(&id) {
            Some(&slot) => {
                self.slots[slot] = Some(entry);
                debug!(id = %id, "manifest replaced in place");
                true
            }
            None => {
                self.index.insert(id.clone(), self.slots.len());
                self.slots.push(Some(entry));
                info!(id = %id, "manifest registered");
                false
            }
        };
        self.generation += 1;

        Ok(Registration::accepted(&id, replaced))
    }

    /// Register from a raw JSON document.
    ///
    /// `null` is a caller error. Documents that fail the manifest schema are
    /// reported as a failed [`Registration`].
    pub fn register_value(&mut self, document: Value) -> Result<Registration, RegistryError> {
        if document.is_null() {
            return Err(RegistryError::MissingManifest);
        }

        let id = document
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let report = validate_document(&document);
        if !report.valid {
            return Ok(Registration::rejected(&id, report.errors));
        }

        match serde_json::from_value::<Manifest>(document.clone()) {
            Ok(manifest) => self.register_from(manifest, Some(document)),
            Err(e) => Ok(Registration::rejected(
                &id,
                vec![ValidationIssue::new("/", e.to_string())],
            )),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Manifest>> {
        self.entry(id).map(RegistryEntry::manifest)
    }

    pub fn entry(&self, id: &str) -> Option<&RegistryEntry> {
        self.index
            .get(id)
            .and_then(|&slot| self.slots[slot].as_ref())
    }

    pub fn has(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Remove a manifest; false when the id is unknown
    pub fn unregister(&mut self, id: &str) -> bool {
        let Some(slot) = self.index.remove(id) else {
            return false;
        };
        self.slots[slot] = None;
        self.generation += 1;
        info!(id = %id, "manifest unregistered");
        self.maybe_compact();
        true
    }

    pub fn clear(&mut self) {
        let removed = self.index.len();
        self.slots.clear();
        self.index.clear();
        self.generation += 1;
        info!(removed, "registry cleared");
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Manifests in first-registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Manifest>> {
        self.entries().map(RegistryEntry::manifest)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.slots.iter().flatten()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|m| m.id.as_str())
    }

    /// Visit every manifest in order
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Manifest),
    {
        for manifest in self.iter() {
            f(manifest);
        }
    }

    /// Apply an RFC 6902 patch to a stored manifest.
    ///
    /// The patched manifest keeps its slot and gets `metadata.modified`
    /// stamped. A patch that breaks validation or changes the id leaves the
    /// registry untouched and is reported in the returned [`Registration`].
    pub fn apply_patch(
        &mut self,
        id: &str,
        patch: &json_patch::Patch,
    ) -> Result<Registration, RegistryError> {
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let mut document = self.slots[slot]
            .as_ref()
            .map(|entry| entry.document.clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        json_patch::patch(&mut document, patch).map_err(|e| RegistryError::Patch {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

        let mut manifest: Manifest = match serde_json::from_value(document) {
            Ok(manifest) => manifest,
            Err(e) => {
                return Ok(Registration::rejected(
                    id,
                    vec![ValidationIssue::new("/", e.to_string())],
                ))
            }
        };

        let mut errors = validate_manifest(&manifest).errors;
        if manifest.id != id {
            errors.push(ValidationIssue::new(
                "id",
                format!("patch must not change id ({} -> {})", id, manifest.id),
            ));
        }
        if !errors.is_empty() {
            return Ok(Registration::rejected(id, errors));
        }

        manifest
            .metadata
            .get_or_insert_with(ManifestMetadata::default)
            .modified = Some(Utc::now());

        self.slots[slot] = Some(RegistryEntry::new(manifest)?);
        self.generation += 1;
        info!(id = %id, ops = patch.0.len(), "manifest patched");

        Ok(Registration::accepted(id, true))
    }

    /// Merge `manifest` onto its base. Bases are stored already composed, so
    /// one merge step covers the whole chain; the chain is still walked to
    /// reject cycles.
    fn compose(
        &self,
        manifest: Manifest,
        source: Option<Value>,
    ) -> Result<Manifest, RegistryError> {
        let mut path = vec![manifest.id.clone()];
        let mut next = manifest.extends.clone();

        while let Some(base_id) = next {
            if path.contains(&base_id) {
                path.push(base_id);
                return Err(RegistryError::CircularInheritance { chain: path });
            }
            // an ancestor removed after its descendants were composed ends the walk
            next = self.get(&base_id).and_then(|base| base.extends.clone());
            path.push(base_id);
        }

        let base_id = &path[1];
        let base_document = match self.entry(base_id) {
            Some(entry) => entry.document.clone(),
            None => return Err(RegistryError::NotFound(base_id.clone())),
        };
        let child = match source {
            Some(document) => document,
            None => serde_json::to_value(&manifest)?,
        };
        let merged = merge_sections(base_document, child);
        debug!(id = %manifest.id, base = %base_id, depth = path.len() - 1, "manifest composed");
        Ok(serde_json::from_value(merged)?)
    }

    fn maybe_compact(&mut self) {
        let tombstones = self.slots.len() - self.index.len();
        if tombstones < COMPACTION_FLOOR || tombstones <= self.index.len() {
            return;
        }
        self.slots.retain(Option::is_some);
        self.index = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|e| (e.manifest.id.clone(), slot)))
            .collect();
        debug!(live = self.index.len(), dropped = tombstones, "registry compacted");
    }
}

/// Shallow per-section merge: object sections merge key by key with the
/// child winning, everything else is replaced by the child's value.
fn merge_sections(base: Value, child: Value) -> Value {
    let (Value::Object(mut merged), Value::Object(child)) = (base, child) else {
        return Value::Null;
    };

    for (key, child_value) in child {
        let combined = match (merged.remove(&key), child_value) {
            (Some(Value::Object(mut base_section)), Value::Object(child_section)) => {
                base_section.extend(child_section);
                Value::Object(base_section)
            }
            (_, child_value) => child_value,
        };
        merged.insert(key, combined);
    }

    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ValidationRule, ValidationSpec};
    use serde_json::json;

    fn registry_with(ids: &[&str]) -> Registry {
        let mut registry = Registry::new();
        for id in ids {
            registry.register(Manifest::new(*id, "action")).unwrap();
        }
        registry
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = Registry::new();
        let manifest = Manifest::new("a", "action").with_intent("submit");
        let outcome = registry.register(manifest.clone()).unwrap();

        assert!(outcome.success);
        assert!(!outcome.replaced);
        assert_eq!(registry.get("a").map(|m| m.as_ref()), Some(&manifest));
        assert!(registry.has("a"));
        assert!(!registry.has("b"));
    }

    #[test]
    fn test_validation_failure_is_a_value() {
        let mut registry = Registry::new();
        let outcome = registry.register(Manifest::new("a", "")).unwrap();
        assert!(!outcome.success);
        assert!(outcome.error().unwrap().contains("element.type"));
        assert!(registry.is_empty());
        assert_eq!(registry.generation(), 0);
    }

    #[test]
    fn test_null_document_is_fatal() {
        let mut registry = Registry::new();
        let err = registry.register_value(Value::Null).unwrap_err();
        assert!(matches!(err, RegistryError::MissingManifest));
    }

    #[test]
    fn test_register_value_rejects_bad_shape() {
        let mut registry = Registry::new();
        let outcome = registry
            .register_value(json!({"id": "a", "element": {"type": 3}}))
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.id, "a");

        let outcome = registry
            .register_value(json!({"id": "a", "element": {"type": "action"}}))
            .unwrap();
        assert!(outcome.success);
    }

    #[test]
    fn test_reregister_keeps_position() {
        let mut registry = registry_with(&["a", "b", "c"]);
        let outcome = registry
            .register(Manifest::new("a", "input").with_label("changed"))
            .unwrap();

        assert!(outcome.replaced);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(registry.get("a").unwrap().element.kind, "input");
    }

    #[test]
    fn test_unregister_and_reinsert_goes_last() {
        let mut registry = registry_with(&["a", "b", "c"]);
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        registry.register(Manifest::new("a", "action")).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_compaction_preserves_order() {
        let ids: Vec<String> = (0..100).map(|i| format!("m{}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut registry = registry_with(&refs);

        for id in ids.iter().take(80) {
            assert!(registry.unregister(id));
        }
        assert_eq!(registry.len(), 20);
        assert!(registry.slots.len() < 100);

        let remaining: Vec<&str> = registry.ids().collect();
        assert_eq!(remaining, refs[80..].to_vec());
        assert!(registry.get("m99").is_some());
    }

    #[test]
    fn test_clear() {
        let mut registry = registry_with(&["a", "b"]);
        let before = registry.generation();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get("a").is_none());
        assert!(registry.generation() > before);
    }

    #[test]
    fn test_extends_merges_sections() {
        let mut registry = Registry::new();
        registry
            .register(
                Manifest::new("base-button", "action")
                    .with_label("Button")
                    .with_context("theme", "dark")
                    .with_context("size", "md")
                    .with_tags(["ui"]),
            )
            .unwrap();

        let child = Manifest::new("submit", "action")
            .with_extends("base-button")
            .with_intent("submit")
            .with_context("size", "lg");
        registry.register(child).unwrap();

        let composed = registry.get("submit").unwrap();
        assert_eq!(composed.element.label.as_deref(), Some("Button"));
        assert_eq!(composed.element.intent.as_deref(), Some("submit"));
        let context = composed.context.as_ref().unwrap();
        assert_eq!(context["theme"], "dark");
        assert_eq!(context["size"], "lg");
        assert_eq!(composed.tags(), ["ui".to_string()]);
        assert_eq!(composed.extends.as_deref(), Some("base-button"));
    }

    fn base_with_metadata() -> Manifest {
        let mut base = Manifest::new("base", "input").with_tags(["ui"]);
        if let Some(metadata) = base.metadata.as_mut() {
            metadata.version = Some("2.0.0".into());
        }
        base.validation = Some(ValidationSpec {
            rules: vec![ValidationRule {
                field: "value".into(),
                kind: "required".into(),
                value: None,
                message: None,
            }],
            is_async: None,
        });
        base
    }

    #[test]
    fn test_extends_keeps_base_fields_the_child_leaves_unset() {
        let mut registry = Registry::new();
        registry.register(base_with_metadata()).unwrap();

        let mut child = Manifest::new("child", "input").with_extends("base");
        child.metadata = Some(ManifestMetadata {
            author: Some("me".into()),
            ..ManifestMetadata::default()
        });
        child.validation = Some(ValidationSpec {
            rules: Vec::new(),
            is_async: Some(true),
        });
        assert!(registry.register(child).unwrap().success);

        let composed = registry.get("child").unwrap();
        let metadata = composed.metadata.as_ref().unwrap();
        assert_eq!(metadata.author.as_deref(), Some("me"));
        assert_eq!(metadata.version(), "2.0.0");
        assert_eq!(metadata.tags, vec!["ui".to_string()]);
        let validation = composed.validation.as_ref().unwrap();
        assert_eq!(validation.rules.len(), 1);
        assert_eq!(validation.is_async, Some(true));
    }

    #[test]
    fn test_register_value_merges_only_written_keys() {
        let mut registry = Registry::new();
        registry.register(base_with_metadata()).unwrap();

        let outcome = registry
            .register_value(json!({
                "id": "child",
                "extends": "base",
                "element": {"type": "input", "label": "Name"},
                "metadata": {"author": "me", "tags": ["form"]}
            }))
            .unwrap();
        assert!(outcome.success);

        let composed = registry.get("child").unwrap();
        let metadata = composed.metadata.as_ref().unwrap();
        assert_eq!(metadata.version(), "2.0.0");
        assert_eq!(metadata.tags, vec!["form".to_string()]);
        assert_eq!(composed.validation.as_ref().unwrap().rules.len(), 1);
        assert_eq!(composed.element.label.as_deref(), Some("Name"));
    }

    #[test]
    fn test_circular_inheritance() {
        let mut registry = Registry::new();
        registry.register(Manifest::new("a", "action")).unwrap();
        registry
            .register(Manifest::new("b", "action").with_extends("a"))
            .unwrap();

        let err = registry
            .register(Manifest::new("a", "action").with_extends("b"))
            .unwrap_err();
        assert_eq!(err.to_string(), "circular inheritance detected: a -> b -> a");
        assert!(registry.get("a").unwrap().extends.is_none());

        registry.register(Manifest::new("c", "action")).unwrap();
        let err = registry
            .register(Manifest::new("c", "action").with_extends("c"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::CircularInheritance { .. }));
    }

    #[test]
    fn test_unknown_base() {
        let mut registry = Registry::new();
        let outcome = registry
            .register(Manifest::new("a", "action").with_extends("ghost"))
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.errors[0].field, "extends");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_apply_patch() {
        let mut registry = registry_with(&["a", "b"]);
        let patch: json_patch::Patch = serde_json::from_value(json!([
            {"op": "add", "path": "/element/label", "value": "Save"}
        ]))
        .unwrap();

        let outcome = registry.apply_patch("a", &patch).unwrap();
        assert!(outcome.success);
        let patched = registry.get("a").unwrap();
        assert_eq!(patched.element.label.as_deref(), Some("Save"));
        assert!(patched.metadata.as_ref().unwrap().modified.is_some());
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "b"]);

        let rename: json_patch::Patch = serde_json::from_value(json!([
            {"op": "replace", "path": "/id", "value": "z"}
        ]))
        .unwrap();
        let outcome = registry.apply_patch("a", &rename).unwrap();
        assert!(!outcome.success);
        assert!(registry.has("a"));

        let err = registry.apply_patch("missing", &patch).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn test_merge_sections() {
        let merged = merge_sections(
            json!({"element": {"type": "action", "label": "x"}, "context": {"a": 1}}),
            json!({"element": {"type": "input"}, "metadata": {"tags": []}}),
        );
        assert_eq!(
            merged,
            json!({
                "element": {"type": "input", "label": "x"},
                "context": {"a": 1},
                "metadata": {"tags": []}
            })
        );
    }

    #[test]
    fn test_for_each_visits_in_order() {
        let registry = registry_with(&["x", "y"]);
        let mut seen = Vec::new();
        registry.for_each(|m| seen.push(m.id.clone()));
        assert_eq!(seen, vec!["x", "y"]);
    }
}
