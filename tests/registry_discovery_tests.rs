// Integration tests for the registry and discovery
// Covers ordering, round trips, query operators and the result cache

use anyhow::Result;
use proptest::prelude::*;
use semantic_protocol::discovery::DiscoveryEngine;
use semantic_protocol::models::Manifest;
use semantic_protocol::registry::Registry;
use semantic_protocol::Engine;
use serde_json::json;
use std::time::Instant;

fn ids(manifests: &[std::sync::Arc<Manifest>]) -> Vec<String> {
    manifests.iter().map(|m| m.id.clone()).collect()
}

fn sample_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    let manifests = vec![
        Manifest::new("submit-order", "action")
            .with_intent("order.submit")
            .with_label("Submit")
            .with_context("screen", "checkout")
            .with_tags(["checkout", "primary"]),
        Manifest::new("cancel-order", "action")
            .with_intent("order.cancel")
            .with_context("screen", "checkout")
            .with_tags(["checkout"]),
        Manifest::new("email-input", "input")
            .with_intent("contact.email")
            .with_context("screen", "signup")
            .with_tags(["form", "primary"]),
        Manifest::new("order-list", "display")
            .with_intent("order.list")
            .with_children(["submit-order", "cancel-order"]),
    ];
    for manifest in manifests {
        assert!(registry.register(manifest)?.success);
    }
    Ok(registry)
}

#[test]
fn test_scenario_b_find_in_registration_order() -> Result<()> {
    let mut registry = Registry::new();
    registry.register(Manifest::new("A", "action").with_intent("submit"))?;
    registry.register(Manifest::new("B", "action").with_intent("cancel"))?;
    registry.register(Manifest::new("C", "input"))?;

    let engine = DiscoveryEngine::default();
    let found = engine.find(&registry, &json!({"type": "action"}));
    assert_eq!(ids(&found), vec!["A", "B"]);
    Ok(())
}

#[test]
fn test_idempotent_registration() -> Result<()> {
    let mut registry = sample_registry()?;
    let before: Vec<String> = registry.ids().map(str::to_string).collect();

    let again = registry.get("email-input").map(|m| (**m).clone());
    if let Some(manifest) = again {
        registry.register(manifest)?;
    }

    let after: Vec<String> = registry.ids().map(str::to_string).collect();
    assert_eq!(before, after);
    assert_eq!(registry.len(), 4);
    Ok(())
}

#[test]
fn test_round_trip() -> Result<()> {
    let mut registry = Registry::new();
    let manifest = Manifest::new("profile-save", "action")
        .with_intent("profile.save")
        .with_label("Save profile")
        .with_context("screen", "profile")
        .with_dependencies(["profile-form"])
        .with_relation("next", "profile-view")
        .with_tags(["profile"]);
    registry.register(manifest.clone())?;

    let stored = registry.get("profile-save").expect("registered");
    assert_eq!(stored.as_ref(), &manifest);

    // the JSON entry point stores the same thing
    let mut other = Registry::new();
    other.register_value(serde_json::to_value(&manifest)?)?;
    assert_eq!(other.get("profile-save").map(|m| m.as_ref()), Some(&manifest));
    Ok(())
}

#[test]
fn test_extends_with_partial_sections_keeps_base_values() -> Result<()> {
    let mut registry = Registry::new();
    registry.register_value(json!({
        "id": "base-field",
        "element": {"type": "input", "label": "Field"},
        "validation": {"rules": [{"field": "value", "type": "required"}]},
        "metadata": {"version": "2.0.0", "tags": ["ui"]}
    }))?;

    let outcome = registry.register_value(json!({
        "id": "email-field",
        "extends": "base-field",
        "element": {"type": "input", "intent": "contact.email"},
        "validation": {"async": true},
        "metadata": {"author": "me"}
    }))?;
    assert!(outcome.success);

    let composed = registry.get("email-field").expect("registered");
    let metadata = composed.metadata.as_ref().expect("metadata from base");
    assert_eq!(metadata.author.as_deref(), Some("me"));
    assert_eq!(metadata.version(), "2.0.0");
    assert_eq!(composed.tags(), ["ui".to_string()]);
    let validation = composed.validation.as_ref().expect("validation from base");
    assert_eq!(validation.rules.len(), 1);
    assert_eq!(validation.is_async, Some(true));
    assert_eq!(composed.element.label.as_deref(), Some("Field"));

    // discovery sees the inherited tag
    let engine = DiscoveryEngine::default();
    assert_eq!(
        ids(&engine.find(&registry, &json!({"tags": "ui"}))),
        vec!["base-field", "email-field"]
    );
    Ok(())
}

#[test]
fn test_query_operators() -> Result<()> {
    let registry = sample_registry()?;
    let engine = DiscoveryEngine::default();
    let find = |query: serde_json::Value| ids(&engine.find(&registry, &query));

    assert_eq!(find(json!({"intent": "order.submit"})), vec!["submit-order"]);
    assert_eq!(
        find(json!({"type": "!action"})),
        vec!["email-input", "order-list"]
    );
    assert_eq!(
        find(json!({"type": ["input", "display"]})),
        vec!["email-input", "order-list"]
    );
    assert_eq!(
        find(json!({"intent": "order.*"})),
        vec!["submit-order", "cancel-order", "order-list"]
    );
    assert_eq!(find(json!({"intent": "!order.*"})), vec!["email-input"]);
    assert_eq!(
        find(json!({"context": {"screen": "checkout"}})),
        vec!["submit-order", "cancel-order"]
    );
    assert_eq!(find(json!({"context.screen": "signup"})), vec!["email-input"]);
    assert_eq!(
        find(json!({"tags": "primary"})),
        vec!["submit-order", "email-input"]
    );
    assert_eq!(
        find(json!({"tags": ["checkout", "primary"]})),
        vec!["submit-order"]
    );
    assert_eq!(
        find(json!({"type": "action", "tags": "primary"})),
        vec!["submit-order"]
    );
    assert_eq!(
        find(json!({"relationships.children": "cancel-order"})),
        vec!["order-list"]
    );
    assert_eq!(find(json!({})).len(), 4);
    assert!(find(json!({"label": "Nope"})).is_empty());
    Ok(())
}

#[test]
fn test_cache_is_invisible() -> Result<()> {
    let engine = Engine::new();
    engine.register(Manifest::new("a", "action"))?;
    engine.register(Manifest::new("b", "action"))?;

    let query = json!({"type": "action"});
    let first = engine.find(&query);
    let second = engine.find(&query);
    assert_eq!(ids(&first), ids(&second));

    engine.register(Manifest::new("a", "input"))?;
    assert_eq!(ids(&engine.find(&query)), vec!["b"]);

    engine.clear();
    assert!(engine.find(&query).is_empty());
    Ok(())
}

#[test]
fn test_scenario_d_large_registry() -> Result<()> {
    let mut registry = Registry::new();
    for i in 0..10_000 {
        let kind = match i % 3 {
            0 => "action",
            1 => "input",
            _ => "display",
        };
        registry.register(Manifest::new(format!("m-{}", i), kind))?;
    }

    let engine = DiscoveryEngine::default();
    let started = Instant::now();
    let found = engine.find(&registry, &json!({"type": "action"}));
    let elapsed = started.elapsed();

    assert!(found.len() > 3000);
    assert_eq!(found[0].id, "m-0");
    // generous bound so unoptimized test builds pass
    assert!(elapsed.as_millis() < 2_000, "scan took {:?}", elapsed);
    Ok(())
}

proptest! {
    #[test]
    fn prop_iteration_follows_first_registration(
        ops in prop::collection::vec((0usize..12, prop::bool::ANY), 1..60)
    ) {
        let mut registry = Registry::new();
        let mut expected: Vec<String> = Vec::new();

        for (n, as_input) in ops {
            let id = format!("m{}", n);
            let kind = if as_input { "input" } else { "action" };
            registry.register(Manifest::new(id.as_str(), kind)).unwrap();
            if !expected.contains(&id) {
                expected.push(id);
            }
        }

        let actual: Vec<String> = registry.ids().map(str::to_string).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_find_all_matches_iteration(
        kinds in prop::collection::vec(prop::sample::select(vec!["action", "input"]), 0..40)
    ) {
        let mut registry = Registry::new();
        for (i, kind) in kinds.iter().enumerate() {
            registry.register(Manifest::new(format!("m{}", i), *kind)).unwrap();
        }
        let engine = DiscoveryEngine::default();

        let all: Vec<String> = ids(&engine.find(&registry, &json!({})));
        let iterated: Vec<String> = registry.ids().map(str::to_string).collect();
        prop_assert_eq!(all, iterated);

        let actions = engine.find(&registry, &json!({"type": "action"}));
        let expected = kinds.iter().filter(|k| **k == "action").count();
        prop_assert_eq!(actions.len(), expected);
    }
}
