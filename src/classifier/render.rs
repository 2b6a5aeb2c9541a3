//! (semantic, context) -> render instruction lookup

use serde_json::{json, Value};
use std::collections::HashMap;

use crate::models::{RenderContext, RenderInstruction};

/// Static lookup from a semantic and render context to a presentation
/// directive. A semantic may also carry a context-independent default, used
/// when no entry exists for the requested context.
#[derive(Debug, Clone, Default)]
pub struct RenderTable {
    entries: HashMap<(String, Option<RenderContext>), RenderInstruction>,
}

impl RenderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table covering every core semantic in every context
    pub fn core() -> Self {
        use RenderContext::{Detail, Form, List, Timeline};

        let mut table = Self::new();
        #[rustfmt::skip]
        let rows: &[(&str, RenderContext, &str, &str, Value)] = &[
            ("cancellation", List, "badge", "danger", Value::Null),
            ("cancellation", Detail, "alert", "warning", json!({"icon": "alert-triangle"})),
            ("cancellation", Form, "toggle", "danger", Value::Null),
            ("cancellation", Timeline, "event", "critical", Value::Null),
            ("currency", List, "text", "currency-compact", Value::Null),
            ("currency", Detail, "text", "currency-full", json!({"showSymbol": true, "precision": 2})),
            ("currency", Form, "input", "currency", json!({"precision": 2})),
            ("currency", Timeline, "chart", "financial", Value::Null),
            ("temporal", List, "text", "relative-time", Value::Null),
            ("temporal", Detail, "text", "absolute-datetime", Value::Null),
            ("temporal", Form, "input", "datepicker", json!({"calendar": true})),
            ("temporal", Timeline, "marker", "timestamp", Value::Null),
            ("premium", List, "badge", "gold", Value::Null),
            ("premium", Detail, "card", "elevated", Value::Null),
            ("premium", Form, "toggle", "premium", Value::Null),
            ("premium", Timeline, "badge", "gold", Value::Null),
            ("identifier", List, "text", "monospace", Value::Null),
            ("identifier", Detail, "text", "copyable", json!({"copyable": true})),
            ("identifier", Form, "input", "readonly", Value::Null),
            ("identifier", Timeline, "text", "monospace", Value::Null),
            ("status", List, "badge", "status", Value::Null),
            ("status", Detail, "card", "status", json!({"animated": true})),
            ("status", Form, "select", "status", Value::Null),
            ("status", Timeline, "event", "status", Value::Null),
            ("percentage", List, "progress", "compact", Value::Null),
            ("percentage", Detail, "progress", "detailed", json!({"showValue": true})),
            ("percentage", Form, "slider", "percentage", json!({"min": 0, "max": 100})),
            ("percentage", Timeline, "chart", "trend", Value::Null),
            ("email", List, "link", "email", Value::Null),
            ("email", Detail, "link", "email-full", json!({"icon": "mail"})),
            ("email", Form, "input", "email", Value::Null),
            ("email", Timeline, "link", "email", Value::Null),
            ("url", List, "link", "external", json!({"external": true})),
            ("url", Detail, "link", "preview", Value::Null),
            ("url", Form, "input", "url", Value::Null),
            ("url", Timeline, "link", "external", json!({"external": true})),
            ("danger", List, "badge", "danger", Value::Null),
            ("danger", Detail, "alert", "danger", Value::Null),
            ("danger", Form, "warning", "inline", Value::Null),
            ("danger", Timeline, "event", "critical", Value::Null),
            ("phone", List, "link", "tel", json!({"icon": "phone"})),
            ("phone", Detail, "link", "tel", json!({"icon": "phone"})),
            ("phone", Form, "input", "tel", Value::Null),
            ("phone", Timeline, "link", "tel", Value::Null),
            ("location", List, "text", "location", json!({"icon": "pin"})),
            ("location", Detail, "map", "embedded", json!({"showMap": true})),
            ("location", Form, "input", "address", Value::Null),
            ("location", Timeline, "marker", "location", Value::Null),
            ("boolean", List, "toggle", "readonly", json!({"readOnly": true})),
            ("boolean", Detail, "toggle", "readonly", json!({"readOnly": true})),
            ("boolean", Form, "toggle", "switch", Value::Null),
            ("boolean", Timeline, "marker", "flag", Value::Null),
            ("description", List, "text", "truncated", json!({"maxLines": 1})),
            ("description", Detail, "text", "expandable", json!({"maxLines": 3})),
            ("description", Form, "textarea", "default", Value::Null),
            ("description", Timeline, "text", "truncated", json!({"maxLines": 1})),
            ("keyword", List, "tag", "small", Value::Null),
            ("keyword", Detail, "tag", "default", Value::Null),
            ("keyword", Form, "select", "tags", json!({"multiple": true})),
            ("keyword", Timeline, "tag", "small", Value::Null),
            ("numeric", List, "number", "compact", Value::Null),
            ("numeric", Detail, "number", "full", json!({"thousandsSeparator": true})),
            ("numeric", Form, "input", "number", Value::Null),
            ("numeric", Timeline, "chart", "sparkline", Value::Null),
        ];

        for (semantic, context, component, variant, props) in rows {
            table.insert(
                semantic,
                Some(*context),
                RenderInstruction::new(*component, *variant).with_props(props.clone()),
            );
        }

        // Pack semantics render the same in every context
        table.insert(
            "ticker",
            None,
            RenderInstruction::new("stock-ticker", "default")
                .with_props(json!({"showPrice": true})),
        );
        table.insert(
            "isin",
            None,
            RenderInstruction::new("badge", "outline").with_props(json!({"copyable": true})),
        );
        table.insert(
            "medical_code",
            None,
            RenderInstruction::new("medical-code", "default")
                .with_props(json!({"showDescription": true})),
        );

        table
    }

    /// Add or replace an entry; `None` context sets the semantic's default
    pub fn insert(
        &mut self,
        semantic: &str,
        context: Option<RenderContext>,
        instruction: RenderInstruction,
    ) {
        self.entries
            .insert((semantic.to_string(), context), instruction);
    }

    /// Exact entry, then the semantic's default, then none
    pub fn get(&self, semantic: &str, context: RenderContext) -> Option<&RenderInstruction> {
        self.entries
            .get(&(semantic.to_string(), Some(context)))
            .or_else(|| self.entries.get(&(semantic.to_string(), None)))
    }

    pub fn resolve(&self, semantic: &str, context: RenderContext) -> RenderInstruction {
        self.get(semantic, context)
            .cloned()
            .unwrap_or_else(RenderInstruction::fallback)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::rules::CORE_RULES;

    #[test]
    fn test_every_core_semantic_has_every_context() {
        let table = RenderTable::core();
        for rule in CORE_RULES {
            for context in RenderContext::ALL {
                let entry = table.entries.get(&(rule.semantic.to_string(), Some(context)));
                assert!(entry.is_some(), "missing {} / {}", rule.semantic, context);
            }
        }
    }

    #[test]
    fn test_context_selects_variant_only() {
        let table = RenderTable::core();
        let form = table.resolve("email", RenderContext::Form);
        assert_eq!(form.component, "input");
        assert_eq!(form.variant.as_deref(), Some("email"));

        let list = table.resolve("email", RenderContext::List);
        assert_eq!(list.component, "link");
    }

    #[test]
    fn test_default_entry_and_fallback() {
        let table = RenderTable::core();
        let ticker = table.resolve("ticker", RenderContext::Timeline);
        assert_eq!(ticker.component, "stock-ticker");

        let unknown = table.resolve("astrology", RenderContext::Detail);
        assert_eq!(unknown, RenderInstruction::fallback());
    }
}
