//! Semantic field classification
//!
//! A [`Classifier`] runs an ordered rule table over a [`FieldDefinition`] and
//! turns the verdicts into an [`AnalysisResult`] with a render instruction for
//! the requested context. Analysis is pure: the optional cache only saves
//! work, it never changes what is returned.

use anyhow::Result;
use once_cell::sync::Lazy;
use std::sync::{Mutex, PoisonError};
use tracing::trace;

use crate::config::ClassifierConfig;
use crate::models::{
    AnalysisMetadata, AnalysisResult, FieldDefinition, RenderContext, RenderInstruction,
    SemanticMatch,
};

pub mod cache;
pub mod render;
pub mod rules;

pub use cache::{AnalysisCache, AnalysisKey};
pub use render::RenderTable;
pub use rules::{tokenize, Detector, FieldProbe, Rule, RulePack, Score, CORE_RULES};

/// Minimum confidence for a semantic to count as the best match
pub const DEFAULT_THRESHOLD: u8 = 70;

/// Default number of memoized analyses
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

static DEFAULT_CLASSIFIER: Lazy<Classifier> = Lazy::new(Classifier::new);

/// Analyze a field with the core rules and the default threshold
pub fn analyze(field: &FieldDefinition, context: RenderContext) -> AnalysisResult {
    DEFAULT_CLASSIFIER.analyze(field, context)
}

/// Analyze a field with the core rules and an explicit threshold
pub fn analyze_with_threshold(
    field: &FieldDefinition,
    context: RenderContext,
    threshold: u8,
) -> AnalysisResult {
    DEFAULT_CLASSIFIER.analyze_with_threshold(field, context, threshold)
}

/// Rule table, render table and optional memoization
pub struct Classifier {
    rules: Vec<Rule>,
    renders: RenderTable,
    threshold: u8,
    cache: Option<Mutex<AnalysisCache>>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Core rules, core render table, default threshold and cache
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ClassifierBuilder {
        ClassifierBuilder::default()
    }

    /// Build from the `[classifier]` config section
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .threshold(config.threshold)
            .cache_capacity(config.cache_capacity);
        for name in &config.packs {
            let pack: RulePack = name.parse().map_err(anyhow::Error::msg)?;
            builder = builder.pack(pack);
        }
        Ok(builder.build())
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn analyze(&self, field: &FieldDefinition, context: RenderContext) -> AnalysisResult {
        self.analyze_with_threshold(field, context, self.threshold)
    }

    pub fn analyze_with_threshold(
        &self,
        field: &FieldDefinition,
        context: RenderContext,
        threshold: u8,
    ) -> AnalysisResult {
        let Some(cache) = &self.cache else {
            return self.evaluate(field, context, threshold);
        };

        let key = AnalysisKey::new(field, context, threshold);
        if let Some(hit) = cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return hit.clone();
        }

        let result = self.evaluate(field, context, threshold);
        cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, result.clone());
        result
    }

    /// Semantic name of the best match, if any
    pub fn identify(&self, field: &FieldDefinition) -> Option<String> {
        self.analyze(field, RenderContext::default())
            .best_match
            .map(|m| m.semantic)
    }

    /// Up to `n` semantics meeting the threshold, best first
    pub fn top_semantics(&self, field: &FieldDefinition, n: usize) -> Vec<SemanticMatch> {
        let mut matches = self.analyze(field, RenderContext::default()).metadata.all_matches;
        matches.truncate(n);
        matches
    }

    /// Analyze several fields for the same context, keeping input order
    pub fn analyze_batch(
        &self,
        fields: &[FieldDefinition],
        context: RenderContext,
    ) -> Vec<(String, AnalysisResult)> {
        fields
            .iter()
            .map(|field| (field.name.clone(), self.analyze(field, context)))
            .collect()
    }

    /// Distinct semantics this classifier can produce, in rule order
    pub fn supported_semantics(&self) -> Vec<&'static str> {
        let mut seen = Vec::new();
        for rule in &self.rules {
            if !seen.contains(&rule.semantic) {
                seen.push(rule.semantic);
            }
        }
        seen
    }

    pub fn supported_contexts(&self) -> [RenderContext; 4] {
        RenderContext::ALL
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache
            .as_ref()
            .map(|c| c.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    fn evaluate(
        &self,
        field: &FieldDefinition,
        context: RenderContext,
        threshold: u8,
    ) -> AnalysisResult {
        let probe = FieldProbe::new(field);
        let mut semantics: Vec<SemanticMatch> = self
            .rules
            .iter()
            .filter_map(|rule| rule.evaluate(&probe))
            .collect();
        // Stable sort: equal confidences stay in rule order
        semantics.sort_by(|a, b| b.confidence.cmp(&a.confidence));

        let all_matches: Vec<SemanticMatch> = semantics
            .iter()
            .filter(|m| m.confidence >= threshold)
            .cloned()
            .collect();
        let best_match = all_matches.first().cloned();

        let mut reasoning: Vec<String> = semantics
            .iter()
            .map(|m| format!("{}: {}", m.semantic, m.reason))
            .collect();

        let render_instruction = match &best_match {
            Some(best) => {
                reasoning.push(format!(
                    "{} ({}) selected for {} context",
                    best.semantic, best.confidence, context
                ));
                self.renders.resolve(&best.semantic, context)
            }
            None => {
                reasoning.push(format!(
                    "no semantic reached threshold {}, using plain text",
                    threshold
                ));
                RenderInstruction::fallback()
            }
        };

        trace!(
            field = %field.name,
            semantic = best_match.as_ref().map(|m| m.semantic.as_str()).unwrap_or("none"),
            "field analyzed"
        );

        AnalysisResult {
            field: field.name.clone(),
            data_type: field.field_type,
            metadata: AnalysisMetadata {
                confidence: best_match.as_ref().map(|m| m.confidence).unwrap_or(0),
                all_matches,
                reasoning,
            },
            semantics,
            best_match,
            context,
            render_instruction,
        }
    }
}

/// Assembles a [`Classifier`]; packs and custom rules go after the core rules
pub struct ClassifierBuilder {
    rules: Vec<Rule>,
    renders: RenderTable,
    threshold: u8,
    cache_capacity: usize,
}

impl Default for ClassifierBuilder {
    fn default() -> Self {
        Self {
            rules: CORE_RULES.to_vec(),
            renders: RenderTable::core(),
            threshold: DEFAULT_THRESHOLD,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ClassifierBuilder {
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// Zero disables memoization
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn pack(mut self, pack: RulePack) -> Self {
        for rule in pack.rules() {
            if !self.rules.iter().any(|r| r.name == rule.name) {
                self.rules.push(*rule);
            }
        }
        self
    }

    /// Append a custom rule; it loses ties against every earlier rule
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Register or override how a semantic renders
    pub fn render(
        mut self,
        semantic: &str,
        context: Option<RenderContext>,
        instruction: RenderInstruction,
    ) -> Self {
        self.renders.insert(semantic, context, instruction);
        self
    }

    pub fn build(self) -> Classifier {
        Classifier {
            rules: self.rules,
            renders: self.renders,
            threshold: self.threshold,
            cache: (self.cache_capacity > 0)
                .then(|| Mutex::new(AnalysisCache::new(self.cache_capacity))),
        }
    }
}
