//! Semantic detection rules
//!
//! Each rule looks at the tokenized field name, the declared type and
//! optionally the value, and scores how strongly the field carries its
//! semantic. Rule order matters: it is the tie-break order when two rules
//! report the same confidence.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{FieldDefinition, FieldType, SemanticMatch};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});
static COORDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?,\s*-?\d+(\.\d+)?$").unwrap());
static PHONE_SEPARATORS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-()+.]").unwrap());
static TICKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{1,5}$").unwrap());
static ISIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{9}[0-9]$").unwrap());
static ICD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]\d{2}\.?\d*$").unwrap());

const STATUS_VALUES: &[&str] = &[
    "active", "inactive", "pending", "completed", "failed", "success", "error", "warning",
    "approved", "rejected", "draft", "published", "archived",
];

const FLAG_PREFIXES: &[&str] = &["is", "has", "can", "should", "will", "was"];

/// Pre-digested view of a field that every rule reads
#[derive(Debug)]
pub struct FieldProbe<'a> {
    /// Lowercased field name
    pub name: String,
    /// Lowercased name split on separators and camelCase boundaries
    pub tokens: Vec<String>,
    pub field_type: FieldType,
    pub value: Option<&'a Value>,
}

impl<'a> FieldProbe<'a> {
    pub fn new(field: &'a FieldDefinition) -> Self {
        Self {
            name: field.name.to_lowercase(),
            tokens: tokenize(&field.name),
            field_type: field.field_type,
            value: field.value.as_ref().filter(|v| !v.is_null()),
        }
    }

    /// First keyword equal to some token
    pub fn token_is(&self, keywords: &[&'static str]) -> Option<&'static str> {
        keywords
            .iter()
            .copied()
            .find(|kw| self.tokens.iter().any(|t| t == kw))
    }

    /// First keyword that starts some token
    pub fn token_starts(&self, keywords: &[&'static str]) -> Option<&'static str> {
        keywords
            .iter()
            .copied()
            .find(|kw| self.tokens.iter().any(|t| t.starts_with(kw)))
    }

    /// First keyword found anywhere in the lowercased name
    pub fn name_contains(&self, keywords: &[&'static str]) -> Option<&'static str> {
        keywords.iter().copied().find(|kw| self.name.contains(kw))
    }

    pub fn first_token(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    pub fn last_token(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    /// `is_x`, `has_x`, ... style names
    pub fn is_flag_name(&self) -> bool {
        self.tokens.len() > 1
            && self
                .first_token()
                .is_some_and(|t| FLAG_PREFIXES.contains(&t))
    }

    pub fn value_str(&self) -> Option<&str> {
        self.value.and_then(Value::as_str)
    }

    pub fn value_number(&self) -> Option<f64> {
        self.value.and_then(Value::as_f64)
    }
}

/// Split a field name into lowercase tokens: `userEmail`, `user_email` and
/// `user-email` all become `["user", "email"]`.
pub fn tokenize(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Accumulates evidence for one rule
#[derive(Debug, Default)]
pub struct Score {
    points: u32,
    reasons: Vec<String>,
}

impl Score {
    pub fn add(&mut self, points: u32, reason: impl Into<String>) -> &mut Self {
        self.points += points;
        self.reasons.push(reason.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    fn finish(self) -> Option<(u32, String)> {
        (self.points > 0).then(|| (self.points, self.reasons.join("; ")))
    }
}

/// Detector signature: fill in a score for the probed field
pub type Detector = fn(&FieldProbe<'_>, &mut Score);

/// A named semantic rule
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub semantic: &'static str,
    /// Field types the rule applies to; empty means any type
    pub accepts: &'static [FieldType],
    /// Upper bound for the reported confidence
    pub cap: u8,
    detect: Detector,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("semantic", &self.semantic)
            .field("cap", &self.cap)
            .finish()
    }
}

impl Rule {
    pub const fn new(
        name: &'static str,
        semantic: &'static str,
        accepts: &'static [FieldType],
        cap: u8,
        detect: Detector,
    ) -> Self {
        Self {
            name,
            semantic,
            accepts,
            cap,
            detect,
        }
    }

    pub fn accepts(&self, field_type: FieldType) -> bool {
        self.accepts.is_empty() || self.accepts.contains(&field_type)
    }

    /// Run the rule; `None` when it does not fire
    pub fn evaluate(&self, probe: &FieldProbe<'_>) -> Option<SemanticMatch> {
        if !self.accepts(probe.field_type) {
            return None;
        }
        let mut score = Score::default();
        (self.detect)(probe, &mut score);
        let (points, reason) = score.finish()?;
        let confidence = points.min(u32::from(self.cap).min(100)) as u8;
        Some(SemanticMatch {
            semantic: self.semantic.to_string(),
            confidence,
            reason,
        })
    }
}

const TEXT: &[FieldType] = &[FieldType::String];
const TEXT_OR_NUMBER: &[FieldType] = &[FieldType::String, FieldType::Integer, FieldType::Float];
const TEMPORAL: &[FieldType] = &[
    FieldType::Date,
    FieldType::Datetime,
    FieldType::Timestamp,
    FieldType::String,
    FieldType::Integer,
];
const CANCELLATION: &[FieldType] = &[
    FieldType::Boolean,
    FieldType::String,
    FieldType::Date,
    FieldType::Datetime,
    FieldType::Timestamp,
];
const FLAGGY: &[FieldType] = &[FieldType::Boolean, FieldType::Integer, FieldType::String];
const PREMIUM: &[FieldType] = &[FieldType::Boolean, FieldType::String];
const ID_LIKE: &[FieldType] = &[FieldType::String, FieldType::Integer];
const DANGER: &[FieldType] = &[
    FieldType::String,
    FieldType::Integer,
    FieldType::Float,
    FieldType::Boolean,
];
const LOCATION: &[FieldType] = &[
    FieldType::String,
    FieldType::Float,
    FieldType::Object,
    FieldType::Array,
];
const KEYWORD: &[FieldType] = &[FieldType::String, FieldType::Array];
const NUMERIC: &[FieldType] = &[FieldType::Integer, FieldType::Float];

/// Core rules in registration order
pub static CORE_RULES: &[Rule] = &[
    Rule::new("cancellation", "cancellation", CANCELLATION, 95, detect_cancellation),
    Rule::new("currency", "currency", TEXT_OR_NUMBER, 95, detect_currency),
    Rule::new("temporal", "temporal", TEMPORAL, 95, detect_temporal),
    Rule::new("premium", "premium", PREMIUM, 95, detect_premium),
    Rule::new("identifier", "identifier", ID_LIKE, 95, detect_identifier),
    Rule::new("status", "status", FLAGGY, 95, detect_status),
    Rule::new("percentage", "percentage", TEXT_OR_NUMBER, 95, detect_percentage),
    Rule::new("email", "email", TEXT, 95, detect_email),
    Rule::new("url", "url", TEXT, 95, detect_url),
    Rule::new("danger", "danger", DANGER, 95, detect_danger),
    Rule::new("phone", "phone", ID_LIKE, 95, detect_phone),
    Rule::new("location", "location", LOCATION, 95, detect_location),
    Rule::new("boolean", "boolean", FLAGGY, 90, detect_boolean),
    Rule::new("description", "description", TEXT, 90, detect_description),
    Rule::new("keyword", "keyword", KEYWORD, 85, detect_keyword),
    Rule::new("numeric", "numeric", NUMERIC, 60, detect_numeric),
];

fn detect_cancellation(p: &FieldProbe<'_>, s: &mut Score) {
    if let Some(kw) = p.name_contains(&["cancel", "terminat", "revoke", "void", "expire"]) {
        s.add(80, format!("name mentions '{}'", kw));
    } else if let Some(kw) = p.token_is(&["deleted", "removed", "disabled", "inactive"]) {
        s.add(60, format!("name mentions '{}'", kw));
    }
    if !s.is_empty() && p.field_type == FieldType::Boolean && p.is_flag_name() {
        s.add(10, "boolean flag");
    }
}

fn detect_currency(p: &FieldProbe<'_>, s: &mut Score) {
    const WORDS: &[&str] = &[
        "price", "cost", "amount", "fee", "charge", "payment", "balance", "total", "subtotal",
        "tax", "discount", "revenue", "profit", "salary", "wage", "budget",
    ];
    if let Some(kw) = p.token_starts(WORDS) {
        s.add(70, format!("monetary keyword '{}'", kw));
    }
    if p.value_number().is_some_and(|n| n > 0.0) {
        s.add(20, "positive numeric value");
    }
    let symbol_in_value = p
        .value_str()
        .is_some_and(|v| v.contains(['$', '€', '£']));
    if symbol_in_value || p.token_is(&["usd", "eur", "gbp"]).is_some() {
        s.add(10, "currency symbol or code");
    }
}

fn detect_temporal(p: &FieldProbe<'_>, s: &mut Score) {
    const WORDS: &[&str] = &[
        "date", "time", "created", "updated", "modified", "deadline", "schedule", "year",
        "month", "day", "hour", "minute", "birth", "expir",
    ];
    if p.field_type.is_temporal() {
        s.add(60, format!("declared as {}", p.field_type));
    }
    if let Some(kw) = p.token_starts(WORDS) {
        let points = if p.field_type.is_temporal() { 30 } else { 60 };
        s.add(points, format!("temporal keyword '{}'", kw));
    }
    if p.tokens.len() > 1 && matches!(p.last_token(), Some("at" | "on")) {
        s.add(30, "'_at'/'_on' suffix");
    }
    if p.value_str().is_some_and(|v| ISO_DATE_RE.is_match(v)) {
        s.add(20, "ISO-8601 date value");
    }
}

fn detect_premium(p: &FieldProbe<'_>, s: &mut Score) {
    if let Some(kw) = p.token_starts(&["premium", "vip", "gold", "platinum", "elite"]) {
        s.add(90, format!("tier keyword '{}'", kw));
    } else if let Some(kw) = p.token_is(&["pro", "plus"]) {
        s.add(85, format!("tier keyword '{}'", kw));
    } else if p.token_is(&["tier"]).is_some() && p.value_str().is_some_and(is_paid_tier) {
        s.add(85, "premium tier value");
    }
}

fn is_paid_tier(value: &str) -> bool {
    ["premium", "pro", "gold", "platinum"].contains(&value.to_lowercase().as_str())
}

fn detect_identifier(p: &FieldProbe<'_>, s: &mut Score) {
    if ["id", "uid", "uuid", "guid"].contains(&p.name.as_str()) {
        s.add(95, "name is an identifier");
    } else if p.tokens.len() > 1 && matches!(p.last_token(), Some("id" | "key" | "uuid" | "guid")) {
        s.add(90, "identifier suffix");
    } else if let Some(kw) = p.token_starts(&["identifier", "reference", "sku"]) {
        s.add(80, format!("identifier keyword '{}'", kw));
    }
    if p.value_str().is_some_and(|v| UUID_RE.is_match(v)) {
        let points = if s.is_empty() { 70 } else { 5 };
        s.add(points, "UUID value");
    }
}

fn detect_status(p: &FieldProbe<'_>, s: &mut Score) {
    if let Some(kw) = p.token_is(&["status", "state", "phase", "stage"]) {
        s.add(80, format!("status keyword '{}'", kw));
    } else if ["active", "enabled", "visible", "published", "archived"].contains(&p.name.as_str()) {
        s.add(75, "name is a status flag");
    }
    let status_value = p
        .value_str()
        .is_some_and(|v| STATUS_VALUES.contains(&v.to_lowercase().as_str()));
    if status_value {
        let points = if s.is_empty() { 40 } else { 15 };
        s.add(points, "known status value");
    }
}

fn detect_percentage(p: &FieldProbe<'_>, s: &mut Score) {
    if let Some(kw) = p.token_starts(&["percent", "pct"]) {
        s.add(85, format!("percentage keyword '{}'", kw));
    } else if p.last_token() == Some("rate") {
        s.add(85, "'rate' suffix");
    } else if let Some(kw) = p.token_is(&["ratio", "factor", "coverage", "utilization"]) {
        s.add(75, format!("ratio keyword '{}'", kw));
    }

    if let Some(n) = p.value_number() {
        if !s.is_empty() && (0.0..=100.0).contains(&n) {
            s.add(10, "value within 0-100");
        } else if s.is_empty() && p.field_type == FieldType::Float && (0.0..=1.0).contains(&n) {
            s.add(55, "fractional value within 0-1");
        }
    }
    if p.value_str().is_some_and(|v| v.trim_end().ends_with('%')) {
        let points = if s.is_empty() { 70 } else { 10 };
        s.add(points, "value ends with '%'");
    }
}

fn detect_email(p: &FieldProbe<'_>, s: &mut Score) {
    if let Some(kw) = p.name_contains(&["email", "e-mail", "mail"]) {
        s.add(80, format!("name mentions '{}'", kw));
    }
    if p.value_str().is_some_and(|v| EMAIL_RE.is_match(v)) {
        let points = if s.is_empty() { 85 } else { 20 };
        s.add(points, "value is an email address");
    }
}

fn detect_url(p: &FieldProbe<'_>, s: &mut Score) {
    if let Some(kw) = p.token_starts(&["url", "uri", "link", "website", "href", "homepage"]) {
        s.add(80, format!("name mentions '{}'", kw));
    }
    let looks_like_url = p.value_str().is_some_and(|v| {
        v.starts_with("http://") || v.starts_with("https://") || v.starts_with("www.")
    });
    if looks_like_url {
        let points = if s.is_empty() { 85 } else { 20 };
        s.add(points, "value is a URL");
    }
}

fn detect_danger(p: &FieldProbe<'_>, s: &mut Score) {
    const WORDS: &[&str] = &[
        "error", "fail", "critical", "severe", "fatal", "emergency", "breach", "alert",
    ];
    if let Some(kw) = p.token_starts(WORDS) {
        s.add(85, format!("danger keyword '{}'", kw));
    } else if p.field_type == FieldType::Boolean && p.is_flag_name() {
        if let Some(kw) = p.token_is(&["blocked", "banned", "suspended", "locked"]) {
            s.add(85, format!("flag '{}'", kw));
        }
    }
}

fn detect_phone(p: &FieldProbe<'_>, s: &mut Score) {
    let keyword = p
        .token_starts(&["phone", "mobile", "telephone"])
        .or_else(|| p.token_is(&["cell", "tel", "fax"]));
    if let Some(kw) = keyword {
        s.add(80, format!("name mentions '{}'", kw));
    }
    let digits = match p.value {
        Some(Value::String(v)) => Some(PHONE_SEPARATORS_RE.replace_all(v, "").into_owned()),
        Some(Value::Number(n)) if n.is_u64() => Some(n.to_string()),
        _ => None,
    };
    let phone_like = digits
        .as_deref()
        .is_some_and(|d| (7..=15).contains(&d.len()) && d.chars().all(|c| c.is_ascii_digit()));
    if phone_like {
        let points = if s.is_empty() { 60 } else { 15 };
        s.add(points, "7-15 digit value");
    }
}

fn detect_location(p: &FieldProbe<'_>, s: &mut Score) {
    const WORDS: &[&str] = &[
        "address", "location", "city", "country", "zip", "postal", "latitude", "longitude",
        "coord", "region", "venue", "geo",
    ];
    let keyword = p
        .token_starts(WORDS)
        .or_else(|| p.token_is(&["lat", "lng", "lon"]));
    if let Some(kw) = keyword {
        s.add(75, format!("location keyword '{}'", kw));
    }
    if p.value_str().is_some_and(|v| COORDS_RE.is_match(v)) {
        let points = if s.is_empty() { 70 } else { 20 };
        s.add(points, "coordinate pair value");
    }
}

fn detect_boolean(p: &FieldProbe<'_>, s: &mut Score) {
    if p.is_flag_name() {
        s.add(60, "flag-style name");
    }
    if p.field_type == FieldType::Boolean {
        s.add(20, "declared as boolean");
    }
    match p.value {
        Some(Value::Bool(_)) => {
            s.add(10, "boolean value");
        }
        Some(Value::Number(n)) if n.as_u64().is_some_and(|n| n <= 1) => {
            s.add(5, "0/1 value");
        }
        Some(Value::String(v))
            if ["0", "1", "true", "false", "yes", "no"].contains(&v.to_lowercase().as_str()) =>
        {
            s.add(5, "boolean-like text");
        }
        _ => {}
    }
}

fn detect_description(p: &FieldProbe<'_>, s: &mut Score) {
    const WORDS: &[&str] = &[
        "description", "summary", "note", "comment", "detail", "bio", "body", "content",
    ];
    if let Some(kw) = p.token_starts(WORDS) {
        s.add(75, format!("descriptive keyword '{}'", kw));
    }
    if p.value_str().is_some_and(|v| v.chars().count() > 100) {
        let points = if s.is_empty() { 50 } else { 15 };
        s.add(points, "long text value");
    }
}

fn detect_keyword(p: &FieldProbe<'_>, s: &mut Score) {
    const WORDS: &[&str] = &[
        "tag", "tags", "label", "labels", "category", "categories", "kind", "keyword",
        "keywords", "type", "class", "genre",
    ];
    if let Some(kw) = p.token_is(WORDS) {
        s.add(70, format!("classification keyword '{}'", kw));
        if p.field_type == FieldType::Array {
            s.add(10, "list of values");
        }
    }
}

fn detect_numeric(p: &FieldProbe<'_>, s: &mut Score) {
    if p.field_type.is_numeric() {
        s.add(50, format!("declared as {}", p.field_type));
    }
    if p.value_number().is_some() {
        s.add(10, "numeric value");
    }
}

/// Optional domain rule packs, appended after the core rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePack {
    Finance,
    Healthcare,
}

impl RulePack {
    pub fn rules(&self) -> &'static [Rule] {
        match self {
            RulePack::Finance => FINANCE_RULES,
            RulePack::Healthcare => HEALTHCARE_RULES,
        }
    }
}

impl std::fmt::Display for RulePack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulePack::Finance => write!(f, "finance"),
            RulePack::Healthcare => write!(f, "healthcare"),
        }
    }
}

impl std::str::FromStr for RulePack {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "finance" => Ok(RulePack::Finance),
            "healthcare" => Ok(RulePack::Healthcare),
            _ => Err(format!("Invalid rule pack: {}. Use: finance, healthcare", s)),
        }
    }
}

static FINANCE_RULES: &[Rule] = &[
    Rule::new("ticker", "ticker", TEXT, 95, detect_ticker),
    Rule::new("isin", "isin", TEXT, 95, detect_isin),
];

static HEALTHCARE_RULES: &[Rule] = &[Rule::new(
    "medical_code",
    "medical_code",
    TEXT,
    95,
    detect_medical_code,
)];

fn detect_ticker(p: &FieldProbe<'_>, s: &mut Score) {
    if let Some(kw) = p.token_is(&["ticker", "symbol"]) {
        s.add(70, format!("name mentions '{}'", kw));
    }
    if p.value_str().is_some_and(|v| TICKER_RE.is_match(v)) && !s.is_empty() {
        s.add(30, "ticker-shaped value");
    }
}

fn detect_isin(p: &FieldProbe<'_>, s: &mut Score) {
    if p.value_str().is_some_and(|v| ISIN_RE.is_match(v)) {
        s.add(90, "ISIN-shaped value");
    }
}

fn detect_medical_code(p: &FieldProbe<'_>, s: &mut Score) {
    if let Some(kw) = p.token_starts(&["icd", "cpt", "ndc", "snomed"]) {
        s.add(80, format!("coding system '{}'", kw));
    }
    if p.value_str().is_some_and(|v| ICD_RE.is_match(v)) && !s.is_empty() {
        s.add(20, "ICD-10 shaped value");
    }
}
