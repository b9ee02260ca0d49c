use crate::error::ConfigError;
use crate::json::from_json;
use crate::notation::{looks_like_object, parse_object};
use crate::tree::*;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ── Categories ──────────────────────────────────────────────────────

/// One of the five pluggable dictionaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Actors,
    Verbs,
    Objects,
    Context,
    Results,
}

impl Category {
    /// Dictionaries a config may carry next to its keys. `context` is left
    /// out: in a config it names the statement's context.
    pub const IN_CONFIG: [Category; 4] = [
        Category::Actors,
        Category::Verbs,
        Category::Objects,
        Category::Results,
    ];

    pub const ALL: [Category; 5] = [
        Category::Actors,
        Category::Verbs,
        Category::Objects,
        Category::Context,
        Category::Results,
    ];

    /// The defaults key holding this dictionary.
    pub fn key(self) -> &'static str {
        match self {
            Category::Actors => "actors",
            Category::Verbs => "verbs",
            Category::Objects => "objects",
            Category::Context => "context",
            Category::Results => "results",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| format!("unknown dictionary category {:?}", s))
    }
}

// ── Defaults ────────────────────────────────────────────────────────

pub const DEFAULT_ACTOR: &str = "defaultActor";
pub const DEBUG: &str = "debug";
pub const VARIABLES: &str = "variables";

/// Engine-wide configuration: default actor, debug flag, the five
/// dictionaries and the variable scope.
///
/// Stored as a plain mapping so that whole-document replacement and
/// single-key updates behave alike; missing keys read as empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    root: Mapping,
}

impl Default for Defaults {
    fn default() -> Self {
        let mut root = Mapping::new();
        root.insert(DEFAULT_ACTOR.to_string(), Value::mapping());
        root.insert(DEBUG.to_string(), Value::Bool(false));
        for category in Category::ALL {
            root.insert(category.key().to_string(), Value::mapping());
        }
        root.insert(VARIABLES.to_string(), Value::mapping());
        Defaults { root }
    }
}

impl Defaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a defaults document. Keys present in the document override the
    /// built-in defaults; others keep their initial values.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let mut defaults = Defaults::new();
        match from_json(input)? {
            Value::Mapping(map) => {
                for (key, value) in map {
                    defaults.set_default(key, value);
                }
                Ok(defaults)
            }
            _ => Err(ConfigError::NotAnObject("defaults")),
        }
    }

    /// Override a single default.
    pub fn set_default(&mut self, key: impl Into<String>, value: Value) {
        self.root.insert(key.into(), value);
    }

    /// Replace every default at once.
    pub fn replace_defaults(&mut self, defaults: Mapping) {
        self.root = defaults;
    }

    pub fn get_default(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// All defaults.
    pub fn all(&self) -> &Mapping {
        &self.root
    }

    pub fn set_default_actor(&mut self, actor: Value) {
        self.set_default(DEFAULT_ACTOR, actor);
    }

    /// The default actor, forced if it was given as a thunk.
    pub fn default_actor(&self) -> Option<Value> {
        self.root.get(DEFAULT_ACTOR).cloned().map(Value::force)
    }

    pub fn debug(&self) -> bool {
        self.root.get(DEBUG).map_or(false, Value::is_truthy)
    }

    pub fn dictionary(&self, category: Category) -> Option<&Mapping> {
        self.root.get(category.key()).and_then(Value::as_mapping)
    }

    /// Add or replace one entry of a dictionary, creating the dictionary if
    /// it was missing or not a mapping.
    pub fn extend_dictionary(&mut self, category: Category, key: impl Into<String>, entry: Value) {
        let slot = self
            .root
            .entry(category.key().to_string())
            .or_insert_with(Value::mapping);
        if slot.as_mapping().is_none() {
            *slot = Value::mapping();
        }
        if let Some(map) = slot.as_mapping_mut() {
            map.insert(key.into(), entry);
        }
    }

    /// These defaults with the dictionaries carried in `config` layered on
    /// top, entry by entry. Borrowed as-is when `config` carries none.
    pub fn layered(&self, config: &Mapping) -> Cow<'_, Defaults> {
        let mut layered = Cow::Borrowed(self);
        for category in Category::IN_CONFIG {
            let Some(entries) = config.get(category.key()).and_then(Value::as_mapping) else {
                continue;
            };
            let defaults = layered.to_mut();
            for (key, entry) in entries {
                defaults.extend_dictionary(category, key.clone(), entry.clone());
            }
        }
        layered
    }

    pub fn variables(&self) -> Option<&Value> {
        self.root.get(VARIABLES)
    }

    /// Mutable access to the variable scope, creating it if needed.
    pub fn variables_mut(&mut self) -> &mut Value {
        self.root
            .entry(VARIABLES.to_string())
            .or_insert_with(Value::mapping)
    }

    /// The variable scope with caller-local overrides applied on top.
    pub fn scope(&self, local: Option<&Mapping>) -> Value {
        let mut scope = match self.variables().cloned().map(Value::force) {
            Some(Value::Mapping(map)) => map,
            _ => Mapping::new(),
        };
        if let Some(local) = local {
            for (key, value) in local {
                scope.insert(key.clone(), value.clone());
            }
        }
        Value::Mapping(scope)
    }
}

// ── Vocabulary ──────────────────────────────────────────────────────

const ADL_VERBS: &[&str] = &[
    "answered",
    "asked",
    "attempted",
    "attended",
    "commented",
    "completed",
    "exited",
    "experienced",
    "failed",
    "imported",
    "initialized",
    "interacted",
    "launched",
    "mastered",
    "passed",
    "preferred",
    "progressed",
    "registered",
    "responded",
    "resumed",
    "scored",
    "shared",
    "suspended",
    "terminated",
    "voided",
];

/// Verbs the ADL vocabulary publishes under its newer namespace.
const ADL_W3ID_VERBS: &[&str] = &["abandoned", "satisfied"];

/// Read-only verb table consulted when a verb is absent from the local
/// `verbs` dictionary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vocabulary {
    verbs: BTreeMap<String, Value>,
}

impl Vocabulary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The ADL verb set.
    pub fn adl() -> Self {
        let mut vocabulary = Vocabulary::empty();
        for name in ADL_VERBS {
            vocabulary.insert(*name, verb_definition("http://adlnet.gov/expapi/verbs/", name));
        }
        for name in ADL_W3ID_VERBS {
            vocabulary.insert(*name, verb_definition("https://w3id.org/xapi/adl/verbs/", name));
        }
        vocabulary
    }

    /// Load a table of the form `{"name": {"id": ..., "display": {...}}}`.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let Value::Mapping(map) = from_json(input)? else {
            return Err(ConfigError::NotAnObject("vocabulary"));
        };
        let mut vocabulary = Vocabulary::empty();
        for (name, entry) in map {
            if entry.as_mapping().is_none() {
                return Err(ConfigError::BadVocabularyEntry(name));
            }
            vocabulary.insert(name, entry);
        }
        Ok(vocabulary)
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: Value) {
        self.verbs.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.verbs.get(name)
    }

    pub fn len(&self) -> usize {
        self.verbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }
}

/// `{id, display: {"en-US": name}}`
pub fn verb_definition(namespace: &str, name: &str) -> Value {
    let mut display = Mapping::new();
    display.insert("en-US".to_string(), Value::from(name));
    let mut verb = Mapping::new();
    verb.insert("id".to_string(), Value::String(format!("{}{}", namespace, name)));
    verb.insert("display".to_string(), Value::Mapping(display));
    Value::Mapping(verb)
}

// ── Key resolution ──────────────────────────────────────────────────

/// Look up the value a config key stands for in `category`.
///
/// Structured keys pass through unchanged. String keys are trimmed and
/// tried as object notation (evaluated against `scope`), then as an entry
/// of the category dictionary, then, for verbs, in the vocabulary.
/// Dictionary entries are returned as independent copies.
pub fn resolve_key(
    defaults: &Defaults,
    vocabulary: &Vocabulary,
    category: Category,
    raw_key: &Value,
    scope: &Value,
) -> Option<Value> {
    let key = match raw_key {
        Value::Null => return None,
        Value::String(s) => s.trim(),
        structured => return Some(structured.clone()),
    };
    if key.is_empty() {
        return None;
    }

    if looks_like_object(key) {
        match parse_object(key, scope) {
            Ok(value) => return Some(value),
            Err(err) => {
                if defaults.debug() {
                    tracing::warn!(%category, error = %err, "malformed object notation");
                }
            }
        }
    }

    if let Some(entry) = defaults.dictionary(category).and_then(|d| d.get(key)) {
        if matches!(entry, Value::Mapping(_) | Value::Thunk(_)) {
            tracing::debug!(%category, key, "resolved from dictionary");
            return Some(entry.clone());
        }
    }

    if category == Category::Verbs {
        if let Some(verb) = vocabulary.get(key) {
            tracing::debug!(key, "resolved from vocabulary");
            return Some(verb.clone());
        }
    }

    None
}
