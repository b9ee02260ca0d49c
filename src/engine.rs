use crate::dictionary::{self, Category, Defaults, Vocabulary, VARIABLES};
use crate::error::{NotationError, SendError};
use crate::navigate::set_path;
use crate::notation::evaluate;
use crate::path::parse_key;
use crate::resolve::resolve;
use crate::statement::*;
use crate::transport::StatementTransport;
use crate::tree::*;

/// Attribute namespace scraped from authoring-tool elements.
pub const DATASET_PREFIX: &str = "data-xapi-";

/// Resolves configs into statements and hands them to a transport.
///
/// Owns its defaults and vocabulary, so independent engines never share
/// dictionaries or variables.
pub struct Engine<T: StatementTransport> {
    defaults: Defaults,
    vocabulary: Vocabulary,
    transport: T,
    last_send_failed: bool,
}

impl<T: StatementTransport> Engine<T> {
    /// An engine with empty defaults and the ADL vocabulary.
    pub fn new(transport: T) -> Self {
        Self::with_config(Defaults::new(), Vocabulary::adl(), transport)
    }

    pub fn with_config(defaults: Defaults, vocabulary: Vocabulary, transport: T) -> Self {
        Engine {
            defaults,
            vocabulary,
            transport,
            last_send_failed: false,
        }
    }

    // ── Configuration ───────────────────────────────────────────────

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut Defaults {
        &mut self.defaults
    }

    pub fn set_default(&mut self, key: impl Into<String>, value: Value) {
        self.defaults.set_default(key, value);
    }

    /// Replace all defaults with `defaults`.
    pub fn replace_defaults(&mut self, defaults: Mapping) {
        self.defaults.replace_defaults(defaults);
    }

    /// One default by key, or `None` if unset.
    pub fn get_default(&self, key: &str) -> Option<&Value> {
        self.defaults.get_default(key)
    }

    pub fn set_default_actor(&mut self, actor: Value) {
        self.defaults.set_default_actor(actor);
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether the most recent send was rejected by the transport.
    pub fn last_send_failed(&self) -> bool {
        self.last_send_failed
    }

    /// The variable scope placeholders and notation identifiers read.
    pub fn scope(&self) -> Value {
        self.defaults.scope(None)
    }

    // ── Resolution ──────────────────────────────────────────────────

    pub fn resolve_key(&self, category: Category, raw_key: &Value, scope: &Value) -> Option<Value> {
        dictionary::resolve_key(&self.defaults, &self.vocabulary, category, raw_key, scope)
    }

    /// Look up a config value in `category` and resolve what it names.
    pub fn resolve_field(
        &self,
        category: Category,
        raw_key: Option<&Value>,
        scope: &Value,
    ) -> Option<Value> {
        self.field_from(&self.defaults, category, raw_key, scope)
    }

    fn field_from(
        &self,
        defaults: &Defaults,
        category: Category,
        raw_key: Option<&Value>,
        scope: &Value,
    ) -> Option<Value> {
        let found =
            dictionary::resolve_key(defaults, &self.vocabulary, category, raw_key?, scope)?;
        Some(resolve(found, scope))
    }

    /// Resolve every field of `config` into a draft ready to send.
    ///
    /// Dictionaries carried in the config (`actors`, `verbs`, `objects`,
    /// `results`) are layered over the defaults for this call only, and its
    /// `variables` over the default variables.
    ///
    /// Fails, logging a diagnostic, when actor, verb or object cannot be
    /// resolved.
    pub fn build_statement(&self, config: &Config) -> Result<StatementDraft, SendError> {
        let defaults = self.defaults.layered(config);
        let scope = defaults.scope(config.get(VARIABLES).and_then(Value::as_mapping));
        let field = |category, key: &str| {
            self.field_from(&defaults, category, config.get(key), &scope)
        };

        let mut draft = StatementDraft {
            actor: field(Category::Actors, AGENT),
            verb: field(Category::Verbs, VERB),
            object: field(Category::Objects, OBJECT),
            result: field(Category::Results, RESULT),
            context: field(Category::Context, CONTEXT),
            parent_activity: field(Category::Objects, PARENT_ACTIVITY),
            grouping_activity: field(Category::Objects, GROUPING_ACTIVITY),
            other_activity: field(Category::Objects, CONTEXT_ACTIVITY),
        };

        if draft.verb.is_none() {
            draft.verb = construct_verb(config).map(|v| resolve(v, &scope));
        }
        if draft.object.is_none() {
            draft.object = construct_object(config).map(|v| resolve(v, &scope));
        }
        if draft.actor.is_none() {
            draft.actor = construct_actor(config, |iri| self.transport.hash(iri))
                .or_else(|| defaults.default_actor())
                .map(|v| resolve(v, &scope));
        }

        let missing = draft.missing_fields();
        if !missing.is_empty() {
            let err = SendError::MissingFields(missing);
            tracing::warn!("{}", err);
            return Err(err);
        }
        Ok(draft)
    }

    // ── Sending ─────────────────────────────────────────────────────

    /// Resolve `config` into a statement and send it.
    ///
    /// Transport failures are logged and recorded in
    /// [`last_send_failed`](Self::last_send_failed); the assembled
    /// statement is returned either way.
    pub fn send_statement_by_config(
        &mut self,
        config: &Config,
    ) -> Result<serde_json::Value, SendError> {
        let statement = self.build_statement(config)?.into_statement()?;
        self.send_statement(&statement, config.get(DEBUG));
        Ok(statement)
    }

    /// Send a statement described by `data-xapi-*` attributes.
    pub fn send_statement_by_dataset<I, K, V>(
        &mut self,
        attributes: I,
    ) -> Result<serde_json::Value, SendError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let config = dataset_to_config(attributes);
        self.send_statement_by_config(&config)
    }

    /// Send a statement from positional verb/object/result/context keys.
    pub fn send_statement_by_arguments(
        &mut self,
        verb: &str,
        object: &str,
        result: Option<&str>,
        context: Option<&str>,
    ) -> Result<serde_json::Value, SendError> {
        let mut config = Config::new();
        for (key, value) in [
            (VERB, Some(verb)),
            (OBJECT, Some(object)),
            (RESULT, result),
            (CONTEXT, context),
        ] {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                config.insert(key.to_string(), Value::from(value));
            }
        }
        self.send_statement_by_config(&config)
    }

    /// Hand a statement to the transport; `debug` is the config's debug
    /// setting (`"echo"` fetches the statement back after sending).
    pub fn send_statement(&mut self, statement: &serde_json::Value, debug: Option<&Value>) {
        self.last_send_failed = false;
        let id = match self.transport.send(statement) {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::error!(error = %err, "statement was not sent");
                self.last_send_failed = true;
                None
            }
        };

        let debug = match debug {
            Some(Value::Null) | None => return,
            Some(debug) => debug,
        };
        if !self.defaults.debug() {
            return;
        }
        tracing::info!(
            "{}",
            serde_json::to_string_pretty(statement).unwrap_or_default()
        );
        if self.last_send_failed || debug.as_str() != Some("echo") {
            return;
        }
        if let Some(id) = id {
            match self.transport.fetch(&id) {
                Some(echo) => tracing::info!(%id, echo = %echo, "statement echo"),
                None => tracing::warn!(%id, "statement could not be fetched back"),
            }
        }
    }

    // ── Host actions ────────────────────────────────────────────────

    /// Evaluate an object-notation expression against the scope and
    /// resolve the result. `undefined` yields `None`.
    pub fn run_expression(&self, expression: &str) -> Result<Option<Value>, NotationError> {
        let scope = self.scope();
        let value = evaluate(expression.trim(), &scope)?.map(|v| resolve(v, &scope));
        if self.defaults.debug() {
            tracing::info!(
                expression,
                result = %display_or_undefined(value.as_ref()),
                "expression evaluated"
            );
        }
        Ok(value)
    }

    /// Store `value` in the variable scope at the path `key` names,
    /// creating intermediate containers. Returns `false` if `key` is not a
    /// usable path.
    pub fn set_custom_data_variable(&mut self, key: &str, value: Value) -> bool {
        let Some(path) = parse_key(key.trim()) else {
            return false;
        };
        let stored = set_path(self.defaults.variables_mut(), &path, value);
        if !stored {
            tracing::warn!(key, "custom data variable could not be stored");
        }
        stored
    }
}

/// Flatten `data-xapi-*` attributes into a config, dropping the prefix.
///
/// `agent-hash` is a presence flag: any value turns it on.
pub fn dataset_to_config<I, K, V>(attributes: I) -> Config
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut config = Config::new();
    for (name, value) in attributes {
        let Some(key) = name.as_ref().strip_prefix(DATASET_PREFIX) else {
            continue;
        };
        let value = if key == AGENT_HASH {
            Value::Bool(true)
        } else {
            Value::String(value.into())
        };
        config.insert(key.to_string(), value);
    }
    config
}
