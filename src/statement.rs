use crate::error::SendError;
use crate::json::to_serde;
use crate::tree::*;
use serde_json::json;
use uuid::Uuid;

/// A flat config: dataset keys (without the `data-xapi-` prefix) to values.
pub type Config = Mapping;

pub const AGENT: &str = "agent";
pub const VERB: &str = "verb";
pub const OBJECT: &str = "object";
pub const RESULT: &str = "result";
pub const CONTEXT: &str = "context";
pub const PARENT_ACTIVITY: &str = "parent-activity";
pub const GROUPING_ACTIVITY: &str = "grouping-activity";
pub const CONTEXT_ACTIVITY: &str = "context-activity";
pub const VERB_ID: &str = "verb-id";
pub const VERB_NAME: &str = "verb-name";
pub const OBJECT_ID: &str = "object-id";
pub const OBJECT_NAME: &str = "object-name";
pub const OBJECT_DESC: &str = "object-desc";
pub const AGENT_NAME: &str = "agent-name";
pub const AGENT_MBOX: &str = "agent-mbox";
pub const AGENT_HASH: &str = "agent-hash";
pub const AGENT_ACCOUNT_PAGE: &str = "agent-account-page";
pub const AGENT_ACCOUNT_NAME: &str = "agent-account-name";
pub const DEBUG: &str = "debug";

/// The fields of one statement, resolved but not yet sent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatementDraft {
    pub actor: Option<Value>,
    pub verb: Option<Value>,
    pub object: Option<Value>,
    pub result: Option<Value>,
    pub context: Option<Value>,
    pub parent_activity: Option<Value>,
    pub grouping_activity: Option<Value>,
    pub other_activity: Option<Value>,
}

impl StatementDraft {
    /// Names of the required fields (actor, verb, object) still absent.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("actor", &self.actor),
            ("verb", &self.verb),
            ("object", &self.object),
        ]
        .into_iter()
        .filter(|(_, field)| !is_present(field.as_ref()))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_ready(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Assemble the xAPI statement with a fresh id and registration.
    pub fn into_statement(self) -> Result<serde_json::Value, SendError> {
        self.into_statement_with_ids(Uuid::new_v4(), Uuid::new_v4())
    }

    pub fn into_statement_with_ids(
        self,
        id: Uuid,
        registration: Uuid,
    ) -> Result<serde_json::Value, SendError> {
        let missing = self.missing_fields();
        let (true, Some(actor), Some(verb), Some(object)) =
            (missing.is_empty(), self.actor, self.verb, self.object)
        else {
            return Err(SendError::MissingFields(missing));
        };

        let mut statement = json!({
            "id": id.to_string(),
            "actor": to_serde(&actor),
            "verb": to_serde(&verb),
            "object": to_serde(&object),
        });
        if let Some(result) = self.result.filter(Value::is_truthy) {
            statement["result"] = to_serde(&result);
        }

        let mut context = match self.context.map(|c| to_serde(&c)) {
            Some(serde_json::Value::Object(map)) => map,
            Some(other) => {
                tracing::warn!(context = %other, "context is not an object, replacing it");
                serde_json::Map::new()
            }
            None => serde_json::Map::new(),
        };
        for (kind, activity) in [
            ("parent", self.parent_activity),
            ("grouping", self.grouping_activity),
            ("other", self.other_activity),
        ] {
            if let Some(activity) = activity.filter(Value::is_truthy) {
                add_context_activity(&mut context, kind, to_serde(&activity));
            }
        }
        context.insert(
            "registration".to_string(),
            serde_json::Value::String(registration.to_string()),
        );
        statement["context"] = serde_json::Value::Object(context);

        Ok(statement)
    }
}

/// Append to `context.contextActivities.<kind>`, turning a single activity
/// already there into a list.
fn add_context_activity(
    context: &mut serde_json::Map<String, serde_json::Value>,
    kind: &str,
    activity: serde_json::Value,
) {
    let activities = context
        .entry("contextActivities")
        .or_insert_with(|| json!({}));
    if !activities.is_object() {
        *activities = json!({});
    }
    let slot = &mut activities[kind];
    if slot.is_null() {
        *slot = json!([activity]);
    } else if let Some(items) = slot.as_array_mut() {
        items.push(activity);
    } else {
        let first = slot.take();
        *slot = json!([first, activity]);
    }
}

/// A required field counts as present when it is truthy and, for
/// mappings, non-empty.
fn is_present(field: Option<&Value>) -> bool {
    match field {
        Some(Value::Mapping(map)) => !map.is_empty(),
        Some(value) => value.is_truthy(),
        None => false,
    }
}

/// A non-empty string setting from the config.
pub fn config_str<'a>(config: &'a Config, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn en_us(text: &str) -> Value {
    let mut map = Mapping::new();
    map.insert("en-US".to_string(), Value::from(text));
    Value::Mapping(map)
}

/// `{id, display}` from `verb-id` and `verb-name`.
pub fn construct_verb(config: &Config) -> Option<Value> {
    let id = config_str(config, VERB_ID)?;
    let name = config_str(config, VERB_NAME)?;
    let mut verb = Mapping::new();
    verb.insert("id".to_string(), Value::from(id));
    verb.insert("display".to_string(), en_us(name));
    Some(Value::Mapping(verb))
}

/// An Activity from `object-id`, `object-name` and `object-desc`.
pub fn construct_object(config: &Config) -> Option<Value> {
    let id = config_str(config, OBJECT_ID)?;
    let name = config_str(config, OBJECT_NAME)?;
    let desc = config_str(config, OBJECT_DESC)?;
    let mut definition = Mapping::new();
    definition.insert("name".to_string(), en_us(name));
    definition.insert("description".to_string(), en_us(desc));
    let mut object = Mapping::new();
    object.insert("objectType".to_string(), Value::from("Activity"));
    object.insert("id".to_string(), Value::from(id));
    object.insert("definition".to_string(), Value::Mapping(definition));
    Some(Value::Mapping(object))
}

/// An Agent from `agent-name` + `agent-mbox` or from the account pair.
///
/// `hash` is applied to the `mailto:` IRI when `agent-hash` is set.
pub fn construct_actor(config: &Config, hash: impl Fn(&str) -> String) -> Option<Value> {
    let name = config_str(config, AGENT_NAME);
    let mbox = config_str(config, AGENT_MBOX);
    let account_page = config_str(config, AGENT_ACCOUNT_PAGE);
    let account_name = config_str(config, AGENT_ACCOUNT_NAME);

    let has_mbox_identity = name.is_some() && mbox.is_some();
    let has_account = account_page.is_some() && account_name.is_some();
    if !has_mbox_identity && !has_account {
        return None;
    }

    let mut actor = Mapping::new();
    actor.insert("objectType".to_string(), Value::from("Agent"));
    if let Some(name) = name {
        actor.insert("name".to_string(), Value::from(name));
    }
    if let Some(mbox) = mbox {
        let iri = format!("mailto:{}", mbox);
        let hashed = config.get(AGENT_HASH).map_or(false, Value::is_truthy);
        let iri = if hashed { hash(&iri) } else { iri };
        actor.insert("mbox".to_string(), Value::String(iri));
    }
    if let (Some(page), Some(account_name)) = (account_page, account_name) {
        let mut account = Mapping::new();
        account.insert("homePage".to_string(), Value::from(page));
        account.insert("name".to_string(), Value::from(account_name));
        actor.insert("account".to_string(), Value::Mapping(account));
    }
    Some(Value::Mapping(actor))
}
