use crate::dictionary::{verb_definition, Category, Defaults, Vocabulary};
use crate::engine::{dataset_to_config, Engine};
use crate::error::{SendError, TransportError};
use crate::json::{from_serde, to_serde};
use crate::transport::{RecordingTransport, StatementTransport};
use crate::tree::*;
use serde_json::json;

// ── Shared fixture runners ──────────────────────────────────────────

/// Embed fixture files at compile time.
const PATH_FIXTURES: &str = include_str!("../test-data/fixtures/paths.json");
const RESOLVE_FIXTURES: &str = include_str!("../test-data/fixtures/resolve.json");
const STATEMENT_FIXTURES: &str = include_str!("../test-data/fixtures/statements.json");

fn fixture_config(config: &serde_json::Value) -> Mapping {
    match from_serde(config.clone()) {
        Value::Mapping(map) => map,
        other => panic!("config must be an object, got {:?}", other),
    }
}

fn engine_with_defaults(defaults: &serde_json::Value) -> Engine<RecordingTransport> {
    let defaults = Defaults::from_json(&defaults.to_string()).unwrap();
    Engine::with_config(defaults, Vocabulary::adl(), RecordingTransport::new())
}

#[test]
fn test_fixture_paths() {
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(PATH_FIXTURES).unwrap();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let input = from_serde(fixture["input"].clone());
        let expected: Option<Vec<String>> =
            serde_json::from_value(fixture["expected"].clone()).unwrap();
        assert_eq!(
            crate::parse_path(&input),
            expected,
            "Fixture '{}': path mismatch",
            name
        );
    }
}

#[test]
fn test_fixture_resolve() {
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(RESOLVE_FIXTURES).unwrap();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let scope = from_serde(fixture["scope"].clone());
        let input = from_serde(fixture["input"].clone());
        let expected = from_serde(fixture["expected"].clone());
        let got = crate::resolve(input, &scope);
        assert_eq!(
            got, expected,
            "Fixture '{}': value mismatch\n  Got:      {:?}\n  Expected: {:?}",
            name, got, expected
        );
    }
}

#[test]
fn test_fixture_statements() {
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(STATEMENT_FIXTURES).unwrap();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let mut engine = engine_with_defaults(&fixture["defaults"]);
        let config = fixture_config(&fixture["config"]);
        let result = engine.send_statement_by_config(&config);

        if let Some(missing) = fixture.get("expectMissing") {
            let missing: Vec<String> = serde_json::from_value(missing.clone()).unwrap();
            match result {
                Err(SendError::MissingFields(fields)) => assert_eq!(
                    fields, missing,
                    "Fixture '{}': missing fields mismatch",
                    name
                ),
                Ok(statement) => panic!("Fixture '{}': unexpectedly sent {}", name, statement),
            }
            assert_eq!(
                engine.transport().sent().count(),
                0,
                "Fixture '{}': nothing may be sent",
                name
            );
            continue;
        }

        let mut statement = result
            .unwrap_or_else(|err| panic!("Fixture '{}': send failed: {}", name, err));
        assert_eq!(
            engine.transport().last(),
            Some(&statement),
            "Fixture '{}': transport did not receive the statement",
            name
        );

        let registration = statement["context"]
            .as_object_mut()
            .and_then(|c| c.remove("registration"))
            .unwrap_or_else(|| panic!("Fixture '{}': no registration", name));
        assert!(uuid::Uuid::parse_str(registration.as_str().unwrap()).is_ok());
        assert!(uuid::Uuid::parse_str(statement["id"].as_str().unwrap()).is_ok());

        let expected = &fixture["expected"];
        for field in ["actor", "verb", "object", "result"] {
            assert_eq!(
                statement.get(field),
                expected.get(field),
                "Fixture '{}': {} mismatch",
                name,
                field
            );
        }
        let expected_context = expected.get("context").cloned().unwrap_or_else(|| json!({}));
        assert_eq!(
            statement["context"], expected_context,
            "Fixture '{}': context mismatch",
            name
        );
    }
}

// ── Engine behaviour ────────────────────────────────────────────────

fn flat(entries: &[(&str, &str)]) -> Mapping {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

fn object_entry(id: &str) -> Value {
    from_serde(json!({ "id": id }))
}

#[test]
fn test_end_to_end_ready_then_missing() {
    let engine = Engine::new(RecordingTransport::new());
    let mut config = fixture_config(&json!({
        "verb": "completed",
        "object": "act1",
        "objects": {"act1": {"id": "http://x/act1"}},
        "agent-name": "Ann",
        "agent-mbox": "ann@example.com"
    }));

    let draft = engine.build_statement(&config).unwrap();
    assert!(draft.is_ready());
    assert_eq!(
        draft.actor.map(|a| to_serde(&a)),
        Some(json!({"objectType": "Agent", "name": "Ann", "mbox": "mailto:ann@example.com"}))
    );
    assert_eq!(
        draft.verb,
        Some(verb_definition("http://adlnet.gov/expapi/verbs/", "completed"))
    );
    assert_eq!(draft.object, Some(object_entry("http://x/act1")));

    config.insert("objects".to_string(), Value::mapping());
    assert_eq!(
        engine.build_statement(&config),
        Err(SendError::MissingFields(vec!["object"]))
    );
}

#[test]
fn test_config_dictionaries_and_variables_stay_local() {
    let mut engine = Engine::new(RecordingTransport::new());
    engine.set_default_actor(from_serde(json!({"objectType": "Agent", "name": "Ann"})));
    engine.set_default("variables", from_serde(json!({"who": "ann", "n": 1})));
    engine
        .defaults_mut()
        .extend_dictionary(Category::Objects, "page", object_entry("http://x/${who}/${n}"));

    let config = fixture_config(&json!({
        "verb": "experienced",
        "object": "page",
        "result": "seen",
        "results": {"seen": {"completion": true}},
        "variables": {"who": "bea"}
    }));
    let statement = engine.send_statement_by_config(&config).unwrap();
    assert_eq!(statement["object"], json!({"id": "http://x/bea/1"}));
    assert_eq!(statement["result"], json!({"completion": true}));

    assert_eq!(engine.scope(), from_serde(json!({"who": "ann", "n": 1})));
    assert!(engine
        .defaults()
        .dictionary(Category::Results)
        .unwrap()
        .is_empty());
}

#[test]
fn test_notation_key_resolved_through_scope() {
    let mut engine = Engine::new(RecordingTransport::new());
    engine.set_default("variables", from_serde(json!({"t": "Activity"})));
    let scope = engine.scope();

    let raw = Value::from("{id:'x', type:'${t}'}");
    let found = engine
        .resolve_field(Category::Objects, Some(&raw), &scope)
        .unwrap();
    assert_eq!(found, from_serde(json!({"id": "x", "type": "Activity"})));

    let bare = Value::from("{id:'x', type: t}");
    assert_eq!(
        engine.resolve_key(Category::Objects, &bare, &scope),
        Some(from_serde(json!({"id": "x", "type": "Activity"})))
    );
}

#[test]
fn test_dictionary_entries_are_not_mutated_by_resolution() {
    let mut engine = Engine::new(RecordingTransport::new());
    engine.set_default("variables", from_serde(json!({"n": 1})));
    let entry = from_serde(json!({"id": "http://x/${n}"}));
    engine
        .defaults_mut()
        .extend_dictionary(Category::Objects, "act", entry.clone());

    let scope = engine.scope();
    let resolved = engine
        .resolve_field(Category::Objects, Some(&"act".into()), &scope)
        .unwrap();
    assert_eq!(resolved, object_entry("http://x/1"));
    assert_eq!(
        engine
            .defaults()
            .dictionary(Category::Objects)
            .and_then(|d| d.get("act")),
        Some(&entry)
    );
}

#[test]
fn test_thunks_in_defaults() {
    let mut engine = Engine::new(RecordingTransport::new());
    engine.set_default_actor(Value::thunk(|| {
        from_serde(json!({"objectType": "Agent", "mbox": "mailto:lms@example.com"}))
    }));
    let mut variables = Mapping::new();
    variables.insert(
        "attempt".to_string(),
        Value::thunk(|| from_serde(json!({"number": 2}))),
    );
    engine.set_default("variables", Value::Mapping(variables));
    let mut activity = Mapping::new();
    activity.insert(
        "id".to_string(),
        Value::thunk(|| "http://x/attempt/${attempt().number}".into()),
    );
    engine
        .defaults_mut()
        .extend_dictionary(Category::Objects, "attempt", Value::Mapping(activity));

    let statement = engine
        .send_statement_by_arguments("attempted", "attempt", None, None)
        .unwrap();
    assert_eq!(statement["actor"]["mbox"], json!("mailto:lms@example.com"));
    assert_eq!(statement["object"], json!({"id": "http://x/attempt/2"}));
}

#[test]
fn test_send_by_dataset_strips_prefix() {
    let mut engine = Engine::new(RecordingTransport::new());
    engine
        .defaults_mut()
        .extend_dictionary(Category::Objects, "act1", object_entry("http://x/act1"));
    let attributes = vec![
        ("data-xapi-verb", "launched"),
        ("data-xapi-object", "act1"),
        ("data-xapi-agent-name", "Ann"),
        ("data-xapi-agent-mbox", "ann@example.com"),
        ("data-xapi-agent-hash", ""),
        ("class", "button"),
    ];
    let statement = engine.send_statement_by_dataset(attributes).unwrap();
    let expected_hash = engine.transport().hash("mailto:ann@example.com");
    assert_eq!(statement["actor"]["mbox"], json!(expected_hash));
    assert_eq!(
        statement["verb"]["id"],
        json!("http://adlnet.gov/expapi/verbs/launched")
    );
}

#[test]
fn test_dataset_to_config() {
    let config = dataset_to_config([
        ("data-xapi-verb", "completed"),
        ("data-xapi-agent-hash", "no"),
        ("id", "ignored"),
    ]);
    assert_eq!(config.get("verb"), Some(&Value::from("completed")));
    assert_eq!(config.get("agent-hash"), Some(&Value::Bool(true)));
    assert_eq!(config.len(), 2);
}

#[test]
fn test_send_by_arguments_skips_blank_keys() {
    let mut engine = Engine::new(RecordingTransport::new());
    engine.set_default_actor(from_serde(json!({"objectType": "Agent", "name": "Ann"})));
    engine
        .defaults_mut()
        .extend_dictionary(Category::Objects, "act1", object_entry("http://x/act1"));
    engine.defaults_mut().extend_dictionary(
        Category::Results,
        "done",
        from_serde(json!({"completion": true})),
    );
    let statement = engine
        .send_statement_by_arguments("completed", "act1", Some("done"), Some("  "))
        .unwrap();
    assert_eq!(statement["result"], json!({"completion": true}));
    assert!(statement["context"].get("contextActivities").is_none());
}

#[test]
fn test_transport_failure_is_recorded_not_returned() {
    let mut engine = Engine::new(RecordingTransport::new());
    engine.set_default("debug", Value::Bool(true));
    engine.set_default_actor(from_serde(json!({"objectType": "Agent", "name": "Ann"})));
    engine
        .defaults_mut()
        .extend_dictionary(Category::Objects, "act1", object_entry("http://x/act1"));
    engine
        .transport_mut()
        .fail_next(TransportError::new("store unavailable"));

    let config = flat(&[("verb", "completed"), ("object", "act1"), ("debug", "echo")]);
    assert!(engine.send_statement_by_config(&config).is_ok());
    assert!(engine.last_send_failed());
    assert_eq!(engine.transport().sent().count(), 0);
    assert_eq!(engine.transport().fetch_count(), 0);

    assert!(engine.send_statement_by_config(&config).is_ok());
    assert!(!engine.last_send_failed());
    assert_eq!(engine.transport().sent().count(), 1);
    assert_eq!(engine.transport().fetch_count(), 1);
}

#[test]
fn test_echo_needs_debug_default_and_echo_setting() {
    let mut engine = Engine::new(RecordingTransport::new());
    engine.set_default_actor(from_serde(json!({"objectType": "Agent", "name": "Ann"})));
    engine
        .defaults_mut()
        .extend_dictionary(Category::Objects, "act1", object_entry("http://x/act1"));
    let echo = flat(&[("verb", "completed"), ("object", "act1"), ("debug", "echo")]);
    let logged = flat(&[("verb", "completed"), ("object", "act1"), ("debug", "true")]);

    engine.send_statement_by_config(&echo).unwrap();
    assert_eq!(engine.transport().fetch_count(), 0);

    engine.set_default("debug", Value::Bool(true));
    engine.send_statement_by_config(&logged).unwrap();
    assert_eq!(engine.transport().fetch_count(), 0);
    engine.send_statement_by_config(&echo).unwrap();
    assert_eq!(engine.transport().fetch_count(), 1);
    assert_eq!(engine.transport().sent().count(), 3);
}

#[test]
fn test_run_expression() {
    let mut engine = Engine::new(RecordingTransport::new());
    engine.set_default(
        "variables",
        from_serde(json!({"user": {"name": "Ann"}, "scores": [3, 4]})),
    );
    assert_eq!(
        engine.run_expression("{who: user.name, best: scores[1], note: '${user.name}!'}"),
        Ok(Some(from_serde(
            json!({"who": "Ann", "best": 4, "note": "Ann!"})
        )))
    );
    assert_eq!(engine.run_expression("undefined"), Ok(None));
    assert!(engine.run_expression("nobody.name").is_err());
}

#[test]
fn test_set_custom_data_variable() {
    let mut engine = Engine::new(RecordingTransport::new());
    assert!(engine.set_custom_data_variable("learner.progress[0]", Value::from("intro")));
    assert!(engine.set_custom_data_variable("mood", Value::from("curious")));
    assert!(!engine.set_custom_data_variable("", Value::Null));
    assert!(!engine.set_custom_data_variable("mood.inner", Value::Null));
    assert!(!engine.set_custom_data_variable("list[4000000000000]", Value::from("x")));
    assert_eq!(
        engine.scope(),
        from_serde(json!({
            "learner": {"progress": ["intro"]},
            "mood": "curious",
            "list": []
        }))
    );
    assert_eq!(
        engine.run_expression("`${learner.progress[0]} and ${mood}`"),
        Ok(Some(Value::from("intro and curious")))
    );
}

#[test]
fn test_replace_and_read_defaults() {
    let mut engine = Engine::new(RecordingTransport::new());
    let mut replacement = Mapping::new();
    replacement.insert("debug".to_string(), Value::Bool(true));
    engine.replace_defaults(replacement);
    assert_eq!(engine.get_default("debug"), Some(&Value::Bool(true)));
    assert_eq!(engine.get_default("objects"), None);
    assert_eq!(engine.defaults().all().len(), 1);
    assert_eq!(engine.scope(), Value::mapping());

    // Dictionaries missing after a wholesale replace read as empty.
    let config = flat(&[("verb", "completed"), ("object", "act1")]);
    assert_eq!(
        engine.build_statement(&config),
        Err(SendError::MissingFields(vec!["actor", "object"]))
    );
}

#[test]
fn test_custom_vocabulary() {
    let vocabulary = Vocabulary::from_json(
        r#"{"tapped": {"id": "http://example.com/verbs/tapped", "display": {"en-US": "tapped"}}}"#,
    )
    .unwrap();
    let engine = Engine::with_config(Defaults::new(), vocabulary, RecordingTransport::new());
    let scope = engine.scope();
    assert!(engine
        .resolve_key(Category::Verbs, &"tapped".into(), &scope)
        .is_some());
    assert!(engine
        .resolve_key(Category::Verbs, &"completed".into(), &scope)
        .is_none());
    assert!(Vocabulary::from_json(r#"{"bad": 1}"#).is_err());
}
