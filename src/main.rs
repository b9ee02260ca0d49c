use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use xapi_resolve::json::from_json;
use xapi_resolve::{
    dataset_to_config, Config, Defaults, Engine, RecordingTransport, Value, Vocabulary,
};

/// Resolve a flat xAPI config read from stdin and print the statement.
#[derive(Parser, Debug)]
#[command(name = "xapi-resolve", version)]
struct Args {
    /// JSON document with defaults (dictionaries, variables, defaultActor)
    #[arg(long)]
    defaults: Option<PathBuf>,

    /// JSON verb table to use instead of the ADL verbs
    #[arg(long)]
    vocabulary: Option<PathBuf>,

    /// Turn on the debug default (statement logging, notation warnings)
    #[arg(long)]
    debug: bool,

    /// Treat stdin as a map of `data-xapi-*` attributes
    #[arg(long)]
    dataset: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut defaults = match &args.defaults {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading defaults from {}", path.display()))?;
            Defaults::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => Defaults::new(),
    };
    if args.debug {
        defaults.set_default("debug", Value::Bool(true));
    }

    let vocabulary = match &args.vocabulary {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading vocabulary from {}", path.display()))?;
            Vocabulary::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => Vocabulary::adl(),
    };

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("reading config from stdin")?;
    let config = read_config(&input, args.dataset)?;

    let mut engine = Engine::with_config(defaults, vocabulary, RecordingTransport::new());
    let statement = match engine.send_statement_by_config(&config) {
        Ok(statement) => statement,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };
    println!("{}", serde_json::to_string_pretty(&statement)?);
    Ok(())
}

fn read_config(input: &str, dataset: bool) -> Result<Config> {
    let Value::Mapping(map) = from_json(input).context("config is not valid JSON")? else {
        bail!("config must be a JSON object");
    };
    if !dataset {
        return Ok(map);
    }
    let attributes = map
        .into_iter()
        .map(|(name, value)| match value {
            Value::String(s) => (name, s),
            other => (name, other.to_display_string()),
        });
    Ok(dataset_to_config(attributes))
}
