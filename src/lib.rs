pub mod dictionary;
pub mod engine;
pub mod error;
pub mod json;
pub mod navigate;
pub mod notation;
pub mod path;
pub mod resolve;
pub mod statement;
pub mod transport;
pub mod tree;

pub use dictionary::{resolve_key, Category, Defaults, Vocabulary};
pub use engine::{dataset_to_config, Engine};
pub use error::{ConfigError, NotationError, SendError, TransportError};
pub use navigate::{lookup, navigate, set_path};
pub use path::{parse_key, parse_path};
pub use resolve::resolve;
pub use statement::{Config, StatementDraft};
pub use transport::{RecordingTransport, StatementTransport};
pub use tree::{Mapping, Thunk, Value};

#[cfg(test)]
mod tests;
