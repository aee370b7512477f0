use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("external tool exited with code {exit_code}: {output}")]
    ExternalTool { exit_code: i32, output: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("consistency error: requested {expected}, external system reported {actual}")]
    Consistency { expected: String, actual: String },

    #[error("gave up after {attempts} attempts (waited {waited:?})")]
    Timeout { attempts: u32, waited: Duration },

    #[error("process error: {0}")]
    Process(#[from] crate::subprocess::ProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
