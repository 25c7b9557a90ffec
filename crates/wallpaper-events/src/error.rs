#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("transient event bus failure: {0}")]
    Transient(String),
    #[error("permanent event bus failure: {0}")]
    Permanent(String),
    #[error("payload failed schema validation: {0}")]
    SchemaInvalid(String),
    #[error("payload is not valid JSON: {0}")]
    Malformed(String),
}
