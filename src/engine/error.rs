#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to create run path {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read run state {path}: {source}")]
    ReadState {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse run state {path}: {source}")]
    ParseState {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write run state {path}: {source}")]
    WriteState {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode record for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("turn seq {seq} does not advance the log (last appended {last})")]
    NonMonotonicSeq { seq: u64, last: u64 },
    #[error("failed to decode annotated image for turn {seq}: {source}")]
    ImageDecode {
        seq: u64,
        #[source]
        source: base64::DecodeError,
    },
    #[error("tool `{name}` is not in the tool catalog")]
    UnknownTool { name: String },
}
