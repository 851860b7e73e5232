use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Unknown element type: {type_tag}")]
    UnknownElementType { type_tag: String },
    #[error("Failed to decode test plan: {source}")]
    DecodePlan {
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode test plan: {source}")]
    EncodePlan {
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to read project '{path}': {source}")]
    ReadProject {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write project '{path}': {source}")]
    WriteProject {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
