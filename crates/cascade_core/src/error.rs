use shared::domain::FieldKey;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("cascade {name} declares no dependencies")]
    Empty { name: String },
    #[error("field {field} cannot depend on itself")]
    SelfDependency { field: FieldKey },
    #[error("field {field} has more than one upstream field")]
    DuplicateUpstream { field: FieldKey },
    #[error("field {field} declares no query parameters")]
    MissingParams { field: FieldKey },
    #[error("dependency chain through {field} forms a cycle")]
    Cycle { field: FieldKey },
    #[error("query parameter source {source_field} of field {field} is not upstream of it")]
    ParamSourceNotUpstream {
        field: FieldKey,
        source_field: FieldKey,
    },
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("cascade {cascade} does not activate on page {path}")]
    Inactive { cascade: String, path: String },
    #[error("form has no field {field}")]
    MissingField { field: FieldKey },
    #[error("field {field} has no data-url attribute")]
    MissingDataUrl { field: FieldKey },
    #[error("invalid endpoint for field {field}: {source}")]
    InvalidEndpoint {
        field: FieldKey,
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("field {field} is not part of the cascade")]
    UnknownField { field: FieldKey },
}
