use thiserror::Error;

/// The three failure classes a compilation can end in.
///
/// Every [`CompileError`] maps onto exactly one of these; callers that only care about the
/// class of failure (e.g. to pick an exit code) can match on [`CompileError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required field is absent or empty.
    Configuration,
    /// The requested optimization-type/discretization/algorithm tuple is not implemented.
    UnsupportedCombination,
    /// Two parts of the problem, or two parts of the graph, disagree with each other.
    Consistency,
}

/// Errors that can occur while reading or converting problem metadata.
#[derive(Error, Debug, Clone)]
pub enum MetadataError {
    #[error("Failed to parse problem metadata JSON: {0}")]
    JsonParseError(String),

    #[error("Unknown {field} keyword: '{value}'")]
    UnknownKeyword { field: &'static str, value: String },

    #[error("Field '{field}' expects a number, but found '{value}'")]
    InvalidNumber { field: String, value: String },

    #[error("Invalid custom metadata: {0}")]
    ValidationError(String),
}

/// Errors that can occur during interface graph compilation.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("The services list is empty; at least one physics performer is required")]
    EmptyServices,

    #[error("The objective does not list any criteria")]
    EmptyObjective,

    #[error("{context} references unknown {entity} '{id}'")]
    UnknownReference {
        context: String,
        entity: &'static str,
        id: String,
    },

    #[error("No performer is registered for service '{0}'")]
    UnknownPerformer(String),

    #[error("Constraint '{constraint}' has an invalid target: {message}")]
    InvalidConstraintTarget { constraint: String, message: String },

    #[error("Robust optimization settings are invalid: {0}")]
    InvalidRobustSettings(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Unsupported configuration: {0}")]
    UnsupportedCombination(String),

    #[error(
        "Objective arrays have mismatched lengths: criteria={criteria}, services={services}, scenarios={scenarios}, weights={weights}"
    )]
    ObjectiveLengthMismatch {
        criteria: usize,
        services: usize,
        scenarios: usize,
        weights: usize,
    },

    #[error("Number of shape design parameters ({declared}) does not match the csm file ({found})")]
    CsmParameterMismatch { declared: usize, found: usize },

    #[error(
        "Channel '{channel}' is owned by '{existing}' but was redeclared with owner '{conflicting}'"
    )]
    DuplicateOwner {
        channel: String,
        existing: String,
        conflicting: String,
    },

    #[error("Channel '{channel}' was redeclared with a different layout")]
    LayoutConflict { channel: String },

    #[error("{location} reads undeclared channel '{channel}'")]
    UndeclaredChannel { location: String, channel: String },

    #[error("{location} writes channel '{channel}', which is owned by '{owner}'")]
    WriterNotOwner {
        location: String,
        channel: String,
        owner: String,
    },

    #[error("Channel '{channel}' names undeclared performer '{performer}'")]
    UndeclaredPerformer { channel: String, performer: String },

    #[error("{location} reads '{channel}' before a later operation of the stage writes it")]
    ReadBeforeWrite { location: String, channel: String },

    #[error("Stage '{stage}' declares output '{channel}' that none of its operations write")]
    UnwrittenStageOutput { stage: String, channel: String },

    #[error("Aggregation into '{target}' has {inputs} inputs but {weights} weights")]
    AggregationMismatch {
        target: String,
        inputs: usize,
        weights: usize,
    },
}

impl CompileError {
    /// Classifies the error into the configuration/unsupported/consistency taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::EmptyServices
            | CompileError::EmptyObjective
            | CompileError::UnknownReference { .. }
            | CompileError::UnknownPerformer(_)
            | CompileError::InvalidConstraintTarget { .. }
            | CompileError::InvalidRobustSettings(_)
            | CompileError::MissingSetting(_) => ErrorKind::Configuration,
            CompileError::UnsupportedCombination(_) => ErrorKind::UnsupportedCombination,
            CompileError::ObjectiveLengthMismatch { .. }
            | CompileError::CsmParameterMismatch { .. }
            | CompileError::DuplicateOwner { .. }
            | CompileError::LayoutConflict { .. }
            | CompileError::UndeclaredChannel { .. }
            | CompileError::WriterNotOwner { .. }
            | CompileError::UndeclaredPerformer { .. }
            | CompileError::ReadBeforeWrite { .. }
            | CompileError::UnwrittenStageOutput { .. }
            | CompileError::AggregationMismatch { .. } => ErrorKind::Consistency,
        }
    }
}

/// Errors that can occur when writing a compiled graph to XML or to a binary artifact.
#[derive(Error, Debug, Clone)]
pub enum SerializeError {
    #[error("Failed to write XML: {0}")]
    Xml(String),

    #[error("Serialized document is not valid UTF-8: {0}")]
    Utf8(String),

    #[error("Could not access artifact file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Data is not an interface graph artifact")]
    NotAnArtifact,

    #[error("Artifact format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("Failed to encode artifact: {0}")]
    Encode(String),

    #[error("Failed to decode artifact: {0}")]
    Decode(String),
}
