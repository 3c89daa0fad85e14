use thiserror::Error;

use crate::types::SourceLocation;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CantalError {
    #[error("{}{location}: {message}", file_prefix(.file))]
    Parse {
        message: String,
        location: SourceLocation,
        file: Option<String>,
    },
    #[error("{location}: unknown event \"{name}\"")]
    UnknownEvent {
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: duplicate event \"{name}\" in state \"{state}\"")]
    DuplicateEvent {
        name: String,
        state: String,
        location: SourceLocation,
    },
    #[error("{location}: duplicate {kind} \"{name}\"")]
    DuplicateDeclaration {
        kind: &'static str,
        name: String,
        location: SourceLocation,
    },
    #[error("saved variable \"{variable}\" requires the actor to have a name")]
    MissingActorName { variable: String },
    #[error("unknown function \"{name}\"")]
    UnknownFunction { name: String },
    #[error("unknown symbol \"{name}\"")]
    UnknownSymbol { name: String },
    #[error("constant \"{name}\" cannot be assigned")]
    ConstantAssignment { name: String },
    #[error("no state condition is true for actor \"{actor_name}\"")]
    NoActiveState { actor_name: String },
    #[error("operator \"{op}\" cannot combine {left} and {right}")]
    TypeMismatch {
        op: String,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("state switches nested deeper than {limit} for actor \"{actor_name}\"")]
    StateSwitchOverflow { actor_name: String, limit: usize },
    #[error("could not read script \"{path}\": {message}")]
    ScriptRead { path: String, message: String },
    #[error("save store error: {message}")]
    SaveStore { message: String },
    #[error("unknown string \"{key}\"")]
    StringNotFound { key: String },
    #[error("function \"{function}\": {message}")]
    InvalidArgument { function: String, message: String },
}

fn file_prefix(file: &Option<String>) -> String {
    file.as_ref()
        .map(|file| format!("{}:", file))
        .unwrap_or_default()
}

impl CantalError {
    pub fn parse(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Parse {
            message: message.into(),
            location,
            file: None,
        }
    }

    pub fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "PARSE_ERROR",
            Self::UnknownEvent { .. } => "UNKNOWN_EVENT",
            Self::DuplicateEvent { .. } => "DUPLICATE_EVENT",
            Self::DuplicateDeclaration { .. } => "DUPLICATE_DECLARATION",
            Self::MissingActorName { .. } => "MISSING_ACTOR_NAME",
            Self::UnknownFunction { .. } => "UNKNOWN_FUNCTION",
            Self::UnknownSymbol { .. } => "UNKNOWN_SYMBOL",
            Self::ConstantAssignment { .. } => "CONSTANT_ASSIGNMENT",
            Self::NoActiveState { .. } => "NO_ACTIVE_STATE",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
            Self::StateSwitchOverflow { .. } => "STATE_SWITCH_OVERFLOW",
            Self::ScriptRead { .. } => "SCRIPT_READ",
            Self::SaveStore { .. } => "SAVE_STORE",
            Self::StringNotFound { .. } => "STRING_NOT_FOUND",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
        }
    }

    /// Load-time errors abort loading the owning actor.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::UnknownEvent { .. }
                | Self::DuplicateEvent { .. }
                | Self::DuplicateDeclaration { .. }
                | Self::MissingActorName { .. }
                | Self::ScriptRead { .. }
        )
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::Parse { location, .. }
            | Self::UnknownEvent { location, .. }
            | Self::DuplicateEvent { location, .. }
            | Self::DuplicateDeclaration { location, .. } => Some(*location),
            _ => None,
        }
    }

    /// Attaches the script file name to a parse error.
    pub fn in_file(self, path: impl Into<String>) -> Self {
        match self {
            Self::Parse {
                message, location, ..
            } => Self::Parse {
                message,
                location,
                file: Some(path.into()),
            },
            other => other,
        }
    }
}
