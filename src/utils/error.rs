use std::fmt;
use thiserror::Error;

/// Raised while a component or domain definition is being built. Always fatal
/// to loading that definition; a failed definition is never instantiable.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("component \"{component}\" declares construction-time state; components are stateless, model configuration as a need port instead")]
    HasConstructor { component: String },

    #[error("provider \"{provide}\" on \"{component}\" declares need \"{need}\" which is not in the needs set")]
    UndeclaredNeedAccess {
        component: String,
        provide: String,
        need: String,
    },

    #[error("need \"{need}\" on \"{component}\" is not used by any provider")]
    UnusedNeedDeclaration { component: String, need: String },

    #[error("\"{name}\" does not have the required format for port names")]
    InvalidPortName { name: String },

    #[error("\"{name}\" is a reserved word and cannot be used as a port name")]
    ReservedPortName { name: String },

    #[error("port \"{name}\" is already defined")]
    DuplicatePort { name: String },

    #[error("\"{name}\" listed in the provides selection of domain \"{domain}\" is not provided by any child component")]
    UnknownProvideSelection { domain: String, name: String },

    #[error("provide \"{name}\" selected by domain \"{domain}\" is offered by more than one child: {}", candidates.join(", "))]
    AmbiguousProvideSelection {
        domain: String,
        name: String,
        candidates: Vec<String>,
    },

    #[error("children of domain \"{domain}\" declare need \"{need}\" with conflicting signatures: {}", consumers.join(", "))]
    ConflictingNeedSignatures {
        domain: String,
        need: String,
        consumers: Vec<String>,
    },

    #[error("provides selection pattern \"{pattern}\" is not a valid regex: {reason}")]
    InvalidSelectionPattern { pattern: String, reason: String },

    #[error("adapter \"{component}\" maps need \"{name}\" to an identically named provide; adapters must rename")]
    AdapterPassThrough { component: String, name: String },
}

/// Raised when binding a need on an instance.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("\"{port}\" is not a declared port on \"{component}\"")]
    PortNotDeclared { component: String, port: String },

    #[error("need \"{port}\" on \"{component}\" already has a provider; disconnect it before rebinding")]
    AlreadyBound { component: String, port: String },
}

/// Raised when invoking a port at call time. `DisconnectedPort` is the only
/// error deliberately deferred to call time: a declared need may legitimately
/// stay unbound along code paths not exercised under partial wiring.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("\"{port}\" is not a declared port on \"{component}\"")]
    PortNotDeclared { component: String, port: String },

    #[error("port \"{port}\" on \"{component}\" has not been connected")]
    DisconnectedPort { component: String, port: String },

    #[error("provider \"{provide}\" on \"{component}\" called need \"{need}\" without declaring it as used")]
    UndeclaredNeedCall {
        component: String,
        provide: String,
        need: String,
    },

    #[error("arguments for \"{port}\" on \"{component}\" do not match its signature: {reason}")]
    SignatureMismatch {
        component: String,
        port: String,
        reason: String,
    },

    /// A failure raised by the bound provider itself, passed through
    /// unmodified.
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

/// One ambiguity finding from a wiring pass: a still-unbound need matched by
/// more than one provide.
#[derive(Debug, Clone)]
pub struct Ambiguity {
    pub port: String,
    pub consumer: String,
    pub candidates: Vec<String>,
}

/// One unresolved finding from a strict wiring pass: a need left unmatched.
#[derive(Debug, Clone)]
pub struct Unresolved {
    pub port: String,
    pub component: String,
}

/// Aggregated report from one wiring pass. The engine completes the full pass
/// before failing so every ambiguity and unresolved need shows up in a single
/// report.
#[derive(Debug, Default)]
pub struct WiringError {
    pub ambiguities: Vec<Ambiguity>,
    pub unresolved: Vec<Unresolved>,
}

impl WiringError {
    pub fn is_empty(&self) -> bool {
        self.ambiguities.is_empty() && self.unresolved.is_empty()
    }
}

impl fmt::Display for WiringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wiring failed with {} ambiguous and {} unresolved port(s)",
            self.ambiguities.len(),
            self.unresolved.len()
        )?;
        for a in &self.ambiguities {
            write!(
                f,
                "\n  ambiguous: need \"{}\" on \"{}\" matched by multiple providers: {}",
                a.port,
                a.consumer,
                a.candidates.join(", ")
            )?;
        }
        for u in &self.unresolved {
            write!(
                f,
                "\n  unresolved: need \"{}\" on \"{}\" has no provider",
                u.port, u.component
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for WiringError {}

#[derive(Error, Debug)]
pub enum PortwireError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Wiring(#[from] WiringError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Definition,
    Connection,
    Call,
    Wiring,
}

impl PortwireError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PortwireError::Definition(_) => ErrorCategory::Definition,
            PortwireError::Connection(_) => ErrorCategory::Connection,
            PortwireError::Call(_) => ErrorCategory::Call,
            PortwireError::Wiring(_) => ErrorCategory::Wiring,
        }
    }

    /// Definition and wiring errors should abort application startup;
    /// call-time errors abort only the operation that triggered them.
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Definition | ErrorCategory::Wiring
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PortwireError::Definition(_) => {
                "Fix the component definition; definitions are validated once at load time"
            }
            PortwireError::Connection(_) => {
                "Check the port name against get_needs() and disconnect before rebinding"
            }
            PortwireError::Call(CallError::DisconnectedPort { .. }) => {
                "Connect the port or run auto_wire in strict mode to catch this at assembly"
            }
            PortwireError::Call(_) => "Check the call against the port's declared signature",
            PortwireError::Wiring(_) => {
                "Fix every listed ambiguity and unresolved need; the report covers the whole pass"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PortwireError>;
