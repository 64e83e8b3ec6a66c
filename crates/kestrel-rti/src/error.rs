//! Runtime error taxonomy.
//!
//! Errors raised by the runtime itself (`RuntimeError`), malformed type
//! recipes (`DecodeError`), classified host failures (`HostError`) and the
//! `(error, stack trace)` pair that flows through futures, zones and
//! streams (`Thrown`).

use crate::value::Value;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

// =============================================================================
// RuntimeError
// =============================================================================

/// An error raised by a runtime check or operation.
///
/// Every variant corresponds to a core error class (see
/// [`class_name`](Self::class_name)) so it can be caught by catch clauses
/// written against the runtime's error hierarchy.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{value}: type '{actual}' is not a subtype of type '{expected}'")]
    Type {
        value: String,
        actual: String,
        expected: String,
    },

    #[error("Null check operator used on a null value")]
    NullCheck,

    #[error("RangeError: {message}")]
    Range { message: String },

    #[error("Invalid argument(s): {message}")]
    Argument { message: String },

    #[error("Bad state: {message}")]
    State { message: String },

    #[error("NoSuchMethodError: method not found: '{member}' on {receiver}")]
    NoSuchMethod { receiver: String, member: String },

    #[error("Stack Overflow")]
    StackOverflow,

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Host(HostError),
}

impl RuntimeError {
    pub fn range(message: impl Into<String>) -> Self {
        RuntimeError::Range {
            message: message.into(),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        RuntimeError::Argument {
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        RuntimeError::State {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        RuntimeError::Unsupported {
            message: message.into(),
        }
    }

    pub fn no_such_method(receiver: impl Into<String>, member: impl Into<String>) -> Self {
        RuntimeError::NoSuchMethod {
            receiver: receiver.into(),
            member: member.into(),
        }
    }

    /// Index check failure in the runtime's wording.
    pub fn index_out_of_range(index: i64, length: usize) -> Self {
        RuntimeError::range(format!(
            "Index out of range: index should be less than {length}: {index}"
        ))
    }

    /// The core error class this error is an instance of.
    pub fn class_name(&self) -> &'static str {
        match self {
            RuntimeError::Type { .. } | RuntimeError::NullCheck => "TypeError",
            RuntimeError::Range { .. } => "RangeError",
            RuntimeError::Argument { .. } => "ArgumentError",
            RuntimeError::State { .. } => "StateError",
            RuntimeError::NoSuchMethod { .. } => "NoSuchMethodError",
            RuntimeError::StackOverflow => "StackOverflowError",
            RuntimeError::Unsupported { .. } => "UnsupportedError",
            RuntimeError::Decode(_) => "Error",
            RuntimeError::Host(host) => host.kind.class_name(),
        }
    }
}

// =============================================================================
// Host errors
// =============================================================================

/// Classification of a failure raised by the host environment.
///
/// The embedder classifies host failures when it catches them; the runtime
/// never inspects message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostErrorKind {
    /// A member was read from or invoked on a null reference.
    NullReference,
    /// A non-callable value was invoked.
    NotAFunction,
    /// The host ran out of stack.
    StackOverflow,
    /// A numeric argument was outside its valid range.
    Range,
    /// Any other host type error.
    Type,
    /// Unclassified host failure.
    Other,
}

impl HostErrorKind {
    fn class_name(self) -> &'static str {
        match self {
            HostErrorKind::NullReference | HostErrorKind::NotAFunction => "NoSuchMethodError",
            HostErrorKind::StackOverflow => "StackOverflowError",
            HostErrorKind::Range => "RangeError",
            HostErrorKind::Type => "TypeError",
            HostErrorKind::Other => "Error",
        }
    }
}

/// A structured host failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HostError {
    pub kind: HostErrorKind,
    pub message: String,
    /// Member being accessed, when the host reported one.
    pub member: Option<String>,
}

impl HostError {
    pub fn new(kind: HostErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            member: None,
        }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }
}

impl From<HostError> for RuntimeError {
    fn from(err: HostError) -> Self {
        match err.kind {
            HostErrorKind::NullReference => {
                RuntimeError::no_such_method("null", err.member.unwrap_or_default())
            }
            HostErrorKind::NotAFunction => {
                RuntimeError::no_such_method("a host object", err.member.unwrap_or_default())
            }
            HostErrorKind::StackOverflow => RuntimeError::StackOverflow,
            HostErrorKind::Range => RuntimeError::Range {
                message: err.message,
            },
            HostErrorKind::Type | HostErrorKind::Other => RuntimeError::Host(err),
        }
    }
}

// =============================================================================
// DecodeError
// =============================================================================

/// What went wrong while decoding a type recipe.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    #[error("bad character '{0}'")]
    BadCharacter(char),

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("unbalanced '{0}'")]
    Unbalanced(char),

    #[error("unexpected extended operation {0}")]
    ExtendedOperation(u32),

    #[error("unexpected state under `()`")]
    UnexpectedParameterState,

    #[error("bad index {index} for {environment}")]
    BadIndex { index: u32, environment: String },

    #[error("indexed base must be an interface type, found {0}")]
    IndexedBase(String),

    #[error("index {0} used without an environment")]
    NoEnvironment(u32),

    #[error("expected a type operand")]
    NotAType,

    #[error("recipe left {0} operands on the stack")]
    TrailingOperands(usize),

    #[error("empty recipe")]
    Empty,
}

/// A malformed recipe.
///
/// Recipes are produced by a trusted encoder, so callers treat this as an
/// internal consistency failure rather than bad input.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} at position {position} in recipe \"{recipe}\"")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub position: usize,
    pub recipe: String,
}

// =============================================================================
// Stack traces and thrown values
// =============================================================================

/// A captured stack trace. Empty when capture is disabled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackTrace(Option<Rc<str>>);

impl StackTrace {
    pub fn empty() -> Self {
        StackTrace(None)
    }

    pub fn new(text: impl Into<Rc<str>>) -> Self {
        StackTrace(Some(text.into()))
    }

    /// Capture the current Rust backtrace (honours `RUST_BACKTRACE`).
    pub fn capture() -> Self {
        let backtrace = Backtrace::capture();
        match backtrace.status() {
            BacktraceStatus::Captured => StackTrace::new(backtrace.to_string()),
            _ => StackTrace::empty(),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A thrown value together with the stack trace at the throw point.
#[derive(Clone, Debug)]
pub struct Thrown {
    pub value: Value,
    pub stack: StackTrace,
}

impl Thrown {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            stack: StackTrace::capture(),
        }
    }

    pub fn with_stack(value: Value, stack: StackTrace) -> Self {
        Self { value, stack }
    }

    /// The runtime error carried by this throw, if it is one.
    pub fn runtime_error(&self) -> Option<&RuntimeError> {
        match &self.value {
            Value::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RuntimeError> for Thrown {
    fn from(err: RuntimeError) -> Self {
        Thrown::new(Value::Error(Rc::new(err)))
    }
}

impl From<HostError> for Thrown {
    fn from(err: HostError) -> Self {
        Thrown::from(RuntimeError::from(err))
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
