use thiserror::Error;

pub type TwigitResult<T> = std::result::Result<T, TwigitError>;

/// Input constructs the transform refuses to process.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Construct {
    /// A call to an output-buffering function such as `ob_start()`.
    OutputBuffering { function: String },
    /// A switch case that does not end in `break` and is not the last case.
    SwitchFallthrough { case_index: usize },
    /// `print` used as a value inside another expression.
    PrintAsValue,
    /// A `break` that leaves an output-producing loop before its body ends.
    EarlyLoopExit,
    /// A `break` that leaves an output-producing switch case before the
    /// case's final statement.
    EarlySwitchExit { case_index: usize },
}

impl std::fmt::Display for Construct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutputBuffering { function } => {
                write!(f, "output buffering call {}()", function)
            }
            Self::SwitchFallthrough { case_index } => {
                write!(f, "switch case #{} falls through", case_index.saturating_add(1))
            }
            Self::PrintAsValue => write!(f, "print used as a value"),
            Self::EarlyLoopExit => write!(f, "break inside an output-producing loop"),
            Self::EarlySwitchExit { case_index } => write!(
                f,
                "break before the end of output-producing switch case #{}",
                case_index.saturating_add(1)
            ),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum TwigitError {
    /// The input uses a construct whose output boundaries cannot be known
    /// statically.
    #[error("Cannot process this program: unsupported construct ({construct})")]
    UnsupportedConstruct { construct: Construct },
    /// The engine's own stacks are inconsistent. This is a bug in the engine,
    /// not in the input.
    #[error("Internal invariant violated: {message}")]
    InvariantViolation { message: String },
}

impl TwigitError {
    pub(crate) fn unsupported(construct: Construct) -> Self {
        Self::UnsupportedConstruct { construct }
    }

    pub(crate) fn invariant<T: Into<String>>(message: T) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }
}
