use itertools::Itertools;

/// Convenience alias for results produced by the scheduling core.
pub type SepalResult<T> = std::result::Result<T, Error>;

/// An error raised somewhere in the scheduling core. Values are built
/// through the constructor methods; the variants themselves are private.
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
}

#[derive(thiserror::Error, Debug, Clone)]
enum ErrorKind {
    /// The graph violates a structural assumption of a pass. These abort
    /// the run: continuing would produce incorrect hardware.
    #[error("malformed structure: {0}")]
    MalformedStructure(String),

    /// A precondition established by an earlier pass does not hold.
    #[error("assumption of pass `{pass}` violated: {msg}")]
    PassAssumption { pass: String, msg: String },

    /// A pass option was given a value it cannot interpret.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("{0}")]
    Misc(String),

    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::MalformedStructure(msg.to_string())),
        }
    }

    pub fn pass_assumption<S1: ToString, S2: ToString>(
        pass: S1,
        msg: S2,
    ) -> Self {
        Self {
            kind: Box::new(ErrorKind::PassAssumption {
                pass: pass.to_string(),
                msg: msg.to_string(),
            }),
        }
    }

    pub fn invalid_option<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::InvalidOption(msg.to_string())),
        }
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::Misc(msg.to_string())),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: Box::new(ErrorKind::Io(err.to_string())),
        }
    }
}

/// A collection of errors produced by one pass execution. Lets a
/// diagnostic pass report every violation it found rather than the first.
pub struct MultiError {
    errors: Vec<Error>,
}

impl MultiError {
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.errors.iter().map(|e| e.to_string()).join("\n"))
    }
}

impl std::fmt::Debug for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for MultiError {}

impl From<Error> for MultiError {
    fn from(err: Error) -> Self {
        Self { errors: vec![err] }
    }
}

impl From<Vec<Error>> for MultiError {
    fn from(errors: Vec<Error>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for MultiError {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
