use std::fmt;

#[derive(Debug)]
pub enum VsmError {
    Io(String),
    Parse(String),
    Runtime(String),
}

impl VsmError {
    pub fn io(msg: impl Into<String>) -> Self {
        VsmError::Io(msg.into())
    }
    pub fn parse(msg: impl Into<String>) -> Self {
        VsmError::Parse(msg.into())
    }
    pub fn runtime(msg: impl Into<String>) -> Self {
        VsmError::Runtime(msg.into())
    }
}

impl fmt::Display for VsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VsmError::Io(s) => write!(f, "IO error: {s}"),
            VsmError::Parse(s) => write!(f, "Parse error: {s}"),
            VsmError::Runtime(s) => write!(f, "Runtime error: {s}"),
        }
    }
}

impl std::error::Error for VsmError {}

impl From<std::io::Error> for VsmError {
    fn from(e: std::io::Error) -> Self {
        VsmError::Io(e.to_string())
    }
}
