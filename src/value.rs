use std::fmt;

use crate::error::SimError;

#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    None,
    Int(i64),
    String(String),
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::None => Ok(()),
            Val::Int(i) => write!(f, "{}", i),
            Val::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::String(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::String(s)
    }
}

// lets `?` on runtime calls end a test with the error text
impl From<SimError> for Val {
    fn from(e: SimError) -> Self {
        Val::String(e.to_string())
    }
}
