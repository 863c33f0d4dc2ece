use std::fmt::{Display, Formatter};

#[derive(Debug, Clone)]
pub struct CustomError {
    pub msg: String,
}

impl CustomError {
    pub fn new(msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
        }
    }
}

impl Display for CustomError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for CustomError {}

/// Error response produced by the node while executing a request.
#[derive(Debug, Clone)]
pub struct NodeError {
    pub msg: String,
}

impl NodeError {
    pub fn new(msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
        }
    }
}

impl Display for NodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for NodeError {}
