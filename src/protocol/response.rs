//! Response line formatting

use std::fmt;

use crate::protocol::Rejection;

/// One response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    /// Raw reason token; unknown tokens from a newer server are kept verbatim
    Error(String),
}

impl Response {
    /// Bytes written to the client, newline terminated
    pub fn to_wire(&self) -> Vec<u8> {
        format!("{}\n", self).into_bytes()
    }

    /// Parse a response line read from the server
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line == "OK" {
            return Some(Response::Ok);
        }
        line.strip_prefix("ERROR ")
            .map(|reason| Response::Error(reason.trim().to_string()))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok)
    }

    /// The typed rejection, when the reason is one this build knows
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Response::Ok => None,
            Response::Error(reason) => Rejection::from_reason(reason),
        }
    }
}

impl From<Rejection> for Response {
    fn from(rejection: Rejection) -> Self {
        Response::Error(rejection.to_string())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => f.write_str("OK"),
            Response::Error(reason) => write!(f, "ERROR {}", reason),
        }
    }
}
