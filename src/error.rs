use std::fmt;

use serde_json::Value;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Json(serde_json::Error),
    Io(std::io::Error),
    NotAuthenticated,
    MissingCredentials(&'static str),
    /// Terminal login failure: bad HTTP status, or every attempt used up.
    Authentication(String),
    TooManyAttempts,
    RedirectDidNotHappen(String),
    LoginCredentialsInvalid,
    LoginUnexpected(String),
    ZoneNotFound(u64),
    ZoneNameNotFound(String),
    UnrecognizedKey { key: String, valid: Vec<&'static str> },
    ControlChangeRejected(Value),
    ValueUnavailable(&'static str),
    MissingField(String),
    Parse(String),
}

impl Error {
    /// Only rate limiting and a missing post-login redirect are worth another login attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TooManyAttempts | Error::RedirectDidNotHappen(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::NotAuthenticated => write!(f, "not authenticated"),
            Error::MissingCredentials(var) => {
                write!(f, "missing credentials: set the {var} environment variable")
            }
            Error::Authentication(msg) => write!(f, "authentication failed: {msg}"),
            Error::TooManyAttempts => write!(f, "portal reported too many login attempts"),
            Error::RedirectDidNotHappen(url) => {
                write!(f, "login did not redirect into the portal (landed on {url})")
            }
            Error::LoginCredentialsInvalid => write!(f, "the email or password is incorrect"),
            Error::LoginUnexpected(url) => write!(f, "portal returned an error page: {url}"),
            Error::ZoneNotFound(id) => write!(f, "zone not found: device {id}"),
            Error::ZoneNameNotFound(name) => write!(f, "no zone named {name:?}"),
            Error::UnrecognizedKey { key, valid } => {
                write!(f, "unrecognized control key {key:?} (valid: {valid:?})")
            }
            Error::ControlChangeRejected(body) => write!(f, "control change rejected: {body}"),
            Error::ValueUnavailable(what) => write!(f, "{what} is unavailable"),
            Error::MissingField(field) => write!(f, "zone record is missing {field}"),
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
