use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Anything that went wrong talking to the upstream API: connection, timeout, non-2xx
    /// status, unreadable body or undecodable JSON.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("check timeout must be a positive, finite duration")]
    InvalidTimeout,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("metrics error: {0}")]
    Metrics(String),
    #[error("unable to format metrics")]
    Format,
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Error::Transport(format!("request timed out: {}", error))
        } else {
            Error::Transport(error.to_string())
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(error: prometheus::Error) -> Self {
        Error::Metrics(error.to_string())
    }
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let error = format!(
            "<html><body><h3>500 Internal Server Error</h3><code>{}</code></body></html>",
            self
        );
        Response::build()
            .status(Status::InternalServerError)
            .sized_body(error.len(), Cursor::new(error))
            .header(ContentType::new("text", "html"))
            .ok()
    }
}
