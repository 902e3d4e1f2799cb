use std::{
    io::{self, ErrorKind, Write},
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;

const SEND_RETRY_BACKOFF: Duration = Duration::from_millis(1);

pub const NOT_FOUND_BODY: &str = "404 Not Found";
pub const FEEDBACK_OK_BODY: &str = "OK";
pub const FEEDBACK_INVALID_BODY: &str = "Invalid feedback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::NotFound => 404,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(status: Status, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            status: Status::Ok,
            content_type: "text/html; charset=utf-8",
            body: body.into_bytes(),
        }
    }

    pub fn not_found() -> Self {
        Self::text(Status::NotFound, NOT_FOUND_BODY)
    }

    pub fn feedback_accepted() -> Self {
        Self::text(Status::Ok, FEEDBACK_OK_BODY)
    }

    pub fn feedback_rejected() -> Self {
        Self::text(Status::BadRequest, FEEDBACK_INVALID_BODY)
    }

    /// Status line and headers. `Content-Length` is the encoded body length.
    pub fn head(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type,
            self.body.len()
        )
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("send stalled; gave up after {bytes_sent} of {total} bytes")]
    TimedOut { bytes_sent: usize, total: usize },
    #[error("send failed after {bytes_sent} bytes: {source}")]
    Io {
        bytes_sent: usize,
        #[source]
        source: io::Error,
    },
}

/// `deadline` may be shared by every response sent in one server cycle.
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    pub chunk_bytes: usize,
    pub deadline: Instant,
}

/// Writes the head and then the body in chunks of at most `chunk_bytes`.
/// Would-block rejections are retried until `deadline`. Returns the number of
/// body bytes written, which always equals `Content-Length` on success.
pub fn send_response<W: Write>(
    writer: &mut W,
    response: &Response,
    options: SendOptions,
) -> Result<usize, SendError> {
    let chunk_bytes = options.chunk_bytes.max(1);

    write_chunked(writer, response.head().as_bytes(), chunk_bytes, options.deadline)?;
    write_chunked(writer, &response.body, chunk_bytes, options.deadline)
}

fn write_chunked<W: Write>(
    writer: &mut W,
    bytes: &[u8],
    chunk_bytes: usize,
    deadline: Instant,
) -> Result<usize, SendError> {
    let mut bytes_sent = 0;

    while bytes_sent < bytes.len() {
        let end = (bytes_sent + chunk_bytes).min(bytes.len());
        match writer.write(&bytes[bytes_sent..end]) {
            Ok(0) => {
                return Err(SendError::Io {
                    bytes_sent,
                    source: io::Error::from(ErrorKind::WriteZero),
                });
            }
            Ok(written) => bytes_sent += written,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(SendError::TimedOut {
                        bytes_sent,
                        total: bytes.len(),
                    });
                }
                thread::sleep(SEND_RETRY_BACKOFF);
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(source) => return Err(SendError::Io { bytes_sent, source }),
        }
    }

    Ok(bytes_sent)
}
