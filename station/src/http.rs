use std::borrow::Cow;

pub const DEFAULT_PATH: &str = "/";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Request line and body extracted from the first chunk read off a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    pub method: String,
    pub path: String,
    pub body: &'a [u8],
}

impl<'a> Request<'a> {
    /// Never fails: missing structure degrades to an empty method and the
    /// default path.
    pub fn parse(raw: &'a [u8]) -> Self {
        let line_end = raw.iter().position(|&byte| byte == b'\n');
        let first_line = match line_end {
            Some(end) => &raw[..end],
            None => raw,
        };
        let first_line = first_line.strip_suffix(b"\r").unwrap_or(first_line);
        let line: Cow<'_, str> = String::from_utf8_lossy(first_line);

        let mut tokens = line.split(' ').filter(|token| !token.is_empty());
        let method = tokens.next().unwrap_or_default().to_string();
        let path = tokens.next().unwrap_or(DEFAULT_PATH).to_string();

        let body = match find(raw, HEADER_TERMINATOR) {
            Some(start) => &raw[start + HEADER_TERMINATOR.len()..],
            None => match line_end {
                Some(end) => &raw[end + 1..],
                None => &[],
            },
        };

        Self { method, path, body }
    }

    pub fn route(&self) -> Route {
        let path = self.path.split('?').next().unwrap_or(DEFAULT_PATH);
        match path {
            "/favicon.ico" => Route::NotFound,
            "/feedback" if self.method.eq_ignore_ascii_case("POST") => Route::Feedback,
            _ => Route::Dashboard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    NotFound,
    Feedback,
    Dashboard,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_standard_request_lines() {
        for (raw, method, path) in [
            ("GET / HTTP/1.1\r\nHost: station\r\n\r\n", "GET", "/"),
            ("GET /favicon.ico HTTP/1.1\r\n\r\n", "GET", "/favicon.ico"),
            ("POST /feedback HTTP/1.1\r\n\r\n{}", "POST", "/feedback"),
            ("DELETE /history?all=1 HTTP/1.0\n\n", "DELETE", "/history?all=1"),
        ] {
            let request = Request::parse(raw.as_bytes());
            assert_eq!(request.method, method);
            assert_eq!(request.path, path);
        }
    }

    #[test]
    fn missing_path_defaults_to_root() {
        for raw in [&b""[..], b"GET", b"GET\r\n\r\n", b"   ", b"\r\n"] {
            assert_eq!(Request::parse(raw).path, DEFAULT_PATH);
        }
    }

    #[test]
    fn truncated_request_line_keeps_partial_path() {
        let request = Request::parse(b"GET /fav");
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/fav");
        assert!(request.body.is_empty());
    }

    #[test]
    fn binary_garbage_does_not_panic() {
        let raw = [0xff, 0xfe, 0x00, b' ', 0xc3, 0x28, b'\n', 0x80];
        let request = Request::parse(&raw);
        assert_eq!(request.body, &[0x80]);
        assert_eq!(request.route(), Route::Dashboard);
    }

    #[test]
    fn body_follows_blank_line() {
        let raw = b"POST /feedback HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"rating\":0.5}";
        let request = Request::parse(raw);
        assert_eq!(request.body, b"{\"rating\":0.5}");
    }

    #[test]
    fn body_without_headers_follows_first_line() {
        let request = Request::parse(b"POST /feedback HTTP/1.1\n{\"rating\":1}");
        assert_eq!(request.body, b"{\"rating\":1}");
    }

    #[test]
    fn routes_by_path_and_method() {
        let route = |raw: &str| Request::parse(raw.as_bytes()).route();

        assert_eq!(route("GET /favicon.ico HTTP/1.1\r\n"), Route::NotFound);
        assert_eq!(route("POST /feedback HTTP/1.1\r\n"), Route::Feedback);
        assert_eq!(route("post /feedback?src=form HTTP/1.1\r\n"), Route::Feedback);
        assert_eq!(route("GET /feedback HTTP/1.1\r\n"), Route::Dashboard);
        assert_eq!(route("GET / HTTP/1.1\r\n"), Route::Dashboard);
        assert_eq!(route("GET /anything/else HTTP/1.1\r\n"), Route::Dashboard);
        assert_eq!(route(""), Route::Dashboard);
    }
}
