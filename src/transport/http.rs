//! Event-stream transport over plain HTTP.
//!
//! [`HttpTransport`] issues an HTTP/1.0 `GET` so the server frames the body
//! by closing the connection instead of chunking it, then decodes the body
//! with [`SseCodec`]. Only `http://` URLs are supported.

use std::time::Duration;

use futures::{StreamExt, TryFutureExt};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tokio_util::codec::FramedRead;
use tracing::debug;

use super::{RawEvents, SseCodec, Subscription, Transport, TransportError, sse};

/// Upper bound on the size of the response head.
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Settings applied to every connection opened by [`HttpTransport`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use pagestream::transport::HttpConfig;
///
/// let config = HttpConfig::default()
///     .connect_timeout(Some(Duration::from_secs(5)))
///     .user_agent("reader/1.0");
/// assert_eq!(config, HttpConfig::default()
///     .connect_timeout(Some(Duration::from_secs(5)))
///     .user_agent("reader/1.0"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpConfig {
    connect_timeout: Option<Duration>,
    user_agent: String,
    max_line_length: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            user_agent: concat!("pagestream/", env!("CARGO_PKG_VERSION")).to_owned(),
            max_line_length: sse::DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl HttpConfig {
    /// Bound the time spent establishing the TCP connection.
    ///
    /// The stream itself has no timeout; callers cancel it when needed.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Value sent in the `User-Agent` header.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Longest accepted event-stream line, in bytes.
    #[must_use]
    pub fn max_line_length(mut self, bytes: usize) -> Self {
        self.max_line_length = bytes;
        self
    }
}

/// Transport streaming `text/event-stream` bodies over TCP.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    config: HttpConfig,
}

impl HttpTransport {
    /// Create a transport with the given settings.
    #[must_use]
    pub fn new(config: HttpConfig) -> Self { Self { config } }
}

impl Transport for HttpTransport {
    fn open(&self, url: &str) -> Subscription {
        let config = self.config.clone();
        let events = connect(url.to_owned(), config).try_flatten_stream();
        Subscription::new(url, events)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    path: String,
}

impl Target {
    fn authority(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn parse_url(url: &str) -> Result<Target, TransportError> {
    let invalid = |reason| TransportError::InvalidUrl {
        url: url.to_owned(),
        reason,
    };
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| invalid("only http:// urls are supported"))?;
    let (authority, path) = match rest.find('/') {
        Some(pos) => rest.split_at(pos),
        None => (rest, "/"),
    };
    if authority.is_empty() {
        return Err(invalid("missing host"));
    }
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (
            host,
            port.parse::<u16>().map_err(|_| invalid("invalid port"))?,
        ),
        None => (authority, 80),
    };
    Ok(Target {
        host: host.to_owned(),
        port,
        path: path.to_owned(),
    })
}

async fn connect(url: String, config: HttpConfig) -> Result<RawEvents, TransportError> {
    let target = parse_url(&url)?;
    let addr = target.authority();
    let dial = TcpStream::connect(addr.clone());
    let stream = match config.connect_timeout {
        Some(limit) => tokio::time::timeout(limit, dial)
            .await
            .map_err(|_| TransportError::ConnectTimeout { addr: addr.clone() })?,
        None => dial.await,
    }
    .map_err(|source| TransportError::Connect {
        addr: addr.clone(),
        source,
    })?;

    let mut reader = BufReader::new(stream);
    let request = format!(
        "GET {path} HTTP/1.0\r\nHost: {host}\r\nAccept: text/event-stream\r\nCache-Control: \
         no-cache\r\nUser-Agent: {agent}\r\n\r\n",
        path = target.path,
        host = target.host,
        agent = config.user_agent,
    );
    reader.get_mut().write_all(request.as_bytes()).await?;
    read_head(&mut reader).await?;
    debug!(%url, "event stream connected");

    Ok(FramedRead::new(reader, SseCodec::new(config.max_line_length)).boxed())
}

async fn read_head<R>(reader: &mut R) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut consumed = 0usize;
    let mut line = String::new();

    read_head_line(reader, &mut line, &mut consumed).await?;
    let status = parse_status_line(line.trim_end())?;
    if !(200..300).contains(&status) {
        return Err(TransportError::Status { status });
    }

    loop {
        line.clear();
        if read_head_line(reader, &mut line, &mut consumed).await? == 0 {
            return Err(TransportError::Protocol("response head truncated".into()));
        }
        let header = line.trim_end();
        if header.is_empty() {
            return Ok(());
        }
        let chunked = header.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("transfer-encoding")
                && value.trim().eq_ignore_ascii_case("chunked")
        });
        if chunked {
            return Err(TransportError::Protocol(
                "chunked transfer encoding is not supported".into(),
            ));
        }
    }
}

/// Read one line of the response head without buffering past
/// [`MAX_HEAD_BYTES`] in total.
async fn read_head_line<R>(
    reader: &mut R,
    line: &mut String,
    consumed: &mut usize,
) -> Result<usize, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let too_large = || TransportError::Protocol("response head too large".into());
    let remaining = MAX_HEAD_BYTES.saturating_sub(*consumed);
    if remaining == 0 {
        return Err(too_large());
    }
    let limit = u64::try_from(remaining).unwrap_or(u64::MAX);
    let read = (&mut *reader).take(limit).read_line(line).await?;
    *consumed += read;
    if read > 0 && !line.ends_with('\n') && *consumed >= MAX_HEAD_BYTES {
        return Err(too_large());
    }
    Ok(read)
}

fn parse_status_line(line: &str) -> Result<u16, TransportError> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code
            .parse()
            .map_err(|_| TransportError::Protocol(format!("bad status line: {line}"))),
        _ => Err(TransportError::Protocol(format!("bad status line: {line}"))),
    }
}
