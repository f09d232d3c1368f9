
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::warn;

pub const MAX_IRC_LINE_LEN: usize = 8191;

const MAX_LINE_PREVIEW_LEN: usize = 512;

#[derive(Debug)]
pub enum TransportReadError {
    Io(std::io::Error),
    LineTooLong {
        preview: String
    },
    IllegalControlChar {
        ch: char,
        preview: String,
    },
}

impl From<std::io::Error> for TransportReadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// The wire transport for one connection: plaintext TCP or a
/// `STARTTLS`/STS-upgraded TLS session over it (§4.9, §4.12). A TLS
/// upgrade is modeled by discarding a `Tcp` transport and constructing a
/// fresh `Tls` one from the same underlying socket once the handshake
/// completes; there is no in-place variant mutation.
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    Tcp {
        reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
        writer: tokio::net::tcp::OwnedWriteHalf,
    },
    Tls {
        reader: BufReader<tokio::io::ReadHalf<TlsStream<TcpStream>>>,
        writer: tokio::io::WriteHalf<TlsStream<TcpStream>>,
    },
}

impl Transport {
    pub fn tcp(stream: TcpStream) -> Self {
        if let Err(e) = Self::enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }

        let (read, write) = stream.into_split();
        Self::Tcp {
            reader: BufReader::new(read),
            writer: write,
        }
    }

    fn enable_keepalive(stream: &TcpStream) -> Result<()> {
        use std::time::Duration;
        use socket2::{SockRef, TcpKeepalive};

        let sock = SockRef::from(stream);
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(120))
            .with_interval(Duration::from_secs(30));

        sock.set_tcp_keepalive(&keepalive)?;
        Ok(())
    }

    /// Wrap an already-established client TLS session (the `STARTTLS`/STS
    /// handshake itself, including certificate validation, is an injected
    /// concern: the caller drives `tokio_rustls::TlsConnector` and hands
    /// the resulting stream here).
    pub fn tls(stream: TlsStream<TcpStream>) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self::Tls {
            reader: BufReader::new(read),
            writer: write,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls { .. })
    }

    pub async fn read_message(&mut self) -> Result<Option<String>, TransportReadError> {
        match self {
            Transport::Tcp { reader, .. } => read_line_limited(reader).await,
            Transport::Tls { reader, .. } => read_line_limited(reader).await,
        }
    }

    pub async fn write_message(&mut self, message: &str) -> Result<()> {
        match self {
            Transport::Tcp { writer, .. } => {
                writer.write_all(message.as_bytes()).await?;
                writer.flush().await?;
                Ok(())
            }
            Transport::Tls { writer, .. } => {
                writer.write_all(message.as_bytes()).await?;
                writer.flush().await?;
                Ok(())
            }
        }
    }
}

/// Read one line, silently dropping any that are over-length or carry an
/// illegal control character and moving on to the next (§4.12 "discarded
/// silently... reader continues"; §7 "malformed line: ...dropped, reader
/// continues"). Only a genuine I/O error or a clean EOF is returned to the
/// caller.
async fn read_line_limited<R>(reader: &mut BufReader<R>) -> Result<Option<String>, TransportReadError>
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_one_line_raw(reader).await {
            Ok(line) => return Ok(line),
            Err(TransportReadError::Io(e)) => return Err(TransportReadError::Io(e)),
            Err(TransportReadError::LineTooLong { preview }) => {
                warn!(preview = %preview, "dropped over-length line, reader continues");
            }
            Err(TransportReadError::IllegalControlChar { ch, preview }) => {
                warn!(?ch, preview = %preview, "dropped line with illegal control character, reader continues");
            }
        }
    }
}

async fn read_one_line_raw<R>(reader: &mut BufReader<R>) -> Result<Option<String>, TransportReadError>
where
    R: AsyncRead + Unpin,
{
    let mut line: Vec<u8> = Vec::with_capacity(512);
    let mut exceeded_limit = false;

    loop {
        let buffer = reader.fill_buf().await?;

        if buffer.is_empty() {
            if line.is_empty() && !exceeded_limit {
                return Ok(None);
            }
            break;
        }

        let newline_pos = buffer.iter().position(|&b| b == b'\n');
        let to_consume = newline_pos.map_or(buffer.len(), |idx| idx + 1);

        if !exceeded_limit {
            let projected_len = line.len().saturating_add(to_consume);
            if projected_len > MAX_IRC_LINE_LEN {
                let available = MAX_IRC_LINE_LEN.saturating_sub(line.len());
                line.extend_from_slice(&buffer[..available.min(buffer.len())]);
                exceeded_limit = true;
            } else {
                line.extend_from_slice(&buffer[..to_consume]);
            }
        }

        reader.consume(to_consume);

        if newline_pos.is_some() {
            break;
        }
    }

    if exceeded_limit {
        warn!(
            length = line.len(),
            "Message exceeds {} byte limit",
            MAX_IRC_LINE_LEN
        );

        let preview_len = line.len().min(MAX_LINE_PREVIEW_LEN);
        let preview = String::from_utf8_lossy(&line[..preview_len]).to_string();
        return Err(TransportReadError::LineTooLong { preview });
    }

    while matches!(line.last(), Some(b'\r') | Some(b'\n')) {
        line.pop();
    }

    if line.is_empty() {
        Ok(Some(String::new()))
    } else {
        let line_str = String::from_utf8_lossy(&line).to_string();

        for ch in line_str.chars() {
            if ch == '\0' || (ch.is_control() && ch != '\r' && ch != '\n' && ch != '\u{0001}') {
                let preview = line_str.chars()
                    .take(MAX_LINE_PREVIEW_LEN)
                    .collect();
                return Err(TransportReadError::IllegalControlChar { ch, preview });
            }
        }

        Ok(Some(line_str))
    }
}
