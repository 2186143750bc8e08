use bytes::Bytes;
use bytes::BytesMut;
use memchr::memchr;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;

pub const DEFAULT_MAX_LINE: usize = 4 * 1024;

#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: BytesMut,
    max_line_len: usize,
}

impl<R> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(DEFAULT_MAX_LINE),
            max_line_len: DEFAULT_MAX_LINE,
        }
    }

    pub fn max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max.max(1);
        self
    }
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Read one line, stripping trailing `\n` and optional `\r`.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` for a line (may be empty),
    /// - `Ok(None)` on EOF. A partial line left in the buffer at EOF is returned as a
    ///   final line first, since clients commonly close without a trailing newline.
    pub async fn read_line(&mut self) -> std::io::Result<Option<Bytes>> {
        loop {
            if let Some(i) = memchr(b'\n', &self.buf) {
                let raw = self.buf.split_to(i + 1).freeze();
                return Ok(Some(trim_crlf(raw)));
            }

            if self.buf.len() > self.max_line_len {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "line too long",
                ));
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = self.buf.split().freeze();
                return Ok(Some(trim_crlf(rest)));
            }
        }
    }

    /// Read one command line as text: lossy UTF-8, control bytes dropped, whitespace trimmed.
    ///
    /// Blank lines come back as `Some("")`; callers decide whether to re-prompt.
    pub async fn read_command(&mut self) -> std::io::Result<Option<String>> {
        let Some(line) = self.read_line().await? else {
            return Ok(None);
        };
        Ok(Some(clean_command(&line)))
    }
}

/// Normalize a raw line into command text.
pub fn clean_command(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    let cleaned = s
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .map(|c| if c == '\t' { ' ' } else { c })
        .collect::<String>();
    cleaned.trim().to_string()
}

fn trim_crlf(mut b: Bytes) -> Bytes {
    let mut end = b.len();
    if end > 0 && b[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && b[end - 1] == b'\r' {
        end -= 1;
    }
    b.truncate(end);
    b
}
