//! Newline framing over a raw serial byte stream

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Maximum accepted line length in bytes, not counting the `\n` or `\r\n` terminator
pub const MAX_LINE_BYTES: usize = 1024;

/// Outcome of one [`LineReader::next_line`] call
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    /// One complete line, terminator included
    Line(Vec<u8>),
    /// A line ran past the length limit; its bytes up to the next newline are dropped
    Overflow,
    /// The device closed the stream
    Eof,
}

/// Splits a byte stream into `\n`-terminated lines with a length bound.
///
/// `next_line` is cancel safe: when it is dropped mid-line (for example by a
/// read timeout) the bytes already received stay buffered and the next call
/// continues the same line.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    max_len: usize,
    discarding: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_len(inner, MAX_LINE_BYTES)
    }

    pub fn with_max_len(inner: R, max_len: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::with_capacity(128),
            max_len: max_len.max(1),
            discarding: false,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Read the next complete line
    ///
    /// # Errors
    ///
    /// Returns the underlying device error unchanged.
    pub async fn next_line(&mut self) -> io::Result<LineRead> {
        loop {
            // Room for the payload plus a CRLF terminator; buf.len() <= max_len + 1
            // here, so the limit is always at least one byte
            let limit = (self.max_len + 2 - self.buf.len()) as u64;
            let n = (&mut self.inner)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;

            if self.buf.last() == Some(&b'\n') {
                let line = std::mem::take(&mut self.buf);
                if std::mem::replace(&mut self.discarding, false) {
                    // Tail of an overlong line, already reported
                    continue;
                }
                if payload_len(&line) > self.max_len {
                    return Ok(LineRead::Overflow);
                }
                return Ok(LineRead::Line(line));
            }

            if n == 0 {
                self.buf.clear();
                return Ok(LineRead::Eof);
            }

            // One byte past the limit is still fine if it may be the `\r` of a CRLF
            let pending_cr = self.buf.len() == self.max_len + 1 && self.buf.last() == Some(&b'\r');
            if self.buf.len() > self.max_len && !pending_cr {
                self.buf.clear();
                if !self.discarding {
                    self.discarding = true;
                    return Ok(LineRead::Overflow);
                }
            }
        }
    }
}

/// Line length without its `\n` or `\r\n` terminator
fn payload_len(line: &[u8]) -> usize {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_reads_lines_in_order() {
        let mock = Builder::new().read(b"first\nsecond\r\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.next_line().await.unwrap(), LineRead::Line(b"first\n".to_vec()));
        assert_eq!(reader.next_line().await.unwrap(), LineRead::Line(b"second\r\n".to_vec()));
        assert_eq!(reader.next_line().await.unwrap(), LineRead::Eof);
    }

    #[tokio::test]
    async fn test_joins_line_split_across_reads() {
        let mock = Builder::new().read(b"7,00:0").read(b"1:23,1").read(b"20\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(
            reader.next_line().await.unwrap(),
            LineRead::Line(b"7,00:01:23,120\n".to_vec())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_line_survives_timeout() {
        let mock = Builder::new()
            .read(b"partial,")
            .wait(Duration::from_secs(5))
            .read(b"rest\n")
            .build();
        let mut reader = LineReader::new(mock);

        let first = tokio::time::timeout(Duration::from_secs(1), reader.next_line()).await;
        assert!(first.is_err(), "read should time out mid-line");

        assert_eq!(
            reader.next_line().await.unwrap(),
            LineRead::Line(b"partial,rest\n".to_vec())
        );
    }

    #[tokio::test]
    async fn test_overlong_line_is_dropped_once() {
        let mock = Builder::new()
            .read(b"0123456789ABCDEF")
            .read(b"GHIJ\nok\n")
            .build();
        let mut reader = LineReader::with_max_len(mock, 8);

        assert_eq!(reader.next_line().await.unwrap(), LineRead::Overflow);
        assert_eq!(reader.next_line().await.unwrap(), LineRead::Line(b"ok\n".to_vec()));
        assert_eq!(reader.next_line().await.unwrap(), LineRead::Eof);
    }

    #[tokio::test]
    async fn test_line_at_exact_limit_is_accepted() {
        let mock = Builder::new().read(b"12345678\n").build();
        let mut reader = LineReader::with_max_len(mock, 8);

        assert_eq!(reader.next_line().await.unwrap(), LineRead::Line(b"12345678\n".to_vec()));
    }

    #[tokio::test]
    async fn test_crlf_line_at_exact_limit_is_accepted() {
        let mock = Builder::new().read(b"12345678\r").read(b"\nnext\r\n").build();
        let mut reader = LineReader::with_max_len(mock, 8);

        assert_eq!(
            reader.next_line().await.unwrap(),
            LineRead::Line(b"12345678\r\n".to_vec())
        );
        assert_eq!(reader.next_line().await.unwrap(), LineRead::Line(b"next\r\n".to_vec()));
    }

    #[tokio::test]
    async fn test_full_size_crlf_frame_is_accepted() {
        let mut line = vec![b'x'; MAX_LINE_BYTES];
        line.extend_from_slice(b"\r\n");
        let mock = Builder::new().read(&line).build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.next_line().await.unwrap(), LineRead::Line(line.clone()));
        assert_eq!(reader.next_line().await.unwrap(), LineRead::Eof);
    }

    #[tokio::test]
    async fn test_one_byte_over_limit_is_overflow() {
        let mock = Builder::new().read(b"123456789\nok\n").build();
        let mut reader = LineReader::with_max_len(mock, 8);

        assert_eq!(reader.next_line().await.unwrap(), LineRead::Overflow);
        assert_eq!(reader.next_line().await.unwrap(), LineRead::Line(b"ok\n".to_vec()));
    }

    #[tokio::test]
    async fn test_cr_past_limit_without_newline_is_overflow() {
        let mock = Builder::new().read(b"12345678\rX\nok\n").build();
        let mut reader = LineReader::with_max_len(mock, 8);

        assert_eq!(reader.next_line().await.unwrap(), LineRead::Overflow);
        assert_eq!(reader.next_line().await.unwrap(), LineRead::Line(b"ok\n".to_vec()));
    }

    #[tokio::test]
    async fn test_propagates_device_error() {
        let mock = Builder::new()
            .read(b"good\n")
            .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
            .build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.next_line().await.unwrap(), LineRead::Line(b"good\n".to_vec()));
        let err = reader.next_line().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
