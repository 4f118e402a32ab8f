//! Reply framing: collects raw lines until a sentinel arrives.

use std::io::{self, ErrorKind, Read};

/// Bytes requested per read. Kept small so replies are always assembled
/// across several reads.
pub const CHUNK_SIZE: usize = 8;

/// Accumulates one protocol reply from an underlying stream.
///
/// The reader owns the stream; writes go through [`LineReader::get_mut`].
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read until the buffer ends with a sentinel line and return every line,
    /// sentinel and trailing empty string included.
    ///
    /// If the stream closes first, whatever arrived is returned as-is.
    pub fn read_all(&mut self) -> io::Result<Vec<String>> {
        let mut chunk = [0u8; CHUNK_SIZE];
        let mut scan = Scan::default();
        while !scan.advance(&self.buffer) {
            let read = match self.inner.read(&mut chunk) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if read == 0 {
                tracing::debug!(
                    buffered = self.buffer.len(),
                    "stream closed before reply terminated"
                );
                break;
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }

        let raw = std::mem::take(&mut self.buffer);
        Ok(String::from_utf8_lossy(&raw)
            .split('\n')
            .map(str::to_owned)
            .collect())
    }

    /// Read a single line without its newline. Bytes past the newline stay
    /// buffered for the next call. `None` when the stream closed with
    /// nothing buffered.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                return Ok(Some(
                    String::from_utf8_lossy(&line[..line.len() - 1]).into_owned(),
                ));
            }
            let read = match self.inner.read(&mut chunk) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if read == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buffer);
                return Ok(Some(String::from_utf8_lossy(&rest).into_owned()));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}

/// Termination state over a growing buffer. Each byte is inspected once,
/// so framing stays linear in the size of the reply.
#[derive(Debug, Default)]
struct Scan {
    scanned: usize,
    line_start: usize,
    last_is_sentinel: bool,
}

impl Scan {
    /// Consume the bytes appended since the last call and report whether the
    /// buffer ends with `\n` and its last non-empty line is a sentinel.
    fn advance(&mut self, buffer: &[u8]) -> bool {
        for (offset, &byte) in buffer[self.scanned..].iter().enumerate() {
            if byte != b'\n' {
                continue;
            }
            let end = self.scanned + offset;
            let line = &buffer[self.line_start..end];
            if !line.is_empty() {
                self.last_is_sentinel = is_sentinel(&String::from_utf8_lossy(line));
            }
            self.line_start = end + 1;
        }
        self.scanned = buffer.len();
        self.last_is_sentinel && buffer.last() == Some(&b'\n')
    }
}

/// `OK`, or any line opening with `ACK`. The decoder classifies on the same
/// prefix, so every line that ends framing also decodes as a failure.
pub(crate) fn is_sentinel(line: &str) -> bool {
    line == "OK" || line.starts_with("ACK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{DecodeStrategy, ResponseDecoder};
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    /// Yields at most `step` bytes per read, whatever the caller asks for.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
        reads: usize,
    }

    impl Trickle {
        fn new(data: &[u8], step: usize) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                step,
                reads: 0,
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            let end = (self.pos + self.step.min(buf.len())).min(self.data.len());
            let n = end - self.pos;
            buf[..n].copy_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            Ok(n)
        }
    }

    #[test]
    fn reads_until_ok_across_chunks() {
        let mut reader = LineReader::new(Cursor::new(b"artist: A\ntitle: T\nOK\n".to_vec()));
        let lines = reader.read_all().unwrap();
        assert_eq!(lines, vec!["artist: A", "title: T", "OK", ""]);
    }

    #[test]
    fn stops_on_ack_line() {
        let mut reader = LineReader::new(Cursor::new(
            b"ACK [2@0] {play} Bad song index\n".to_vec(),
        ));
        let lines = reader.read_all().unwrap();
        assert_eq!(lines, vec!["ACK [2@0] {play} Bad song index", ""]);
    }

    #[test]
    fn requests_fixed_size_chunks() {
        let source = Trickle::new(b"volume: 50\nOK\n", 64);
        let mut reader = LineReader::new(source);
        reader.read_all().unwrap();
        // 14 bytes at 8 per read
        assert_eq!(reader.get_ref().reads, 2);
    }

    #[test]
    fn survives_single_byte_reads() {
        let mut reader = LineReader::new(Trickle::new(b"state: play\nOK\n", 1));
        let lines = reader.read_all().unwrap();
        assert_eq!(lines, vec!["state: play", "OK", ""]);
    }

    #[test]
    fn does_not_stop_on_ok_prefix_inside_a_line() {
        // "OK" inside a value is not a sentinel.
        let mut reader = LineReader::new(Trickle::new(b"title: OK Computer\nOK\n", 9));
        let lines = reader.read_all().unwrap();
        assert_eq!(lines, vec!["title: OK Computer", "OK", ""]);
    }

    #[test]
    fn malformed_ack_line_ends_the_reply() {
        let mut reader = LineReader::new(Trickle::new(b"ACK something went wrong\n", 8));
        let lines = reader.read_all().unwrap();
        assert_eq!(lines, vec!["ACK something went wrong", ""]);

        let response = ResponseDecoder::decode(lines.as_slice(), DecodeStrategy::Fields).unwrap();
        let failure = response.failure().unwrap();
        assert_eq!(failure.error_code, 0);
        assert_eq!(failure.message, "");
    }

    #[test]
    fn trailing_blank_lines_still_terminate() {
        let mut reader = LineReader::new(Trickle::new(b"OK\n\n", 8));
        assert_eq!(reader.read_all().unwrap(), vec!["OK", "", ""]);
    }

    #[test]
    fn large_listing_is_read_in_linear_time() {
        let mut reply = String::new();
        for n in 0..100_000 {
            reply.push_str(&format!("file: dir/song{n:05}.flac\n"));
        }
        reply.push_str("OK\n");

        let started = Instant::now();
        let mut reader = LineReader::new(Cursor::new(reply.into_bytes()));
        let lines = reader.read_all().unwrap();
        assert_eq!(lines.len(), 100_002);
        assert_eq!(lines[99_999], "file: dir/song99999.flac");
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn returns_partial_data_when_stream_closes() {
        let mut reader = LineReader::new(Cursor::new(b"file: a.mp3\nTit".to_vec()));
        let lines = reader.read_all().unwrap();
        assert_eq!(lines, vec!["file: a.mp3", "Tit"]);
    }

    #[test]
    fn empty_stream_yields_single_empty_line() {
        let mut reader = LineReader::new(Cursor::new(Vec::new()));
        assert_eq!(reader.read_all().unwrap(), vec![""]);
    }

    #[test]
    fn read_line_keeps_overflow_for_next_reply() {
        let mut reader = LineReader::new(Cursor::new(b"OK MPD 0.23.5\nvolume: 1\nOK\n".to_vec()));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("OK MPD 0.23.5"));
        assert_eq!(reader.read_all().unwrap(), vec!["volume: 1", "OK", ""]);
    }

    #[test]
    fn read_line_on_closed_stream() {
        let mut reader = LineReader::new(Cursor::new(Vec::new()));
        assert_eq!(reader.read_line().unwrap(), None);
    }
}
