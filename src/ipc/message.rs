/*!
 * Message Framing
 *
 * One UTF-8 record per line, terminated by `\n`, at most 4095 content bytes.
 * No length prefix and no binary framing.
 */

use super::pipe::{PipeError, PipeResult};
use crate::core::limits::{MAX_MESSAGE_CONTENT, MAX_MESSAGE_LEN, MESSAGE_TERMINATOR};
use std::fmt;
use std::io::{BufRead, Read, Write};

/// A single validated record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message(String);

impl Message {
    /// Validate content against the wire bound
    ///
    /// Fails with `OversizeMessage` above 4095 bytes and with
    /// `EmbeddedNewline` if the content would split into two records.
    pub fn new(content: impl Into<String>) -> PipeResult<Self> {
        let content = content.into();
        if content.len() > MAX_MESSAGE_CONTENT {
            return Err(PipeError::oversize(content.len()));
        }
        if content.as_bytes().contains(&MESSAGE_TERMINATOR) {
            return Err(PipeError::EmbeddedNewline);
        }
        Ok(Self(content))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Message {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Read one record of at most `MAX_MESSAGE_LEN` bytes
///
/// `Ok(None)` is a clean end-of-stream with no data. A final record missing
/// its terminator is still returned.
fn read_record<R: BufRead>(input: &mut R) -> PipeResult<Option<String>> {
    let mut buf = Vec::new();
    let read = input
        .by_ref()
        .take(MAX_MESSAGE_LEN as u64)
        .read_until(MESSAGE_TERMINATOR, &mut buf)?;

    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&MESSAGE_TERMINATOR) {
        buf.pop();
    } else if buf.len() >= MAX_MESSAGE_LEN {
        return Err(PipeError::oversize(buf.len()));
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| PipeError::InvalidUtf8)
}

/// Read one newline-stripped line from a local input source
///
/// Same bound as a wire record: an overlong line is an error, never split.
pub fn read_line<R: BufRead>(input: &mut R) -> PipeResult<Option<String>> {
    read_record(input)
}

/// Writes records and flushes after each one
#[derive(Debug)]
pub struct MessageWriter<W: Write> {
    inner: W,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write a record and flush it to the peer
    ///
    /// The record and terminator go out in a single `write_all`, so the
    /// peer never sees a record without its newline.
    pub fn send(&mut self, message: &Message) -> PipeResult<()> {
        let mut frame = Vec::with_capacity(message.len() + 1);
        frame.extend_from_slice(message.as_str().as_bytes());
        frame.push(MESSAGE_TERMINATOR);
        self.inner.write_all(&frame)?;
        self.inner.flush()?;
        Ok(())
    }

    /// Validate and send raw content
    pub fn send_str(&mut self, content: &str) -> PipeResult<()> {
        let message = Message::new(content)?;
        self.send(&message)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads records from a buffered source
#[derive(Debug)]
pub struct MessageReader<R: BufRead> {
    inner: R,
}

impl<R: BufRead> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Next record, or `None` once the peer has closed its end
    pub fn recv(&mut self) -> PipeResult<Option<Message>> {
        Ok(read_record(&mut self.inner)?.map(Message))
    }

    /// Drain every remaining record until end-of-stream
    pub fn recv_all(&mut self) -> PipeResult<Vec<Message>> {
        let mut messages = Vec::new();
        while let Some(message) = self.recv()? {
            messages.push(message);
        }
        Ok(messages)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_max_length_is_accepted() {
        let content = "a".repeat(MAX_MESSAGE_CONTENT);
        let message = Message::new(content.clone()).unwrap();

        let mut writer = MessageWriter::new(Vec::new());
        writer.send(&message).unwrap();
        let wire = writer.into_inner();
        assert_eq!(wire.len(), MAX_MESSAGE_LEN);

        let mut reader = MessageReader::new(Cursor::new(wire));
        assert_eq!(reader.recv().unwrap().unwrap().as_str(), content);
        assert!(reader.recv().unwrap().is_none());
    }

    #[test]
    fn test_one_over_max_is_oversize_and_nothing_written() {
        let mut writer = MessageWriter::new(Vec::new());
        let err = writer
            .send_str(&"a".repeat(MAX_MESSAGE_CONTENT + 1))
            .unwrap_err();
        assert!(err.is_oversize());
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn test_oversize_on_the_read_side() {
        let wire = "b".repeat(MAX_MESSAGE_LEN + 10);
        let mut reader = MessageReader::new(Cursor::new(wire.into_bytes()));
        assert!(matches!(
            reader.recv(),
            Err(PipeError::OversizeMessage { .. })
        ));
    }

    #[test]
    fn test_embedded_newline_rejected() {
        assert!(matches!(
            Message::new("two\nrecords"),
            Err(PipeError::EmbeddedNewline)
        ));
    }

    #[test]
    fn test_unterminated_tail_is_returned() {
        let mut reader = MessageReader::new(Cursor::new(b"first\nsecond".to_vec()));
        let all = reader.recv_all().unwrap();
        let all: Vec<&str> = all.iter().map(Message::as_str).collect();
        assert_eq!(all, vec!["first", "second"]);
    }

    #[test]
    fn test_empty_record_differs_from_eof() {
        let mut reader = MessageReader::new(Cursor::new(b"\n".to_vec()));
        assert_eq!(reader.recv().unwrap(), Some(Message::new("").unwrap()));
        assert_eq!(reader.recv().unwrap(), None);
    }

    #[test]
    fn test_read_line_strips_newline() {
        let mut input = Cursor::new(b"cse\nnext\n".to_vec());
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("cse"));
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("next"));
        assert_eq!(read_line(&mut input).unwrap(), None);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut input = Cursor::new(vec![0xff, 0xfe, b'\n']);
        assert!(matches!(read_line(&mut input), Err(PipeError::InvalidUtf8)));
    }
}
