/*!
 * Pipe Tests
 * Channels, endpoint closing, and line framing over real pipes
 */

use pipework::core::limits::{MAX_MESSAGE_CONTENT, MAX_MESSAGE_LEN};
use pipework::ipc::{EndpointArena, Message, MessageReader, MessageWriter, PipeChannel};
use pipework::PipeError;
use pretty_assertions::assert_eq;
use std::io::{BufReader, Read};

#[test]
fn test_reader_sees_eof_once_writer_closed() {
    let (read_end, write_end) = PipeChannel::create().unwrap().into_parts();
    let mut writer = MessageWriter::new(write_end.into_file().unwrap());
    writer.send_str("hello").unwrap();
    drop(writer);

    let mut reader = MessageReader::new(BufReader::new(read_end.into_file().unwrap()));
    assert_eq!(reader.recv().unwrap().unwrap().as_str(), "hello");
    assert!(reader.recv().unwrap().is_none());
}

#[test]
fn test_max_length_record_over_pipe() {
    let (read_end, write_end) = PipeChannel::create().unwrap().into_parts();
    let content = "x".repeat(MAX_MESSAGE_CONTENT);

    let mut writer = MessageWriter::new(write_end.into_file().unwrap());
    writer.send(&Message::new(content.clone()).unwrap()).unwrap();
    drop(writer);

    let mut raw = Vec::new();
    read_end.into_file().unwrap().read_to_end(&mut raw).unwrap();
    assert_eq!(raw.len(), MAX_MESSAGE_LEN);
    assert_eq!(raw.last(), Some(&b'\n'));
    assert_eq!(&raw[..MAX_MESSAGE_CONTENT], content.as_bytes());
}

#[test]
fn test_oversize_record_leaves_no_partial_write() {
    let (read_end, write_end) = PipeChannel::create().unwrap().into_parts();

    let mut writer = MessageWriter::new(write_end.into_file().unwrap());
    let err = writer
        .send_str(&"x".repeat(MAX_MESSAGE_CONTENT + 1))
        .unwrap_err();
    assert!(matches!(
        err,
        PipeError::OversizeMessage {
            len,
            max: MAX_MESSAGE_CONTENT
        } if len == MAX_MESSAGE_CONTENT + 1
    ));
    drop(writer);

    let mut reader = MessageReader::new(BufReader::new(read_end.into_file().unwrap()));
    assert!(reader.recv().unwrap().is_none());
}

#[test]
fn test_records_keep_order() {
    let (read_end, write_end) = PipeChannel::create().unwrap().into_parts();
    let mut writer = MessageWriter::new(write_end.into_file().unwrap());
    for word in ["one", "two", "", "four"] {
        writer.send_str(word).unwrap();
    }
    drop(writer);

    let mut reader = MessageReader::new(BufReader::new(read_end.into_file().unwrap()));
    let got: Vec<String> = reader
        .recv_all()
        .unwrap()
        .into_iter()
        .map(Message::into_string)
        .collect();
    assert_eq!(got, vec!["one", "two", "", "four"]);
}

#[test]
fn test_closing_one_endpoint_twice_keeps_siblings_usable() {
    let mut arena = EndpointArena::new();
    let first = arena.create_channel().unwrap();
    let second = arena.create_channel().unwrap();

    assert!(arena.close(first.write).unwrap());
    assert!(!arena.close(first.write).unwrap());
    assert!(!arena.close(first.write).unwrap());

    let mut writer = MessageWriter::new(std::fs::File::from(arena.take(second.write).unwrap()));
    writer.send_str("ok").unwrap();
    drop(writer);

    let mut reader = MessageReader::new(BufReader::new(std::fs::File::from(
        arena.take(second.read).unwrap(),
    )));
    assert_eq!(reader.recv().unwrap().unwrap().as_str(), "ok");

    // first.read sees EOF: its only writer is gone
    let mut reader = MessageReader::new(BufReader::new(std::fs::File::from(
        arena.take(first.read).unwrap(),
    )));
    assert!(reader.recv().unwrap().is_none());
}
