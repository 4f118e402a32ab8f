//! Reply decoding: classifies a raw line batch and structures its payload.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

static ACK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ACK \[([0-9]+)@([0-9]+)\] \{(\w*)\} (.*)$").expect("ACK pattern is valid")
});

static FIELD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w-]+): (.*)$").expect("field pattern is valid"));

/// A field value: a single string, or every value of a repeated key in
/// arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(value) => Some(value),
            Value::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::Scalar(_) => None,
            Value::List(values) => Some(values),
        }
    }

    /// The scalar, or the first value of a list.
    pub fn first(&self) -> &str {
        match self {
            Value::Scalar(value) => value,
            Value::List(values) => values.first().map(String::as_str).unwrap_or_default(),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice = match self {
            Value::Scalar(value) => std::slice::from_ref(value),
            Value::List(values) => values.as_slice(),
        };
        slice.iter().map(String::as_str)
    }

    fn push(&mut self, value: String) {
        match self {
            Value::Scalar(existing) => {
                let first = std::mem::take(existing);
                *self = Value::List(vec![first, value]);
            }
            Value::List(values) => values.push(value),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Scalar(value.to_owned())
    }
}

/// Field name to value, in order of first appearance.
pub type Fields = IndexMap<String, Value>;

/// How the data lines of a successful reply are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeStrategy {
    /// One map for the whole reply.
    #[default]
    Fields,
    /// A new record starts at every occurrence of `split_key`.
    Records { split_key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Fields(Fields),
    Records(Vec<Fields>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessResponse {
    payload: Payload,
    empty: bool,
}

impl SuccessResponse {
    /// True when the reply carried no data lines at all.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Flat fields; `None` for record-grouped replies.
    pub fn fields(&self) -> Option<&Fields> {
        match &self.payload {
            Payload::Fields(fields) => Some(fields),
            Payload::Records(_) => None,
        }
    }

    /// Records in arrival order; empty for flat replies.
    pub fn records(&self) -> &[Fields] {
        match &self.payload {
            Payload::Fields(_) => &[],
            Payload::Records(records) => records,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields().and_then(|fields| fields.get(key))
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.get(key).unwrap_or(default)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).map(Value::first)
    }
}

/// Error classes the daemon reports in `ACK` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    NotList,
    Arg,
    Password,
    Permission,
    Unknown,
    NoExist,
    PlaylistMax,
    System,
    PlaylistLoad,
    UpdateAlready,
    PlayerSync,
    Exist,
    Other(u32),
}

impl From<u32> for AckCode {
    fn from(code: u32) -> Self {
        match code {
            1 => AckCode::NotList,
            2 => AckCode::Arg,
            3 => AckCode::Password,
            4 => AckCode::Permission,
            5 => AckCode::Unknown,
            50 => AckCode::NoExist,
            51 => AckCode::PlaylistMax,
            52 => AckCode::System,
            53 => AckCode::PlaylistLoad,
            54 => AckCode::UpdateAlready,
            55 => AckCode::PlayerSync,
            56 => AckCode::Exist,
            other => AckCode::Other(other),
        }
    }
}

/// A command the daemon rejected. Returned, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureResponse {
    pub error_code: u32,
    pub line_number: u32,
    pub command: String,
    pub message: String,
}

impl FailureResponse {
    /// Parse an `ACK [code@line] {command} message` line. Fields the line
    /// does not provide fall back to zero or empty.
    pub fn from_ack_line(line: &str) -> Self {
        let captures = ACK_PATTERN.captures(line);
        let group = |index: usize| {
            captures
                .as_ref()
                .and_then(|c| c.get(index))
                .map(|m| m.as_str())
        };
        if captures.is_none() {
            tracing::warn!(line, "ACK line does not follow the expected grammar");
        }
        Self {
            error_code: group(1).and_then(|v| v.parse().ok()).unwrap_or(0),
            line_number: group(2).and_then(|v| v.parse().ok()).unwrap_or(0),
            command: group(3).unwrap_or_default().to_owned(),
            message: group(4).unwrap_or_default().to_owned(),
        }
    }

    pub fn code(&self) -> AckCode {
        AckCode::from(self.error_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success(SuccessResponse),
    Failure(FailureResponse),
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    pub fn success(&self) -> Option<&SuccessResponse> {
        match self {
            Response::Success(success) => Some(success),
            Response::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureResponse> {
        match self {
            Response::Success(_) => None,
            Response::Failure(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("reply ended without an OK or ACK line ({lines} lines received)")]
    MissingTerminator { lines: usize },
}

/// Turns one raw line batch into a [`Response`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDecoder;

impl ResponseDecoder {
    /// `lines` is the batch exactly as read: data lines, the sentinel, then
    /// the empty string left by the final newline.
    pub fn decode<S: AsRef<str>>(
        lines: &[S],
        strategy: DecodeStrategy,
    ) -> Result<Response, DecodeError> {
        let truncated = DecodeError::MissingTerminator { lines: lines.len() };
        if lines.len() < 2 || !lines[lines.len() - 1].as_ref().is_empty() {
            return Err(truncated);
        }

        let last = lines[lines.len() - 2].as_ref();
        if last.starts_with("ACK") {
            return Ok(Response::Failure(FailureResponse::from_ack_line(last)));
        }
        if last != "OK" {
            return Err(truncated);
        }

        let data = &lines[..lines.len() - 2];
        let payload = match strategy {
            DecodeStrategy::Fields => Payload::Fields(decode_fields(data)),
            DecodeStrategy::Records { split_key } => {
                Payload::Records(decode_records(data, split_key))
            }
        };
        Ok(Response::Success(SuccessResponse {
            payload,
            empty: data.is_empty(),
        }))
    }
}

fn parse_line(line: &str) -> Option<(&str, &str)> {
    let captures = FIELD_PATTERN.captures(line)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

fn insert(fields: &mut Fields, key: &str, value: &str) {
    match fields.get_mut(key) {
        Some(existing) => existing.push(value.to_owned()),
        None => {
            fields.insert(key.to_owned(), Value::Scalar(value.to_owned()));
        }
    }
}

fn decode_fields<S: AsRef<str>>(lines: &[S]) -> Fields {
    let mut fields = Fields::new();
    for line in lines {
        match parse_line(line.as_ref()) {
            Some((key, value)) => insert(&mut fields, key, value),
            None => tracing::trace!(line = line.as_ref(), "skipping unparsable line"),
        }
    }
    fields
}

fn decode_records<S: AsRef<str>>(lines: &[S], split_key: &str) -> Vec<Fields> {
    let mut records: Vec<Fields> = Vec::new();
    for line in lines {
        let Some((key, value)) = parse_line(line.as_ref()) else {
            tracing::trace!(line = line.as_ref(), "skipping unparsable line");
            continue;
        };
        if key == split_key {
            records.push(Fields::new());
        }
        // Lines ahead of the first split key belong to no record.
        if let Some(record) = records.last_mut() {
            insert(record, key, value);
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(lines: &[&str]) -> Response {
        ResponseDecoder::decode(lines, DecodeStrategy::Fields).unwrap()
    }

    fn songs() -> DecodeStrategy {
        DecodeStrategy::Records { split_key: "file" }
    }

    #[test]
    fn flat_fields_keep_order() {
        let response = decode(&["artist: A", "title: T", "OK", ""]);
        let success = response.success().expect("success");
        assert!(!success.is_empty());
        let fields = success.fields().unwrap();
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["artist", "title"]);
        assert_eq!(success.get("artist"), Some(&Value::from("A")));
        assert_eq!(success.get_str("title"), Some("T"));
    }

    #[test]
    fn repeated_key_becomes_list() {
        let response = decode(&["tag: x", "tag: y", "tag: z", "OK", ""]);
        let success = response.success().unwrap();
        assert_eq!(
            success.get("tag"),
            Some(&Value::List(vec!["x".into(), "y".into(), "z".into()]))
        );
        assert_eq!(success.get_str("tag"), Some("x"));
    }

    #[test]
    fn bare_ok_is_empty() {
        let response = decode(&["OK", ""]);
        let success = response.success().unwrap();
        assert!(success.is_empty());
        assert!(success.fields().unwrap().is_empty());
    }

    #[test]
    fn get_or_falls_back() {
        let response = decode(&["volume: 40", "OK", ""]);
        let success = response.success().unwrap();
        let fallback = Value::from("n/a");
        assert_eq!(success.get_or("volume", &fallback), &Value::from("40"));
        assert_eq!(success.get_or("missing", &fallback), &fallback);
    }

    #[test]
    fn ack_line_becomes_failure() {
        let response = decode(&["ACK [2@0] {play} Bad song index", ""]);
        let failure = response.failure().expect("failure");
        assert_eq!(failure.error_code, 2);
        assert_eq!(failure.line_number, 0);
        assert_eq!(failure.command, "play");
        assert_eq!(failure.message, "Bad song index");
        assert_eq!(failure.code(), AckCode::Arg);
    }

    #[test]
    fn ack_without_command_name() {
        let response = decode(&["ACK [5@0] {} unknown command \"frob\"", ""]);
        let failure = response.failure().unwrap();
        assert_eq!(failure.code(), AckCode::Unknown);
        assert_eq!(failure.command, "");
        assert_eq!(failure.message, "unknown command \"frob\"");
    }

    #[test]
    fn malformed_ack_degrades_to_defaults() {
        let response = decode(&["ACK something went wrong", ""]);
        let failure = response.failure().unwrap();
        assert_eq!(failure.error_code, 0);
        assert_eq!(failure.line_number, 0);
        assert!(failure.command.is_empty());
        assert!(failure.message.is_empty());
        assert_eq!(failure.code(), AckCode::Other(0));
    }

    #[test]
    fn unparsable_lines_are_skipped() {
        let response = decode(&["garbage", "state: pause", "OK", ""]);
        let fields = response.success().unwrap().fields().unwrap().clone();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["state"], Value::from("pause"));
    }

    #[test]
    fn value_keeps_later_colons() {
        let response = decode(&["Title: Live: Part 2", "Last-Modified: 2020-01-01T10:00:00Z", "OK", ""]);
        let success = response.success().unwrap();
        assert_eq!(success.get_str("Title"), Some("Live: Part 2"));
        assert_eq!(success.get_str("Last-Modified"), Some("2020-01-01T10:00:00Z"));
    }

    #[test]
    fn records_split_on_key() {
        let lines = [
            "file: a.mp3",
            "Title: A",
            "file: b.mp3",
            "Title: B",
            "OK",
            "",
        ];
        let response = ResponseDecoder::decode(&lines, songs()).unwrap();
        let records = response.success().unwrap().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["file"], Value::from("a.mp3"));
        assert_eq!(records[0]["Title"], Value::from("A"));
        assert_eq!(records[1]["file"], Value::from("b.mp3"));
        assert_eq!(records[1]["Title"], Value::from("B"));
    }

    #[test]
    fn records_drop_lines_before_first_split_key() {
        let lines = ["directory: music", "file: a.mp3", "Artist: X", "Artist: Y", "OK", ""];
        let response = ResponseDecoder::decode(&lines, songs()).unwrap();
        let success = response.success().unwrap();
        let records = success.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].contains_key("directory"));
        assert_eq!(
            records[0]["Artist"],
            Value::List(vec!["X".into(), "Y".into()])
        );
        assert!(success.get("file").is_none());
    }

    #[test]
    fn empty_record_reply() {
        let response = ResponseDecoder::decode(&["OK", ""], songs()).unwrap();
        let success = response.success().unwrap();
        assert!(success.is_empty());
        assert!(success.records().is_empty());
    }

    #[test]
    fn truncated_batch_is_an_error() {
        let err = ResponseDecoder::decode(&["file: a.mp3", "Tit"], DecodeStrategy::Fields)
            .unwrap_err();
        assert_eq!(err, DecodeError::MissingTerminator { lines: 2 });

        let err = ResponseDecoder::decode(&[""], DecodeStrategy::Fields).unwrap_err();
        assert_eq!(err, DecodeError::MissingTerminator { lines: 1 });
    }

    #[test]
    fn payload_serializes_untagged() {
        let response = decode(&["tag: x", "tag: y", "volume: 3", "OK", ""]);
        let json = serde_json::to_string(response.success().unwrap().payload()).unwrap();
        assert_eq!(json, r#"{"tag":["x","y"],"volume":"3"}"#);
    }

    #[test]
    fn value_iterates_all_entries() {
        let list = Value::List(vec!["a".into(), "b".into()]);
        assert_eq!(list.values().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(Value::from("x").values().collect::<Vec<_>>(), vec!["x"]);
        assert!(list.as_scalar().is_none());
        assert_eq!(list.as_list().map(<[String]>::len), Some(2));
    }
}
