//! Shared property grammar and OBJECT block reader
//!
//! All eight catalog grammars parse the same surface: a header, then a
//! hierarchy of `OBJECT = K … END_OBJECT = K` blocks whose bodies are
//! `keyword = value` properties. Values classify into text, integers,
//! reals, dates, lists and the explicit unknown value (`UNK`/`N/A` never
//! decode to null).

use super::dates::{self, PdsDate};
use super::lex::{Lexer, Token, TokenKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Structural parse failure with source position and token context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        Self {
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    pub fn at(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// One keyword value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Real(f64),
    Date(PdsDate),
    List(Vec<Value>),
    /// `UNK`, `N/A`, `TBD` and friends; explicit, never null
    Unknown,
}

impl Value {
    /// Classify one bareword
    fn from_word(word: &str) -> Value {
        match word {
            "UNK" | "N/A" | "NA" | "TBD" | "NULL" => return Value::Unknown,
            _ => {},
        }
        if let Ok(int) = word.parse::<i64>() {
            return Value::Integer(int);
        }
        if let Some(date) = dates::parse_date(word) {
            return Value::Date(date);
        }
        if let Ok(real) = word.parse::<f64>() {
            return Value::Real(real);
        }
        Value::Text(word.to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<PdsDate> {
        match self {
            Value::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// Flatten to the list of contained values (a scalar is a 1-list)
    pub fn iter_values(&self) -> Vec<&Value> {
        match self {
            Value::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Human-readable text content regardless of variant
    pub fn display_text(&self) -> String {
        match self {
            Value::Text(text) => text.clone(),
            Value::Integer(int) => int.to_string(),
            Value::Real(real) => real.to_string(),
            Value::Date(date) => date.to_string(),
            Value::Unknown => "UNK".to_string(),
            Value::List(items) => items
                .iter()
                .map(Value::display_text)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(text) => serializer.serialize_str(text),
            Value::Integer(int) => serializer.serialize_i64(*int),
            Value::Real(real) => serializer.serialize_f64(*real),
            Value::Date(date) => serializer.serialize_str(&date.to_string()),
            Value::Unknown => serializer.serialize_str("UNK"),
            Value::List(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json(&json))
    }
}

impl Value {
    /// Canonical JSON projection inverse: used for model round-trips
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::String(text) => match text.as_str() {
                "UNK" => Value::Unknown,
                other => {
                    if let Some(date) = dates::parse_date(other) {
                        Value::Date(date)
                    } else {
                        Value::Text(other.to_string())
                    }
                },
            },
            serde_json::Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Value::Integer(int)
                } else {
                    Value::Real(number.as_f64().unwrap_or(f64::NAN))
                }
            },
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            },
            _ => Value::Unknown,
        }
    }
}

/// One `OBJECT = K … END_OBJECT` block: its properties and sub-blocks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectBlock {
    pub name: String,
    /// Properties in keyword order; later duplicates win
    pub properties: BTreeMap<String, Value>,
    pub children: Vec<ObjectBlock>,
    /// Source line of the opening OBJECT statement
    #[serde(default, skip_serializing)]
    pub line: usize,
}

/// Equality ignores source positions so a reparse of a pretty-printed
/// block compares equal to the original
impl PartialEq for ObjectBlock {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.properties == other.properties
            && self.children == other.children
    }
}

impl ObjectBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Remove and return a property; used so leftovers land in `extra`
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// Remove a property as required text, tolerating bareword variants
    pub fn take_text(&mut self, key: &str) -> ParseResult<String> {
        match self.take(key) {
            Some(value) => Ok(value.display_text()),
            None => Err(ParseError::at(
                self.line,
                1,
                format!("missing required keyword {} in OBJECT = {}", key, self.name),
            )),
        }
    }

    /// Children with the given name
    pub fn children_named(&self, name: &str) -> Vec<&ObjectBlock> {
        self.children.iter().filter(|c| c.name == name).collect()
    }
}

/// A parsed catalog file: header properties and root-level objects
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Header keywords (`PDS_VERSION_ID`, `LABEL_REVISION_NOTE`, …)
    pub header: BTreeMap<String, Value>,
    pub objects: Vec<ObjectBlock>,
}

impl Document {
    /// Root objects with the given name
    pub fn objects_named(&self, name: &str) -> Vec<&ObjectBlock> {
        self.objects.iter().filter(|o| o.name == name).collect()
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn expect_equals(&mut self) -> ParseResult<()> {
        let token = self.bump();
        if token.kind == TokenKind::Equals {
            Ok(())
        } else {
            Err(ParseError::new(
                &token,
                format!("expected '=', found {}", token.kind),
            ))
        }
    }

    /// Parse a value after `=`. Lists may nest.
    fn parse_value(&mut self) -> ParseResult<Value> {
        let token = self.bump();
        match token.kind {
            TokenKind::Quoted(text) => Ok(Value::Text(text)),
            TokenKind::Word(word) => Ok(Value::from_word(&word)),
            TokenKind::LParen => self.parse_list(TokenKind::RParen),
            TokenKind::LBrace => self.parse_list(TokenKind::RBrace),
            ref other => Err(ParseError::new(
                &token,
                format!("expected a value, found {}", other),
            )),
        }
    }

    fn parse_list(&mut self, closer: TokenKind) -> ParseResult<Value> {
        let mut items = Vec::new();
        loop {
            let token = self.peek().clone();
            match &token.kind {
                kind if *kind == closer => {
                    self.bump();
                    return Ok(Value::List(items));
                },
                TokenKind::Comma => {
                    self.bump();
                },
                TokenKind::Eof => {
                    return Err(ParseError::new(&token, "unclosed value list"));
                },
                _ => {
                    items.push(self.parse_value()?);
                },
            }
        }
    }

    /// Parse the body of a block until END_OBJECT / END / EOF
    fn parse_body(
        &mut self,
        block_name: Option<&str>,
        open_token: Option<&Token>,
    ) -> ParseResult<(BTreeMap<String, Value>, Vec<ObjectBlock>)> {
        let mut properties = BTreeMap::new();
        let mut children = Vec::new();

        loop {
            let token = self.peek().clone();
            match &token.kind {
                TokenKind::Eof => {
                    if let (Some(name), Some(open)) = (block_name, open_token) {
                        return Err(ParseError::new(
                            open,
                            format!("unclosed OBJECT = {} block", name),
                        ));
                    }
                    return Ok((properties, children));
                },
                TokenKind::Word(word) if word == "END_OBJECT" => {
                    if block_name.is_none() {
                        return Err(ParseError::new(&token, "END_OBJECT without OBJECT"));
                    }
                    self.bump();
                    // Optional `= NAME` tail; when present it must match
                    if self.peek().kind == TokenKind::Equals {
                        self.bump();
                        let tail = self.bump();
                        if let TokenKind::Word(tail_name) = &tail.kind {
                            if let Some(name) = block_name {
                                if tail_name != name {
                                    return Err(ParseError::new(
                                        &tail,
                                        format!(
                                            "END_OBJECT = {} does not close OBJECT = {}",
                                            tail_name, name
                                        ),
                                    ));
                                }
                            }
                        }
                    }
                    return Ok((properties, children));
                },
                TokenKind::Word(word) if word == "END" => {
                    if let (Some(name), Some(open)) = (block_name, open_token) {
                        return Err(ParseError::new(
                            open,
                            format!("unclosed OBJECT = {} block", name),
                        ));
                    }
                    self.bump();
                    return Ok((properties, children));
                },
                TokenKind::Word(word) if word == "OBJECT" => {
                    children.push(self.parse_object()?);
                },
                TokenKind::Word(_) => {
                    let key_token = self.bump();
                    let TokenKind::Word(key) = key_token.kind.clone() else {
                        unreachable!()
                    };
                    self.expect_equals()?;
                    let value = self.parse_value()?;
                    properties.insert(key, value);
                },
                other => {
                    return Err(ParseError::new(
                        &token,
                        format!("expected a keyword or OBJECT, found {}", other),
                    ));
                },
            }
        }
    }

    fn parse_object(&mut self) -> ParseResult<ObjectBlock> {
        let open = self.bump(); // OBJECT
        self.expect_equals()?;
        let name_token = self.bump();
        let TokenKind::Word(name) = name_token.kind.clone() else {
            return Err(ParseError::new(
                &name_token,
                format!("expected an object name, found {}", name_token.kind),
            ));
        };

        let (properties, children) = self.parse_body(Some(&name), Some(&open))?;
        Ok(ObjectBlock {
            name,
            properties,
            children,
            line: open.line,
        })
    }
}

/// Parse a whole catalog file into header properties and root objects
pub fn parse_document(input: &str) -> ParseResult<Document> {
    let tokens = Lexer::new(input).tokenize();
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let (header, objects) = parser.parse_body(None, None)?;
    Ok(Document { header, objects })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_root_object() {
        let doc = parse_document(
            "PDS_VERSION_ID = PDS3\n\
             LABEL_REVISION_NOTE = \"V1.0\"\n\
             OBJECT = MISSION\n\
             MISSION_NAME = \"MARS GLOBAL SURVEYOR\"\n\
             END_OBJECT = MISSION\n\
             END",
        )
        .unwrap();

        assert_eq!(
            doc.header.get("PDS_VERSION_ID"),
            Some(&Value::Text("PDS3".into()))
        );
        assert_eq!(doc.objects.len(), 1);
        assert_eq!(doc.objects[0].name, "MISSION");
        assert_eq!(
            doc.objects[0].properties.get("MISSION_NAME"),
            Some(&Value::Text("MARS GLOBAL SURVEYOR".into()))
        );
    }

    #[test]
    fn test_nested_objects() {
        let doc = parse_document(
            "OBJECT = MISSION\n\
             OBJECT = MISSION_HOST\n\
             INSTRUMENT_HOST_ID = MGS\n\
             OBJECT = MISSION_TARGET\n\
             TARGET_NAME = MARS\n\
             END_OBJECT = MISSION_TARGET\n\
             END_OBJECT = MISSION_HOST\n\
             END_OBJECT = MISSION\n",
        )
        .unwrap();

        let mission = &doc.objects[0];
        let host = &mission.children[0];
        assert_eq!(host.name, "MISSION_HOST");
        assert_eq!(host.children[0].name, "MISSION_TARGET");
        assert_eq!(
            host.children[0].properties.get("TARGET_NAME"),
            Some(&Value::Text("MARS".into()))
        );
    }

    #[test]
    fn test_value_classification() {
        let doc = parse_document(
            "A = 42\n\
             B = 12.5\n\
             C = 1994-10-12\n\
             D = UNK\n\
             E = N/A\n\
             F = MGS-M-MOLA-3-PEDR-L1A-V1.0\n\
             G = (MARS, PHOBOS, SUN)\n",
        )
        .unwrap();

        assert_eq!(doc.header.get("A"), Some(&Value::Integer(42)));
        assert_eq!(doc.header.get("B"), Some(&Value::Real(12.5)));
        assert!(matches!(doc.header.get("C"), Some(Value::Date(_))));
        assert_eq!(doc.header.get("D"), Some(&Value::Unknown));
        assert_eq!(doc.header.get("E"), Some(&Value::Unknown));
        assert_eq!(
            doc.header.get("F"),
            Some(&Value::Text("MGS-M-MOLA-3-PEDR-L1A-V1.0".into()))
        );
        assert_eq!(
            doc.header.get("G"),
            Some(&Value::List(vec![
                Value::Text("MARS".into()),
                Value::Text("PHOBOS".into()),
                Value::Text("SUN".into()),
            ]))
        );
    }

    #[test]
    fn test_unclosed_object_is_an_error() {
        let err = parse_document(
            "OBJECT = MISSION\n\
             MISSION_NAME = X\n",
        )
        .unwrap_err();
        assert!(err.message.contains("unclosed OBJECT = MISSION"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_mismatched_end_object_is_an_error() {
        let err = parse_document(
            "OBJECT = MISSION\n\
             END_OBJECT = INSTRUMENT\n",
        )
        .unwrap_err();
        assert!(err.message.contains("does not close"));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_repeated_root_objects() {
        let doc = parse_document(
            "OBJECT = REFERENCE\n\
             REFERENCE_KEY_ID = ZUBERETAL1992\n\
             END_OBJECT = REFERENCE\n\
             OBJECT = REFERENCE\n\
             REFERENCE_KEY_ID = SMITHETAL1999\n\
             END_OBJECT = REFERENCE\n",
        )
        .unwrap();
        assert_eq!(doc.objects_named("REFERENCE").len(), 2);
    }

    #[test]
    fn test_value_json_roundtrip() {
        let values = vec![
            Value::Text("MOLA".into()),
            Value::Integer(3),
            Value::Real(0.25),
            Value::Date(super::super::dates::parse_date("1994-10-12").unwrap()),
            Value::Unknown,
            Value::List(vec![Value::Text("MARS".into()), Value::Integer(1)]),
        ];
        for value in values {
            let json = serde_json::to_value(&value).unwrap();
            let back: Value = serde_json::from_value(json).unwrap();
            assert_eq!(value, back);
        }
    }
}
