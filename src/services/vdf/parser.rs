//! Minimal order-preserving KeyValues (VDF) reader.
//!
//! Keeps duplicate sibling keys and their order, which map-based readers lose.
//! String contents are kept verbatim, escape sequences included, so a value
//! can be written back byte-for-byte.

use crate::types::errors::CodecError;
use std::iter::Peekable;
use std::str::Chars;

/// A parsed VDF value: either a string or a nested block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VdfValue {
    Str(String),
    Block(VdfDocument),
}

/// Ordered key/value entries. Keys may repeat and may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VdfDocument {
    pub entries: Vec<(String, VdfValue)>,
}

impl VdfDocument {
    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Every value stored under `key`, in document order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a VdfValue> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Str(String),
    Open,
    Close,
    Eof,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> CodecError {
        CodecError::Parse {
            file: String::new(),
            line: self.line,
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_line(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn next_token(&mut self) -> Result<(Token, usize), CodecError> {
        loop {
            let Some(&c) = self.chars.peek() else {
                return Ok((Token::Eof, self.line));
            };
            match c {
                c if c.is_whitespace() || c == '\u{feff}' => {
                    self.bump();
                }
                '/' => {
                    self.bump();
                    if self.chars.peek() == Some(&'/') {
                        self.skip_line();
                    } else {
                        let line = self.line;
                        let mut bare = String::from('/');
                        self.read_bare(&mut bare);
                        return Ok((Token::Str(bare), line));
                    }
                }
                '{' => {
                    self.bump();
                    return Ok((Token::Open, self.line));
                }
                '}' => {
                    self.bump();
                    return Ok((Token::Close, self.line));
                }
                '[' => {
                    // Platform conditional such as [$X360]; not meaningful to the editor.
                    let line = self.line;
                    while let Some(c) = self.bump() {
                        if c == ']' {
                            break;
                        }
                        if c == '\n' {
                            return Err(CodecError::Parse {
                                file: String::new(),
                                line,
                                message: "unterminated conditional".to_string(),
                            });
                        }
                    }
                    log::debug!("Skipped VDF conditional on line {line}");
                }
                '"' => {
                    let line = self.line;
                    self.bump();
                    return self.read_quoted().map(|s| (Token::Str(s), line));
                }
                _ => {
                    let line = self.line;
                    let mut bare = String::new();
                    self.read_bare(&mut bare);
                    return Ok((Token::Str(bare), line));
                }
            }
        }
    }

    fn read_quoted(&mut self) -> Result<String, CodecError> {
        let start = self.line;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(CodecError::Parse {
                        file: String::new(),
                        line: start,
                        message: "unterminated string".to_string(),
                    })
                }
                Some('"') => return Ok(out),
                Some('\\') => {
                    out.push('\\');
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn read_bare(&mut self, out: &mut String) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || matches!(c, '"' | '{' | '}') {
                break;
            }
            out.push(c);
            self.bump();
        }
    }
}

/// Parse VDF text into an ordered document.
///
/// Errors carry a 1-based line number; the caller attaches the file name.
pub fn parse(text: &str) -> Result<VdfDocument, CodecError> {
    let mut lexer = Lexer::new(text);
    parse_entries(&mut lexer, None)
}

fn parse_entries(lexer: &mut Lexer<'_>, opened_at: Option<usize>) -> Result<VdfDocument, CodecError> {
    let mut doc = VdfDocument::default();
    loop {
        let (token, line) = lexer.next_token()?;
        let key = match token {
            Token::Str(key) => key,
            Token::Eof => {
                return match opened_at {
                    Some(open_line) => Err(lexer.error(format!(
                        "missing closing brace for block opened on line {open_line}"
                    ))),
                    None => Ok(doc),
                };
            }
            Token::Close => {
                return match opened_at {
                    Some(_) => Ok(doc),
                    None => Err(CodecError::Parse {
                        file: String::new(),
                        line,
                        message: "unexpected '}'".to_string(),
                    }),
                };
            }
            Token::Open => {
                return Err(CodecError::Parse {
                    file: String::new(),
                    line,
                    message: "expected a key, found '{'".to_string(),
                })
            }
        };

        let (value_token, value_line) = lexer.next_token()?;
        let value = match value_token {
            Token::Str(s) => VdfValue::Str(s),
            Token::Open => VdfValue::Block(parse_entries(lexer, Some(value_line))?),
            Token::Close | Token::Eof => {
                return Err(CodecError::Parse {
                    file: String::new(),
                    line,
                    message: format!("key \"{key}\" has no value"),
                })
            }
        };
        doc.entries.push((key, value));
    }
}
