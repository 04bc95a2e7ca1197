//! ToUnicode CMaps: codespace ranges and code-to-text mappings
//! Author: kartik4091
//! Created: 2025-06-09

use std::collections::HashMap;

/// Largest `bfrange` expanded into the lookup table
const MAX_RANGE: u32 = 0x10000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct CodespaceEntry {
    low: u32,
    high: u32,
    bytes: usize,
}

/// Parsed ToUnicode stream of one font
#[derive(Debug, Clone, Default)]
pub struct ToUnicode {
    codespace: Vec<CodespaceEntry>,
    map: HashMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(Vec<u8>),
}

impl ToUnicode {
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = Self::default();
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w == b"begincodespacerange" => {
                    i += 1;
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) = (tokens.get(i), tokens.get(i + 1)) {
                        cmap.codespace.push(CodespaceEntry {
                            low: code_value(lo),
                            high: code_value(hi),
                            bytes: lo.len().clamp(1, 4),
                        });
                        i += 2;
                    }
                }
                Token::Word(w) if w == b"beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) = (tokens.get(i), tokens.get(i + 1)) {
                        cmap.map.insert(code_value(src), utf16_text(dst));
                        i += 2;
                    }
                }
                Token::Word(w) if w == b"beginbfrange" => {
                    i += 1;
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) = (tokens.get(i), tokens.get(i + 1)) {
                        let (lo, hi) = (code_value(lo), code_value(hi));
                        i += 2;
                        match tokens.get(i) {
                            Some(Token::Hex(dst)) => {
                                cmap.map_range(lo, hi, dst);
                                i += 1;
                            }
                            Some(Token::Open) => {
                                i += 1;
                                let mut code = lo;
                                while let Some(Token::Hex(dst)) = tokens.get(i) {
                                    if code <= hi {
                                        cmap.map.insert(code, utf16_text(dst));
                                    }
                                    code = code.saturating_add(1);
                                    i += 1;
                                }
                                if tokens.get(i) == Some(&Token::Close) {
                                    i += 1;
                                }
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }
        cmap
    }

    /// `lo..=hi` onto consecutive targets; the last UTF-16 unit is incremented
    fn map_range(&mut self, lo: u32, hi: u32, dst: &[u8]) {
        let units = utf16_units(dst);
        let Some((&last, head)) = units.split_last() else {
            return;
        };
        for (offset, code) in (lo..=hi).take(MAX_RANGE as usize).enumerate() {
            let mut target = head.to_vec();
            target.push(last.wrapping_add(offset as u16));
            self.map.insert(code, String::from_utf16_lossy(&target));
        }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Splits `data` into codes using the codespace ranges, `default_bytes`
    /// wide where no range matches
    pub fn split(&self, data: &[u8], default_bytes: usize) -> Vec<(u32, usize)> {
        let default_bytes = default_bytes.clamp(1, 4);
        let mut codes = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let matched = self.codespace.iter().find_map(|entry| {
                let chunk = rest.get(..entry.bytes)?;
                let code = code_value(chunk);
                (entry.low..=entry.high).contains(&code).then_some((code, entry.bytes))
            });
            let (code, len) = matched.unwrap_or_else(|| {
                let len = default_bytes.min(rest.len());
                (code_value(&rest[..len]), len)
            });
            codes.push((code, len));
            rest = &rest[len..];
        }
        codes
    }
}

/// Big-endian value of up to four code bytes
fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => *single as u16,
            _ => 0,
        })
        .collect()
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'/' | b'%' | b'{' | b'}')
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        match b {
            _ if b.is_ascii_whitespace() => i += 1,
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => {
                tokens.push(Token::Word(b"<<".to_vec()));
                i += 2;
            }
            b'>' if data.get(i + 1) == Some(&b'>') => {
                tokens.push(Token::Word(b">>".to_vec()));
                i += 2;
            }
            b'<' => {
                let start = i + 1;
                let end = data[start..].iter().position(|c| *c == b'>').map_or(data.len(), |n| start + n);
                tokens.push(Token::Hex(hex_bytes(&data[start..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::Open);
                i += 1;
            }
            b']' => {
                tokens.push(Token::Close);
                i += 1;
            }
            b'(' => {
                // literal strings only appear in the CMap header
                let mut depth = 0usize;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            _ => {
                let start = i;
                i += 1;
                while i < data.len() && !is_delimiter(data[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(data[start..i].to_vec()));
            }
        }
    }
    tokens
}

fn hex_bytes(digits: &[u8]) -> Vec<u8> {
    let mut nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|c| (*c as char).to_digit(16).map(|d| d as u8))
        .collect();
    if nibbles.len() % 2 == 1 {
        nibbles.push(0);
    }
    nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
}
