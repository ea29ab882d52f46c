//! Evaluates the host expressions the printer generates: string literals,
//! `+` concatenation, `cond ? a : b`, parentheses and zero-argument accessor
//! chains such as `icons().arrow().getLeft()` resolved from stubs.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum HostValue {
    Text(String),
    Bool(bool),
}

#[derive(Default)]
pub struct Host {
    values: HashMap<String, String>,
    flags: HashMap<String, bool>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stubs an accessor chain returning text, e.g. `foo().bar()`.
    pub fn value(mut self, chain: &str, value: &str) -> Self {
        self.values.insert(chain.to_string(), value.to_string());
        self
    }

    /// Stubs an accessor chain returning a boolean.
    pub fn flag(mut self, chain: &str, value: bool) -> Self {
        self.flags.insert(chain.to_string(), value);
        self
    }

    pub fn eval(&self, expression: &str) -> String {
        let mut parser = ExpressionParser {
            host: self,
            chars: expression.chars().collect(),
            pos: 0,
        };
        let value = parser.expression();
        parser.skip_whitespace();
        assert_eq!(
            parser.pos,
            parser.chars.len(),
            "trailing input in {}",
            expression
        );
        match value {
            HostValue::Text(text) => text,
            HostValue::Bool(b) => panic!("expression evaluated to boolean {}", b),
        }
    }
}

struct ExpressionParser<'a> {
    host: &'a Host,
    chars: Vec<char>,
    pos: usize,
}

impl ExpressionParser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) {
        self.skip_whitespace();
        assert_eq!(self.peek(), Some(expected), "at offset {}", self.pos);
        self.pos += 1;
    }

    fn expression(&mut self) -> HostValue {
        let condition = self.concatenation();
        self.skip_whitespace();
        if self.peek() != Some('?') {
            return condition;
        }
        self.pos += 1;
        let if_true = self.expression();
        self.expect(':');
        let if_false = self.expression();
        match condition {
            HostValue::Bool(true) => if_true,
            HostValue::Bool(false) => if_false,
            HostValue::Text(text) => panic!("condition evaluated to text {:?}", text),
        }
    }

    fn concatenation(&mut self) -> HostValue {
        let first = self.primary();
        self.skip_whitespace();
        if self.peek() != Some('+') {
            return first;
        }
        let mut text = as_text(first);
        while self.peek() == Some('+') {
            self.pos += 1;
            text.push_str(&as_text(self.primary()));
            self.skip_whitespace();
        }
        HostValue::Text(text)
    }

    fn primary(&mut self) -> HostValue {
        self.skip_whitespace();
        match self.peek() {
            Some('"') => HostValue::Text(self.string()),
            Some('(') => {
                self.pos += 1;
                let value = self.expression();
                self.expect(')');
                value
            }
            Some('!') => {
                self.pos += 1;
                match self.primary() {
                    HostValue::Bool(b) => HostValue::Bool(!b),
                    other => panic!("cannot negate {:?}", other),
                }
            }
            _ => self.chain(),
        }
    }

    fn string(&mut self) -> String {
        self.pos += 1;
        let mut units: Vec<u16> = Vec::new();
        loop {
            let c = self.peek().expect("unterminated string");
            self.pos += 1;
            match c {
                '"' => break,
                '\\' => {
                    let escaped = self.peek().expect("dangling escape");
                    self.pos += 1;
                    match escaped {
                        'n' => units.push('\n' as u16),
                        'r' => units.push('\r' as u16),
                        't' => units.push('\t' as u16),
                        'u' => {
                            let hex: String = self.chars[self.pos..self.pos + 4].iter().collect();
                            self.pos += 4;
                            units.push(u16::from_str_radix(&hex, 16).expect("hex escape"));
                        }
                        other => {
                            let mut buf = [0u16; 2];
                            units.extend_from_slice(other.encode_utf16(&mut buf));
                        }
                    }
                }
                other => {
                    let mut buf = [0u16; 2];
                    units.extend_from_slice(other.encode_utf16(&mut buf));
                }
            }
        }
        String::from_utf16(&units).expect("valid utf-16")
    }

    fn chain(&mut self) -> HostValue {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' || c == '$' {
                self.pos += 1;
            } else if c == '(' && self.chars.get(self.pos + 1) == Some(&')') {
                self.pos += 2;
            } else {
                break;
            }
        }
        let chain: String = self.chars[start..self.pos].iter().collect();
        assert!(!chain.is_empty(), "expected a value at offset {}", start);
        match chain.as_str() {
            "true" => return HostValue::Bool(true),
            "false" => return HostValue::Bool(false),
            _ => {}
        }
        if let Some(flag) = self.host.flags.get(&chain) {
            return HostValue::Bool(*flag);
        }
        match self.host.values.get(&chain) {
            Some(value) => HostValue::Text(value.clone()),
            None => panic!("no stub for {}", chain),
        }
    }
}

fn as_text(value: HostValue) -> String {
    match value {
        HostValue::Text(text) => text,
        HostValue::Bool(b) => b.to_string(),
    }
}
