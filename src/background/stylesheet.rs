//! Minimal CSS stylesheet model for editing one rule of a theme file
//!
//! The stylesheet is split into top-level items. Only style rules are
//! interpreted (selector plus declaration block); comments, whitespace and
//! at-rules are carried as raw text so that everything not being edited is
//! written back exactly as it was read.

use std::fmt;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::error::BackgroundError;
use super::options::LoginSizing;
use super::selection::ImageSelection;

lazy_static! {
    static ref RGB_COLOR: Regex =
        Regex::new(r"rgb\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)").expect("valid regex");
}

/// How a stylesheet is written back to text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Rewrite opaque `rgb(r, g, b)` colors as `#rrggbb`
    pub rgb_as_hex: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    selector: String,
    body: String,
    raw: String,
}

impl StyleRule {
    /// Selector text, trimmed
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Declarations between the braces, trimmed
    pub fn body(&self) -> &str {
        self.body.trim()
    }

    /// The rule exactly as it appears in the file
    pub fn text(&self) -> &str {
        &self.raw
    }

    fn replace_body(&mut self, declarations: &str) {
        self.body = declarations.to_string();
        self.raw = format!("{} {{{}}}", self.selector, declarations);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// Whitespace and comments between rules
    Trivia(String),
    AtRule(String),
    Style(StyleRule),
}

/// Outcome of rewriting one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// The new rule as written
    pub rule: String,
    /// The whole stylesheet after the edit
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    items: Vec<Item>,
}

impl Stylesheet {
    pub fn parse(source: &str) -> Result<Self, BackgroundError> {
        Parser::new(source).parse()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn rules(&self) -> impl Iterator<Item = &StyleRule> {
        self.items.iter().filter_map(|item| match item {
            Item::Style(rule) => Some(rule),
            _ => None,
        })
    }

    /// First top-level rule whose selector starts with `prefix`
    pub fn find_rule(&self, prefix: &str) -> Option<&StyleRule> {
        self.rules().find(|rule| rule.selector.starts_with(prefix))
    }

    /// Replace the declarations of the first rule matching `prefix`.
    pub fn replace_rule(
        &mut self,
        prefix: &str,
        declarations: &str,
    ) -> Result<&StyleRule, BackgroundError> {
        let rule = self
            .items
            .iter_mut()
            .find_map(|item| match item {
                Item::Style(rule) if rule.selector.starts_with(prefix) => Some(rule),
                _ => None,
            })
            .ok_or_else(|| BackgroundError::RuleNotFound(prefix.to_string()))?;

        rule.replace_body(declarations);
        Ok(rule)
    }

    /// Replace the first rule matching `prefix` and serialize the result.
    pub fn rewrite(
        &mut self,
        prefix: &str,
        declarations: &str,
        options: SerializeOptions,
    ) -> Result<Rewrite, BackgroundError> {
        let rule = self.replace_rule(prefix, declarations)?.text().to_string();
        Ok(Rewrite {
            rule,
            text: self.to_text(options),
        })
    }

    pub fn to_text(&self, options: SerializeOptions) -> String {
        let mut out = String::new();
        for item in &self.items {
            match item {
                Item::Trivia(text) => out.push_str(text),
                Item::AtRule(text) => out.push_str(&render(text, options)),
                Item::Style(rule) => out.push_str(&render(&rule.raw, options)),
            }
        }
        out
    }
}

impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text(SerializeOptions::default()))
    }
}

fn render(text: &str, options: SerializeOptions) -> String {
    if options.rgb_as_hex {
        rgb_to_hex(text)
    } else {
        text.to_string()
    }
}

/// Rewrite `rgb(r, g, b)` with in-range components as `#rrggbb`
pub fn rgb_to_hex(text: &str) -> String {
    RGB_COLOR
        .replace_all(text, |caps: &Captures| {
            let channels: Option<Vec<u8>> =
                (1..=3).map(|i| caps[i].parse::<u8>().ok()).collect();
            match channels {
                Some(c) => format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Declarations that show `image` as the login screen background
pub fn login_declarations(image: &ImageSelection, sizing: LoginSizing) -> String {
    format!(
        "background: url('{}'); background-repeat: no-repeat; background-size: {}; background-position: center",
        image.file_uri(),
        sizing
    )
}

/// Rewrite the first rule matching `selector_prefix` in `contents`.
///
/// Parsing and serialization happen entirely in memory, so a failure leaves
/// nothing half-written.
pub fn rewrite_rule(
    contents: &str,
    selector_prefix: &str,
    declarations: &str,
    options: SerializeOptions,
) -> Result<Rewrite, BackgroundError> {
    Stylesheet::parse(contents)?.rewrite(selector_prefix, declarations, options)
}

struct Parser<'s> {
    src: &'s str,
    bytes: &'s [u8],
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Stylesheet, BackgroundError> {
        let mut items = Vec::new();

        if self.src.starts_with('\u{feff}') {
            self.pos = '\u{feff}'.len_utf8();
            items.push(Item::Trivia('\u{feff}'.to_string()));
        }

        while self.pos < self.bytes.len() {
            let start = self.pos;
            self.skip_trivia()?;
            if self.pos > start {
                items.push(Item::Trivia(self.src[start..self.pos].to_string()));
                continue;
            }

            match self.bytes[self.pos] {
                b'}' => return Err(self.error(self.pos, "unexpected '}'")),
                b'@' => {
                    self.skip_at_rule()?;
                    items.push(Item::AtRule(self.src[start..self.pos].to_string()));
                }
                _ => items.push(Item::Style(self.style_rule()?)),
            }
        }

        Ok(Stylesheet { items })
    }

    fn style_rule(&mut self) -> Result<StyleRule, BackgroundError> {
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error(start, "selector without a declaration block")),
                Some(b'{') => break,
                Some(b';') | Some(b'}') => {
                    return Err(self.error(self.pos, "selector without a declaration block"));
                }
                Some(b'\\') => self.skip_escape(),
                Some(b'"') | Some(b'\'') => self.skip_string()?,
                Some(b'/') if self.starts_comment() => self.skip_comment()?,
                Some(_) => self.pos += 1,
            }
        }

        let selector = self.src[start..self.pos].trim().to_string();
        if selector.is_empty() {
            return Err(self.error(start, "empty selector"));
        }

        let open = self.pos;
        self.skip_block()?;
        Ok(StyleRule {
            selector,
            body: self.src[open + 1..self.pos - 1].to_string(),
            raw: self.src[start..self.pos].to_string(),
        })
    }

    /// `@name ... ;` or `@name ... { ... }`
    fn skip_at_rule(&mut self) -> Result<(), BackgroundError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => return Err(self.error(start, "unterminated at-rule")),
                Some(b';') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'{') => return self.skip_block(),
                Some(b'}') => return Err(self.error(self.pos, "unexpected '}'")),
                Some(b'\\') => self.skip_escape(),
                Some(b'"') | Some(b'\'') => self.skip_string()?,
                Some(b'/') if self.starts_comment() => self.skip_comment()?,
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Positioned on `{`; moves past the matching `}`
    fn skip_block(&mut self) -> Result<(), BackgroundError> {
        let open = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Err(self.error(open, "unterminated block")),
                Some(b'{') => {
                    depth += 1;
                    self.pos += 1;
                }
                Some(b'}') => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(b'\\') => self.skip_escape(),
                Some(b'"') | Some(b'\'') => self.skip_string()?,
                Some(b'/') if self.starts_comment() => self.skip_comment()?,
                Some(_) => self.pos += 1,
            }
        }
    }

    fn skip_trivia(&mut self) -> Result<(), BackgroundError> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'/') if self.starts_comment() => self.skip_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn starts_comment(&self) -> bool {
        self.bytes[self.pos..].starts_with(b"/*")
    }

    fn skip_comment(&mut self) -> Result<(), BackgroundError> {
        let start = self.pos;
        match self.src[start + 2..].find("*/") {
            Some(offset) => {
                self.pos = start + 2 + offset + 2;
                Ok(())
            }
            None => Err(self.error(start, "unterminated comment")),
        }
    }

    fn skip_string(&mut self) -> Result<(), BackgroundError> {
        let start = self.pos;
        let quote = self.bytes[start];
        self.pos += 1;
        loop {
            match self.peek() {
                None | Some(b'\n') => return Err(self.error(start, "unterminated string")),
                Some(b'\\') => self.skip_escape(),
                Some(b) if b == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Positioned on `\`; moves past it and the character it escapes
    fn skip_escape(&mut self) {
        self.pos += 1;
        self.pos += self.src[self.pos..].chars().next().map_or(0, char::len_utf8);
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, at: usize, message: &str) -> BackgroundError {
        let at = at.min(self.src.len());
        let line = self.src.as_bytes()[..at]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1;
        BackgroundError::Parse(format!("{message} at line {line}"))
    }
}
