//! Text of a table cell, split into values.
//!
//! Commas, semicolons and line breaks (`<br>` or a raw newline) all separate values,
//! unless they sit inside parentheses or brackets. Footnotes and annotations are
//! dropped before any text is looked at.

use scraper::ElementRef;
use url::Url;

/// Elements whose whole subtree is annotation, never content.
const SKIPPED: &[&str] = &["sup", "small", "style", "script", "template"];

/// Block elements act as line breaks.
const BLOCKS: &[&str] = &["p", "div", "li", "ul", "ol", "dl", "dd", "dt"];

/// One value of a cell, with the first link found inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub text: String,
    pub link: Option<String>,
}

/// A table cell after tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Cell {
    pub header: bool,
    pub text: String,
    pub tokens: Vec<Token>,
}

impl Cell {
    pub(crate) fn parse(elem: ElementRef, base: &Url) -> Self {
        let mut tokenizer = Tokenizer::new(base);
        tokenizer.walk(elem);
        tokenizer.split();

        Self {
            header: elem.value().name() == "th",
            text: normalize(&tokenizer.full),
            tokens: tokenizer.tokens,
        }
    }
}

/// Collapses every whitespace run to a single space and trims.
pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Tokenizer<'a> {
    base: &'a Url,
    full: String,
    current: String,
    link: Option<String>,
    depth: usize,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    fn new(base: &'a Url) -> Self {
        Self {
            base,
            full: String::new(),
            current: String::new(),
            link: None,
            depth: 0,
            tokens: Vec::new(),
        }
    }

    fn walk(&mut self, parent: ElementRef) {
        for child in parent.children() {
            if let Some(text) = child.value().as_text() {
                self.push_text(text);
                continue;
            }
            let Some(elem) = ElementRef::wrap(child) else {
                continue;
            };
            let name = elem.value().name();
            if SKIPPED.contains(&name) {
                continue;
            }
            match name {
                "br" => {
                    self.full.push(' ');
                    self.separate();
                }
                "a" => {
                    if self.link.is_none() {
                        self.link = self.resolve(elem);
                    }
                    self.walk(elem);
                }
                _ if BLOCKS.contains(&name) => {
                    self.full.push(' ');
                    self.separate();
                    self.walk(elem);
                    self.separate();
                }
                _ => self.walk(elem),
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        self.full.push_str(text);
        for c in text.chars() {
            match c {
                '(' | '[' => {
                    self.depth += 1;
                    self.current.push(c);
                }
                ')' | ']' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.current.push(c);
                }
                ',' | ';' if self.depth == 0 => self.split(),
                '\n' => self.separate(),
                _ => self.current.push(c),
            }
        }
    }

    /// Line breaks split like commas, and like commas only outside parentheses.
    fn separate(&mut self) {
        if self.depth == 0 {
            self.split();
        } else {
            self.current.push(' ');
        }
    }

    /// Closes the value being built, dropping it when it holds no actual word.
    fn split(&mut self) {
        let text = normalize(&self.current);
        let link = self.link.take();
        self.current.clear();
        if text.chars().any(char::is_alphanumeric) {
            self.tokens.push(Token { text, link });
        }
    }

    fn resolve(&self, anchor: ElementRef) -> Option<String> {
        let elem = anchor.value();
        // Red links point to pages that do not exist
        if elem.classes().any(|c| c == "new") {
            return None;
        }
        let href = elem.attr("href")?.trim();
        if href.is_empty() || href.starts_with('#') || href.contains("redlink=1") {
            return None;
        }
        self.base.join(href).ok().map(String::from)
    }
}
