//! Stack-argument size analysis of preprocessed C declarations.
//!
//! The preprocessed header text is split into tokens and walked one
//! top-level declaration at a time. Function prototypes are recorded with the
//! total size of their stack-passed parameters. Each parameter occupies a
//! multiple of 4 bytes.

use std::collections::HashMap;

use nom::{
    AsChar, Parser,
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{anychar, char as nomchar, not_line_ending, satisfy},
    combinator::recognize,
    multi::many0_count,
    sequence::{delimited, pair, preceded},
};

use crate::annotate::StackSizeTable;

/// Compiler extensions taking a parenthesized argument that are not part of
/// the declaration's type.
const EXTENSION_KEYWORDS: &[&str] = &[
    "__attribute__",
    "__attribute",
    "__declspec",
    "__asm__",
    "__asm",
    "asm",
];

/// Builds a stack size table from preprocessed C header text.
pub fn parse_declarations(text: &str) -> StackSizeTable {
    let mut analyzer = DeclarationAnalyzer::default();
    let mut tokens = Tokenizer::new(text);
    let mut declaration: Vec<&str> = Vec::new();
    let mut depth = 0usize;

    while let Some(token) = tokens.next() {
        match token {
            "(" | "[" => {
                depth += 1;
                declaration.push(token);
            }
            ")" | "]" => {
                depth = depth.saturating_sub(1);
                declaration.push(token);
            }
            ";" if depth == 0 => {
                analyzer.declaration(&declaration);
                declaration.clear();
            }
            "{" if depth == 0 => {
                if let [.., "extern", linkage] = declaration.as_slice()
                    && linkage.starts_with('"')
                {
                    // Declarations inside of a linkage block are top-level.
                    declaration.clear();
                } else if declaration.last() == Some(&")") {
                    tokens.skip_block();
                    analyzer.declaration(&declaration);
                    declaration.clear();
                } else {
                    tokens.skip_block();
                    declaration.push("{}");
                }
            }
            "}" if depth == 0 => declaration.clear(),
            _ => declaration.push(token),
        }
    }

    log::debug!(
        "found {} function declarations and {} scalar typedefs",
        analyzer.table.len(),
        analyzer.typedefs.len()
    );

    analyzer.table
}

#[derive(Default)]
struct DeclarationAnalyzer<'a> {
    typedefs: HashMap<&'a str, u32>,
    table: StackSizeTable,
}

impl<'a> DeclarationAnalyzer<'a> {
    fn declaration(&mut self, tokens: &[&'a str]) {
        let tokens = strip_extensions(tokens);

        match tokens.split_first() {
            Some((&"typedef", rest)) => self.typedef(rest),
            Some(_) => self.function(&tokens),
            None => (),
        }
    }

    fn typedef(&mut self, tokens: &[&'a str]) {
        let declarators = split_top_level(tokens, ",");
        let Some(first) = declarators.first() else {
            return;
        };

        if first.contains(&"(") {
            return;
        }

        let base_end = first
            .iter()
            .position(|token| *token == "*")
            .unwrap_or(first.len().saturating_sub(1));
        let base = &first[..base_end];

        for declarator in &declarators {
            if declarator.contains(&"[") {
                continue;
            }

            let Some(&name) = declarator.last().filter(|name| is_identifier(name)) else {
                continue;
            };

            let size = if declarator.contains(&"*") {
                Some(4)
            } else {
                self.scalar_size(base)
            };

            if let Some(size) = size {
                self.typedefs.entry(name).or_insert(size);
            }
        }
    }

    fn function(&mut self, tokens: &[&'a str]) {
        let Some(open) = tokens.iter().position(|token| *token == "(") else {
            return;
        };

        let Some(close) = matching_paren(tokens, open) else {
            return;
        };

        // Anything following the parameter list means this is not a plain
        // prototype (function pointers and functions returning them).
        if close + 1 != tokens.len() || open == 0 || tokens[..open].contains(&"=") {
            return;
        }

        let name = tokens[open - 1];
        if !is_identifier(name) {
            return;
        }

        let params = &tokens[open + 1..close];
        let Some(size) = self.parameters_size(params) else {
            return;
        };

        if !self.table.insert(name, size) {
            log::trace!("ignoring redeclaration of '{name}'");
        }
    }

    /// Total stack size of a parameter list or `None` for variadic functions.
    fn parameters_size(&self, params: &[&str]) -> Option<u32> {
        if params.is_empty() || params == ["void"] {
            return Some(0);
        }

        let mut total = 0u32;
        for param in split_top_level(params, ",") {
            if param == ["..."] {
                return None;
            }

            total += self.parameter_size(param);
        }

        Some(total)
    }

    fn parameter_size(&self, param: &[&str]) -> u32 {
        if param.iter().any(|token| matches!(*token, "*" | "[" | "(")) {
            return 4;
        }

        self.scalar_size(param).unwrap_or(4).max(1).next_multiple_of(4)
    }

    /// Size of a scalar type spelled by `tokens`.
    ///
    /// Returns `None` for aggregates and unknown types.
    fn scalar_size(&self, tokens: &[&str]) -> Option<u32> {
        let has = |keyword: &str| tokens.contains(&keyword);

        if has("struct") || has("union") {
            return None;
        }

        if has("enum") {
            return Some(4);
        }

        if has("double") || has("__int64") {
            return Some(8);
        }

        match tokens.iter().filter(|token| **token == "long").count() {
            0 => (),
            1 => return Some(4),
            _ => return Some(8),
        }

        if has("char") || has("__int8") {
            return Some(1);
        }

        if has("short") || has("__int16") {
            return Some(2);
        }

        if ["int", "float", "signed", "unsigned", "__int32", "_Bool", "bool"]
            .iter()
            .any(|keyword| has(*keyword))
        {
            return Some(4);
        }

        tokens
            .iter()
            .find_map(|token| self.typedefs.get(token).copied())
    }
}

/// Removes `__attribute__((...))` style extensions from a declaration.
fn strip_extensions<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let mut stripped = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if EXTENSION_KEYWORDS.contains(&tokens[i]) && tokens.get(i + 1) == Some(&"(") {
            match matching_paren(tokens, i + 1) {
                Some(close) => i = close + 1,
                None => break,
            }
            continue;
        }

        stripped.push(tokens[i]);
        i += 1;
    }

    stripped
}

/// Index of the `)` closing the `(` at `open`.
fn matching_paren(tokens: &[&str], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        match *token {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => (),
        }
    }

    None
}

/// Splits `tokens` on `separator` outside of any brackets.
fn split_top_level<'t, 'a>(tokens: &'t [&'a str], separator: &str) -> Vec<&'t [&'a str]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, token) in tokens.iter().enumerate() {
        match *token {
            "(" | "[" => depth += 1,
            ")" | "]" => depth = depth.saturating_sub(1),
            t if t == separator && depth == 0 => {
                parts.push(&tokens[start..idx]);
                start = idx + 1;
            }
            _ => (),
        }
    }

    parts.push(&tokens[start..]);
    parts
}

fn is_identifier(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
}

/// Iterator over the C tokens in a block of preprocessed text.
///
/// Comments and line markers are skipped.
struct Tokenizer<'a> {
    data: &'a str,
}

impl<'a> Tokenizer<'a> {
    fn new(data: &'a str) -> Tokenizer<'a> {
        Self { data }
    }

    /// Consumes tokens up to and including the `}` matching an already
    /// consumed `{`.
    fn skip_block(&mut self) {
        let mut depth = 1usize;
        for token in self.by_ref() {
            match token {
                "{" => depth += 1,
                "}" => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => (),
            }
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let (remaining, _) = trivia(self.data).ok()?;
        if remaining.is_empty() {
            self.data = remaining;
            return None;
        }

        match token(remaining) {
            Ok((remaining, token)) => {
                self.data = remaining;
                Some(token)
            }
            Err(e) => {
                log::warn!("stopped reading declarations: {e}");
                self.data = "";
                None
            }
        }
    }
}

fn block_comment(input: &str) -> nom::IResult<&str, &str> {
    recognize(delimited(tag("/*"), take_until("*/"), tag("*/"))).parse(input)
}

fn line_comment(input: &str) -> nom::IResult<&str, &str> {
    recognize(preceded(tag("//"), not_line_ending)).parse(input)
}

fn line_marker(input: &str) -> nom::IResult<&str, &str> {
    recognize(preceded(nomchar('#'), not_line_ending)).parse(input)
}

fn whitespace(input: &str) -> nom::IResult<&str, &str> {
    take_while1(char::is_whitespace).parse(input)
}

fn trivia(input: &str) -> nom::IResult<&str, usize> {
    many0_count(alt((whitespace, block_comment, line_comment, line_marker))).parse(input)
}

fn identifier(input: &str) -> nom::IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| AsChar::is_alphanum(c) || c == '_' || c == '$'),
    ))
    .parse(input)
}

fn number(input: &str) -> nom::IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_digit()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '.'),
    ))
    .parse(input)
}

fn quoted(quote: char, input: &str) -> nom::IResult<&str, &str> {
    let escape = recognize(preceded(nomchar('\\'), anychar));
    let plain = recognize(satisfy(move |c| c != quote && c != '\\'));

    recognize(delimited(
        nomchar(quote),
        many0_count(alt((escape, plain))),
        nomchar(quote),
    ))
    .parse(input)
}

fn string_literal(input: &str) -> nom::IResult<&str, &str> {
    quoted('"', input)
}

fn char_literal(input: &str) -> nom::IResult<&str, &str> {
    quoted('\'', input)
}

fn punctuation(input: &str) -> nom::IResult<&str, &str> {
    alt((tag("..."), recognize(satisfy(|c| !c.is_whitespace())))).parse(input)
}

fn token(input: &str) -> nom::IResult<&str, &str> {
    alt((identifier, number, string_literal, char_literal, punctuation)).parse(input)
}
