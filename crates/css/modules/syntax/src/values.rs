//! Token-level helpers for declaration values and raw stylesheet text.

use core::ops::Range;
use cssparser::ParseError;
use cssparser::Parser;
use cssparser::ParserInput;
use cssparser::Token;

/// What a [`ValueSpan`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSpanKind {
    Url,
    Gradient,
}

/// A top-level `url(...)` or `*-gradient(...)` occurrence inside a value,
/// as byte offsets into the original text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueSpan {
    pub kind: ValueSpanKind,
    pub start: usize,
    pub end: usize,
}

/// A gradient function split into its name and top-level arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GradientParts<'text> {
    pub name: &'text str,
    pub args: Vec<&'text str>,
}

fn consume_block<'input>(parser: &mut Parser<'input, '_>) {
    let consumed: Result<(), ParseError<'input, ()>> = parser.parse_nested_block(|inner| {
        while inner.next_including_whitespace_and_comments().is_ok() {}
        Ok(())
    });
    if consumed.is_err() {
        log::trace!("unterminated block in css value");
    }
}

fn is_gradient_function(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with("gradient")
}

/// Locate url and gradient functions at the top level of `value`.
pub fn find_image_spans(value: &str) -> Vec<ValueSpan> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut spans = Vec::new();
    loop {
        let start = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::UnquotedUrl(_) => spans.push(ValueSpan {
                kind: ValueSpanKind::Url,
                start,
                end: parser.position().byte_index(),
            }),
            Token::Function(name) => {
                consume_block(&mut parser);
                let kind = if name.eq_ignore_ascii_case("url") {
                    Some(ValueSpanKind::Url)
                } else if is_gradient_function(&name) {
                    Some(ValueSpanKind::Gradient)
                } else {
                    None
                };
                if let Some(kind) = kind {
                    spans.push(ValueSpan {
                        kind,
                        start,
                        end: parser.position().byte_index(),
                    });
                }
            }
            _ => {}
        }
    }
    spans
}

/// Extract the address from a `url(...)` token, quoted or not.
pub fn url_argument(text: &str) -> Option<String> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    parser.expect_url().ok().map(|url| url.to_string())
}

/// Split on commas that are not nested in parentheses, brackets or strings.
/// Parts are trimmed; an empty input yields no parts.
pub fn split_top_level_commas(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut nesting = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut part_start = 0;
    for (index, ch) in text.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' => nesting += 1,
            ')' | ']' => nesting = nesting.saturating_sub(1),
            ',' if nesting == 0 => {
                parts.push(text.get(part_start..index).unwrap_or_default().trim());
                part_start = index + 1;
            }
            _ => {}
        }
    }
    let tail = text.get(part_start..).unwrap_or_default().trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail);
    }
    parts
}

/// Split `linear-gradient(red, blue 50%)` into its name and arguments.
pub fn parse_gradient(text: &str) -> Option<GradientParts<'_>> {
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    if close < open {
        return None;
    }
    let name = text.get(..open)?.trim();
    if !is_gradient_function(name) {
        return None;
    }
    let inner = text.get(open + 1..close)?;
    Some(GradientParts {
        name,
        args: split_top_level_commas(inner),
    })
}

/// Ranges of tokens in a shadow value that might denote a color: identifiers,
/// hashes and functions. Callers decide which of them actually parse.
pub fn find_color_candidates(value: &str) -> Vec<Range<usize>> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut ranges = Vec::new();
    loop {
        let start = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::Ident(_) | Token::Hash(_) | Token::IDHash(_) => {
                ranges.push(start..parser.position().byte_index());
            }
            Token::Function(_) => {
                consume_block(&mut parser);
                ranges.push(start..parser.position().byte_index());
            }
            _ => {}
        }
    }
    ranges
}

/// Serialize an address as `url("...")`.
pub fn css_url_value(url: &str) -> String {
    let mut out = String::with_capacity(url.len() + 7);
    out.push_str("url(\"");
    for ch in url.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(ch),
        }
    }
    out.push_str("\")");
    out
}

fn collect_urls<'input>(parser: &mut Parser<'input, '_>, found: &mut Vec<(usize, usize, String)>) {
    loop {
        let start = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::UnquotedUrl(url) => {
                found.push((start, parser.position().byte_index(), url.to_string()));
            }
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                let mut argument = None;
                let nested: Result<(), ParseError<'input, ()>> = parser.parse_nested_block(|inner| {
                    argument = inner.expect_string().ok().map(|text| text.to_string());
                    while inner.next_including_whitespace_and_comments().is_ok() {}
                    Ok(())
                });
                if nested.is_ok()
                    && let Some(url) = argument
                {
                    found.push((start, parser.position().byte_index(), url));
                }
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                let nested: Result<(), ParseError<'input, ()>> = parser.parse_nested_block(|inner| {
                    collect_urls(inner, found);
                    Ok(())
                });
                if nested.is_err() {
                    log::trace!("unterminated block while scanning urls");
                }
            }
            _ => {}
        }
    }
}

/// Replace every `url(...)` in a stylesheet with `url("<rewrite(address)>")`.
pub fn rewrite_urls<F: FnMut(&str) -> String>(css: &str, mut rewrite: F) -> String {
    let mut found = Vec::new();
    {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        collect_urls(&mut parser, &mut found);
    }
    let mut out = String::with_capacity(css.len());
    let mut cursor = 0;
    for (start, end, url) in found {
        out.push_str(css.get(cursor..start).unwrap_or_default());
        out.push_str(&css_url_value(&rewrite(&url)));
        cursor = end;
    }
    out.push_str(css.get(cursor..).unwrap_or_default());
    out
}

/// Drop top-level `@font-face` blocks.
pub fn strip_font_faces(css: &str) -> String {
    let mut removed: Vec<Range<usize>> = Vec::new();
    {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut font_face_start: Option<usize> = None;
        loop {
            let start = parser.position().byte_index();
            let token = match parser.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };
            match token {
                Token::AtKeyword(name) if name.eq_ignore_ascii_case("font-face") => {
                    font_face_start = Some(start);
                }
                Token::CurlyBracketBlock => {
                    consume_block(&mut parser);
                    if let Some(begin) = font_face_start.take() {
                        removed.push(begin..parser.position().byte_index());
                    }
                }
                Token::Semicolon => font_face_start = None,
                _ => {}
            }
        }
    }
    let mut out = String::with_capacity(css.len());
    let mut cursor = 0;
    for range in removed {
        out.push_str(css.get(cursor..range.start).unwrap_or_default());
        cursor = range.end;
    }
    out.push_str(css.get(cursor..).unwrap_or_default());
    out
}
