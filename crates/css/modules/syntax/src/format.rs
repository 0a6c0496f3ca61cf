//! Pretty-printer for generated stylesheets.

use crate::values::split_top_level_commas;

const INDENT: &str = "    ";

fn push_line(lines: &mut Vec<String>, depth: usize, text: &str) {
    lines.push(format!("{}{text}", INDENT.repeat(depth)));
}

/// Re-indent minified CSS: one declaration per line, selector lists split
/// after each comma, nested blocks indented by four spaces.
///
/// Semicolons, commas and braces inside strings, parentheses or brackets are
/// left alone, so `url(data:...;base64,...)` survives untouched.
pub fn format_css(css: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut nesting = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = css.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            current.push(ch);
            if ch == '\\' {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
            }
            '(' | '[' => {
                nesting += 1;
                current.push(ch);
            }
            ')' | ']' => {
                nesting = nesting.saturating_sub(1);
                current.push(ch);
            }
            '{' if nesting == 0 => {
                let parts = split_top_level_commas(current.trim());
                let last = parts.len().saturating_sub(1);
                for (index, part) in parts.iter().enumerate() {
                    if index == last {
                        push_line(&mut lines, depth, &format!("{part} {{"));
                    } else {
                        push_line(&mut lines, depth, &format!("{part},"));
                    }
                }
                current.clear();
                depth += 1;
            }
            ';' if nesting == 0 => {
                let text = current.trim();
                if !text.is_empty() {
                    push_line(&mut lines, depth, &format!("{text};"));
                }
                current.clear();
            }
            '}' if nesting == 0 => {
                let text = current.trim();
                if !text.is_empty() {
                    push_line(&mut lines, depth, &format!("{text};"));
                }
                current.clear();
                depth = depth.saturating_sub(1);
                push_line(&mut lines, depth, "}");
            }
            _ => current.push(ch),
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        push_line(&mut lines, depth, rest);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::format_css;

    #[test]
    fn formats_single_rule() {
        assert_eq!(format_css("div { color: red; }"), "div {\n    color: red;\n}");
    }

    #[test]
    fn formats_consecutive_rules() {
        assert_eq!(
            format_css("div { color: red; } .list-item { background: rgb(0, 0, 0); color: white; }"),
            [
                "div {",
                "    color: red;",
                "}",
                ".list-item {",
                "    background: rgb(0, 0, 0);",
                "    color: white;",
                "}",
            ]
            .join("\n")
        );
    }

    #[test]
    fn indents_media_blocks() {
        assert_eq!(
            format_css("@media screen { div { color: red; } span { color: red; } } @media all { p { color: green; } }"),
            [
                "@media screen {",
                "    div {",
                "        color: red;",
                "    }",
                "    span {",
                "        color: red;",
                "    }",
                "}",
                "@media all {",
                "    p {",
                "        color: green;",
                "    }",
                "}",
            ]
            .join("\n")
        );
    }

    #[test]
    fn splits_selector_and_media_lists() {
        assert_eq!(
            format_css("div, span { background: green; color: red; }"),
            "div,\nspan {\n    background: green;\n    color: red;\n}"
        );
        assert_eq!(
            format_css("@media print, screen and (min-width: 20rem) { div, span { background: green; color: red; } }"),
            [
                "@media print,",
                "screen and (min-width: 20rem) {",
                "    div,",
                "    span {",
                "        background: green;",
                "        color: red;",
                "    }",
                "}",
            ]
            .join("\n")
        );
    }

    #[test]
    fn leaves_data_urls_and_attribute_strings_intact() {
        assert_eq!(
            format_css(".icon { background-image: url(data:image/gif;base64,XYZ); }"),
            ".icon {\n    background-image: url(data:image/gif;base64,XYZ);\n}"
        );
        assert_eq!(
            format_css(r#"img[src*="a,b;c"] { filter: invert(1); }"#),
            "img[src*=\"a,b;c\"] {\n    filter: invert(1);\n}"
        );
    }

    #[test]
    fn closes_declarations_without_semicolon() {
        assert_eq!(format_css("a{color:red}"), "a {\n    color:red;\n}");
    }
}
