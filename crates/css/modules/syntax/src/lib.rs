//! CSS rule and declaration parsing on top of `cssparser`, plus value-level
//! helpers used when rewriting author styles.
use cssparser::AtRuleParser as CssAtRuleParser;
use cssparser::BasicParseErrorKind;
use cssparser::CowRcStr;
use cssparser::DeclarationParser as CssDeclarationParser;
use cssparser::ParseError;
use cssparser::Parser;
use cssparser::ParserInput;
use cssparser::ParserState;
use cssparser::QualifiedRuleParser as CssQualifiedRuleParser;
use cssparser::RuleBodyItemParser as CssRuleBodyItemParser;
use cssparser::RuleBodyParser as CssRuleBodyParser;
use cssparser::StyleSheetParser;
use log::trace;

mod format;
pub mod values;

pub use format::format_css;

/// `name: value` with the `!important` flag split off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Property name, ASCII-lowercased.
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// A selector list and its declarations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleRule {
    pub prelude: String,
    pub declarations: Vec<Declaration>,
}

/// A rule as it appears in a stylesheet or inside a conditional group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CssRule {
    Style(StyleRule),
    /// `@media <condition> { ... }`
    Media {
        condition: String,
        rules: Vec<CssRule>,
    },
    /// `@supports <condition> { ... }`
    Supports {
        condition: String,
        rules: Vec<CssRule>,
    },
}

/// A parsed stylesheet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stylesheet {
    /// Top-level rules in source order.
    pub rules: Vec<CssRule>,
}

impl Stylesheet {
    /// Iterate every style rule depth-first, together with the `@media`
    /// conditions enclosing it (outermost first).
    pub fn for_each_style_rule<F: FnMut(&StyleRule, &[String])>(&self, mut visit: F) {
        fn walk<F: FnMut(&StyleRule, &[String])>(rules: &[CssRule], media: &mut Vec<String>, visit: &mut F) {
            for rule in rules {
                match rule {
                    CssRule::Style(style) => visit(style, media),
                    CssRule::Media { condition, rules: nested } => {
                        media.push(condition.clone());
                        walk(nested, media, visit);
                        media.pop();
                    }
                    CssRule::Supports { rules: nested, .. } => walk(nested, media, visit),
                }
            }
        }
        walk(&self.rules, &mut Vec::new(), &mut visit);
    }
}

fn strip_important(raw: &str) -> (String, bool) {
    let value = raw.trim();
    match value.rfind("!important").and_then(|flag| value.get(..flag)) {
        Some(head) => (head.trim_end().to_owned(), true),
        None => (value.to_owned(), false),
    }
}

/// Reads the body of a rule block. Nested rules are skipped.
struct DeclarationListParser;

impl CssDeclarationParser<'_> for DeclarationListParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'input>(
        &mut self,
        name: CowRcStr<'input>,
        input: &mut Parser<'input, '_>,
        _declaration_start: &ParserState,
    ) -> Result<Declaration, ParseError<'input, ()>> {
        let value_start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        let (value, important) = strip_important(input.slice_from(value_start));
        Ok(Declaration {
            name: name.to_ascii_lowercase(),
            value,
            important,
        })
    }
}

impl CssAtRuleParser<'_> for DeclarationListParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();
}

impl CssQualifiedRuleParser<'_> for DeclarationListParser {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = ();

    fn parse_prelude<'input>(&mut self, input: &mut Parser<'input, '_>) -> Result<(), ParseError<'input, ()>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }
}

impl CssRuleBodyItemParser<'_, Declaration, ()> for DeclarationListParser {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Conditional group rules whose nested rules are kept.
enum GroupPrelude {
    Media(String),
    Supports(String),
}

/// Parser for rule lists: the stylesheet itself and conditional group bodies.
struct RuleListParser;

impl CssAtRuleParser<'_> for RuleListParser {
    type Prelude = GroupPrelude;
    type AtRule = CssRule;
    type Error = ();

    fn parse_prelude<'input>(
        &mut self,
        name: CowRcStr<'input>,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        let condition = input.slice_from(start).trim().to_owned();
        if name.eq_ignore_ascii_case("media") {
            Ok(GroupPrelude::Media(condition))
        } else if name.eq_ignore_ascii_case("supports") {
            Ok(GroupPrelude::Supports(condition))
        } else {
            // @font-face, @keyframes, @import, ... carry no themable rules.
            Err(input.new_error(BasicParseErrorKind::AtRuleInvalid(name)))
        }
    }

    fn parse_block<'input>(
        &mut self,
        prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::AtRule, ParseError<'input, Self::Error>> {
        let rules = parse_rule_list(input);
        Ok(match prelude {
            GroupPrelude::Media(condition) => CssRule::Media { condition, rules },
            GroupPrelude::Supports(condition) => CssRule::Supports { condition, rules },
        })
    }

    fn rule_without_block(&mut self, _prelude: GroupPrelude, _state: &ParserState) -> Result<CssRule, ()> {
        Err(())
    }
}

impl CssQualifiedRuleParser<'_> for RuleListParser {
    type Prelude = String;
    type QualifiedRule = CssRule;
    type Error = ();

    fn parse_prelude<'input>(&mut self, input: &mut Parser<'input, '_>) -> Result<String, ParseError<'input, ()>> {
        let selector_start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        Ok(input.slice_from(selector_start).trim().to_owned())
    }

    fn parse_block<'input>(
        &mut self,
        prelude: String,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<CssRule, ParseError<'input, ()>> {
        Ok(CssRule::Style(StyleRule {
            prelude,
            declarations: read_declarations(input),
        }))
    }
}

fn read_declarations(block: &mut Parser) -> Vec<Declaration> {
    CssRuleBodyParser::new(block, &mut DeclarationListParser)
        .filter_map(|item| match item {
            Ok(declaration) => Some(declaration),
            Err((error, text)) => {
                trace!("skipping invalid declaration {text:?}: {error:?}");
                None
            }
        })
        .collect()
}

fn parse_rule_list(input: &mut Parser) -> Vec<CssRule> {
    let mut list = RuleListParser;
    StyleSheetParser::new(input, &mut list).flatten().collect()
}

/// Rules of `css` in source order. At-rules other than `@media` and
/// `@supports` are dropped along with malformed rules.
pub fn parse_stylesheet(css: &str) -> Stylesheet {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    Stylesheet {
        rules: parse_rule_list(&mut parser),
    }
}

/// Parse the body of a `style` attribute or a rule block.
pub fn parse_declaration_list(css: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    read_declarations(&mut parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rules_and_important_flags() {
        let sheet = parse_stylesheet("a, b { color: red !important; background: #fff }");
        let CssRule::Style(rule) = &sheet.rules[0] else {
            panic!("expected style rule");
        };
        assert_eq!(rule.prelude, "a, b");
        assert_eq!(rule.declarations.len(), 2);
        assert_eq!(rule.declarations[0].value, "red");
        assert!(rule.declarations[0].important);
        assert_eq!(rule.declarations[1].name, "background");
        assert!(!rule.declarations[1].important);
    }

    #[test]
    fn keeps_media_nesting_and_drops_font_faces() {
        let sheet = parse_stylesheet(
            "@font-face { font-family: X; src: url(x.woff) }
             @media screen { @media (min-width: 10px) { p { color: blue } } }
             @supports (display: grid) { div { color: green } }",
        );
        let mut seen = Vec::new();
        sheet.for_each_style_rule(|rule, media| seen.push((rule.prelude.clone(), media.to_vec())));
        assert_eq!(
            seen,
            vec![
                ("p".to_owned(), vec!["screen".to_owned(), "(min-width: 10px)".to_owned()]),
                ("div".to_owned(), Vec::new()),
            ]
        );
    }

    #[test]
    fn parses_inline_declaration_lists() {
        let declarations = parse_declaration_list("color: red; border-color: rgb(1, 2, 3)");
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[1].value, "rgb(1, 2, 3)");
    }
}
