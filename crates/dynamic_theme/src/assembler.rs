//! Walks the document's rules through the rule cache and renders the theme.

use crate::host::{CssRule, NodeKey, NodeKind, StyleSheet};
use crate::modifier::{ModifiedValue, ThemeContext, get_modifiable_declaration, user_agent_style};
use crate::rule_cache::{ModifiableRule, RuleCache};
use crate::ThemeError;
use css_color::{ColorCache, FilterConfig};
use futures::future::LocalBoxFuture;
use log::{debug, warn};
use std::collections::HashSet;
use std::rc::Rc;
use url::Url;

/// Rules to theme, plus linked sheets whose rules could not be read.
#[derive(Debug, Default)]
pub struct CollectedRules {
    pub rules: Vec<Rc<ModifiableRule>>,
    pub unreadable: Vec<(NodeKey, Url)>,
}

fn build_rule(
    selector_text: &str,
    media: &[String],
    declarations: &[css_syntax::Declaration],
    base: &Url,
    colors: &ColorCache,
) -> Option<ModifiableRule> {
    let declarations: Vec<_> = declarations
        .iter()
        .filter_map(|declaration| get_modifiable_declaration(&declaration.name, &declaration.value, base, colors))
        .collect();
    if declarations.is_empty() {
        return None;
    }
    Some(ModifiableRule {
        selector_text: selector_text.to_owned(),
        media: media.to_vec(),
        declarations,
    })
}

struct Walk<'walk> {
    base: &'walk Url,
    cache: &'walk mut RuleCache,
    colors: &'walk ColorCache,
    media: Vec<String>,
    out: Vec<Rc<ModifiableRule>>,
}

impl Walk<'_> {
    fn visit(&mut self, rules: &[CssRule]) {
        for rule in rules {
            match rule {
                CssRule::Style {
                    id,
                    selector_text,
                    declarations,
                } => {
                    let (base, colors, media) = (self.base, self.colors, &self.media);
                    let built = self
                        .cache
                        .get_or_build(*id, || build_rule(selector_text, media, declarations, base, colors));
                    if let Some(built) = built {
                        self.out.push(built);
                    }
                }
                CssRule::Media { media_text, rules } => {
                    self.media.push(media_text.clone());
                    self.visit(rules);
                    self.media.pop();
                }
                CssRule::Supports { rules } => self.visit(rules),
            }
        }
    }
}

/// Visit every readable author sheet in document order.
///
/// Sheets owned by generated nodes or by links in `skip` are ignored.
pub fn collect_rules(
    sheets: Vec<StyleSheet>,
    document_base: &Url,
    skip: &HashSet<NodeKey>,
    cache: &mut RuleCache,
    colors: &ColorCache,
) -> CollectedRules {
    let mut collected = CollectedRules::default();
    for sheet in sheets {
        if sheet.owner.is_generated() || skip.contains(&sheet.owner.node) {
            continue;
        }
        let rules = match sheet.rules {
            Ok(rules) => rules,
            Err(error) => {
                warn!("{error}");
                if let (ThemeError::CrossOriginAccess { .. }, NodeKind::StylesheetLink, Some(href)) =
                    (&error, sheet.owner.kind, sheet.href)
                {
                    collected.unreadable.push((sheet.owner.node, href));
                }
                continue;
            }
        };
        let base = sheet.href.as_ref().unwrap_or(document_base);
        let mut walk = Walk {
            base,
            cache: &mut *cache,
            colors,
            media: Vec::new(),
            out: Vec::new(),
        };
        walk.visit(&rules);
        collected.rules.append(&mut walk.out);
    }
    collected
}

/// A declaration whose value arrives after the sheet was injected.
pub struct DeferredPatch {
    pub selector_text: String,
    pub media: Vec<String>,
    pub property: String,
    pub value: LocalBoxFuture<'static, Option<String>>,
}

pub struct AssembledTheme {
    pub text: String,
    pub patches: Vec<DeferredPatch>,
}

fn push_rule_block(lines: &mut Vec<String>, selector_text: &str, media: &[String], declarations: &[String]) {
    for condition in media {
        lines.push(format!("@media {condition} {{"));
    }
    lines.push(format!("{selector_text} {{"));
    lines.extend(declarations.iter().cloned());
    lines.push("}".to_owned());
    lines.extend(media.iter().map(|_| "}".to_owned()));
}

fn declaration_line(property: &str, value: &str) -> String {
    format!("    {property}: {value} !important;")
}

/// Standalone sheet for one late-resolved declaration.
#[must_use]
pub fn patch_text(selector_text: &str, media: &[String], property: &str, value: &str) -> String {
    let mut lines = Vec::new();
    push_rule_block(&mut lines, selector_text, media, &[declaration_line(property, value)]);
    lines.join("\n")
}

/// Render the user-agent block and every rule; asynchronous declarations are
/// split off as patches.
pub fn assemble(rules: &[Rc<ModifiableRule>], config: &FilterConfig, context: &ThemeContext) -> AssembledTheme {
    let mut lines = vec![user_agent_style(config, &context.colors)];
    let mut patches = Vec::new();
    for rule in rules {
        let mut declarations = Vec::with_capacity(rule.declarations.len());
        for declaration in &rule.declarations {
            match declaration.modifier.evaluate(config, context) {
                ModifiedValue::Immediate(value) => declarations.push(declaration_line(&declaration.property, &value)),
                ModifiedValue::Deferred(value) => patches.push(DeferredPatch {
                    selector_text: rule.selector_text.clone(),
                    media: rule.media.clone(),
                    property: declaration.property.clone(),
                    value,
                }),
            }
        }
        push_rule_block(&mut lines, &rule.selector_text, &rule.media, &declarations);
    }
    debug!("assembled {} rules, {} deferred declarations", rules.len(), patches.len());
    AssembledTheme {
        text: lines.join("\n"),
        patches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{RuleId, StyleNode};
    use crate::images::ImageStore;
    use crate::test_support::MemoryFetcher;
    use crate::{EngineConfig, Session};

    fn owner(node: u64, kind: NodeKind, classes: &[&str]) -> StyleNode {
        StyleNode {
            node: NodeKey(node),
            kind,
            id: None,
            classes: classes.iter().map(|class| (*class).to_owned()).collect(),
        }
    }

    fn style_rule(id: u64, selector: &str, css: &str) -> CssRule {
        CssRule::Style {
            id: RuleId(id),
            selector_text: selector.to_owned(),
            declarations: css_syntax::parse_declaration_list(css),
        }
    }

    fn document_base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    fn context() -> ThemeContext {
        let session = Session::new();
        ThemeContext {
            images: ImageStore::new(Rc::new(MemoryFetcher::default()), session.clone(), &EngineConfig::default()),
            session,
            colors: Rc::new(ColorCache::new()),
            analyze_images: true,
        }
    }

    #[test]
    fn keeps_document_order_and_media_nesting() {
        let sheets = vec![
            StyleSheet {
                owner: owner(1, NodeKind::Style, &[]),
                href: None,
                rules: Ok(vec![
                    style_rule(1, "body", "color: black; margin: 0"),
                    CssRule::Media {
                        media_text: "screen".to_owned(),
                        rules: vec![style_rule(2, "p", "background-color: white")],
                    },
                    style_rule(3, "div", "margin: 0"),
                ]),
            },
            StyleSheet {
                owner: owner(2, NodeKind::Style, crate::StyleRole::Patch.classes()),
                href: None,
                rules: Ok(vec![style_rule(4, "ignored", "color: red")]),
            },
        ];
        let mut cache = RuleCache::new();
        let colors = ColorCache::new();
        let collected = collect_rules(sheets, &document_base(), &HashSet::new(), &mut cache, &colors);
        let selectors: Vec<&str> = collected.rules.iter().map(|rule| rule.selector_text.as_str()).collect();
        assert_eq!(selectors, vec!["body", "p"]);
        assert_eq!(collected.rules[1].media, vec!["screen".to_owned()]);
        assert_eq!(collected.rules[0].declarations.len(), 1);
        assert_eq!(cache.build_count(), 3);

        let assembled = assemble(&collected.rules, &FilterConfig::default(), &context());
        let lines: Vec<&str> = assembled.text.lines().collect();
        let body = lines.iter().position(|line| *line == "body {").unwrap();
        assert!(lines[body + 1].starts_with("    color: #"));
        assert_eq!(lines[body + 2], "}");
        assert_eq!(lines[body + 3], "@media screen {");
        assert_eq!(lines[body + 4], "p {");
        assert_eq!(lines[body + 6], "}");
        assert_eq!(lines[body + 7], "}");
        assert!(assembled.text.starts_with("html, body, input, textarea, select, button {"));
        assert!(assembled.patches.is_empty());
    }

    #[test]
    fn unreadable_links_are_reported() {
        let link = Url::parse("https://cdn.example.net/site.css").unwrap();
        let sheets = vec![StyleSheet {
            owner: owner(5, NodeKind::StylesheetLink, &[]),
            href: Some(link.clone()),
            rules: Err(ThemeError::CrossOriginAccess {
                href: Some(link.to_string()),
            }),
        }];
        let mut cache = RuleCache::new();
        let collected = collect_rules(sheets, &document_base(), &HashSet::new(), &mut cache, &ColorCache::new());
        assert_eq!(collected.unreadable, vec![(NodeKey(5), link)]);

        let mut skip = HashSet::new();
        skip.insert(NodeKey(5));
        let sheets = vec![StyleSheet {
            owner: owner(5, NodeKind::StylesheetLink, &[]),
            href: None,
            rules: Err(ThemeError::CrossOriginAccess { href: None }),
        }];
        assert!(collect_rules(sheets, &document_base(), &skip, &mut cache, &ColorCache::new()).unreadable.is_empty());
    }

    #[test]
    fn image_declarations_become_patches() {
        let sheets = vec![StyleSheet {
            owner: owner(1, NodeKind::Style, &[]),
            href: None,
            rules: Ok(vec![style_rule(1, ".hero", "background-image: url(hero.png); color: red")]),
        }];
        let mut cache = RuleCache::new();
        let colors = ColorCache::new();
        let collected = collect_rules(sheets, &document_base(), &HashSet::new(), &mut cache, &colors);
        let assembled = assemble(&collected.rules, &FilterConfig::default(), &context());
        assert_eq!(assembled.patches.len(), 1);
        assert_eq!(assembled.patches[0].property, "background-image");
        assert!(assembled.text.contains(".hero {\n    color: "));
    }

    #[test]
    fn patch_text_wraps_media() {
        assert_eq!(
            patch_text("a", &["print".to_owned()], "color", "#fff"),
            "@media print {\na {\n    color: #fff !important;\n}\n}"
        );
    }
}
