//! Declaration modifier dispatch: decides how a declaration is rewritten
//! and evaluates it against a filter profile.

use crate::composite::{CompositeValue, parse_composite};
use crate::images::ImageStore;
use crate::Session;
use css_color::{ColorCache, FilterConfig, RemapKind, Rgba};
use css_syntax::values::find_color_candidates;
use futures::future::LocalBoxFuture;
use log::warn;
use std::rc::Rc;
use url::Url;

/// Values that look like colors but cannot be remapped.
const UNPARSABLE_COLORS: [&str; 5] = [
    "inherit",
    "transparent",
    "initial",
    "currentcolor",
    "-webkit-focus-ring-color",
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransformKind {
    Color,
    BackgroundImage,
    Shadow,
}

type PropertyPredicate = fn(&str) -> bool;

fn is_color_property(property: &str) -> bool {
    property.contains("color") && property != "-webkit-print-color-adjust"
}

fn is_background_image(property: &str) -> bool {
    property == "background-image"
}

fn is_shadow_property(property: &str) -> bool {
    property.contains("shadow")
}

/// First matching predicate wins.
const TRANSFORMS: [(PropertyPredicate, TransformKind); 3] = [
    (is_color_property, TransformKind::Color),
    (is_background_image, TransformKind::BackgroundImage),
    (is_shadow_property, TransformKind::Shadow),
];

#[must_use]
pub fn transform_kind(property: &str) -> Option<TransformKind> {
    TRANSFORMS
        .iter()
        .find(|(matches, _)| matches(property))
        .map(|(_, kind)| *kind)
}

fn remap_for_property(property: &str) -> RemapKind {
    if property.contains("background") {
        RemapKind::Background
    } else if property.contains("border") || property.contains("outline") {
        RemapKind::Border
    } else {
        RemapKind::Foreground
    }
}

/// Everything an evaluation needs from the running session.
#[derive(Clone)]
pub struct ThemeContext {
    pub session: Session,
    pub colors: Rc<ColorCache>,
    pub images: ImageStore,
    pub analyze_images: bool,
}

/// Result of evaluating a modifier.
pub enum ModifiedValue {
    Immediate(String),
    /// Resolves to `None` when the session ended before the value was ready.
    Deferred(LocalBoxFuture<'static, Option<String>>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShadowPart {
    Literal(String),
    Color(Rgba),
}

/// A function from filter profile to final value.
#[derive(Clone, Debug, PartialEq)]
pub enum Modifier {
    Color { color: Rgba, remap: RemapKind },
    Shadow(Vec<ShadowPart>),
    BackgroundImage(CompositeValue),
}

impl Modifier {
    pub fn evaluate(&self, config: &FilterConfig, context: &ThemeContext) -> ModifiedValue {
        match self {
            Self::Color { color, remap } => ModifiedValue::Immediate(context.colors.modify(*color, config, *remap)),
            Self::Shadow(parts) => ModifiedValue::Immediate(
                parts
                    .iter()
                    .map(|part| match part {
                        ShadowPart::Literal(text) => text.clone(),
                        ShadowPart::Color(color) => context.colors.modify(*color, config, RemapKind::Background),
                    })
                    .collect(),
            ),
            Self::BackgroundImage(value) => value.evaluate(config, context),
        }
    }
}

/// A declaration whose value depends on the filter profile.
#[derive(Clone, Debug, PartialEq)]
pub struct ModifiableDeclaration {
    pub property: String,
    pub modifier: Modifier,
}

fn color_modifier(property: &str, value: &str, colors: &ColorCache) -> Option<Modifier> {
    let lowered = value.trim().to_ascii_lowercase();
    if UNPARSABLE_COLORS.contains(&lowered.as_str()) {
        return None;
    }
    match colors.parse(value) {
        Ok(color) => Some(Modifier::Color {
            color,
            remap: remap_for_property(property),
        }),
        Err(error) => {
            warn!("Color parse error: {error}");
            None
        }
    }
}

fn shadow_modifier(value: &str, colors: &ColorCache) -> Option<Modifier> {
    let mut parts = Vec::new();
    let mut cursor = 0;
    for range in find_color_candidates(value) {
        let Some(candidate) = value.get(range.clone()) else {
            continue;
        };
        let lowered = candidate.to_ascii_lowercase();
        if lowered == "none" || lowered == "inset" || UNPARSABLE_COLORS.contains(&lowered.as_str()) {
            continue;
        }
        let Some(color) = colors.try_parse(candidate) else {
            continue;
        };
        parts.push(ShadowPart::Literal(value.get(cursor..range.start).unwrap_or_default().to_owned()));
        parts.push(ShadowPart::Color(color));
        cursor = range.end;
    }
    if parts.is_empty() {
        return None;
    }
    parts.push(ShadowPart::Literal(value.get(cursor..).unwrap_or_default().to_owned()));
    Some(Modifier::Shadow(parts))
}

/// Decide how a declaration is themed. `None` leaves it untouched.
///
/// `base` resolves relative `url()` references: the sheet URL for linked
/// sheets, the document URL otherwise.
pub fn get_modifiable_declaration(
    property: &str,
    value: &str,
    base: &Url,
    colors: &ColorCache,
) -> Option<ModifiableDeclaration> {
    let modifier = match transform_kind(property)? {
        TransformKind::Color => color_modifier(property, value, colors),
        TransformKind::BackgroundImage => parse_composite(value, base, colors).map(Modifier::BackgroundImage),
        TransformKind::Shadow => shadow_modifier(value, colors),
    }?;
    Some(ModifiableDeclaration {
        property: property.to_owned(),
        modifier,
    })
}

const WHITE: Rgba = Rgba::opaque(255, 255, 255);
const BLACK: Rgba = Rgba::opaque(0, 0, 0);

/// Baseline colors for form controls and tables, always emitted first.
pub fn user_agent_style(config: &FilterConfig, colors: &ColorCache) -> String {
    let background = |color| colors.modify(color, config, RemapKind::Background);
    let border = |color| colors.modify(color, config, RemapKind::Border);
    let foreground = |color| colors.modify(color, config, RemapKind::Foreground);
    [
        "html, body, input, textarea, select, button {".to_owned(),
        format!("    background-color: {} !important;", background(WHITE)),
        format!("    border-color: {} !important;", border(Rgba::opaque(76, 76, 76))),
        format!("    color: {} !important;", foreground(BLACK)),
        "}".to_owned(),
        "table {".to_owned(),
        format!("    border-color: {} !important;", border(Rgba::opaque(128, 128, 128))),
        "}".to_owned(),
        "::placeholder {".to_owned(),
        format!("    color: {} !important;", foreground(Rgba::opaque(169, 169, 169))),
        "}".to_owned(),
    ]
    .join("\n")
}

/// Shown next to a cross-origin sheet until its readable copy is in place.
pub fn fallback_style(config: &FilterConfig, colors: &ColorCache) -> String {
    [
        "html *, body * {".to_owned(),
        format!(
            "    background-color: {} !important;",
            colors.modify(WHITE, config, RemapKind::Background)
        ),
        format!("    color: {} !important;", colors.modify(BLACK, config, RemapKind::Foreground)),
        "}".to_owned(),
    ]
    .join("\n")
}

/// Static dark block for hosts that prefer a dark scheme, used before the
/// first theme is assembled.
#[must_use]
pub const fn prerender_fallback_style() -> &'static str {
    "html, body, body :not(iframe) { background-color: #181a1b !important; border-color: #776e62 !important; color: #e8e6e3 !important; }"
}
