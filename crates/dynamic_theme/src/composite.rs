//! `background-image` values: literal spans, gradients and `url()` images.

use crate::images::ImageValue;
use crate::modifier::{ModifiedValue, ThemeContext};
use css_color::{ColorCache, FilterConfig, RemapKind, Rgba};
use css_syntax::values::{ValueSpanKind, css_url_value, find_image_spans, parse_gradient, url_argument};
use futures::FutureExt as _;
use futures::future::{LocalBoxFuture, join_all};
use log::debug;
use url::Url;

#[derive(Clone, Debug, PartialEq)]
pub enum GradientStop {
    Color(Rgba),
    /// A color followed by its position, e.g. `red 40%`.
    ColorAt(Rgba, String),
    /// Angles, directions, shapes and anything unparseable.
    Literal(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    Literal(String),
    Gradient { name: String, stops: Vec<GradientStop> },
    Url { original: String, url: Url },
}

/// An ordered list of segments whose outputs are concatenated.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeValue {
    segments: Vec<Segment>,
}

fn parse_stop(text: &str, colors: &ColorCache) -> GradientStop {
    if let Some(color) = colors.try_parse(text) {
        return GradientStop::Color(color);
    }
    if let Some(space) = text.rfind(' ')
        && let (Some(color_text), Some(position)) = (text.get(..space), text.get(space + 1..))
        && let Some(color) = colors.try_parse(color_text)
    {
        return GradientStop::ColorAt(color, position.to_owned());
    }
    GradientStop::Literal(text.to_owned())
}

fn gradient_segment(text: &str, colors: &ColorCache) -> Segment {
    parse_gradient(text).map_or_else(
        || Segment::Literal(text.to_owned()),
        |parts| Segment::Gradient {
            name: parts.name.to_owned(),
            stops: parts.args.iter().map(|arg| parse_stop(arg, colors)).collect(),
        },
    )
}

fn url_segment(text: &str, base: &Url) -> Segment {
    let resolved = url_argument(text).and_then(|argument| base.join(&argument).ok());
    match resolved {
        Some(url) => Segment::Url {
            original: text.to_owned(),
            url,
        },
        None => {
            debug!("leaving unresolvable {text} untouched");
            Segment::Literal(text.to_owned())
        }
    }
}

/// Split a value into segments; `None` when it has no gradient or image.
pub fn parse_composite(value: &str, base: &Url, colors: &ColorCache) -> Option<CompositeValue> {
    let spans = find_image_spans(value);
    if spans.is_empty() {
        return None;
    }
    let mut segments = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = 0;
    for span in spans {
        let prefix = value.get(cursor..span.start).unwrap_or_default();
        if !prefix.is_empty() {
            segments.push(Segment::Literal(prefix.to_owned()));
        }
        let text = value.get(span.start..span.end).unwrap_or_default();
        segments.push(match span.kind {
            ValueSpanKind::Gradient => gradient_segment(text, colors),
            ValueSpanKind::Url => url_segment(text, base),
        });
        cursor = span.end;
    }
    let tail = value.get(cursor..).unwrap_or_default();
    if !tail.is_empty() {
        segments.push(Segment::Literal(tail.to_owned()));
    }
    Some(CompositeValue { segments })
}

fn render_image(value: &ImageValue, original: &str) -> String {
    match value {
        ImageValue::Unchanged => original.to_owned(),
        ImageValue::Hidden => "none".to_owned(),
        ImageValue::Filtered(data_url) => css_url_value(data_url),
    }
}

enum Part {
    Ready(String),
    Waiting(LocalBoxFuture<'static, Option<String>>),
}

impl CompositeValue {
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn evaluate_segment(segment: &Segment, config: &FilterConfig, context: &ThemeContext) -> Part {
        match segment {
            Segment::Literal(text) => Part::Ready(text.clone()),
            Segment::Gradient { name, stops } => {
                let modify = |color: &Rgba| context.colors.modify(*color, config, RemapKind::Background);
                let rendered: Vec<String> = stops
                    .iter()
                    .map(|stop| match stop {
                        GradientStop::Color(color) => modify(color),
                        GradientStop::ColorAt(color, position) => format!("{} {position}", modify(color)),
                        GradientStop::Literal(text) => text.clone(),
                    })
                    .collect();
                Part::Ready(format!("{name}({})", rendered.join(", ")))
            }
            Segment::Url { original, url } => {
                if !config.is_dark() || !context.analyze_images {
                    return Part::Ready(original.clone());
                }
                if let Some(known) = context.images.cached_value(url, config) {
                    return Part::Ready(render_image(&known, original));
                }
                let original = original.clone();
                Part::Waiting(
                    context
                        .images
                        .resolve(url.clone(), *config)
                        .map(move |resolved| resolved.map(|value| render_image(&value, &original)))
                        .boxed_local(),
                )
            }
        }
    }

    /// Evaluate every segment; suspends only if some image is still loading.
    pub fn evaluate(&self, config: &FilterConfig, context: &ThemeContext) -> ModifiedValue {
        let parts: Vec<Part> = self
            .segments
            .iter()
            .map(|segment| Self::evaluate_segment(segment, config, context))
            .collect();
        if parts.iter().all(|part| matches!(part, Part::Ready(_))) {
            let joined = parts
                .into_iter()
                .filter_map(|part| match part {
                    Part::Ready(text) => Some(text),
                    Part::Waiting(_) => None,
                })
                .collect();
            return ModifiedValue::Immediate(joined);
        }

        let session = context.session.clone();
        let pending = parts.into_iter().map(|part| match part {
            Part::Ready(text) => futures::future::ready(Some(text)).boxed_local(),
            Part::Waiting(future) => future,
        });
        let joined = join_all(pending);
        ModifiedValue::Deferred(
            async move {
                let results = joined.await;
                if !session.is_watching() {
                    return None;
                }
                results.into_iter().collect::<Option<Vec<String>>>().map(|texts| texts.concat())
            }
            .boxed_local(),
        )
    }
}
