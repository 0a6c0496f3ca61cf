//! Interfaces to the document being themed and to the resource fetcher.
//!
//! The engine never owns the document. It reads style sheets, writes its own
//! `<style>` nodes and is told about structural changes through the
//! `handle_*` methods of [`crate::DynamicTheme`].

use crate::ThemeError;
use bytes::Bytes;
use futures::future::LocalBoxFuture;
use url::Url;

/// Stable identity of a node in the host document.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeKey(pub u64);

/// Stable identity of a style rule, assigned by the host on first sight and
/// kept for as long as the rule object lives.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RuleId(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeKind {
    /// `<style>`
    Style,
    /// `<link rel="stylesheet">`
    StylesheetLink,
    Other,
}

/// Id of the single generated theme container.
pub const THEME_STYLE_ID: &str = "dynamic-theme-style";
/// Class carried by every node the engine generates.
pub const GENERATED_CLASS: &str = "dynamic-theme-style";

/// The nodes the engine inserts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StyleRole {
    /// The assembled theme.
    Theme,
    /// A late-resolved declaration.
    Patch,
    /// Generic rule shown while a cross-origin sheet is being fetched.
    Fallback,
    /// Static dark block shown before the first theme exists.
    Prerender,
    /// Readable copy of a cross-origin sheet. Not tagged as generated, so
    /// it is themed like any author sheet.
    Replacement,
}

impl StyleRole {
    #[must_use]
    pub const fn id(self) -> Option<&'static str> {
        match self {
            Self::Theme => Some(THEME_STYLE_ID),
            _ => None,
        }
    }

    #[must_use]
    pub const fn classes(self) -> &'static [&'static str] {
        match self {
            Self::Theme | Self::Replacement => &[],
            Self::Patch => &[GENERATED_CLASS, "dynamic-theme-style--async"],
            Self::Fallback => &[GENERATED_CLASS, "dynamic-theme-style--fallback"],
            Self::Prerender => &[GENERATED_CLASS, "dynamic-theme-style--prerender"],
        }
    }

    /// Roles removed when the theme is torn down.
    pub const GENERATED: [Self; 4] = [Self::Theme, Self::Patch, Self::Fallback, Self::Prerender];
}

/// Identifying attributes of a style-bearing node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StyleNode {
    pub node: NodeKey,
    pub kind: NodeKind,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl StyleNode {
    /// Whether the engine itself created this node.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.id.as_deref() == Some(THEME_STYLE_ID) || self.classes.iter().any(|class| class == GENERATED_CLASS)
    }

    #[must_use]
    pub fn is_style_source(&self) -> bool {
        matches!(self.kind, NodeKind::Style | NodeKind::StylesheetLink)
    }
}

/// A rule as exposed by the host's CSSOM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CssRule {
    Style {
        id: RuleId,
        selector_text: String,
        declarations: Vec<css_syntax::Declaration>,
    },
    Media {
        media_text: String,
        rules: Vec<CssRule>,
    },
    Supports {
        rules: Vec<CssRule>,
    },
}

/// One entry of `document.styleSheets`.
#[derive(Debug)]
pub struct StyleSheet {
    pub owner: StyleNode,
    /// Absolute URL of a linked sheet; `None` for `<style>` elements.
    pub href: Option<Url>,
    /// [`ThemeError::CrossOriginAccess`] when the rules cannot be read.
    pub rules: Result<Vec<CssRule>, ThemeError>,
}

/// A structural change reported by the host's mutation observer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StyleMutation {
    ChildList {
        added: Vec<StyleNode>,
        removed: Vec<StyleNode>,
    },
    Attribute {
        target: StyleNode,
        name: String,
    },
}

const WATCHED_ATTRIBUTES: [&str; 4] = ["href", "media", "rel", "disabled"];

impl StyleMutation {
    /// Whether the change concerns an author style source.
    #[must_use]
    pub fn affects_styles(&self) -> bool {
        let relevant = |node: &StyleNode| node.is_style_source() && !node.is_generated();
        match self {
            Self::ChildList { added, removed } => added.iter().chain(removed).any(relevant),
            Self::Attribute { target, name } => {
                relevant(target) && WATCHED_ATTRIBUTES.iter().any(|watched| name.eq_ignore_ascii_case(watched))
            }
        }
    }
}

/// The document the theme is injected into.
pub trait StyleDocument {
    fn has_head(&self) -> bool;

    /// Base for resolving `url()` references in inline `<style>` sheets.
    fn base_url(&self) -> Url;

    /// Whether the host prefers a dark color scheme.
    fn prefers_dark_color_scheme(&self) -> bool {
        false
    }

    /// All style sheets in document order, generated ones included.
    fn style_sheets(&self) -> Vec<StyleSheet>;

    /// Every `<link rel="stylesheet">` currently in the document.
    fn stylesheet_links(&self) -> Vec<NodeKey>;

    /// Insert a `<style>` for `role`, after `after` or at the end of the head.
    fn create_style(&mut self, role: StyleRole, text: &str, after: Option<NodeKey>) -> NodeKey;

    fn set_style_text(&mut self, node: NodeKey, text: &str);

    fn set_data_attribute(&mut self, node: NodeKey, name: &str, value: &str);

    /// Move a node after every other style source.
    fn move_to_end(&mut self, node: NodeKey);

    fn remove_node(&mut self, node: NodeKey);

    /// Generated nodes with the given role, in document order.
    fn tagged_nodes(&self, role: StyleRole) -> Vec<NodeKey>;

    /// Start delivering [`StyleMutation`]s for the head.
    fn observe_style_mutations(&mut self);

    fn disconnect_style_mutations(&mut self);

    /// Start delivering `load` events of a stylesheet link.
    fn subscribe_link_load(&mut self, link: NodeKey);

    fn unsubscribe_link_load(&mut self, link: NodeKey);
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResponseType {
    DataUrl,
    Text,
}

/// A request to the privileged fetcher, which is not bound by CORS.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchRequest {
    pub url: Url,
    pub response_type: ResponseType,
    pub mime_type: Option<String>,
}

/// Network access used for images and unreadable sheets.
pub trait ResourceFetcher {
    /// Load a resource the way the page itself would.
    fn load(&self, url: &Url) -> LocalBoxFuture<'static, anyhow::Result<Bytes>>;

    /// Fetch through the background channel. `DataUrl` responses are
    /// `data:` URLs, `Text` responses the body text.
    fn fetch(&self, request: FetchRequest) -> LocalBoxFuture<'static, anyhow::Result<String>>;
}
