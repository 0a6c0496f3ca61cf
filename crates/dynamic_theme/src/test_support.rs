//! In-memory host document and fetcher, shared by unit and integration tests.

use crate::host::{
    CssRule, FetchRequest, NodeKey, NodeKind, ResourceFetcher, RuleId, StyleDocument, StyleMutation, StyleNode,
    StyleRole, StyleSheet,
};
use crate::ThemeError;
use anyhow::{Result, anyhow};
use bytes::Bytes;
use core::cell::RefCell;
use futures::FutureExt as _;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use image::{ImageEncoder as _, RgbaImage};
use log::debug;
use std::collections::HashMap;
use url::Url;

#[derive(Debug)]
struct MemoryNode {
    key: NodeKey,
    kind: NodeKind,
    role: Option<StyleRole>,
    id: Option<String>,
    classes: Vec<String>,
    href: Option<Url>,
    cross_origin: bool,
    text: String,
    rules: Vec<CssRule>,
    data: HashMap<String, String>,
}

impl MemoryNode {
    fn style_node(&self) -> StyleNode {
        StyleNode {
            node: self.key,
            kind: self.kind,
            id: self.id.clone(),
            classes: self.classes.clone(),
        }
    }
}

/// A document head holding `<style>` and `<link>` nodes in order.
///
/// Rules get fresh [`RuleId`]s whenever a node's text is (re)parsed, the way
/// a browser creates new rule objects.
#[derive(Debug)]
pub struct MemoryDocument {
    base_url: Url,
    has_head: bool,
    prefers_dark: bool,
    nodes: Vec<MemoryNode>,
    next_node: u64,
    next_rule: u64,
    observing: bool,
    link_listeners: Vec<NodeKey>,
    mutations: Vec<StyleMutation>,
    revision: u64,
}

fn convert_rules(rules: Vec<css_syntax::CssRule>, next_rule: &mut u64) -> Vec<CssRule> {
    rules
        .into_iter()
        .map(|rule| match rule {
            css_syntax::CssRule::Style(style) => {
                *next_rule += 1;
                CssRule::Style {
                    id: RuleId(*next_rule),
                    selector_text: style.prelude,
                    declarations: style.declarations,
                }
            }
            css_syntax::CssRule::Media { condition, rules } => CssRule::Media {
                media_text: condition,
                rules: convert_rules(rules, next_rule),
            },
            css_syntax::CssRule::Supports { rules, .. } => CssRule::Supports {
                rules: convert_rules(rules, next_rule),
            },
        })
        .collect()
}

impl MemoryDocument {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            has_head: true,
            prefers_dark: false,
            nodes: Vec::new(),
            next_node: 0,
            next_rule: 0,
            observing: false,
            link_listeners: Vec::new(),
            mutations: Vec::new(),
            revision: 0,
        }
    }

    #[must_use]
    pub fn without_head(mut self) -> Self {
        self.has_head = false;
        self
    }

    #[must_use]
    pub const fn with_dark_preference(mut self, prefers_dark: bool) -> Self {
        self.prefers_dark = prefers_dark;
        self
    }

    pub fn insert_head(&mut self) {
        self.has_head = true;
    }

    pub fn remove_head(&mut self) {
        self.has_head = false;
    }

    fn parse(&mut self, css: &str) -> Vec<CssRule> {
        convert_rules(css_syntax::parse_stylesheet(css).rules, &mut self.next_rule)
    }

    fn record(&mut self, mutation: StyleMutation) {
        self.revision += 1;
        if self.observing {
            self.mutations.push(mutation);
        }
    }

    fn insert(&mut self, mut node: MemoryNode, after: Option<NodeKey>) -> NodeKey {
        self.next_node += 1;
        node.key = NodeKey(self.next_node);
        let key = node.key;
        let added = node.style_node();
        let position = after
            .and_then(|anchor| self.position(anchor))
            .map_or(self.nodes.len(), |index| index + 1);
        self.nodes.insert(position, node);
        self.record(StyleMutation::ChildList {
            added: vec![added],
            removed: Vec::new(),
        });
        key
    }

    fn position(&self, key: NodeKey) -> Option<usize> {
        self.nodes.iter().position(|node| node.key == key)
    }

    fn node(&self, key: NodeKey) -> Option<&MemoryNode> {
        self.nodes.iter().find(|node| node.key == key)
    }

    fn blank(kind: NodeKind) -> MemoryNode {
        MemoryNode {
            key: NodeKey(0),
            kind,
            role: None,
            id: None,
            classes: Vec::new(),
            href: None,
            cross_origin: false,
            text: String::new(),
            rules: Vec::new(),
            data: HashMap::new(),
        }
    }

    /// Append an author `<style>`.
    pub fn add_style(&mut self, css: &str) -> NodeKey {
        let mut node = Self::blank(NodeKind::Style);
        node.text = css.to_owned();
        node.rules = self.parse(css);
        self.insert(node, None)
    }

    /// Append a readable `<link rel="stylesheet">`.
    pub fn add_link(&mut self, href: Url, css: &str) -> NodeKey {
        let mut node = Self::blank(NodeKind::StylesheetLink);
        node.href = Some(href);
        node.text = css.to_owned();
        node.rules = self.parse(css);
        self.insert(node, None)
    }

    /// Append a link whose rules cannot be read.
    pub fn add_cross_origin_link(&mut self, href: Url) -> NodeKey {
        let mut node = Self::blank(NodeKind::StylesheetLink);
        node.href = Some(href);
        node.cross_origin = true;
        self.insert(node, None)
    }

    /// Append a node that is not a style source.
    pub fn add_other(&mut self) -> NodeKey {
        self.insert(Self::blank(NodeKind::Other), None)
    }

    /// Change an attribute of a node without changing its rules.
    pub fn touch_attribute(&mut self, key: NodeKey, name: &str) {
        if let Some(target) = self.node(key).map(MemoryNode::style_node) {
            self.record(StyleMutation::Attribute {
                target,
                name: name.to_owned(),
            });
        }
    }

    /// Mutation records since the last call, as an observer would see them.
    pub fn take_mutations(&mut self) -> Vec<StyleMutation> {
        core::mem::take(&mut self.mutations)
    }

    /// Incremented by every change to the document.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub const fn is_observing(&self) -> bool {
        self.observing
    }

    /// How many `load` listeners are attached to `link`.
    #[must_use]
    pub fn link_listener_count(&self, link: NodeKey) -> usize {
        self.link_listeners.iter().filter(|listener| **listener == link).count()
    }

    #[must_use]
    pub fn text(&self, key: NodeKey) -> Option<&str> {
        self.node(key).map(|node| node.text.as_str())
    }

    #[must_use]
    pub fn data_attribute(&self, key: NodeKey, name: &str) -> Option<&str> {
        self.node(key).and_then(|node| node.data.get(name)).map(String::as_str)
    }

    /// Texts of nodes with `role`, in document order.
    #[must_use]
    pub fn texts(&self, role: StyleRole) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|node| node.role == Some(role))
            .map(|node| node.text.as_str())
            .collect()
    }

    #[must_use]
    pub fn theme_text(&self) -> Option<&str> {
        self.texts(StyleRole::Theme).first().copied()
    }

    #[must_use]
    pub fn patch_texts(&self) -> Vec<&str> {
        self.texts(StyleRole::Patch)
    }

    /// Node keys in document order.
    #[must_use]
    pub fn order(&self) -> Vec<NodeKey> {
        self.nodes.iter().map(|node| node.key).collect()
    }

    /// Ids of the style rules of a node, depth-first.
    #[must_use]
    pub fn rule_ids(&self, key: NodeKey) -> Vec<RuleId> {
        fn walk(rules: &[CssRule], out: &mut Vec<RuleId>) {
            for rule in rules {
                match rule {
                    CssRule::Style { id, .. } => out.push(*id),
                    CssRule::Media { rules, .. } | CssRule::Supports { rules } => walk(rules, out),
                }
            }
        }
        let mut ids = Vec::new();
        if let Some(node) = self.node(key) {
            walk(&node.rules, &mut ids);
        }
        ids
    }
}

impl StyleDocument for MemoryDocument {
    fn has_head(&self) -> bool {
        self.has_head
    }

    fn base_url(&self) -> Url {
        self.base_url.clone()
    }

    fn prefers_dark_color_scheme(&self) -> bool {
        self.prefers_dark
    }

    fn style_sheets(&self) -> Vec<StyleSheet> {
        self.nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::Style | NodeKind::StylesheetLink))
            .map(|node| StyleSheet {
                owner: node.style_node(),
                href: node.href.clone(),
                rules: if node.cross_origin {
                    Err(ThemeError::CrossOriginAccess {
                        href: node.href.as_ref().map(Url::to_string),
                    })
                } else {
                    Ok(node.rules.clone())
                },
            })
            .collect()
    }

    fn stylesheet_links(&self) -> Vec<NodeKey> {
        self.nodes
            .iter()
            .filter(|node| node.kind == NodeKind::StylesheetLink)
            .map(|node| node.key)
            .collect()
    }

    fn create_style(&mut self, role: StyleRole, text: &str, after: Option<NodeKey>) -> NodeKey {
        let mut node = Self::blank(NodeKind::Style);
        node.role = Some(role);
        node.id = role.id().map(str::to_owned);
        node.classes = role.classes().iter().map(|class| (*class).to_owned()).collect();
        node.text = text.to_owned();
        node.rules = self.parse(text);
        self.insert(node, after)
    }

    fn set_style_text(&mut self, key: NodeKey, text: &str) {
        let rules = self.parse(text);
        if let Some(index) = self.position(key) {
            self.nodes[index].text = text.to_owned();
            self.nodes[index].rules = rules;
            self.revision += 1;
        }
    }

    fn set_data_attribute(&mut self, key: NodeKey, name: &str, value: &str) {
        if let Some(index) = self.position(key) {
            self.nodes[index].data.insert(name.to_owned(), value.to_owned());
            self.revision += 1;
        }
    }

    fn move_to_end(&mut self, key: NodeKey) {
        if let Some(index) = self.position(key) {
            let node = self.nodes.remove(index);
            let moved = node.style_node();
            self.nodes.push(node);
            self.record(StyleMutation::ChildList {
                added: vec![moved.clone()],
                removed: vec![moved],
            });
        }
    }

    fn remove_node(&mut self, key: NodeKey) {
        if let Some(index) = self.position(key) {
            let removed = self.nodes.remove(index).style_node();
            self.record(StyleMutation::ChildList {
                added: Vec::new(),
                removed: vec![removed],
            });
        }
    }

    fn tagged_nodes(&self, role: StyleRole) -> Vec<NodeKey> {
        self.nodes
            .iter()
            .filter(|node| node.role == Some(role))
            .map(|node| node.key)
            .collect()
    }

    fn observe_style_mutations(&mut self) {
        self.observing = true;
    }

    fn disconnect_style_mutations(&mut self) {
        self.observing = false;
    }

    fn subscribe_link_load(&mut self, link: NodeKey) {
        self.link_listeners.push(link);
    }

    fn unsubscribe_link_load(&mut self, link: NodeKey) {
        if let Some(index) = self.link_listeners.iter().position(|listener| *listener == link) {
            self.link_listeners.remove(index);
        }
    }
}

#[derive(Default)]
struct FetcherState {
    direct: HashMap<Url, Bytes>,
    background: HashMap<Url, String>,
    load_gates: HashMap<Url, oneshot::Receiver<()>>,
    fetch_gates: HashMap<Url, oneshot::Receiver<()>>,
    load_calls: Vec<Url>,
    fetch_calls: Vec<FetchRequest>,
}

/// Serves canned responses; each URL can be held back until released.
#[derive(Default)]
pub struct MemoryFetcher {
    state: RefCell<FetcherState>,
}

async fn wait_for(gate: Option<oneshot::Receiver<()>>) {
    if let Some(gate) = gate
        && gate.await.is_err()
    {
        debug!("gate dropped without release");
    }
}

impl MemoryFetcher {
    /// Answer direct loads of `url`.
    pub fn serve(&self, url: &Url, bytes: impl Into<Bytes>) {
        self.state.borrow_mut().direct.insert(url.clone(), bytes.into());
    }

    /// Answer background fetches of `url`.
    pub fn serve_background(&self, url: &Url, body: impl Into<String>) {
        self.state.borrow_mut().background.insert(url.clone(), body.into());
    }

    /// Hold the next direct load of `url` until the sender fires.
    pub fn gate_load(&self, url: &Url) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.state.borrow_mut().load_gates.insert(url.clone(), receiver);
        sender
    }

    /// Hold the next background fetch of `url` until the sender fires.
    pub fn gate_fetch(&self, url: &Url) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.state.borrow_mut().fetch_gates.insert(url.clone(), receiver);
        sender
    }

    #[must_use]
    pub fn load_calls(&self, url: &Url) -> usize {
        self.state.borrow().load_calls.iter().filter(|called| *called == url).count()
    }

    #[must_use]
    pub fn fetch_calls(&self) -> Vec<FetchRequest> {
        self.state.borrow().fetch_calls.clone()
    }
}

impl ResourceFetcher for MemoryFetcher {
    fn load(&self, url: &Url) -> LocalBoxFuture<'static, Result<Bytes>> {
        let mut state = self.state.borrow_mut();
        state.load_calls.push(url.clone());
        let response = state
            .direct
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("{url} failed to load"));
        let gate = state.load_gates.remove(url);
        async move {
            wait_for(gate).await;
            response
        }
        .boxed_local()
    }

    fn fetch(&self, request: FetchRequest) -> LocalBoxFuture<'static, Result<String>> {
        let mut state = self.state.borrow_mut();
        let response = state
            .background
            .get(&request.url)
            .cloned()
            .ok_or_else(|| anyhow!("background fetch of {} failed", request.url));
        let gate = state.fetch_gates.remove(&request.url);
        state.fetch_calls.push(request);
        async move {
            wait_for(gate).await;
            response
        }
        .boxed_local()
    }
}

/// PNG bytes of a single-color image.
///
/// # Errors
/// Propagates encoder failures.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Result<Vec<u8>> {
    let image = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        width,
        height,
        image::ColorType::Rgba8.into(),
    )?;
    Ok(buf)
}

/// A `data:` URL of a single-color PNG.
///
/// # Errors
/// Propagates encoder failures.
pub fn solid_png_data_url(width: u32, height: u32, rgba: [u8; 4]) -> Result<String> {
    Ok(css_images::encode_data_url("image/png", &solid_png(width, height, rgba)?))
}
