//! Theme lifecycle: activation, rebuilds on structural change, deferred
//! patches and cross-origin sheet replacement.

use crate::assembler::{CollectedRules, assemble, collect_rules, patch_text};
use crate::host::{FetchRequest, NodeKey, ResourceFetcher, ResponseType, RuleId, StyleDocument, StyleMutation, StyleRole};
use crate::images::ImageStore;
use crate::modifier::{ThemeContext, fallback_style};
use crate::rule_cache::RuleCache;
use crate::{EngineConfig, Session};
use core::cell::RefCell;
use css_color::{ColorCache, FilterConfig};
use css_syntax::format_css;
use css_syntax::values::{rewrite_urls, strip_font_faces};
use futures::FutureExt as _;
use futures::StreamExt as _;
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::info_span;
use url::Url;

enum ThemeState {
    Inactive,
    /// Activation requested before the document had a head.
    AwaitingHead(FilterConfig),
    Active {
        config: FilterConfig,
        context: ThemeContext,
    },
}

/// A dynamic theme bound to one document.
///
/// Asynchronous work (image analysis, sheet fetches, patches) is queued
/// internally and makes progress when [`DynamicTheme::settle`] or
/// [`DynamicTheme::run_ready`] is driven by the host's event loop.
pub struct DynamicTheme<D: StyleDocument> {
    document: Rc<RefCell<D>>,
    fetcher: Rc<dyn ResourceFetcher>,
    engine: EngineConfig,
    rules: RuleCache,
    state: ThemeState,
    loading_styles: HashSet<NodeKey>,
    link_subscriptions: Vec<NodeKey>,
    observing: bool,
    tasks: FuturesUnordered<LocalBoxFuture<'static, ()>>,
    last_css: Option<String>,
}

impl<D: StyleDocument + 'static> DynamicTheme<D> {
    pub fn new(document: Rc<RefCell<D>>, fetcher: Rc<dyn ResourceFetcher>, engine: EngineConfig) -> Self {
        Self {
            document,
            fetcher,
            engine,
            rules: RuleCache::new(),
            state: ThemeState::Inactive,
            loading_styles: HashSet::new(),
            link_subscriptions: Vec::new(),
            observing: false,
            tasks: FuturesUnordered::new(),
            last_css: None,
        }
    }

    /// The themed document.
    #[must_use]
    pub const fn document(&self) -> &Rc<RefCell<D>> {
        &self.document
    }

    /// Activate the theme with `config`, or rebuild it if already active.
    /// Without a head the activation waits for [`Self::handle_head_ready`];
    /// a running theme is removed first.
    pub fn create_or_update(&mut self, config: FilterConfig) {
        if !self.document.borrow().has_head() {
            debug!("document has no head yet, deferring theme");
            if self.is_active() {
                self.remove();
            }
            self.state = ThemeState::AwaitingHead(config);
            return;
        }
        let state = core::mem::replace(&mut self.state, ThemeState::Inactive);
        let context = match state {
            ThemeState::Active { context, .. } => context,
            ThemeState::Inactive | ThemeState::AwaitingHead(_) => self.new_context(),
        };
        self.state = ThemeState::Active { config, context };
        self.rebuild();
        self.watch_for_links_loading();
        self.observe_mutations();
    }

    fn new_context(&self) -> ThemeContext {
        let session = Session::new();
        ThemeContext {
            images: ImageStore::new(Rc::clone(&self.fetcher), session.clone(), &self.engine),
            session,
            colors: Rc::new(ColorCache::new()),
            analyze_images: self.engine.analyze_images,
        }
    }

    pub fn handle_head_ready(&mut self) {
        if let ThemeState::AwaitingHead(config) = self.state {
            self.create_or_update(config);
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, ThemeState::Active { .. })
    }

    /// The profile of the running theme.
    #[must_use]
    pub const fn config(&self) -> Option<&FilterConfig> {
        match &self.state {
            ThemeState::Active { config, .. } => Some(config),
            ThemeState::Inactive | ThemeState::AwaitingHead(_) => None,
        }
    }

    /// Text most recently written to the theme container.
    #[must_use]
    pub fn generated_css(&self) -> Option<&str> {
        self.last_css.as_deref()
    }

    #[must_use]
    pub const fn rule_cache(&self) -> &RuleCache {
        &self.rules
    }

    /// Image store of the running session.
    #[must_use]
    pub fn image_store(&self) -> Option<&ImageStore> {
        match &self.state {
            ThemeState::Active { context, .. } => Some(&context.images),
            ThemeState::Inactive | ThemeState::AwaitingHead(_) => None,
        }
    }

    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    fn rebuild(&mut self) {
        let ThemeState::Active { config, context } = &self.state else {
            return;
        };
        let generation = context.session.advance();
        let _span = info_span!("rebuild_theme", generation).entered();

        let (sheets, base) = {
            let document = self.document.borrow();
            (document.style_sheets(), document.base_url())
        };
        let CollectedRules { rules, unreadable } =
            collect_rules(sheets, &base, &self.loading_styles, &mut self.rules, &context.colors);
        let assembled = assemble(&rules, config, context);
        let text = if self.engine.debug_css {
            format_css(&assembled.text)
        } else {
            assembled.text
        };

        {
            let mut document = self.document.borrow_mut();
            let container = match document.tagged_nodes(StyleRole::Theme).first() {
                Some(existing) => *existing,
                None => document.create_style(StyleRole::Theme, "", None),
            };
            document.set_style_text(container, &text);
            document.move_to_end(container);
            for stale in document.tagged_nodes(StyleRole::Patch) {
                document.remove_node(stale);
            }
        }
        info!("theme rebuilt: {} rules, {} pending", rules.len(), assembled.patches.len());
        self.last_css = Some(text);

        for patch in assembled.patches {
            let document = Rc::clone(&self.document);
            let session = context.session.clone();
            self.tasks.push(
                async move {
                    let Some(value) = patch.value.await else {
                        return;
                    };
                    if !session.is_current(generation) {
                        debug!("dropping patch for {} from superseded rebuild", patch.selector_text);
                        return;
                    }
                    let text = patch_text(&patch.selector_text, &patch.media, &patch.property, &value);
                    document.borrow_mut().create_style(StyleRole::Patch, &text, None);
                }
                .boxed_local(),
            );
        }

        let (config, context) = (*config, context.clone());
        for (link, href) in unreadable {
            self.replace_cors_style(link, href, &config, &context);
        }
    }

    /// Show the fallback block and fetch a readable copy of a linked sheet.
    fn replace_cors_style(&mut self, link: NodeKey, href: Url, config: &FilterConfig, context: &ThemeContext) {
        self.loading_styles.insert(link);
        let fallback = self
            .document
            .borrow_mut()
            .create_style(StyleRole::Fallback, &fallback_style(config, &context.colors), Some(link));

        let request = FetchRequest {
            url: href.clone(),
            response_type: ResponseType::Text,
            mime_type: Some("text/css".to_owned()),
        };
        let response = self.fetcher.fetch(request);
        let document = Rc::clone(&self.document);
        let session = context.session.clone();
        self.tasks.push(
            async move {
                let text = match response.await {
                    Ok(text) => text,
                    Err(error) => {
                        warn!("Unable to fetch stylesheet {href}: {error:#}");
                        return;
                    }
                };
                if !session.is_watching() {
                    return;
                }
                let stripped = strip_font_faces(&text);
                let rewritten = rewrite_urls(&stripped, |relative| {
                    href.join(relative)
                        .map_or_else(|_| relative.to_owned(), String::from)
                });
                let css = rewritten.trim();
                if css.is_empty() {
                    return;
                }
                let mut document = document.borrow_mut();
                let replacement = document.create_style(StyleRole::Replacement, css, Some(link));
                document.set_data_attribute(replacement, "uri", href.as_str());
                document.remove_node(fallback);
                debug!("replaced cross-origin stylesheet {href}");
            }
            .boxed_local(),
        );
    }

    fn watch_for_links_loading(&mut self) {
        self.stop_watching_for_links_loading();
        let mut document = self.document.borrow_mut();
        for link in document.stylesheet_links() {
            document.subscribe_link_load(link);
            self.link_subscriptions.push(link);
        }
    }

    fn stop_watching_for_links_loading(&mut self) {
        let mut document = self.document.borrow_mut();
        for link in self.link_subscriptions.drain(..) {
            document.unsubscribe_link_load(link);
        }
    }

    fn observe_mutations(&mut self) {
        let mut document = self.document.borrow_mut();
        if self.observing {
            document.disconnect_style_mutations();
        }
        document.observe_style_mutations();
        self.observing = true;
    }

    fn stop_observing_mutations(&mut self) {
        if self.observing {
            self.document.borrow_mut().disconnect_style_mutations();
            self.observing = false;
        }
    }

    /// React to mutation records; rebuilds once if any touches an author
    /// style source.
    pub fn handle_mutations(&mut self, mutations: &[StyleMutation]) {
        if !self.is_active() || !mutations.iter().any(StyleMutation::affects_styles) {
            return;
        }
        debug!("style sources changed, rebuilding");
        self.rebuild();
        self.watch_for_links_loading();
    }

    /// A watched stylesheet link finished loading.
    pub fn handle_link_load(&mut self, link: NodeKey) {
        let ThemeState::Active { context, .. } = &self.state else {
            return;
        };
        if context.session.is_watching() && self.link_subscriptions.contains(&link) {
            self.rebuild();
        }
    }

    /// The host dropped these rules; their cache entries go too.
    pub fn handle_rules_removed(&mut self, ids: &[RuleId]) {
        self.rules.forget(ids);
    }

    /// Remove every generated node and stop reacting to the document.
    pub fn remove(&mut self) {
        {
            let mut document = self.document.borrow_mut();
            for role in StyleRole::GENERATED {
                for node in document.tagged_nodes(role) {
                    document.remove_node(node);
                }
            }
        }
        self.stop_session();
        self.stop_observing_mutations();
        self.stop_watching_for_links_loading();
        self.last_css = None;
        info!("theme removed");
    }

    /// Stop watching and drop every cache, the rule cache included.
    pub fn clean_cache(&mut self) {
        self.stop_session();
        self.stop_observing_mutations();
        self.stop_watching_for_links_loading();
        self.rules.clear();
    }

    fn stop_session(&mut self) {
        if let ThemeState::Active { context, .. } = &self.state {
            context.session.stop();
            context.images.clear();
            context.colors.clear();
        }
        self.state = ThemeState::Inactive;
    }

    /// Poll queued work once without waiting.
    pub fn run_ready(&mut self) {
        while let Some(Some(())) = self.tasks.next().now_or_never() {}
    }

    /// Drive queued work until none is left.
    pub async fn settle(&mut self) {
        while self.tasks.next().await.is_some() {}
    }
}
