//! Public entry points for embedding the engine.

use crate::host::{NodeKey, StyleDocument, StyleRole};
use crate::modifier::prerender_fallback_style;
use crate::{DynamicTheme, ThemeOptions};
use css_syntax::format_css;
use log::debug;

/// Enables, disables and follows the host's color scheme.
pub struct ThemeController<D: StyleDocument> {
    theme: DynamicTheme<D>,
    enabled: bool,
    auto: Option<ThemeOptions>,
    prerender: Option<NodeKey>,
}

impl<D: StyleDocument + 'static> ThemeController<D> {
    pub const fn new(theme: DynamicTheme<D>) -> Self {
        Self {
            theme,
            enabled: false,
            auto: None,
            prerender: None,
        }
    }

    #[must_use]
    pub const fn theme(&self) -> &DynamicTheme<D> {
        &self.theme
    }

    pub const fn theme_mut(&mut self) -> &mut DynamicTheme<D> {
        &mut self.theme
    }

    /// Insert the static dark block if the host prefers a dark scheme and no
    /// theme is running yet.
    pub fn show_prerender_fallback(&mut self) {
        if self.enabled || self.prerender.is_some() {
            return;
        }
        let mut document = self.theme.document().borrow_mut();
        if document.prefers_dark_color_scheme() {
            self.prerender = Some(document.create_style(StyleRole::Prerender, prerender_fallback_style(), None));
        }
    }

    fn hide_prerender_fallback(&mut self) {
        if let Some(node) = self.prerender.take() {
            self.theme.document().borrow_mut().remove_node(node);
        }
    }

    /// Turn the theme on, leaving automatic mode.
    pub fn enable(&mut self, options: ThemeOptions) {
        self.auto = None;
        self.turn_on(options);
    }

    /// Turn the theme off, leaving automatic mode.
    pub fn disable(&mut self) {
        self.auto = None;
        self.turn_off();
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Follow the host's preferred color scheme with `options`, or stop
    /// following it (and disable) when `None`.
    pub fn auto(&mut self, options: Option<ThemeOptions>) {
        if let Some(options) = options {
            self.auto = Some(options);
            let prefers_dark = self.theme.document().borrow().prefers_dark_color_scheme();
            self.follow_scheme(prefers_dark);
        } else {
            self.auto = None;
            self.turn_off();
        }
    }

    /// The host's `prefers-color-scheme` changed.
    pub fn handle_color_scheme_change(&mut self, prefers_dark: bool) {
        self.follow_scheme(prefers_dark);
    }

    /// Head became available; finishes a deferred activation.
    pub fn handle_head_ready(&mut self) {
        self.theme.handle_head_ready();
        if self.theme.is_active() {
            self.hide_prerender_fallback();
        }
    }

    /// The generated sheet, pretty-printed.
    #[must_use]
    pub fn export_generated_css(&self) -> Option<String> {
        self.theme.generated_css().map(format_css)
    }

    fn follow_scheme(&mut self, prefers_dark: bool) {
        let Some(options) = self.auto else {
            return;
        };
        debug!("following color scheme, dark preferred: {prefers_dark}");
        if prefers_dark {
            self.turn_on(options);
        } else {
            self.turn_off();
        }
    }

    fn turn_on(&mut self, options: ThemeOptions) {
        self.enabled = true;
        self.theme.create_or_update(options.resolve());
        if self.theme.is_active() {
            self.hide_prerender_fallback();
        }
    }

    fn turn_off(&mut self) {
        self.enabled = false;
        self.hide_prerender_fallback();
        self.theme.remove();
    }
}
