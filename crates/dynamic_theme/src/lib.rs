//! Dynamic dark theme engine.
//!
//! Reads a document's style sheets, rewrites every color- and image-bearing
//! declaration for a [`FilterConfig`] and injects the result as a generated
//! style sheet that is kept up to date as the document changes.

pub mod api;
pub mod assembler;
pub mod composite;
pub mod config;
mod error;
pub mod host;
pub mod images;
pub mod modifier;
pub mod rule_cache;
pub mod scheduler;
mod session;
pub mod test_support;

pub use api::ThemeController;
pub use config::{EngineConfig, ThemeOptions};
pub use css_color::{FilterConfig, ThemeMode};
pub use error::ThemeError;
pub use host::{
    CssRule, FetchRequest, NodeKey, NodeKind, ResourceFetcher, ResponseType, RuleId, StyleDocument, StyleMutation,
    StyleNode, StyleRole, StyleSheet,
};
pub use modifier::{ModifiableDeclaration, Modifier, get_modifiable_declaration};
pub use rule_cache::{ModifiableRule, RuleCache};
pub use scheduler::DynamicTheme;
pub use session::Session;
