mod common;

use common::{PAGE, harness, harness_with, url};
use dynamic_theme::test_support::MemoryDocument;
use dynamic_theme::{EngineConfig, FilterConfig, StyleDocument as _, StyleRole};

#[test]
fn activation_injects_theme_after_author_styles() {
    let mut h = harness();
    h.document.borrow_mut().add_style("body { color: black; background-color: white; margin: 0 }");
    h.document.borrow_mut().add_other();
    h.theme.create_or_update(FilterConfig::default());

    let text = h.theme_text().unwrap();
    assert!(text.starts_with("html, body, input, textarea, select, button {"));
    assert!(text.contains("\nbody {\n    color: #"));
    assert!(text.contains("    background-color: #"));
    assert!(!text.contains("margin"));

    let document = h.document.borrow();
    let theme_node = document.tagged_nodes(StyleRole::Theme)[0];
    assert_eq!(document.order().last(), Some(&theme_node));
    assert!(document.is_observing());
    assert!(h.theme.is_active());
}

#[test]
fn unchanged_rules_are_reused_across_rebuilds() {
    let mut h = harness();
    h.document.borrow_mut().add_style("body { color: black }");
    h.theme.create_or_update(FilterConfig::default());
    assert_eq!(h.theme.rule_cache().build_count(), 1);

    h.document
        .borrow_mut()
        .add_style(".x { background-color: red } .y { margin: 0 }");
    h.flush_mutations();

    assert_eq!(h.theme.rule_cache().build_count(), 3);
    let text = h.theme_text().unwrap();
    assert!(text.contains(".x {"));
    assert!(!text.contains(".y {"));

    h.theme.create_or_update(FilterConfig::default().with_sepia(40));
    assert_eq!(h.theme.rule_cache().build_count(), 3);
}

#[test]
fn generated_nodes_do_not_trigger_rebuilds() {
    let mut h = harness();
    h.document.borrow_mut().add_style("a { color: blue }");
    h.theme.create_or_update(FilterConfig::default());
    h.document.borrow_mut().add_style("b { color: red }");
    h.flush_mutations();

    let revision = h.revision();
    h.flush_mutations();
    assert_eq!(h.revision(), revision);

    let other = h.document.borrow_mut().add_other();
    h.flush_mutations();
    h.document.borrow_mut().touch_attribute(other, "href");
    h.flush_mutations();
    assert_eq!(h.revision(), revision + 2);
}

#[test]
fn attribute_changes_on_links_rebuild() {
    let mut h = harness();
    let link = h
        .document
        .borrow_mut()
        .add_link(url("https://example.com/site.css"), "a { color: blue }");
    h.theme.create_or_update(FilterConfig::default());

    let revision = h.revision();
    h.document.borrow_mut().touch_attribute(link, "title");
    h.flush_mutations();
    assert_eq!(h.revision(), revision + 1);

    h.document.borrow_mut().touch_attribute(link, "media");
    h.flush_mutations();
    assert!(h.revision() > revision + 1);
}

#[test]
fn link_listeners_are_not_duplicated() {
    let mut h = harness();
    let first = h
        .document
        .borrow_mut()
        .add_link(url("https://example.com/a.css"), "a { color: blue }");
    let second = h
        .document
        .borrow_mut()
        .add_link(url("https://example.com/b.css"), "b { color: red }");
    h.theme.create_or_update(FilterConfig::default());
    h.document.borrow_mut().add_style("i { color: green }");
    h.flush_mutations();
    h.theme.create_or_update(FilterConfig::default());

    let document = h.document.borrow();
    assert_eq!(document.link_listener_count(first), 1);
    assert_eq!(document.link_listener_count(second), 1);
}

#[test]
fn link_load_rebuilds_only_while_active() {
    let mut h = harness();
    let link = h
        .document
        .borrow_mut()
        .add_link(url("https://example.com/a.css"), "a { color: blue }");
    h.theme.create_or_update(FilterConfig::default());

    let revision = h.revision();
    h.theme.handle_link_load(link);
    assert!(h.revision() > revision);

    h.theme.remove();
    assert_eq!(h.document.borrow().link_listener_count(link), 0);
    let revision = h.revision();
    h.theme.handle_link_load(link);
    assert_eq!(h.revision(), revision);
}

#[test]
fn activation_waits_for_head() {
    let mut h = harness_with(MemoryDocument::new(url(PAGE)).without_head(), EngineConfig::default());
    h.theme.create_or_update(FilterConfig::default());
    assert!(!h.theme.is_active());
    assert!(h.theme_text().is_none());

    h.document.borrow_mut().insert_head();
    h.theme.handle_head_ready();
    assert!(h.theme.is_active());
    assert!(h.theme_text().is_some());
}

#[test]
fn losing_the_head_stops_the_running_theme() {
    let mut h = harness();
    let link = h
        .document
        .borrow_mut()
        .add_link(url("https://example.com/site.css"), "a { color: blue }");
    h.theme.create_or_update(FilterConfig::default());
    assert_eq!(h.document.borrow().link_listener_count(link), 1);

    h.document.borrow_mut().remove_head();
    h.theme.create_or_update(FilterConfig::default().with_sepia(20));
    assert!(!h.theme.is_active());
    assert!(h.theme_text().is_none());
    assert!(!h.document.borrow().is_observing());
    assert_eq!(h.document.borrow().link_listener_count(link), 0);

    h.document.borrow_mut().insert_head();
    h.theme.handle_head_ready();
    assert_eq!(h.theme.config().map(|config| config.sepia), Some(20));
    assert_eq!(h.document.borrow().link_listener_count(link), 1);
}

#[test]
fn remove_tears_everything_down() {
    let mut h = harness();
    h.document.borrow_mut().add_style("a { color: blue }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.remove();

    assert!(h.theme_text().is_none());
    assert!(!h.theme.is_active());
    assert!(!h.document.borrow().is_observing());
    assert!(h.theme.generated_css().is_none());

    let revision = h.revision();
    h.document.borrow_mut().add_style("b { color: red }");
    h.flush_mutations();
    assert_eq!(h.revision(), revision + 1);
}

#[test]
fn removed_rules_are_forgotten() {
    let mut h = harness();
    let style = h.document.borrow_mut().add_style("a { color: blue } b { color: red }");
    h.theme.create_or_update(FilterConfig::default());
    assert_eq!(h.theme.rule_cache().len(), 2);

    let ids = h.document.borrow().rule_ids(style);
    h.theme.handle_rules_removed(&ids[..1]);
    assert_eq!(h.theme.rule_cache().len(), 1);
    h.theme.create_or_update(FilterConfig::default());
    assert_eq!(h.theme.rule_cache().build_count(), 3);
}

#[test]
fn clean_cache_drops_rule_cache() {
    let mut h = harness();
    h.document.borrow_mut().add_style("a { color: blue }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.clean_cache();
    assert!(h.theme.rule_cache().is_empty());
    assert!(!h.theme.is_active());
    assert!(!h.document.borrow().is_observing());
}

#[test]
fn media_rules_are_rewrapped() {
    let mut h = harness();
    h.document
        .borrow_mut()
        .add_style("@media screen and (min-width: 10px) { p { border-color: gray } } @font-face { font-family: X }");
    h.theme.create_or_update(FilterConfig::default());
    let text = h.theme_text().unwrap();
    assert!(text.contains("@media screen and (min-width: 10px) {\np {\n    border-color: #"));
    assert!(text.ends_with("}\n}"));
}

#[test]
fn debug_css_pretty_prints() {
    let mut h = harness_with(MemoryDocument::new(url(PAGE)), EngineConfig::new(480_000, true, true));
    h.document.borrow_mut().add_style("a { color: blue }");
    h.theme.create_or_update(FilterConfig::default());
    assert!(h.theme_text().unwrap().starts_with("html,\nbody,\ninput,"));
}
