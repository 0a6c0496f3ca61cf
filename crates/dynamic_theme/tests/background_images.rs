mod common;

use common::{PAGE, dark_icon, declared_value, harness, harness_with, png_bytes, url};
use dynamic_theme::test_support::{MemoryDocument, solid_png, solid_png_data_url};
use dynamic_theme::{EngineConfig, FilterConfig, ResponseType, ThemeMode};
use image::RgbaImage;

#[tokio::test]
async fn shared_image_is_decoded_once() {
    let mut h = harness();
    let icon = url("https://example.com/blog/icon.png");
    h.fetcher.serve(&icon, dark_icon());
    h.document
        .borrow_mut()
        .add_style(r#".a { background-image: url(icon.png) } .b { background-image: url("icon.png") }"#);
    h.theme.create_or_update(FilterConfig::default());
    assert_eq!(h.theme.pending_tasks(), 2);
    h.theme.settle().await;

    assert_eq!(h.fetcher.load_calls(&icon), 1);
    assert_eq!(h.theme.image_store().unwrap().decode_count(), 1);
    let patches = h.patch_texts();
    assert_eq!(patches.len(), 2);
    let first = declared_value(&patches[0], "background-image").unwrap();
    let second = declared_value(&patches[1], "background-image").unwrap();
    assert!(first.starts_with("url(\"data:image/png;base64,"));
    assert_eq!(first, second);
    assert!(patches[0].starts_with(".a {") || patches[0].starts_with(".b {"));
}

#[tokio::test]
async fn known_images_resolve_without_patches() {
    let mut h = harness();
    let icon = url("https://example.com/blog/icon.png");
    h.fetcher.serve(&icon, dark_icon());
    h.document
        .borrow_mut()
        .add_style(".a { background-image: url(icon.png) }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.settle().await;

    h.theme.create_or_update(FilterConfig::default());
    assert_eq!(h.theme.pending_tasks(), 0);
    assert!(h.patch_texts().is_empty());
    let text = h.theme_text().unwrap();
    assert!(text.contains(".a {\n    background-image: url(\"data:image/png;base64,"));
    assert_eq!(h.fetcher.load_calls(&icon), 1);
}

#[tokio::test]
async fn large_light_images_are_hidden() {
    let document = MemoryDocument::new(url(PAGE));
    let mut h = harness_with(document, EngineConfig::new(100, true, false));
    let photo = url("https://example.com/photo.png");
    h.fetcher.serve(&photo, solid_png(20, 20, [250, 250, 250, 255]).unwrap());
    h.document
        .borrow_mut()
        .add_style(".hero { background-image: url(/photo.png) }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.settle().await;

    let patches = h.patch_texts();
    assert_eq!(declared_value(&patches[0], "background-image").as_deref(), Some("none"));
}

#[tokio::test]
async fn small_light_images_are_dimmed() {
    let mut h = harness();
    let tile = url("https://example.com/tile.png");
    h.fetcher.serve(&tile, solid_png(4, 4, [250, 250, 250, 255]).unwrap());
    h.document
        .borrow_mut()
        .add_style(".tile { background-image: url(/tile.png), linear-gradient(white, black) }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.settle().await;

    let value = declared_value(&h.patch_texts()[0], "background-image").unwrap();
    assert!(value.starts_with("url(\"data:image/png;base64,"));
    assert!(value.contains("), linear-gradient(#"));
}

#[tokio::test]
async fn neutral_images_keep_their_url() {
    let mut h = harness();
    let picture = url("https://example.com/mid.png");
    h.fetcher.serve(&picture, solid_png(4, 4, [128, 100, 90, 255]).unwrap());
    h.document
        .borrow_mut()
        .add_style(".p { background-image: url('/mid.png') }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.settle().await;

    assert_eq!(
        declared_value(&h.patch_texts()[0], "background-image").as_deref(),
        Some("url('/mid.png')")
    );
}

#[tokio::test]
async fn failed_load_retries_through_background_fetch() {
    let mut h = harness();
    let icon = url("https://static.example.org/icon.png");
    h.fetcher
        .serve_background(&icon, css_images::encode_data_url("image/png", &dark_icon()));
    h.document
        .borrow_mut()
        .add_style(".i { background-image: url(https://static.example.org/icon.png) }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.settle().await;

    let requests = h.fetcher.fetch_calls();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].response_type, ResponseType::DataUrl);
    assert_eq!(requests[0].url, icon);
    let value = declared_value(&h.patch_texts()[0], "background-image").unwrap();
    assert!(value.starts_with("url(\"data:image/png;base64,"));
}

#[tokio::test]
async fn unloadable_images_keep_their_url() {
    let mut h = harness();
    h.document
        .borrow_mut()
        .add_style(".m { background-image: url(missing.png) }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.settle().await;

    assert_eq!(
        declared_value(&h.patch_texts()[0], "background-image").as_deref(),
        Some("url(missing.png)")
    );
}

#[tokio::test]
async fn data_urls_are_decoded_without_fetching() {
    let mut h = harness();
    let inline = solid_png_data_url(2, 2, [255, 255, 255, 255]).unwrap();
    h.document
        .borrow_mut()
        .add_style(&format!(".d {{ background-image: url({inline}) }}"));
    h.theme.create_or_update(FilterConfig::default());
    h.theme.settle().await;

    assert!(h.fetcher.fetch_calls().is_empty());
    assert_eq!(h.theme.image_store().unwrap().decode_count(), 1);
    let value = declared_value(&h.patch_texts()[0], "background-image").unwrap();
    assert_ne!(value, format!("url({inline})"));
}

#[tokio::test]
async fn light_mode_never_loads_images() {
    let mut h = harness();
    h.document
        .borrow_mut()
        .add_style(".m { background-image: url(a.png) }");
    h.theme
        .create_or_update(FilterConfig::default().with_mode(ThemeMode::Light));
    assert_eq!(h.theme.pending_tasks(), 0);
    h.theme.settle().await;
    assert!(h.patch_texts().is_empty());
    assert!(h.theme_text().unwrap().contains("background-image: url(a.png) !important;"));
}

#[tokio::test]
async fn deactivation_while_loading_leaves_document_alone() {
    let mut h = harness();
    let icon = url("https://example.com/blog/icon.png");
    h.fetcher.serve(&icon, dark_icon());
    let gate = h.fetcher.gate_load(&icon);
    h.document
        .borrow_mut()
        .add_style(".a { background-image: url(icon.png) }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.run_ready();
    assert_eq!(h.fetcher.load_calls(&icon), 1);

    h.theme.remove();
    let revision = h.revision();
    gate.send(()).unwrap();
    h.theme.settle().await;

    assert_eq!(h.revision(), revision);
    assert!(h.patch_texts().is_empty());
}

#[tokio::test]
async fn superseded_rebuilds_do_not_patch() {
    let mut h = harness();
    let icon = url("https://example.com/blog/icon.png");
    h.fetcher.serve(&icon, dark_icon());
    let gate = h.fetcher.gate_load(&icon);
    h.document
        .borrow_mut()
        .add_style(".a { background-image: url(icon.png) }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.run_ready();
    h.theme.create_or_update(FilterConfig::default().with_sepia(30));

    gate.send(()).unwrap();
    h.theme.settle().await;

    assert_eq!(h.patch_texts().len(), 1);
    assert_eq!(h.fetcher.load_calls(&icon), 1);
}

#[tokio::test]
async fn stale_patches_are_removed_on_rebuild() {
    let mut h = harness();
    let icon = url("https://example.com/blog/icon.png");
    h.fetcher.serve(&icon, png_bytes(&RgbaImage::from_pixel(3, 3, image::Rgba([0, 0, 0, 0]))));
    h.document
        .borrow_mut()
        .add_style(".a { background-image: url(icon.png) }");
    h.theme.create_or_update(FilterConfig::default());
    h.theme.settle().await;
    assert_eq!(h.patch_texts().len(), 1);

    h.document.borrow_mut().add_style("b { color: red }");
    h.flush_mutations();
    assert!(h.patch_texts().is_empty());
    assert!(h.theme_text().unwrap().contains(".a {\n    background-image: url(icon.png) !important;"));
}
