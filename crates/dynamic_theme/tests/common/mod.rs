#![allow(dead_code)]

use core::cell::RefCell;
use dynamic_theme::test_support::{MemoryDocument, MemoryFetcher};
use dynamic_theme::{DynamicTheme, EngineConfig};
use image::{ImageEncoder as _, RgbaImage, codecs::png::PngEncoder};
use std::rc::Rc;
use url::Url;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn url(text: &str) -> Url {
    Url::parse(text).unwrap()
}

pub const PAGE: &str = "https://example.com/blog/post.html";

pub struct Harness {
    pub document: Rc<RefCell<MemoryDocument>>,
    pub fetcher: Rc<MemoryFetcher>,
    pub theme: DynamicTheme<MemoryDocument>,
}

pub fn harness() -> Harness {
    harness_with(MemoryDocument::new(url(PAGE)), EngineConfig::default())
}

pub fn harness_with(document: MemoryDocument, engine: EngineConfig) -> Harness {
    init_logger();
    let document = Rc::new(RefCell::new(document));
    let fetcher = Rc::new(MemoryFetcher::default());
    let theme = DynamicTheme::new(Rc::clone(&document), fetcher.clone(), engine);
    Harness {
        document,
        fetcher,
        theme,
    }
}

impl Harness {
    /// Deliver pending mutation records to the theme.
    pub fn flush_mutations(&mut self) {
        let mutations = self.document.borrow_mut().take_mutations();
        self.theme.handle_mutations(&mutations);
    }

    pub fn theme_text(&self) -> Option<String> {
        self.document.borrow().theme_text().map(str::to_owned)
    }

    pub fn patch_texts(&self) -> Vec<String> {
        self.document
            .borrow()
            .patch_texts()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    pub fn revision(&self) -> u64 {
        self.document.borrow().revision()
    }
}

pub fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8.into())
        .unwrap();
    buf
}

/// Black icon on a transparent top half: classified dark and transparent.
pub fn dark_icon() -> Vec<u8> {
    png_bytes(&RgbaImage::from_fn(4, 4, |_, y| {
        if y < 2 {
            image::Rgba([0, 0, 0, 0])
        } else {
            image::Rgba([0, 0, 0, 255])
        }
    }))
}

/// The value of `property` inside a generated block.
pub fn declared_value(text: &str, property: &str) -> Option<String> {
    let prefix = format!("    {property}: ");
    text.lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .map(|rest| rest.trim_end_matches(" !important;").to_owned())
}
