//! Per-session store of loaded, classified and filtered background images.

use crate::host::{FetchRequest, ResourceFetcher, ResponseType};
use crate::{EngineConfig, Session, ThemeError};
use core::cell::{Cell, RefCell};
use css_color::FilterConfig;
use css_images::{ImageAnalysis, analyze_image, apply_filter_to_image, decode_data_url, decode_image};
use futures::FutureExt as _;
use futures::future::{LocalBoxFuture, Shared};
use image::RgbaImage;
use log::{debug, warn};
use std::collections::HashMap;
use std::rc::Rc;
use url::Url;

/// A decoded image together with its classification.
#[derive(Debug)]
pub struct LoadedImage {
    pub url: Url,
    pub pixels: RgbaImage,
    pub analysis: ImageAnalysis,
}

/// What a `url()` reference turns into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageValue {
    /// Keep the author's `url()`.
    Unchanged,
    /// Suppress the image (`none`).
    Hidden,
    /// A re-filtered image as a `data:` URL.
    Filtered(String),
}

type LoadResult = Result<Rc<LoadedImage>, Rc<ThemeError>>;
type PendingLoad = Shared<LocalBoxFuture<'static, LoadResult>>;

#[derive(Default)]
struct ImageState {
    loaded: HashMap<Url, Rc<LoadedImage>>,
    filtered: HashMap<(Url, FilterConfig), String>,
    pending: HashMap<Url, PendingLoad>,
}

/// Loads each URL once per session, however many declarations reference it.
#[derive(Clone)]
pub struct ImageStore {
    state: Rc<RefCell<ImageState>>,
    fetcher: Rc<dyn ResourceFetcher>,
    session: Session,
    large_image_pixels: u64,
    decodes: Rc<Cell<usize>>,
}

impl ImageStore {
    pub fn new(fetcher: Rc<dyn ResourceFetcher>, session: Session, engine: &EngineConfig) -> Self {
        Self {
            state: Rc::default(),
            fetcher,
            session,
            large_image_pixels: engine.large_image_pixels,
            decodes: Rc::default(),
        }
    }

    /// Number of decode+classify passes performed so far.
    #[must_use]
    pub fn decode_count(&self) -> usize {
        self.decodes.get()
    }

    /// Resolve without suspending if the image is already known.
    pub fn cached_value(&self, url: &Url, config: &FilterConfig) -> Option<ImageValue> {
        let image = self.state.borrow().loaded.get(url).cloned()?;
        Some(self.apply_policy(&image, config))
    }

    /// Resolve a `url()` reference. `None` means the session ended and no
    /// value must be emitted.
    pub fn resolve(&self, url: Url, config: FilterConfig) -> LocalBoxFuture<'static, Option<ImageValue>> {
        let load = self.load(url.clone());
        let store = self.clone();
        async move {
            let result = load.await;
            if !store.session.is_watching() {
                return None;
            }
            match result {
                Ok(image) => Some(store.apply_policy(&image, &config)),
                Err(error) => {
                    if matches!(*error, ThemeError::Cancelled) {
                        return None;
                    }
                    warn!("{error}");
                    Some(ImageValue::Unchanged)
                }
            }
        }
        .boxed_local()
    }

    /// Shared load for `url`; concurrent callers get the same future.
    fn load(&self, url: Url) -> PendingLoad {
        let mut state = self.state.borrow_mut();
        if let Some(pending) = state.pending.get(&url) {
            return pending.clone();
        }
        if let Some(image) = state.loaded.get(&url) {
            let ready: LocalBoxFuture<'static, LoadResult> = futures::future::ready(Ok(Rc::clone(image))).boxed_local();
            return ready.shared();
        }
        let store = self.clone();
        let key = url.clone();
        let pending = async move {
            let result = store.fetch_and_classify(&url).await.map_err(Rc::new);
            let mut state = store.state.borrow_mut();
            state.pending.remove(&url);
            if let Ok(image) = &result {
                state.loaded.insert(url, Rc::clone(image));
            }
            result
        }
        .boxed_local()
        .shared();
        state.pending.insert(key, pending.clone());
        pending
    }

    async fn fetch_and_classify(&self, url: &Url) -> Result<Rc<LoadedImage>, ThemeError> {
        let pixels = match self.load_pixels(url).await {
            Ok(pixels) => pixels,
            Err(error) if url.scheme() == "data" => return Err(error),
            Err(error) => {
                warn!("{error}, retrying through background fetch");
                if !self.session.is_watching() {
                    return Err(ThemeError::Cancelled);
                }
                self.fetch_pixels(url).await?
            }
        };
        if !self.session.is_watching() {
            return Err(ThemeError::Cancelled);
        }
        self.decodes.set(self.decodes.get() + 1);
        let analysis = analyze_image(&pixels, self.large_image_pixels);
        debug!("classified {url} as {analysis:?}");
        Ok(Rc::new(LoadedImage {
            url: url.clone(),
            pixels,
            analysis,
        }))
    }

    async fn load_pixels(&self, url: &Url) -> Result<RgbaImage, ThemeError> {
        let load_error = |reason: String| ThemeError::ImageLoad {
            url: url.to_string(),
            reason,
        };
        let bytes = if url.scheme() == "data" {
            decode_data_url(url.as_str())
                .map_err(|error| load_error(error.to_string()))?
                .bytes
        } else {
            self.fetcher
                .load(url)
                .await
                .map_err(|error| load_error(format!("{error:#}")))?
                .to_vec()
        };
        decode_image(&bytes).map_err(|error| load_error(error.to_string()))
    }

    async fn fetch_pixels(&self, url: &Url) -> Result<RgbaImage, ThemeError> {
        let request = FetchRequest {
            url: url.clone(),
            response_type: ResponseType::DataUrl,
            mime_type: None,
        };
        let data_url = self.fetcher.fetch(request).await.map_err(|source| ThemeError::Fetch {
            url: url.to_string(),
            source,
        })?;
        if !self.session.is_watching() {
            return Err(ThemeError::Cancelled);
        }
        let load_error = |reason: String| ThemeError::ImageLoad {
            url: url.to_string(),
            reason,
        };
        let data = decode_data_url(&data_url).map_err(|error| load_error(error.to_string()))?;
        decode_image(&data.bytes).map_err(|error| load_error(error.to_string()))
    }

    /// Dark transparent images are inverted with a sepia boost, small light
    /// opaque ones dimmed, large light opaque ones hidden.
    fn apply_policy(&self, image: &LoadedImage, config: &FilterConfig) -> ImageValue {
        if !config.is_dark() {
            return ImageValue::Unchanged;
        }
        let ImageAnalysis {
            is_dark,
            is_light,
            is_transparent,
            is_large,
        } = image.analysis;
        if is_dark && is_transparent {
            debug!("inverting dark image {}", image.url);
            let boosted = config.with_sepia(config.sepia.saturating_add(90).min(100));
            self.filtered(image, &boosted)
        } else if is_light && !is_transparent {
            if is_large {
                return ImageValue::Hidden;
            }
            debug!("dimming light image {}", image.url);
            self.filtered(image, config)
        } else {
            ImageValue::Unchanged
        }
    }

    fn filtered(&self, image: &LoadedImage, config: &FilterConfig) -> ImageValue {
        let key = (image.url.clone(), *config);
        if let Some(data_url) = self.state.borrow().filtered.get(&key) {
            return ImageValue::Filtered(data_url.clone());
        }
        match apply_filter_to_image(&image.pixels, config) {
            Ok(data_url) => {
                self.state.borrow_mut().filtered.insert(key, data_url.clone());
                ImageValue::Filtered(data_url)
            }
            Err(error) => {
                warn!("Unable to filter image {}: {error}", image.url);
                ImageValue::Unchanged
            }
        }
    }

    /// Forget every loaded, filtered and pending image.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.loaded.clear();
        state.filtered.clear();
        state.pending.clear();
    }
}
