//! Remote image view built on a two-slot display target.
//!
//! The view binds each load to a fresh [`RequestId`]. Completions are
//! delivered over a channel owned by the view and only applied on the
//! thread that drives it, and only if they belong to the latest request.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::domain::entities::{
    CONTENT_SLOT, DecodedImage, LoadRequest, PLACEHOLDER_SLOT, RequestId, ResourceRef,
    SlotContent, ViewState,
};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::DisplayTarget;
use crate::infrastructure::config::ViewDefaults;
use crate::infrastructure::image::{ImageDispatcher, LoadCompletion};

/// Called with the final image right before it is displayed.
pub type ImageLoadedListener = Box<dyn FnMut(&Arc<DecodedImage>)>;

/// Construction-time settings of a view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    /// Remote image locator.
    pub image_url: Option<String>,
    /// Referer sent with the request.
    pub http_referer: Option<String>,
    /// Fetch on every load and never cache the result.
    pub no_cache: bool,
    /// Box width in pixels, `<= 0` for wrap content.
    pub box_width: i32,
    /// Box height in pixels, `<= 0` for wrap content.
    pub box_height: i32,
    /// Corner radius in pixels, 0 for square corners.
    pub round_corner_px: u32,
    /// Shown in the content slot while loading.
    pub default_image: Option<ResourceRef>,
    /// Background of the content slot while loading.
    pub default_background: Option<ResourceRef>,
    /// Background of the content slot after a failure.
    pub error_background: Option<ResourceRef>,
    /// Load as soon as the view is created, if a URL is set.
    pub auto_load: bool,
    /// Fade the image in once displayed.
    pub fade_in: bool,
}

impl ViewOptions {
    /// Options for `url` with host-wide defaults applied.
    #[must_use]
    pub fn from_defaults(url: impl Into<String>, defaults: &ViewDefaults) -> Self {
        Self {
            image_url: Some(url.into()),
            no_cache: defaults.no_cache,
            box_width: defaults.box_width,
            box_height: defaults.box_height,
            round_corner_px: defaults.corner_radius,
            fade_in: defaults.fade_in,
            ..Self::default()
        }
    }
}

/// Result of [`ResImageView::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// No image was displayed.
    Nothing,
    /// The image is still referenced elsewhere, usually by the cache.
    Shared,
    /// The bitmap was the last reference and has been freed.
    Freed {
        /// Pixel bytes released.
        bytes: u64,
    },
}

/// Cache-backed remote image view.
pub struct ResImageView<T: DisplayTarget> {
    target: T,
    dispatcher: Arc<ImageDispatcher>,
    options: ViewOptions,
    state: ViewState,
    current: Option<RequestId>,
    displayed: Option<Arc<DecodedImage>>,
    completion_tx: mpsc::UnboundedSender<LoadCompletion>,
    completion_rx: mpsc::UnboundedReceiver<LoadCompletion>,
    on_image_loaded: Option<ImageLoadedListener>,
}

impl<T: DisplayTarget> std::fmt::Debug for ResImageView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResImageView")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("current", &self.current)
            .field("has_image", &self.displayed.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: DisplayTarget> ResImageView<T> {
    /// Creates a view over `target`, loading right away when
    /// `options.auto_load` is set and a URL is present.
    pub fn new(mut target: T, dispatcher: Arc<ImageDispatcher>, options: ViewOptions) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        target.set_fade_in(options.fade_in);

        let mut view = Self {
            target,
            dispatcher,
            options,
            state: ViewState::Idle,
            current: None,
            displayed: None,
            completion_tx,
            completion_rx,
            on_image_loaded: None,
        };

        if view.options.auto_load && view.url().is_some() {
            if let Err(e) = view.load_image() {
                debug!(error = %e, "Auto-load did not start");
            }
        }
        view
    }

    /// Starts loading the configured URL, replacing any load in flight.
    ///
    /// The placeholder is applied before this returns. A previous request
    /// keeps running, but its result will be ignored.
    ///
    /// # Errors
    /// Returns `LoadError::Configuration` when no URL is set; the view is
    /// left untouched.
    pub fn load_image(&mut self) -> LoadResult<RequestId> {
        let Some(url) = self.url().map(String::from) else {
            let err = LoadError::configuration(
                "image URL is not set; did you forget to set it for this view?",
            );
            error!(error = %err, "Cannot load image");
            return Err(err);
        };

        let mut request = LoadRequest::new(url)
            .with_bypass_cache(self.options.no_cache)
            .with_box(self.options.box_width, self.options.box_height)
            .with_corner_radius(self.options.round_corner_px);
        if let Some(referer) = &self.options.http_referer {
            request = request.with_referer(referer.clone());
        }

        self.current = Some(request.id);
        self.state = ViewState::Loading;
        self.show_placeholder();

        debug!(request = %request.id, url = %request.url, "Loading image");
        self.dispatcher.load(&request, &self.completion_tx);
        Ok(request.id)
    }

    fn show_placeholder(&mut self) {
        self.target
            .set_background(CONTENT_SLOT, self.options.default_background);

        // Slot 0 must not keep a bitmap from an earlier request.
        self.displayed = None;
        let placeholder = self
            .options
            .default_image
            .map_or(SlotContent::Empty, SlotContent::Resource);
        self.target.set_slot(CONTENT_SLOT, placeholder);

        if self.options.default_image.is_some() || self.options.default_background.is_some() {
            self.target.set_displayed_index(CONTENT_SLOT);
        } else {
            self.target.set_displayed_index(PLACEHOLDER_SLOT);
        }
    }

    /// Applies every completion already received, without waiting.
    ///
    /// Returns how many of them changed the view.
    pub fn process_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            if self.apply_completion(completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Waits until the current load has finished and returns the new state.
    ///
    /// Returns immediately when nothing is loading.
    pub async fn settle(&mut self) -> &ViewState {
        while self.state.is_loading() {
            let Some(completion) = self.completion_rx.recv().await else {
                break;
            };
            self.apply_completion(completion);
        }
        &self.state
    }

    fn apply_completion(&mut self, completion: LoadCompletion) -> bool {
        if !self.state.is_loading() || self.current != Some(completion.request_id) {
            debug!(
                request = %completion.request_id,
                url = %completion.url,
                "Discarding stale completion"
            );
            return false;
        }

        match completion.result {
            Ok(loaded) => {
                if let Some(listener) = self.on_image_loaded.as_mut() {
                    listener(&loaded.image);
                }
                self.target
                    .set_slot(CONTENT_SLOT, SlotContent::Image(loaded.image.clone()));
                self.target.set_displayed_index(CONTENT_SLOT);
                self.displayed = Some(loaded.image);
                self.state = ViewState::Loaded;
                debug!(
                    url = %completion.url,
                    source = %loaded.source,
                    "Image displayed"
                );
            }
            Err(err) => {
                warn!(url = %completion.url, error = %err, "Image load failed");
                if let Some(background) = self.options.error_background {
                    self.target.set_background(CONTENT_SLOT, Some(background));
                    self.target.set_displayed_index(CONTENT_SLOT);
                }
                self.state = ViewState::Failed(err.to_string());
            }
        }
        true
    }

    /// Shows a local bitmap without fetching; any load in flight is dropped.
    pub fn set_local_image(&mut self, image: Arc<DecodedImage>) {
        self.invalidate();
        self.target
            .set_slot(CONTENT_SLOT, SlotContent::Image(image.clone()));
        self.target.set_displayed_index(CONTENT_SLOT);
        self.displayed = Some(image);
    }

    /// Shows a local resource without fetching; any load in flight is dropped.
    pub fn set_local_resource(&mut self, resource: ResourceRef) {
        self.invalidate();
        self.displayed = None;
        self.target
            .set_slot(CONTENT_SLOT, SlotContent::Resource(resource));
        self.target.set_displayed_index(CONTENT_SLOT);
    }

    /// Drops the displayed bitmap, freeing it unless the cache still holds it.
    ///
    /// Also abandons any load in flight. Safe to call repeatedly.
    pub fn release(&mut self) -> ReleaseOutcome {
        self.invalidate();
        let Some(image) = self.displayed.take() else {
            return ReleaseOutcome::Nothing;
        };

        self.target.set_slot(CONTENT_SLOT, SlotContent::Empty);
        match Arc::try_unwrap(image) {
            Ok(bitmap) => {
                let bytes = bitmap.byte_size();
                drop(bitmap);
                debug!(bytes, "Freed displayed image");
                ReleaseOutcome::Freed { bytes }
            }
            Err(_shared) => {
                trace!("Displayed image still referenced, leaving it to the cache");
                ReleaseOutcome::Shared
            }
        }
    }

    fn invalidate(&mut self) {
        self.current = None;
        if self.state.is_loading() {
            self.state = ViewState::Idle;
        }
    }

    /// Registers a listener for successfully loaded images.
    pub fn set_on_image_loaded(&mut self, listener: impl FnMut(&Arc<DecodedImage>) + 'static) {
        self.on_image_loaded = Some(Box::new(listener));
    }

    /// Sets the URL used by the next [`Self::load_image`].
    pub fn set_image_url(&mut self, url: impl Into<String>) {
        self.options.image_url = Some(url.into());
    }

    /// Sets the referer for hosts that check it.
    pub fn set_http_referer(&mut self, referer: impl Into<String>) {
        self.options.http_referer = Some(referer.into());
    }

    /// Bypasses the cache for subsequent loads.
    pub fn set_no_cache(&mut self, no_cache: bool) {
        self.options.no_cache = no_cache;
    }

    /// Sets the bounding box; `<= 0` leaves a side unconstrained.
    pub fn set_image_box_size(&mut self, width: i32, height: i32) {
        self.options.box_width = width;
        self.options.box_height = height;
    }

    /// Sets the corner radius for subsequent loads.
    pub fn set_round_corner_px(&mut self, radius: u32) {
        self.options.round_corner_px = radius;
    }

    /// Sets the image shown while loading.
    pub fn set_default_image(&mut self, resource: Option<ResourceRef>) {
        self.options.default_image = resource;
    }

    /// Sets the background shown while loading.
    pub fn set_default_background(&mut self, resource: Option<ResourceRef>) {
        self.options.default_background = resource;
    }

    /// Sets the background shown after a failure.
    pub fn set_error_background(&mut self, resource: Option<ResourceRef>) {
        self.options.error_background = resource;
    }

    /// Enables or disables the fade-in on the target.
    pub fn set_fade_in(&mut self, fade_in: bool) {
        self.options.fade_in = fade_in;
        self.target.set_fade_in(fade_in);
    }

    fn url(&self) -> Option<&str> {
        self.options
            .image_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }

    /// The configured URL, even if blank.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.options.image_url.as_deref()
    }

    /// Whether the view loaded on creation.
    #[must_use]
    pub const fn is_auto_load(&self) -> bool {
        self.options.auto_load
    }

    /// Returns true once the latest remote load has been displayed.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    /// Current load state.
    #[must_use]
    pub const fn state(&self) -> &ViewState {
        &self.state
    }

    /// Current settings.
    #[must_use]
    pub const fn options(&self) -> &ViewOptions {
        &self.options
    }

    /// Identity of the request whose result the view is waiting for.
    #[must_use]
    pub const fn current_request(&self) -> Option<RequestId> {
        self.current
    }

    /// The bitmap currently shown in the content slot.
    #[must_use]
    pub const fn displayed_image(&self) -> Option<&Arc<DecodedImage>> {
        self.displayed.as_ref()
    }

    /// Borrows the display target.
    #[must_use]
    pub const fn target(&self) -> &T {
        &self.target
    }

    /// Mutably borrows the display target.
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }
}
