//! Load requests and the identities that tie them to a view.

use super::ImageId;

/// Identity of one dispatched load.
///
/// A view remembers the identity of its latest request; completions carrying
/// any other identity are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    /// Generates a fresh, globally unique identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a local resource such as a placeholder drawable.
///
/// Resolution to renderable content belongs to the display target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceRef(pub u32);

impl ResourceRef {
    /// Maps the widget convention "0 means unset" to an option.
    #[must_use]
    pub const fn non_zero(id: u32) -> Option<Self> {
        if id == 0 { None } else { Some(Self(id)) }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// A single, immutable image load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Identity used to detect stale completions.
    pub id: RequestId,
    /// Image URL.
    pub url: String,
    /// Value of the `Referer` header, if the host requires one.
    pub referer: Option<String>,
    /// Skip the cache for both lookup and storage.
    pub bypass_cache: bool,
    /// Bounding box width in pixels, `<= 0` means unconstrained.
    pub box_width: i32,
    /// Bounding box height in pixels, `<= 0` means unconstrained.
    pub box_height: i32,
    /// Corner radius in pixels, 0 means square corners.
    pub corner_radius: u32,
}

impl LoadRequest {
    /// Creates an unconstrained, cacheable request for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: RequestId::generate(),
            url: url.into(),
            referer: None,
            bypass_cache: false,
            box_width: 0,
            box_height: 0,
            corner_radius: 0,
        }
    }

    /// Sends `referer` with the HTTP request.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Skips the cache for both lookup and storage.
    #[must_use]
    pub const fn with_bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    /// Sets the bounding box; `<= 0` leaves a side unconstrained.
    #[must_use]
    pub const fn with_box(mut self, width: i32, height: i32) -> Self {
        self.box_width = width;
        self.box_height = height;
        self
    }

    /// Sets the corner radius in pixels.
    #[must_use]
    pub const fn with_corner_radius(mut self, radius: u32) -> Self {
        self.corner_radius = radius;
        self
    }

    /// Key under which the processed result is cached.
    #[must_use]
    pub fn cache_key(&self) -> ImageId {
        ImageId::for_variant(
            &self.url,
            self.box_width,
            self.box_height,
            self.corner_radius,
        )
    }
}
