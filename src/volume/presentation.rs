//! Per-view presentation state and the lookup-table capability
//!
//! A [`CanonicalVolume`] knows nothing about how it is drawn. Rendering
//! contexts that stack overlays on a base volume attach an
//! [`OverlayPresentation`] to it instead.

use super::CanonicalVolume;
use super::properties::PropertyChangeCallback;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Entries in every lookup table
pub const LUT_ENTRIES: usize = 256;

/// Named RGBA lookup tables
pub trait LookupTableSource {
    /// The table registered under `name` (lowercase), if any
    fn lookup_table(&self, name: &str) -> Option<&[[u8; 4]]>;

    /// Registered names, sorted
    fn names(&self) -> Vec<String>;
}

/// Interpolate a 256-entry RGBA table between control points
///
/// Each point is `(index, rgba)`. Indices must increase; entries outside
/// the first and last index stay transparent black.
#[must_use]
pub fn make_lut(points: &[(u8, [u8; 4])]) -> Vec<[u8; 4]> {
    let mut lut = vec![[0u8; 4]; LUT_ENTRIES];
    for pair in points.windows(2) {
        let (lo, from) = pair[0];
        let (hi, to) = pair[1];
        if hi <= lo {
            log::warn!("ignoring lookup table segment {lo}..{hi}");
            continue;
        }
        let span = f64::from(hi - lo);
        for j in lo..=hi {
            let f = f64::from(j - lo) / span;
            let entry = &mut lut[usize::from(j)];
            for c in 0..4 {
                let (a, b) = (f64::from(from[c]), f64::from(to[c]));
                entry[c] = f.mul_add(b - a, a).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    lut
}

/// In-memory [`LookupTableSource`]
#[derive(Debug, Clone, Default)]
pub struct ColormapRegistry {
    tables: HashMap<String, Vec<[u8; 4]>>,
}

impl ColormapRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding gray, red, green, blue and hot
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert_points("gray", &[(0, [0, 0, 0, 0]), (255, [255, 255, 255, 255])]);
        registry.insert_points("red", &[(0, [0, 0, 0, 0]), (255, [255, 0, 0, 255])]);
        registry.insert_points("green", &[(0, [0, 0, 0, 0]), (255, [0, 255, 0, 255])]);
        registry.insert_points("blue", &[(0, [0, 0, 0, 0]), (255, [0, 0, 255, 255])]);
        registry.insert_points(
            "hot",
            &[
                (0, [0, 0, 0, 0]),
                (95, [255, 0, 0, 64]),
                (191, [255, 255, 0, 128]),
                (255, [255, 255, 255, 255]),
            ],
        );
        registry
    }

    /// Register a ready-made table under `name`
    pub fn insert(&mut self, name: &str, table: Vec<[u8; 4]>) {
        self.tables.insert(name.to_lowercase(), table);
    }

    /// Register a table interpolated from control points
    pub fn insert_points(&mut self, name: &str, points: &[(u8, [u8; 4])]) {
        self.insert(name, make_lut(points));
    }
}

impl LookupTableSource for ColormapRegistry {
    fn lookup_table(&self, name: &str) -> Option<&[[u8; 4]]> {
        self.tables.get(&name.to_lowercase()).map(Vec::as_slice)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Clip plane, zoom and overlay stack of a base volume in one view
pub struct OverlayPresentation {
    volume_id: Uuid,
    /// Depth, azimuth and elevation of the clip plane; depth 2 disables it
    clip_plane_depth_azi_elev: [f64; 3],
    scale: f64,
    base_volume_dims: [i64; 3],
    overlays: Vec<Uuid>,
    on_property_change: Option<PropertyChangeCallback>,
}

impl OverlayPresentation {
    /// Presentation of `base` with the clip plane off and unit scale
    #[must_use]
    pub fn new(base: &CanonicalVolume) -> Self {
        let dims = base.dims_ras();
        Self {
            volume_id: base.id(),
            clip_plane_depth_azi_elev: [2.0, 0.0, 0.0],
            scale: 1.0,
            base_volume_dims: [dims[1], dims[2], dims[3]],
            overlays: Vec::new(),
            on_property_change: None,
        }
    }

    #[must_use]
    pub const fn volume_id(&self) -> Uuid {
        self.volume_id
    }

    #[must_use]
    pub const fn clip_plane_depth_azi_elev(&self) -> [f64; 3] {
        self.clip_plane_depth_azi_elev
    }

    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub const fn base_volume_dims(&self) -> [i64; 3] {
        self.base_volume_dims
    }

    /// Overlay volume ids, bottom to top
    #[must_use]
    pub fn overlays(&self) -> &[Uuid] {
        &self.overlays
    }

    pub fn set_on_property_change(&mut self, callback: PropertyChangeCallback) {
        self.on_property_change = Some(callback);
    }

    fn notify(&mut self, property: &str) {
        let id = self.volume_id;
        if let Some(callback) = self.on_property_change.as_mut() {
            callback(id, property);
        }
    }

    pub fn set_clip_plane_depth_azi_elev(&mut self, value: [f64; 3]) -> bool {
        if self.clip_plane_depth_azi_elev == value {
            return false;
        }
        self.clip_plane_depth_azi_elev = value;
        self.notify("clip_plane_depth_azi_elev");
        true
    }

    pub fn set_scale(&mut self, scale: f64) -> bool {
        if self.scale == scale {
            return false;
        }
        self.scale = scale;
        self.notify("scale");
        true
    }

    pub fn set_base_volume_dims(&mut self, dims: [i64; 3]) -> bool {
        if self.base_volume_dims == dims {
            return false;
        }
        self.base_volume_dims = dims;
        self.notify("base_volume_dims");
        true
    }

    /// Stack `overlay` on top; a volume already in the stack is not added twice
    pub fn add_overlay(&mut self, overlay: &CanonicalVolume) -> bool {
        let id = overlay.id();
        if id == self.volume_id || self.overlays.contains(&id) {
            return false;
        }
        self.overlays.push(id);
        self.notify("overlays");
        true
    }

    pub fn remove_overlay(&mut self, id: Uuid) -> bool {
        let before = self.overlays.len();
        self.overlays.retain(|&o| o != id);
        if self.overlays.len() == before {
            return false;
        }
        self.notify("overlays");
        true
    }
}

impl fmt::Debug for OverlayPresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayPresentation")
            .field("volume_id", &self.volume_id)
            .field("clip_plane_depth_azi_elev", &self.clip_plane_depth_azi_elev)
            .field("scale", &self.scale)
            .field("base_volume_dims", &self.base_volume_dims)
            .field("overlays", &self.overlays)
            .finish_non_exhaustive()
    }
}
