//! Observable display properties of a canonical volume
//!
//! Every setter compares against the stored value and only notifies the
//! registered callback, with the volume id and the property name, when the
//! value actually changed. Setters return whether a change happened.

use super::presentation::LookupTableSource;
use super::{CanonicalVolume, VolumeOptions};
use crate::error::CanonError;
use uuid::Uuid;

/// Receives `(volume_id, property_name)` after a property changed
pub type PropertyChangeCallback = Box<dyn FnMut(Uuid, &str) + Send>;

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayProperties {
    pub name: String,
    pub colormap: String,
    /// Colormap for negative intensities, empty when unused
    pub colormap_negative: String,
    pub opacity: f64,
    pub visible: bool,
    pub frame_4d: usize,
    pub cal_min_neg: f64,
    pub cal_max_neg: f64,
    pub cal_min_max_trusted: bool,
    pub percentile_frac: f64,
    pub ignore_zero_voxels: bool,
    pub colorbar_visible: bool,
    pub alpha_threshold_used: bool,
}

impl DisplayProperties {
    pub(crate) fn new(options: &VolumeOptions) -> Self {
        Self {
            name: options.name.clone(),
            colormap: "gray".to_string(),
            colormap_negative: String::new(),
            opacity: 1.0,
            visible: true,
            frame_4d: 0,
            cal_min_neg: 0.0,
            cal_max_neg: 0.0,
            cal_min_max_trusted: options.cal_min_max_trusted,
            percentile_frac: options.percentile_frac.clamp(0.0, 0.5),
            ignore_zero_voxels: options.ignore_zero_voxels,
            colorbar_visible: true,
            alpha_threshold_used: false,
        }
    }
}

impl CanonicalVolume {
    /// Register the change observer, replacing any previous one
    pub fn set_on_property_change(&mut self, callback: PropertyChangeCallback) {
        self.on_property_change = Some(callback);
    }

    pub fn clear_on_property_change(&mut self) {
        self.on_property_change = None;
    }

    fn notify(&mut self, property: &str) {
        let id = self.id;
        if let Some(callback) = self.on_property_change.as_mut() {
            callback(id, property);
        }
    }

    /// Store `value` into the selected property and notify if it differs
    fn update<T: PartialEq>(
        &mut self,
        property: &str,
        value: T,
        select: impl FnOnce(&mut DisplayProperties) -> &mut T,
    ) -> bool {
        let slot = select(&mut self.properties);
        if *slot == value {
            return false;
        }
        *slot = value;
        self.notify(property);
        true
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        self.update("name", name.into(), |p| &mut p.name)
    }

    /// Switch the colormap, checking the name against `tables`
    ///
    /// # Errors
    ///
    /// Returns `CanonError::UnknownColormap` if `tables` has no such table
    pub fn set_colormap(
        &mut self,
        name: &str,
        tables: &dyn LookupTableSource,
    ) -> Result<bool, CanonError> {
        let name = known_colormap(name, tables)?;
        Ok(self.update("colormap", name, |p| &mut p.colormap))
    }

    /// Switch the negative-range colormap; an empty name disables it
    ///
    /// # Errors
    ///
    /// Returns `CanonError::UnknownColormap` if `tables` has no such table
    pub fn set_colormap_negative(
        &mut self,
        name: &str,
        tables: &dyn LookupTableSource,
    ) -> Result<bool, CanonError> {
        let name = if name.is_empty() {
            String::new()
        } else {
            known_colormap(name, tables)?
        };
        Ok(self.update("colormap_negative", name, |p| &mut p.colormap_negative))
    }

    pub fn set_opacity(&mut self, opacity: f64) -> bool {
        self.update("opacity", opacity.clamp(0.0, 1.0), |p| &mut p.opacity)
    }

    pub fn set_visible(&mut self, visible: bool) -> bool {
        self.update("visible", visible, |p| &mut p.visible)
    }

    /// Select the displayed 4D frame, clamped to the available frames
    pub fn set_frame_4d(&mut self, frame: usize) -> bool {
        let frame = frame.min(self.frame_count.saturating_sub(1));
        self.update("frame_4d", frame, |p| &mut p.frame_4d)
    }

    pub fn set_cal_min(&mut self, value: f64) -> bool {
        if self.intensity.cal_min == value {
            return false;
        }
        self.intensity.cal_min = value;
        self.notify("cal_min");
        true
    }

    pub fn set_cal_max(&mut self, value: f64) -> bool {
        if self.intensity.cal_max == value {
            return false;
        }
        self.intensity.cal_max = value;
        self.notify("cal_max");
        true
    }

    pub fn set_cal_min_neg(&mut self, value: f64) -> bool {
        self.update("cal_min_neg", value, |p| &mut p.cal_min_neg)
    }

    pub fn set_cal_max_neg(&mut self, value: f64) -> bool {
        self.update("cal_max_neg", value, |p| &mut p.cal_max_neg)
    }

    pub fn set_cal_min_max_trusted(&mut self, trusted: bool) -> bool {
        self.update("cal_min_max_trusted", trusted, |p| &mut p.cal_min_max_trusted)
    }

    /// Change the clipped fraction and re-estimate the intensity range
    pub fn set_percentile_frac(&mut self, frac: f64) -> bool {
        let changed = self.update("percentile_frac", frac.clamp(0.0, 0.5), |p| {
            &mut p.percentile_frac
        });
        if changed {
            self.recompute_intensity();
        }
        changed
    }

    /// Change zero-voxel handling and re-estimate the intensity range
    pub fn set_ignore_zero_voxels(&mut self, ignore: bool) -> bool {
        let changed = self.update("ignore_zero_voxels", ignore, |p| &mut p.ignore_zero_voxels);
        if changed {
            self.recompute_intensity();
        }
        changed
    }

    pub fn set_colorbar_visible(&mut self, visible: bool) -> bool {
        self.update("colorbar_visible", visible, |p| &mut p.colorbar_visible)
    }

    pub fn set_alpha_threshold_used(&mut self, used: bool) -> bool {
        self.update("alpha_threshold_used", used, |p| &mut p.alpha_threshold_used)
    }
}

fn known_colormap(name: &str, tables: &dyn LookupTableSource) -> Result<String, CanonError> {
    let name = name.to_lowercase();
    if tables.lookup_table(&name).is_some() {
        Ok(name)
    } else {
        Err(CanonError::UnknownColormap(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::RawHeader;
    use crate::volume::{ColormapRegistry, canonicalize};
    use assert_matches::assert_matches;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    fn observed_volume(voxels: Vec<u8>, options: &VolumeOptions) -> (CanonicalVolume, Log) {
        let mut header = RawHeader::default();
        header.dims[1] = i64::try_from(voxels.len()).unwrap();
        let mut volume = canonicalize(header, voxels, options).unwrap();

        let log: Log = Arc::default();
        let sink = Arc::clone(&log);
        let id = volume.id();
        volume.set_on_property_change(Box::new(move |volume_id, property| {
            assert_eq!(volume_id, id);
            sink.lock().unwrap().push(property.to_string());
        }));
        (volume, log)
    }

    #[test]
    fn test_notifies_only_on_change() {
        let (mut volume, log) = observed_volume(vec![1, 2, 3], &VolumeOptions::default());

        assert!(volume.set_opacity(0.5));
        assert!(!volume.set_opacity(0.5));
        assert!(!volume.set_visible(true));
        assert!(volume.set_visible(false));
        assert!(volume.set_name("t1"));

        assert_eq!(*log.lock().unwrap(), vec!["opacity", "visible", "name"]);
        assert_eq!(volume.properties().opacity, 0.5);
    }

    #[test]
    fn test_percentile_change_recomputes_range() {
        let voxels: Vec<u8> = (0..=100).collect();
        let options = VolumeOptions {
            percentile_frac: 0.0,
            ..VolumeOptions::default()
        };
        let (mut volume, log) = observed_volume(voxels, &options);
        assert_eq!(volume.intensity().cal_min, 0.0);
        assert_eq!(volume.intensity().cal_max, 100.0);

        assert!(volume.set_percentile_frac(0.1));
        assert!(volume.intensity().cal_min > 0.0);
        assert!(volume.intensity().cal_max < 100.0);
        assert_eq!(volume.intensity().global_max, 100.0);
        assert_eq!(*log.lock().unwrap(), vec!["percentile_frac"]);
    }

    #[test]
    fn test_ignoring_zeros_recomputes_range() {
        let mut voxels = vec![0u8; 20];
        voxels.extend([10, 20]);
        let options = VolumeOptions {
            percentile_frac: 0.0,
            ..VolumeOptions::default()
        };
        let (mut volume, _log) = observed_volume(voxels, &options);
        assert_eq!(volume.intensity().global_min, 0.0);

        assert!(volume.set_ignore_zero_voxels(true));
        assert_eq!(volume.intensity().global_min, 10.0);
    }

    #[test]
    fn test_frame_is_clamped() {
        let (mut volume, log) = observed_volume(vec![1, 2], &VolumeOptions::default());
        assert!(!volume.set_frame_4d(5));
        assert_eq!(volume.properties().frame_4d, 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_colormap_validated_against_tables() {
        let tables = ColormapRegistry::with_defaults();
        let (mut volume, log) = observed_volume(vec![1, 2], &VolumeOptions::default());

        assert_matches!(
            volume.set_colormap("no-such-map", &tables),
            Err(CanonError::UnknownColormap(name)) if name == "no-such-map"
        );
        assert_matches!(volume.set_colormap("Hot", &tables), Ok(true));
        assert_matches!(volume.set_colormap_negative("", &tables), Ok(false));
        assert_eq!(volume.properties().colormap, "hot");
        assert_eq!(*log.lock().unwrap(), vec!["colormap"]);
    }

    #[test]
    fn test_cal_overrides_notify() {
        let (mut volume, log) = observed_volume(vec![1, 2, 3], &VolumeOptions::default());
        assert!(volume.set_cal_max(2.5));
        assert!(!volume.set_cal_max(2.5));
        assert!(volume.set_cal_min_neg(-1.0));
        assert_eq!(volume.intensity().cal_max, 2.5);
        assert_eq!(*log.lock().unwrap(), vec!["cal_max", "cal_min_neg"]);
    }
}
