//! Session-oriented editing API.
//!
//! An [`EditSession`] owns one project, its photo pixels and optional
//! landmarks, and front-loads validation so per-edit operations stay cheap.
//! Every committed mutation records an undo snapshot and refreshes the
//! project's updated timestamp; an in-progress stroke is invisible to
//! composite reads until committed.

use uuid::Uuid;

use crate::{
    brush::mirror::{mirror_stroke, symmetry_axis},
    export::encode::{
        ExportSettings, encode_before_after, encode_image, render_timelapse,
    },
    foundation::core::Point,
    foundation::error::{VisageError, VisageResult},
    foundation::fingerprint::StableHasher,
    mask::resolve::{mask_source_key, resolve_mask},
    project::color::Rgba8,
    project::history::{DEFAULT_HISTORY_DEPTH, EditHistory},
    project::model::{
        BlendMode, BrushSettings, FaceRegion, Landmarks, Layer, LayerType, LookPreset, Mask,
        Photo, Project, Stroke, StrokeKind, StrokePoint,
    },
    render::composite::{CompositeCache, composite_project_with_cache},
    render::raster::ImageRgba8,
};

#[derive(Clone, Copy, Debug)]
pub struct SessionOpts {
    pub history_depth: usize,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

struct InProgress {
    layer_id: Uuid,
    stroke: Stroke,
}

/// Interactive editing session for one project. Single writer; the photo
/// buffer is shared read-only with the compositor and exporter.
pub struct EditSession {
    project: Project,
    photo: Photo,
    pixels: ImageRgba8,
    landmarks: Option<Landmarks>,
    history: EditHistory,
    cache: CompositeCache,
    in_progress: Option<InProgress>,
}

impl EditSession {
    pub fn new(
        mut project: Project,
        photo: Photo,
        pixels: ImageRgba8,
        landmarks: Option<Landmarks>,
        opts: SessionOpts,
    ) -> VisageResult<Self> {
        project.validate()?;
        if project.photo_id != photo.id {
            return Err(VisageError::validation(
                "project photo_id does not match the supplied photo",
            ));
        }
        if pixels.size() != photo.size() {
            return Err(VisageError::validation(
                "photo pixel buffer does not match the photo dimensions",
            ));
        }
        if pixels.is_empty() {
            return Err(VisageError::validation("photo dimensions must be > 0"));
        }
        // Detection may run after project creation; keep the reference in sync.
        project.landmarks_id = landmarks.as_ref().map(|lm| lm.id);

        Ok(Self {
            project,
            photo,
            pixels,
            landmarks,
            history: EditHistory::new(opts.history_depth),
            cache: CompositeCache::new(),
            in_progress: None,
        })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Hand the project back for persistence. The serialized form round-trips
    /// verbatim through `serde_json`.
    pub fn into_project(self) -> Project {
        self.project
    }

    pub fn photo(&self) -> &Photo {
        &self.photo
    }

    pub fn landmarks(&self) -> Option<&Landmarks> {
        self.landmarks.as_ref()
    }

    /// Replace the landmarks (e.g. after re-running detection). Cached auto
    /// masks go stale via their source keys and are re-resolved lazily.
    pub fn set_landmarks(&mut self, landmarks: Option<Landmarks>) {
        self.project.landmarks_id = landmarks.as_ref().map(|lm| lm.id);
        self.landmarks = landmarks;
        self.project.touch();
    }

    pub fn set_symmetry_guide(&mut self, enabled: bool) {
        self.project.symmetry_guide = enabled;
        self.project.touch();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.project.title = title.into();
        self.project.touch();
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.project.notes = notes;
        self.project.touch();
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    pub fn has_stroke_in_progress(&self) -> bool {
        self.in_progress.is_some()
    }

    fn snapshot(&mut self) {
        self.history.record(self.project.layers.clone());
    }

    fn with_layer(&mut self, id: Uuid, f: impl FnOnce(&mut Layer)) -> VisageResult<()> {
        if self.project.layer(id).is_none() {
            return Err(VisageError::validation(format!("unknown layer {id}")));
        }
        self.snapshot();
        let layer = self
            .project
            .layer_mut(id)
            .ok_or_else(|| VisageError::validation(format!("unknown layer {id}")))?;
        f(layer);
        layer.clamp_ranges();
        self.project.touch();
        Ok(())
    }

    // ---- layer management ----

    pub fn add_layer(
        &mut self,
        kind: LayerType,
        region: FaceRegion,
        brush: &BrushSettings,
    ) -> Uuid {
        self.snapshot();
        let layer = Layer::new(kind, region, brush, self.project.next_ordering());
        let id = layer.id;
        self.project.layers.push(layer);
        self.project.touch();
        id
    }

    pub fn remove_layer(&mut self, id: Uuid) -> VisageResult<()> {
        if self.project.layer(id).is_none() {
            return Err(VisageError::validation(format!("unknown layer {id}")));
        }
        self.snapshot();
        self.project.layers.retain(|l| l.id != id);
        self.cache.retain_layers(&self.project);
        if let Some(ip) = &self.in_progress
            && ip.layer_id == id
        {
            self.in_progress = None;
        }
        self.project.touch();
        Ok(())
    }

    /// Move a layer to `new_index` in render order and renumber orderings
    /// densely, preserving uniqueness.
    pub fn reorder_layer(&mut self, id: Uuid, new_index: usize) -> VisageResult<()> {
        if self.project.layer(id).is_none() {
            return Err(VisageError::validation(format!("unknown layer {id}")));
        }
        self.snapshot();

        let mut ids: Vec<Uuid> = self.project.sorted_layers().iter().map(|l| l.id).collect();
        ids.retain(|&x| x != id);
        let idx = new_index.min(ids.len());
        ids.insert(idx, id);

        for (i, lid) in ids.iter().enumerate() {
            if let Some(layer) = self.project.layer_mut(*lid) {
                layer.ordering = i as i32;
            }
        }
        self.project.touch();
        Ok(())
    }

    pub fn set_layer_visible(&mut self, id: Uuid, visible: bool) -> VisageResult<()> {
        self.with_layer(id, |l| l.visible = visible)
    }

    pub fn set_layer_opacity(&mut self, id: Uuid, opacity: f32) -> VisageResult<()> {
        self.with_layer(id, |l| l.opacity = opacity)
    }

    pub fn set_layer_blend(&mut self, id: Uuid, blend: BlendMode) -> VisageResult<()> {
        self.with_layer(id, |l| l.blend = blend)
    }

    pub fn set_layer_color(&mut self, id: Uuid, color: Rgba8) -> VisageResult<()> {
        self.with_layer(id, |l| l.color = color)
    }

    pub fn set_layer_region(&mut self, id: Uuid, region: FaceRegion) -> VisageResult<()> {
        self.with_layer(id, |l| {
            l.region = region;
            // A region change orphans the cached auto mask.
            if l.auto_mask.as_ref().is_some_and(|m| m.from_region) {
                l.auto_mask = None;
            }
        })
    }

    pub fn set_layer_brush(&mut self, id: Uuid, size_px: f32, hardness: f32) -> VisageResult<()> {
        self.with_layer(id, |l| {
            l.size_px = size_px;
            l.hardness = hardness;
        })
    }

    /// Attach a hand-drawn mask polygon. Manual masks survive landmark
    /// recomputes; they are only replaced explicitly.
    pub fn set_manual_mask(
        &mut self,
        id: Uuid,
        polygon: Vec<Point>,
        feather_px: f32,
    ) -> VisageResult<()> {
        if polygon.len() < 3 {
            return Err(VisageError::validation(
                "manual mask polygon needs at least 3 points",
            ));
        }
        let mut h = StableHasher::new();
        for p in &polygon {
            h.write_f64(p.x);
            h.write_f64(p.y);
        }
        let key = h.finish().hi;
        self.with_layer(id, |l| {
            l.auto_mask = Some(Mask {
                id: Uuid::new_v4(),
                polygon,
                feather_px: feather_px.max(0.0),
                from_region: false,
                source_key: key,
            });
        })
    }

    pub fn clear_mask(&mut self, id: Uuid) -> VisageResult<()> {
        self.with_layer(id, |l| l.auto_mask = None)
    }

    /// Replace the layer stack from a look preset.
    pub fn apply_preset(&mut self, preset: &LookPreset) {
        self.snapshot();
        self.project.layers = preset.seed_layers();
        self.project.look_preset_id = Some(preset.id);
        self.cache.retain_layers(&self.project);
        self.project.touch();
    }

    // ---- stroke lifecycle ----

    /// Start a pointer-drag gesture on a layer. Fails if another stroke is
    /// already in flight.
    pub fn begin_stroke(
        &mut self,
        layer_id: Uuid,
        kind: StrokeKind,
        brush: &BrushSettings,
    ) -> VisageResult<()> {
        if self.in_progress.is_some() {
            return Err(VisageError::validation("a stroke is already in progress"));
        }
        if self.project.layer(layer_id).is_none() {
            return Err(VisageError::validation(format!("unknown layer {layer_id}")));
        }
        let brush = brush.clamped();
        self.in_progress = Some(InProgress {
            layer_id,
            stroke: Stroke::new(kind, brush.spacing, brush.jitter),
        });
        Ok(())
    }

    /// Append a pointer sample to the in-progress stroke. Runs synchronously
    /// with input events; no rasterization happens here.
    pub fn extend_stroke(&mut self, x: f64, y: f64, pressure: Option<f32>) -> VisageResult<()> {
        let Some(ip) = &mut self.in_progress else {
            return Err(VisageError::validation("no stroke in progress"));
        };
        ip.stroke.points.push(StrokePoint { pos: Point::new(x, y), pressure });
        Ok(())
    }

    /// Abort the in-progress stroke (pointer left the canvas). Nothing is
    /// committed and no history entry is recorded.
    pub fn cancel_stroke(&mut self) {
        self.in_progress = None;
    }

    /// Commit the in-progress stroke to its layer, mirroring it across the
    /// symmetry axis when the guide is on and the region is bilateral.
    /// Returns the committed stroke ids. The append is atomic: a composite
    /// read sees the stroke(s) fully or not at all.
    #[tracing::instrument(skip(self))]
    pub fn commit_stroke(&mut self) -> VisageResult<Vec<Uuid>> {
        let Some(ip) = self.in_progress.take() else {
            return Err(VisageError::validation("no stroke in progress"));
        };
        // A degenerate gesture is discarded wholesale; no partial commit.
        ip.stroke.validate()?;

        let layer = self
            .project
            .layer(ip.layer_id)
            .ok_or_else(|| VisageError::validation(format!("unknown layer {}", ip.layer_id)))?;

        let mut strokes = vec![ip.stroke];
        if self.project.symmetry_guide
            && layer.region.is_bilateral()
            && let Some(axis) = symmetry_axis(self.landmarks.as_ref(), self.pixels.size())
        {
            strokes.push(mirror_stroke(&strokes[0], axis));
        }

        self.snapshot();
        let ids: Vec<Uuid> = strokes.iter().map(|s| s.id).collect();
        let layer = self
            .project
            .layer_mut(ip.layer_id)
            .ok_or_else(|| VisageError::validation(format!("unknown layer {}", ip.layer_id)))?;
        layer.strokes.extend(strokes);
        self.project.touch();
        Ok(ids)
    }

    // ---- history ----

    pub fn undo(&mut self) -> bool {
        let current = self.project.layers.clone();
        match self.history.undo(current) {
            Some(layers) => {
                self.project.layers = layers;
                self.project.touch();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        let current = self.project.layers.clone();
        match self.history.redo(current) {
            Some(layers) => {
                self.project.layers = layers;
                self.project.touch();
                true
            }
            None => false,
        }
    }

    // ---- rendering ----

    /// Re-resolve stale auto masks in place so the stored project carries a
    /// current mask cache. Layers without a usable source keep `None` and
    /// composite as transparent.
    fn refresh_masks(&mut self) {
        let size = self.pixels.size();
        let landmarks = self.landmarks.clone();
        for layer in &mut self.project.layers {
            if layer.region == FaceRegion::Custom {
                continue; // manual masks only; nothing to derive
            }
            let expected = mask_source_key(
                layer.region,
                landmarks.as_ref(),
                None,
                size,
                layer.size_px,
                layer.hardness,
            );
            let fresh = layer
                .auto_mask
                .as_ref()
                .is_some_and(|m| !m.from_region || m.source_key == expected);
            if fresh {
                continue;
            }
            layer.auto_mask = resolve_mask(
                layer.region,
                landmarks.as_ref(),
                None,
                size,
                layer.size_px,
                layer.hardness,
            )
            .ok();
        }
    }

    /// Composite the full layer stack over the photo. The in-progress stroke
    /// is never included.
    pub fn composite(&mut self) -> VisageResult<ImageRgba8> {
        self.refresh_masks();
        composite_project_with_cache(
            &self.pixels,
            &self.project,
            self.landmarks.as_ref(),
            &mut self.cache,
        )
    }

    /// Dropper tool: the composited color under a pixel.
    pub fn sample_color(&mut self, x: u32, y: u32) -> VisageResult<Rgba8> {
        if !self.pixels.size().contains(i64::from(x), i64::from(y)) {
            return Err(VisageError::validation("sample point outside the photo"));
        }
        let out = self.composite()?;
        let [r, g, b, a] = out.pixel(x, y);
        Ok(Rgba8::rgba(r, g, b, a))
    }

    /// Encode the current composite, optionally as a before/after pair.
    #[tracing::instrument(skip(self, settings))]
    pub fn export(&mut self, settings: &ExportSettings) -> VisageResult<Vec<u8>> {
        let composited = self.composite()?;
        if settings.before_after {
            encode_before_after(&self.pixels, &composited, settings)
        } else {
            encode_image(&composited, settings)
        }
    }

    /// One frame per committed stroke, replayed in commit order over the
    /// bare photo.
    pub fn timelapse_frames(&mut self) -> VisageResult<Vec<ImageRgba8>> {
        self.refresh_masks();
        render_timelapse(&self.pixels, &self.project, self.landmarks.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::PhotoSource;

    fn session(w: u32, h: u32) -> EditSession {
        let photo = Photo::new(PhotoSource::Upload, w, h).unwrap();
        let pixels = ImageRgba8::filled(w, h, Rgba8::rgb(128, 128, 128));
        let project = Project::new("test", &photo);
        EditSession::new(project, photo, pixels, None, SessionOpts::default()).unwrap()
    }

    #[test]
    fn new_rejects_mismatched_pixels() {
        let photo = Photo::new(PhotoSource::Upload, 10, 10).unwrap();
        let pixels = ImageRgba8::new(5, 5);
        let project = Project::new("test", &photo);
        assert!(
            EditSession::new(project, photo, pixels, None, SessionOpts::default()).is_err()
        );
    }

    #[test]
    fn add_layer_assigns_unique_ordering() {
        let mut s = session(32, 32);
        let brush = BrushSettings::default();
        let a = s.add_layer(LayerType::Foundation, FaceRegion::FullFace, &brush);
        let b = s.add_layer(LayerType::Lipstick, FaceRegion::Lips, &brush);
        assert_ne!(a, b);
        s.project().validate().unwrap();
        assert_eq!(s.project().layers.len(), 2);
        assert_eq!(s.undo_depth(), 2);
    }

    #[test]
    fn stroke_lifecycle_is_atomic() {
        let mut s = session(64, 64);
        let brush = BrushSettings::default();
        let layer = s.add_layer(LayerType::Foundation, FaceRegion::FullFace, &brush);

        s.begin_stroke(layer, StrokeKind::Paint, &brush).unwrap();
        s.extend_stroke(10.0, 10.0, None).unwrap();
        s.extend_stroke(30.0, 30.0, Some(0.5)).unwrap();
        assert!(s.has_stroke_in_progress());
        // Not visible until committed.
        assert!(s.project().layers[0].strokes.is_empty());

        let ids = s.commit_stroke().unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(s.project().layers[0].strokes.len(), 1);
        assert!(!s.has_stroke_in_progress());
    }

    #[test]
    fn cancel_discards_without_history() {
        let mut s = session(64, 64);
        let brush = BrushSettings::default();
        let layer = s.add_layer(LayerType::Foundation, FaceRegion::FullFace, &brush);
        let depth = s.undo_depth();

        s.begin_stroke(layer, StrokeKind::Paint, &brush).unwrap();
        s.extend_stroke(10.0, 10.0, None).unwrap();
        s.cancel_stroke();

        assert!(s.project().layers[0].strokes.is_empty());
        assert_eq!(s.undo_depth(), depth);
    }

    #[test]
    fn empty_commit_is_invalid_stroke() {
        let mut s = session(64, 64);
        let brush = BrushSettings::default();
        let layer = s.add_layer(LayerType::Foundation, FaceRegion::FullFace, &brush);

        s.begin_stroke(layer, StrokeKind::Paint, &brush).unwrap();
        let err = s.commit_stroke().unwrap_err();
        assert!(matches!(err, VisageError::InvalidStroke(_)));
        assert!(!s.has_stroke_in_progress());
        assert!(s.project().layers[0].strokes.is_empty());
    }

    #[test]
    fn undo_redo_restore_layer_lists() {
        let mut s = session(32, 32);
        let brush = BrushSettings::default();
        s.add_layer(LayerType::Foundation, FaceRegion::FullFace, &brush);
        let before = s.project().layers.clone();

        s.add_layer(LayerType::Lipstick, FaceRegion::Lips, &brush);
        let after = s.project().layers.clone();

        assert!(s.undo());
        assert_eq!(s.project().layers, before);
        assert!(s.redo());
        assert_eq!(s.project().layers, after);
        assert!(!s.redo());
    }

    #[test]
    fn symmetry_commits_mirrored_stroke() {
        let mut s = session(400, 300);
        let brush = BrushSettings::default();
        let layer = s.add_layer(LayerType::Blush, FaceRegion::Cheeks, &brush);
        s.set_symmetry_guide(true);

        s.begin_stroke(layer, StrokeKind::Paint, &brush).unwrap();
        s.extend_stroke(100.0, 150.0, None).unwrap();
        s.extend_stroke(110.0, 160.0, None).unwrap();
        let ids = s.commit_stroke().unwrap();
        assert_eq!(ids.len(), 2);

        let strokes = &s.project().layers[0].strokes;
        assert_eq!(strokes[0].points[0].pos.x, 100.0);
        // Photo center axis at x=200.
        assert_eq!(strokes[1].points[0].pos.x, 300.0);
        assert_eq!(strokes[1].points[0].pos.y, 150.0);
    }

    #[test]
    fn non_bilateral_region_is_not_mirrored() {
        let mut s = session(400, 300);
        let brush = BrushSettings::default();
        let layer = s.add_layer(LayerType::Lipstick, FaceRegion::Lips, &brush);
        s.set_symmetry_guide(true);

        s.begin_stroke(layer, StrokeKind::Paint, &brush).unwrap();
        s.extend_stroke(180.0, 220.0, None).unwrap();
        let ids = s.commit_stroke().unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn reorder_renumbers_densely() {
        let mut s = session(32, 32);
        let brush = BrushSettings::default();
        let a = s.add_layer(LayerType::Foundation, FaceRegion::FullFace, &brush);
        let b = s.add_layer(LayerType::Blush, FaceRegion::Cheeks, &brush);
        let c = s.add_layer(LayerType::Lipstick, FaceRegion::Lips, &brush);

        s.reorder_layer(c, 0).unwrap();
        let order: Vec<Uuid> = s.project().sorted_layers().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![c, a, b]);
        s.project().validate().unwrap();
    }

    #[test]
    fn updated_at_advances_on_commit() {
        let mut s = session(32, 32);
        let brush = BrushSettings::default();
        let before = s.project().updated_at;
        s.add_layer(LayerType::Foundation, FaceRegion::FullFace, &brush);
        assert!(s.project().updated_at >= before);
    }

    #[test]
    fn apply_preset_replaces_layers() {
        let mut s = session(32, 32);
        let brush = BrushSettings::default();
        s.add_layer(LayerType::Custom, FaceRegion::Custom, &brush);

        let preset = LookPreset {
            id: Uuid::new_v4(),
            name: "natural".to_string(),
            layers: vec![],
        };
        s.apply_preset(&preset);
        assert!(s.project().layers.is_empty());
        assert_eq!(s.project().look_preset_id, Some(preset.id));
        assert!(s.undo());
        assert_eq!(s.project().layers.len(), 1);
    }
}
