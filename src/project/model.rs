use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    foundation::core::{PhotoSize, Point, clamp01_f32},
    foundation::error::{VisageError, VisageResult},
    foundation::fingerprint::StableHasher,
    project::color::{DEFAULT_PALETTE, Rgba8},
};

pub const MIN_BRUSH_PX: f32 = 1.0;
pub const MAX_BRUSH_PX: f32 = 1024.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PhotoSource {
    Upload,
    Webcam,
}

/// Immutable record describing the photo being edited. The pixel buffer
/// itself lives with the host; the engine receives it separately and never
/// mutates it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub source: PhotoSource,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

impl Photo {
    pub fn new(source: PhotoSource, width: u32, height: u32) -> VisageResult<Self> {
        PhotoSize::new(width, height)?;
        Ok(Self {
            id: Uuid::new_v4(),
            source,
            width,
            height,
            captured_at: Utc::now(),
        })
    }

    pub fn size(&self) -> PhotoSize {
        PhotoSize {
            width: self.width,
            height: self.height,
        }
    }
}

/// Detector output keyed to a photo. Read-only input; the engine treats
/// absence as a degraded-but-functional mode.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Landmarks {
    pub id: Uuid,
    pub model: String,
    pub points: Vec<Point>,
    pub mesh_triangles: Vec<[u32; 3]>,
    pub quality_score: f32,
}

impl Landmarks {
    /// Stable token over everything a mask derivation can observe. Mask cache
    /// keys include this so recomputed landmarks invalidate cached masks.
    pub fn version_token(&self) -> u64 {
        let mut h = StableHasher::new();
        h.write_str(&self.model);
        h.write_u64(self.points.len() as u64);
        for p in &self.points {
            h.write_f64(p.x);
            h.write_f64(p.y);
        }
        h.write_u64(self.mesh_triangles.len() as u64);
        h.write_f32(self.quality_score);
        h.finish().hi
    }

    /// X-coordinate of the face's vertical midline. Uses the nose-bridge
    /// points of the 68-point convention when present, otherwise the mean of
    /// all point x-coordinates. `None` when there are no points at all.
    pub fn midline_x(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        let bridge: &[Point] = if self.points.len() >= 31 {
            &self.points[27..=30]
        } else {
            &self.points
        };
        let sum: f64 = bridge.iter().map(|p| p.x).sum();
        Some(sum / bridge.len() as f64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LayerType {
    Foundation,
    Concealer,
    Contour,
    Blush,
    Highlight,
    Eyeshadow,
    Eyeliner,
    Eyebrow,
    Mascara,
    Lipstick,
    Custom,
}

impl LayerType {
    /// The region a fresh layer of this type targets by default.
    pub fn default_region(self) -> FaceRegion {
        match self {
            Self::Foundation => FaceRegion::FullFace,
            Self::Concealer => FaceRegion::UnderEye,
            Self::Contour => FaceRegion::Cheeks,
            Self::Blush => FaceRegion::Cheeks,
            Self::Highlight => FaceRegion::Cheeks,
            Self::Eyeshadow => FaceRegion::UpperLid,
            Self::Eyeliner => FaceRegion::LashLine,
            Self::Eyebrow => FaceRegion::Brow,
            Self::Mascara => FaceRegion::LashLine,
            Self::Lipstick => FaceRegion::Lips,
            Self::Custom => FaceRegion::Custom,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FaceRegion {
    FullFace,
    UnderEye,
    Cheeks,
    Nose,
    Forehead,
    Chin,
    UpperLid,
    LowerLid,
    LashLine,
    Brow,
    Lips,
    Custom,
}

impl FaceRegion {
    /// Regions with a natural left/right counterpart. Only these participate
    /// in symmetry mirroring.
    pub fn is_bilateral(self) -> bool {
        matches!(
            self,
            Self::UnderEye
                | Self::Cheeks
                | Self::UpperLid
                | Self::LowerLid
                | Self::LashLine
                | Self::Brow
        )
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::FullFace => 0,
            Self::UnderEye => 1,
            Self::Cheeks => 2,
            Self::Nose => 3,
            Self::Forehead => 4,
            Self::Chin => 5,
            Self::UpperLid => 6,
            Self::LowerLid => 7,
            Self::LashLine => 8,
            Self::Brow => 9,
            Self::Lips => 10,
            Self::Custom => 11,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Overlay,
    SoftLight,
    Darken,
    Lighten,
    Color,
    Burn,
    Dodge,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StrokeKind {
    #[default]
    Paint,
    /// Subtracts from the layer's accumulated paint coverage.
    Erase,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StrokePoint {
    pub pos: Point,
    /// Stylus pressure in [0,1]. Absent means full pressure.
    pub pressure: Option<f32>,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            pos: Point::new(x, y),
            pressure: None,
        }
    }

    pub fn with_pressure(x: f64, y: f64, pressure: f32) -> Self {
        Self {
            pos: Point::new(x, y),
            pressure: Some(pressure),
        }
    }
}

/// One committed brush gesture. Append-only once inside a layer; an
/// in-progress stroke (not yet committed) is mutable.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stroke {
    pub id: Uuid,
    #[serde(default)]
    pub kind: StrokeKind,
    pub points: Vec<StrokePoint>,
    /// Stamp interval as a fraction of brush size.
    pub spacing: f32,
    /// Per-stamp random displacement as a fraction of brush size.
    pub jitter: f32,
    pub created_at: DateTime<Utc>,
}

impl Stroke {
    pub fn new(kind: StrokeKind, spacing: f32, jitter: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            points: Vec::new(),
            spacing,
            jitter,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> VisageResult<()> {
        if self.points.is_empty() {
            return Err(VisageError::invalid_stroke("stroke has no sample points"));
        }
        for p in &self.points {
            if !p.pos.x.is_finite() || !p.pos.y.is_finite() {
                return Err(VisageError::invalid_stroke(
                    "stroke sample position must be finite",
                ));
            }
            if let Some(pr) = p.pressure
                && !(0.0..=1.0).contains(&pr)
            {
                return Err(VisageError::invalid_stroke(
                    "stroke pressure must be in [0,1]",
                ));
            }
        }
        if !self.spacing.is_finite() || self.spacing <= 0.0 {
            return Err(VisageError::invalid_stroke("spacing must be > 0"));
        }
        if !self.jitter.is_finite() || self.jitter < 0.0 {
            return Err(VisageError::invalid_stroke("jitter must be >= 0"));
        }
        Ok(())
    }
}

/// Where a layer's paint is visible: a closed polygon plus a feather radius.
/// Outside the polygon, alpha ramps from full at the edge to zero at
/// `feather_px` out.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Mask {
    pub id: Uuid,
    pub polygon: Vec<Point>,
    pub feather_px: f32,
    /// Auto-derived from a region (invalidated by the cache key) vs drawn by
    /// hand (kept until replaced).
    pub from_region: bool,
    /// Fingerprint of the inputs this mask was resolved from.
    pub source_key: u64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    pub id: Uuid,
    pub kind: LayerType,
    pub region: FaceRegion,
    pub visible: bool,
    pub opacity: f32,
    pub blend: BlendMode,
    pub color: Rgba8,
    pub hardness: f32,
    pub size_px: f32,
    pub strokes: Vec<Stroke>,
    pub ordering: i32,
    pub auto_mask: Option<Mask>,
}

impl Layer {
    pub fn new(kind: LayerType, region: FaceRegion, brush: &BrushSettings, ordering: i32) -> Self {
        let brush = brush.clamped();
        Self {
            id: Uuid::new_v4(),
            kind,
            region,
            visible: true,
            opacity: brush.opacity,
            blend: BlendMode::Normal,
            color: brush.color,
            hardness: brush.hardness,
            size_px: brush.size_px,
            strokes: Vec::new(),
            ordering,
            auto_mask: None,
        }
    }

    /// Force opacity/hardness into [0,1] and brush size into its legal range.
    pub fn clamp_ranges(&mut self) {
        self.opacity = clamp01_f32(self.opacity);
        self.hardness = clamp01_f32(self.hardness);
        self.size_px = if self.size_px.is_finite() {
            self.size_px.clamp(MIN_BRUSH_PX, MAX_BRUSH_PX)
        } else {
            MIN_BRUSH_PX
        };
    }

    pub fn validate(&self) -> VisageResult<()> {
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(VisageError::validation(format!(
                "layer '{}' opacity must be in [0,1]",
                self.id
            )));
        }
        if !(0.0..=1.0).contains(&self.hardness) {
            return Err(VisageError::validation(format!(
                "layer '{}' hardness must be in [0,1]",
                self.id
            )));
        }
        if !self.size_px.is_finite() || self.size_px < MIN_BRUSH_PX || self.size_px > MAX_BRUSH_PX {
            return Err(VisageError::validation(format!(
                "layer '{}' brush size must be in [{MIN_BRUSH_PX},{MAX_BRUSH_PX}] px",
                self.id
            )));
        }
        for s in &self.strokes {
            s.validate()?;
        }
        Ok(())
    }
}

/// The unit of persistence. Owns its layers; references photo and landmarks
/// by id only.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub photo_id: Uuid,
    pub landmarks_id: Option<Uuid>,
    pub layers: Vec<Layer>,
    pub symmetry_guide: bool,
    pub look_preset_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl Project {
    pub fn new(title: impl Into<String>, photo: &Photo) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            created_at: now,
            updated_at: now,
            photo_id: photo.id,
            landmarks_id: None,
            layers: Vec::new(),
            symmetry_guide: false,
            look_preset_id: None,
            notes: None,
        }
    }

    pub fn validate(&self) -> VisageResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for layer in &self.layers {
            layer.validate()?;
            if !seen.insert(layer.ordering) {
                return Err(VisageError::validation(format!(
                    "duplicate layer ordering {}",
                    layer.ordering
                )));
            }
        }
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn layer(&self, id: Uuid) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: Uuid) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Layers in render order (ascending `ordering`, bottom to top).
    pub fn sorted_layers(&self) -> Vec<&Layer> {
        let mut out: Vec<&Layer> = self.layers.iter().collect();
        out.sort_by_key(|l| l.ordering);
        out
    }

    pub fn next_ordering(&self) -> i32 {
        self.layers
            .iter()
            .map(|l| l.ordering)
            .max()
            .map_or(0, |m| m.saturating_add(1))
    }
}

/// Explicit, validated brush configuration. Defaults mirror the original
/// editor sliders (size 40, opacity 80%, softness 50%).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BrushSettings {
    pub size_px: f32,
    pub hardness: f32,
    pub opacity: f32,
    pub color: Rgba8,
    pub spacing: f32,
    pub jitter: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size_px: 40.0,
            hardness: 0.5,
            opacity: 0.8,
            color: DEFAULT_PALETTE[0],
            spacing: 0.25,
            jitter: 0.0,
        }
    }
}

impl BrushSettings {
    pub fn validate(&self) -> VisageResult<()> {
        if !self.size_px.is_finite() || self.size_px < MIN_BRUSH_PX || self.size_px > MAX_BRUSH_PX {
            return Err(VisageError::validation(format!(
                "brush size must be in [{MIN_BRUSH_PX},{MAX_BRUSH_PX}] px"
            )));
        }
        if !(0.0..=1.0).contains(&self.hardness) {
            return Err(VisageError::validation("brush hardness must be in [0,1]"));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(VisageError::validation("brush opacity must be in [0,1]"));
        }
        if !self.spacing.is_finite() || self.spacing <= 0.0 {
            return Err(VisageError::validation("brush spacing must be > 0"));
        }
        if !self.jitter.is_finite() || self.jitter < 0.0 {
            return Err(VisageError::validation("brush jitter must be >= 0"));
        }
        Ok(())
    }

    pub fn clamped(&self) -> Self {
        Self {
            size_px: if self.size_px.is_finite() {
                self.size_px.clamp(MIN_BRUSH_PX, MAX_BRUSH_PX)
            } else {
                MIN_BRUSH_PX
            },
            hardness: clamp01_f32(self.hardness),
            opacity: clamp01_f32(self.opacity),
            color: self.color,
            spacing: if self.spacing.is_finite() && self.spacing > 0.0 {
                self.spacing
            } else {
                0.25
            },
            jitter: if self.jitter.is_finite() && self.jitter >= 0.0 {
                self.jitter
            } else {
                0.0
            },
        }
    }
}

/// One layer of a look preset, as delivered by the content catalog.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LayerConfig {
    pub kind: LayerType,
    pub region: FaceRegion,
    pub opacity: f32,
    pub blend: BlendMode,
    pub color: Rgba8,
    pub hardness: f32,
    pub size_px: f32,
    pub ordering: i32,
}

/// Predefined layer stack used to seed a new project.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LookPreset {
    pub id: Uuid,
    pub name: String,
    pub layers: Vec<LayerConfig>,
}

impl LookPreset {
    /// Build a fresh layer list from the preset's configs: sorted by the
    /// preset ordering, renumbered densely, all ranges clamped.
    pub fn seed_layers(&self) -> Vec<Layer> {
        let mut configs: Vec<&LayerConfig> = self.layers.iter().collect();
        configs.sort_by_key(|c| c.ordering);

        configs
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let mut layer = Layer {
                    id: Uuid::new_v4(),
                    kind: c.kind,
                    region: c.region,
                    visible: true,
                    opacity: c.opacity,
                    blend: c.blend,
                    color: c.color,
                    hardness: c.hardness,
                    size_px: c.size_px,
                    strokes: Vec::new(),
                    ordering: i as i32,
                    auto_mask: None,
                };
                layer.clamp_ranges();
                layer
            })
            .collect()
    }
}
