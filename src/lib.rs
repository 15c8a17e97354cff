//! Visage is the compositing engine behind a makeup-practice editor: layered
//! brush strokes over a photo, clipped by face-region masks and merged with
//! photographic blend modes.
//!
//! The public API is session-oriented:
//!
//! - Build or load a [`Project`] (the serializable unit of persistence)
//! - Create an [`EditSession`] with the photo pixels and optional [`Landmarks`]
//! - Drive strokes through begin/extend/commit, then [`EditSession::composite`]
//!   or [`EditSession::export`]
//!
//! The engine performs no file I/O, camera access or storage; hosts supply
//! the photo buffer and persist the project. The CLI binary is the one thin
//! host shipped in-tree.
#![forbid(unsafe_code)]

pub mod brush;
pub mod export;
pub mod foundation;
pub mod mask;
pub mod project;
pub mod render;
pub mod session;

pub use brush::mirror::{mirror_stroke, symmetry_axis};
pub use brush::raster::{StrokeRaster, rasterize_stroke};
pub use export::encode::{
    ExportFormat, ExportSettings, encode_before_after, encode_image, render_timelapse,
    resize_to_max_edge,
};
pub use foundation::core::{PhotoSize, Point, Rect, Vec2};
pub use foundation::error::{VisageError, VisageResult};
pub use mask::resolve::{FEATHER_K, MaskRaster, feather_px, mask_source_key, rasterize_mask, resolve_mask};
pub use project::color::{DEFAULT_PALETTE, Rgba8};
pub use project::history::{DEFAULT_HISTORY_DEPTH, EditHistory};
pub use project::model::{
    BlendMode, BrushSettings, FaceRegion, Landmarks, Layer, LayerConfig, LayerType, LookPreset,
    MAX_BRUSH_PX, MIN_BRUSH_PX, Mask, Photo, PhotoSource, Project, Stroke, StrokeKind,
    StrokePoint,
};
pub use render::blend::{blend_rgb, composite_pixel};
pub use render::composite::{CompositeCache, composite_project, composite_project_with_cache};
pub use render::raster::ImageRgba8;
pub use session::{EditSession, SessionOpts};
