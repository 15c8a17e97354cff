use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use uuid::Uuid;

use crate::{
    brush::raster::rasterize_stroke,
    foundation::core::PhotoSize,
    foundation::error::{VisageError, VisageResult},
    foundation::fingerprint::StableHasher,
    foundation::math::mul_div255_u8,
    mask::resolve::{MaskRaster, mask_source_key, rasterize_mask, resolve_mask},
    project::model::{Landmarks, Layer, Project, StrokeKind},
    render::blend::composite_pixel,
    render::raster::ImageRgba8,
};

/// Deterministic jitter seed for a stroke, derived from its id so a stroke
/// re-rasterizes identically across sessions.
pub(crate) fn stroke_seed(id: Uuid) -> u64 {
    let mut h = StableHasher::new();
    h.write_bytes(id.as_bytes());
    h.finish().hi
}

fn layer_coverage_key(layer: &Layer, photo: PhotoSize) -> u64 {
    let mut h = StableHasher::new();
    h.write_bytes(layer.id.as_bytes());
    h.write_u32(photo.width);
    h.write_u32(photo.height);
    h.write_f32(layer.size_px);
    h.write_f32(layer.hardness);
    h.write_u64(layer.strokes.len() as u64);
    for s in &layer.strokes {
        h.write_bytes(s.id.as_bytes());
    }
    h.finish().hi
}

/// Accumulated coverage for one layer over the full photo: paint strokes
/// merge by pixel-wise maximum, erase strokes subtract, in commit order.
fn accumulate_layer_coverage(layer: &Layer, photo: PhotoSize) -> VisageResult<Vec<u8>> {
    let mut coverage = vec![0u8; photo.pixel_count()];
    let width = photo.width as usize;

    for stroke in &layer.strokes {
        let raster = rasterize_stroke(
            stroke,
            layer.size_px,
            layer.hardness,
            photo,
            stroke_seed(stroke.id),
        )?;
        if raster.is_empty() {
            continue;
        }

        for row in 0..raster.height as usize {
            let y = raster.y0 as usize + row;
            let src = &raster.coverage[row * raster.width as usize..][..raster.width as usize];
            let dst = &mut coverage[y * width + raster.x0 as usize..][..raster.width as usize];
            match stroke.kind {
                StrokeKind::Paint => {
                    for (d, &s) in dst.iter_mut().zip(src) {
                        *d = (*d).max(s);
                    }
                }
                StrokeKind::Erase => {
                    for (d, &s) in dst.iter_mut().zip(src) {
                        *d = d.saturating_sub(s);
                    }
                }
            }
        }
    }

    Ok(coverage)
}

/// Per-layer coverage memo. Keys fold in the stroke list, brush geometry and
/// photo dims, so any edit that changes the accumulated raster misses.
#[derive(Default)]
pub struct CompositeCache {
    layers: HashMap<Uuid, CachedLayer>,
}

struct CachedLayer {
    key: u64,
    coverage: Arc<Vec<u8>>,
}

impl CompositeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries for layers that no longer exist.
    pub fn retain_layers(&mut self, project: &Project) {
        self.layers
            .retain(|id, _| project.layers.iter().any(|l| l.id == *id));
    }

    fn coverage_for(&mut self, layer: &Layer, photo: PhotoSize) -> VisageResult<Arc<Vec<u8>>> {
        let key = layer_coverage_key(layer, photo);
        if let Some(entry) = self.layers.get(&layer.id)
            && entry.key == key
        {
            return Ok(Arc::clone(&entry.coverage));
        }
        let coverage = Arc::new(accumulate_layer_coverage(layer, photo)?);
        self.layers.insert(
            layer.id,
            CachedLayer {
                key,
                coverage: Arc::clone(&coverage),
            },
        );
        Ok(coverage)
    }
}

/// A layer's mask raster, or `None` when the layer has no usable mask source
/// and must composite as fully transparent.
fn mask_for_layer(
    layer: &Layer,
    landmarks: Option<&Landmarks>,
    photo: PhotoSize,
) -> VisageResult<Option<MaskRaster>> {
    // Manual masks are used as stored; auto masks only when their source key
    // is still current.
    if let Some(mask) = &layer.auto_mask {
        let fresh = !mask.from_region
            || mask.source_key
                == mask_source_key(
                    layer.region,
                    landmarks,
                    None,
                    photo,
                    layer.size_px,
                    layer.hardness,
                );
        if fresh {
            return Ok(Some(rasterize_mask(mask, photo)));
        }
    }

    let manual = layer
        .auto_mask
        .as_ref()
        .filter(|m| !m.from_region)
        .map(|m| m.polygon.clone());

    match resolve_mask(
        layer.region,
        landmarks,
        manual.as_deref(),
        photo,
        layer.size_px,
        layer.hardness,
    ) {
        Ok(mask) => Ok(Some(rasterize_mask(&mask, photo))),
        // One broken layer never blanks the canvas.
        Err(VisageError::MissingGeometry(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Composite every visible layer over the base photo, bottom to top.
pub fn composite_project(
    photo: &ImageRgba8,
    project: &Project,
    landmarks: Option<&Landmarks>,
) -> VisageResult<ImageRgba8> {
    let mut cache = CompositeCache::new();
    composite_project_with_cache(photo, project, landmarks, &mut cache)
}

/// [`composite_project`] with a reusable per-layer coverage cache. The cache
/// makes recomposition after a single-layer edit proportional to the edited
/// layer plus the blend sweep, not a full re-rasterization of every stroke.
pub fn composite_project_with_cache(
    photo: &ImageRgba8,
    project: &Project,
    landmarks: Option<&Landmarks>,
    cache: &mut CompositeCache,
) -> VisageResult<ImageRgba8> {
    if photo.is_empty() {
        return Err(VisageError::validation("photo dimensions must be > 0"));
    }
    project.validate()?;

    let size = photo.size();
    let mut out = photo.clone();

    for layer in project.sorted_layers() {
        if !layer.visible || layer.opacity <= 0.0 || layer.strokes.is_empty() {
            continue;
        }

        let Some(mask) = mask_for_layer(layer, landmarks, size)? else {
            continue;
        };
        let coverage = cache.coverage_for(layer, size)?;

        let opacity = (f64::from(layer.opacity) * 255.0).round() as u16;
        let color = layer.color.rgb_f32();
        let blend = layer.blend;
        let width = size.width as usize;

        out.data
            .par_chunks_exact_mut(width * 4)
            .enumerate()
            .for_each(|(y, row)| {
                let cov_row = &coverage[y * width..][..width];
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let cov = cov_row[x];
                    if cov == 0 {
                        continue;
                    }
                    let m = mask.alpha_at(x as u32, y as u32);
                    if m == 0 {
                        continue;
                    }
                    let a8 = mul_div255_u8(u16::from(mul_div255_u8(u16::from(cov), u16::from(m))), opacity);
                    if a8 == 0 {
                        continue;
                    }
                    let alpha = f32::from(a8) / 255.0;
                    let base = [
                        f32::from(px[0]) / 255.0,
                        f32::from(px[1]) / 255.0,
                        f32::from(px[2]) / 255.0,
                    ];
                    let res = composite_pixel(blend, base, color, alpha);
                    px[0] = (res[0].clamp(0.0, 1.0) * 255.0).round() as u8;
                    px[1] = (res[1].clamp(0.0, 1.0) * 255.0).round() as u8;
                    px[2] = (res[2].clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            });
    }

    Ok(out)
}
