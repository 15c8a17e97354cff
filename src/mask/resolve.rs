use rayon::prelude::*;
use uuid::Uuid;

use crate::{
    foundation::core::{PhotoSize, Point, clamp01_f32},
    foundation::error::{VisageError, VisageResult},
    foundation::fingerprint::{Fingerprint, StableHasher},
    mask::geometry,
    project::model::{FaceRegion, Landmarks, Mask},
};

/// Feather scale: `feather = size_px * (1 - hardness) * FEATHER_K`. Soft
/// brushes bleed across mask edges; hard brushes clip sharply.
pub const FEATHER_K: f32 = 0.5;

/// Hull padding as a fraction of brush size, so strokes near a region edge
/// are not clipped mid-stamp.
const HULL_PAD_FRACTION: f64 = 0.25;

// Landmark index groups for the 68-point convention (jaw 0-16, brows 17-26,
// nose 27-35, eyes 36-47, lips 48-67).
const UNDER_EYE: &[usize] = &[36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 2, 14];
const CHEEKS: &[usize] = &[1, 2, 3, 4, 5, 11, 12, 13, 14, 15, 31, 35, 48, 54];
const NOSE: &[usize] = &[27, 28, 29, 30, 31, 32, 33, 34, 35];
const FOREHEAD: &[usize] = &[17, 18, 19, 20, 21, 22, 23, 24, 25, 26];
const CHIN: &[usize] = &[5, 6, 7, 8, 9, 10, 11, 57];
const UPPER_LID: &[usize] = &[
    17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47,
];
const LOWER_LID: &[usize] = &[36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47];
const LASH_LINE: &[usize] = &[36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47];
const BROW: &[usize] = &[17, 18, 19, 20, 21, 22, 23, 24, 25, 26];
const LIPS: &[usize] = &[48, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59];

fn region_indices(region: FaceRegion) -> Option<&'static [usize]> {
    match region {
        FaceRegion::FullFace | FaceRegion::Custom => None,
        FaceRegion::UnderEye => Some(UNDER_EYE),
        FaceRegion::Cheeks => Some(CHEEKS),
        FaceRegion::Nose => Some(NOSE),
        FaceRegion::Forehead => Some(FOREHEAD),
        FaceRegion::Chin => Some(CHIN),
        FaceRegion::UpperLid => Some(UPPER_LID),
        FaceRegion::LowerLid => Some(LOWER_LID),
        FaceRegion::LashLine => Some(LASH_LINE),
        FaceRegion::Brow => Some(BROW),
        FaceRegion::Lips => Some(LIPS),
    }
}

pub fn feather_px(size_px: f32, hardness: f32) -> f32 {
    size_px.max(0.0) * (1.0 - clamp01_f32(hardness)) * FEATHER_K
}

fn source_fingerprint(
    region: FaceRegion,
    landmarks: Option<&Landmarks>,
    manual_polygon: Option<&[Point]>,
    photo: PhotoSize,
    size_px: f32,
    hardness: f32,
) -> Fingerprint {
    let mut h = StableHasher::new();
    h.write_u8(region.tag());
    h.write_u32(photo.width);
    h.write_u32(photo.height);
    h.write_f32(size_px);
    h.write_f32(hardness);
    h.write_u64(landmarks.map_or(0, Landmarks::version_token));
    match manual_polygon {
        Some(poly) => {
            h.write_u64(poly.len() as u64);
            for p in poly {
                h.write_f64(p.x);
                h.write_f64(p.y);
            }
        }
        None => h.write_u64(u64::MAX),
    }
    h.finish()
}

/// Cache key for a layer's auto mask. A stored mask whose `source_key` no
/// longer matches must be re-resolved (landmark recompute, brush change,
/// photo replacement all change the key).
pub fn mask_source_key(
    region: FaceRegion,
    landmarks: Option<&Landmarks>,
    manual_polygon: Option<&[Point]>,
    photo: PhotoSize,
    size_px: f32,
    hardness: f32,
) -> u64 {
    source_fingerprint(region, landmarks, manual_polygon, photo, size_px, hardness).hi
}

/// Resolve a region into a mask.
///
/// `fullFace` covers the photo bounds. `custom` requires a manual polygon.
/// Other regions derive a padded convex hull from the landmark group, falling
/// back to the manual polygon when landmarks are absent or unusable. Fails
/// with `MissingGeometry` when no source remains.
///
/// Resolution is deterministic: identical inputs produce bit-identical masks
/// (the id is derived from the source fingerprint, not freshly generated).
pub fn resolve_mask(
    region: FaceRegion,
    landmarks: Option<&Landmarks>,
    manual_polygon: Option<&[Point]>,
    photo: PhotoSize,
    size_px: f32,
    hardness: f32,
) -> VisageResult<Mask> {
    if photo.is_empty() {
        return Err(VisageError::validation("photo dimensions must be > 0"));
    }

    let fp = source_fingerprint(region, landmarks, manual_polygon, photo, size_px, hardness);
    let feather = feather_px(size_px, hardness);

    let build = |polygon: Vec<Point>, from_region: bool| Mask {
        id: Uuid::from_u64_pair(fp.hi, fp.lo),
        polygon,
        feather_px: feather,
        from_region,
        source_key: fp.hi,
    };

    if region == FaceRegion::FullFace {
        let b = photo.bounds();
        return Ok(build(
            vec![
                Point::new(b.x0, b.y0),
                Point::new(b.x1, b.y0),
                Point::new(b.x1, b.y1),
                Point::new(b.x0, b.y1),
            ],
            true,
        ));
    }

    let manual = |from: &str| -> VisageResult<Mask> {
        match manual_polygon {
            Some(poly) if poly.len() >= 3 => Ok(build(poly.to_vec(), false)),
            Some(_) => Err(VisageError::validation(
                "manual mask polygon needs at least 3 points",
            )),
            None => Err(VisageError::missing_geometry(format!(
                "region {region:?}: {from}"
            ))),
        }
    };

    if region == FaceRegion::Custom {
        return manual("custom region requires a manual polygon");
    }

    let Some(lm) = landmarks else {
        return manual("no landmarks and no manual polygon");
    };

    let indices = region_indices(region).unwrap_or(&[]);
    let pts: Vec<Point> = indices
        .iter()
        .filter_map(|&i| lm.points.get(i))
        .copied()
        .collect();
    if pts.len() < 3 {
        return manual("landmark model has too few points for this region");
    }

    let hull = geometry::convex_hull(&pts);
    if hull.len() < 3 {
        return manual("region landmarks are collinear");
    }

    let mut polygon = geometry::dilate(&hull, f64::from(size_px) * HULL_PAD_FRACTION);

    // The brows bound the forehead from below; shift the brow hull up by its
    // own height to cover the forehead band.
    if region == FaceRegion::Forehead
        && let Some(bbox) = geometry::polygon_bbox(&polygon)
    {
        let shift = bbox.height();
        for p in &mut polygon {
            p.y -= shift;
        }
    }

    Ok(build(polygon, true))
}

/// Single-channel mask raster clipped to the photo. `alpha_at` returns 0
/// outside the stored window.
#[derive(Clone, Debug)]
pub struct MaskRaster {
    pub x0: i32,
    pub y0: i32,
    pub width: u32,
    pub height: u32,
    pub alpha: Vec<u8>,
}

impl MaskRaster {
    fn empty() -> Self {
        Self {
            x0: 0,
            y0: 0,
            width: 0,
            height: 0,
            alpha: Vec::new(),
        }
    }

    fn full(photo: PhotoSize) -> Self {
        Self {
            x0: 0,
            y0: 0,
            width: photo.width,
            height: photo.height,
            alpha: vec![255; photo.pixel_count()],
        }
    }

    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        let lx = i64::from(x) - i64::from(self.x0);
        let ly = i64::from(y) - i64::from(self.y0);
        if lx < 0 || ly < 0 || lx >= i64::from(self.width) || ly >= i64::from(self.height) {
            return 0;
        }
        self.alpha[ly as usize * self.width as usize + lx as usize]
    }
}

fn covers_photo(polygon: &[Point], photo: PhotoSize) -> bool {
    let Some(bbox) = geometry::polygon_bbox(polygon) else {
        return false;
    };
    let b = photo.bounds();
    polygon.len() >= 3
        && bbox.x0 <= b.x0
        && bbox.y0 <= b.y0
        && bbox.x1 >= b.x1
        && bbox.y1 >= b.y1
        && geometry::convex_hull(polygon).len() == polygon.len()
}

/// Rasterize a mask's polygon-plus-feather into per-pixel alpha. Inside the
/// polygon alpha is full; outside it ramps linearly to zero over the feather
/// radius.
pub fn rasterize_mask(mask: &Mask, photo: PhotoSize) -> MaskRaster {
    if mask.polygon.len() < 3 || photo.is_empty() {
        return MaskRaster::empty();
    }

    // A convex polygon enclosing the photo bounds keeps every pixel at full
    // alpha; skip the distance sweep (this is the fullFace fast path, and it
    // also keeps boundary pixels exact).
    if covers_photo(&mask.polygon, photo) {
        return MaskRaster::full(photo);
    }

    let feather = f64::from(mask.feather_px.max(0.0));
    let Some(bbox) = geometry::polygon_bbox(&mask.polygon) else {
        return MaskRaster::empty();
    };

    let x0 = ((bbox.x0 - feather).floor() as i64).max(0);
    let y0 = ((bbox.y0 - feather).floor() as i64).max(0);
    let x1 = ((bbox.x1 + feather).ceil() as i64 + 1).min(i64::from(photo.width));
    let y1 = ((bbox.y1 + feather).ceil() as i64 + 1).min(i64::from(photo.height));
    if x0 >= x1 || y0 >= y1 {
        return MaskRaster::empty();
    }

    let width = (x1 - x0) as usize;
    let height = (y1 - y0) as usize;
    let polygon = &mask.polygon;

    let mut alpha = vec![0u8; width * height];
    alpha
        .par_chunks_exact_mut(width)
        .enumerate()
        .for_each(|(row, out)| {
            let y = y0 + row as i64;
            for (col, cell) in out.iter_mut().enumerate() {
                let x = x0 + col as i64;
                let d = geometry::signed_distance(polygon, Point::new(x as f64, y as f64));
                let a = if d >= 0.0 {
                    1.0
                } else if feather > 0.0 {
                    (1.0 + d / feather).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                *cell = (a * 255.0).round() as u8;
            }
        });

    MaskRaster {
        x0: x0 as i32,
        y0: y0 as i32,
        width: width as u32,
        height: height as u32,
        alpha,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::Landmarks;

    fn photo() -> PhotoSize {
        PhotoSize::new(200, 160).unwrap()
    }

    fn landmarks_68() -> Landmarks {
        // A face-ish oval of 68 points; exact positions only matter for
        // determinism, not anatomy.
        let points = (0..68)
            .map(|i| {
                let t = i as f64 / 68.0 * std::f64::consts::TAU;
                Point::new(100.0 + 60.0 * t.cos(), 80.0 + 70.0 * t.sin())
            })
            .collect();
        Landmarks {
            id: Uuid::new_v4(),
            model: "mesh68".to_string(),
            points,
            mesh_triangles: vec![],
            quality_score: 0.95,
        }
    }

    #[test]
    fn full_face_covers_photo_bounds() {
        let mask = resolve_mask(FaceRegion::FullFace, None, None, photo(), 40.0, 0.5).unwrap();
        assert_eq!(mask.polygon.len(), 4);
        let raster = rasterize_mask(&mask, photo());
        assert_eq!(raster.alpha_at(0, 0), 255);
        assert_eq!(raster.alpha_at(199, 159), 255);
        assert_eq!(raster.alpha_at(100, 80), 255);
    }

    #[test]
    fn resolution_is_bit_identical_for_same_inputs() {
        let lm = landmarks_68();
        let a = resolve_mask(FaceRegion::Lips, Some(&lm), None, photo(), 24.0, 0.8).unwrap();
        let b = resolve_mask(FaceRegion::Lips, Some(&lm), None, photo(), 24.0, 0.8).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn cache_key_tracks_landmark_version() {
        let mut lm = landmarks_68();
        let k1 = mask_source_key(FaceRegion::Lips, Some(&lm), None, photo(), 24.0, 0.8);
        lm.points[50].x += 2.0;
        let k2 = mask_source_key(FaceRegion::Lips, Some(&lm), None, photo(), 24.0, 0.8);
        assert_ne!(k1, k2);

        let k3 = mask_source_key(FaceRegion::Lips, Some(&lm), None, photo(), 24.0, 0.2);
        assert_ne!(k2, k3);
    }

    #[test]
    fn missing_geometry_without_landmarks_or_manual() {
        let err = resolve_mask(FaceRegion::Cheeks, None, None, photo(), 40.0, 0.5).unwrap_err();
        assert!(matches!(err, VisageError::MissingGeometry(_)));
    }

    #[test]
    fn manual_polygon_fallback() {
        let poly = vec![
            Point::new(10.0, 10.0),
            Point::new(50.0, 10.0),
            Point::new(30.0, 40.0),
        ];
        let mask =
            resolve_mask(FaceRegion::Custom, None, Some(&poly), photo(), 40.0, 0.5).unwrap();
        assert!(!mask.from_region);
        assert_eq!(mask.polygon, poly);

        // Too few points is a validation error, not MissingGeometry.
        let short = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        let err =
            resolve_mask(FaceRegion::Custom, None, Some(&short), photo(), 40.0, 0.5).unwrap_err();
        assert!(matches!(err, VisageError::Validation(_)));
    }

    #[test]
    fn feather_follows_hardness() {
        assert_eq!(feather_px(40.0, 1.0), 0.0);
        assert_eq!(feather_px(40.0, 0.0), 40.0 * FEATHER_K);
        assert!(feather_px(40.0, 0.5) < feather_px(40.0, 0.25));
    }

    #[test]
    fn feather_ramps_outside_polygon() {
        let mask = Mask {
            id: Uuid::nil(),
            polygon: vec![
                Point::new(40.0, 40.0),
                Point::new(80.0, 40.0),
                Point::new(80.0, 80.0),
                Point::new(40.0, 80.0),
            ],
            feather_px: 10.0,
            from_region: true,
            source_key: 0,
        };
        let raster = rasterize_mask(&mask, photo());
        assert_eq!(raster.alpha_at(60, 60), 255); // interior
        let edge = raster.alpha_at(60, 85); // 5px outside
        assert!(edge > 0 && edge < 255);
        assert_eq!(raster.alpha_at(60, 95), 0); // beyond feather
    }

    #[test]
    fn hard_mask_clips_sharply() {
        let mask = Mask {
            id: Uuid::nil(),
            polygon: vec![
                Point::new(40.0, 40.0),
                Point::new(80.0, 40.0),
                Point::new(80.0, 80.0),
                Point::new(40.0, 80.0),
            ],
            feather_px: 0.0,
            from_region: true,
            source_key: 0,
        };
        let raster = rasterize_mask(&mask, photo());
        assert_eq!(raster.alpha_at(60, 60), 255);
        assert_eq!(raster.alpha_at(60, 81), 0);
    }

    #[test]
    fn region_hull_derives_from_landmarks() {
        let lm = landmarks_68();
        let mask = resolve_mask(FaceRegion::Lips, Some(&lm), None, photo(), 24.0, 0.5).unwrap();
        assert!(mask.from_region);
        assert!(mask.polygon.len() >= 3);
        // Hull must stay near the landmark cloud.
        let bbox = geometry::polygon_bbox(&mask.polygon).unwrap();
        assert!(bbox.x0 > 0.0 && bbox.x1 < 220.0);
    }
}
