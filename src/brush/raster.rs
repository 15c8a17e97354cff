use smallvec::SmallVec;

use crate::{
    foundation::core::{PhotoSize, clamp01_f32},
    foundation::error::VisageResult,
    foundation::math::{SplitMix64, lerp_f32},
    project::model::{MAX_BRUSH_PX, MIN_BRUSH_PX, Stroke},
};

/// Single-channel coverage buffer for one rasterized stroke, clipped to the
/// photo. `size_px` is the stamp *radius*: coverage reaches zero at exactly
/// `size_px` from a stamp center.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrokeRaster {
    pub x0: i32,
    pub y0: i32,
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

impl StrokeRaster {
    fn empty() -> Self {
        Self {
            x0: 0,
            y0: 0,
            width: 0,
            height: 0,
            coverage: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Coverage at a photo-space pixel; 0 outside the stored window.
    pub fn coverage_at(&self, x: u32, y: u32) -> u8 {
        let lx = i64::from(x) - i64::from(self.x0);
        let ly = i64::from(y) - i64::from(self.y0);
        if lx < 0 || ly < 0 || lx >= i64::from(self.width) || ly >= i64::from(self.height) {
            return 0;
        }
        self.coverage[ly as usize * self.width as usize + lx as usize]
    }
}

struct Stamp {
    cx: f64,
    cy: f64,
    pressure: f32,
}

/// Radial falloff for a stamp. `t` is distance over radius, `hardness` in
/// [0,1]. Full inside the hard core, zero at the rim, smoothstep between.
fn falloff(t: f64, hardness: f64) -> f64 {
    if t >= 1.0 {
        return 0.0;
    }
    if hardness >= 1.0 || t <= hardness {
        return 1.0;
    }
    let q = (1.0 - t) / (1.0 - hardness);
    let q = q.clamp(0.0, 1.0);
    q * q * (3.0 - 2.0 * q)
}

/// Rasterize a stroke into a coverage buffer.
///
/// The sample path is resampled at fixed arc-length intervals
/// (`spacing * size_px`), each resample point stamps a circular footprint,
/// and overlapping stamps accumulate by pixel-wise maximum so a single
/// stroke never over-darkens itself. Pressure scales stamp opacity linearly;
/// absent pressure means full. Jitter displaces each stamp center by a
/// bounded offset drawn from `seed`, so output is deterministic per seed.
pub fn rasterize_stroke(
    stroke: &Stroke,
    size_px: f32,
    hardness: f32,
    photo: PhotoSize,
    seed: u64,
) -> VisageResult<StrokeRaster> {
    stroke.validate()?;

    let radius = f64::from(size_px.clamp(MIN_BRUSH_PX, MAX_BRUSH_PX));
    let hardness = f64::from(clamp01_f32(hardness));
    let jitter_px = f64::from(stroke.jitter.max(0.0)) * radius;
    let ds = (f64::from(stroke.spacing) * radius).max(0.5);

    let mut rng = SplitMix64::new(seed);
    let mut jittered = |cx: f64, cy: f64, pressure: f32| -> Stamp {
        let dx = f64::from(rng.next_f32_signed()) * jitter_px;
        let dy = f64::from(rng.next_f32_signed()) * jitter_px;
        Stamp {
            cx: cx + dx,
            cy: cy + dy,
            pressure: clamp01_f32(pressure),
        }
    };

    let pressure_of = |i: usize| stroke.points[i].pressure.unwrap_or(1.0);

    let mut stamps: SmallVec<[Stamp; 64]> = SmallVec::new();
    let first = stroke.points[0].pos;
    stamps.push(jittered(first.x, first.y, pressure_of(0)));

    // Arc-length walk: `acc` is distance travelled since the last stamp.
    let mut acc = 0.0f64;
    for i in 1..stroke.points.len() {
        let p0 = stroke.points[i - 1].pos;
        let p1 = stroke.points[i].pos;
        let q0 = pressure_of(i - 1);
        let q1 = pressure_of(i);

        let seg = p1 - p0;
        let seglen = seg.hypot();
        if seglen == 0.0 {
            continue;
        }

        let mut pos = 0.0f64;
        while acc + (seglen - pos) >= ds {
            pos += ds - acc;
            acc = 0.0;
            let t = pos / seglen;
            let c = p0 + seg * t;
            stamps.push(jittered(c.x, c.y, lerp_f32(q0, q1, t as f32)));
        }
        acc += seglen - pos;
    }

    // Bounding box over all stamps, clipped to the photo.
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for s in &stamps {
        min_x = min_x.min(s.cx - radius);
        min_y = min_y.min(s.cy - radius);
        max_x = max_x.max(s.cx + radius);
        max_y = max_y.max(s.cy + radius);
    }

    let x0 = (min_x.floor() as i64).max(0);
    let y0 = (min_y.floor() as i64).max(0);
    let x1 = (max_x.ceil() as i64 + 1).min(i64::from(photo.width));
    let y1 = (max_y.ceil() as i64 + 1).min(i64::from(photo.height));
    if x0 >= x1 || y0 >= y1 {
        return Ok(StrokeRaster::empty());
    }

    let width = (x1 - x0) as usize;
    let height = (y1 - y0) as usize;
    let mut coverage = vec![0u8; width * height];

    for s in &stamps {
        let sx0 = ((s.cx - radius).floor() as i64).max(x0);
        let sy0 = ((s.cy - radius).floor() as i64).max(y0);
        let sx1 = ((s.cx + radius).ceil() as i64 + 1).min(x1);
        let sy1 = ((s.cy + radius).ceil() as i64 + 1).min(y1);

        for y in sy0..sy1 {
            let row = (y - y0) as usize * width;
            for x in sx0..sx1 {
                let d = (x as f64 - s.cx).hypot(y as f64 - s.cy);
                let f = falloff(d / radius, hardness);
                if f <= 0.0 {
                    continue;
                }
                let v = (f * f64::from(s.pressure) * 255.0).round() as u8;
                let cell = &mut coverage[row + (x - x0) as usize];
                *cell = (*cell).max(v);
            }
        }
    }

    Ok(StrokeRaster {
        x0: x0 as i32,
        y0: y0 as i32,
        width: width as u32,
        height: height as u32,
        coverage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::{StrokeKind, StrokePoint};

    fn photo() -> PhotoSize {
        PhotoSize::new(256, 256).unwrap()
    }

    fn dot_stroke(x: f64, y: f64) -> Stroke {
        let mut s = Stroke::new(StrokeKind::Paint, 0.25, 0.0);
        s.points.push(StrokePoint::new(x, y));
        s
    }

    #[test]
    fn empty_stroke_is_invalid() {
        let s = Stroke::new(StrokeKind::Paint, 0.25, 0.0);
        assert!(rasterize_stroke(&s, 10.0, 1.0, photo(), 1).is_err());
    }

    #[test]
    fn hard_stamp_full_at_center_zero_at_radius() {
        let s = dot_stroke(128.0, 128.0);
        let r = rasterize_stroke(&s, 20.0, 1.0, photo(), 1).unwrap();
        assert_eq!(r.coverage_at(128, 128), 255);
        assert_eq!(r.coverage_at(148, 128), 0); // exactly size_px away
        assert_eq!(r.coverage_at(147, 128), 255); // just inside
    }

    #[test]
    fn soft_stamp_falls_off_monotonically() {
        let s = dot_stroke(128.0, 128.0);
        let r = rasterize_stroke(&s, 40.0, 0.0, photo(), 1).unwrap();
        let mut prev = r.coverage_at(128, 128);
        assert_eq!(prev, 255);
        for dx in 1..40u32 {
            let cur = r.coverage_at(128 + dx, 128);
            assert!(cur <= prev, "coverage must not increase at dx={dx}");
            prev = cur;
        }
        assert_eq!(r.coverage_at(168, 128), 0);
    }

    #[test]
    fn omitted_pressure_equals_full_pressure() {
        let mut a = dot_stroke(100.0, 100.0);
        a.points.push(StrokePoint::new(140.0, 100.0));

        let mut b = Stroke { ..a.clone() };
        for p in &mut b.points {
            p.pressure = Some(1.0);
        }

        let ra = rasterize_stroke(&a, 12.0, 0.5, photo(), 9).unwrap();
        let rb = rasterize_stroke(&b, 12.0, 0.5, photo(), 9).unwrap();
        assert_eq!(ra, rb);
    }

    #[test]
    fn pressure_scales_coverage() {
        let mut s = dot_stroke(128.0, 128.0);
        s.points[0].pressure = Some(0.5);
        let r = rasterize_stroke(&s, 20.0, 1.0, photo(), 1).unwrap();
        assert_eq!(r.coverage_at(128, 128), 128);
    }

    #[test]
    fn jitter_is_deterministic_per_seed() {
        let mut s = dot_stroke(128.0, 128.0);
        s.points.push(StrokePoint::new(180.0, 140.0));
        s.jitter = 0.3;

        let a = rasterize_stroke(&s, 16.0, 0.7, photo(), 1234).unwrap();
        let b = rasterize_stroke(&s, 16.0, 0.7, photo(), 1234).unwrap();
        assert_eq!(a, b);

        let c = rasterize_stroke(&s, 16.0, 0.7, photo(), 1235).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn line_stroke_covers_between_endpoints() {
        let mut s = dot_stroke(40.0, 128.0);
        s.points.push(StrokePoint::new(200.0, 128.0));
        let r = rasterize_stroke(&s, 10.0, 1.0, photo(), 1).unwrap();
        for x in (40..=200).step_by(10) {
            assert_eq!(r.coverage_at(x, 128), 255, "gap at x={x}");
        }
    }

    #[test]
    fn overlapping_stamps_do_not_overdarken() {
        // Dense spacing stacks many stamps on the same pixels; max
        // accumulation keeps coverage at the single-stamp value.
        let mut s = dot_stroke(100.0, 100.0);
        s.points.push(StrokePoint::new(104.0, 100.0));
        s.spacing = 0.05;
        let r = rasterize_stroke(&s, 20.0, 1.0, photo(), 1).unwrap();
        assert_eq!(r.coverage_at(102, 100), 255);
    }

    #[test]
    fn stroke_outside_photo_yields_empty_raster() {
        let s = dot_stroke(-500.0, -500.0);
        let r = rasterize_stroke(&s, 10.0, 1.0, photo(), 1).unwrap();
        assert!(r.is_empty());
        assert_eq!(r.coverage_at(0, 0), 0);
    }
}
