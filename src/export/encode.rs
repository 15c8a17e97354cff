use std::io::Cursor;

use image::ImageEncoder;

use crate::{
    foundation::error::{VisageError, VisageResult},
    project::model::{Landmarks, Project},
    render::composite::composite_project,
    render::raster::ImageRgba8,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExportFormat {
    Png,
    Jpeg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExportSettings {
    pub format: ExportFormat,
    /// JPEG quality 1..=100; ignored for PNG.
    pub quality: u8,
    /// Longest output edge in pixels; larger sources are scaled down with
    /// aspect preserved.
    pub max_edge: u32,
    pub before_after: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            quality: 90,
            max_edge: 2048,
            before_after: false,
        }
    }
}

impl ExportSettings {
    pub fn validate(&self) -> VisageResult<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(VisageError::validation("export quality must be in 1..=100"));
        }
        if self.max_edge == 0 {
            return Err(VisageError::validation("export max_edge must be > 0"));
        }
        Ok(())
    }
}

fn bounded_dims(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge {
        return (width, height);
    }
    let scale = f64::from(max_edge) / f64::from(longest);
    let w = ((f64::from(width) * scale).round() as u32).max(1);
    let h = ((f64::from(height) * scale).round() as u32).max(1);
    (w, h)
}

/// Scale down so the longest edge fits `max_edge`, aspect preserved. Images
/// already within the bound are returned unchanged.
pub fn resize_to_max_edge(img: &ImageRgba8, max_edge: u32) -> VisageResult<ImageRgba8> {
    if img.is_empty() {
        return Err(VisageError::encoding("cannot resize a zero-dimension raster"));
    }
    let (w, h) = bounded_dims(img.width, img.height, max_edge);
    if (w, h) == (img.width, img.height) {
        return Ok(img.clone());
    }

    let src = image::RgbaImage::from_raw(img.width, img.height, img.data.clone())
        .ok_or_else(|| VisageError::encoding("raster buffer does not match its dimensions"))?;
    let scaled = image::imageops::resize(&src, w, h, image::imageops::FilterType::Triangle);
    ImageRgba8::from_raw(w, h, scaled.into_raw())
}

/// Encode a composited raster to PNG or JPEG, bounded by `max_edge`.
pub fn encode_image(img: &ImageRgba8, settings: &ExportSettings) -> VisageResult<Vec<u8>> {
    settings.validate()?;
    if img.is_empty() {
        return Err(VisageError::encoding("cannot encode a zero-dimension raster"));
    }

    let bounded = resize_to_max_edge(img, settings.max_edge)?;
    let mut out = Vec::new();

    match settings.format {
        ExportFormat::Png => {
            let enc = image::codecs::png::PngEncoder::new(Cursor::new(&mut out));
            enc.write_image(
                &bounded.data,
                bounded.width,
                bounded.height,
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| VisageError::encoding(e.to_string()))?;
        }
        ExportFormat::Jpeg => {
            // JPEG has no alpha channel; drop it.
            let rgb: Vec<u8> = bounded
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            let enc = image::codecs::jpeg::JpegEncoder::new_with_quality(
                Cursor::new(&mut out),
                settings.quality,
            );
            enc.write_image(
                &rgb,
                bounded.width,
                bounded.height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| VisageError::encoding(e.to_string()))?;
        }
    }

    Ok(out)
}

/// Side-by-side before/after pair. Both halves must share dimensions; the
/// `max_edge` bound applies to the combined canvas.
pub fn encode_before_after(
    before: &ImageRgba8,
    after: &ImageRgba8,
    settings: &ExportSettings,
) -> VisageResult<Vec<u8>> {
    if before.width != after.width || before.height != after.height {
        return Err(VisageError::encoding(
            "before/after halves must share dimensions",
        ));
    }
    if before.is_empty() {
        return Err(VisageError::encoding("cannot encode a zero-dimension raster"));
    }

    let mut pair = ImageRgba8::new(before.width * 2, before.height);
    let half_stride = before.width as usize * 4;
    for y in 0..before.height as usize {
        let dst = &mut pair.data[y * half_stride * 2..][..half_stride * 2];
        dst[..half_stride].copy_from_slice(&before.data[y * half_stride..][..half_stride]);
        dst[half_stride..].copy_from_slice(&after.data[y * half_stride..][..half_stride]);
    }

    encode_image(&pair, settings)
}

/// Replay the project's strokes in commit order, one composited frame per
/// stroke, starting from the bare photo. Frame count is `1 + total strokes`;
/// callers wanting fewer frames stride the result.
pub fn render_timelapse(
    photo: &ImageRgba8,
    project: &Project,
    landmarks: Option<&Landmarks>,
) -> VisageResult<Vec<ImageRgba8>> {
    // Global stroke order: creation time, commit order within a layer as the
    // tiebreaker.
    let mut order: Vec<(usize, usize)> = Vec::new();
    for (li, layer) in project.layers.iter().enumerate() {
        for si in 0..layer.strokes.len() {
            order.push((li, si));
        }
    }
    order.sort_by(|a, b| {
        let sa = &project.layers[a.0].strokes[a.1];
        let sb = &project.layers[b.0].strokes[b.1];
        sa.created_at.cmp(&sb.created_at).then(a.cmp(b))
    });

    let mut frames = Vec::with_capacity(order.len() + 1);

    let mut replay = project.clone();
    for layer in &mut replay.layers {
        layer.strokes.clear();
    }
    frames.push(composite_project(photo, &replay, landmarks)?);

    for (li, si) in order {
        let stroke = project.layers[li].strokes[si].clone();
        let id = project.layers[li].id;
        if let Some(layer) = replay.layer_mut(id) {
            layer.strokes.push(stroke);
        }
        frames.push(composite_project(photo, &replay, landmarks)?);
    }

    Ok(frames)
}
