use visage::{
    BlendMode, BrushSettings, FaceRegion, ImageRgba8, Layer, LayerType, Photo, PhotoSource,
    Project, Rgba8, Stroke, StrokeKind, StrokePoint, composite_project,
};

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn digest_u64(bytes: &[u8]) -> u64 {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    for chunk in bytes.chunks(8) {
        let mut v = 0u64;
        for (i, &b) in chunk.iter().enumerate() {
            v |= (b as u64) << (i * 8);
        }
        state = mix64(state ^ v);
    }
    state
}

fn gradient_photo(w: u32, h: u32) -> (Photo, ImageRgba8) {
    let photo = Photo::new(PhotoSource::Upload, w, h).unwrap();
    let mut img = ImageRgba8::new(w, h);
    for y in 0..h {
        for x in 0..w {
            img.put_pixel(x, y, [(x * 3 % 256) as u8, (y * 5 % 256) as u8, 90, 255]);
        }
    }
    (photo, img)
}

fn covering_stroke(w: u32, h: u32) -> Stroke {
    let mut s = Stroke::new(StrokeKind::Paint, 0.25, 0.0);
    s.points.push(StrokePoint::new(0.0, f64::from(h) / 2.0));
    s.points
        .push(StrokePoint::new(f64::from(w), f64::from(h) / 2.0));
    s
}

fn full_face_layer(w: u32, h: u32, color: Rgba8, opacity: f32, blend: BlendMode) -> Layer {
    let brush = BrushSettings {
        size_px: (w + h) as f32,
        hardness: 1.0,
        opacity,
        ..BrushSettings::default()
    };
    let mut layer = Layer::new(LayerType::Foundation, FaceRegion::FullFace, &brush, 0);
    layer.blend = blend;
    layer.color = color;
    layer.strokes.push(covering_stroke(w, h));
    layer
}

#[test]
fn zero_layers_is_identity_pixel_for_pixel() {
    let (photo, img) = gradient_photo(80, 60);
    let project = Project::new("empty", &photo);
    let out = composite_project(&img, &project, None).unwrap();
    assert_eq!(out.data, img.data);
}

#[test]
fn composite_is_deterministic() {
    let (photo, img) = gradient_photo(64, 48);
    let mut project = Project::new("det", &photo);
    project
        .layers
        .push(full_face_layer(64, 48, Rgba8::rgb(200, 60, 120), 0.7, BlendMode::Normal));

    let a = composite_project(&img, &project, None).unwrap();
    let b = composite_project(&img, &project, None).unwrap();
    assert_eq!(digest_u64(&a.data), digest_u64(&b.data));
    assert_ne!(digest_u64(&a.data), digest_u64(&img.data));
}

#[test]
fn foundation_half_opacity_normal_is_lerp_everywhere() {
    let (photo, img) = gradient_photo(96, 64);
    let color = Rgba8::rgb(220, 120, 80);
    let mut project = Project::new("lerp", &photo);
    project
        .layers
        .push(full_face_layer(96, 64, color, 0.5, BlendMode::Normal));

    let out = composite_project(&img, &project, None).unwrap();

    for y in 0..64 {
        for x in 0..96 {
            let base = img.pixel(x, y);
            let got = out.pixel(x, y);
            let want = [
                f32::from(base[0]) + (220.0 - f32::from(base[0])) * 0.5,
                f32::from(base[1]) + (120.0 - f32::from(base[1])) * 0.5,
                f32::from(base[2]) + (80.0 - f32::from(base[2])) * 0.5,
            ];
            for c in 0..3 {
                assert!(
                    (f32::from(got[c]) - want[c]).abs() <= 1.5,
                    "channel {c} at {x},{y}: got {} want {}",
                    got[c],
                    want[c]
                );
            }
        }
    }
}

#[test]
fn multiply_never_lightens_and_screen_never_darkens() {
    let (photo, img) = gradient_photo(48, 48);

    let mut mult = Project::new("m", &photo);
    mult.layers
        .push(full_face_layer(48, 48, Rgba8::rgb(100, 100, 100), 1.0, BlendMode::Multiply));
    let m = composite_project(&img, &mult, None).unwrap();

    let mut screen = Project::new("s", &photo);
    screen
        .layers
        .push(full_face_layer(48, 48, Rgba8::rgb(100, 100, 100), 1.0, BlendMode::Screen));
    let s = composite_project(&img, &screen, None).unwrap();

    for y in 0..48 {
        for x in 0..48 {
            let base = img.pixel(x, y);
            let mp = m.pixel(x, y);
            let sp = s.pixel(x, y);
            for c in 0..3 {
                assert!(mp[c] <= base[c].saturating_add(1), "multiply at {x},{y}");
                assert!(sp[c].saturating_add(1) >= base[c], "screen at {x},{y}");
            }
        }
    }
}

#[test]
fn stack_order_follows_ordering_not_insertion() {
    let (photo, img) = gradient_photo(32, 32);
    let mut project = Project::new("order", &photo);

    let mut top = full_face_layer(32, 32, Rgba8::rgb(255, 0, 0), 1.0, BlendMode::Normal);
    top.ordering = 1;
    let mut bottom = full_face_layer(32, 32, Rgba8::rgb(0, 0, 255), 1.0, BlendMode::Normal);
    bottom.ordering = 0;

    // Inserted top-first; the compositor must still paint blue then red.
    project.layers.push(top);
    project.layers.push(bottom);

    let out = composite_project(&img, &project, None).unwrap();
    assert_eq!(out.pixel(16, 16), [255, 0, 0, 255]);
}

#[test]
fn layer_without_mask_source_stays_transparent() {
    let (photo, img) = gradient_photo(40, 40);
    let mut project = Project::new("broken", &photo);

    let mut layer = full_face_layer(40, 40, Rgba8::rgb(255, 0, 0), 1.0, BlendMode::Normal);
    layer.region = FaceRegion::Lips; // no landmarks supplied
    project.layers.push(layer);

    let mut ok = full_face_layer(40, 40, Rgba8::rgb(0, 255, 0), 1.0, BlendMode::Normal);
    ok.ordering = 1;
    project.layers.push(ok);

    // The broken layer contributes nothing; the healthy one still paints.
    let out = composite_project(&img, &project, None).unwrap();
    assert_eq!(out.pixel(20, 20), [0, 255, 0, 255]);
}
