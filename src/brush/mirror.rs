use uuid::Uuid;

use crate::{
    foundation::core::{PhotoSize, Point},
    project::model::{Landmarks, Stroke, StrokePoint},
};

/// X-coordinate of the face's vertical symmetry axis: the landmark midline
/// when available, otherwise the photo's horizontal center. `None` only when
/// neither source can produce an axis.
pub fn symmetry_axis(landmarks: Option<&Landmarks>, photo: PhotoSize) -> Option<f64> {
    if let Some(lm) = landmarks
        && let Some(x) = lm.midline_x()
    {
        return Some(x);
    }
    if photo.width > 0 {
        return Some(f64::from(photo.width) / 2.0);
    }
    None
}

/// Reflect a stroke across a vertical axis: `x' = 2*axis - x`, everything
/// else unchanged. The mirrored stroke gets a fresh id; it is a separate
/// committed stroke, not an alias.
pub fn mirror_stroke(stroke: &Stroke, axis: f64) -> Stroke {
    Stroke {
        id: Uuid::new_v4(),
        kind: stroke.kind,
        points: stroke
            .points
            .iter()
            .map(|p| StrokePoint {
                pos: Point::new(2.0 * axis - p.pos.x, p.pos.y),
                pressure: p.pressure,
            })
            .collect(),
        spacing: stroke.spacing,
        jitter: stroke.jitter,
        created_at: stroke.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::StrokeKind;
    use approx::assert_relative_eq;

    fn stroke_at(xs: &[f64]) -> Stroke {
        let mut s = Stroke::new(StrokeKind::Paint, 0.25, 0.0);
        for (i, &x) in xs.iter().enumerate() {
            s.points.push(StrokePoint::with_pressure(x, 10.0 * i as f64, 0.7));
        }
        s
    }

    #[test]
    fn mirror_reflects_about_axis() {
        let s = stroke_at(&[100.0]);
        let m = mirror_stroke(&s, 200.0);
        assert_relative_eq!(m.points[0].pos.x, 300.0);
        assert_eq!(m.points[0].pos.y, s.points[0].pos.y);
        assert_eq!(m.points[0].pressure, s.points[0].pressure);
        assert_ne!(m.id, s.id);
    }

    #[test]
    fn double_mirror_is_identity() {
        let s = stroke_at(&[100.0, 130.0, 155.5]);
        let mm = mirror_stroke(&mirror_stroke(&s, 173.25), 173.25);
        for (a, b) in s.points.iter().zip(&mm.points) {
            assert_relative_eq!(a.pos.x, b.pos.x, epsilon = 1e-9);
            assert_relative_eq!(a.pos.y, b.pos.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn axis_falls_back_to_photo_center() {
        let photo = PhotoSize::new(400, 300).unwrap();
        assert_eq!(symmetry_axis(None, photo), Some(200.0));
    }

    #[test]
    fn axis_prefers_landmark_midline() {
        let photo = PhotoSize::new(400, 300).unwrap();
        let lm = Landmarks {
            id: Uuid::new_v4(),
            model: "mesh68".to_string(),
            points: vec![Point::new(180.0, 50.0), Point::new(190.0, 60.0)],
            mesh_triangles: vec![],
            quality_score: 0.8,
        };
        assert_eq!(symmetry_axis(Some(&lm), photo), Some(185.0));
    }

    #[test]
    fn no_axis_for_degenerate_photo() {
        let photo = PhotoSize {
            width: 0,
            height: 0,
        };
        assert_eq!(symmetry_axis(None, photo), None);
    }
}
