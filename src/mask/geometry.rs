use kurbo::{Point, Rect, Vec2};

/// Monotone-chain convex hull. Returns vertices in counter-clockwise order;
/// inputs with fewer than three distinct points come back as-is.
pub(crate) fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points
        .iter()
        .copied()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);

    if pts.len() <= 2 {
        return pts;
    }

    fn cross(o: Point, a: Point, b: Point) -> f64 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

pub(crate) fn polygon_bbox(poly: &[Point]) -> Option<Rect> {
    let first = poly.first()?;
    let mut rect = Rect::new(first.x, first.y, first.x, first.y);
    for p in &poly[1..] {
        rect.x0 = rect.x0.min(p.x);
        rect.y0 = rect.y0.min(p.y);
        rect.x1 = rect.x1.max(p.x);
        rect.y1 = rect.y1.max(p.y);
    }
    Some(rect)
}

/// Even-odd ray cast. Points exactly on an edge may land on either side;
/// callers that care about boundary pixels must handle them explicitly.
pub(crate) fn polygon_contains(poly: &[Point], p: Point) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_at = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_at {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn segment_distance(a: Point, b: Point, p: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 == 0.0 {
        return (p - a).hypot();
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).hypot()
}

pub(crate) fn distance_to_boundary(poly: &[Point], p: Point) -> f64 {
    if poly.is_empty() {
        return f64::INFINITY;
    }
    let mut best = f64::INFINITY;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        best = best.min(segment_distance(poly[j], poly[i], p));
        j = i;
    }
    best
}

/// Distance to the polygon boundary, positive inside and negative outside.
pub(crate) fn signed_distance(poly: &[Point], p: Point) -> f64 {
    let d = distance_to_boundary(poly, p);
    if polygon_contains(poly, p) { d } else { -d }
}

pub(crate) fn centroid(poly: &[Point]) -> Point {
    if poly.is_empty() {
        return Point::ZERO;
    }
    let mut sum = Vec2::ZERO;
    for p in poly {
        sum += p.to_vec2();
    }
    (sum / poly.len() as f64).to_point()
}

/// Push each vertex away from the centroid by `amount` pixels.
pub(crate) fn dilate(poly: &[Point], amount: f64) -> Vec<Point> {
    if amount == 0.0 || poly.is_empty() {
        return poly.to_vec();
    }
    let c = centroid(poly);
    poly.iter()
        .map(|&p| {
            let v = p - c;
            let len = v.hypot();
            if len == 0.0 { p } else { p + v * (amount / len) }
        })
        .collect()
}
