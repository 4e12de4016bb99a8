use std::collections::BTreeSet;
use std::f64::consts::TAU;

use kurbo::{Point, Vec2};

use crate::foundation::math::snap_to_zero;

/// An integration azimuth in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Direction {
    degrees: f64,
}

impl Direction {
    /// Wrap `degrees` into `[0, 360)`.
    pub fn from_degrees(degrees: f64) -> Self {
        Self {
            degrees: degrees.rem_euclid(360.0),
        }
    }

    /// Azimuth in `[0, 360)`.
    pub fn degrees(self) -> f64 {
        self.degrees
    }

    /// Unit step `(cos, sin)`, with near-zero components snapped to exactly zero.
    pub fn step(self) -> Vec2 {
        let (sin, cos) = self.degrees.to_radians().sin_cos();
        Vec2::new(snap_to_zero(cos), snap_to_zero(sin))
    }

    /// The antipodal direction.
    pub fn opposite(self) -> Self {
        Self::from_degrees(self.degrees + 180.0)
    }
}

/// Ordered integration directions. Always a union of antipodal pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AngleSet {
    directions: Vec<Direction>,
}

impl AngleSet {
    /// Number of directions.
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// `true` when no direction is planned.
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    /// Directions in planning order.
    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        self.directions.iter().copied()
    }

    /// Directions as a slice.
    pub fn as_slice(&self) -> &[Direction] {
        &self.directions
    }

    /// `true` if an angle with exactly `degrees` is planned.
    pub fn contains(&self, degrees: f64) -> bool {
        self.directions.iter().any(|d| d.degrees == degrees)
    }

    /// Deal directions round-robin into `parts` lists (at least one).
    pub fn partition(&self, parts: usize) -> Vec<Vec<Direction>> {
        let parts = parts.max(1);
        let mut out = vec![Vec::new(); parts];
        for (i, d) in self.directions.iter().enumerate() {
            out[i % parts].push(*d);
        }
        out
    }
}

/// Upper bound on useful directions for an image: `2w + 2h`, at least one pair.
pub fn maximum_angle_count(width: u32, height: u32) -> usize {
    (2 * width as usize + 2 * height as usize).max(2)
}

/// Plan integration directions by dyadic refinement of the circle.
///
/// `quality` is the fraction of [`maximum_angle_count`] to plan; it is clamped to `[0, 1]`
/// and non-finite values count as 0. The result always holds at least the `0/180` pair,
/// has an even length, and any prefix covers the circle roughly uniformly.
pub fn plan_angles(width: u32, height: u32, quality: f32) -> AngleSet {
    let max = maximum_angle_count(width, height);
    let q = if quality.is_finite() {
        f64::from(quality).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut target = ((q * max as f64).ceil() as usize).max(2);
    target += target % 2;
    let target = target.min(max);

    let mut seen = BTreeSet::new();
    let mut directions = Vec::with_capacity(target);
    let mut push_pair = |a: f64, directions: &mut Vec<Direction>| {
        if seen.insert(a.to_bits()) {
            directions.push(Direction::from_degrees(a));
            directions.push(Direction::from_degrees(a + 180.0));
        }
    };
    push_pair(0.0, &mut directions);

    let min_step = 360.0 / max as f64;
    let mut step = 180.0;
    while directions.len() < target && step >= min_step {
        step /= 2.0;
        let mut k = 1u32;
        while f64::from(k) * step < 180.0 && directions.len() < target {
            push_pair(f64::from(k) * step, &mut directions);
            k += 2;
        }
    }

    AngleSet { directions }
}

/// Ray launch layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePolicy {
    /// Points on a circle enclosing the image; visits interior pixels from every angle evenly.
    #[default]
    Circular,
    /// One point just outside each edge pixel.
    Rectangular,
}

/// Start points of every ray, plus the region rays may march through.
#[derive(Clone, Debug, PartialEq)]
pub struct StartFrame {
    policy: FramePolicy,
    points: Vec<Point>,
    center: Point,
    radius: f64,
    width: u32,
    height: u32,
}

impl StartFrame {
    /// Policy the frame was built with.
    pub fn policy(&self) -> FramePolicy {
        self.policy
    }

    /// Ray launch coordinates.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Image center `(w/2, h/2)`.
    pub fn center(&self) -> Point {
        self.center
    }

    /// Launch circle radius (`max(w, h)`).
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// `true` while a rounded ray position is still worth marching.
    pub fn in_march_region(&self, p: Point) -> bool {
        match self.policy {
            FramePolicy::Rectangular => {
                p.x >= -1.0
                    && p.y >= -1.0
                    && p.x <= f64::from(self.width)
                    && p.y <= f64::from(self.height)
            }
            FramePolicy::Circular => p.distance(self.center) <= self.radius + 1.0,
        }
    }

    /// `false` when a ray from `start` along `step` can never land on an image pixel.
    ///
    /// Only axis-aligned steps are rejected: a zero component pins that coordinate, so a
    /// start on the ring outside the image stays there for the whole march.
    pub fn reaches_image(&self, start: Point, step: Vec2) -> bool {
        let inside = |v: f64, len: u32| (0.0..f64::from(len)).contains(&v.round());
        (step.x != 0.0 || inside(start.x, self.width))
            && (step.y != 0.0 || inside(start.y, self.height))
    }

    /// Upper bound on unit steps any ray can take inside the march region.
    pub fn max_steps(&self) -> usize {
        let span = match self.policy {
            FramePolicy::Rectangular => f64::from(self.width) + f64::from(self.height) + 4.0,
            FramePolicy::Circular => 2.0 * (self.radius + 2.0),
        };
        span.ceil() as usize + 4
    }
}

/// Lay out ray start points for a `width x height` image.
pub fn plan_start_frame(width: u32, height: u32, policy: FramePolicy) -> StartFrame {
    let (w, h) = (f64::from(width), f64::from(height));
    let center = Point::new(w / 2.0, h / 2.0);
    let radius = w.max(h);
    let points = match policy {
        FramePolicy::Circular => {
            let n = (TAU * radius).ceil() as usize;
            (0..n)
                .map(|i| {
                    let a = TAU * i as f64 / n as f64;
                    center + Vec2::from_angle(a) * radius
                })
                .collect()
        }
        FramePolicy::Rectangular => {
            let mut pts = Vec::with_capacity(2 * (width as usize + height as usize));
            for y in 0..height {
                let y = f64::from(y);
                pts.push(Point::new(-1.0, y));
                pts.push(Point::new(w, y));
            }
            for x in 0..width {
                let x = f64::from(x);
                pts.push(Point::new(x, -1.0));
                pts.push(Point::new(x, h));
            }
            pts
        }
    };
    StartFrame {
        policy,
        points,
        center,
        radius,
        width,
        height,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/depth/planner.rs"]
mod tests;
