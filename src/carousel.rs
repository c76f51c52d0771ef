//! Drag-to-rotate carousel over the digest items.
//!
//! Cards sit on a ring of radius [`RADIUS`]. Dragging rotates the ring;
//! releasing lets it coast, losing [`FRICTION`] of its velocity per frame
//! until it drops below [`REST_VELOCITY`].

use std::f64::consts::PI;

pub const RADIUS: f64 = 800.0;
/// Radians of rotation per pixel dragged.
pub const DRAG_SENSITIVITY: f64 = 0.003;
pub const FRICTION: f64 = 0.95;
pub const REST_VELOCITY: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub index: usize,
    pub x: f64,
    pub z: f64,
    pub scale: f64,
    pub opacity: f64,
    /// Cards far behind the ring are hidden outright.
    pub visible: bool,
    /// Only cards near the front accept pointer events.
    pub interactive: bool,
    pub z_index: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Carousel {
    count: usize,
    rotation: f64,
    velocity: f64,
    last_x: Option<f64>,
}

impl Carousel {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            rotation: 0.0,
            velocity: 0.0,
            last_x: None,
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn is_dragging(&self) -> bool {
        self.last_x.is_some()
    }

    pub fn press(&mut self, x: f64) {
        self.last_x = Some(x);
        self.velocity = 0.0;
    }

    pub fn drag_to(&mut self, x: f64) {
        let Some(last) = self.last_x else {
            return;
        };
        let delta = (x - last) * DRAG_SENSITIVITY;
        self.rotation += delta;
        self.velocity = delta;
        self.last_x = Some(x);
    }

    pub fn release(&mut self) {
        self.last_x = None;
    }

    /// Advances inertia by one frame. Returns false once at rest.
    pub fn step(&mut self) -> bool {
        if self.is_dragging() || self.velocity.abs() <= REST_VELOCITY {
            return false;
        }
        self.rotation += self.velocity;
        self.velocity *= FRICTION;
        true
    }

    /// Runs inertia until rest or `max_frames`, returning frames taken.
    pub fn settle(&mut self, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.step() {
            frames += 1;
        }
        frames
    }

    pub fn placements(&self) -> Vec<Placement> {
        if self.count == 0 {
            return Vec::new();
        }
        let step = 2.0 * PI / self.count as f64;

        (0..self.count)
            .map(|index| {
                let angle = index as f64 * step + self.rotation;
                let x = angle.sin() * RADIUS;
                let z = angle.cos() * RADIUS;
                let opacity = ((z + RADIUS) / RADIUS).clamp(0.3, 1.0);
                let visible = z > -RADIUS * 0.5;

                Placement {
                    index,
                    x,
                    z,
                    scale: (z + RADIUS) / (2.0 * RADIUS),
                    opacity: if visible { opacity } else { 0.0 },
                    visible,
                    interactive: z > -RADIUS * 0.3,
                    z_index: z.round() as i64,
                }
            })
            .collect()
    }
}
