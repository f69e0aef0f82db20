use glam::{DMat4, DVec3};

#[derive(Debug, Clone)]
pub struct Camera {
    pub target: DVec3,
    pub distance: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub aspect: f64,
    pub fov: f64,
    pub near: f64,
    pub far: f64,
}

impl Camera {
    const PITCH_LIMIT: f64 = 89.0_f64.to_radians();
    const MIN_DISTANCE: f64 = 5.0;

    pub fn new(aspect: f64) -> Self {
        Self {
            target: DVec3::ZERO,
            distance: 30.0,
            yaw: 0.0,
            pitch: 35.0_f64.to_radians(),
            aspect,
            fov: 60.0_f64.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn position(&self) -> DVec3 {
        let offset = DVec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            -self.yaw.cos() * self.pitch.cos(),
        );
        self.target + offset * self.distance
    }

    pub fn rotate(&mut self, delta_yaw: f64, delta_pitch: f64) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    pub fn zoom(&mut self, factor: f64) {
        self.distance = (self.distance * factor).max(Self::MIN_DISTANCE);
    }

    /// Centers on the box and backs off far enough to keep all of it in view.
    pub fn frame_bounds(&mut self, min: DVec3, max: DVec3) {
        self.target = (min + max) * 0.5;
        let radius = (max - min).length() * 0.5;
        let fit = radius / (self.fov * 0.5).tan();
        self.distance = (fit * 1.2).max(Self::MIN_DISTANCE);
        self.near = (self.distance * 1e-3).max(0.1);
        self.far = self.far.max(self.distance * 4.0);
    }

    pub fn view_projection(&self) -> DMat4 {
        let view = DMat4::look_at_lh(self.position(), self.target, DVec3::Y);
        let proj = DMat4::perspective_lh(self.fov, self.aspect, self.near, self.far);
        proj * view
    }

    /// Returns the point in normalized device coordinates, or `None` when it
    /// is behind the camera, outside the depth range, or not representable.
    pub fn project(&self, view_projection: &DMat4, world: DVec3) -> Option<(f64, f64)> {
        let clip = *view_projection * world.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !ndc.is_finite() || !(0.0..=1.0).contains(&ndc.z) {
            return None;
        }
        Some((ndc.x, ndc.y))
    }
}
