use std::f64::consts::{FRAC_PI_4, PI};

use mosaic_protocol::{CameraState, Vec3};

use super::FocusTarget;

const BASE_DISTANCE: f64 = 15.0;
const DISTANCE_PER_SHARD: f64 = 0.1;
const HEIGHT_FACTOR: f64 = 1.5;

/// Close-up placement for one building.
///
/// The camera backs off further for more complex subjects and always comes
/// in diagonally from the far side of the origin, so the spiral path behind
/// the subject stays visible.
pub fn explode_camera(target: &FocusTarget) -> CameraState {
    let distance = BASE_DISTANCE + DISTANCE_PER_SHARD * f64::from(target.shard_count);
    let angle = target.center.z.atan2(target.center.x) + PI + FRAC_PI_4;
    let eye = Vec3::new(
        target.center.x + angle.cos() * distance,
        target.center.y + HEIGHT_FACTOR * target.height,
        target.center.z + angle.sin() * distance,
    );
    CameraState::looking_at(eye, target.focal_point())
}

/// Smooth start and stop.
pub fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Fixed-duration interpolation of all orbit parameters in parallel.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTween {
    from: CameraState,
    to: CameraState,
    elapsed: f64,
    duration: f64,
}

impl CameraTween {
    pub fn new(from: CameraState, to: CameraState, frames: u32, fps: f64) -> Self {
        Self {
            from,
            to,
            elapsed: 0.0,
            duration: f64::from(frames) / fps,
        }
    }

    pub fn to(&self) -> &CameraState {
        &self.to
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Step by `dt` seconds and return the camera for the new time. The last
    /// step lands exactly on the destination.
    pub fn advance(&mut self, dt: f64) -> CameraState {
        self.elapsed += dt.max(0.0);
        if self.is_finished() {
            return self.to;
        }
        self.from.lerp(&self.to, ease_in_out(self.elapsed / self.duration))
    }
}

/// The live camera plus at most one in-flight tween.
#[derive(Debug, Clone)]
pub struct CameraRig {
    current: CameraState,
    tween: Option<CameraTween>,
}

impl CameraRig {
    pub fn new(camera: CameraState) -> Self {
        Self {
            current: camera,
            tween: None,
        }
    }

    pub fn current(&self) -> CameraState {
        self.current
    }

    /// Where the camera will settle: the tween destination, or the current
    /// camera when idle.
    pub fn goal(&self) -> CameraState {
        self.tween.as_ref().map_or(self.current, |t| *t.to())
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    /// Start a tween from wherever the camera is now, replacing any tween in
    /// flight.
    pub fn animate_to(&mut self, to: CameraState, frames: u32, fps: f64) {
        if frames == 0 {
            self.jump_to(to);
            return;
        }
        self.tween = Some(CameraTween::new(self.current, to, frames, fps));
    }

    pub fn jump_to(&mut self, camera: CameraState) {
        self.tween = None;
        self.current = camera;
    }

    /// Returns the new camera if it moved.
    pub fn advance(&mut self, dt: f64) -> Option<CameraState> {
        let tween = self.tween.as_mut()?;
        self.current = tween.advance(dt);
        if tween.is_finished() {
            self.tween = None;
        }
        Some(self.current)
    }
}
