use std::f64::consts::{PI, TAU};

use mosaic_protocol::{EffectSpec, HandleId, LabelStyle, SceneCommand, ThemeToken, Vec3};

use super::FocusTarget;
use crate::config::FocusConfig;
use crate::render::SceneBackend;

const MAX_SHARDS: u32 = 24;
const SHARD_SIZE: f64 = 0.35;
const SHARD_RING_RADIUS: f64 = 3.0;
const GLOW_RADIUS: f64 = 2.2;
const PARTICLE_RADIUS: f64 = 0.18;
const LABEL_LIFT: f64 = 1.2;

/// Quadratic Bezier arc between two points, bowed upwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpArc {
    pub start: Vec3,
    pub control: Vec3,
    pub end: Vec3,
}

impl WarpArc {
    /// `lift` is the control point height above the chord midpoint, as a
    /// fraction of the chord length.
    pub fn new(start: Vec3, end: Vec3, lift: f64) -> Self {
        let chord = start.distance(end);
        let control = start.midpoint(end) + Vec3::new(0.0, chord * lift, 0.0);
        Self {
            start,
            control,
            end,
        }
    }

    pub fn point(&self, t: f64) -> Vec3 {
        let u = 1.0 - t;
        self.start * (u * u) + self.control * (2.0 * u * t) + self.end * (t * t)
    }

    /// `segments + 1` evenly spaced samples in parameter space.
    pub fn sample(&self, segments: usize) -> Vec<Vec3> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point(i as f64 / segments as f64))
            .collect()
    }
}

/// Thin at both ends, widest in the middle.
pub fn tube_radius(t: f64, base: f64, amplitude: f64) -> f64 {
    base + amplitude * (PI * t).sin()
}

/// Position along the arc of a particle with phase offset `phase` after
/// `elapsed` seconds, looping forever.
pub fn particle_progress(phase: f64, elapsed: f64, speed: f64) -> f64 {
    (phase + elapsed * speed).rem_euclid(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct EffectHandle {
    handle: HandleId,
    /// Opacity at full strength.
    opacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Particle {
    handle: HandleId,
    phase: f64,
}

/// Transient objects owned by one focus frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FocusEffectSet {
    handles: Vec<EffectHandle>,
    particles: Vec<Particle>,
    arc: Option<WarpArc>,
    strength: f64,
}

impl FocusEffectSet {
    /// Glow on the subject, its label, and a ring of shards sized by
    /// complexity.
    pub fn explode<B: SceneBackend>(target: &FocusTarget, backend: &mut B) -> Self {
        let mut set = Self::with_strength();
        let focal = target.focal_point();

        let glow = backend.build_effect(
            &EffectSpec::Glow {
                position: focal,
                radius: GLOW_RADIUS,
            },
            ThemeToken::Glow,
        );
        set.push(glow, 0.6);

        let label = backend.build_label(
            &target.label,
            target.center + Vec3::new(0.0, target.height + LABEL_LIFT, 0.0),
            LabelStyle {
                font_size: 16.0,
                ..LabelStyle::default()
            },
            true,
        );
        set.push(label, 1.0);

        let shards = target.shard_count.clamp(1, MAX_SHARDS);
        for i in 0..shards {
            let angle = TAU * f64::from(i) / f64::from(shards);
            let lift = target.height * (0.25 + 0.5 * f64::from(i % 3) / 2.0);
            let position = target.center
                + Vec3::new(
                    angle.cos() * SHARD_RING_RADIUS,
                    lift,
                    angle.sin() * SHARD_RING_RADIUS,
                );
            let shard = backend.build_effect(
                &EffectSpec::Shard {
                    position,
                    size: SHARD_SIZE,
                },
                ThemeToken::Shard,
            );
            set.push(shard, 0.9);
        }
        set
    }

    /// Tube along an arc from source to destination, particles riding it,
    /// and a glow plus label at the destination.
    pub fn warp<B: SceneBackend>(
        source: &FocusTarget,
        destination: &FocusTarget,
        config: &FocusConfig,
        backend: &mut B,
    ) -> Self {
        let mut set = Self::with_strength();
        let arc = WarpArc::new(
            source.focal_point(),
            destination.focal_point(),
            config.arc_lift,
        );
        let segments = config.tube_segments.max(2);
        let path = arc.sample(segments);
        let radii = (0..=segments)
            .map(|i| {
                tube_radius(
                    i as f64 / segments as f64,
                    config.tube_base_radius,
                    config.tube_amplitude,
                )
            })
            .collect();
        let tube = backend.build_effect(&EffectSpec::Tube { path, radii }, ThemeToken::WarpArc);
        set.push(tube, 0.8);

        for i in 0..config.particle_count {
            let phase = i as f64 / config.particle_count as f64;
            let handle = backend.build_effect(
                &EffectSpec::Particle {
                    position: arc.point(phase),
                    radius: PARTICLE_RADIUS,
                },
                ThemeToken::WarpParticle,
            );
            set.push(handle, 1.0);
            set.particles.push(Particle { handle, phase });
        }

        let glow = backend.build_effect(
            &EffectSpec::Glow {
                position: source.focal_point(),
                radius: GLOW_RADIUS,
            },
            ThemeToken::Glow,
        );
        set.push(glow, 0.6);

        let label = backend.build_label(
            &destination.label,
            destination.center + Vec3::new(0.0, destination.height + LABEL_LIFT, 0.0),
            LabelStyle::default(),
            true,
        );
        set.push(label, 1.0);

        set.arc = Some(arc);
        set
    }

    fn with_strength() -> Self {
        Self {
            strength: 1.0,
            ..Self::default()
        }
    }

    fn push(&mut self, handle: HandleId, opacity: f64) {
        self.handles.push(EffectHandle { handle, opacity });
    }

    pub fn handles(&self) -> impl Iterator<Item = HandleId> + '_ {
        self.handles.iter().map(|h| h.handle)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn arc(&self) -> Option<&WarpArc> {
        self.arc.as_ref()
    }

    /// Current multiplier on every effect's opacity.
    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Scale every effect to `strength` of its full opacity.
    pub fn set_strength<B: SceneBackend>(&mut self, strength: f64, backend: &mut B) {
        if self.strength == strength {
            return;
        }
        self.strength = strength;
        for effect in &self.handles {
            backend.submit(SceneCommand::SetOpacity {
                handle: effect.handle,
                opacity: effect.opacity * strength,
            });
        }
    }

    /// Move every particle to where it is `elapsed` seconds in.
    pub fn animate<B: SceneBackend>(&self, elapsed: f64, speed: f64, backend: &mut B) {
        let Some(arc) = &self.arc else {
            return;
        };
        for particle in &self.particles {
            let t = particle_progress(particle.phase, elapsed, speed);
            backend.submit(SceneCommand::SetPosition {
                handle: particle.handle,
                position: arc.point(t),
            });
        }
    }

    pub fn dispose<B: SceneBackend>(self, backend: &mut B) {
        for effect in self.handles {
            backend.submit(SceneCommand::Dispose {
                handle: effect.handle,
            });
        }
    }
}
