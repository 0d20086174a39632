//! JavaScript bindings: a host page loads a trace, drives the world, and
//! drains [`SceneCommand`](mosaic_protocol::SceneCommand)s as JSON to feed
//! its own 3D engine.

use std::sync::Mutex;

use mosaic_core::config::ConfigError;
use mosaic_core::parsers::ParseError;
use mosaic_core::render::SceneRecorder;
use mosaic_core::{MosaicConfig, World};
use mosaic_protocol::{EntityKey, HandleId};
use serde::Serialize;
use wasm_bindgen::prelude::*;

static WORLDS: Mutex<Vec<World<SceneRecorder>>> = Mutex::new(Vec::new());

#[derive(Debug, thiserror::Error)]
enum BridgeError {
    #[error("invalid world handle {0}")]
    InvalidHandle(usize),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// `From<BridgeError> for JsError` comes from wasm-bindgen's blanket
// `impl<E: Error> From<E> for JsError`, which builds `JsError::new(&e.to_string())`.

fn load(data: &[u8], config: Option<&str>) -> Result<usize, BridgeError> {
    let config = match config {
        Some(json) => MosaicConfig::from_json_slice(json.as_bytes())?,
        None => MosaicConfig::default(),
    };
    let trace = mosaic_core::parsers::parse_auto(data)?;
    let world = World::recording(trace, &config);
    let mut worlds = WORLDS.lock().unwrap_or_else(|e| e.into_inner());
    worlds.push(world);
    Ok(worlds.len() - 1)
}

fn with_world<T>(
    handle: usize,
    f: impl FnOnce(&mut World<SceneRecorder>) -> T,
) -> Result<T, BridgeError> {
    let mut worlds = WORLDS.lock().unwrap_or_else(|e| e.into_inner());
    let world = worlds
        .get_mut(handle)
        .ok_or(BridgeError::InvalidHandle(handle))?;
    Ok(f(world))
}

fn to_json(value: &impl Serialize) -> Result<String, BridgeError> {
    Ok(serde_json::to_string(value)?)
}

/// Parse a trace (JSON or raw tracer output) and build a world for it.
/// `config` is an optional JSON config. Returns a handle for later calls.
#[wasm_bindgen]
pub fn load_trace(data: &[u8], config: Option<String>) -> Result<usize, JsError> {
    Ok(load(data, config.as_deref())?)
}

/// Move to step `index` (-1 is before the first step). Returns the clamped cursor.
#[wasm_bindgen]
pub fn seek(handle: usize, index: i64) -> Result<i64, JsError> {
    Ok(with_world(handle, |w| w.seek(index).value())?)
}

#[wasm_bindgen]
pub fn step_forward(handle: usize) -> Result<bool, JsError> {
    Ok(with_world(handle, World::step_forward)?)
}

#[wasm_bindgen]
pub fn step_backward(handle: usize) -> Result<bool, JsError> {
    Ok(with_world(handle, World::step_backward)?)
}

/// Returns whether playback is running afterwards.
#[wasm_bindgen]
pub fn toggle_play(handle: usize) -> Result<bool, JsError> {
    Ok(with_world(handle, World::toggle_play)?)
}

#[wasm_bindgen]
pub fn set_speed(handle: usize, ms: u64) -> Result<(), JsError> {
    Ok(with_world(handle, |w| w.set_speed(ms))?)
}

/// Per-frame tick; `dt` is in seconds.
#[wasm_bindgen]
pub fn advance(handle: usize, dt: f64) -> Result<(), JsError> {
    Ok(with_world(handle, |w| w.advance(dt))?)
}

#[wasm_bindgen]
pub fn explode(handle: usize, key: &str) -> Result<bool, JsError> {
    Ok(with_world(handle, |w| w.explode(&EntityKey::new(key)))?)
}

#[wasm_bindgen]
pub fn warp(handle: usize, key: &str) -> Result<bool, JsError> {
    Ok(with_world(handle, |w| w.warp(&EntityKey::new(key)))?)
}

#[wasm_bindgen]
pub fn collapse(handle: usize) -> Result<bool, JsError> {
    Ok(with_world(handle, World::collapse)?)
}

#[wasm_bindgen]
pub fn return_from_warp(handle: usize) -> Result<bool, JsError> {
    Ok(with_world(handle, World::return_from_warp)?)
}

/// Drops every focus frame. Returns how many were dropped.
#[wasm_bindgen]
pub fn reset_camera(handle: usize) -> Result<usize, JsError> {
    Ok(with_world(handle, World::reset_camera)?)
}

/// Show the label of the entity owning `mesh`, or hide it with `None`.
#[wasm_bindgen]
pub fn hover(handle: usize, mesh: Option<u64>) -> Result<(), JsError> {
    Ok(with_world(handle, |w| w.hover(mesh.map(HandleId)))?)
}

/// Entity key owning `mesh`, if any.
#[wasm_bindgen]
pub fn pick(handle: usize, mesh: u64) -> Result<Option<String>, JsError> {
    Ok(with_world(handle, |w| {
        w.pick(HandleId(mesh)).map(|k| k.as_str().to_string())
    })?)
}

/// Scene commands recorded since the last drain, as a JSON array.
#[wasm_bindgen]
pub fn drain_commands(handle: usize) -> Result<String, JsError> {
    let commands = with_world(handle, World::drain_commands)?;
    Ok(to_json(&commands)?)
}

/// The snapshot at the current cursor, as JSON.
#[wasm_bindgen]
pub fn snapshot(handle: usize) -> Result<String, JsError> {
    let json = with_world(handle, |w| to_json(w.snapshot()))?;
    Ok(json?)
}

/// Trace metadata as JSON.
#[wasm_bindgen]
pub fn get_trace_metadata(handle: usize) -> Result<String, JsError> {
    let json = with_world(handle, |w| to_json(&w.trace().metadata))?;
    Ok(json?)
}

#[wasm_bindgen]
pub fn get_step_count(handle: usize) -> Result<usize, JsError> {
    Ok(with_world(handle, |w| w.trace().len())?)
}
