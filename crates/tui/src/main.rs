mod renderer;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use mosaic_core::scene::Scene;
use mosaic_core::{MosaicConfig, World};

struct Args {
    trace: PathBuf,
    config: Option<PathBuf>,
    svg: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut trace = None;
    let mut config = None;
    let mut svg = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(args.next().context("--config needs a path")?.into()),
            "--svg" => svg = Some(args.next().context("--svg needs a path")?.into()),
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            path => trace = Some(PathBuf::from(path)),
        }
    }
    let Some(trace) = trace else {
        bail!("Usage: code-mosaic <trace.json|trace.raw> [--config config.json] [--svg out.svg]");
    };
    Ok(Args { trace, config, svg })
}

/// Logs go to stderr, which the alternate screen shares, so stay quiet
/// unless asked.
fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => MosaicConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MosaicConfig::default(),
    };
    let data = std::fs::read(&args.trace)
        .with_context(|| format!("reading {}", args.trace.display()))?;
    let trace = mosaic_core::parsers::parse_auto(&data)?;
    let mut world = World::recording(trace, &config);

    if let Some(out) = &args.svg {
        // Walk the whole run so every entity gets placed, then map the end state.
        while world.step_forward() {
            world.sync();
        }
        world.sync();
        let mut scene = Scene::new();
        scene.apply_all(world.drain_commands());
        let svg = mosaic_core::svg::render_scene_svg(&scene, 1200.0, 1200.0, true);
        std::fs::write(out, svg).with_context(|| format!("writing {}", out.display()))?;
        tracing::info!(path = %out.display(), "wrote scene map");
        return Ok(());
    }

    renderer::render_tui(world)
}
