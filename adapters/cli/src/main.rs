#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that scatters hazards across a character grid and
//! clears them with a sweep wave, printing every frame.

mod frame;

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use gridsweep_core::{
    CellCoord, Clock, Command, EntityId, Event, Generation, ManualClock, OccupantClass,
    SweepScope, SystemClock,
};
use gridsweep_system_sweep::{RequestOutcome, SweepConfig, SweepCoordinator};
use gridsweep_world::{self as world, query, World};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "gridsweep_system_sweep=info,gridsweep_cli=info";
const HAZARD_GLYPH: char = '#';

#[derive(Debug, Parser)]
#[command(name = "gridsweep")]
#[command(about = "Clears scattered hazards off a character grid with a sweep wave", long_about = None)]
struct Cli {
    /// Grid width in cells
    #[arg(long, default_value_t = 64)]
    columns: u32,

    /// Grid height in cells
    #[arg(long, default_value_t = 16)]
    rows: u32,

    /// Probability that a cell holds a hazard
    #[arg(long, default_value_t = 0.06)]
    density: f64,

    /// Seed for hazard and text placement
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// TOML file overriding the sweep configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Radial origin as `column,row`; omitted for a full-grid sweep
    #[arg(long, value_parser = parse_origin)]
    origin: Option<CellCoord>,

    /// Frames rendered per second of simulated time
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Upper bound on rendered frames
    #[arg(long, default_value_t = 600)]
    max_frames: usize,

    /// Drive the sweep from its own ticker thread and the wall clock instead
    /// of stepping simulated time
    #[arg(long)]
    live: bool,

    /// Only print the first and last frame
    #[arg(long)]
    quiet: bool,
}

fn parse_origin(value: &str) -> std::result::Result<CellCoord, String> {
    let (column, row) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `column,row`, got `{value}`"))?;
    let column = column
        .trim()
        .parse::<u32>()
        .map_err(|error| format!("invalid column `{column}`: {error}"))?;
    let row = row
        .trim()
        .parse::<u32>()
        .map_err(|error| format!("invalid row `{row}`: {error}"))?;
    Ok(CellCoord::new(column, row))
}

fn load_config(path: Option<&Path>) -> Result<SweepConfig> {
    let Some(path) = path else {
        return Ok(SweepConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read sweep configuration {}", path.display()))?;
    SweepConfig::from_toml_str(&contents)
        .with_context(|| format!("invalid sweep configuration {}", path.display()))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Fills the grid with hazards and a sprinkling of text the sweep must spare.
fn scatter(host: &mut World, density: f64, seed: u64) -> usize {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (columns, rows) = query::dimensions(host);
    let mut events = Vec::new();
    for row in 0..rows {
        for column in 0..columns {
            let (class, glyph) = if rng.gen_bool(density) {
                (OccupantClass::Hazard, HAZARD_GLYPH)
            } else if rng.gen_bool(density / 2.0) {
                (OccupantClass::Text, char::from(rng.gen_range(b'a'..=b'z')))
            } else {
                continue;
            };
            world::apply(
                host,
                Command::PlaceOccupant {
                    cell: CellCoord::new(column, row),
                    class,
                    glyph,
                },
                &mut events,
            );
        }
    }
    query::occupants_of_class(host, OccupantClass::Hazard).len()
}

fn is_hazard(host: &World, entity: EntityId) -> bool {
    query::class_of(host, entity) == Some(OccupantClass::Hazard)
}

#[derive(Debug, Default)]
struct Tally {
    spawned: usize,
    cleared: usize,
    completed: bool,
}

impl Tally {
    fn absorb(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::SweeperSpawned { .. } => self.spawned += 1,
                Event::TargetCleared { .. } => self.cleared += 1,
                Event::SweepCompleted { .. } => self.completed = true,
                _ => {}
            }
        }
    }
}

fn render(out: &mut impl Write, sweep: &SweepCoordinator<World>, index: usize) -> Result<()> {
    let rows = query::render_rows(&sweep.host().lock(), frame::BLANK);
    let picture = frame::compose(&rows, &sweep.agents(), &sweep.flash_markers());
    writeln!(out, "frame {index}\n{picture}").context("failed to write frame")?;
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    ensure!(cli.columns > 0 && cli.rows > 0, "grid must have at least one cell");
    ensure!(
        (0.0..=1.0).contains(&cli.density),
        "density must lie in 0.0..=1.0, got {}",
        cli.density
    );
    ensure!(cli.fps > 0, "fps must be greater than zero");
    if let Some(origin) = cli.origin {
        if !origin.within(cli.columns, cli.rows) {
            bail!(
                "origin {},{} lies outside the {}x{} grid",
                origin.column(),
                origin.row(),
                cli.columns,
                cli.rows
            );
        }
    }

    let config = load_config(cli.config.as_deref())?;
    let mut host = World::with_dimensions(cli.columns, cli.rows);
    let hazards = scatter(&mut host, cli.density, cli.seed);
    info!(
        columns = cli.columns,
        rows = cli.rows,
        hazards,
        seed = cli.seed,
        "grid populated"
    );

    let manual = ManualClock::new();
    let clock: Arc<dyn Clock> = if cli.live {
        Arc::new(SystemClock::new())
    } else {
        Arc::new(manual.clone())
    };
    let sweep = SweepCoordinator::new(Arc::new(Mutex::new(host)), is_hazard, clock, config)
        .context("failed to create sweep coordinator")?;
    if cli.live {
        sweep.start().context("failed to start sweep ticker")?;
    }

    let scope = SweepScope::from_origin(cli.origin);
    match sweep.request_sweep(scope, Generation::new(1)) {
        RequestOutcome::Queued => {}
        outcome => bail!("sweep request was not accepted: {outcome:?}"),
    }

    let frame_interval = Duration::from_secs(1) / cli.fps;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut tally = Tally::default();
    let mut events = Vec::new();

    render(&mut out, &sweep, 0)?;
    let mut rendered = 0;
    while sweep.is_active() && rendered < cli.max_frames {
        rendered += 1;
        if cli.live {
            thread::sleep(frame_interval);
        } else {
            manual.advance(frame_interval);
            sweep.update(frame_interval);
        }

        events.clear();
        sweep.drain_events(&mut events);
        tally.absorb(&events);
        if !cli.quiet {
            render(&mut out, &sweep, rendered)?;
        }
    }

    sweep.shutdown();
    events.clear();
    sweep.drain_events(&mut events);
    tally.absorb(&events);
    if cli.quiet {
        render(&mut out, &sweep, rendered)?;
    }

    let remaining = query::occupants_of_class(&sweep.host().lock(), OccupantClass::Hazard).len();
    writeln!(
        out,
        "sweepers: {}  cleared: {}  remaining hazards: {}  completed: {}",
        tally.spawned, tally.cleared, remaining, tally.completed
    )
    .context("failed to write summary")?;
    info!(frames = rendered, cleared = tally.cleared, remaining, "sweep demo finished");
    Ok(())
}
