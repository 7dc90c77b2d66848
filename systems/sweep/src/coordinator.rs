//! Wave orchestration: request gating, spawning, per-tick advancement and
//! completion signalling.
//!
//! Shared state is split into independently locked groups. Whenever more than
//! one lock is held they are taken in this order: runtime, host, flashes,
//! outbox. The settings lock and the generation window are never held while
//! another lock is acquired.

use std::{
    collections::{BTreeMap, VecDeque},
    io,
    sync::{
        atomic::{AtomicU8, Ordering},
        mpsc::{self, Receiver, SyncSender, TrySendError},
        Arc,
    },
    time::Duration,
};

use gridsweep_core::{
    CellCoord, Classifier, Clock, Direction, EntityId, Event, Generation, GridHost,
    OccupantClass, SweepScope, SweeperId,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::{
    agent::{CellPoint, SpawnPlan, SweepAgent},
    collision::{swept_span, CollisionScanner},
    config::{ConfigError, SweepConfig},
    flash::{FlashEmitter, FlashMarker},
    ticker::Ticker,
    trail::{TrailPoint, TrailPool},
};

/// Lifecycle of the current sweep wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SweepPhase {
    /// No wave is in flight; requests are accepted.
    Inactive,
    /// A request was accepted and awaits the next update.
    Spawning,
    /// Sweepers are travelling, or a phantom wave awaits its completion.
    Active,
}

impl SweepPhase {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Inactive => 0,
            Self::Spawning => 1,
            Self::Active => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Spawning,
            2 => Self::Active,
            _ => Self::Inactive,
        }
    }
}

/// Immediate result of [`SweepCoordinator::request_sweep`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
    /// The request was queued and will start a wave on the next update.
    Queued,
    /// A request with the same generation tag was already served recently.
    Duplicate,
    /// Another wave is spawning or active.
    WaveInFlight,
    /// The request queue could not accept the request; retry later.
    Dropped,
}

/// Point-in-time summary of the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepStatus {
    /// Current lifecycle phase.
    pub phase: SweepPhase,
    /// Live sweepers.
    pub agents: usize,
    /// Trail rings currently handed out by the pool.
    pub trails_in_use: usize,
    /// Live flash markers.
    pub flash_markers: usize,
    /// Clock reading at which the current wave started.
    pub activated_at: Option<Duration>,
    /// Clock reading of the most recent update.
    pub last_update: Option<Duration>,
    /// Number of waves that published their completion.
    pub waves_completed: u64,
}

impl SweepStatus {
    /// Whether a wave is spawning or active.
    #[must_use]
    pub fn active(&self) -> bool {
        self.phase != SweepPhase::Inactive
    }
}

/// Read-only snapshot of a live sweeper for renderers.
#[derive(Clone, Debug, PartialEq)]
pub struct SweeperSnapshot {
    /// Identifier of the sweeper.
    pub id: SweeperId,
    /// Grid entity registered for the sweeper.
    pub entity: EntityId,
    /// Direction of travel.
    pub direction: Direction,
    /// Precise position in cell units.
    pub position: CellPoint,
    /// Velocity in cells per second.
    pub velocity: CellPoint,
    /// Travel-axis coordinate at which the sweeper retires.
    pub target: f64,
    /// Character drawn for the sweeper.
    pub glyph: char,
    /// Visible trail, newest first.
    pub trail: Vec<TrailPoint>,
}

#[derive(Clone, Copy, Debug)]
struct SweepRequest {
    scope: SweepScope,
    generation: Generation,
}

#[derive(Clone, Copy, Debug)]
struct Wave {
    generation: Generation,
    spawned: usize,
}

#[derive(Clone, Copy, Debug)]
enum DeltaSource {
    Fixed(Duration),
    SinceLastUpdate,
}

#[derive(Clone, Debug)]
struct Settings {
    config: SweepConfig,
    columns: u32,
    rows: u32,
}

struct Runtime {
    requests: Receiver<SweepRequest>,
    agents: BTreeMap<SweeperId, SweepAgent>,
    trails: TrailPool,
    scanner: CollisionScanner,
    wave: Option<Wave>,
    next_sweeper: u32,
    activated_at: Option<Duration>,
    last_update: Option<Duration>,
    waves_completed: u64,
}

/// Bounded, self-pruning record of recently served generation tags.
#[derive(Debug, Default)]
struct GenerationWindow {
    served: VecDeque<(Generation, Duration)>,
}

impl GenerationWindow {
    fn prune(&mut self, now: Duration, horizon: Duration) {
        while let Some((_, served_at)) = self.served.front() {
            if now.saturating_sub(*served_at) < horizon {
                break;
            }
            let _ = self.served.pop_front();
        }
    }

    fn contains(&self, generation: Generation) -> bool {
        self.served.iter().any(|(served, _)| *served == generation)
    }

    fn record(&mut self, generation: Generation, now: Duration, capacity: usize) {
        self.served.push_back((generation, now));
        while self.served.len() > capacity {
            let _ = self.served.pop_front();
        }
    }
}

struct Shared<H> {
    host: Arc<Mutex<H>>,
    classifier: Box<dyn Classifier<H>>,
    clock: Arc<dyn Clock>,
    phase: AtomicU8,
    settings: RwLock<Settings>,
    generations: Mutex<GenerationWindow>,
    runtime: Mutex<Runtime>,
    flashes: Mutex<FlashEmitter>,
    outbox: Mutex<Vec<Event>>,
}

/// Orchestrates sweep waves over a shared [`GridHost`].
///
/// Both [`SweepCoordinator::update`] and the optional autonomous ticker funnel
/// into the same step routine, so the two paths never diverge.
pub struct SweepCoordinator<H>
where
    H: GridHost + Send + 'static,
{
    shared: Arc<Shared<H>>,
    requests: SyncSender<SweepRequest>,
    ticker: Mutex<Option<Ticker>>,
}

impl<H> SweepCoordinator<H>
where
    H: GridHost + Send + 'static,
{
    /// Creates a coordinator sweeping `host` for occupants accepted by
    /// `classifier`.
    pub fn new<C>(
        host: Arc<Mutex<H>>,
        classifier: C,
        clock: Arc<dyn Clock>,
        config: SweepConfig,
    ) -> Result<Self, ConfigError>
    where
        C: Classifier<H> + 'static,
    {
        config.validate()?;
        let (columns, rows) = host.lock().dimensions();
        let (requests, receiver) = mpsc::sync_channel(config.request_queue_capacity);
        let trails = TrailPool::new(config.trail_length, config.max_concurrent_agents);
        let shared = Shared {
            host,
            classifier: Box::new(classifier),
            clock,
            phase: AtomicU8::new(SweepPhase::Inactive.to_u8()),
            settings: RwLock::new(Settings {
                config,
                columns,
                rows,
            }),
            generations: Mutex::new(GenerationWindow::default()),
            runtime: Mutex::new(Runtime {
                requests: receiver,
                agents: BTreeMap::new(),
                trails,
                scanner: CollisionScanner::default(),
                wave: None,
                next_sweeper: 0,
                activated_at: None,
                last_update: None,
                waves_completed: 0,
            }),
            flashes: Mutex::new(FlashEmitter::default()),
            outbox: Mutex::new(Vec::new()),
        };
        Ok(Self {
            shared: Arc::new(shared),
            requests,
            ticker: Mutex::new(None),
        })
    }

    /// Host shared with the coordinator.
    #[must_use]
    pub fn host(&self) -> &Arc<Mutex<H>> {
        &self.shared.host
    }

    /// Asks for a new wave without blocking.
    ///
    /// Requests are ignored while another wave is spawning or active, and
    /// when their generation tag was served within the deduplication
    /// horizon. A full queue drops the request with a warning.
    pub fn request_sweep(&self, scope: SweepScope, generation: Generation) -> RequestOutcome {
        let now = self.shared.clock.now();
        let (horizon, capacity) = {
            let settings = self.shared.settings.read();
            (
                settings.config.dedup_horizon(),
                settings.config.dedup_capacity,
            )
        };

        let mut window = self.shared.generations.lock();
        window.prune(now, horizon);
        if window.contains(generation) {
            debug!(generation = generation.get(), "duplicate sweep request ignored");
            return RequestOutcome::Duplicate;
        }

        if self
            .shared
            .phase
            .compare_exchange(
                SweepPhase::Inactive.to_u8(),
                SweepPhase::Spawning.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!(
                generation = generation.get(),
                "sweep request ignored while a wave is in flight"
            );
            return RequestOutcome::WaveInFlight;
        }

        enqueue(
            &self.requests,
            &self.shared.phase,
            &mut window,
            SweepRequest { scope, generation },
            now,
            capacity,
        )
    }

    /// Consumes world events: sweep requests start waves and grid
    /// reconfiguration updates the cached dimensions.
    pub fn handle(&self, events: &[Event]) {
        for event in events {
            match event {
                Event::SweepRequested { origin, generation } => {
                    let _ = self.request_sweep(SweepScope::from_origin(*origin), *generation);
                }
                Event::GridConfigured { columns, rows } => self.resize(*columns, *rows),
                _ => {}
            }
        }
    }

    /// Advances the mechanic by `dt`: consumes at most one queued request,
    /// moves every sweeper by the same `dt`, and publishes completion once
    /// the population returns to zero.
    pub fn update(&self, dt: Duration) {
        self.shared.step(DeltaSource::Fixed(dt));
    }

    /// Starts the autonomous ticker. Calling it while the ticker runs has no
    /// effect.
    pub fn start(&self) -> io::Result<()> {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return Ok(());
        }
        let interval = self.shared.settings.read().config.tick_interval();
        let shared = Arc::clone(&self.shared);
        *ticker = Some(Ticker::spawn(interval, move || {
            shared.step(DeltaSource::SinceLastUpdate);
        })?);
        Ok(())
    }

    /// Stops the ticker, waits for it to exit, then destroys every remaining
    /// sweeper, releases their trails and clears flash markers. A wave cut
    /// short this way still publishes its completion. Repeated calls are
    /// harmless.
    pub fn shutdown(&self) {
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            ticker.stop();
        }
        self.shared.force_cleanup();
    }

    /// Applies a new configuration. Trail length changes take effect with the
    /// next wave.
    pub fn reconfigure(&self, config: SweepConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.shared.settings.write().config = config;
        Ok(())
    }

    /// Updates the cached grid dimensions.
    pub fn resize(&self, columns: u32, rows: u32) {
        let mut settings = self.shared.settings.write();
        settings.columns = columns;
        settings.rows = rows;
    }

    /// Whether a wave is spawning or active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.phase() != SweepPhase::Inactive
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SweepPhase {
        self.shared.phase()
    }

    /// Captures a status snapshot.
    #[must_use]
    pub fn status(&self) -> SweepStatus {
        let runtime = self.shared.runtime.lock();
        let flash_markers = self.shared.flashes.lock().len();
        SweepStatus {
            phase: self.shared.phase(),
            agents: runtime.agents.len(),
            trails_in_use: runtime.trails.in_use(),
            flash_markers,
            activated_at: runtime.activated_at,
            last_update: runtime.last_update,
            waves_completed: runtime.waves_completed,
        }
    }

    /// Captures every live sweeper in identifier order.
    #[must_use]
    pub fn agents(&self) -> Vec<SweeperSnapshot> {
        let now = self.shared.clock.now();
        let fade = self.shared.settings.read().config.trail_fade();
        let runtime = self.shared.runtime.lock();
        runtime
            .agents
            .values()
            .map(|agent| SweeperSnapshot {
                id: agent.id,
                entity: agent.entity,
                direction: agent.direction,
                position: agent.position,
                velocity: agent.velocity,
                target: agent.target,
                glyph: agent.glyph,
                trail: runtime.trails.points(&agent.trail, now, fade),
            })
            .collect()
    }

    /// Captures the live flash markers in cell order.
    #[must_use]
    pub fn flash_markers(&self) -> Vec<FlashMarker> {
        self.shared.flashes.lock().snapshot()
    }

    /// Moves every published event into `out`.
    pub fn drain_events(&self, out: &mut Vec<Event>) {
        out.append(&mut self.shared.outbox.lock());
    }
}

impl<H> Drop for SweepCoordinator<H>
where
    H: GridHost + Send + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<H> Shared<H>
where
    H: GridHost + Send + 'static,
{
    fn phase(&self) -> SweepPhase {
        SweepPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: SweepPhase) {
        self.phase.store(phase.to_u8(), Ordering::Release);
    }

    /// The single update path shared by callers and the ticker.
    fn step(&self, delta: DeltaSource) {
        let now = self.clock.now();
        let settings = self.settings.read().clone();
        let mut events = Vec::new();

        let mut runtime = self.runtime.lock();
        let dt = match delta {
            DeltaSource::Fixed(dt) => dt,
            DeltaSource::SinceLastUpdate => runtime
                .last_update
                .map_or(Duration::ZERO, |last| now.saturating_sub(last)),
        };

        if let Ok(request) = runtime.requests.try_recv() {
            self.begin_wave(&mut runtime, &settings, request, now, &mut events);
        }

        if !runtime.agents.is_empty() {
            self.advance_agents(&mut runtime, &settings, dt, now, &mut events);
        }

        let expired = self.flashes.lock().expire(now);
        if expired > 0 {
            trace!(expired, "flash markers expired");
        }

        let completed = self.complete_wave_if_empty(&mut runtime, &mut events);
        runtime.last_update = Some(now);
        self.publish(&mut events);
        if completed {
            self.set_phase(SweepPhase::Inactive);
        }
    }

    fn begin_wave(
        &self,
        runtime: &mut Runtime,
        settings: &Settings,
        request: SweepRequest,
        now: Duration,
        events: &mut Vec<Event>,
    ) {
        if runtime.wave.is_some() {
            debug!(
                generation = request.generation.get(),
                "queued sweep request discarded; wave already running"
            );
            return;
        }

        let config = &settings.config;
        if runtime.agents.is_empty() && runtime.trails.capacity() != config.trail_length {
            runtime.trails = TrailPool::new(config.trail_length, config.max_concurrent_agents);
        }

        let mut host = self.host.lock();
        let mut plans = plan_wave(
            &*host,
            &*self.classifier,
            request.scope,
            settings.columns,
            settings.rows,
            config,
        );
        if config.max_concurrent_agents > 0 && plans.len() > config.max_concurrent_agents {
            debug!(
                planned = plans.len(),
                limit = config.max_concurrent_agents,
                "sweep wave truncated"
            );
            plans.truncate(config.max_concurrent_agents);
        }

        for plan in &plans {
            let id = SweeperId::new(runtime.next_sweeper);
            runtime.next_sweeper = runtime.next_sweeper.wrapping_add(1);
            let entity = host.spawn_entity(OccupantClass::Sweeper, config.glyph);
            let trail = runtime.trails.acquire();
            let mut agent = SweepAgent::new(id, entity, *plan, config.glyph, trail);

            let cell = agent.registration_cell(settings.columns, settings.rows);
            if !host.place(entity, cell) {
                warn!(sweeper = id.get(), "sweeper registration rejected by host");
            }
            host.set_protected(entity, true);
            if let Some(visited) = agent.grid_cell(settings.columns, settings.rows) {
                let _ = runtime.trails.record(&mut agent.trail, visited, now);
            }

            events.push(Event::SweeperSpawned {
                sweeper: id,
                cell,
                direction: plan.direction,
            });
            let _ = runtime.agents.insert(id, agent);
        }
        drop(host);

        runtime.wave = Some(Wave {
            generation: request.generation,
            spawned: plans.len(),
        });
        runtime.activated_at = Some(now);
        self.set_phase(SweepPhase::Active);

        if plans.is_empty() {
            info!(
                generation = request.generation.get(),
                "no targets found; phantom sweep wave"
            );
        } else {
            info!(
                generation = request.generation.get(),
                agents = plans.len(),
                "sweep wave started"
            );
        }
    }

    fn advance_agents(
        &self,
        runtime: &mut Runtime,
        settings: &Settings,
        dt: Duration,
        now: Duration,
        events: &mut Vec<Event>,
    ) {
        let config = &settings.config;
        let (columns, rows) = (settings.columns, settings.rows);
        let dt_secs = dt.as_secs_f64();
        let mut finished = Vec::new();

        let mut host = self.host.lock();
        let mut flashes = self.flashes.lock();
        let Runtime {
            agents,
            trails,
            scanner,
            ..
        } = &mut *runtime;

        for (id, agent) in agents.iter_mut() {
            let (from, to) = agent.integrate(dt_secs);
            let extent = if agent.direction.is_horizontal() {
                columns
            } else {
                rows
            };

            if let Some(span) = swept_span(from, to, extent) {
                for hit in scanner.scan(&*host, &*self.classifier, agent, span) {
                    let _ = flashes.emit(
                        hit.cell,
                        config.flash_glyph,
                        config.flash_duration(),
                        now,
                        events,
                    );
                    if host.destroy_entity(hit.entity) {
                        trace!(
                            sweeper = id.get(),
                            entity = hit.entity.get(),
                            column = hit.cell.column(),
                            row = hit.cell.row(),
                            "target cleared"
                        );
                        events.push(Event::TargetCleared {
                            sweeper: *id,
                            entity: hit.entity,
                            cell: hit.cell,
                        });
                    }
                }
            }

            if let Some(cell) = agent.grid_cell(columns, rows) {
                let _ = trails.record(&mut agent.trail, cell, now);
            }
            let _ = host.move_to(agent.entity, agent.registration_cell(columns, rows));

            if agent.reached_target() {
                finished.push(*id);
            }
        }
        drop(flashes);

        for id in finished {
            retire(runtime, &mut *host, id, events);
        }
    }

    fn complete_wave_if_empty(&self, runtime: &mut Runtime, events: &mut Vec<Event>) -> bool {
        if self.phase() != SweepPhase::Active || !runtime.agents.is_empty() {
            return false;
        }
        let Some(wave) = runtime.wave.take() else {
            return false;
        };
        events.push(Event::SweepCompleted {
            generation: wave.generation,
            agents_spawned: wave.spawned,
        });
        runtime.activated_at = None;
        runtime.waves_completed = runtime.waves_completed.saturating_add(1);
        info!(
            generation = wave.generation.get(),
            agents = wave.spawned,
            "sweep wave completed"
        );
        true
    }

    fn force_cleanup(&self) {
        let mut events = Vec::new();
        let mut runtime = self.runtime.lock();

        let residual: Vec<SweeperId> = runtime.agents.keys().copied().collect();
        if !residual.is_empty() {
            let mut host = self.host.lock();
            for id in &residual {
                retire(&mut runtime, &mut *host, *id, &mut events);
            }
        }
        self.flashes.lock().clear();

        while let Ok(request) = runtime.requests.try_recv() {
            if runtime.wave.is_none() {
                runtime.wave = Some(Wave {
                    generation: request.generation,
                    spawned: 0,
                });
            }
        }

        let completed = match runtime.wave.take() {
            Some(wave) => {
                events.push(Event::SweepCompleted {
                    generation: wave.generation,
                    agents_spawned: wave.spawned,
                });
                runtime.activated_at = None;
                runtime.waves_completed = runtime.waves_completed.saturating_add(1);
                true
            }
            None => false,
        };

        self.publish(&mut events);
        if completed {
            self.set_phase(SweepPhase::Inactive);
        }
        info!(
            residual_agents = residual.len(),
            completed_wave = completed,
            "sweep coordinator shut down"
        );
    }

    fn publish(&self, events: &mut Vec<Event>) {
        if events.is_empty() {
            return;
        }
        self.outbox.lock().append(events);
    }
}

/// Hands an admitted request to the bounded queue. The tag is recorded only
/// when the queue accepts it; otherwise the phase returns to `Inactive` so
/// the caller may retry on a later tick.
fn enqueue(
    requests: &SyncSender<SweepRequest>,
    phase: &AtomicU8,
    window: &mut GenerationWindow,
    request: SweepRequest,
    now: Duration,
    capacity: usize,
) -> RequestOutcome {
    let generation = request.generation;
    let reason = match requests.try_send(request) {
        Ok(()) => {
            window.record(generation, now, capacity);
            return RequestOutcome::Queued;
        }
        Err(TrySendError::Full(_)) => "full",
        Err(TrySendError::Disconnected(_)) => "closed",
    };
    phase.store(SweepPhase::Inactive.to_u8(), Ordering::Release);
    warn!(
        generation = generation.get(),
        queue = reason,
        "sweep request dropped"
    );
    RequestOutcome::Dropped
}

/// Destroys a sweeper and releases its trail. Unknown identifiers are ignored,
/// so the ticker and caller-driven updates may both invoke it.
fn retire<H>(runtime: &mut Runtime, host: &mut H, id: SweeperId, events: &mut Vec<Event>)
where
    H: GridHost + ?Sized,
{
    let Some(agent) = runtime.agents.remove(&id) else {
        return;
    };
    host.set_protected(agent.entity, false);
    let _ = host.destroy_entity(agent.entity);
    runtime.trails.release(agent.trail);
    events.push(Event::SweeperFinished { sweeper: id });
}

/// Decides which sweepers a wave spawns, in deterministic order: ascending
/// rows for full-grid waves, [`Direction::RADIAL`] order for radial ones.
fn plan_wave<H>(
    host: &H,
    classifier: &dyn Classifier<H>,
    scope: SweepScope,
    columns: u32,
    rows: u32,
    config: &SweepConfig,
) -> Vec<SpawnPlan>
where
    H: GridHost + ?Sized,
{
    let mut scratch = Vec::new();
    let mut holds_target = |cell: CellCoord| -> bool {
        if host.occupant(cell).is_none() {
            return false;
        }
        scratch.clear();
        host.occupants(cell, &mut scratch);
        scratch
            .iter()
            .any(|entity| classifier.matches(host, *entity))
    };

    match scope {
        SweepScope::FullGrid => {
            if columns == 0 {
                return Vec::new();
            }
            let speed = config.speed_for_extent(columns);
            let last = f64::from(columns - 1);
            (0..rows)
                .filter(|row| (0..columns).any(|column| holds_target(CellCoord::new(column, *row))))
                .map(|row| {
                    if row % 2 == 1 {
                        SpawnPlan {
                            direction: Direction::East,
                            lane: row,
                            start: -1.0,
                            target: last,
                            speed,
                        }
                    } else {
                        SpawnPlan {
                            direction: Direction::West,
                            lane: row,
                            start: f64::from(columns),
                            target: 0.0,
                            speed,
                        }
                    }
                })
                .collect()
        }
        SweepScope::Radial { origin } => {
            if !origin.within(columns, rows) {
                debug!(
                    column = origin.column(),
                    row = origin.row(),
                    "radial sweep origin outside grid"
                );
                return Vec::new();
            }
            let in_row =
                (0..columns).any(|column| holds_target(CellCoord::new(column, origin.row())));
            let in_cross =
                in_row || (0..rows).any(|row| holds_target(CellCoord::new(origin.column(), row)));
            if !in_cross {
                return Vec::new();
            }
            Direction::RADIAL
                .iter()
                .map(|direction| {
                    let (lane, start, extent) = if direction.is_horizontal() {
                        (origin.row(), origin.column(), columns)
                    } else {
                        (origin.column(), origin.row(), rows)
                    };
                    let target = if direction.sign() > 0.0 {
                        f64::from(extent - 1)
                    } else {
                        0.0
                    };
                    SpawnPlan {
                        direction: *direction,
                        lane,
                        start: f64::from(start),
                        target,
                        speed: config.speed_for_extent(extent),
                    }
                })
                .collect()
        }
    }
}
