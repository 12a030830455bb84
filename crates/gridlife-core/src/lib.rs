//! Core simulation engine shared by the gridlife driver layers.
//!
//! The engine is a Conway's Game of Life board with two non-standard twists:
//!
//! * an **activity mask**: every cell carries an `enabled` flag and the
//!   stepping loop only evaluates enabled cells, so dead, quiescent regions
//!   of the grid cost nothing;
//! * a **pattern detector**: a bounded ring of visible-state keys lets the
//!   board classify itself as stable (fixed point), oscillating (with
//!   period), or still active after every generation.
//!
//! The board is pure in-memory state transition. It holds no timers and
//! performs no I/O; an external driver owns scheduling, pause/resume, and
//! all user-input validation, and observes the board exclusively through
//! value snapshots ([`Board::visible_cells`], [`StepSummary`], the status
//! accessors). No [`Cell`] reference ever escapes the board.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use thiserror::Error;

/// Width of the dead-space ring wrapped around the visible play area.
///
/// Neighbor lookups inside the visible region never need bounds checks, and
/// patterns drifting toward the edge die out against the outer ring instead
/// of wrapping. The value is empirically chosen; changing it changes
/// behavior at the grid boundary.
pub const PADDING: u32 = 5;

/// Cells with fewer valid neighbor slots than this are forced permanently
/// dead. Only the outermost ring of the padded grid qualifies (corners have
/// 3 slots, edges 5, everything else 8).
pub const PERMA_DEAD_NEIGHBOR_MIN: usize = 6;

/// Default capacity of the pattern-detection history ring.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Upper bound on each visible grid dimension, keeping the padded sizes
/// and offsets well clear of `u32` overflow. Far larger than any driver
/// accepts, but enforced so the engine is safe on its own.
pub const MAX_GRID_DIMENSION: u32 = 4096;

/// Monotonic generation counter advanced exactly once per step.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl Generation {
    /// The pre-simulation generation.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the following generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Classification of the running simulation produced by the detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PatternStatus {
    /// No repetition observed within the retained history window.
    #[default]
    None,
    /// The visible state equals the immediately preceding one (fixed point).
    Stable,
    /// The visible state recurred within the history window.
    Oscillating,
}

impl fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Stable => "stable",
            Self::Oscillating => "oscillating",
        };
        f.write_str(label)
    }
}

/// Errors surfaced for caller misuse of the board.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// An operation that requires a grid was invoked before `build_grid`.
    #[error("grid has not been built")]
    GridNotBuilt,
    /// A coordinate outside the padded grid was passed directly.
    #[error("invalid coordinate ({x}, {y})")]
    InvalidCoordinate { x: u32, y: u32 },
    /// Cell editing was attempted after the simulation started.
    #[error("simulation already started")]
    SimulationStarted,
}

/// Static configuration for a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridConfig {
    /// Visible play-area width in cells.
    pub cols: u32,
    /// Visible play-area height in cells.
    pub rows: u32,
    /// Number of visible-state keys retained for pattern detection.
    /// Periods longer than this go undetected; that is a documented
    /// limitation, not a bug.
    pub history_capacity: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cols: 30,
            rows: 30,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl GridConfig {
    /// Construct a configuration for a `cols x rows` visible play area.
    #[must_use]
    pub fn new(cols: u32, rows: u32) -> Self {
        Self {
            cols,
            rows,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), BoardError> {
        if self.cols == 0 || self.rows == 0 {
            return Err(BoardError::InvalidConfig(
                "grid dimensions must be non-zero",
            ));
        }
        if self.cols > MAX_GRID_DIMENSION || self.rows > MAX_GRID_DIMENSION {
            return Err(BoardError::InvalidConfig(
                "grid dimensions must not exceed MAX_GRID_DIMENSION",
            ));
        }
        if self.history_capacity == 0 {
            return Err(BoardError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        Ok(())
    }

    /// Full grid width including the padding ring on both sides.
    #[must_use]
    pub const fn padded_cols(&self) -> u32 {
        self.cols + 2 * PADDING
    }

    /// Full grid height including the padding ring on both sides.
    #[must_use]
    pub const fn padded_rows(&self) -> u32 {
        self.rows + 2 * PADDING
    }
}

/// A single automaton cell.
///
/// Cells are owned exclusively by the [`Board`]; the public surface exists
/// so neighbor computation can be exercised in isolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    x: u32,
    y: u32,
    alive: bool,
    /// State staged for the next generation. Meaningless outside a step's
    /// compute -> apply window.
    next_state: bool,
    /// Whether this cell participates in the next step's compute phase.
    enabled: bool,
    /// Padded-grid positions of the up-to-8 neighbors, fixed at build time.
    neighbors: Vec<(u32, u32)>,
    /// Scratch count refreshed each compute phase.
    alive_neighbors: u8,
    /// Set once at construction for outer-ring cells; never cleared.
    perma_dead: bool,
}

impl Cell {
    /// Construct a dead, disabled cell at padded coordinates `(x, y)`.
    #[must_use]
    pub fn new(x: u32, y: u32) -> Self {
        Self {
            x,
            y,
            alive: false,
            next_state: false,
            enabled: false,
            neighbors: Vec::new(),
            alive_neighbors: 0,
            perma_dead: false,
        }
    }

    /// Enumerate the 8 compass offsets and keep the positions accepted by
    /// the supplied validity predicate, then mark the cell permanently dead
    /// when fewer than [`PERMA_DEAD_NEIGHBOR_MIN`] survive.
    ///
    /// The predicate is an injected strategy over *padded* grid bounds so
    /// this runs without a grid present. Deterministic, run once per cell.
    pub fn compute_neighbors(&mut self, is_valid: impl Fn(i64, i64) -> bool) {
        let cx = i64::from(self.x);
        let cy = i64::from(self.y);
        for dx in -1..=1_i64 {
            for dy in -1..=1_i64 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = cx + dx;
                let ny = cy + dy;
                if is_valid(nx, ny) {
                    #[allow(clippy::cast_sign_loss)]
                    self.neighbors.push((nx as u32, ny as u32));
                }
            }
        }
        if self.neighbors.len() < PERMA_DEAD_NEIGHBOR_MIN {
            self.perma_dead = true;
        }
    }

    /// Evaluate the life rule against the current generation's neighbor
    /// count, staging the result in `next_state`.
    ///
    /// As a side effect, a cell staging dead with zero alive neighbors
    /// clears its own `enabled` flag: it is fully quiescent and will be
    /// skipped until a neighbor reactivates it.
    fn evaluate(&mut self, alive_neighbors: u8) {
        self.alive_neighbors = alive_neighbors;
        if self.perma_dead {
            self.next_state = false;
        } else if self.alive && (alive_neighbors == 2 || alive_neighbors == 3) {
            self.next_state = true;
        } else if !self.alive && alive_neighbors == 3 {
            self.next_state = true;
        } else {
            self.next_state = false;
            if alive_neighbors == 0 {
                self.enabled = false;
            }
        }
    }

    /// Padded-grid position of this cell.
    #[must_use]
    pub const fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    /// Whether the cell is currently alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Whether the cell participates in the next compute phase.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the cell sits in the outer ring and can never live.
    #[must_use]
    pub const fn is_perma_dead(&self) -> bool {
        self.perma_dead
    }

    /// The precomputed neighbor positions.
    #[must_use]
    pub fn neighbor_positions(&self) -> &[(u32, u32)] {
        &self.neighbors
    }
}

/// Read-only snapshot of a single cell in visible coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellView {
    pub x: u32,
    pub y: u32,
    pub alive: bool,
    pub enabled: bool,
}

/// Summary returned by [`Board::single_step`] describing the generation
/// just committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepSummary {
    pub generation: Generation,
    pub live_cells: usize,
    pub pattern_status: PatternStatus,
    pub oscillation_period: u32,
}

/// The simulation board: grid of cells, generation stepping, and pattern
/// detection over a rolling history of visible-state keys.
#[derive(Debug, Clone)]
pub struct Board {
    config: GridConfig,
    cells: Vec<Cell>,
    generation: Generation,
    state_history: VecDeque<String>,
    /// Whether the front of `state_history` is still the build-time seed
    /// key. The seed is pushed before any cells are toggled, so it does
    /// not describe a committed generation: the stable check may match it
    /// (an untouched board is a fixed point from its first step), but the
    /// oscillation scan must skip it.
    history_seeded: bool,
    pattern_status: PatternStatus,
    oscillation_period: u32,
    /// Visible-region cells that ended the latest step tracked but dead.
    boundary_cells: Vec<(u32, u32)>,
    grid_built: bool,
    game_started: bool,
    paused: bool,
}

impl Board {
    /// Create an unbuilt board from a validated configuration.
    pub fn new(config: GridConfig) -> Result<Self, BoardError> {
        config.validate()?;
        Ok(Self {
            config,
            cells: Vec::new(),
            generation: Generation::zero(),
            state_history: VecDeque::new(),
            history_seeded: false,
            pattern_status: PatternStatus::None,
            oscillation_period: 0,
            boundary_cells: Vec::new(),
            grid_built: false,
            game_started: false,
            paused: false,
        })
    }

    /// Immutable access to the configuration.
    #[must_use]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.config.padded_cols() as usize) + (x as usize)
    }

    fn in_padded(&self, x: u32, y: u32) -> bool {
        x < self.config.padded_cols() && y < self.config.padded_rows()
    }

    fn in_visible(&self, x: u32, y: u32) -> bool {
        x >= PADDING
            && x < PADDING + self.config.cols
            && y >= PADDING
            && y < PADDING + self.config.rows
    }

    /// Allocate the padded grid and compute every cell's neighbor set.
    ///
    /// Resets the generation counter, the detection history, and the
    /// pattern status. Calling it again fully replaces the grid.
    pub fn build_grid(&mut self) {
        let padded_cols = self.config.padded_cols();
        let padded_rows = self.config.padded_rows();
        let mut cells = Vec::with_capacity((padded_cols as usize) * (padded_rows as usize));
        for y in 0..padded_rows {
            for x in 0..padded_cols {
                let mut cell = Cell::new(x, y);
                cell.compute_neighbors(|nx, ny| {
                    nx >= 0 && nx < i64::from(padded_cols) && ny >= 0 && ny < i64::from(padded_rows)
                });
                cells.push(cell);
            }
        }
        self.cells = cells;
        self.grid_built = true;
        self.reset_detection();
    }

    /// Reset the counters and re-seed the history with the generation-0
    /// visible-state key, so a board whose first step leaves the visible
    /// region unchanged reports `Stable` immediately.
    fn reset_detection(&mut self) {
        self.generation = Generation::zero();
        self.pattern_status = PatternStatus::None;
        self.oscillation_period = 0;
        self.boundary_cells.clear();
        self.state_history.clear();
        let seed_key = self.visible_state_key();
        self.state_history.push_back(seed_key);
        self.history_seeded = true;
    }

    /// Flip the life state of the cell at *padded* coordinates `(x, y)`.
    ///
    /// A cell toggled alive activates its whole neighborhood; either way
    /// the cell itself is marked enabled, since a toggled-off cell still
    /// needs evaluating next step. Legal only before [`Board::start`].
    pub fn toggle_cell(&mut self, x: u32, y: u32) -> Result<(), BoardError> {
        if !self.grid_built {
            return Err(BoardError::GridNotBuilt);
        }
        if self.game_started {
            return Err(BoardError::SimulationStarted);
        }
        if !self.in_padded(x, y) {
            return Err(BoardError::InvalidCoordinate { x, y });
        }
        let idx = self.offset(x, y);
        self.cells[idx].alive = !self.cells[idx].alive;
        if self.cells[idx].alive {
            self.activate_neighborhood(idx);
        }
        self.cells[idx].enabled = true;
        Ok(())
    }

    /// Kill and disable every cell across the whole padded grid and reset
    /// the counters and detection state. The grid allocation is kept.
    pub fn clear_grid(&mut self) -> Result<(), BoardError> {
        if !self.grid_built {
            return Err(BoardError::GridNotBuilt);
        }
        for cell in &mut self.cells {
            cell.alive = false;
            cell.next_state = false;
            cell.enabled = false;
            cell.alive_neighbors = 0;
        }
        self.reset_detection();
        Ok(())
    }

    /// Mark the simulation as started; cell editing becomes illegal.
    pub fn start(&mut self) -> Result<(), BoardError> {
        if !self.grid_built {
            return Err(BoardError::GridNotBuilt);
        }
        self.game_started = true;
        Ok(())
    }

    /// Scheduling hint owned by the driver; the engine never reads it
    /// mid-step (there is no mid-step).
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Whether the driver has marked the simulation paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Set `enabled` on every neighbor of the cell at `idx`.
    fn activate_neighborhood(&mut self, idx: usize) {
        for k in 0..self.cells[idx].neighbors.len() {
            let (nx, ny) = self.cells[idx].neighbors[k];
            let neighbor_idx = self.offset(nx, ny);
            self.cells[neighbor_idx].enabled = true;
        }
    }

    /// Advance the simulation by exactly one generation.
    ///
    /// Two-phase update: the compute phase evaluates the life rule for
    /// every *enabled* cell against a single consistent snapshot of the
    /// current `alive` values (disabled cells are skipped entirely); the
    /// apply phase then commits the staged states in order. Cells that
    /// became alive re-enable their neighborhood for the *following* step;
    /// activation is never visible mid-step, preserving synchronous
    /// semantics. Pattern detection runs after the commit.
    pub fn single_step(&mut self) -> Result<StepSummary, BoardError> {
        if !self.grid_built {
            return Err(BoardError::GridNotBuilt);
        }

        let mut worklist = Vec::new();
        for idx in 0..self.cells.len() {
            if !self.cells[idx].enabled {
                continue;
            }
            let mut alive_neighbors = 0u8;
            for k in 0..self.cells[idx].neighbors.len() {
                let (nx, ny) = self.cells[idx].neighbors[k];
                let neighbor_idx = self.offset(nx, ny);
                if self.cells[neighbor_idx].alive {
                    alive_neighbors += 1;
                }
            }
            self.cells[idx].evaluate(alive_neighbors);
            worklist.push(idx);
        }

        self.boundary_cells.clear();
        for &idx in &worklist {
            let next = self.cells[idx].next_state;
            self.cells[idx].alive = next;
            if next {
                self.activate_neighborhood(idx);
            }
            let (x, y, enabled, alive) = {
                let cell = &self.cells[idx];
                (cell.x, cell.y, cell.enabled, cell.alive)
            };
            if enabled && !alive && self.in_visible(x, y) {
                self.boundary_cells.push((x - PADDING, y - PADDING));
            }
        }

        self.generation = self.generation.next();
        self.detect_pattern();

        Ok(StepSummary {
            generation: self.generation,
            live_cells: self.live_cell_count(),
            pattern_status: self.pattern_status,
            oscillation_period: self.oscillation_period,
        })
    }

    /// Order-independent, deterministic key for the visible alive set:
    /// `"x,y;"` per alive cell, row-major over the visible sub-rectangle,
    /// zero-based visible coordinates. Padding cells carry no information
    /// and are excluded.
    fn visible_state_key(&self) -> String {
        let mut key = String::new();
        for y in PADDING..PADDING + self.config.rows {
            for x in PADDING..PADDING + self.config.cols {
                if self.cells[self.offset(x, y)].alive {
                    let _ = write!(key, "{},{};", x - PADDING, y - PADDING);
                }
            }
        }
        key
    }

    /// Classify the generation just committed.
    ///
    /// A key equal to the most recent history entry is a fixed point; a key
    /// matching an older *committed* entry at index `i` is an oscillation
    /// with period `len - i` (the build-time seed key is not a committed
    /// generation and only participates in the fixed-point check). Only
    /// unmatched keys are pushed, and the ring evicts its oldest entry past
    /// capacity, bounding both memory and detection latency to the
    /// capacity window.
    fn detect_pattern(&mut self) {
        let key = self.visible_state_key();

        if let Some(last) = self.state_history.back() {
            if *last == key {
                self.pattern_status = PatternStatus::Stable;
                self.oscillation_period = 0;
                return;
            }
        }

        let len = self.state_history.len();
        let scan_start = usize::from(self.history_seeded);
        for i in scan_start..len.saturating_sub(1) {
            if self.state_history[i] == key {
                self.pattern_status = PatternStatus::Oscillating;
                self.oscillation_period = (len - i) as u32;
                return;
            }
        }

        self.pattern_status = PatternStatus::None;
        self.oscillation_period = 0;
        self.state_history.push_back(key);
        while self.state_history.len() > self.config.history_capacity {
            self.state_history.pop_front();
            // The seed sits at the front, so the first eviction drops it.
            self.history_seeded = false;
        }
    }

    /// Snapshot of every visible-region cell in zero-based visible
    /// coordinates, row-major.
    #[must_use]
    pub fn visible_cells(&self) -> Vec<CellView> {
        if !self.grid_built {
            return Vec::new();
        }
        let mut views =
            Vec::with_capacity((self.config.cols as usize) * (self.config.rows as usize));
        for y in PADDING..PADDING + self.config.rows {
            for x in PADDING..PADDING + self.config.cols {
                let cell = &self.cells[self.offset(x, y)];
                views.push(CellView {
                    x: x - PADDING,
                    y: y - PADDING,
                    alive: cell.alive,
                    enabled: cell.enabled,
                });
            }
        }
        views
    }

    /// Snapshot of a single cell at *padded* coordinates, mainly useful
    /// for inspecting the padding ring.
    #[must_use]
    pub fn cell_at(&self, x: u32, y: u32) -> Option<CellView> {
        if !self.grid_built || !self.in_padded(x, y) {
            return None;
        }
        let cell = &self.cells[self.offset(x, y)];
        Some(CellView {
            x,
            y,
            alive: cell.alive,
            enabled: cell.enabled,
        })
    }

    /// Number of alive cells in the visible region.
    #[must_use]
    pub fn live_cell_count(&self) -> usize {
        if !self.grid_built {
            return 0;
        }
        let mut count = 0;
        for y in PADDING..PADDING + self.config.rows {
            for x in PADDING..PADDING + self.config.cols {
                if self.cells[self.offset(x, y)].alive {
                    count += 1;
                }
            }
        }
        count
    }

    /// Visible coordinates of cells that ended the latest step enabled but
    /// dead: the tracked boundary around live material.
    #[must_use]
    pub fn boundary_cells(&self) -> &[(u32, u32)] {
        &self.boundary_cells
    }

    /// Iterate over the retained visible-state keys, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.state_history.iter().map(String::as_str)
    }

    /// Current generation counter.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Latest detector classification.
    #[must_use]
    pub const fn pattern_status(&self) -> PatternStatus {
        self.pattern_status
    }

    /// Period of the detected oscillation; meaningful only when
    /// [`Board::pattern_status`] is [`PatternStatus::Oscillating`].
    #[must_use]
    pub const fn oscillation_period(&self) -> u32 {
        self.oscillation_period
    }

    /// Whether `build_grid` has run.
    #[must_use]
    pub const fn grid_built(&self) -> bool {
        self.grid_built
    }

    /// Whether the driver has started the simulation.
    #[must_use]
    pub const fn game_started(&self) -> bool {
        self.game_started
    }
}
