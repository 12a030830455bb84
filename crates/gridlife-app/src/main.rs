//! Headless driver shell for the gridlife engine.
//!
//! The engine owns nothing but in-memory state transition; this binary owns
//! the rest of the contract: validating user-supplied run parameters,
//! seeding a starting pattern, scheduling `single_step` calls at a fixed
//! interval, and presenting the engine's read-only views as structured log
//! lines and optional text frames.
//!
//! Run parameters come from the environment:
//!
//! * `GRIDLIFE_ROWS` / `GRIDLIFE_COLS` — visible grid size, 1-200 (default 30)
//! * `GRIDLIFE_INTERVAL_MS` — delay between generations, 1-500 (default 200)
//! * `GRIDLIFE_STEPS` — generations to run (default 100)
//! * `GRIDLIFE_PATTERN` — `blinker`, `glider`, `block`, or `soup`
//! * `GRIDLIFE_SEED` — RNG seed for `soup`
//! * `GRIDLIFE_RENDER` — dump a text frame after every generation
//! * `GRIDLIFE_SHOW_MASK` — render tracked-but-dead cells distinctly
//! * `GRIDLIFE_STOP_ON_PATTERN` — stop once the detector reports a pattern

use anyhow::{anyhow, bail, Result};
use gridlife_core::{Board, GridConfig, PatternStatus, PADDING};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Accepted visible grid dimensions, matching the reference driver.
const DIMENSION_RANGE: RangeInclusive<u32> = 1..=200;
/// Accepted step interval in whole milliseconds.
const INTERVAL_RANGE_MS: RangeInclusive<u64> = 1..=500;
/// Fill probability used for random-soup seeding.
const SOUP_FILL: f64 = 0.3;

const BLINKER: [(u32, u32); 3] = [(0, 0), (0, 1), (0, 2)];
const BLOCK: [(u32, u32); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];
const GLIDER: [(u32, u32); 5] = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];

fn main() -> Result<()> {
    init_tracing();
    let options = RunOptions::from_env()?;
    info!(
        rows = options.rows,
        cols = options.cols,
        interval_ms = options.interval_ms,
        pattern = options.pattern.name(),
        "building grid"
    );

    let mut board = Board::new(GridConfig::new(options.cols, options.rows))?;
    board.build_grid();
    seed_pattern(&mut board, options.pattern, options.seed)?;
    board.start()?;

    run(&mut board, &options)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Debug, Clone)]
struct RunOptions {
    rows: u32,
    cols: u32,
    interval_ms: u64,
    steps: u64,
    pattern: SeedPattern,
    seed: u64,
    render: bool,
    show_mask: bool,
    stop_on_pattern: bool,
}

impl RunOptions {
    fn from_env() -> Result<Self> {
        let rows = env_parse("GRIDLIFE_ROWS", 30)?;
        validate_dimension("GRIDLIFE_ROWS", rows)?;
        let cols = env_parse("GRIDLIFE_COLS", 30)?;
        validate_dimension("GRIDLIFE_COLS", cols)?;
        let interval_ms = env_parse("GRIDLIFE_INTERVAL_MS", 200)?;
        validate_interval("GRIDLIFE_INTERVAL_MS", interval_ms)?;
        let pattern = match env::var("GRIDLIFE_PATTERN") {
            Ok(name) => SeedPattern::parse(&name)?,
            Err(_) => SeedPattern::Blinker,
        };
        Ok(Self {
            rows,
            cols,
            interval_ms,
            steps: env_parse("GRIDLIFE_STEPS", 100)?,
            pattern,
            seed: env_parse("GRIDLIFE_SEED", 0xFACADE)?,
            render: env_flag("GRIDLIFE_RENDER"),
            show_mask: env_flag("GRIDLIFE_SHOW_MASK"),
            stop_on_pattern: env_flag("GRIDLIFE_STOP_ON_PATTERN"),
        })
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("{key} must be a whole number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str) -> bool {
    matches!(env::var(key).as_deref(), Ok("1") | Ok("true"))
}

fn validate_dimension(name: &str, value: u32) -> Result<()> {
    if !DIMENSION_RANGE.contains(&value) {
        bail!(
            "{name} valid range is {}-{}, got {value}",
            DIMENSION_RANGE.start(),
            DIMENSION_RANGE.end()
        );
    }
    Ok(())
}

fn validate_interval(name: &str, value: u64) -> Result<()> {
    if !INTERVAL_RANGE_MS.contains(&value) {
        bail!(
            "{name} valid range is {}-{} whole ms, got {value}",
            INTERVAL_RANGE_MS.start(),
            INTERVAL_RANGE_MS.end()
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedPattern {
    Blinker,
    Glider,
    Block,
    Soup,
}

impl SeedPattern {
    fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "blinker" => Ok(Self::Blinker),
            "glider" => Ok(Self::Glider),
            "block" => Ok(Self::Block),
            "soup" => Ok(Self::Soup),
            other => bail!("unknown seed pattern {other:?} (expected blinker, glider, block, or soup)"),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Blinker => "blinker",
            Self::Glider => "glider",
            Self::Block => "block",
            Self::Soup => "soup",
        }
    }
}

fn seed_pattern(board: &mut Board, pattern: SeedPattern, seed: u64) -> Result<()> {
    match pattern {
        SeedPattern::Blinker => place_centered(board, &BLINKER, pattern.name()),
        SeedPattern::Block => place_centered(board, &BLOCK, pattern.name()),
        SeedPattern::Glider => place_centered(board, &GLIDER, pattern.name()),
        SeedPattern::Soup => {
            let cols = board.config().cols;
            let rows = board.config().rows;
            let mut rng = SmallRng::seed_from_u64(seed);
            for y in 0..rows {
                for x in 0..cols {
                    if rng.gen_bool(SOUP_FILL) {
                        toggle_visible(board, x, y)?;
                    }
                }
            }
            Ok(())
        }
    }
}

/// Toggle the given cells, shifted to the center of the visible region.
fn place_centered(board: &mut Board, cells: &[(u32, u32)], name: &str) -> Result<()> {
    let cols = board.config().cols;
    let rows = board.config().rows;
    let extent_x = cells.iter().map(|&(x, _)| x + 1).max().unwrap_or(0);
    let extent_y = cells.iter().map(|&(_, y)| y + 1).max().unwrap_or(0);
    if cols < extent_x || rows < extent_y {
        bail!("grid {cols}x{rows} is too small for the {name} pattern");
    }
    let off_x = (cols - extent_x) / 2;
    let off_y = (rows - extent_y) / 2;
    for &(x, y) in cells {
        toggle_visible(board, off_x + x, off_y + y)?;
    }
    Ok(())
}

/// The engine addresses cells in padded coordinates; the driver thinks in
/// visible ones.
fn toggle_visible(board: &mut Board, x: u32, y: u32) -> Result<()> {
    board.toggle_cell(x + PADDING, y + PADDING)?;
    Ok(())
}

fn run(board: &mut Board, options: &RunOptions) -> Result<()> {
    let interval = Duration::from_millis(options.interval_ms);
    for _ in 0..options.steps {
        let summary = board.single_step()?;
        info!(
            generation = summary.generation.0,
            live_cells = summary.live_cells,
            status = %summary.pattern_status,
            period = summary.oscillation_period,
            "generation committed"
        );
        if options.render {
            print!("{}", render_frame(board, options.show_mask));
            println!();
        }
        if options.stop_on_pattern && summary.pattern_status != PatternStatus::None {
            info!(
                status = %summary.pattern_status,
                period = summary.oscillation_period,
                "pattern detected, stopping"
            );
            break;
        }
        thread::sleep(interval);
    }
    Ok(())
}

/// Plain-text frame of the visible region: `#` alive, `,` tracked but dead
/// (only with `show_mask`), `.` otherwise.
fn render_frame(board: &Board, show_mask: bool) -> String {
    let cols = board.config().cols;
    let mut frame = String::new();
    for (i, view) in board.visible_cells().iter().enumerate() {
        let glyph = if view.alive {
            '#'
        } else if show_mask && view.enabled {
            ','
        } else {
            '.'
        };
        frame.push(glyph);
        if (i as u32 + 1) % cols == 0 {
            frame.push('\n');
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_validation_matches_reference_ranges() {
        assert!(validate_dimension("GRIDLIFE_ROWS", 1).is_ok());
        assert!(validate_dimension("GRIDLIFE_ROWS", 200).is_ok());
        assert!(validate_dimension("GRIDLIFE_ROWS", 0).is_err());
        assert!(validate_dimension("GRIDLIFE_ROWS", 201).is_err());
        assert!(validate_interval("GRIDLIFE_INTERVAL_MS", 1).is_ok());
        assert!(validate_interval("GRIDLIFE_INTERVAL_MS", 500).is_ok());
        assert!(validate_interval("GRIDLIFE_INTERVAL_MS", 0).is_err());
        assert!(validate_interval("GRIDLIFE_INTERVAL_MS", 501).is_err());
    }

    #[test]
    fn pattern_names_round_trip() {
        for name in ["blinker", "glider", "block", "soup"] {
            assert_eq!(SeedPattern::parse(name).expect("parse").name(), name);
        }
        assert!(SeedPattern::parse(" Blinker ").is_ok());
        assert!(SeedPattern::parse("toad").is_err());
    }

    #[test]
    fn centered_blinker_lands_in_the_middle() {
        let mut board = Board::new(GridConfig::new(5, 5)).expect("config");
        board.build_grid();
        place_centered(&mut board, &BLINKER, "blinker").expect("place");
        let alive: Vec<(u32, u32)> = board
            .visible_cells()
            .into_iter()
            .filter(|view| view.alive)
            .map(|view| (view.x, view.y))
            .collect();
        assert_eq!(alive, vec![(2, 1), (2, 2), (2, 3)]);
    }

    #[test]
    fn patterns_refuse_grids_they_cannot_fit() {
        let mut board = Board::new(GridConfig::new(2, 2)).expect("config");
        board.build_grid();
        assert!(place_centered(&mut board, &GLIDER, "glider").is_err());
        assert!(place_centered(&mut board, &BLOCK, "block").is_ok());
    }

    #[test]
    fn frames_render_alive_and_masked_cells() {
        let mut board = Board::new(GridConfig::new(3, 3)).expect("config");
        board.build_grid();
        board
            .toggle_cell(1 + PADDING, 1 + PADDING)
            .expect("toggle");
        let plain = render_frame(&board, false);
        assert_eq!(plain, "...\n.#.\n...\n");
        let masked = render_frame(&board, true);
        assert_eq!(masked, ",,,\n,#,\n,,,\n");
    }
}
