use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{debug, info};
use rand::rngs::ThreadRng;

use crate::Coords;
use crate::engine::{GameEvent, GameState, SimulationEngine, StepReport, GRID_SIZE};
use crate::snake::Direction::{*, self};
use crate::term::TermManager;

const IDLE_POLL: Duration = Duration::from_millis(250);
const CELL_WIDTH: u16 = 2;

const SNAKE_BODY_CHAR: char = '█';
const FOOD_CHAR: char = 'O';

const BOARD_WIDTH: u16 = GRID_SIZE as u16 * CELL_WIDTH + 2;
const BOARD_HEIGHT: u16 = GRID_SIZE as u16 + 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Start,
    Turn(Direction),
    Quit,
}

pub struct SnakeGame {
    term: TermManager,
    engine: SimulationEngine<ThreadRng>,
    board_origin: Coords,
    last_score: Option<u32>,
}

impl SnakeGame {
    pub fn new() -> Result<Self> {
        let term = TermManager::new().context("reading terminal size")?;
        let engine = SimulationEngine::new(rand::thread_rng(), Instant::now());
        Ok(SnakeGame { term, engine, board_origin: (0, 0), last_score: None })
    }

    pub fn initialize(&mut self) -> Result<()> {
        let (w, h) = self.term.get_terminal_size();
        if w < BOARD_WIDTH || h < BOARD_HEIGHT + 1 {
            bail!("terminal is {}x{}, need at least {}x{}", w, h, BOARD_WIDTH, BOARD_HEIGHT + 1);
        }

        // Board centered, with the score line right above it
        self.board_origin = ((w - BOARD_WIDTH) / 2, (h - BOARD_HEIGHT + 1) / 2);

        self.term.setup().context("setting up terminal")?;
        self.term.clear()?;
        self.term.draw_borders(self.board_origin, (BOARD_WIDTH, BOARD_HEIGHT))?;
        self.render()
    }

    /// Runs until the player quits.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let timeout = self.engine.clock()
                .time_until_due(Instant::now())
                .unwrap_or(IDLE_POLL);

            let keys = self.term.read_key_events(timeout).context("reading input")?;
            for key in &keys {
                match intent_for(key) {
                    Some(Intent::Quit) => return Ok(()),
                    Some(Intent::Start) => {
                        if self.engine.start(Instant::now()) {
                            self.handle_events();
                            self.render()?;
                        }
                    },
                    Some(Intent::Turn(dir)) => self.engine.set_direction(dir),
                    None => {}
                }
            }

            if let Some(report) = self.engine.run_due(Instant::now()) {
                self.log_step(&report);
                self.handle_events();
                self.render()?;
            }
        }
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.term.restore().context("restoring terminal")?;
        Ok(())
    }

    ///////////////////////////////////////////////////////////////////////////

    fn handle_events(&mut self) {
        for event in self.engine.drain_events() {
            match event {
                GameEvent::GameOver { score, collision } => {
                    info!("Crashed into {:?}, final score {}", collision, score);
                    self.last_score = Some(score);
                },
                GameEvent::HighScoreChanged(score) => info!("High score is now {}", score),
                other => debug!("{:?}", other),
            }
        }
    }

    fn log_step(&self, report: &StepReport) {
        debug!(
            "Step: {:?}, collision {:?}, delay {}ms, next tick in {:?}",
            report.outcome,
            report.collision,
            self.engine.state().speed_delay_ms(),
            self.engine.clock().interval()
        );
    }

    fn render(&mut self) -> Result<()> {
        let state = self.engine.state();
        let (x0, y0) = self.board_origin;

        let mut header = format!("Score {:03}", state.score());
        if self.last_score.is_some() {
            header.push_str(&format!("   High {:03}", state.high_score()));
        }
        let header = format!("{: <width$}", header, width = BOARD_WIDTH as usize);

        let cells = board_cells(state);
        self.term.print_str_at((x0, y0 - 1), &header)?;
        for (i, ch) in cells.iter().enumerate() {
            let (col, row) = (i as u16 % GRID_SIZE as u16, i as u16 / GRID_SIZE as u16);
            let pos = (x0 + 1 + col * CELL_WIDTH, y0 + 1 + row);
            let fill = if *ch == SNAKE_BODY_CHAR { SNAKE_BODY_CHAR } else { ' ' };
            self.term.print_at(pos, *ch)?;
            self.term.print_at((pos.0 + 1, pos.1), fill)?;
        }

        if state.is_started() {
            self.term.hide_message()?;
        } else {
            let score_line = self.last_score.map(|s| format!("Game over! Score: {:03}", s));
            let mut lines = vec![];
            if let Some(line) = &score_line {
                lines.push(line.as_str());
                lines.push("");
            }
            lines.extend_from_slice(&[
                "Arrow keys to move",
                "CTRL+C to quit",
                "",
                "Press Space to start",
            ]);
            self.term.show_message(&lines)?;
        }

        self.term.flush()?;
        Ok(())
    }
}

/// Maps a key press to what the player wants. Unknown keys map to nothing.
pub fn intent_for(key: &KeyEvent) -> Option<Intent> {
    match key {
        KeyEvent { code: KeyCode::Char('c'), modifiers: KeyModifiers::CONTROL } => Some(Intent::Quit),
        KeyEvent { code, modifiers: _ } => match code {
            KeyCode::Char(' ') => Some(Intent::Start),
            KeyCode::Up => Some(Intent::Turn(Up)),
            KeyCode::Left => Some(Intent::Turn(Left)),
            KeyCode::Down => Some(Intent::Turn(Down)),
            KeyCode::Right => Some(Intent::Turn(Right)),
            _ => None,
        }
    }
}

/// Row-major glyphs for the whole board. Food only shows while a game runs.
fn board_cells(state: &GameState) -> Vec<char> {
    let size = GRID_SIZE as usize;
    let mut cells = vec![' '; size * size];
    let index = |x: i16, y: i16| (y as usize - 1) * size + (x as usize - 1);

    if state.is_started() {
        let food = state.food();
        cells[index(food.x, food.y)] = FOOD_CHAR;
    }

    for segment in state.snake().segments().filter(|s| s.is_within(GRID_SIZE)) {
        cells[index(segment.x, segment.y)] = SNAKE_BODY_CHAR;
    }

    let head = state.snake().head();
    if head.is_within(GRID_SIZE) {
        cells[index(head.x, head.y)] = head_char(state.direction());
    }

    cells
}

fn head_char(direction: Direction) -> char {
    match direction {
        Up => '^',
        Down => 'v',
        Left => '<',
        Right => '>',
    }
}
