use std::{mem, time::{Duration, Instant}};

use log::{debug, info};
use rand::Rng;

use crate::clock::GameClock;
use crate::snake::{Direction, Position, Snake};

pub const GRID_SIZE: i16 = 20;
pub const INITIAL_SPEED_DELAY_MS: u64 = 200;
pub const MIN_SPEED_DELAY_MS: u64 = 25;

const BONUS_DISTANCE: u16 = 2;
const BONUS_POINTS: u32 = 5;
const START_POSITION: Position = Position::new(GRID_SIZE / 2, GRID_SIZE / 2);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Moved,
    FoodEaten { bonus: u32 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Collision {
    Wall,
    Body,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub outcome: TickOutcome,
    pub collision: Option<Collision>,
}

/// Notifications for the presentation layer, drained after every step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    Started,
    Stopped,
    ScoreChanged(u32),
    HighScoreChanged(u32),
    GameOver { score: u32, collision: Collision },
}

/// Everything a renderer needs to draw one frame.
#[derive(Clone, Debug)]
pub struct GameState {
    snake: Snake,
    food: Position,
    direction: Direction,
    speed_delay_ms: u64,
    started: bool,
    score: u32,
    high_score: u32,
}

impl GameState {
    fn new(food: Position, high_score: u32) -> Self {
        GameState {
            snake: Snake::new(START_POSITION),
            food,
            direction: Direction::Right,
            speed_delay_ms: INITIAL_SPEED_DELAY_MS,
            started: false,
            score: 0,
            high_score,
        }
    }

    pub fn snake(&self) -> &Snake {
        &self.snake
    }

    pub fn food(&self) -> Position {
        self.food
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn speed_delay_ms(&self) -> u64 {
        self.speed_delay_ms
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The displayed score, including a bonus awarded on the latest tick.
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    fn length_score(&self) -> u32 {
        self.snake.len() as u32 - 1
    }
}

pub struct SimulationEngine<R> {
    state: GameState,
    clock: GameClock,
    rng: R,
    events: Vec<GameEvent>,
}

impl<R: Rng> SimulationEngine<R> {
    pub fn new(mut rng: R, now: Instant) -> Self {
        let food = random_position(&mut rng);
        SimulationEngine {
            state: GameState::new(food, 0),
            clock: GameClock::new(now),
            rng,
            events: vec![],
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        mem::take(&mut self.events)
    }

    /// Overwrites the heading. Reversing onto the neck is allowed and ends the
    /// game on the next step once the snake is three segments or longer.
    pub fn set_direction(&mut self, direction: Direction) {
        self.state.direction = direction;
    }

    pub fn start(&mut self, now: Instant) -> bool {
        if self.state.started {
            return false;
        }

        self.clock.advance_to(now);
        self.state.started = true;
        self.clock.arm(Duration::from_millis(self.state.speed_delay_ms));
        self.events.push(GameEvent::Started);
        info!("Game started, tick every {}ms", self.state.speed_delay_ms);
        true
    }

    /// Runs one step if the clock is due at `now`.
    pub fn run_due(&mut self, now: Instant) -> Option<StepReport> {
        self.clock.advance_to(now);
        if self.clock.fire() {
            Some(self.step())
        } else {
            None
        }
    }

    pub fn step(&mut self) -> StepReport {
        let outcome = self.tick();
        let collision = self.check_collision();
        StepReport { outcome, collision }
    }

    pub fn tick(&mut self) -> TickOutcome {
        let new_head = self.state.snake.head().step(self.state.direction);

        if new_head != self.state.food {
            self.state.snake.advance(new_head);
            let score = self.state.length_score();
            self.publish_score(score);
            return TickOutcome::Moved;
        }

        self.state.speed_delay_ms = next_speed_delay(self.state.speed_delay_ms);
        self.state.food = random_position(&mut self.rng);
        self.state.snake.grow(new_head);

        let bonus = if self.state.snake.body_within(BONUS_DISTANCE) { BONUS_POINTS } else { 0 };

        self.clock.arm(Duration::from_millis(self.state.speed_delay_ms));
        let score = self.state.length_score() + bonus;
        self.publish_score(score);

        debug!(
            "Ate food at ({}, {}), length {}, bonus {}, tick every {}ms",
            new_head.x, new_head.y, self.state.snake.len(), bonus, self.state.speed_delay_ms
        );
        TickOutcome::FoodEaten { bonus }
    }

    pub fn check_collision(&mut self) -> Option<Collision> {
        let collision = if !self.state.snake.head().is_within(GRID_SIZE) {
            Collision::Wall
        } else if self.state.snake.hits_itself() {
            Collision::Body
        } else {
            return None;
        };

        let score = self.state.length_score();
        info!("Game over ({:?}) with score {}", collision, score);
        self.events.push(GameEvent::GameOver { score, collision });
        self.reset();
        Some(collision)
    }

    pub fn reset(&mut self) {
        let score = self.state.length_score();
        if score > self.state.high_score {
            self.state.high_score = score;
            self.events.push(GameEvent::HighScoreChanged(score));
            info!("New high score: {}", score);
        }

        self.clock.disarm();
        if self.state.started {
            self.events.push(GameEvent::Stopped);
        }

        let food = random_position(&mut self.rng);
        let displayed = self.state.score;
        self.state = GameState::new(food, self.state.high_score);
        self.state.score = displayed;
        self.publish_score(0);
    }

    ///////////////////////////////////////////////////////////////////////////

    fn publish_score(&mut self, score: u32) {
        if score != self.state.score {
            self.state.score = score;
            self.events.push(GameEvent::ScoreChanged(score));
        }
    }
}

pub fn next_speed_delay(delay_ms: u64) -> u64 {
    if delay_ms <= MIN_SPEED_DELAY_MS {
        return delay_ms;
    }

    let step = match delay_ms {
        d if d > 150 => 5,
        d if d > 100 => 3,
        d if d > 50 => 2,
        _ => 1,
    };
    delay_ms - step
}

/// Uniform over the whole board; the snake's cells are not excluded.
fn random_position<R: Rng>(rng: &mut R) -> Position {
    Position::new(rng.gen_range(1..=GRID_SIZE), rng.gen_range(1..=GRID_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snake::Direction::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn engine_at(start: Instant) -> SimulationEngine<StdRng> {
        SimulationEngine::new(StdRng::seed_from_u64(7), start)
    }

    fn engine() -> SimulationEngine<StdRng> {
        engine_at(Instant::now())
    }

    fn engine_with(segments: &[(i16, i16)], direction: Direction, food: (i16, i16)) -> SimulationEngine<StdRng> {
        engine_with_at(Instant::now(), segments, direction, food)
    }

    fn engine_with_at(
        start: Instant,
        segments: &[(i16, i16)],
        direction: Direction,
        food: (i16, i16),
    ) -> SimulationEngine<StdRng> {
        let mut engine = engine_at(start);
        engine.state.snake = Snake::from_segments(segments);
        engine.state.direction = direction;
        engine.state.food = Position::new(food.0, food.1);
        engine.state.score = engine.state.length_score();
        engine
    }

    fn body(engine: &SimulationEngine<StdRng>) -> Vec<(i16, i16)> {
        engine.state().snake().segments().map(|p| (p.x, p.y)).collect()
    }

    fn assert_reset_state(engine: &SimulationEngine<StdRng>) {
        let state = engine.state();
        assert_eq!(body(engine), vec![(10, 10)]);
        assert_eq!(state.direction(), Right);
        assert_eq!(state.speed_delay_ms(), INITIAL_SPEED_DELAY_MS);
        assert_eq!(state.score(), 0);
        assert!(!state.is_started());
        assert!(!engine.clock().is_armed());
        assert!(state.food().is_within(GRID_SIZE));
    }

    #[test]
    fn new_game_is_idle_at_the_center() {
        let engine = engine();
        assert_reset_state(&engine);
        assert_eq!(engine.state().high_score(), 0);
    }

    #[test]
    fn eating_from_a_single_segment() {
        let mut engine = engine_with(&[(10, 10)], Right, (11, 10));

        assert_eq!(engine.tick(), TickOutcome::FoodEaten { bonus: 0 });
        assert_eq!(body(&engine), vec![(11, 10), (10, 10)]);
        assert_eq!(engine.state().speed_delay_ms(), 195);
        assert_eq!(engine.state().score(), 1);
        assert!(engine.state().food().is_within(GRID_SIZE));
        assert_eq!(engine.drain_events(), vec![GameEvent::ScoreChanged(1)]);
    }

    #[test]
    fn eating_rearms_the_clock_at_the_new_delay() {
        let start = Instant::now();
        let mut engine = engine_with_at(start, &[(10, 10)], Right, (11, 10));
        engine.start(start);

        let report = engine.run_due(start + Duration::from_millis(200));
        assert_eq!(report.map(|r| r.outcome), Some(TickOutcome::FoodEaten { bonus: 0 }));
        assert_eq!(engine.clock().interval(), Some(Duration::from_millis(195)));
        assert_eq!(
            engine.clock().time_until_due(start + Duration::from_millis(200)),
            Some(Duration::from_millis(195))
        );
    }

    #[test]
    fn single_segment_moves_up() {
        let mut engine = engine_with(&[(5, 5)], Up, (1, 1));

        assert_eq!(engine.tick(), TickOutcome::Moved);
        assert_eq!(body(&engine), vec![(5, 4)]);
        assert_eq!(engine.check_collision(), None);
    }

    #[test]
    fn moving_keeps_length_and_eating_adds_one() {
        let mut engine = engine_with(&[(5, 5), (4, 5), (3, 5)], Right, (7, 5));

        engine.step();
        assert_eq!(body(&engine), vec![(6, 5), (5, 5), (4, 5)]);

        engine.step();
        assert_eq!(engine.state().snake().len(), 4);
        assert_eq!(engine.state().snake().head(), Position::new(7, 5));
    }

    #[test]
    fn bonus_lasts_a_single_tick() {
        let mut engine = engine_with(&[(5, 5), (6, 5), (6, 4)], Up, (5, 4));

        assert_eq!(engine.tick(), TickOutcome::FoodEaten { bonus: BONUS_POINTS });
        assert_eq!(engine.state().score(), 3 + BONUS_POINTS);

        engine.state.food = Position::new(20, 20);
        assert_eq!(engine.tick(), TickOutcome::Moved);
        assert_eq!(engine.state().score(), 3);
        assert_eq!(
            engine.drain_events(),
            vec![GameEvent::ScoreChanged(8), GameEvent::ScoreChanged(3)]
        );
    }

    #[test]
    fn head_off_the_board_resets() {
        let mut engine = engine_with(&[(0, 5), (1, 5), (2, 5)], Left, (1, 1));
        engine.start(Instant::now());

        assert_eq!(engine.check_collision(), Some(Collision::Wall));
        assert_reset_state(&engine);
    }

    #[test]
    fn every_out_of_bounds_head_resets() {
        let mut heads = vec![];
        for i in 1..=GRID_SIZE {
            heads.extend_from_slice(&[(0, i), (GRID_SIZE + 1, i), (i, 0), (i, GRID_SIZE + 1)]);
        }

        for head in heads {
            for &direction in &[Up, Down, Left, Right] {
                let mut engine = engine_with(&[head], direction, (1, 1));
                assert_eq!(engine.check_collision(), Some(Collision::Wall), "head {:?}", head);
                assert_reset_state(&engine);
            }
        }
    }

    #[test]
    fn walking_into_the_wall_ends_the_game() {
        let mut engine = engine_with(&[(20, 5), (19, 5)], Right, (1, 1));
        engine.start(Instant::now());

        let report = engine.step();
        assert_eq!(report.collision, Some(Collision::Wall));
        assert_reset_state(&engine);
        assert_eq!(engine.state().high_score(), 1);
    }

    #[test]
    fn biting_the_body_resets_and_records_high_score() {
        let mut engine = engine_with(&[(5, 5), (6, 5), (6, 6), (5, 6), (4, 6)], Down, (1, 1));
        engine.start(Instant::now());
        engine.drain_events();

        let report = engine.step();
        assert_eq!(report, StepReport { outcome: TickOutcome::Moved, collision: Some(Collision::Body) });
        assert_reset_state(&engine);
        assert_eq!(engine.state().high_score(), 4);
        assert_eq!(
            engine.drain_events(),
            vec![
                GameEvent::GameOver { score: 4, collision: Collision::Body },
                GameEvent::HighScoreChanged(4),
                GameEvent::Stopped,
                GameEvent::ScoreChanged(0),
            ]
        );
    }

    #[test]
    fn reversing_onto_the_neck_is_instant_death() {
        let mut engine = engine_with(&[(5, 5), (4, 5), (3, 5)], Right, (1, 1));
        engine.set_direction(Left);

        assert_eq!(engine.step().collision, Some(Collision::Body));
        assert_reset_state(&engine);
    }

    #[test]
    fn two_segment_snake_can_turn_around() {
        // The neck is the tail, so it moves out of the way
        let mut engine = engine_with(&[(5, 5), (4, 5)], Right, (1, 1));
        engine.set_direction(Left);

        assert_eq!(engine.step().collision, None);
        assert_eq!(body(&engine), vec![(4, 5), (5, 5)]);
    }

    #[test]
    fn high_score_only_grows() {
        let mut engine = engine_with(&[(5, 5), (6, 5), (6, 6), (5, 6), (4, 6)], Down, (1, 1));
        engine.state.high_score = 7;
        engine.step();
        assert_eq!(engine.state().high_score(), 7);

        engine.state.snake = Snake::from_segments(&[(0, 1); 10]);
        engine.check_collision();
        assert_eq!(engine.state().high_score(), 9);

        engine.reset();
        assert_eq!(engine.state().high_score(), 9);
    }

    #[test]
    fn bonus_is_not_part_of_the_high_score() {
        let mut engine = engine_with(&[(5, 5), (6, 5), (6, 4)], Up, (5, 4));
        engine.tick();
        assert_eq!(engine.state().score(), 8);

        engine.reset();
        assert_eq!(engine.state().high_score(), 3);
    }

    #[test]
    fn speed_curve_is_tiered_and_floored() {
        assert_eq!(next_speed_delay(200), 195);
        assert_eq!(next_speed_delay(151), 146);
        assert_eq!(next_speed_delay(150), 147);
        assert_eq!(next_speed_delay(101), 98);
        assert_eq!(next_speed_delay(100), 98);
        assert_eq!(next_speed_delay(51), 49);
        assert_eq!(next_speed_delay(50), 49);
        assert_eq!(next_speed_delay(26), 25);
        assert_eq!(next_speed_delay(25), 25);

        let mut delay = INITIAL_SPEED_DELAY_MS;
        for _ in 0..500 {
            let next = next_speed_delay(delay);
            assert!(next <= delay);
            assert!(next >= MIN_SPEED_DELAY_MS);
            delay = next;
        }
        assert_eq!(delay, MIN_SPEED_DELAY_MS);
    }

    #[test]
    fn start_only_works_while_idle() {
        let start = Instant::now();
        let mut engine = engine_at(start);

        assert!(engine.start(start));
        assert!(!engine.start(start));
        assert!(engine.state().is_started());
        assert_eq!(engine.clock().interval(), Some(Duration::from_millis(INITIAL_SPEED_DELAY_MS)));
        assert_eq!(engine.drain_events(), vec![GameEvent::Started]);
    }

    #[test]
    fn nothing_runs_before_start() {
        let start = Instant::now();
        let mut engine = engine_at(start);

        assert_eq!(engine.run_due(start + Duration::from_secs(5)), None);
        assert_eq!(body(&engine), vec![(10, 10)]);
    }

    #[test]
    fn direction_can_be_set_while_idle() {
        let start = Instant::now();
        let mut engine = engine_at(start);
        engine.state.food = Position::new(1, 1);
        engine.set_direction(Down);
        engine.start(start);

        assert!(engine.run_due(start + Duration::from_millis(100)).is_none());
        let report = engine.run_due(start + Duration::from_millis(200));
        assert_eq!(report.map(|r| r.outcome), Some(TickOutcome::Moved));
        assert_eq!(body(&engine), vec![(10, 11)]);
    }

    #[test]
    fn food_stays_on_the_board() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            assert!(random_position(&mut rng).is_within(GRID_SIZE));
        }
    }
}
