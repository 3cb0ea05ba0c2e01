mod clock;
mod engine;
mod game;
mod snake;
mod term;

use std::fs::File;

use anyhow::{Context, Result};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

pub type Coords = (u16, u16);

const LOG_FILE: &str = "snake.log";
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

fn main() -> Result<()> {
    // Raw mode owns the terminal, so logs go to a file
    let log_file = File::create(LOG_FILE).context("creating log file")?;
    WriteLogger::init(LOG_LEVEL, Config::default(), log_file)
        .context("initializing logger")?;

    info!("Starting snake");

    let mut game = game::SnakeGame::new()?;
    let result = game.initialize().and_then(|_| game.run());
    report(&result);

    // Give the terminal back even if the game failed
    game.shutdown().and(result)
}

fn report(result: &Result<()>) {
    match result {
        Ok(()) => info!("Exiting"),
        Err(e) => error!("{:#}", e),
    }
}
