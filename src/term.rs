use crate::Coords;
use std::{io::{Stdout, Write, stdout}, time::Duration};

use crossterm::{cursor, execute, queue, style, terminal, Result};
use crossterm::terminal::{ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::event::{Event, KeyEvent, read, poll};

pub struct TermManager {
    width: u16,
    height: u16,
    stdout: Stdout,
    screen: Vec<char>,
    current_msg: Option<Message>,
}

struct Message {
    top_left: Coords,
    width: u16,
    height: u16,
}

impl TermManager {
    pub fn new() -> Result<Self> {
        let (width, height) = terminal::size()?;
        let screen = vec![' '; width as usize * height as usize];
        Ok(TermManager { width, height, stdout: stdout(), screen, current_msg: None })
    }

    pub fn setup(&mut self) -> Result<()> {
        execute!(self.stdout, EnterAlternateScreen, cursor::Hide, cursor::DisableBlinking)?;
        terminal::enable_raw_mode()
    }

    pub fn restore(&mut self) -> Result<()> {
        terminal::disable_raw_mode()?;
        execute!(self.stdout, cursor::Show, cursor::EnableBlinking, LeaveAlternateScreen)
    }

    /// Waits up to `timeout` for the first key, then drains whatever else is queued.
    pub fn read_key_events(&self, timeout: Duration) -> Result<Vec<KeyEvent>> {
        let mut events = vec![];
        let mut wait = timeout;

        while poll(wait)? {
            if let Event::Key(ev) = read()? {
                events.push(ev);
            }
            wait = Duration::from_millis(0);
        }

        Ok(events)
    }

    pub fn get_terminal_size(&self) -> Coords {
        (self.width, self.height)
    }

    pub fn draw_borders(&mut self, top_left: Coords, size: Coords) -> Result<()> {
        let (width, height) = size;
        let (x0, y0) = top_left;
        let end_x = x0 + width - 1;
        let end_y = y0 + height - 1;

        for x in x0..=end_x {
            let ch = if x == x0 || x == end_x {'+'} else {'-'};
            self.print_at((x, y0), ch)?;
            self.print_at((x, end_y), ch)?;
        }

        for y in y0 + 1..end_y {
            self.print_at((x0, y), '|')?;
            self.print_at((end_x, y), '|')?;
        }

        Ok(())
    }

    pub fn show_message(&mut self, lines: &[&str]) -> Result<()> {
        if self.has_message() {
            self.hide_message()?;
        }

        let msg_height = (lines.len() + 2) as u16;
        let msg_width = (lines.iter().map(|x| x.chars().count()).max().unwrap_or(0) + 2) as u16;
        let center = (self.width / 2, self.height / 2);
        let top_left = (center.0 - msg_width / 2, center.1 - msg_height / 2);

        // Blank top and bottom rows
        for y in [top_left.1, top_left.1 + msg_height - 1].iter() {
            for x_diff in 0..msg_width {
                self.print_at_no_save((top_left.0 + x_diff, *y), ' ')?;
            }
        }

        for (i, line) in lines.iter().enumerate() {
            let padded_line = format!("{line: ^width$}", line = line, width = msg_width as usize);
            let y = top_left.1 + i as u16 + 1;
            for (x_diff, ch) in padded_line.chars().enumerate() {
                self.print_at_no_save((top_left.0 + x_diff as u16, y), ch)?;
            }
        }

        self.current_msg = Some(Message::new(msg_width, msg_height, top_left));
        Ok(())
    }

    pub fn hide_message(&mut self) -> Result<()> {
        let msg = match self.current_msg.take() {
            Some(msg) => msg,
            None => return Ok(()),
        };
        let top_left = msg.top_left();

        // Restore what the box covered from the screen buffer
        for y_diff in 0..msg.height() {
            for x_diff in 0..msg.width() {
                let (x, y) = (top_left.0 + x_diff, top_left.1 + y_diff);
                let ch = self.screen[self.width as usize * y as usize + x as usize];
                self.print_at_no_save((x, y), ch)?;
            }
        }

        Ok(())
    }

    pub fn print_at(&mut self, pos: Coords, ch: char) -> Result<()> {
        queue!(self.stdout, cursor::MoveTo(pos.0, pos.1), style::Print(ch))?;
        self.screen[self.width as usize * pos.1 as usize + pos.0 as usize] = ch;
        Ok(())
    }

    pub fn print_str_at(&mut self, pos: Coords, text: &str) -> Result<()> {
        for (i, ch) in text.chars().enumerate() {
            self.print_at((pos.0 + i as u16, pos.1), ch)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        execute!(self.stdout, terminal::Clear(ClearType::All))?;
        self.screen = vec![' '; self.width as usize * self.height as usize];
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.stdout.flush()?;
        Ok(())
    }

    pub fn has_message(&self) -> bool {
        self.current_msg.is_some()
    }

    ///////////////////////////////////////////////////////////////////////////

    fn print_at_no_save(&mut self, pos: Coords, ch: char) -> Result<()> {
        // For message boxes: the screen buffer keeps what lies underneath
        queue!(self.stdout, cursor::MoveTo(pos.0, pos.1), style::Print(ch))?;
        Ok(())
    }
}

impl Message {
    pub fn new(width: u16, height: u16, top_left: Coords) -> Self {
        Message { width, height, top_left }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn top_left(&self) -> Coords {
        self.top_left
    }
}
