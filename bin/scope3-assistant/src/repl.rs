//! Walkthrough playback and the interactive prompt.

use anyhow::Result;
use scope3_chat::{ChatService, TourController};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

pub type Input = Lines<BufReader<Stdin>>;

pub fn stdin_lines() -> Input {
    BufReader::new(tokio::io::stdin()).lines()
}

/// A parsed line of interactive input.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Clear,
    Tour,
    Show,
    Quit,
    Say(&'a str),
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line {
            "/clear" => Command::Clear,
            "/tour" => Command::Tour,
            "/show" => Command::Show,
            "/quit" | "/exit" => Command::Quit,
            other if other.starts_with('/') => Command::Unknown(other),
            other => Command::Say(other),
        }
    }
}

/// Load and play the walkthrough. Returns `false` when input ended.
pub async fn play_tour(tour: &TourController, input: &mut Input) -> Result<bool> {
    tour.start().await;
    playback(tour, input).await
}

/// Step through a loaded walkthrough.
async fn playback(tour: &TourController, input: &mut Input) -> Result<bool> {
    info!(steps = tour.steps().len(), "walkthrough loaded");
    loop {
        if let Err(err) = tour.present_current_step().await {
            warn!(error = %err, "could not present walkthrough step");
        }
        println!("  [enter] next · 'skip' to finish");
        let Some(line) = input.next_line().await? else {
            return Ok(false);
        };
        if line.trim().eq_ignore_ascii_case("skip") {
            tour.skip();
            return Ok(true);
        }
        if tour.next_step().is_none() {
            return Ok(true);
        }
    }
}

/// Run the prompt until `/quit` or end of input.
pub async fn run(chat: &ChatService, tour: &TourController, input: &mut Input) -> Result<()> {
    println!("Commands: /clear /tour /show /quit");
    while let Some(line) = input.next_line().await? {
        match Command::parse(&line) {
            Command::Clear => chat.clear_history(),
            Command::Tour => {
                tour.reinitiate_walkthrough().await;
                if !playback(tour, input).await? {
                    break;
                }
            }
            Command::Show => {
                chat.toggle_chat();
            }
            Command::Quit => break,
            Command::Say(text) => {
                let chat = chat.clone();
                let text = text.to_owned();
                // Replies show up through the state watcher.
                tokio::spawn(async move {
                    if let Err(err) = chat.send_message(text).await {
                        warn!(error = %err, "message rejected");
                    }
                });
            }
            Command::Unknown(cmd) => println!("unknown command {cmd}"),
        }
    }
    Ok(())
}
