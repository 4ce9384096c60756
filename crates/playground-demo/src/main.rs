//! Terminal front end for the playground streams.

mod terminal;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use playground_stream::observability::init_observability;
use playground_stream::prelude::*;
use tokio::io::{AsyncBufReadExt as _, BufReader};

use crate::terminal::{TerminalSink, Viewport, parse_cells};

const GLIDER: &str = "1,0;2,1;0,2;1,2;2,2";

#[derive(Parser, Debug)]
#[command(name = "playground-demo")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Site origin, overrides `PLAYGROUND_BASE_URL`.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream an LLM completion to stdout.
    Complete {
        prompt: String,
        /// Delay between rendered deltas in milliseconds.
        #[arg(long)]
        delay_ms: Option<i64>,
    },

    /// Play Game of Life generations computed by the server.
    Life {
        /// Initial alive cells as `x,y;x,y;...` (defaults to a glider).
        #[arg(long, default_value = GLIDER)]
        cells: String,
        /// Delay between generations in milliseconds (10 to 3000).
        #[arg(long)]
        delay_ms: Option<i64>,
        /// Fetch all generations in one response instead of streaming them.
        #[arg(long)]
        whole: bool,
        #[arg(long, default_value_t = 40)]
        width: i64,
        #[arg(long, default_value_t = 20)]
        height: i64,
    },

    /// One-shot, non-streamed generation.
    Generate { prompt: String },

    /// Interactive chat. `/reset` clears the history, `/quit` exits.
    Chat,
}

fn config(cli: &Cli) -> Result<PlaygroundConfig, PlayerError> {
    let config = PlaygroundConfig::from_env()?;
    Ok(match &cli.base_url {
        Some(base_url) => config.base_url(base_url.clone()),
        None => config,
    })
}

/// Plays one request; Ctrl-C stops the session and keeps what was drawn.
async fn play(mut player: Player, request: PlaybackRequest) -> Result<(), PlayerError> {
    player.start(request)?;
    let Some(stop) = player.stop_handle() else {
        return Ok(());
    };
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });
    match player.wait().await {
        SessionState::Stopped => {
            eprintln!("stopped");
            Ok(())
        }
        SessionState::Errored(failure) => Err(failure.into()),
        _ => Ok(()),
    }
}

async fn chat(mut client: ChatClient) -> Result<(), PlayerError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "/quit" => break,
            "/reset" => {
                client.reset();
                println!("(history cleared)");
            }
            "" => {}
            prompt => match client.send(prompt).await {
                Ok(reply) => println!("{reply}"),
                Err(err) => println!("Error: {err}\n\nYou can try sending your message again."),
            },
        }
        eprint!("> ");
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), PlayerError> {
    let mut config = config(&cli)?;
    match cli.command {
        Commands::Complete { prompt, delay_ms } => {
            if let Some(millis) = delay_ms {
                config = config.text_pacing_delay(Some(PacingDelay::from_user_millis(millis)));
            }
            let player = Player::builder()
                .config(config)
                .sink(Arc::new(TerminalSink::new(Viewport {
                    width: 0,
                    height: 0,
                })))
                .build()?;
            play(player, PlaybackRequest::completion(prompt)).await
        }
        Commands::Life {
            cells,
            delay_ms,
            whole,
            width,
            height,
        } => {
            let alive = parse_cells(&cells).map_err(PlayerError::Validation)?;
            if let Some(millis) = delay_ms {
                config = config.pacing_delay(PacingDelay::from_user_millis(millis));
            }
            let mode = if whole { GridMode::Whole } else { GridMode::Chunked };
            let player = Player::builder()
                .config(config)
                .sink(Arc::new(TerminalSink::new(Viewport { width, height })))
                .build()?;
            play(player, PlaybackRequest::generations(alive, mode)).await
        }
        Commands::Generate { prompt } => {
            let reply = ChatClient::new(config)?.generate(&prompt).await?;
            println!("{reply}");
            Ok(())
        }
        Commands::Chat => chat(ChatClient::new(config)?).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_observability();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "demo failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
