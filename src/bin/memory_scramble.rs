use std::fs::File;
use std::io::BufReader;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use flexi_logger::{AdaptiveFormat, Logger, WriteMode};
use lib_memory_scramble::prelude::*;

#[derive(Clone, Debug, Parser)]
struct MemoryScrambleOptions {
    /// Path to a board configuration file (see §6 of the spec: a
    /// "ROWSxCOLUMNS" header followed by one card value per line).
    #[arg(short, long)]
    board: String,

    #[arg(short, long)]
    log_level: Option<String>,

    /// Player id used by the command loop's flip/look/watch commands.
    #[arg(short, long, default_value = "player")]
    player: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let options = MemoryScrambleOptions::parse();
    let _logger = Logger::try_with_env_or_str(options.log_level.clone().unwrap_or("info".into()).as_str())?
        .write_mode(WriteMode::BufferAndFlush)
        .log_to_stderr()
        .adaptive_format_for_stderr(match cfg!(debug_assertions) {
            true => AdaptiveFormat::WithThread,
            _ => AdaptiveFormat::Default,
        })
        .start()?;

    let file = File::open(&options.board).with_context(|| format!("opening board file {}", options.board))?;
    let parsed = parse_grid(BufReader::new(file))?;
    let facade = GameFacade::new(Board::new(parsed.rows, parsed.columns, parsed.values));

    log::info!("memory scramble board loaded: {}x{}", facade.rows(), facade.columns());
    run_command_loop(&facade, &options.player)
}

/// A minimal line-oriented command loop over the facade, in the shape of
/// the teacher's `LTPServer::run`/`apply`: read a line, dispatch, print a
/// result, repeat. Commands: `look`, `flip ROW COL`, `map FROM TO`,
/// `watch`, `quit`.
fn run_command_loop(facade: &GameFacade, player: &str) -> Result<()> {
    let cancel = CancellationToken::new();
    loop {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let args: Vec<&str> = line.split_whitespace().collect();
        let result = dispatch(facade, player, &cancel, &args);

        match result {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => println!("ok"),
            Err(err) => {
                log::warn!("command failed: {err}");
                println!("err {err}");
            }
        }
    }
}

fn dispatch(facade: &GameFacade, player: &str, cancel: &CancellationToken, args: &[&str]) -> Result<Option<String>> {
    match args {
        [] => Ok(None),
        ["quit"] => std::process::exit(0),
        ["look"] => Ok(Some(facade.look(player))),
        ["flip", row, column] => {
            let row: usize = row.parse().context("row must be a non-negative integer")?;
            let column: usize = column.parse().context("column must be a non-negative integer")?;
            facade.flip(player, row, column, cancel)?;
            Ok(Some(facade.look(player)))
        }
        ["map", from, to] => {
            facade.map(from, to);
            Ok(None)
        }
        ["watch"] => {
            facade.watch(cancel)?;
            Ok(Some(facade.look(player)))
        }
        _ => Err(anyhow!("unrecognized command {}", args.join(" "))),
    }
}
