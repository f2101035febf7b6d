//! A Go Fish player peer.
//!
//! Registers with a manager, waits for deals, plays turns from stdin
//! prompts, and de-registers on exit.

use std::io::{self, Write};

use anyhow::{Context, Error, bail};
use go_fish::{
    Hand, MoveSource, PlayerMove, PlayerName, PlayerPeer, PortAllocator, Rank,
    player::resolve,
    registry::PlayerRecord,
};
use log::{info, warn};
use pico_args::Arguments;

const HELP: &str = "\
Join a Go Fish manager as a player

USAGE:
  gf_player --name NAME [OPTIONS]

OPTIONS:
  --name NAME           Player name (required; must be unique at the manager)
  --manager HOST:PORT   Manager control address  [default: env GO_FISH_MANAGER or 127.0.0.1:6000]
  --address HOST        Address advertised to the manager  [default: 127.0.0.1]
  --ports START:END     Port range to allocate local ports from  [default: 44000:44499]

FLAGS:
  -h, --help            Print help information

ENVIRONMENT:
  GO_FISH_MANAGER       Manager control address
  RUST_LOG              Log level filter (e.g. info, debug)
";

struct Args {
    name: PlayerName,
    manager: String,
    address: String,
    port_range: (u16, u16),
}

fn parse_port_range(s: &str) -> Result<(u16, u16), Error> {
    let (start, end) = s
        .split_once(':')
        .context("port range must look like START:END")?;
    let start = start.parse().context("invalid range start")?;
    let end = end.parse().context("invalid range end")?;
    if start > end {
        bail!("port range start exceeds its end");
    }
    Ok((start, end))
}

fn main() -> Result<(), Error> {
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        name: PlayerName::new(&pargs.value_from_str::<_, String>("--name")?),
        manager: match pargs.opt_value_from_str("--manager")? {
            Some(manager) => manager,
            None => std::env::var("GO_FISH_MANAGER")
                .unwrap_or_else(|_| "127.0.0.1:6000".to_string()),
        },
        address: pargs
            .opt_value_from_str("--address")?
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        port_range: parse_port_range(
            &pargs
                .opt_value_from_str::<_, String>("--ports")?
                .unwrap_or_else(|| "44000:44499".to_string()),
        )?,
    };

    env_logger::builder().format_target(false).init();

    let mut ports = PortAllocator::new(args.port_range.0, args.port_range.1);
    let record = PlayerRecord {
        name: args.name.clone(),
        address: args.address,
        control_port: ports.next_port()?,
        turn_port: ports.next_port()?,
        data_port: ports.next_port()?,
    };
    let manager = resolve(&args.manager)?;
    let mut peer = PlayerPeer::new(record, manager)?;

    peer.register()
        .context("registration with the manager failed")?;
    info!("registered with the manager at {manager} as {}", args.name);

    let result = menu_loop(&mut peer);

    // Always attempt a clean de-registration, surfacing any failure.
    match peer.deregister() {
        Ok(()) => info!("de-registered from the manager"),
        Err(error) => warn!("{error}"),
    }
    result
}

fn menu_loop(peer: &mut PlayerPeer) -> Result<(), Error> {
    loop {
        println!("\nChoose an option:");
        println!("1. Start a game (become the dealer)");
        println!("2. Wait for a deal and play");
        println!("3. Exit");

        match prompt("Enter your choice: ")?.as_str() {
            "1" => {
                let k: usize = match prompt("Minimum number of players (k): ")?.parse() {
                    Ok(k) => k,
                    Err(_) => {
                        println!("Enter a number.");
                        continue;
                    }
                };
                match peer.request_start(k) {
                    Ok(started) => {
                        println!(
                            "Game {} started with: {}",
                            started.session_id,
                            started
                                .participants
                                .iter()
                                .map(ToString::to_string)
                                .collect::<Vec<_>>()
                                .join(", ")
                        );
                        let books =
                            peer.play(Some(&started.session_id), &mut StdinMoveSource)?;
                        println!("You finished with {} book(s).", books.len());
                    }
                    Err(error) => println!("{error}"),
                }
            }
            "2" => {
                println!("Waiting for the manager to deal...");
                let books = peer.play(None, &mut StdinMoveSource)?;
                println!("You finished with {} book(s).", books.len());
            }
            "3" => return Ok(()),
            _ => println!("Invalid choice. Please enter a valid option."),
        }
    }
}

/// Prompts the operator for a move on each turn signal.
struct StdinMoveSource;

impl MoveSource for StdinMoveSource {
    fn next_move(&mut self, hand: &Hand, books: &[Rank]) -> PlayerMove {
        println!(
            "\nYour hand: {}",
            hand.cards()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "Your books: {}",
            books
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        loop {
            let line = match prompt(
                "Your move (<opponent> <rank>, 'end' to end the game, 'quit' to leave): ",
            ) {
                Ok(line) => line,
                Err(_) => return PlayerMove::Quit,
            };
            match line.as_str() {
                "end" => return PlayerMove::EndGame,
                "quit" => return PlayerMove::Quit,
                line => {
                    let Some((opponent, rank)) = line.split_once(' ') else {
                        println!("Enter an opponent name and a rank, e.g. 'alice K'.");
                        continue;
                    };
                    match rank.trim().parse::<Rank>() {
                        Ok(rank) => {
                            return PlayerMove::Ask {
                                opponent: PlayerName::new(opponent),
                                rank,
                            };
                        }
                        Err(_) => println!("Unknown rank {rank:?}."),
                    }
                }
            }
        }
    }
}

fn prompt(message: &str) -> Result<String, Error> {
    print!("{message}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
