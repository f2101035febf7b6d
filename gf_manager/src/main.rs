//! The Go Fish manager daemon.
//!
//! Binds the UDP control socket and runs the coordination event loop
//! until interrupted.

use std::net::SocketAddr;

use anyhow::Error;
use ctrlc::set_handler;
use go_fish::server::{self, ManagerConfig};
use log::info;
use pico_args::Arguments;

const HELP: &str = "\
Run a Go Fish manager

USAGE:
  gf_manager [OPTIONS]

OPTIONS:
  --bind IP:PORT        Control socket bind address  [default: env GO_FISH_BIND or 127.0.0.1:6000]

FLAGS:
  -h, --help            Print help information

ENVIRONMENT:
  GO_FISH_BIND          Control socket bind address
  RUST_LOG              Log level filter (e.g. info, debug)
";

struct Args {
    bind: SocketAddr,
}

fn main() -> Result<(), Error> {
    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: match pargs.opt_value_from_str("--bind")? {
            Some(bind) => bind,
            None => std::env::var("GO_FISH_BIND")
                .unwrap_or_else(|_| "127.0.0.1:6000".to_string())
                .parse()?,
        },
    };

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    env_logger::builder().format_target(false).init();
    info!("starting the Go Fish manager at {}", args.bind);

    server::run(args.bind, ManagerConfig::default())
}
