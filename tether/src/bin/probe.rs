//! Connection probe for local-socket servers.
//!
//! Connects to a server, performs the greeting handshake, prints the
//! banner, and disconnects. Useful as a liveness check for anything that
//! speaks the line protocol.
//!
//! # Usage
//!
//! ```sh
//! tether-probe /run/agent.sock
//! tether-probe --fd-passing --hint 4321 /run/agent.sock
//! ```

use tether::{ConnectError, Context, ServerHint, TransportMode};

fn main() {
    tether::init_tracing();

    let config = match parse_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("tether-probe: {message}");
            eprintln!("usage: tether-probe [--fd-passing] [--hint <pid>] <socket-path>");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&config) {
        eprintln!("tether-probe: {err}");
        std::process::exit(1);
    }
}

struct Config {
    endpoint: String,
    mode: TransportMode,
    hint: Option<ServerHint>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Config, String> {
    let mut endpoint = None;
    let mut mode = TransportMode::ByteStream;
    let mut hint = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fd-passing" => mode = TransportMode::DescriptorPassing,
            "--hint" => {
                let value = args.next().ok_or("--hint requires a value")?;
                let pid: u32 = value
                    .parse()
                    .map_err(|_| format!("invalid --hint value: {value}"))?;
                hint = Some(ServerHint::new(pid));
            }
            _ if arg.starts_with('-') => return Err(format!("unknown option: {arg}")),
            _ if endpoint.is_none() => endpoint = Some(arg),
            _ => return Err(format!("unexpected argument: {arg}")),
        }
    }

    Ok(Config {
        endpoint: endpoint.ok_or("missing socket path")?,
        mode,
        hint,
    })
}

fn run(config: &Config) -> Result<(), ConnectError> {
    let mut ctx = Context::new();
    ctx.connect_with(&config.endpoint, config.hint, config.mode)?;

    match ctx.greeting() {
        Some(banner) => println!("{}: OK {banner}", config.endpoint),
        None => println!("{}: OK", config.endpoint),
    }

    ctx.disconnect();
    Ok(())
}
