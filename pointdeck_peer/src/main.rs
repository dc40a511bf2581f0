// CLI entry point for Pointdeck.
//
// Runs one node of an estimation session: either hosting a room or joining
// one by its token. The terminal is the presentation sink (the roster is
// reprinted on every state change) and stdin is the input device.
//
// Usage:
//   pointdeck host [--port <PORT>] [--token <TOKEN>] [--name <NICK>]
//   pointdeck join <TOKEN> [--addr <HOST:PORT>] [--name <NICK>]
//
// In-session commands:
//   <number>          submit an estimate for this round
//   name <nickname>   change nickname
//   reveal            reveal all values (host only)
//   reset             start the next round (host only)
//   quit              leave the session

use std::io::{self, BufRead};

use pointdeck_peer::node::{HostConfig, JoinConfig, NodeHandle, start_host, start_participant};
use pointdeck_peer::round::RoundPhase;
use pointdeck_protocol::message::SessionSnapshot;
use pointdeck_protocol::types::RoomToken;

enum Mode {
    Host(HostConfig),
    Join(JoinConfig),
}

fn main() {
    env_logger::init();

    match parse_args() {
        Mode::Host(config) => {
            let token = config.token.clone();
            let (handle, addr) = match start_host(config, Box::new(render)) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("Failed to host room: {e}");
                    std::process::exit(1);
                }
            };
            println!("Hosting room {token} on {addr}");
            println!("Participants join with: pointdeck join {token} --addr <your-ip>:{}", addr.port());
            drive(handle);
        }
        Mode::Join(config) => {
            let token = config.token.clone();
            let handle = match start_participant(config, Box::new(render)) {
                Ok(handle) => handle,
                Err(e) => {
                    eprintln!("Failed to join room: {e}");
                    std::process::exit(1);
                }
            };
            println!("Joined room {token}");
            drive(handle);
        }
    }
}

/// Read stdin commands until EOF or `quit`, then stop the node.
fn drive(handle: NodeHandle) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Ok(value) = line.parse::<i64>() {
            handle.submit(value);
        } else if let Some(nickname) = line.strip_prefix("name ") {
            handle.rename(nickname.trim());
        } else if line == "reveal" {
            handle.reveal();
        } else if line == "reset" {
            handle.reset();
        } else if line == "quit" {
            break;
        } else {
            println!("commands: <number>, name <nickname>, reveal, reset, quit");
        }
    }
    println!("Leaving the session...");
    handle.stop();
}

/// Presentation sink: reprint the roster on every state change.
fn render(snapshot: &SessionSnapshot, phase: RoundPhase) {
    let phase_label = match phase {
        RoundPhase::Collecting => "collecting",
        RoundPhase::AllSubmitted => "all submitted",
        RoundPhase::Revealed => "revealed",
    };
    println!();
    println!("round: {phase_label}");
    for record in snapshot.participants.values() {
        let card = match (record.value, record.revealed) {
            (None, _) => "$".to_string(),
            (Some(value), true) => value.to_string(),
            (Some(_), false) => "?".to_string(),
        };
        println!("  [{card:>3}] {}", record.nickname);
    }
}

/// Parse command-line arguments. Uses simple `std::env::args()` matching,
/// no clap dependency.
fn parse_args() -> Mode {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("host") => Mode::Host(parse_host_args(&args[2..])),
        Some("join") => Mode::Join(parse_join_args(&args[2..])),
        Some("--help" | "-h") => {
            print_usage();
            std::process::exit(0);
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }
}

fn parse_host_args(args: &[String]) -> HostConfig {
    let mut config = HostConfig::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--token" => {
                i += 1;
                config.token = args
                    .get(i)
                    .map(|s| parse_token(s))
                    .unwrap_or_else(|| {
                        eprintln!("--token requires a value");
                        std::process::exit(1);
                    });
            }
            "--name" => {
                i += 1;
                config.nickname = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--name requires a value");
                    std::process::exit(1);
                });
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn parse_join_args(args: &[String]) -> JoinConfig {
    let Some(token_arg) = args.first() else {
        eprintln!("join requires a room token");
        print_usage();
        std::process::exit(1);
    };
    let mut config = JoinConfig {
        addr: "127.0.0.1:7878".into(),
        token: parse_token(token_arg),
        nickname: String::new(),
    };
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--addr" => {
                i += 1;
                config.addr = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--addr requires a value");
                    std::process::exit(1);
                });
            }
            "--name" => {
                i += 1;
                config.nickname = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--name requires a value");
                    std::process::exit(1);
                });
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn parse_token(input: &str) -> RoomToken {
    match RoomToken::parse(input) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("Invalid room token: {e}");
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Usage: pointdeck <COMMAND>");
    println!();
    println!("Commands:");
    println!("  host [--port <PORT>] [--token <TOKEN>] [--name <NICK>]");
    println!("      Create a room and wait for participants (default port: 7878).");
    println!("  join <TOKEN> [--addr <HOST:PORT>] [--name <NICK>]");
    println!("      Join a room hosted elsewhere (default addr: 127.0.0.1:7878).");
    println!();
    println!("In-session commands: <number>, name <nickname>, reveal, reset, quit");
}
