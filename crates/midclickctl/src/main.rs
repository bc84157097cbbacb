use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use midclick_core::config;
use midclick_core::ipc::{self, ClientMsg, DaemonMsg};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;

#[derive(Parser)]
#[command(name = "midclickctl", about = "Control the midclickd daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show daemon and per-device status
    Status,
    /// Enable middle button emulation
    Enable,
    /// Disable middle button emulation
    Disable,
    /// Toggle middle button emulation on/off
    Toggle,
    /// Set emulation from a value (enabled, disabled, on, off, ...)
    Set {
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let socket_path = config::socket_path();
    let stream = UnixStream::connect(&socket_path).with_context(|| {
        format!(
            "connecting to midclickd at {}\nIs the daemon running?",
            socket_path.display()
        )
    })?;

    let mut writer = stream.try_clone().context("cloning stream")?;
    let reader = BufReader::new(stream);

    let msg = match cli.command {
        Command::Status => ClientMsg::GetStatus,
        Command::Enable => ClientMsg::Enable,
        Command::Disable => ClientMsg::Disable,
        Command::Toggle => ClientMsg::Toggle,
        Command::Set { value } => ClientMsg::Set { value },
    };

    writer
        .write_all(ipc::encode(&msg).as_bytes())
        .context("sending command")?;

    for line in reader.lines() {
        let line = line.context("reading response")?;
        let Some(resp) = ipc::decode_daemon(&line) else {
            continue;
        };
        match resp {
            DaemonMsg::Status { devices, version } => {
                println!("midclickd v{}", version);
                if devices.is_empty() {
                    println!("  no devices");
                }
                for dev in devices {
                    let pending = if dev.pending { " (change pending)" } else { "" };
                    println!("  {}", dev.name);
                    println!("    enabled: {}{}", dev.enabled, pending);
                    println!("    default: {}", dev.default_enabled);
                    println!("    state:   {}", dev.state);
                }
            }
            DaemonMsg::Ack { ok, message } => {
                if ok {
                    println!("{}", message);
                } else {
                    eprintln!("error: {}", message);
                    std::process::exit(1);
                }
            }
        }
        break;
    }

    Ok(())
}
