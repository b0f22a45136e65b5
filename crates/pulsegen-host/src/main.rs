//! Pulse generator host entry point.
//!
//! A line-oriented operator shell over the link controller: the minimal
//! stand-in for the graphical front end, which is out of scope here.
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML config, defaults on first run
//!  └─ LinkController::new()  -- owns the one serial session
//!  └─ REPL loop              -- ports / open / mode / single / ... / flash
//! ```

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pulsegen_core::{Mode, SineWave, SinglePulse, TrainPulse};
use pulsegen_host::application::link::LinkController;
use pulsegen_host::infrastructure::flash;
use pulsegen_host::infrastructure::serial::ports::list_ports;
use pulsegen_host::infrastructure::storage::config::{load_config, AppConfig};

/// The form layer allows up to this many pulse slots; the encoder itself
/// does not cap the train.
const MAX_TRAIN_PULSES: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    // Structured logging; `RUST_LOG` overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("pulsegen host starting");

    let mut controller = LinkController::new(config.serial.clone());

    println!("pulsegen operator shell (type 'help' for commands)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "quit" || line == "exit" {
                    break;
                }
                dispatch(line, &mut controller, &config).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    controller.disconnect();
    info!("pulsegen host stopped");
    Ok(())
}

async fn dispatch(line: &str, controller: &mut LinkController, config: &AppConfig) {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else { return };
    let args: Vec<&str> = parts.collect();

    let result = match command {
        "help" => {
            print_help();
            Ok(())
        }
        "ports" => cmd_ports(),
        "status" => {
            println!(
                "{}{}",
                controller.state(),
                controller
                    .port()
                    .map(|p| format!(" ({p})"))
                    .unwrap_or_default()
            );
            Ok(())
        }
        "open" => cmd_open(controller, &args).await,
        "close" => {
            controller.disconnect();
            println!("serial port closed");
            Ok(())
        }
        "mode" => cmd_mode(controller, &args),
        "single" => cmd_single(controller, &args),
        "train" => cmd_train(controller, &args),
        "sine" => cmd_sine(controller, &args),
        "invert" => cmd_invert(controller, &args),
        "flash" => cmd_flash(config, &args).await,
        other => {
            println!("unknown command: {other} (try 'help')");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{e:#}");
        println!("error: {e:#}");
    }
}

fn print_help() {
    println!(
        "\
  ports                      list available serial ports
  open <port>                open the port and run the version handshake
  close                      close the serial port
  status                     show the link state
  mode a|b|c                 select single-pulse / train / sine mode
  single <amp> <freq> <duty> send single-pulse parameters
  train <a,f,d,ll,ca> ...    send a pulse train (1..{MAX_TRAIN_PULSES} groups)
  sine <amp> <freq>          send sine parameters
  invert on|off              toggle output inversion
  flash <port>               compile the sketch and upload it to the board
  quit                       exit"
    );
}

fn cmd_ports() -> Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("no serial ports detected; connect the generator board");
    } else {
        for port in ports {
            println!("{port}");
        }
    }
    Ok(())
}

async fn cmd_open(controller: &mut LinkController, args: &[&str]) -> Result<()> {
    let [port] = args else {
        println!("usage: open <port>");
        return Ok(());
    };
    let state = controller.connect(port).await?;
    println!("{state}");
    Ok(())
}

fn cmd_mode(controller: &mut LinkController, args: &[&str]) -> Result<()> {
    let mode = match args {
        ["a"] | ["A"] => Mode::Single,
        ["b"] | ["B"] => Mode::Train,
        ["c"] | ["C"] => Mode::Sine,
        _ => {
            println!("usage: mode a|b|c");
            return Ok(());
        }
    };
    controller.select_mode(mode)?;
    println!("mode selected");
    Ok(())
}

fn cmd_single(controller: &mut LinkController, args: &[&str]) -> Result<()> {
    let [amp, freq, duty] = args else {
        println!("usage: single <amplitude> <frequency> <duty>");
        return Ok(());
    };
    controller.send_single(SinglePulse {
        amplitude: amp.to_string(),
        frequency: freq.to_string(),
        duty_percent: duty.to_string(),
    })?;
    println!("sent");
    Ok(())
}

fn cmd_train(controller: &mut LinkController, args: &[&str]) -> Result<()> {
    if args.is_empty() || args.len() > MAX_TRAIN_PULSES {
        println!("usage: train <amp,freq,duty,leadlag,angle> ... (1..{MAX_TRAIN_PULSES} groups)");
        return Ok(());
    }

    let mut pulses = Vec::with_capacity(args.len());
    for (i, group) in args.iter().enumerate() {
        let fields: Vec<&str> = group.split(',').collect();
        let [amp, freq, duty, lag, angle] = fields[..] else {
            println!("pulse {}: expected 5 comma-separated fields", i + 1);
            return Ok(());
        };
        pulses.push(TrainPulse {
            amplitude: amp.to_string(),
            frequency: freq.to_string(),
            duty_percent: duty.to_string(),
            lead_lag: lag.to_string(),
            cap_angle: angle.to_string(),
        });
    }

    controller.send_train(pulses)?;
    println!("sent");
    Ok(())
}

fn cmd_sine(controller: &mut LinkController, args: &[&str]) -> Result<()> {
    let [amp, freq] = args else {
        println!("usage: sine <amplitude> <frequency>");
        return Ok(());
    };
    controller.send_sine(SineWave {
        amplitude: amp.to_string(),
        frequency: freq.to_string(),
    })?;
    println!("sent");
    Ok(())
}

fn cmd_invert(controller: &mut LinkController, args: &[&str]) -> Result<()> {
    let on = match args {
        ["on"] => true,
        ["off"] => false,
        _ => {
            println!("usage: invert on|off");
            return Ok(());
        }
    };
    controller.set_invert(on)?;
    println!("sent");
    Ok(())
}

async fn cmd_flash(config: &AppConfig, args: &[&str]) -> Result<()> {
    let [port] = args else {
        println!("usage: flash <port>");
        return Ok(());
    };
    println!("starting compile and upload...");
    flash::compile_and_upload(&config.flash, port, |line| println!("{line}")).await?;
    println!("upload completed; open the serial port to use the generator");
    Ok(())
}
