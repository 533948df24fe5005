use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use zperiph::addr::Addr;
use zperiph::config::MachineConfig;
use zperiph::db::{Instance, RunOutcome};
use zperiph::proc::NopProc;

//===========================================================================//

macro_rules! invalid_data {
    ($e:expr) => {
        return Err(::std::io::Error::new(::std::io::ErrorKind::InvalidData,
                                         $e))
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err(::std::io::Error::new(::std::io::ErrorKind::InvalidData,
                                         format!($fmt, $($arg)+)))
    };
}

//===========================================================================//

#[derive(Parser)]
#[clap(author, about, long_about = None, version)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prints the devices of a simulated machine.
    Describe {
        /// The JSON machine description to load.
        machine: PathBuf,
    },
    /// Runs a simulated machine with the stub processor.
    Run {
        /// The JSON machine description to load.
        machine: PathBuf,
        /// The maximum number of clock cycles to run for.
        #[clap(long, default_value_t = 1_000_000)]
        cycles: u64,
        /// Stop when the program counter reaches this address (hex, with an
        /// optional `$` or `0x` prefix).
        #[clap(long = "break", value_parser = parse_addr)]
        breakpoints: Vec<Addr>,
        /// The serial device whose output is printed.
        #[clap(long, default_value = "serial")]
        serial: String,
        /// Suppress bank switch and status LED output.
        #[clap(long)]
        quiet: bool,
    },
}

fn parse_addr(text: &str) -> io::Result<Addr> {
    let digits = text
        .strip_prefix('$')
        .or_else(|| text.strip_prefix("0x"))
        .unwrap_or(text);
    match u16::from_str_radix(digits, 16) {
        Ok(value) => Ok(Addr::from(value)),
        Err(_) => invalid_data!("invalid address: {:?}", text),
    }
}

//===========================================================================//

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Describe { machine } => {
            let config = MachineConfig::load(&machine)?;
            let bus = config.build()?;
            let instance =
                Instance::new(&config.name, Box::new(NopProc::new()), bus);
            print!("{}", instance.description());
        }
        Command::Run { machine, cycles, breakpoints, serial, quiet } => {
            let config = MachineConfig::load(&machine)?;
            let mut instance =
                Instance::from_config(&config, Box::new(NopProc::new()))?;
            if quiet {
                instance.bus_mut().set_display_all(false);
            }
            for addr in breakpoints {
                instance.break_at(addr);
            }
            let outcome = instance.continue_for(cycles)?;
            let output = instance.serial_gets(&serial, usize::MAX)?;
            match outcome {
                RunOutcome::Breakpoint(addr) => {
                    println!("breakpoint at {addr}")
                }
                RunOutcome::Halted => println!("halted"),
                RunOutcome::BudgetExhausted => println!("budget exhausted"),
            }
            println!("pc={} cycles={}", instance.pc(), instance.cycles());
            let mut stdout = io::stdout();
            stdout.write_all(&output)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

//===========================================================================//
