use clap::error::ErrorKind;
use clap::Parser;
use clap_num::maybe_hex;
use riskxvii::decode::Instr;
use riskxvii::loader::load_image;
use riskxvii::platform::pma::INST_MEM_SIZE;
use riskxvii::platform::{Platform, Trap};
use std::io::Write;
use std::{env, io, process};

/// Emulate the RISK-XVII virtual machine
///
/// Loads a flat memory image (first KiB instructions, second KiB
/// data) and executes it until the program stores to the halt
/// routine or the program counter runs past the instruction region.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the memory image binary
    image: String,

    /// Print each instruction before it executes
    #[arg(short, long)]
    debug: bool,

    /// Start printing instructions once the program counter first
    /// matches this address (use 0x prefix for hexadecimal)
    #[arg(short, long, value_parser=maybe_hex::<u32>)]
    pc_breakpoint: Option<u32>,
}

fn usage() -> ! {
    let program = env::args()
        .next()
        .unwrap_or_else(|| String::from("emulate"));
    println!("Usage: {program} <memory_image_binary>");
    process::exit(1);
}

/// Drain the platform's console buffer to stdout
fn flush_console(platform: &mut Platform) {
    let bytes = platform.flush_console();
    if !bytes.is_empty() {
        let mut stdout = io::stdout();
        stdout.write_all(&bytes).unwrap();
        stdout.flush().unwrap();
    }
}

fn print_trace(platform: &Platform) {
    let word = platform.fetch();
    match Instr::decode(word) {
        Ok(instr) => println!("pc=0x{:x}: {instr}", platform.pc()),
        Err(_) => println!("pc=0x{:x}: 0x{word:08x} (?)", platform.pc()),
    }
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if err.kind() == ErrorKind::MissingRequiredArgument => {
            usage()
        }
        Err(err) => err.exit(),
    };

    let mut platform = Platform::new();
    if let Err(e) = load_image(&mut platform, &args.image) {
        eprintln!("{e}");
        process::exit(1);
    }

    let mut trace = args.debug && args.pc_breakpoint.is_none();
    while platform.pc() < INST_MEM_SIZE {
        if let Some(pc_breakpoint) = args.pc_breakpoint {
            if platform.pc() == pc_breakpoint {
                trace = true;
            }
        }
        if trace {
            print_trace(&platform);
        }

        let result = platform.step();
        flush_console(&mut platform);

        match result {
            Ok(()) => (),
            Err(trap @ Trap::Halt) => {
                println!("{trap}");
                process::exit(0);
            }
            Err(
                trap @ (Trap::IllegalOperation(_) | Trap::NotImplemented(_)),
            ) => {
                println!("{trap}");
                print!("{}", platform.dump_registers());
                process::exit(1);
            }
            Err(Trap::Input(message)) => {
                eprintln!("{message}");
                process::exit(1);
            }
        }
    }
    // The program counter ran past the instruction region; this is a
    // normal exit
}
