use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use moth::program::disas::disassemble;
use moth::program::file::read_file;
use moth::vm::{Vm, VmStatus};

#[derive(Parser)]
#[command(name = "moth")]
#[command(version = "1.0")]
#[command(about = "Moth: the bytecode virtual machine of the Silk language", long_about = None)]
struct Cli {
    /// Bytecode files to execute, in order
    files: Vec<PathBuf>,

    /// Print a disassembly listing instead of executing
    #[arg(short, long)]
    disassemble: bool,

    /// Print the value stack before every instruction
    #[arg(short = 's', long)]
    print_stack: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.files.is_empty() {
        eprintln!("[moth] no file to run");
        return ExitCode::FAILURE;
    }

    for file in &cli.files {
        let prog = match read_file(file) {
            Ok(prog) => prog,
            Err(err) => {
                eprintln!("[moth] {}: {}", file.display(), err);
                return ExitCode::FAILURE;
            }
        };

        if cli.disassemble {
            print!("{}", disassemble(&file.display().to_string(), &prog));
            continue;
        }

        let mut vm = Vm::new();
        vm.set_print_stack(cli.print_stack);

        let status = vm.run(&prog);
        if status != VmStatus::Ok {
            return ExitCode::from(status as i32 as u8);
        }
    }

    ExitCode::SUCCESS
}
