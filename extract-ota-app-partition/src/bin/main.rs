use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use extract_ota_app_partition::extract_partition_binary;

#[derive(Parser)]
#[command(name = "extract-ota-app-partition")]
#[command(
    about = "Extract the OTA app partition binary from a compiled firmware for dual-partition OTA",
    long_about = None
)]
struct Cli {
    /// Compiled firmware, e.g. .esphome/build/<name>/.pioenvs/<name>/firmware.bin
    firmware: PathBuf,

    /// Output partition binary path
    output: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Usage errors exit with 1 rather than clap's default of 2.
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    match extract_partition_binary(&cli.firmware, &cli.output) {
        Ok(size) => {
            println!(
                "Extracted {} bytes from {} to {}",
                size,
                cli.firmware.display(),
                cli.output.display()
            );
            println!();
            println!("To flash this partition:");
            println!("  esphome upload main.yaml --device /dev/ttyUSB0 \\");
            println!(
                "    --ota-helper-bin {} --ota-helper-offset 0xYOUR_OFFSET",
                cli.output.display()
            );
            println!();
            println!("To find YOUR_OFFSET, check your partition table CSV file.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}
