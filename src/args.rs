use clap::{ArgAction, Parser, Subcommand};
use xwb_tool::types::*;

/// Tools for inspecting, unpacking and repacking XACT wave banks
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Arg {
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    /// Search for wave banks in the directory recursively
    pub recursive: bool,
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    /// Also pick up files without the xwb extension if they start with the wave bank magic
    pub sniff: bool,
    #[arg(global = true, action = ArgAction::SetTrue, short, long)]
    /// Print backtrace on error
    pub backtrace: bool,
    #[arg(short, long, global = true, default_value = "warn")]
    /// Log level (off, error, warn, info, debug, trace)
    pub log_level: log::LevelFilter,
    #[command(subcommand)]
    /// Command
    pub command: Command,
}

#[derive(Subcommand, Debug)]
/// Commands
pub enum Command {
    /// Dump the bank header, metadata and entries
    Info {
        /// Input wave bank or directory
        input: String,
        /// Output file or directory, stdout if omitted
        output: Option<String>,
        #[arg(short, long, value_enum)]
        /// Output format, defaults to JSON
        format: Option<InfoFormat>,
    },
    #[cfg(feature = "utils-pcm")]
    /// Extract every sound as a WAV file
    Unpack {
        /// Input wave bank or directory
        input: String,
        /// Output directory, next to the input if omitted
        output: Option<String>,
    },
    /// Write a bank back out with the fixed version 45 profile
    Repack {
        /// Input wave bank or directory
        input: String,
        /// Output file or directory
        output: String,
        #[arg(long)]
        /// Build time as unix seconds, the current time if omitted
        build_time: Option<u64>,
    },
    #[cfg(feature = "utils-crc16")]
    /// Print the sound bank checksum (CRC-16/B) of files
    Checksum {
        /// Input file or directory
        input: String,
    },
}

pub fn parse_args() -> Arg {
    Arg::parse()
}
