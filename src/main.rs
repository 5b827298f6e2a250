pub mod args;

use std::io::Write;
use std::path::{Path, PathBuf};
use xwb_tool::types::*;
use xwb_tool::utils;
use xwb_tool::{WaveBank, XwbError};

lazy_static::lazy_static! {
    static ref COUNTER: utils::counter::Counter = utils::counter::Counter::new();
}

fn read_bank(filename: &str) -> anyhow::Result<WaveBank> {
    if filename == "-" {
        let data = utils::files::read_file(filename)?;
        return WaveBank::from_bytes(&data);
    }
    WaveBank::from_file(filename)
}

/// Output path for `filename`: inside `output` for directory input, `output` itself otherwise.
fn output_path(filename: &str, output: &str, is_dir: bool, ext: Option<&str>) -> String {
    if !is_dir {
        return output.to_string();
    }
    let f = PathBuf::from(filename);
    let mut pb = PathBuf::from(output);
    if let Some(fname) = f.file_name() {
        pb.push(fname);
    }
    if let Some(ext) = ext {
        pb.set_extension(ext);
    }
    pb.to_string_lossy().into_owned()
}

pub fn info_bank(
    filename: &str,
    config: &ExtraConfig,
    output: &Option<String>,
    is_dir: bool,
) -> anyhow::Result<ProcessResult> {
    eprintln!("Reading {}", filename);
    let bank = read_bank(filename)?;
    let format = config.info_format();
    let text = match format {
        InfoFormat::Json => serde_json::to_string_pretty(&bank)?,
        InfoFormat::Yaml => serde_yaml_ng::to_string(&bank)?,
    };
    let f = match output {
        Some(output) => output_path(filename, output, is_dir, Some(format.as_ref())),
        None => String::from("-"),
    };
    if f != "-" {
        utils::files::make_sure_dir_exists(&f)?;
    }
    let mut f = utils::files::write_file(&f)?;
    f.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        f.write_all(b"\n")?;
    }
    Ok(ProcessResult::Ok)
}

#[cfg(feature = "utils-pcm")]
pub fn unpack_bank(
    filename: &str,
    output: &Option<String>,
    is_dir: bool,
) -> anyhow::Result<ProcessResult> {
    eprintln!("Unpacking {}", filename);
    let bank = read_bank(filename)?;
    if bank.sounds.is_empty() {
        eprintln!("No sounds found");
        return Ok(ProcessResult::Ignored);
    }
    let out_dir = match output {
        Some(output) => PathBuf::from(output_path(filename, output, is_dir, Some(""))),
        None if filename == "-" => {
            return Err(anyhow::anyhow!(
                "An output directory is required when reading from stdin"
            ));
        }
        None => Path::new(filename).with_extension(""),
    };
    std::fs::create_dir_all(&out_dir)?;
    for (index, sound) in bank.sounds.iter().enumerate() {
        let path = out_dir.join(format!("{:04}.wav", index));
        let file = std::io::BufWriter::new(std::fs::File::create(&path)?);
        utils::pcm::write_sound(sound, file)?;
        log::info!(
            "Wrote {} ({} Hz, {} channels, {} bits)",
            path.display(),
            sound.sample_rate,
            sound.channels,
            sound.bits_per_sample
        );
    }
    Ok(ProcessResult::Ok)
}

pub fn repack_bank(
    filename: &str,
    config: &ExtraConfig,
    output: &str,
    is_dir: bool,
) -> anyhow::Result<ProcessResult> {
    eprintln!("Repacking {}", filename);
    let mut bank = read_bank(filename)?;
    if let Some(build_time) = config.build_time()? {
        bank.data.build_time = Some(build_time);
    }
    let data = bank.to_fixed_profile_bytes()?;
    let f = output_path(filename, output, is_dir, None);
    if f != "-" {
        utils::files::make_sure_dir_exists(&f)?;
    }
    let mut f = utils::files::write_file(&f)?;
    f.write_all(&data)?;
    Ok(ProcessResult::Ok)
}

#[cfg(feature = "utils-crc16")]
pub fn checksum_file(filename: &str) -> anyhow::Result<ProcessResult> {
    let data = utils::files::read_file(filename)?;
    let checksum = utils::crc16::soundbank_checksum(&data);
    println!("{:02x}{:02x}  {}", checksum[0], checksum[1], filename);
    Ok(ProcessResult::Ok)
}

/// Makes sure `output` can receive one file per input when the input is a directory.
fn prepare_output_dir(output: Option<&str>, is_dir: bool) -> anyhow::Result<()> {
    if let (Some(output), true) = (output, is_dir) {
        let op = Path::new(output);
        if op.exists() {
            if !op.is_dir() {
                return Err(anyhow::anyhow!("Output path is not a directory"));
            }
        } else {
            std::fs::create_dir_all(op)?;
        }
    }
    Ok(())
}

fn report_error(arg: &args::Arg, filename: &str, e: &anyhow::Error) {
    COUNTER.inc_error();
    eprintln!("Error processing {}: {}", filename, e);
    if let Some(err) = e.downcast_ref::<XwbError>() {
        log::debug!("{} failed with {:?}: {:?}", filename, err.kind(), err);
    }
    if arg.backtrace {
        eprintln!("Backtrace: {}", e.backtrace());
    }
}

fn process_files<F>(arg: &args::Arg, input: &str, output: Option<&str>, process: F)
where
    F: Fn(&str, bool) -> anyhow::Result<ProcessResult>,
{
    let (files, is_dir) = match utils::files::collect_files(input, arg.recursive, arg.sniff) {
        Ok(files) => files,
        Err(e) => {
            report_error(arg, input, &e.into());
            return;
        }
    };
    if let Err(e) = prepare_output_dir(output, is_dir) {
        report_error(arg, input, &e);
        return;
    }
    if is_dir && files.is_empty() {
        eprintln!("No wave banks found in {}", input);
    }
    for file in files.iter() {
        match process(file, is_dir) {
            Ok(result) => COUNTER.inc(result),
            Err(e) => report_error(arg, file, &e),
        }
    }
}

fn main() {
    let arg = args::parse_args();
    env_logger::Builder::new()
        .filter_level(arg.log_level)
        .format_timestamp_millis()
        .init();
    if arg.backtrace {
        unsafe { std::env::set_var("RUST_LIB_BACKTRACE", "1") };
    }
    match &arg.command {
        args::Command::Info {
            input,
            output,
            format,
        } => {
            let cfg = ExtraConfig {
                info_format: *format,
                ..Default::default()
            };
            process_files(&arg, input, output.as_deref(), |file, is_dir| {
                info_bank(file, &cfg, output, is_dir)
            });
        }
        #[cfg(feature = "utils-pcm")]
        args::Command::Unpack { input, output } => {
            process_files(&arg, input, output.as_deref(), |file, is_dir| {
                unpack_bank(file, output, is_dir)
            });
        }
        args::Command::Repack {
            input,
            output,
            build_time,
        } => {
            let cfg = ExtraConfig {
                build_time: *build_time,
                ..Default::default()
            };
            process_files(&arg, input, Some(output.as_str()), |file, is_dir| {
                repack_bank(file, &cfg, output, is_dir)
            });
        }
        #[cfg(feature = "utils-crc16")]
        args::Command::Checksum { input } => {
            process_files(&arg, input, None, |file, _| checksum_file(file));
        }
    }
    eprintln!("{}", *COUNTER);
    if COUNTER.has_error() {
        std::process::exit(1);
    }
}
