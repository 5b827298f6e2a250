use crate::wavebank::WaveBank;
use std::fs;
use std::io;
use std::io::{Read, Write};
use std::path::Path;

pub const WAVEBANK_EXT: &str = "xwb";

fn is_wavebank_file(path: &Path, sniff: bool) -> bool {
    let has_ext = path
        .extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(WAVEBANK_EXT));
    if has_ext || !sniff {
        return has_ext;
    }
    match fs::File::open(path) {
        Ok(mut f) => WaveBank::is_wavebank(&mut f).unwrap_or(false),
        Err(_) => false,
    }
}

/// Finds wave banks in `path`.
///
/// With `sniff` set, files without the `xwb` extension are included when they
/// start with the wave bank magic.
pub fn find_files(path: &str, recursive: bool, sniff: bool) -> io::Result<Vec<String>> {
    let mut result = Vec::new();
    let dir_path = Path::new(&path);

    if dir_path.is_dir() {
        for entry in fs::read_dir(dir_path)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() && is_wavebank_file(&path, sniff) {
                if let Some(path_str) = path.to_str() {
                    result.push(path_str.to_string());
                }
            } else if recursive && path.is_dir() {
                if let Some(path_str) = path.to_str() {
                    let mut sub_files = find_files(path_str, recursive, sniff)?;
                    result.append(&mut sub_files);
                }
            }
        }
    }
    result.sort();

    Ok(result)
}

pub fn collect_files(path: &str, recursive: bool, sniff: bool) -> io::Result<(Vec<String>, bool)> {
    if path == "-" {
        return Ok((vec![path.to_string()], false));
    }
    let pa = Path::new(path);
    if pa.is_dir() {
        return Ok((find_files(path, recursive, sniff)?, true));
    }
    if pa.is_file() {
        return Ok((vec![path.to_string()], false));
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("Path {} is neither a file nor a directory", pa.display()),
    ))
}

pub fn read_file<F: AsRef<Path> + ?Sized>(f: &F) -> io::Result<Vec<u8>> {
    let mut content = Vec::new();
    if f.as_ref() == Path::new("-") {
        io::stdin().read_to_end(&mut content)?;
    } else {
        content = fs::read(f)?;
    }
    Ok(content)
}

pub fn write_file<F: AsRef<Path> + ?Sized>(f: &F) -> io::Result<Box<dyn Write>> {
    Ok(if f.as_ref() == Path::new("-") {
        Box::new(io::stdout())
    } else {
        Box::new(fs::File::create(f)?)
    })
}

pub fn make_sure_dir_exists<F: AsRef<Path> + ?Sized>(f: &F) -> io::Result<()> {
    let path = f.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[test]
fn test_collect_files_stdin() {
    let (files, is_dir) = collect_files("-", true, false).unwrap();
    assert_eq!(files, vec!["-".to_string()]);
    assert!(!is_dir);
    let err = collect_files("./no/such/bank.xwb", false, false).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
}
