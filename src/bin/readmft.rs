//! Prints a manifest in transfer encoding and checks its files.

use std::{env, fs};
use std::path::{Path, PathBuf};
use rpki_mft::repository::Manifest;
use rpki_mft::util::hex::pretty_key_id;


fn main() {
    if let Err(e) = process() {
        eprintln!("{e}");
        ::std::process::exit(1);
    }
}

fn process() -> Result<(), String> {
    let usage = usage()?;
    let manifest = read_manifest(&usage)?;
    print_manifest(&manifest);
    if let Some(dir) = usage.dir.as_ref() {
        check_files(&manifest, dir)?;
    }
    Ok(())
}

fn print_manifest(manifest: &Manifest) {
    println!(
        "Subject key identifier:   {}",
        pretty_key_id(manifest.subject_key_id())
    );
    println!(
        "Authority key identifier: {}",
        pretty_key_id(manifest.authority_key_id())
    );
    println!(
        "Authority info access:    {}",
        manifest.authority_info_access().unwrap_or("(none)")
    );
    println!("Manifest number:          {}", manifest.manifest_number());
    println!("This update:              {}", manifest.this_update());
    println!("Next update:              {}", manifest.next_update());
    if manifest.is_stale() {
        println!("Stale:                    yes");
    }
    for (idx, item) in manifest.iter().enumerate() {
        println!("{:5}: {}", idx + 1, item.file());
        println!("       hash {}", item.hash());
    }
}

fn check_files(manifest: &Manifest, dir: &Path) -> Result<(), String> {
    match manifest.check_file_hashes(dir) {
        Ok(()) => {
            println!("All {} files match.", manifest.len());
            Ok(())
        }
        Err(mismatches) => {
            for item in &mismatches {
                println!("{item}");
            }
            Err(format!(
                "{} of {} files failed", mismatches.len(), manifest.len()
            ))
        }
    }
}

fn read_manifest(usage: &Usage) -> Result<Manifest, String> {
    let data = fs::read(&usage.file)
        .map_err(|err| format!("Can’t read file: {err}"))?;
    Manifest::decode_wire(data.into())
        .map_err(|err| format!("Can't decode manifest: {err}"))
}

fn usage() -> Result<Usage, String> {
    let usage = "Usage: readmft <path> [dir]";
    if env::args().len() < 2 || env::args().len() > 3 {
        Err(usage.to_string())
    } else {
        let file = env::args().nth(1).map(PathBuf::from).ok_or(usage)?;
        let dir = env::args().nth(2).map(PathBuf::from);
        Ok(Usage { file, dir })
    }
}

struct Usage {
    file: PathBuf,
    dir: Option<PathBuf>,
}

