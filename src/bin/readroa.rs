use std::{env, fs};
use rpki_mft::repository::Roa;
use rpki_mft::util::hex::pretty_key_id;


fn main() {
    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("Usage: readroa <path>");
            ::std::process::exit(1);
        }
    };
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Can’t read file: {}", err);
            ::std::process::exit(1);
        }
    };

    let roa = match Roa::decode_wire(data.into()) {
        Ok(roa) => roa,
        Err(err) => {
            eprintln!("Can’t decode roa: {}", err);
            ::std::process::exit(1);
        }
    };

    println!(
        "Subject key identifier:   {}", pretty_key_id(roa.subject_key_id())
    );
    println!(
        "Authority key identifier: {}", pretty_key_id(roa.authority_key_id())
    );
    println!(
        "Authority info access:    {}",
        roa.authority_info_access().unwrap_or("(none)")
    );
    println!("ROA valid until:          {}", roa.expires());
    println!("asID:                     {}", roa.as_id());
    for (idx, addr) in roa.addresses().iter().enumerate() {
        println!("{:5}: {} (max: {})", idx + 1, addr, addr.max_length());
    }
}
