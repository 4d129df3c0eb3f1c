#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use rpki_mft::repository::{Manifest, ManifestContent, Roa};
use rpki_mft::repository::roa::RoaContent;

fuzz_target!(|data: &[u8]| {
    let (which, data) = match data.split_first() {
        Some((first, data)) => (*first, Bytes::copy_from_slice(data)),
        None => return,
    };

    match which % 4 {
        0 => { let _ = ManifestContent::decode(data); },
        1 => { let _ = RoaContent::decode(data); },
        2 => {
            if let Ok(mft) = Manifest::decode_wire(data.clone()) {
                assert_eq!(mft.encode_wire(), data);
            }
        },
        3 => {
            if let Ok(roa) = Roa::decode_wire(data.clone()) {
                assert_eq!(roa.encode_wire(), data);
            }
        },
        _ => panic!("what?"),
    }
});
