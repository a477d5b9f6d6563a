#![no_main]

use libfuzzer_sys::fuzz_target;

use frame_csv::{Engine, ReaderBuilder};

fuzz_target!(|data: &[u8]| {
    let reader = ReaderBuilder::new()
        .engine(Engine::Python)
        .sniff_sep()
        .skipfooter(1)
        .error_bad_lines(false)
        .from_reader(std::io::Cursor::new(data.to_vec()));

    if let Ok(mut reader) = reader {
        let _ = reader.read(None);
    }
});
