#![no_main]

use libfuzzer_sys::fuzz_target;

use frame_csv::{Engine, ReaderBuilder};

fuzz_target!(|data: &[u8]| {
    let reader = ReaderBuilder::new()
        .engine(Engine::Fast)
        .chunksize(7)
        .error_bad_lines(false)
        .from_reader(std::io::Cursor::new(data.to_vec()));

    if let Ok(reader) = reader {
        for chunk in reader {
            if chunk.is_err() {
                break;
            }
        }
    }
});
