#![no_main]

use libfuzzer_sys::fuzz_target;

use frame_csv::ReaderBuilder;

fuzz_target!(|data: &[u8]| {
    let reader = ReaderBuilder::fixed_width()
        .infer_nrows(10)
        .from_reader(std::io::Cursor::new(data.to_vec()));

    if let Ok(mut reader) = reader {
        let _ = reader.read(None);
    }
});
