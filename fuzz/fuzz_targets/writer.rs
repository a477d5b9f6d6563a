#![no_main]

use libfuzzer_sys::fuzz_target;

use frame_csv::{Dialect, Value, Writer};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let cell = String::from_utf8_lossy(data).into_owned();
    let mut writer = Writer::new(Cursor::new(Vec::<u8>::new()), Dialect::excel());

    writer
        .write_record(&[Value::Str(cell.clone()), Value::Str(cell)])
        .unwrap();
});
