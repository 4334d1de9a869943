#![no_main]

use arbitrary::Arbitrary;
use dblib_types::{NativeConverter, Policy, materialize};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    code: u8,
    null: bool,
    stringify_numerics: bool,
    convert_datetime: bool,
    stringify_uniqueidentifier: bool,
    data: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let policy = Policy::new()
        .stringify_numerics(input.stringify_numerics)
        .convert_datetime(input.convert_datetime)
        .stringify_uniqueidentifier(input.stringify_uniqueidentifier);
    let data = (!input.null).then_some(input.data.as_slice());

    // Short or malformed buffers must materialize without panicking.
    let _ = materialize(i32::from(input.code), data, &policy, &NativeConverter);
});
