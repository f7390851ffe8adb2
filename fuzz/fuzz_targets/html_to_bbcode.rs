#![no_main]

use libfuzzer_sys::fuzz_target;
use markup_normalizer::error::ConversionError;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    match markup_normalizer::to_bbcode(text, "fuzz") {
        Ok(_) => {}
        Err(ConversionError::MalformedMarkup { id, .. }) => assert_eq!(id, "fuzz"),
        Err(ConversionError::Timeout) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
});
