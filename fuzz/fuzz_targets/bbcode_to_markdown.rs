#![no_main]

use libfuzzer_sys::fuzz_target;
use markup_normalizer::error::ConversionError;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    match markup_normalizer::to_markdown(text, "fuzz") {
        Ok(markdown) => assert_eq!(markdown.trim(), markdown),
        Err(ConversionError::MalformedMarkup { id, .. }) => assert_eq!(id, "fuzz"),
        // Deep quote towers are rejected, never crash
        Err(ConversionError::InvalidInput(_)) => {}
        Err(ConversionError::Timeout) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
});
