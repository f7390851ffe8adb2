#![no_main]

use libfuzzer_sys::fuzz_target;
use markup_normalizer::ffi::*;
use std::ptr;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, input)) = data.split_first() else {
        return;
    };

    let handle = markup_converter_new();
    if handle.is_null() {
        return;
    }

    let options = MarkupOptions {
        direction: u32::from(selector % 3),
        timeout_ms: 1000,
        id: ptr::null(),
        id_len: 0,
    };
    let mut result = MarkupResult::empty();

    unsafe {
        markup_convert(handle, input.as_ptr(), input.len(), &options, &mut result);
    }

    assert_ne!(result.error_code, ERROR_INTERNAL);
    if result.error_code == ERROR_SUCCESS {
        assert!(result.error_message.is_null());
        if !result.output.is_null() {
            let output = unsafe { std::slice::from_raw_parts(result.output, result.output_len) };
            assert!(std::str::from_utf8(output).is_ok());
        }
    } else {
        assert!(result.output.is_null());
    }

    unsafe {
        markup_result_free(&mut result);
        markup_converter_free(handle);
    }
});
