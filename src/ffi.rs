//! FFI (Foreign Function Interface) layer for C integration
//!
//! This module exposes both rewrite engines to C hosts (forum software,
//! editors, web server modules).
//!
//! # FFI Boundary Contract
//!
//! ## String Representation
//!
//! **All strings use UTF-8 bytes + length representation (NOT NUL-terminated C strings)**
//!
//! - Pointer field: `*mut u8` / `*const u8` (points to UTF-8 bytes)
//! - Length field: `usize` with `_len` suffix (byte count, no NUL)
//!
//! ## Memory Management
//!
//! - Rust allocates all output memory using `Box<[u8]>`
//! - C must call `markup_result_free()` exactly once per populated result
//! - C must call `markup_converter_free()` exactly once per handle
//!
//! ```rust
//! use markup_normalizer::ffi::*;
//! use std::ptr;
//!
//! let handle = markup_converter_new();
//! let input = b"[b]hi[/b]";
//! let options = MarkupOptions {
//!     direction: DIRECTION_BBCODE_TO_MARKDOWN,
//!     timeout_ms: 1000,
//!     id: ptr::null(),
//!     id_len: 0,
//! };
//! let mut result = MarkupResult::empty();
//!
//! unsafe {
//!     markup_convert(handle, input.as_ptr(), input.len(), &options, &mut result);
//! }
//! assert_eq!(result.error_code, ERROR_SUCCESS);
//! let output = unsafe { std::slice::from_raw_parts(result.output, result.output_len) };
//! assert_eq!(output, b"**hi**");
//!
//! unsafe {
//!     markup_result_free(&mut result);
//!     markup_converter_free(handle);
//! }
//! assert!(result.output.is_null());
//! ```
//!
//! ## Error Handling Contract
//!
//! **Success:** `error_code = 0`, `error_message = NULL`, `output` valid
//! (NULL with `output_len = 0` for empty output).
//!
//! **Error:** `error_code != 0`, `error_message` points to a UTF-8
//! description, `output` is NULL.
//!
//! **Panic Safety:** every entry point uses `catch_unwind`; panics become
//! `ERROR_INTERNAL`.
//!
//! ## Thread Safety
//!
//! A handle holds no mutable state, but concurrent calls on one handle are
//! outside the contract. Use one handle per thread.

use std::panic;
use std::ptr;
use std::slice;
use std::time::Duration;

use crate::bbcode::BBCodeConverter;
use crate::converter::ConversionContext;
use crate::error::ConversionError;
use crate::html::HtmlConverter;

// ============================================================================
// Error Code Constants
// ============================================================================

/// Success - no error occurred
pub const ERROR_SUCCESS: u32 = 0;

/// Malformed list, url, image, code block, link or image attributes
pub const ERROR_MALFORMED: u32 = 1;

/// Input or identifier is not valid UTF-8
pub const ERROR_ENCODING: u32 = 2;

/// Conversion timeout exceeded
pub const ERROR_TIMEOUT: u32 = 3;

/// Input exceeds the size limit
pub const ERROR_INPUT_TOO_LARGE: u32 = 4;

/// Invalid input data (NULL pointers, unknown direction)
pub const ERROR_INVALID_INPUT: u32 = 5;

/// Internal error (unexpected condition, panic caught)
pub const ERROR_INTERNAL: u32 = 99;

// ============================================================================
// Direction Constants
// ============================================================================

/// Convert BBCode input to Markdown
pub const DIRECTION_BBCODE_TO_MARKDOWN: u32 = 0;

/// Convert HTML input to BBCode
pub const DIRECTION_HTML_TO_BBCODE: u32 = 1;

// ============================================================================
// FFI Data Structures
// ============================================================================

/// Conversion options passed from C to Rust
///
/// - `direction`: `DIRECTION_BBCODE_TO_MARKDOWN` or `DIRECTION_HTML_TO_BBCODE`
/// - `timeout_ms`: maximum conversion time, 0 = no timeout
/// - `id` / `id_len`: optional identifier reported in error messages
///   (NULL with `id_len = 0` when absent)
///
/// # Example Usage (C)
///
/// ```c
/// const char *id = "post-1234";
/// markup_options_t options = {
///     .direction = 0,          // BBCode -> Markdown
///     .timeout_ms = 2000,
///     .id = (const uint8_t*)id,
///     .id_len = strlen(id)
/// };
/// ```
#[repr(C)]
pub struct MarkupOptions {
    /// Conversion direction (see `DIRECTION_*`)
    pub direction: u32,
    /// Conversion timeout in milliseconds (0=no timeout)
    pub timeout_ms: u32,
    /// Identifier for error messages (UTF-8 bytes, can be NULL)
    pub id: *const u8,
    /// Length of id in bytes (0 if NULL)
    pub id_len: usize,
}

/// Conversion result returned from Rust to C
///
/// # State Invariants
///
/// **Success State (error_code == 0):**
/// - `output` points to `output_len` UTF-8 bytes (NULL if empty)
/// - `error_message` is NULL, `error_len` is 0
///
/// **Error State (error_code != 0):**
/// - `output` is NULL, `output_len` is 0
/// - `error_message` points to `error_len` UTF-8 bytes
#[repr(C)]
pub struct MarkupResult {
    /// Converted text (UTF-8 bytes, NOT NUL-terminated)
    pub output: *mut u8,
    /// Length of output in bytes
    pub output_len: usize,
    /// Error code: 0=success, non-zero=error (see ERROR_* constants)
    pub error_code: u32,
    /// Error message (UTF-8 bytes, NULL if success)
    pub error_message: *mut u8,
    /// Length of error message in bytes
    pub error_len: usize,
}

impl MarkupResult {
    /// A result with every pointer NULL, ready to be populated
    pub fn empty() -> Self {
        Self {
            output: ptr::null_mut(),
            output_len: 0,
            error_code: ERROR_SUCCESS,
            error_message: ptr::null_mut(),
            error_len: 0,
        }
    }
}

/// Opaque handle to the Rust engines
///
/// # Lifecycle
///
/// 1. Create: `markup_converter_new()` returns a handle
/// 2. Use: pass the handle to `markup_convert()`
/// 3. Destroy: `markup_converter_free()` deallocates the handle
pub struct MarkupConverterHandle {
    bbcode: BBCodeConverter,
    html: HtmlConverter,
}

fn reset_result(result: &mut MarkupResult) {
    *result = MarkupResult::empty();
}

fn into_raw_bytes(bytes: Vec<u8>) -> (*mut u8, usize) {
    if bytes.is_empty() {
        return (ptr::null_mut(), 0);
    }
    let boxed = bytes.into_boxed_slice();
    let len = boxed.len();
    (Box::into_raw(boxed) as *mut u8, len)
}

fn set_error_result(result: &mut MarkupResult, error_code: u32, error_message: String) {
    let (message, len) = into_raw_bytes(error_message.into_bytes());
    result.error_code = error_code;
    result.error_message = message;
    result.error_len = len;
}

fn set_success_result(result: &mut MarkupResult, output: String) {
    let (output, len) = into_raw_bytes(output.into_bytes());
    result.output = output;
    result.output_len = len;
    result.error_code = ERROR_SUCCESS;
}

fn required_ref<'a, T>(ptr: *const T, name: &str) -> Result<&'a T, ConversionError> {
    if ptr.is_null() {
        return Err(ConversionError::InvalidInput(format!(
            "{name} pointer is NULL"
        )));
    }

    // SAFETY: Caller provided a non-NULL pointer and accepts FFI contract
    // that this points to a valid, properly aligned value.
    Ok(unsafe { &*ptr })
}

fn required_str<'a>(ptr: *const u8, len: usize, name: &str) -> Result<&'a str, ConversionError> {
    if len == 0 {
        return Ok("");
    }

    if ptr.is_null() {
        return Err(ConversionError::InvalidInput(format!(
            "{name}_len > 0 with NULL {name} pointer"
        )));
    }

    // SAFETY: Pointer was validated as non-NULL above; caller guarantees `len`
    // bytes are valid and readable for the duration of this call.
    let bytes = unsafe { slice::from_raw_parts(ptr, len) };

    std::str::from_utf8(bytes)
        .map_err(|e| ConversionError::EncodingError(format!("{name} is not valid UTF-8: {e}")))
}

fn convert_inner(
    handle: &MarkupConverterHandle,
    input: &str,
    options: &MarkupOptions,
) -> Result<String, ConversionError> {
    let id = required_str(options.id, options.id_len, "id")?;
    let timeout = Duration::from_millis(u64::from(options.timeout_ms));
    let mut ctx = ConversionContext::new(id, timeout);

    let text = input.to_string();
    match options.direction {
        DIRECTION_BBCODE_TO_MARKDOWN => handle.bbcode.convert_with_context(text, &mut ctx),
        DIRECTION_HTML_TO_BBCODE => handle.html.convert_with_context(text, &mut ctx),
        other => Err(ConversionError::InvalidInput(format!(
            "unknown conversion direction {other}"
        ))),
    }
}

fn free_buffer(ptr_field: &mut *mut u8, len_field: &mut usize) {
    if (*ptr_field).is_null() {
        return;
    }

    let raw = ptr::slice_from_raw_parts_mut(*ptr_field, *len_field);
    // SAFETY: `raw` was allocated by `Box<[u8]>` via `Box::into_raw`.
    let _ = unsafe { Box::from_raw(raw) };
    *ptr_field = ptr::null_mut();
    *len_field = 0;
}

// ============================================================================
// FFI Functions
// ============================================================================

/// Create a new converter instance
///
/// Returns NULL if initialization panicked.
#[unsafe(no_mangle)]
pub extern "C" fn markup_converter_new() -> *mut MarkupConverterHandle {
    let result = panic::catch_unwind(|| {
        let handle = MarkupConverterHandle {
            bbcode: BBCodeConverter::new(),
            html: HtmlConverter::new(),
        };
        Box::into_raw(Box::new(handle))
    });

    result.unwrap_or(ptr::null_mut())
}

/// Convert `input` in the direction given by `options`
///
/// # Parameters
///
/// - `handle`: converter from `markup_converter_new()`, non-NULL
/// - `input` / `input_len`: UTF-8 input bytes (NULL allowed when `input_len == 0`)
/// - `options`: conversion options, non-NULL
/// - `result`: result to populate, non-NULL; free with `markup_result_free()`
///
/// # Error Codes
///
/// - `ERROR_MALFORMED` (1): malformed markup (message carries the id)
/// - `ERROR_ENCODING` (2): input or id not UTF-8
/// - `ERROR_TIMEOUT` (3): conversion exceeded `timeout_ms`
/// - `ERROR_INPUT_TOO_LARGE` (4): input exceeds the size limit
/// - `ERROR_INVALID_INPUT` (5): NULL pointer or unknown direction
/// - `ERROR_INTERNAL` (99): internal error or panic caught
///
/// # Safety
///
/// - All pointers are validated for NULL before dereferencing
/// - Non-NULL pointers must point to valid memory of the stated length
/// - Concurrent calls on the same handle are undefined behavior
#[unsafe(no_mangle)]
pub unsafe extern "C" fn markup_convert(
    handle: *mut MarkupConverterHandle,
    input: *const u8,
    input_len: usize,
    options: *const MarkupOptions,
    result: *mut MarkupResult,
) {
    if result.is_null() {
        // Cannot report error if result pointer is NULL.
        return;
    }

    // SAFETY: `result` was validated as non-NULL above.
    let result_ref = unsafe { &mut *result };
    reset_result(result_ref);

    let panic_result = panic::catch_unwind(|| -> Result<String, ConversionError> {
        let handle_ref = required_ref(handle.cast_const(), "Converter handle")?;
        let options_ref = required_ref(options, "Options")?;
        let input_str = required_str(input, input_len, "input")?;
        convert_inner(handle_ref, input_str, options_ref)
    });

    match panic_result {
        Ok(Ok(output)) => set_success_result(result_ref, output),
        Ok(Err(e)) => set_error_result(result_ref, e.code(), e.to_string()),
        Err(_) => set_error_result(
            result_ref,
            ERROR_INTERNAL,
            "Internal panic during conversion".to_string(),
        ),
    }
}

/// Free memory allocated by a conversion result
///
/// Idempotent: pointers are reset to NULL, so a second call is a no-op.
///
/// # Safety
///
/// - NULL `result` is a no-op
/// - `result` must have been populated by `markup_convert()`
/// - Do NOT call C `free()` on result pointers
#[unsafe(no_mangle)]
pub unsafe extern "C" fn markup_result_free(result: *mut MarkupResult) {
    if result.is_null() {
        return;
    }

    // SAFETY: `result` was validated as non-NULL above.
    let result_ref = unsafe { &mut *result };
    free_buffer(&mut result_ref.output, &mut result_ref.output_len);
    free_buffer(&mut result_ref.error_message, &mut result_ref.error_len);
    result_ref.error_code = ERROR_SUCCESS;
}

/// Destroy converter instance
///
/// # Safety
///
/// - NULL handle is a no-op
/// - `handle` must come from `markup_converter_new()` and not be freed twice
#[unsafe(no_mangle)]
pub unsafe extern "C" fn markup_converter_free(handle: *mut MarkupConverterHandle) {
    if handle.is_null() {
        return;
    }

    // SAFETY: `handle` was validated as non-NULL above and was originally
    // created by `Box::into_raw` in `markup_converter_new`.
    unsafe { drop(Box::from_raw(handle)) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_output_is_null() {
        let (ptr, len) = into_raw_bytes(Vec::new());
        assert!(ptr.is_null());
        assert_eq!(len, 0);
    }

    #[test]
    fn test_required_str_accepts_null_when_empty() {
        assert_eq!(required_str(ptr::null(), 0, "id").ok(), Some(""));
        assert!(matches!(
            required_str(ptr::null(), 3, "id"),
            Err(ConversionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_required_str_rejects_invalid_utf8() {
        let bytes = [0xFFu8, 0x41];
        assert!(matches!(
            required_str(bytes.as_ptr(), bytes.len(), "input"),
            Err(ConversionError::EncodingError(_))
        ));
    }

    #[test]
    fn test_error_result_round_trip() {
        let mut result = MarkupResult::empty();
        set_error_result(&mut result, ERROR_TIMEOUT, "late".to_string());
        assert_eq!(result.error_code, ERROR_TIMEOUT);
        assert_eq!(result.error_len, 4);
        assert!(result.output.is_null());

        free_buffer(&mut result.error_message, &mut result.error_len);
        assert!(result.error_message.is_null());
        assert_eq!(result.error_len, 0);
    }

    #[test]
    fn test_timeout_ms_maps_to_context() {
        let handle = MarkupConverterHandle {
            bbcode: BBCodeConverter::new(),
            html: HtmlConverter::new(),
        };
        let options = MarkupOptions {
            direction: DIRECTION_BBCODE_TO_MARKDOWN,
            timeout_ms: 0,
            id: ptr::null(),
            id_len: 0,
        };
        assert_eq!(
            convert_inner(&handle, "[u]x[/u]", &options).ok().as_deref(),
            Some("_x_")
        );
    }
}
