//! Demonstration of cooperative timeout mechanism
//!
//! This example shows how the timeout protects callers from slow
//! conversions of very large posts.
//!
//! Run with: cargo run --example timeout_demo

use markup_normalizer::converter::ConversionContext;
use markup_normalizer::error::ConversionError;
use markup_normalizer::{BBCodeConverter, HtmlConverter};
use std::time::Duration;

fn main() {
    println!("=== Cooperative Timeout Mechanism Demo ===\n");

    println!("1. No timeout (Duration::ZERO)");
    run_bbcode("[b]Title[/b] and content", Duration::ZERO);
    println!();

    println!("2. Generous timeout (10 seconds)");
    run_bbcode("[list][*]one[*]two[/list]", Duration::from_secs(10));
    println!();

    println!("3. Very short timeout (1ms) with a large post");
    let large = "[b]word[/b] [i]word[/i] ".repeat(50_000);
    let converter = BBCodeConverter::new();
    let mut ctx = ConversionContext::new("large-post", Duration::from_millis(1));
    // Add a small delay to ensure timeout
    std::thread::sleep(Duration::from_millis(2));
    report(converter.convert_with_context(large, &mut ctx), &ctx);
    println!();

    println!("4. Monitoring conversion progress");
    let html = "<p><b>x</b> <i>y</i></p>".repeat(500);
    let converter = HtmlConverter::new();
    let mut ctx = ConversionContext::new("monitored", Duration::from_secs(5));
    let input_len = html.len();
    match converter.convert_with_context(html, &mut ctx) {
        Ok(bbcode) => {
            println!("   ✓ Conversion succeeded");
            println!("   Elapsed: {:?}", ctx.elapsed());
            println!("   Matches rewritten: {}", ctx.match_count());
            println!("   Checkpoints: ~{}", ctx.match_count() / 100);
            println!("   Size: {} -> {} bytes", input_len, bbcode.len());
        }
        Err(e) => println!("   ✗ Error: {}", e),
    }
}

fn run_bbcode(text: &str, timeout: Duration) {
    let converter = BBCodeConverter::new();
    let mut ctx = ConversionContext::new("demo", timeout);
    report(converter.convert_with_context(text.to_string(), &mut ctx), &ctx);
}

fn report(result: Result<String, ConversionError>, ctx: &ConversionContext) {
    match result {
        Ok(markdown) => {
            println!("   ✓ Conversion succeeded");
            println!("   Elapsed: {:?}", ctx.elapsed());
            println!("   Matches rewritten: {}", ctx.match_count());
            println!("   Output size: {} bytes", markdown.len());
        }
        Err(ConversionError::Timeout) => {
            println!("   ✓ Timeout detected");
            println!("   Elapsed: {:?}", ctx.elapsed());
            println!("   Matches rewritten: {}", ctx.match_count());
        }
        Err(e) => println!("   ✗ Error: {}", e),
    }
}
