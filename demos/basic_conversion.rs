//! Basic conversion example demonstrating both rewrite engines
//!
//! Run with: cargo run --example basic_conversion

use markup_normalizer::{to_bbcode, to_markdown};

fn main() {
    println!("=== Markup Normalizer - Basic Examples ===\n");

    // Example 1: Emphasis and links
    bbcode_example(
        "Example 1: Emphasis and links",
        "[b]Bold[/b], [i]italic[/i] and [url=https://example.org]a link[/url]",
    );

    // Example 2: Lists
    bbcode_example(
        "Example 2: Ordered list",
        "Steps:[list=1][*]Download[*]Unpack[*]Run[/list]",
    );

    // Example 3: Nested quotes collapse to one level
    bbcode_example(
        "Example 3: Nested quotes",
        "[quote=alice][quote=bob]original[/quote]I agree[/quote]",
    );

    // Example 4: Code snippet with language alias
    bbcode_example("Example 4: Code snippet", "[code=shell]cargo build[/code]");

    // Example 5: HTML editor output
    html_example(
        "Example 5: HTML to BBCode",
        r#"<p><strong>Hi</strong> see <a href="https://example.org" target="_blank">this</a></p><pre>let x = 1 < 2;</pre>"#,
    );

    // Example 6: Malformed markup
    bbcode_example("Example 6: Malformed markup", "[url=https://example.org]never closed");
}

fn bbcode_example(title: &str, input: &str) {
    println!("{title}");
    println!("Input BBCode:");
    println!("{input}\n");

    match to_markdown(input, "demo") {
        Ok(markdown) => {
            println!("Output Markdown:");
            println!("{markdown}");
        }
        Err(e) => println!("Error (code {}): {e}", e.code()),
    }
    println!("---\n");
}

fn html_example(title: &str, input: &str) {
    println!("{title}");
    println!("Input HTML:");
    println!("{input}\n");

    match to_bbcode(input, "demo") {
        Ok(bbcode) => {
            println!("Output BBCode:");
            println!("{bbcode}");
        }
        Err(e) => println!("Error (code {}): {e}", e.code()),
    }
    println!("---\n");
}
