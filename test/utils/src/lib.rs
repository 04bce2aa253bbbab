/// An assistant reply as it is stored for display, with the model's reasoning
/// fenced ahead of the answer.
pub fn thinking_fixture() -> &'static str {
    return "```thinking\nlet me think\n```\nThe answer is 42.";
}

/// A reply whose reasoning wraps across several lines and is followed by a
/// fenced code block that must survive stripping.
pub fn multiline_thinking_fixture() -> &'static str {
    return r#"
```thinking
The user wants a loop.
Rust has ranges, so use one.
```
Here's how to print in Rust.

```rust
fn print_numbers() {
    for i in 0..=10 {
        println!("{i}");
    }
}
```
"#
    .trim();
}

/// A session document written by a newer or older release that only carries a
/// subset of the known fields.
pub fn sparse_session_fixture() -> &'static str {
    return r#"
session_id: 20240101_120000_abcdef12
title: Sparse
messages:
  - role: user
    content: Hi there
"#
    .trim_start();
}

pub fn corrupted_session_fixture() -> &'static str {
    return "session_id: [unterminated\n  title: {{{\n";
}
