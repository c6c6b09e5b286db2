/// Document touching every block kind once.
pub const SAMPLE_DOCUMENT: &str = r#"# Weekly report 📊

Shipped **three** features, fixed *two* bugs and ~~one~~ regression.
Use `cargo run` to try it; ━━━━━━━━ done.

> Quotes keep their bar across wrapped lines of text.

- first item
  - nested item with 👍🏽
3. ordered item

---

| Name | Age |
|------|-----|
| Alice | 30 |
| Bob | 25 |

```rust
fn main() {}
```
after the fence"#;

/// Concatenates `sections` copies of a mixed section.
pub fn long_document(sections: usize) -> String {
    let mut out = String::new();
    for idx in 0..sections {
        out.push_str(&format!("## Section {}\n", idx + 1));
        out.push_str("Paragraph with **bold**, *italic*, `code` and 😀 emoji ");
        out.push_str("that runs long enough to wrap across several physical lines.\n");
        out.push_str("- list entry one\n- list entry two\n");
        out.push_str("| Key | Value |\n|---|---|\n| a | 1 |\n\n");
    }
    out
}
