// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTML escaping for text relayed with HTML parse mode.

/// Escape the characters that are significant in destination HTML markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
