// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTML body composition and length-limited splitting.

use vktg_core::html::escape_html;

/// Maximum length of one destination text message.
pub const MESSAGE_LIMIT: usize = 4096;

/// Maximum length of a media caption.
pub const CAPTION_LIMIT: usize = 1024;

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Length of an HTML body as the reader sees it: tags count zero and an
/// entity counts one.
pub fn visible_len(html: &str) -> usize {
    atoms(html).into_iter().map(weight).sum()
}

/// Builds the HTML body of a forwarded message: the pre-rendered
/// `header`, the escaped text and a trailing block of video links.
pub fn compose(header: &str, text: &str, video_links: &[String]) -> String {
    let mut body = String::from(header);
    if !text.trim().is_empty() {
        body.push('\n');
        body.push_str(&escape_html(text.trim_end()));
    }
    if !video_links.is_empty() {
        let links: Vec<String> = video_links.iter().map(|l| escape_html(l)).collect();
        body.push_str("\n\n<b>Video:</b>\n");
        body.push_str(&links.join("\n\n"));
    }
    body
}

/// Splits an HTML body into chunks of at most `limit` visible characters.
///
/// Paragraph boundaries are preferred, then line boundaries; a single
/// line longer than the limit is cut between atoms, so a cut never lands
/// inside a tag or an entity. The separators at a cut are dropped. Tags
/// must not span lines.
pub fn split_message(html: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if visible_len(html) <= limit {
        return vec![html.to_string()];
    }
    let mut chunks = Vec::new();
    pack(html, &["\n\n", "\n"], limit, &mut chunks);
    chunks
}

/// Indivisible pieces of an HTML string: `<...>` tags, `&...;` entities
/// and single characters. Unterminated markup falls back to characters.
fn atoms(html: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = html;
    while let Some(first) = rest.chars().next() {
        let end = match first {
            '<' => rest.find('>').map(|i| i + 1),
            '&' => entity_end(rest),
            _ => None,
        }
        .unwrap_or(first.len_utf8());
        let (atom, tail) = rest.split_at(end);
        out.push(atom);
        rest = tail;
    }
    out
}

/// Byte length of the entity at the start of `s`, if one starts there.
fn entity_end(s: &str) -> Option<usize> {
    let semi = s.char_indices().take(12).find(|(_, c)| *c == ';')?.0;
    let name = &s[1..semi];
    let name = name.strip_prefix('#').unwrap_or(name);
    let valid = !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric());
    valid.then_some(semi + 1)
}

fn weight(atom: &str) -> usize {
    if atom.len() > 1 && atom.starts_with('<') {
        0
    } else {
        1
    }
}

fn pack(text: &str, separators: &[&str], limit: usize, chunks: &mut Vec<String>) {
    let Some((sep, finer)) = separators.split_first() else {
        hard_split(text, limit, chunks);
        return;
    };

    let mut current = String::new();
    for part in text.split(sep) {
        let joined = if current.is_empty() {
            visible_len(part)
        } else {
            visible_len(&current) + char_len(sep) + visible_len(part)
        };
        if joined <= limit {
            if !current.is_empty() {
                current.push_str(sep);
            }
            current.push_str(part);
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if visible_len(part) <= limit {
            current.push_str(part);
        } else {
            pack(part, finer, limit, chunks);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
}

fn hard_split(text: &str, limit: usize, chunks: &mut Vec<String>) {
    let mut current = String::new();
    let mut used = 0;
    for atom in atoms(text) {
        let w = weight(atom);
        if used + w > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push_str(atom);
        used += w;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compose_escapes_text_and_lists_videos() {
        let body = compose(
            "<a href=\"u\"><b>Anna</b></a>",
            "1 < 2",
            &["https://vk.com/video1_2".to_string()],
        );
        assert_eq!(
            body,
            "<a href=\"u\"><b>Anna</b></a>\n1 &lt; 2\n\n<b>Video:</b>\nhttps://vk.com/video1_2"
        );
    }

    #[test]
    fn compose_with_header_only() {
        assert_eq!(compose("H", "  ", &[]), "H");
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
    }

    #[test]
    fn splits_on_paragraphs_first() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        assert_eq!(split_message(text, 10), vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn oversized_line_is_cut() {
        let chunks = split_message("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let text = "привет мир";
        assert_eq!(split_message(text, 10), vec![text.to_string()]);
    }

    /// Every `&` in `html` opens one of the entities `escape_html` emits.
    fn entities_intact(html: &str) -> bool {
        let mut rest = html;
        while let Some(i) = rest.find('&') {
            let tail = &rest[i..];
            if !["&amp;", "&lt;", "&gt;", "&quot;"]
                .iter()
                .any(|e| tail.starts_with(e))
            {
                return false;
            }
            rest = &tail[1..];
        }
        true
    }

    #[test]
    fn split_never_cuts_an_entity() {
        for raw in ["&", "<"] {
            let body = compose("H", &raw.repeat(5000), &[]);
            let chunks = split_message(&body, MESSAGE_LIMIT);
            assert_eq!(chunks.len(), 3, "{raw}");
            assert_eq!(chunks[0], "H");
            for chunk in &chunks {
                assert!(entities_intact(chunk), "broken entity in chunk of {raw}");
                assert!(visible_len(chunk) <= MESSAGE_LIMIT);
            }
            assert_eq!(visible_len(&chunks[1]), MESSAGE_LIMIT);
            assert_eq!(chunks.concat(), body.replacen('\n', "", 1));
        }
    }

    #[test]
    fn limit_counts_visible_characters() {
        let body = compose("<b>H</b>", &"&".repeat(3000), &[]);
        assert!(char_len(&body) > MESSAGE_LIMIT);
        assert_eq!(visible_len(&body), 3002);
        assert_eq!(split_message(&body, MESSAGE_LIMIT), vec![body.clone()]);
    }

    #[test]
    fn split_keeps_tags_whole() {
        assert_eq!(split_message("<b>bold</b>", 2), vec!["<b>bo", "ld</b>"]);
    }

    #[test]
    fn unterminated_markup_counts_as_characters() {
        assert_eq!(visible_len("a < b & c"), 9);
        assert_eq!(visible_len("&amp;&#33;&bad name;"), 12);
    }

    proptest! {
        #[test]
        fn html_chunks_keep_entities_and_content(
            text in "[a-z&<>\" ]{0,200}",
            limit in 1usize..40,
        ) {
            let escaped = escape_html(&text);
            let chunks = split_message(&escaped, limit);
            for chunk in &chunks {
                prop_assert!(visible_len(chunk) <= limit);
                prop_assert!(entities_intact(chunk));
            }
            prop_assert_eq!(chunks.concat(), escaped);
        }


        #[test]
        fn chunks_respect_limit_and_keep_content(
            text in "[a-zа-я \n]{0,400}",
            limit in 1usize..64,
        ) {
            let chunks = split_message(&text, limit);
            for chunk in &chunks {
                prop_assert!(char_len(chunk) <= limit);
            }
            let kept: String = chunks.concat().chars().filter(|c| *c != '\n').collect();
            let original: String = text.chars().filter(|c| *c != '\n').collect();
            prop_assert_eq!(kept, original);
        }
    }
}
