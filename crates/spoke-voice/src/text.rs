//! Text normalization for speech.
//!
//! Turns assistant-generated markdown into plain prose that a TTS engine can
//! read aloud. Code, URLs and file paths are dropped entirely; structural
//! markdown is stripped while the prose around it is kept as written.
//! Prosody punctuation (`—`, `…`, `...`, `--`, `!`, `?`, quotes) is never
//! touched, since it drives the engine's pacing.
//!
//! Paragraph breaks become sentence boundaries: a blank line between two
//! unpunctuated lines yields `". "` so the segmenter does not fuse unrelated
//! ideas into one run-on sentence.

use std::sync::LazyLock;

use regex::Regex;

/// Characters that already end a clause, so a paragraph break after them
/// needs no injected period.
const TERMINAL_PUNCTUATION: [char; 6] = ['.', '!', '?', ':', ';', ','];

/// Punctuation that may trail a URL or path and belongs to the sentence.
const TRAILING_PUNCTUATION: [char; 8] = ['.', ',', ';', ':', '!', '?', ')', '"'];

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("static pattern compiles")
}

static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| pattern(r"`[^`\n]*`"));
static IMAGE: LazyLock<Regex> = LazyLock::new(|| pattern(r"!\[[^\]\n]*\]\([^)\n]*\)"));
static LINK: LazyLock<Regex> = LazyLock::new(|| pattern(r"\[([^\]\n]+)\]\([^)\n]*\)"));
static URL: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)\b(?:https?://|www\.)\S+"));
static UNIX_PATH: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"(^|[\s(\["'])((?:~|\.\.?)?/[\w.\-~/]+)"#));
static WINDOWS_PATH: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"(^|[\s(\["'])([A-Za-z]:\\\S*)"#));
static RELATIVE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r#"(^|[\s(\["'])([\w.\-]+(?:/[\w.\-]+)+\.[A-Za-z0-9]{1,8})\b"#)
});
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| pattern(r"</?[A-Za-z][^<>\n]*>"));
static LEADING_UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| pattern(r"(^|[^\w])_+(\w)"));
static TRAILING_UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| pattern(r"(\w)_+([^\w]|$)"));
static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| pattern(r"\n(?:[ \t]*\n)+"));

/// Normalize raw assistant text into speakable prose.
///
/// Never fails: malformed markdown (an unclosed fence, a stray backtick)
/// degrades to plain text.
///
/// # Example
/// ```
/// use spoke_voice::text::normalize;
///
/// assert_eq!(normalize("Idea A\n\nIdea B"), "Idea A. Idea B");
/// assert_eq!(normalize("Done.\n\nNext step."), "Done. Next step.");
/// ```
#[must_use]
pub fn normalize(raw: &str) -> String {
    let text = strip_thinking_blocks(raw);
    let text = strip_block_structure(&text);

    let text = INLINE_CODE.replace_all(&text, "").replace('`', "");
    let text = IMAGE.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = strip_urls(&text);
    let text = strip_paths(&text);
    let text = HTML_TAG.replace_all(&text, "");
    let text = strip_emphasis(&text);

    // Must run while newlines still exist.
    let text = mark_paragraph_breaks(&text);
    collapse_whitespace(&text)
}

// ── Block-level structure ──────────────────────────────────────────

/// Remove `<think>…</think>`, `<reasoning>…</reasoning>`,
/// `<seed:think>…</seed:think>` and `<|START_THINKING|>…<|END_THINKING|>`
/// so chain-of-thought is never spoken.
fn strip_thinking_blocks(text: &str) -> String {
    [
        ("<think", "</think>"),
        ("<reasoning", "</reasoning>"),
        ("<seed:think", "</seed:think>"),
        ("<|START_THINKING|>", "<|END_THINKING|>"),
    ]
    .iter()
    .fold(text.to_string(), |acc, (open, close)| {
        strip_tag_block(&acc, open, close)
    })
}

/// Remove every `<open…>…close` span, matching case-insensitively.
/// An opening tag without a matching close is left in place.
fn strip_tag_block(text: &str, open_prefix: &str, close_tag: &str) -> String {
    let haystack = text.to_ascii_lowercase();
    let open = open_prefix.to_ascii_lowercase();
    let close = close_tag.to_ascii_lowercase();

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(offset) = haystack[cursor..].find(&open) {
        let start = cursor + offset;
        let end = haystack[start..]
            .find('>')
            .map(|gt| start + gt + 1)
            .and_then(|body| haystack[body..].find(&close).map(|c| body + c + close.len()));

        match end {
            Some(end) => {
                out.push_str(&text[cursor..start]);
                cursor = end;
            }
            None => {
                out.push_str(&text[cursor..start + open.len()]);
                cursor = start + open.len();
            }
        }
    }

    out.push_str(&text[cursor..]);
    out
}

/// Line pass: drop fenced code, horizontal rules and per-line markers.
///
/// Dropped lines are kept as empty lines so the blank-line structure around
/// them still reads as a paragraph break.
fn strip_block_structure(text: &str) -> String {
    let mut lines = Vec::new();
    let mut open_fence: Option<&str> = None;

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(fence) = open_fence {
            if trimmed.starts_with(fence) {
                open_fence = None;
            }
            lines.push(String::new());
            continue;
        }

        if let Some(fence) = fence_marker(trimmed) {
            // ```one-liner``` opens and closes on the same line
            if !trimmed[fence.len()..].contains(fence) {
                open_fence = Some(fence);
            }
            lines.push(String::new());
            continue;
        }

        if is_horizontal_rule(trimmed) {
            lines.push(String::new());
            continue;
        }

        lines.push(strip_line_markers(line));
    }

    lines.join("\n")
}

fn fence_marker(line: &str) -> Option<&'static str> {
    ["```", "~~~"].into_iter().find(|fence| line.starts_with(fence))
}

/// `---`, `***`, `___` and spaced variants like `- - -`.
fn is_horizontal_rule(line: &str) -> bool {
    let mut chars = line.chars().filter(|c| !c.is_whitespace());
    let Some(first) = chars.next() else {
        return false;
    };
    let rest: Vec<char> = chars.collect();
    matches!(first, '-' | '*' | '_') && rest.len() >= 2 && rest.iter().all(|&c| c == first)
}

/// Strip blockquote, heading and list markers from the start of a line.
fn strip_line_markers(line: &str) -> String {
    let mut s = line.trim_start();

    while let Some(rest) = s.strip_prefix('>') {
        s = rest.trim_start();
    }

    if s.starts_with('#') {
        let rest = s.trim_start_matches('#');
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            s = rest.trim_start();
        }
    }

    strip_list_marker(s).to_string()
}

fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
    {
        return rest.trim_start();
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let after = &line[digits..];
        if let Some(rest) = after.strip_prefix(". ").or_else(|| after.strip_prefix(") ")) {
            return rest.trim_start();
        }
    }

    line
}

// ── Inline content ─────────────────────────────────────────────────

fn strip_urls(text: &str) -> String {
    URL.replace_all(text, |caps: &regex::Captures<'_>| {
        trailing_punctuation(&caps[0]).to_string()
    })
    .into_owned()
}

/// Absolute (`/a/b`, `~/a`, `./a`, `../a`, `C:\a`) and relative paths with a
/// file extension (`src/main.rs`). Extensionless `a/b` is kept so that
/// "and/or" survives.
fn strip_paths(text: &str) -> String {
    let mut out = text.to_string();
    for re in [&*UNIX_PATH, &*WINDOWS_PATH, &*RELATIVE_PATH] {
        out = re
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                format!("{}{}", &caps[1], trailing_punctuation(&caps[2]))
            })
            .into_owned();
    }
    out
}

/// The run of sentence punctuation at the end of a removed span, which
/// belongs to the surrounding prose.
fn trailing_punctuation(span: &str) -> &str {
    let kept = span.trim_end_matches(TRAILING_PUNCTUATION);
    &span[kept.len()..]
}

/// Remove `**`, `~~`, `*` and edge `_` emphasis markers.
///
/// A lone `*` surrounded by spaces (`5 * 3`) and underscores inside a word
/// (`snake_case`) are prose, not markup.
fn strip_emphasis(text: &str) -> String {
    let text = text.replace("~~", "");
    let text = strip_asterisks(&text);
    let text = LEADING_UNDERSCORES.replace_all(&text, "$1$2");
    TRAILING_UNDERSCORES.replace_all(&text, "$1$2").into_owned()
}

fn strip_asterisks(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '*' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i] == '*' {
            i += 1;
        }

        let spaced_before = start == 0 || chars[start - 1].is_whitespace();
        let spaced_after = i == chars.len() || chars[i].is_whitespace();
        if spaced_before && spaced_after {
            out.extend(&chars[start..i]);
        }
    }

    out
}

// ── Whitespace ─────────────────────────────────────────────────────

/// Replace each blank-line run with a sentence boundary.
///
/// Injects `". "` unless the text before the break already ends in
/// terminal punctuation or nothing precedes the break at all.
fn mark_paragraph_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut cursor = 0;

    for m in PARAGRAPH_BREAK.find_iter(text) {
        out.push_str(text[cursor..m.start()].trim_end());
        cursor = m.end();

        match out.trim_end().chars().last() {
            None => {}
            Some(c) if TERMINAL_PUNCTUATION.contains(&c) => out.push(' '),
            Some(_) => out.push_str(". "),
        }
    }

    out.push_str(&text[cursor..]);
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_break_without_punctuation_becomes_period() {
        assert_eq!(normalize("Idea A\n\nIdea B"), "Idea A. Idea B");
    }

    #[test]
    fn paragraph_break_after_period_is_not_doubled() {
        assert_eq!(normalize("Done.\n\nNext step."), "Done. Next step.");
    }

    #[test]
    fn paragraph_break_after_other_terminals() {
        assert_eq!(normalize("Wait!\n\nReally?\n\nYes:\n\nok"), "Wait! Really? Yes: ok");
        assert_eq!(normalize("first,\n\nsecond;\n\nthird"), "first, second; third");
    }

    #[test]
    fn whitespace_only_lines_count_as_paragraph_break() {
        assert_eq!(normalize("One\n  \n\t\nTwo"), "One. Two");
    }

    #[test]
    fn single_newline_is_plain_whitespace() {
        assert_eq!(normalize("one\ntwo"), "one two");
    }

    #[test]
    fn leading_blank_lines_inject_nothing() {
        assert_eq!(normalize("\n\n\nHello"), "Hello");
    }

    #[test]
    fn windows_line_endings() {
        assert_eq!(normalize("Idea A\r\n\r\nIdea B"), "Idea A. Idea B");
    }

    #[test]
    fn fenced_code_block_is_removed() {
        let input = "Here is code:\n```rust\nfn main() {}\n```\nDone.";
        assert_eq!(normalize(input), "Here is code: Done.");
    }

    #[test]
    fn fenced_code_between_paragraphs_keeps_the_break() {
        let input = "Run this\n\n~~~\nls -la\n~~~\n\nThen check";
        assert_eq!(normalize(input), "Run this. Then check");
    }

    #[test]
    fn unclosed_fence_drops_the_rest() {
        assert_eq!(normalize("Look.\n```\nlet x = 1;"), "Look.");
    }

    #[test]
    fn one_line_fence() {
        assert_eq!(normalize("Before:\n```x = 1```\nafter"), "Before: after");
    }

    #[test]
    fn inline_code_is_removed_entirely() {
        assert_eq!(normalize("Call `foo()` to start."), "Call to start.");
    }

    #[test]
    fn urls_are_removed() {
        assert_eq!(
            normalize("Read https://example.com/docs?id=1 for more."),
            "Read for more."
        );
        assert_eq!(normalize("Visit www.example.org."), "Visit .");
    }

    #[test]
    fn file_paths_are_removed() {
        assert_eq!(normalize("Edit /etc/hosts and restart."), "Edit and restart.");
        assert_eq!(normalize("Open ~/notes/todo.md now"), "Open now");
        assert_eq!(normalize("Run ./build.sh first"), "Run first");
        assert_eq!(normalize("See ../lib for details"), "See for details");
        assert_eq!(normalize(r"Check C:\Users\me\file.txt today"), "Check today");
        assert_eq!(normalize("Look in src/main.rs please"), "Look in please");
    }

    #[test]
    fn slash_words_are_not_paths() {
        assert_eq!(normalize("Use cats and/or dogs."), "Use cats and/or dogs.");
        assert_eq!(normalize("It is 3/4 full."), "It is 3/4 full.");
    }

    #[test]
    fn markdown_structure_is_stripped() {
        assert_eq!(normalize("## Header\nSome text."), "Header Some text.");
        assert_eq!(normalize("- First\n- Second\n- Third"), "First Second Third");
        assert_eq!(normalize("1. One\n2) Two"), "One Two");
        assert_eq!(normalize("> Quoted text."), "Quoted text.");
        assert_eq!(normalize("Above.\n\n---\n\nBelow."), "Above. Below.");
    }

    #[test]
    fn heading_paragraph_gets_a_boundary() {
        assert_eq!(normalize("# Summary\n\nAll good."), "Summary. All good.");
    }

    #[test]
    fn emphasis_markers_are_stripped() {
        assert_eq!(
            normalize("**Hello** world! This is *italic* and ~~gone~~ _under_."),
            "Hello world! This is italic and gone under."
        );
    }

    #[test]
    fn prose_asterisks_and_snake_case_survive() {
        assert_eq!(normalize("5 * 3 equals 15"), "5 * 3 equals 15");
        assert_eq!(normalize("set max_tokens high"), "set max_tokens high");
    }

    #[test]
    fn links_keep_their_text_and_images_vanish() {
        assert_eq!(
            normalize("Check [this guide](https://example.com) out. ![chart](c.png)"),
            "Check this guide out."
        );
    }

    #[test]
    fn html_tags_are_removed() {
        assert_eq!(normalize("Press <kbd>Enter</kbd> now."), "Press Enter now.");
        assert_eq!(normalize("if a < b and c > d"), "if a < b and c > d");
    }

    #[test]
    fn prosody_punctuation_is_preserved() {
        let input = "Well\u{2014}maybe\u{2026} or... \u{201c}yes\u{201d} -- \u{2018}no\u{2019}! \"ok\" 'fine'?";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn thinking_blocks_are_removed() {
        assert_eq!(
            normalize("<think duration=\"5\">Hidden reasoning.</think>\nThe result is 42."),
            "The result is 42."
        );
        assert_eq!(
            normalize("<REASONING>plan</REASONING>Visible answer."),
            "Visible answer."
        );
        assert_eq!(normalize("Before. <think>x</think> After."), "Before. After.");
    }

    #[test]
    fn unclosed_thinking_tag_is_kept_as_text() {
        assert_eq!(normalize("<think>still going"), "still going");
    }

    #[test]
    fn empty_and_whitespace_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  \n\n \t "), "");
    }
}
