//! Sentence segmentation.
//!
//! Splits normalized text on Unicode (UAX #29) sentence boundaries, re-joins
//! splits that follow a title abbreviation or an initial (`Dr. Smith`,
//! `J. R. R. Tolkien`), and drops candidates that are not plausibly prose.

use std::fmt;
use std::ops::Deref;

use unicode_segmentation::UnicodeSegmentation;

/// Abbreviations that end in a period but rarely end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "vs.", "e.g.", "i.e.", "approx.",
    "fig.", "mt.",
];

/// A single sentence of speakable text: the unit of queued work.
///
/// Immutable once segmented; consumed exactly once by the playback worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sentence(Box<str>);

impl Sentence {
    /// Wrap text as a sentence without segmenting it.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into().into_boxed_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Sentence {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Sentence {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// One-shot, ordered sequence of sentences produced by [`segment`].
#[derive(Debug)]
pub struct Sentences(std::vec::IntoIter<Sentence>);

impl Iterator for Sentences {
    type Item = Sentence;

    fn next(&mut self) -> Option<Sentence> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for Sentences {}

/// Split normalized text into speakable sentences, in order.
///
/// # Example
/// ```
/// use spoke_voice::segment::segment;
///
/// let sentences: Vec<String> = segment("Idea A. Idea B").map(|s| s.to_string()).collect();
/// assert_eq!(sentences, ["Idea A.", "Idea B"]);
/// ```
pub fn segment(text: &str) -> Sentences {
    let mut sentences = Vec::new();
    let mut pending = String::new();

    let mut pieces = text.split_sentence_bounds().peekable();
    while let Some(piece) = pieces.next() {
        pending.push_str(piece);
        if pieces.peek().is_some_and(|next| continues_after(&pending, next)) {
            continue;
        }
        push_candidate(&mut sentences, &pending);
        pending.clear();
    }
    push_candidate(&mut sentences, &pending);

    Sentences(sentences.into_iter())
}

/// Whether a candidate has enough letters to be worth speaking.
///
/// At least 40% of its characters, spaces included, must be alphabetic,
/// which filters stray symbols, JSON fragments and hex dumps.
pub fn is_speakable(text: &str) -> bool {
    let (alphabetic, total) = text.chars().fold((0usize, 0usize), |(alpha, total), c| {
        (alpha + usize::from(c.is_alphabetic()), total + 1)
    });

    alphabetic > 0 && alphabetic * 5 >= total * 2
}

fn push_candidate(sentences: &mut Vec<Sentence>, candidate: &str) {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return;
    }
    if !is_speakable(candidate) {
        tracing::trace!(candidate, "Dropping unspeakable sentence");
        return;
    }
    sentences.push(Sentence::new(candidate));
}

/// Whether a UAX #29 break between `text` and `next` is an abbreviation,
/// not a sentence end.
///
/// A lone initial only continues when it follows another initial or a title
/// (`Dr. J. Smith`), or when `next` opens with an initial (`J. R. Smith`).
/// `Plan B. Next` and a one-letter paragraph such as `X. Then` still split.
fn continues_after(text: &str, next: &str) -> bool {
    let mut words = text.split_whitespace().rev().map(leading_trimmed);
    let Some(last) = words.next() else {
        return false;
    };

    if is_abbreviation(last) {
        return true;
    }
    if !is_initial(last) {
        return false;
    }
    words.next().is_some_and(|w| is_initial(w) || is_abbreviation(w))
        || next
            .split_whitespace()
            .next()
            .map(leading_trimmed)
            .is_some_and(is_initial)
}

fn leading_trimmed(word: &str) -> &str {
    word.trim_start_matches(|c: char| !c.is_alphanumeric())
}

fn is_abbreviation(word: &str) -> bool {
    ABBREVIATIONS.contains(&word.to_lowercase().as_str())
}

fn is_initial(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(c), Some('.'), None) if c.is_uppercase()
    )
}
