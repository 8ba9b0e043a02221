use tracing::debug;

use crate::api::StreamEvent;

/// Rendered answer text plus its character cursor.
///
/// Events that carry an `offset` overlapping text already held are trimmed
/// before appending, so replays after a resume never duplicate content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    text: String,
    /// Cursor where `text` begins.
    start: u64,
    chars: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from text recovered out of band (e.g. the content endpoint).
    pub fn from_rendered(text: impl Into<String>) -> Self {
        let text = text.into();
        let chars = text.chars().count() as u64;
        Self {
            text,
            start: 0,
            chars,
        }
    }

    /// Start at a cursor whose preceding text is held elsewhere.
    pub fn resumed_at(offset: u64) -> Self {
        Self {
            text: String::new(),
            start: offset,
            chars: offset,
        }
    }

    /// Text held locally; after [`Transcript::resumed_at`] this excludes
    /// everything before the starting cursor.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Characters before [`Transcript::text`] that are not held locally.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Offset to send when resuming.
    pub fn offset(&self) -> u64 {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append the part of `event`'s content not yet held and return it.
    pub fn apply(&mut self, event: &StreamEvent) -> &str {
        let content = event.content_str();
        let skip = match event.offset {
            Some(start) if start < self.chars => {
                usize::try_from(self.chars - start).unwrap_or(usize::MAX)
            }
            Some(start) if start > self.chars => {
                debug!(start, held = self.chars, "stream offset skips ahead of transcript");
                0
            }
            _ => 0,
        };

        let before = self.text.len();
        for ch in content.chars().skip(skip) {
            self.text.push(ch);
            self.chars += 1;
        }
        &self.text[before..]
    }
}
