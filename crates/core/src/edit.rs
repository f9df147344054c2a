/// A recorded mutation against original byte offsets.
#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// Collects positional edits against a source string and applies them
/// in a single pass.
///
/// All offsets refer to the original text, so edits can be recorded in
/// any order while walking a syntax tree. Insertions at the same
/// position keep their call order and land before any replacement that
/// starts there. Overlapping replacements are a caller bug.
#[derive(Debug)]
pub struct EditBuffer<'a> {
    source: &'a str,
    edits: Vec<Edit>,
}

impl<'a> EditBuffer<'a> {
    /// Starts an empty edit set over `source`.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            edits: Vec::new(),
        }
    }

    /// Replaces `source[start..end]` with `text`.
    pub fn overwrite(&mut self, start: usize, end: usize, text: impl Into<String>) {
        debug_assert!(start < end, "overwrite needs a non-empty span");
        self.edits.push(Edit {
            start,
            end,
            text: text.into(),
        });
    }

    /// Inserts `text` immediately before `pos`.
    pub fn append_left(&mut self, pos: usize, text: impl Into<String>) {
        self.edits.push(Edit {
            start: pos,
            end: pos,
            text: text.into(),
        });
    }

    /// Removes `source[start..end]`.
    pub fn delete(&mut self, start: usize, end: usize) {
        self.overwrite(start, end, "");
    }

    /// True when no edits have been recorded.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Materializes the edited string.
    pub fn build(mut self) -> String {
        // Insertions sort ahead of replacements at the same offset; the
        // stable sort keeps call order within each group.
        self.edits
            .sort_by_key(|edit| (edit.start, (edit.end > edit.start) as u8));

        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0usize;
        for edit in &self.edits {
            debug_assert!(
                edit.start >= cursor,
                "overlapping edits at byte {}",
                edit.start
            );
            if edit.start > cursor {
                out.push_str(&self.source[cursor..edit.start]);
            }
            out.push_str(&edit.text);
            cursor = cursor.max(edit.end);
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}
