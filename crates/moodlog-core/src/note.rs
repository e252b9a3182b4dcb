use serde::{Deserialize, Serialize};

/// Index metadata for one note, as persisted in `meta_info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMeta {
    /// `YYYY-MM-DD HH:MM:SS`, overwritten on every save.
    pub date: String,
    #[serde(rename = "emotion", default)]
    pub emotions: Vec<String>,
}

/// A full note with its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteInfo {
    pub title: String,
    pub content: String,
    pub date: String,
    pub emotions: Vec<String>,
}

/// A summary of a note for listing (truncated content).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSummary {
    pub title: String,
    pub preview: String,
    pub date: String,
    pub emotions: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest first.
    #[default]
    Date,
    /// Alphabetical by title.
    Title,
}

/// Query parameters for listing notes.
#[derive(Debug, Default, Clone)]
pub struct NoteQuery {
    /// Keep notes carrying any of these labels.
    pub emotions: Option<Vec<String>>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub sort: SortOrder,
    pub reverse: bool,
    pub limit: Option<usize>,
}

impl NoteInfo {
    /// Convert to summary with truncated content preview.
    pub fn to_summary(&self, max_len: usize) -> NoteSummary {
        NoteSummary {
            title: self.title.clone(),
            preview: preview(&self.content, max_len),
            date: self.date.clone(),
            emotions: self.emotions.clone(),
        }
    }
}

/// Single-line preview of at most `max_len` characters, with `...` appended
/// when truncated.
fn preview(content: &str, max_len: usize) -> String {
    let normalized: String = content
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let trimmed = normalized.trim();

    if trimmed.chars().count() > max_len {
        let cut: String = trimmed.chars().take(max_len).collect();
        format!("{}...", cut.trim_end())
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(content: &str) -> NoteInfo {
        NoteInfo {
            title: "t".to_string(),
            content: content.to_string(),
            date: "2024-07-21 16:00:00".to_string(),
            emotions: vec!["joy".to_string()],
        }
    }

    #[test]
    fn test_preview_flattens_newlines() {
        let summary = info("first line\nsecond line\n").to_summary(140);
        assert_eq!(summary.preview, "first line second line");
        assert_eq!(summary.emotions, vec!["joy"]);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let summary = info("héllo wörld").to_summary(5);
        assert_eq!(summary.preview, "héllo...");
    }

    #[test]
    fn test_meta_json_shape() {
        let meta = NoteMeta {
            date: "2024-07-21 16:00:00".to_string(),
            emotions: vec!["fear".to_string()],
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"date": "2024-07-21 16:00:00", "emotion": ["fear"]})
        );
    }
}
