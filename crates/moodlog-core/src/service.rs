use chrono::NaiveDate;
use regex::RegexBuilder;

use crate::{
    count_emotions, normalize_labels, EmotionCount, EmotionPredictor, Error, NoteInfo, NoteQuery,
    NoteStore, NoteSummary, Period, SortOrder,
};

const PREVIEW_LEN: usize = 140;

/// The main service that contains all business logic.
/// Generic over the note store implementation.
pub struct MoodlogService<S: NoteStore> {
    store: S,
}

impl<S: NoteStore> MoodlogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create or overwrite a note. Labels are only replaced when given.
    pub fn save_note(
        &self,
        title: &str,
        content: &str,
        emotions: Option<Vec<String>>,
    ) -> Result<String, Error> {
        self.store
            .upsert(title, content, emotions.map(normalize_labels))
    }

    pub fn rename_note(&self, old_title: &str, new_title: &str) -> Result<String, Error> {
        self.store.rename(old_title, new_title)
    }

    pub fn delete_note(&self, title: &str) -> Result<(), Error> {
        self.store.delete(title)
    }

    pub fn get_note(&self, title: &str) -> Result<NoteInfo, Error> {
        self.store.get_info(title)
    }

    /// List notes with optional filters, sorted per the query.
    pub fn list_notes(&self, query: NoteQuery) -> Result<Vec<NoteSummary>, Error> {
        let mut notes = Vec::new();
        for title in self.matching_titles(&query)? {
            let info = self.store.get_info(&title)?;
            notes.push(info.to_summary(PREVIEW_LEN));
        }

        sort_summaries(&mut notes, query.sort);
        if query.reverse {
            notes.reverse();
        }

        if let Some(limit) = query.limit {
            if limit > 0 {
                notes.truncate(limit);
            }
        }

        Ok(notes)
    }

    /// Count notes matching the query's filters. Sorting and limit are
    /// ignored.
    pub fn count_notes(&self, query: &NoteQuery) -> Result<usize, Error> {
        Ok(self.matching_titles(query)?.len())
    }

    fn matching_titles(&self, query: &NoteQuery) -> Result<Vec<String>, Error> {
        let wanted = query.emotions.clone().map(normalize_labels);
        let mut titles = Vec::new();

        for (title, meta) in self.store.list()? {
            if let Some(ref wanted) = wanted {
                if !wanted.is_empty() && !meta.emotions.iter().any(|e| wanted.contains(e)) {
                    continue;
                }
            }
            if let Some(ref from) = query.from {
                if meta.date < *from {
                    continue;
                }
            }
            if let Some(ref to) = query.to {
                if meta.date > *to {
                    continue;
                }
            }
            titles.push(title);
        }

        Ok(titles)
    }

    /// Search titles and content by regex, newest first.
    pub fn search(&self, pattern: &str, case_sensitive: bool) -> Result<Vec<NoteSummary>, Error> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| Error::Validation(format!("invalid regex: {}", e)))?;

        let mut notes = Vec::new();
        for title in self.store.list()?.into_keys() {
            let info = self.store.get_info(&title)?;
            if regex.is_match(&info.title) || regex.is_match(&info.content) {
                notes.push(info.to_summary(PREVIEW_LEN));
            }
        }

        sort_summaries(&mut notes, SortOrder::Date);
        Ok(notes)
    }

    /// Classify a note's content and store the resulting labels.
    ///
    /// With a threshold, every label reaching it is stored; otherwise the
    /// single most likely one.
    pub fn analyze_note<P: EmotionPredictor + ?Sized>(
        &self,
        title: &str,
        predictor: &P,
        threshold: Option<f64>,
    ) -> Result<Vec<String>, Error> {
        let info = self.store.get_info(title)?;

        let emotions = match threshold {
            Some(threshold) => predictor.predict_above(&info.content, threshold)?,
            None => vec![predictor.predict(&info.content)?],
        };
        let labels: Vec<String> = emotions.iter().map(|e| e.to_string()).collect();

        tracing::info!(title = %info.title, labels = ?labels, "analyzed note");
        self.store
            .upsert(&info.title, &info.content, Some(labels.clone()))?;
        Ok(labels)
    }

    /// Count emotion labels for notes in the period around `anchor`.
    pub fn emotion_stats(&self, period: Period, anchor: NaiveDate) -> Result<Vec<EmotionCount>, Error> {
        let index = self.store.list()?;
        Ok(count_emotions(index.values(), period, anchor))
    }
}

fn sort_summaries(notes: &mut [NoteSummary], sort: SortOrder) {
    match sort {
        SortOrder::Date => notes.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| a.title.cmp(&b.title))
        }),
        SortOrder::Title => notes.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title))
        }),
    }
}
