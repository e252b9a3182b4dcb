//! moodlog CLI - journal with emotion tagging.

mod config;

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use moodlog_classifier::EmotionClassifier;
use moodlog_core::{
    parse_day, parse_end_date, parse_human_date, Error, MoodlogService, NoteQuery, NoteStore,
    NoteSummary, Period, SortOrder,
};
use moodlog_files::FilesStore;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, Overrides};

#[derive(Parser)]
#[command(name = "moodlog", about = "Journal with emotion tagging", version)]
struct Cli {
    /// Notes directory
    #[arg(long, env = "MOODLOG_DIR", global = true)]
    dir: Option<PathBuf>,
    /// Classifier model (XGBoost JSON)
    #[arg(long, env = "MOODLOG_MODEL", global = true)]
    model: Option<PathBuf>,
    /// TF-IDF vectorizer (JSON)
    #[arg(long, env = "MOODLOG_VECTORIZER", global = true)]
    vectorizer: Option<PathBuf>,
    /// Config file (defaults to <config dir>/moodlog/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or overwrite a note
    Add {
        /// Note title
        #[arg(long)]
        title: String,
        /// Note content (reads from stdin if not provided)
        #[arg(long)]
        content: Option<String>,
    },
    /// Edit a note
    Edit {
        /// Note title
        #[arg(value_name = "TITLE")]
        note: String,
        /// New content (stdin is read when nothing else changes and it is not a tty)
        #[arg(long)]
        content: Option<String>,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New comma-separated emotion labels
        #[arg(long)]
        emotions: Option<String>,
    },
    /// Show one or more notes
    Show {
        /// Comma-separated note titles
        titles: String,
        /// Only show the first n lines of each note
        #[arg(short = 'n', long)]
        head: Option<usize>,
    },
    /// List notes
    Ls {
        /// Filter by comma-separated emotion labels
        #[arg(long)]
        emotion: Option<String>,
        /// Notes saved after this time (e.g. "2 days ago", "2024-01-01")
        #[arg(long)]
        from: Option<String>,
        /// Notes saved before this time
        #[arg(long)]
        to: Option<String>,
        #[arg(long, value_enum, default_value = "date")]
        sort: SortArg,
        /// Reverse the sort order
        #[arg(long)]
        reverse: bool,
        /// Number of notes to show (0 for all)
        #[arg(short = 'n', long, default_value = "100")]
        head: usize,
    },
    /// Delete one or more notes
    Rm {
        /// Comma-separated note titles
        titles: String,
    },
    /// Rename a note
    Mv { old: String, new: String },
    /// Search notes with regular expressions
    Grep {
        /// Search pattern (regex)
        pattern: String,
        /// Case-sensitive search
        #[arg(short = 'C', long)]
        case_sensitive: bool,
    },
    /// Classify a note and store its emotion labels
    Analyze {
        title: String,
        /// Store every emotion with at least this probability
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Classify text without storing anything
    Predict {
        /// Text to classify (reads from stdin if not provided)
        text: Option<String>,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Count emotion labels over a day, week or month
    Stats {
        #[arg(long, default_value = "day")]
        period: String,
        /// Any day inside the period
        #[arg(long, default_value = "today")]
        date: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Date,
    Title,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Date => SortOrder::Date,
            SortArg::Title => SortOrder::Title,
        }
    }
}

fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read from stdin")?;
    Ok(buf)
}

fn is_stdin_tty() -> bool {
    atty::is(atty::Stream::Stdin)
}

/// `edit` reads new content from stdin only when no other change was
/// requested on the command line.
fn content_from_stdin(
    content: &Option<String>,
    title: &Option<String>,
    emotions: &Option<String>,
) -> bool {
    content.is_none() && title.is_none() && emotions.is_none()
}

/// Save new content and/or labels, then rename. Returns the final title.
fn apply_edit<S: NoteStore>(
    service: &MoodlogService<S>,
    note: &str,
    content: Option<String>,
    title: Option<String>,
    emotions: Option<Vec<String>>,
) -> Result<String, Error> {
    let mut current = service.get_note(note)?.title;

    if content.is_some() || emotions.is_some() {
        let body = match content {
            Some(c) => c,
            None => service.get_note(&current)?.content,
        };
        current = service.save_note(&current, &body, emotions)?;
    }
    if let Some(new_title) = title {
        current = service.rename_note(&current, &new_title)?;
    }

    Ok(current)
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_classifier(config: &Config) -> Result<EmotionClassifier> {
    EmotionClassifier::load(&config.model_path, &config.vectorizer_path)
        .context("Failed to load emotion classifier")
}

fn print_summary(note: &NoteSummary) {
    println!(
        "{} ({}) [{}] -- {}",
        note.title,
        note.date,
        note.emotions.join(","),
        note.preview
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(
        cli.config.as_deref(),
        Overrides {
            notes_dir: cli.dir,
            model_path: cli.model,
            vectorizer_path: cli.vectorizer,
        },
    )?;
    init_logging(&config.log_filter);

    // Predicting free text needs no notes directory
    if let Commands::Predict { text, threshold } = &cli.command {
        let text = match text {
            Some(t) => t.clone(),
            None => read_stdin()?,
        };
        let classifier = load_classifier(&config)?;
        let labels = match threshold {
            Some(threshold) => classifier.predict_labels(&text, *threshold)?,
            None => vec![classifier.predict(&text)?],
        };
        let labels: Vec<String> = labels.iter().map(|e| e.to_string()).collect();
        println!("{}", labels.join(","));
        return Ok(());
    }

    let store = FilesStore::open(&config.notes_dir).with_context(|| {
        format!(
            "Failed to open notes directory {}",
            config.notes_dir.display()
        )
    })?;
    tracing::debug!(dir = %store.root().display(), "opened notes directory");
    let service = MoodlogService::new(store);

    match cli.command {
        Commands::Predict { .. } => unreachable!(),

        Commands::Add { title, content } => {
            let content = match content {
                Some(c) => c,
                None => read_stdin()?,
            };
            let title = service.save_note(&title, &content, None)?;
            println!("Saved note {}", title);
        }

        Commands::Edit {
            note,
            content,
            title,
            emotions,
        } => {
            let content = if content_from_stdin(&content, &title, &emotions) && !is_stdin_tty() {
                Some(read_stdin()?)
            } else {
                content
            };
            let emotions = emotions.map(|e| parse_list(&e));

            let mut updated_fields = Vec::new();
            if content.is_some() {
                updated_fields.push("content");
            }
            if emotions.is_some() {
                updated_fields.push("emotions");
            }
            if title.is_some() {
                updated_fields.push("title");
            }

            if updated_fields.is_empty() {
                eprintln!("Nothing to update");
                std::process::exit(1);
            }

            let current = match apply_edit(&service, &note, content, title, emotions) {
                Ok(title) => title,
                Err(Error::NotFound(_)) => {
                    eprintln!("Note {} not found", note);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            };

            println!("Edited note {}: Updated {}", current, updated_fields.join(", "));
        }

        Commands::Show { titles, head } => {
            let titles = parse_list(&titles);
            if titles.is_empty() {
                eprintln!("No note titles provided");
                std::process::exit(1);
            }

            let mut not_found = Vec::new();
            let mut first = true;

            for title in &titles {
                match service.get_note(title) {
                    Ok(note) => {
                        if !first {
                            println!("\n{}\n", "=".repeat(40));
                        }
                        first = false;

                        println!("# {}\n", note.title);

                        if let Some(n) = head {
                            let lines: Vec<&str> = note.content.lines().take(n).collect();
                            println!("{}", lines.join("\n"));
                            if note.content.lines().count() > n {
                                println!("...");
                            }
                        } else {
                            println!("{}", note.content);
                        }

                        println!("\n---\n");
                        println!("Saved: {}", note.date);
                        println!("Emotions: {}", note.emotions.join(","));
                    }
                    Err(Error::NotFound(_)) => not_found.push(title),
                    Err(e) => return Err(e.into()),
                }
            }

            if !not_found.is_empty() {
                if !first {
                    eprintln!();
                }
                for title in &not_found {
                    eprintln!("Note {} not found", title);
                }
                std::process::exit(1);
            }
        }

        Commands::Ls {
            emotion,
            from,
            to,
            sort,
            reverse,
            head,
        } => {
            let query = NoteQuery {
                emotions: emotion.map(|e| parse_list(&e)),
                from: from.map(|s| parse_human_date(&s)).transpose()?,
                to: to.map(|s| parse_end_date(&s)).transpose()?,
                sort: sort.into(),
                reverse,
                limit: Some(head),
            };
            let total = service.count_notes(&query)?;
            let notes = service.list_notes(query)?;

            for note in &notes {
                print_summary(note);
            }

            if notes.len() < total {
                println!("[Showing {}/{} notes]", notes.len(), total);
            }
        }

        Commands::Rm { titles } => {
            let titles = parse_list(&titles);
            if titles.is_empty() {
                eprintln!("No note titles provided");
                std::process::exit(1);
            }

            let mut deleted = Vec::new();
            let mut not_found = Vec::new();

            for title in &titles {
                match service.delete_note(title) {
                    Ok(()) => deleted.push(title),
                    Err(Error::NotFound(_)) => not_found.push(title),
                    Err(e) => return Err(e.into()),
                }
            }

            for title in &deleted {
                println!("Deleted note {}", title);
            }

            if !not_found.is_empty() {
                for title in &not_found {
                    eprintln!("Note {} not found", title);
                }
                std::process::exit(1);
            }
        }

        Commands::Mv { old, new } => {
            let title = service
                .rename_note(&old, &new)
                .with_context(|| format!("Failed to rename note {}", old))?;
            println!("Renamed note {} to {}", old, title);
        }

        Commands::Grep {
            pattern,
            case_sensitive,
        } => {
            for note in service.search(&pattern, case_sensitive)? {
                print_summary(&note);
            }
        }

        Commands::Analyze { title, threshold } => {
            let classifier = load_classifier(&config)?;
            let labels = service
                .analyze_note(&title, &classifier, threshold)
                .with_context(|| format!("Failed to analyze note {}", title))?;
            println!("{}: {}", title, labels.join(","));
        }

        Commands::Stats { period, date } => {
            let period: Period = period.parse()?;
            let anchor = parse_day(&date)?;
            let counts = service.emotion_stats(period, anchor)?;

            for entry in counts {
                println!(
                    "{:<9} {:>4} {}",
                    entry.emotion,
                    entry.count,
                    "#".repeat(entry.count)
                );
            }
        }
    }

    Ok(())
}
