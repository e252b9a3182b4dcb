//! Text cleanup applied before vectorizing: tokenize, lowercase, drop
//! stop-words, lemmatize, and re-join.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// NLTK's English stop-word list.
const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

/// Clitics split off the end of a word, longest first.
const CLITICS: &[&str] = &["n't", "'ll", "'re", "'ve", "'s", "'d", "'m"];

/// Irregular plural nouns.
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("children", "child"),
    ("feet", "foot"),
    ("geese", "goose"),
    ("halves", "half"),
    ("knives", "knife"),
    ("leaves", "leaf"),
    ("lives", "life"),
    ("men", "man"),
    ("mice", "mouse"),
    ("selves", "self"),
    ("teeth", "tooth"),
    ("thieves", "thief"),
    ("wives", "wife"),
    ("wolves", "wolf"),
    ("women", "woman"),
];

/// Words ending in `s` that are not plurals.
const NOT_PLURAL: &[&str] = &[
    "always", "afterwards", "besides", "clothes", "news", "nevertheless", "perhaps", "series",
    "sometimes", "species", "towards", "whereas",
];

/// Reusable text cleaner.
pub struct Preprocessor {
    stop_words: HashSet<&'static str>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Tokenize, lowercase, drop stop-words, lemmatize, and join with
    /// single spaces.
    pub fn clean(&self, text: &str) -> String {
        tokenize(text)
            .into_iter()
            .map(|t| t.to_lowercase())
            .filter(|t| !self.stop_words.contains(t.as_str()))
            .map(|t| lemmatize(&t))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split text into word and punctuation tokens.
///
/// Whitespace separates chunks; leading and trailing punctuation becomes
/// separate tokens (a run of dots stays one token), and English clitics are
/// split off the word (`don't` -> `do n't`).
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for chunk in text.split_whitespace() {
        let chunk = chunk.replace('\u{2019}', "'");
        let chars: Vec<char> = chunk.chars().collect();

        let mut start = 0;
        while start < chars.len() && is_punct(chars[start]) {
            let run = punct_run(&chars[start..]);
            tokens.push(chars[start..start + run].iter().collect());
            start += run;
        }

        let mut end = chars.len();
        let mut trailing = Vec::new();
        while end > start && is_punct(chars[end - 1]) {
            let mut run = 1;
            if chars[end - 1] == '.' {
                while end - run > start && chars[end - run - 1] == '.' {
                    run += 1;
                }
            }
            trailing.push(chars[end - run..end].iter().collect::<String>());
            end -= run;
        }

        if end > start {
            let word: String = chars[start..end].iter().collect();
            split_clitic(&word, &mut tokens);
        }

        tokens.extend(trailing.into_iter().rev());
    }

    tokens
}

fn is_punct(c: char) -> bool {
    !c.is_alphanumeric()
}

/// Length of the punctuation token at the start of `chars`.
fn punct_run(chars: &[char]) -> usize {
    if chars[0] == '.' {
        chars.iter().take_while(|&&c| c == '.').count()
    } else {
        1
    }
}

fn split_clitic(word: &str, tokens: &mut Vec<String>) {
    let lower = word.to_lowercase();
    for clitic in CLITICS {
        if lower.len() > clitic.len() && lower.ends_with(clitic) {
            let cut = word.len() - clitic.len();
            if word.is_char_boundary(cut) {
                tokens.push(word[..cut].to_string());
                tokens.push(word[cut..].to_string());
                return;
            }
        }
    }
    tokens.push(word.to_string());
}

/// Reduce a lowercase noun to its singular form.
pub fn lemmatize(word: &str) -> String {
    if let Some((_, singular)) = IRREGULAR_PLURALS.iter().find(|(plural, _)| *plural == word) {
        return (*singular).to_string();
    }

    if word.chars().count() <= 3
        || !word.chars().all(|c| c.is_alphabetic())
        || NOT_PLURAL.contains(&word)
    {
        return word.to_string();
    }

    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }

    if let Some(stem) = word.strip_suffix("ies") {
        if stem.len() > 1 {
            return format!("{}y", stem);
        }
    }

    for suffix in ["sses", "ches", "shes", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }

    match word.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => word.to_string(),
    }
}

/// True when `text` holds only ASCII letters, digits, whitespace and
/// basic punctuation (`. , ! ? ' "`).
pub fn validate(text: &str) -> bool {
    static VALID: OnceLock<Regex> = OnceLock::new();
    VALID
        .get_or_init(|| Regex::new(r#"^[a-zA-Z0-9\s.,!?'"]+$"#).expect("static regex"))
        .is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_punctuation() {
        assert_eq!(
            tokenize("This is an example text!"),
            vec!["This", "is", "an", "example", "text", "!"]
        );
        assert_eq!(
            tokenize("\"Wait...\" she said."),
            vec!["\"", "Wait", "...", "\"", "she", "said", "."]
        );
        assert_eq!(tokenize("wow!!"), vec!["wow", "!", "!"]);
    }

    #[test]
    fn test_tokenize_clitics() {
        assert_eq!(tokenize("I don't know"), vec!["I", "do", "n't", "know"]);
        assert_eq!(
            tokenize("She's here, we'll see"),
            vec!["She", "'s", "here", ",", "we", "'ll", "see"]
        );
        assert_eq!(tokenize("can\u{2019}t"), vec!["ca", "n't"]);
    }

    #[test]
    fn test_tokenize_keeps_inner_punctuation() {
        assert_eq!(tokenize("well-being (mostly)"), vec!["well-being", "(", "mostly", ")"]);
    }

    #[test]
    fn test_clean_example() {
        let pre = Preprocessor::new();
        assert_eq!(pre.clean("This is an example text!"), "example text !");
    }

    #[test]
    fn test_clean_lemmatizes_and_lowercases() {
        let pre = Preprocessor::new();
        assert_eq!(pre.clean("My FEELINGS about the Children"), "feeling child");
    }

    #[test]
    fn test_lemmatize_rules() {
        assert_eq!(lemmatize("memories"), "memory");
        assert_eq!(lemmatize("watches"), "watch");
        assert_eq!(lemmatize("boxes"), "box");
        assert_eq!(lemmatize("classes"), "class");
        assert_eq!(lemmatize("days"), "day");
        assert_eq!(lemmatize("happiness"), "happiness");
        assert_eq!(lemmatize("nervous"), "nervous");
        assert_eq!(lemmatize("always"), "always");
        assert_eq!(lemmatize("women"), "woman");
        assert_eq!(lemmatize("yes"), "yes");
        assert_eq!(lemmatize("n't"), "n't");
    }

    #[test]
    fn test_stop_words() {
        let pre = Preprocessor::new();
        assert!(pre.stop_words.contains("the"));
        assert!(pre.stop_words.contains("wouldn't"));
        assert!(!pre.stop_words.contains("happy"));
        assert_eq!(pre.clean("The and happy"), "happy");
    }

    #[test]
    fn test_validate() {
        assert!(validate("This is a valid text with letters and punctuation."));
        assert!(!validate("Invalid text with symbols #$%^&*()"));
        assert!(!validate(""));
    }
}
