//! Text cleaning shared by corpus preparation and the live API.
//!
//! Both call sites go through [`normalize`] so that the text the classifier
//! was trained on and the text it sees at serving time are cleaned the same way.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@[A-Za-z0-9_]+").unwrap());
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static NON_ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z\s]").unwrap());

/// English stop words (NLTK list).
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

static STOP_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

/// Check whether a lowercase token is an English stop word.
pub fn is_stop_word(token: &str) -> bool {
    STOP_SET.contains(token)
}

/// Clean raw text into a space-joined token string.
///
/// Order matters: handles and URLs are removed before punctuation is
/// stripped, otherwise `@user` would survive as `user` and links as `httpsxco`.
pub fn normalize(text: impl AsRef<str>) -> String {
    let text = text.as_ref().to_lowercase();
    let text = MENTION.replace_all(&text, "");
    let text = URL.replace_all(&text, "");
    let text = NON_ALPHA.replace_all(&text, "");

    text.split_whitespace()
        .filter(|token| !is_stop_word(token))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_mention_example() {
        assert_eq!(normalize("@company This is AMAZING!! https://x.co"), "amazing");
    }

    #[test]
    fn test_strips_handles_and_urls() {
        assert_eq!(
            normalize("@acme_support your app crashed http://bit.ly/abc123 again"),
            "app crashed"
        );
    }

    #[test]
    fn test_digits_and_punctuation_collapse() {
        assert_eq!(normalize("Waited 45 min... worst-service EVER!!!"), "waited min worstservice ever");
    }

    #[test]
    fn test_apostrophes_removed_before_stop_words() {
        // "don't" becomes "dont", which is not in the list
        assert_eq!(normalize("I don't like it"), "dont like");
    }

    #[test]
    fn test_non_ascii_letters_dropped() {
        assert_eq!(normalize("Café crème brûlée"), "caf crme brle");
    }

    #[test]
    fn test_empty_and_stop_word_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("it is what it is"), "");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(normalize("  great\t\tproduct\n\nteam  "), "great product team");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "@company This is AMAZING!! https://x.co",
            "I don't like it",
            "Waited 45 min... worst-service EVER!!!",
            "https://a.b/c @x @y",
            "loving the new update, great job @dev_team :)",
            "Café crème brûlée",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not a fixed point for {s:?}");
        }
    }

    #[test]
    fn test_no_stop_words_survive() {
        let text = STOP_WORDS.join(" ") + " service outage refund";
        let cleaned = normalize(&text);
        for token in cleaned.split(' ') {
            assert!(!is_stop_word(token), "stop word {token:?} survived");
        }

        // Contractions lose their apostrophe first, so only the plain words vanish entirely
        let plain: Vec<&str> = STOP_WORDS.iter().copied().filter(|w| !w.contains('\'')).collect();
        let text = plain.join(" ") + " service outage refund";
        assert_eq!(normalize(&text), "service outage refund");
    }
}
