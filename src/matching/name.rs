// src/matching/name.rs - Weak and strong organization name standardization
//
// The weak form is cheap and lossless enough to deduplicate and hash names.
// The strong form strips legal suffixes, jurisdictions and stopwords and is
// only ever used to confirm a candidate pair, never to generate one.
//
// Acronym handling is ASCII-oriented: single-letter runs are recognised for
// `[a-z0-9]` only. Other scripts pass through the weak rules untouched.

use once_cell::sync::Lazy;
use regex::Regex;

/// Multi-word legal forms, listed before the single tokens they contain.
pub const LEGAL_FORM_PHRASES: [&str; 8] = [
    "kabushiki kaisha",
    "kabushikikaisha",
    "yugen kaisha",
    "godo kaisha",
    "societe anonyme",
    "naamloze vennootschap",
    "besloten vennootschap",
    "limited liability company",
];

pub const LEGAL_FORMS: [&str; 44] = [
    "corporation", "corp", "incorporated", "inc", "company", "co", "limited", "ltd",
    "llc", "llp", "lp", "plc", "gmbh", "mbh", "ag", "kg", "kgaa", "sa", "nv", "bv",
    "srl", "spa", "sarl", "sas", "ab", "oy", "oyj", "as", "asa", "pty", "pte", "bhd",
    "kk", "aktiengesellschaft", "aktiebolag", "holdings", "holding", "group", "trust",
    "cos", "companies", "enterprises", "intl", "lc",
];

pub const JURISDICTIONS: [&str; 22] = [
    "us", "usa", "uk", "gb", "de", "fr", "jp", "nl", "ch", "se", "delaware", "del",
    "ny", "nj", "ca", "tx", "il", "ma", "pa", "oh", "mi", "nv",
];

pub const STOPWORDS: [&str; 10] = ["the", "of", "and", "a", "an", "for", "und", "et", "der", "die"];

static POSSESSIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"['’]s\b").expect("possessive pattern is valid"));

// An unterminated parenthesis swallows the rest of the name.
static PAREN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*(?:\)|$)").expect("parenthetical pattern is valid"));

// Tails such as "; a Delaware corp", ", a corporation of Ohio" or
// " a New York corporation" that filings append to the firm name.
static POSTSCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r";|,\s*(?:a|an)\s|\s(?:a|an)\s+(?:[a-z]+\s+){0,2}(?:corporation|corp|company|limited|partnership|llc)\b",
    )
    .expect("postscript pattern is valid")
});

// Runs of single characters separated by spaces, dots, hyphens or ampersands.
static ACRONYM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-z0-9](?:[\s.&\-]+[a-z0-9]\b)+\.?").expect("acronym pattern is valid")
});

static STRIP_RE: Lazy<Regex> = Lazy::new(|| {
    let alternatives: Vec<&str> = LEGAL_FORM_PHRASES
        .iter()
        .chain(LEGAL_FORMS.iter())
        .chain(JURISDICTIONS.iter())
        .chain(STOPWORDS.iter())
        .copied()
        .collect();
    Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
        .expect("strip vocabulary pattern is valid")
});

/// Lowercase, drop possessives and parentheticals, turn punctuation into
/// spaces and collapse whitespace. Projection: `weak(weak(s)) == weak(s)`.
pub fn standardize_weak(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let without_possessive = POSSESSIVE_RE.replace_all(&lowered, "");
    let without_parens = PAREN_RE.replace_all(&without_possessive, " ");
    collapse_punctuation(&without_parens)
}

/// Aggressive form used only to confirm candidate pairs. May legitimately
/// return an empty string, which never matches anything.
pub fn standardize_strong(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let truncated = truncate_postscript(&lowered);
    let without_possessive = POSSESSIVE_RE.replace_all(truncated, "");
    let without_parens = PAREN_RE.replace_all(&without_possessive, " ");
    let acronyms = collapse_acronyms(&without_parens);
    let spaced = collapse_punctuation(&acronyms);
    let stripped = STRIP_RE.replace_all(&spaced, " ");
    collapse_whitespace(&stripped)
}

fn truncate_postscript(lowered: &str) -> &str {
    match POSTSCRIPT_RE.find(lowered) {
        Some(m) => &lowered[..m.start()],
        None => lowered,
    }
}

/// "a b c" -> "abc", "a&b" -> "ab", "i.b.m." -> "ibm".
pub fn collapse_acronyms(text: &str) -> String {
    ACRONYM_RE
        .replace_all(text, |caps: &regex::Captures| {
            caps[0]
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .into_owned()
}

fn collapse_punctuation(text: &str) -> String {
    let spaced: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&spaced)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
