use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static LEADING_THE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^the\s+").expect("static regex"));
static AND_JOINER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+and\s+").expect("static regex"));
static OF_JOINER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+of\s+").expect("static regex"));
static APOSTROPHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[‘’`´]").expect("static regex"));
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s'-]").expect("static regex"));

/// Canonical (normalized) country name to accepted alternatives.
static ALIASES: &[(&str, &[&str])] = &[
    ("united states", &["usa", "america", "us", "united states of america"]),
    ("united kingdom", &["uk", "britain", "great britain", "england"]),
    ("russia", &["russian federation"]),
    ("south korea", &["korea", "republic of korea"]),
    ("north korea", &["democratic peoples republic of korea", "dprk"]),
    ("czechia", &["czech republic"]),
    ("north macedonia", &["macedonia"]),
    ("democratic republic of the congo", &["drc", "congo drc", "dr congo"]),
    ("republic of the congo", &["congo", "congo republic", "congo-brazzaville"]),
    ("cote d'ivoire", &["ivory coast", "cote divoire"]),
    ("myanmar", &["burma"]),
    ("eswatini", &["swaziland"]),
    ("cape verde", &["cabo verde"]),
    ("east timor", &["timor-leste"]),
    ("vatican city", &["vatican", "holy see"]),
    ("united arab emirates", &["uae"]),
];

pub fn normalize_country(input: &str) -> String {
    let lowered = input.to_lowercase();
    let collapsed = WHITESPACE.replace_all(&lowered, " ");
    let trimmed = collapsed.trim();
    let without_article = LEADING_THE.replace(trimmed, "");
    let joined = AND_JOINER.replace_all(&without_article, " and ");
    let joined = OF_JOINER.replace_all(&joined, " of ");
    let apostrophes = APOSTROPHES.replace_all(&joined, "'");
    DISALLOWED.replace_all(&apostrophes, "").into_owned()
}

fn aliases_of(canonical: &str) -> Option<&'static [&'static str]> {
    ALIASES
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, alts)| *alts)
}

fn alias_match(user: &str, correct: &str) -> bool {
    let user_is_alias = aliases_of(correct).is_some_and(|alts| alts.contains(&user));
    let correct_is_alias = aliases_of(user).is_some_and(|alts| alts.contains(&correct));
    user_is_alias || correct_is_alias
}

fn partial_match(user: &str, correct: &str) -> bool {
    if !correct.contains(' ') || user.chars().count() <= 3 {
        return false;
    }
    let user_words: Vec<&str> = user.split(' ').collect();
    correct
        .split(' ')
        .filter(|word| word.chars().count() > 3)
        .any(|word| user_words.contains(&word))
}

pub fn judge(user_text: &str, correct_country: &str) -> bool {
    let user = normalize_country(user_text);
    let correct = normalize_country(correct_country);

    user == correct || alias_match(&user, &correct) || partial_match(&user, &correct)
}
