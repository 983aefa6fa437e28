const LOWERCASE_WORDS: [&str; 6] = ["du", "de", "le", "la", "des", "les"];

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
    }
}

fn capitalize_word(word: &str) -> String {
    let word = if LOWERCASE_WORDS.contains(&word) {
        word.to_lowercase()
    } else if word != word.to_uppercase() {
        capitalize_first(word)
    } else {
        word.to_string()
    };

    // elided article: l'/d' followed by a capitalized word
    if word.starts_with("L'") || word.starts_with("D'") {
        let (article, rest) = word.split_at(2);
        return format!("{}'{}", article[..1].to_lowercase(), capitalize_word(rest));
    }
    word
}

fn capitalize_words(part: &str) -> String {
    part.split(' ')
        .map(capitalize_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// French waterway name capitalization: articles stay lower case, all-caps words are
/// kept, other words are capitalized, the whole name starts with a capital letter.
pub fn capitalize_name(name: &str) -> String {
    let name = name
        .trim()
        .split('-')
        .map(capitalize_words)
        .collect::<Vec<_>>()
        .join("-");
    let mut chars = name.chars();
    match chars.next() {
        None => name,
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}
