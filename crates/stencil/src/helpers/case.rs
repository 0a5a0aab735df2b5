//! Word-aware case conversion.
//!
//! Text is split into words at non-alphanumeric characters, at
//! lower-to-upper transitions (`fooBar`) and before the last capital of an
//! acronym run (`HTMLParser` is `HTML` + `Parser`). Digits stay with the word
//! they follow.

/// Split `text` into words.
pub fn split_words(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `fooBarBaz`
pub fn to_camel(text: &str) -> String {
    split_words(text)
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                word.to_lowercase()
            } else {
                capitalize(word)
            }
        })
        .collect()
}

/// `FooBarBaz`
pub fn to_pascal(text: &str) -> String {
    split_words(text).iter().map(|word| capitalize(word)).collect()
}

/// `foo_bar_baz`
pub fn to_snake(text: &str) -> String {
    join_words(text, "_", str::to_lowercase)
}

/// `foo-bar-baz`
pub fn to_kebab(text: &str) -> String {
    join_words(text, "-", str::to_lowercase)
}

/// `FOO_BAR_BAZ`
pub fn to_constant(text: &str) -> String {
    join_words(text, "_", str::to_uppercase)
}

fn join_words(text: &str, separator: &str, convert: fn(&str) -> String) -> String {
    split_words(text)
        .iter()
        .map(|word| convert(word))
        .collect::<Vec<_>>()
        .join(separator)
}
