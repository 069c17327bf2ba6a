//! Name inflection for entities: declared type name -> resource name -> pluralized url segment.
//! e.g. "BlogPost" -> "blog_post" -> "blog_posts", "Address" -> "address" -> "addresses".

/// Irregular plurals checked before the suffix rules.
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
];

/// Words whose plural is the word itself.
const UNCOUNTABLE: &[&str] = &["data", "equipment", "information", "metadata", "news", "series", "sheep", "species"];

/// Convert a single identifier from CamelCase / camelCase to snake_case.
/// e.g. "BlogPost" -> "blog_post", "userId" -> "user_id", "HTTPRequest" -> "http_request"
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if i > 0 && chars[i - 1] != '_' && (prev_lower || (prev_upper && next_lower)) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// English plural of a snake_case noun. Only the last word of a compound name is inflected.
pub fn pluralize(word: &str) -> String {
    let (head, last) = match word.rfind('_') {
        Some(i) => (&word[..=i], &word[i + 1..]),
        None => ("", word),
    };
    format!("{}{}", head, pluralize_word(last))
}

fn pluralize_word(w: &str) -> String {
    let lower = w.to_lowercase();
    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return w.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }
    let ends_with_consonant_y = lower.ends_with('y')
        && lower
            .chars()
            .rev()
            .nth(1)
            .map(|c| !"aeiou".contains(c))
            .unwrap_or(false);
    if ends_with_consonant_y {
        format!("{}ies", &w[..w.len() - 1])
    } else if lower.ends_with('s')
        || lower.ends_with("sh")
        || lower.ends_with("ch")
        || lower.ends_with('x')
        || lower.ends_with('z')
    {
        format!("{}es", w)
    } else if lower.ends_with("fe") {
        format!("{}ves", &w[..w.len() - 2])
    } else {
        format!("{}s", w)
    }
}

/// JSON:API `type` (and url segment) for a declared entity name.
pub fn type_name_for(entity_name: &str) -> String {
    pluralize(&to_snake_case(entity_name))
}
