//! Text helpers for chat replies and phone keys

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

const GREETINGS: &[&str] = &["hi", "hello", "hey", "greetings"];

/// Lowercase, accents removed (NFKD), punctuation dropped, whitespace collapsed
///
/// # Examples
/// ```
/// use wati_journey_sync::utils::normalization::normalize_text;
///
/// assert_eq!(normalize_text("  Hello!!  "), "hello");
/// assert_eq!(normalize_text("Café, 2 BHK"), "cafe 2 bhk");
/// ```
pub fn normalize_text(input: &str) -> String {
    input
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F600..=0x1F64F // emoticons
            | 0x1F300..=0x1F5FF // symbols & pictographs
            | 0x1F680..=0x1F6FF // transport & map
            | 0x1F1E0..=0x1F1FF // flags
    )
}

/// Removes emoji so button labels like "🏠 Rent" compare as "Rent"
pub fn strip_emoji(text: &str) -> String {
    text.chars().filter(|c| !is_emoji(*c)).collect()
}

/// A bare greeting ("Hi", "hello!") carries no journey information
pub fn is_greeting(text: &str) -> bool {
    let normalized = normalize_text(text);
    GREETINGS.contains(&normalized.as_str())
}

/// Keeps digits and one leading `+`; WATI sends `waId` without separators but
/// other sources may not
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }
    if trimmed.starts_with('+') {
        format!("+{}", digits)
    } else {
        digits
    }
}

/// Truncates on a char boundary for log previews
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_emoji() {
        assert_eq!(strip_emoji("🏠 Rent").trim(), "Rent");
        assert_eq!(strip_emoji("Buy/Sell 🚀🇮🇳"), "Buy/Sell ");
        assert_eq!(strip_emoji("2 BHK"), "2 BHK");
    }

    #[test]
    fn test_is_greeting() {
        assert!(is_greeting("Hi"));
        assert!(is_greeting("  hello!! "));
        assert!(is_greeting("Hey."));
        assert!(!is_greeting("Hi, interested in 2BR"));
        assert!(!is_greeting("Rent"));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+1 555-0001"), "+15550001");
        assert_eq!(normalize_phone("919876543210"), "919876543210");
        assert_eq!(normalize_phone("  "), "");
        assert_eq!(normalize_phone("abc"), "");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("Olá mundo", 3), "Olá...");
    }
}
