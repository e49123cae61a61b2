//! Sparse binary features for the token tagger.
//!
//! Each token activates a small set of named features:
//! - word form (lower case), prefixes and suffixes of 1 to 3 characters
//! - collapsed word shape (`15/04` -> `d/d`, `Total` -> `Xx`)
//! - digit, alphabetic and capitalization flags
//! - words and shapes in a window of two tokens on each side
//!
//! The previous predicted tag is added at decode time by the tagger, since it
//! depends on the decoding path.

use super::tokenizer::Token;

/// Static features for every token in the sequence.
pub fn extract_features(tokens: &[Token]) -> Vec<Vec<String>> {
    (0..tokens.len()).map(|i| features_for(tokens, i)).collect()
}

/// Feature carrying the previous tag on the decoding path.
pub fn history_feature(prev_tag: &str) -> String {
    format!("prev_tag={prev_tag}")
}

fn features_for(tokens: &[Token], i: usize) -> Vec<String> {
    let word = &tokens[i].text;
    let lower = word.to_lowercase();
    let chars: Vec<char> = lower.chars().collect();

    let mut f = vec!["bias".to_string(), format!("word={lower}"), format!("shape={}", shape(word))];

    for n in 1..=3 {
        if chars.len() >= n {
            let prefix: String = chars[..n].iter().collect();
            let suffix: String = chars[chars.len() - n..].iter().collect();
            f.push(format!("prefix{n}={prefix}"));
            f.push(format!("suffix{n}={suffix}"));
        }
    }

    if word.chars().all(|c| c.is_ascii_digit()) {
        f.push("is_digit".to_string());
        f.push(format!("digits={}", word.len().min(5)));
    }
    if word.chars().all(char::is_alphabetic) {
        f.push("is_alpha".to_string());
    }
    if word.chars().next().is_some_and(char::is_uppercase) {
        f.push("is_capitalized".to_string());
    }
    if word.chars().count() > 1 && word.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()) {
        f.push("is_all_caps".to_string());
    }

    for (offset, name) in [(-2isize, "prev2"), (-1, "prev"), (1, "next"), (2, "next2")] {
        match i.checked_add_signed(offset).and_then(|j| tokens.get(j)) {
            Some(t) => {
                f.push(format!("{name}_word={}", t.text.to_lowercase()));
                f.push(format!("{name}_shape={}", shape(&t.text)));
            }
            None if offset == -1 => f.push("BOS".to_string()),
            None if offset == 1 => f.push("EOS".to_string()),
            None => {}
        }
    }

    f
}

/// Collapsed character-class shape of a word.
fn shape(word: &str) -> String {
    let mut out = String::new();
    let mut last = None;
    for c in word.chars() {
        let class = if c.is_uppercase() {
            'X'
        } else if c.is_lowercase() {
            'x'
        } else if c.is_numeric() {
            'd'
        } else {
            c
        };
        if last != Some(class) {
            out.push(class);
            last = Some(class);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::tokenizer::tokenize;

    #[test]
    fn test_shape() {
        assert_eq!(shape("Total"), "Xx");
        assert_eq!(shape("4000"), "d");
        assert_eq!(shape("F-12345"), "X-d");
    }

    #[test]
    fn test_context_features() {
        let tokens = tokenize("Total TTC 4800");
        let features = extract_features(&tokens);

        assert_eq!(features.len(), 3);
        assert!(features[0].contains(&"BOS".to_string()));
        assert!(features[2].contains(&"prev_word=ttc".to_string()));
        assert!(features[2].contains(&"prev2_word=total".to_string()));
        assert!(features[2].contains(&"is_digit".to_string()));
        assert!(features[2].contains(&"EOS".to_string()));
    }
}
