//! Local text measurements: word counts for statistics and a rough token
//! estimator for providers without a counting endpoint.

/// Returns `true` for characters of scripts written without spaces
/// (CJK ideographs, kana, hangul).
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'   // hiragana, katakana
        | '\u{3400}'..='\u{4DBF}' // CJK extension A
        | '\u{4E00}'..='\u{9FFF}' // CJK unified ideographs
        | '\u{AC00}'..='\u{D7AF}' // hangul syllables
        | '\u{F900}'..='\u{FAFF}' // CJK compatibility ideographs
        | '\u{20000}'..='\u{2A6DF}'
    )
}

/// Counts words the way the statistics expect them.
///
/// Whitespace-separated words count once; every CJK character counts as a
/// word of its own.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .map(|word| {
            let cjk = word.chars().filter(|c| is_cjk(*c)).count();
            let has_other = word.chars().any(|c| c.is_alphanumeric() && !is_cjk(c));
            cjk + usize::from(has_other)
        })
        .sum()
}

/// Estimates the number of tokens a model would see for `text`.
///
/// Roughly four characters per token for alphabetic scripts and one token per
/// CJK character.
pub fn estimate_tokens(text: &str) -> u32 {
    let (cjk, other) = text.chars().fold((0usize, 0usize), |(cjk, other), c| {
        if is_cjk(c) {
            (cjk + 1, other)
        } else {
            (cjk, other + 1)
        }
    });

    (cjk + other.div_ceil(4)) as u32
}
