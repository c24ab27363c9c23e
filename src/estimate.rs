/// Heuristic token estimate: whitespace-delimited word count plus a weighted
/// count of CJK ideographs, which do not whitespace-segment. This is an
/// approximation for the `usage` block only, not a real tokenizer.
pub fn estimate(text: &str) -> u64 {
    let cjk = text.chars().filter(|c| is_cjk(*c)).count() as u64;
    let without_cjk: String = text.chars().filter(|c| !is_cjk(*c)).collect();
    let words = without_cjk.split_whitespace().count() as u64;
    words + cjk * 3 / 4
}

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}
