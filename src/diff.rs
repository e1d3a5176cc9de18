/// Result of checking one reference position against the typed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharMark {
    pub expected: char,
    /// `None` when the answer ran out before this position.
    pub typed: Option<char>,
    pub correct: bool,
}

impl CharMark {
    /// The character to show for this position: what was typed, or the
    /// expected one when it is missing.
    pub fn shown(&self) -> char {
        self.typed.unwrap_or(self.expected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerDiff {
    pub marks: Vec<CharMark>,
    /// Typed characters past the end of the reference. Not scored.
    pub extra: String,
    pub mismatches: usize,
}

impl AnswerDiff {
    pub fn reference_len(&self) -> usize {
        self.marks.len()
    }

    /// Mismatches as a percentage of the reference length.
    ///
    /// An empty reference has nothing to get wrong and reports 0.
    pub fn mismatch_percent(&self) -> f64 {
        if self.marks.is_empty() {
            return 0.0;
        }
        self.mismatches as f64 / self.marks.len() as f64 * 100.0
    }

    pub fn mismatch_percent_rounded(&self) -> u32 {
        self.mismatch_percent().round() as u32
    }

    pub fn accuracy_percent(&self) -> f64 {
        100.0 - self.mismatch_percent()
    }

    pub fn is_perfect(&self) -> bool {
        self.mismatches == 0
    }
}

fn same_letter(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Compare `typed` against `reference` one character at a time, ignoring
/// case. Missing trailing characters count as mismatches.
pub fn compare(reference: &str, typed: &str) -> AnswerDiff {
    let mut typed_chars = typed.trim().chars();
    let mut marks = Vec::with_capacity(reference.len());
    let mut mismatches = 0;

    for expected in reference.chars() {
        let typed = typed_chars.next();
        let correct = typed.is_some_and(|t| same_letter(t, expected));
        if !correct {
            mismatches += 1;
        }
        marks.push(CharMark {
            expected,
            typed,
            correct,
        });
    }

    AnswerDiff {
        marks,
        extra: typed_chars.collect(),
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_all_green() {
        let diff = compare("cat", "cat");
        assert_eq!(diff.mismatches, 0);
        assert_eq!(diff.mismatch_percent(), 0.0);
        assert!(diff.marks.iter().all(|m| m.correct));
        assert!(diff.is_perfect());
    }

    #[test]
    fn one_wrong_letter_is_a_third() {
        let diff = compare("cat", "cbt");
        assert_eq!(diff.mismatches, 1);
        assert_eq!(diff.mismatch_percent_rounded(), 33);
        assert!(!diff.marks[1].correct);
        assert_eq!(diff.marks[1].typed, Some('b'));
        assert_eq!(diff.marks[1].expected, 'a');
    }

    #[test]
    fn empty_answer_misses_everything() {
        let diff = compare("cat", "");
        assert_eq!(diff.mismatches, 3);
        assert_eq!(diff.mismatch_percent(), 100.0);
        assert!(diff.marks.iter().all(|m| m.typed.is_none()));
        assert_eq!(diff.marks[2].shown(), 't');
    }

    #[test]
    fn short_answer_counts_missing_tail() {
        let diff = compare("elephant", "elep");
        assert_eq!(diff.mismatches, 4);
        assert_eq!(diff.mismatch_percent(), 50.0);
    }

    #[test]
    fn case_is_ignored() {
        let diff = compare("Apple", "aPPLE");
        assert!(diff.is_perfect());
    }

    #[test]
    fn extra_characters_are_not_scored() {
        let diff = compare("cat", "cats!");
        assert!(diff.is_perfect());
        assert_eq!(diff.extra, "s!");
        assert_eq!(diff.reference_len(), 3);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let diff = compare("dog", "  dog \n");
        assert!(diff.is_perfect());
        assert!(diff.extra.is_empty());
    }

    #[test]
    fn empty_reference_reports_zero() {
        let diff = compare("", "anything");
        assert_eq!(diff.mismatches, 0);
        assert_eq!(diff.mismatch_percent(), 0.0);
        assert_eq!(diff.extra, "anything");
    }

    #[test]
    fn non_ascii_letters_compare_per_char() {
        let diff = compare("Éclair", "éclaor");
        assert_eq!(diff.mismatches, 1);
        assert!(diff.marks[0].correct);
    }
}
