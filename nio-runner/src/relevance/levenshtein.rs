// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Returns the number of single-character insertions, deletions and substitutions needed to turn
/// `a` into `b`.
///
/// Characters are Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, a_char) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(a_char != *b_char);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use test_strategy::proptest;

    #[test_case("kitten", "sitting", 3; "kitten sitting")]
    #[test_case("flaw", "lawn", 2; "flaw lawn")]
    #[test_case("", "", 0; "both empty")]
    #[test_case("abc", "", 3; "to empty")]
    #[test_case("Foo.bar", "Foo.baz", 1; "near miss")]
    #[test_case("héllo", "hello", 1; "non-ascii")]
    fn reference_distances(a: &str, b: &str, expected: usize) {
        assert_eq!(levenshtein(a, b), expected);
        assert_eq!(levenshtein(b, a), expected);
    }

    #[proptest(cases = 256)]
    fn identity(#[strategy("\\PC{0,12}")] a: String) {
        proptest::prop_assert_eq!(levenshtein(&a, &a), 0);
        proptest::prop_assert_eq!(levenshtein(&a, ""), a.chars().count());
    }

    #[proptest(cases = 256)]
    fn symmetric(#[strategy("[a-d]{0,8}")] a: String, #[strategy("[a-d]{0,8}")] b: String) {
        proptest::prop_assert_eq!(levenshtein(&a, &b), levenshtein(&b, &a));
    }

    #[proptest(cases = 256)]
    fn triangle_inequality(
        #[strategy("[a-c]{0,6}")] a: String,
        #[strategy("[a-c]{0,6}")] b: String,
        #[strategy("[a-c]{0,6}")] c: String,
    ) {
        proptest::prop_assert!(levenshtein(&a, &c) <= levenshtein(&a, &b) + levenshtein(&b, &c));
    }
}
