/// Flattens source text into one compact line for a request payload.
///
/// Newlines become spaces, carriage returns are dropped and every run of
/// whitespace collapses to a single space. Idempotent.
pub fn normalize(text: &str) -> String {
    let flattened = text.replace('\n', " ").replace('\r', "");
    flattened.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_flattens_lines() {
        assert_eq!(
            normalize("line1\n// @todo check err\nline3"),
            "line1 // @todo check err line3"
        );
    }

    #[test]
    fn test_normalize_drops_carriage_returns_and_tabs() {
        assert_eq!(normalize("a\r\n\tb   c\r\n"), "a b c");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "fn main() {\r\n    println!(\"hi\");\r\n}\n",
            "<?php\n\n\n  echo  $x;\t\t// @todo\n",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once);
            assert!(!once.contains('\n'));
            assert!(!once.contains('\r'));
        }
    }
}
