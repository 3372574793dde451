//! Citation extraction from bot answers.
//!
//! Answers end with `(출처: file.md, Section 섹션)`; the section part is
//! optional and `Source:` is accepted as well.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?:출처|[Ss]ources?)\s*:\s*([^,()]+?)\s*(?:,\s*([^()]+?)\s*)?\)")
        .expect("valid citation regex")
});

/// Suffix the instruction asks the model to append to section titles.
const SECTION_SUFFIX: &str = "섹션";

/// A source reference found in an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub file_name: String,
    pub section: Option<String>,
}

/// Extract every citation in `answer`, in order of appearance.
pub fn parse_citations(answer: &str) -> Vec<Citation> {
    CITATION_RE
        .captures_iter(answer)
        .map(|caps| {
            let file_name = caps[1].trim().to_string();
            let section = caps
                .get(2)
                .map(|m| {
                    let s = m.as_str().trim();
                    s.strip_suffix(SECTION_SUFFIX).unwrap_or(s).trim().to_string()
                })
                .filter(|s| !s.is_empty());
            Citation { file_name, section }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_and_section() {
        let citations = parse_citations(
            "네, 상담 시간은 평일 9시부터 6시까지예요. (출처: sample-knowledge.md, 기본 정보 섹션)",
        );
        assert_eq!(
            citations,
            vec![Citation {
                file_name: "sample-knowledge.md".into(),
                section: Some("기본 정보".into()),
            }]
        );
    }

    #[test]
    fn section_is_optional() {
        let citations = parse_citations("Open daily. (Source: hours.md)");
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].file_name, "hours.md");
        assert!(citations[0].section.is_none());
    }

    #[test]
    fn multiple_citations_in_order() {
        let citations = parse_citations("A (출처: a.md, X 섹션) and B (출처: b.md, Y)");
        let files: Vec<&str> = citations.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(files, ["a.md", "b.md"]);
        assert_eq!(citations[1].section.as_deref(), Some("Y"));
    }

    #[test]
    fn plain_parentheses_are_ignored() {
        assert!(parse_citations("Hours are 9-6 (weekdays only).").is_empty());
    }
}
