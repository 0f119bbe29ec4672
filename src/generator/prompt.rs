//! Prompt text for the two generation steps.

use crate::generator::domain::Domain;

/// Longest package name derived from a question.
pub const MAX_PACKAGE_LEN: usize = 50;

/// Used when a question's first line has nothing usable in it.
pub const FALLBACK_PACKAGE: &str = "untitled_question";

/// Ask for an interview question in `domain`.
pub fn question_prompt(domain: Domain) -> String {
    format!(
        r#"Generate a detailed system design interview question for {} domain.
The question should:
1. Be challenging and similar to real FAANG interview questions
2. Require usage of various Data Structures and Algorithms in the solution
3. Include specific requirements and constraints
4. Be focused on scalability and distributed systems
5. Include expected throughput, latency requirements, and data volume estimates

Format the response in Markdown format."#,
        domain.description()
    )
}

/// Ask for hints on a previously generated `question`.
pub fn hints_prompt(question: &str) -> String {
    format!(
        r#"For the following system design question, generate step-by-step hints that will guide the candidate
without giving away the complete solution:

{question}

Format the response in Markdown format with clear sections and bullet points."#
    )
}

/// Directory-safe name taken from the first line of `question`.
pub fn package_name(question: &str) -> String {
    let first_line = question.lines().next().unwrap_or("");
    let cleaned: String = first_line
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();

    let mut name = cleaned
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_");

    if name.is_empty() {
        return FALLBACK_PACKAGE.to_string();
    }
    // ASCII only at this point, so byte truncation is safe.
    name.truncate(MAX_PACKAGE_LEN);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_prompt_names_domain() {
        let prompt = question_prompt(Domain::Ecommerce);
        assert!(prompt.contains("E-commerce systems like Amazon/eBay"));
        assert!(prompt.contains("Markdown"));
    }

    #[test]
    fn test_hints_prompt_embeds_question() {
        let prompt = hints_prompt("# Design a URL shortener");
        assert!(prompt.contains("# Design a URL shortener"));
        assert!(prompt.contains("without giving away the complete solution"));
    }

    #[test]
    fn test_package_name() {
        assert_eq!(
            package_name("# Design a Global   Rate-Limiter!\nBody"),
            "design_a_global_ratelimiter"
        );
        assert_eq!(package_name("***\nsecond line"), FALLBACK_PACKAGE);
        assert_eq!(package_name(""), FALLBACK_PACKAGE);

        let long = package_name(&"word ".repeat(40));
        assert_eq!(long.len(), MAX_PACKAGE_LEN);
        assert!(long.starts_with("word_word"));
    }
}
