//! Prompt construction and reply parsing.

use common::{ModelCatalog, ThinkingModel};

/// Recommendation prompt: the question plus every catalog id, grouped
/// by category.
pub fn recommendation_prompt(question: &str, catalog: &ModelCatalog, count: usize) -> String {
    let mut prompt = format!(
        "User question: {question}\n\n\
         Choose the {count} thinking models best suited to analyze this question \
         from the catalog below.\n\n"
    );
    for category in catalog.categories() {
        let ids: Vec<&str> = catalog
            .filter_by_category(category)
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        prompt.push_str(&format!("{}: {}\n", category.label(), ids.join(", ")));
    }
    let example: Vec<&str> = catalog.iter().take(count).map(|m| m.id.as_str()).collect();
    prompt.push_str(&format!(
        "\nReply with exactly {count} model ids separated by commas and nothing else. \
         Example: {}\n",
        example.join(",")
    ));
    prompt
}

/// Analysis prompt built from the model's own template and metadata.
pub fn analysis_prompt(model: &ThinkingModel, question: &str) -> String {
    let mut prompt = model.render_prompt(question);
    prompt.push_str(&format!("\n\nThinking model: {}\n", model.display_name()));
    prompt.push_str(&format!("Model description: {}\n", model.description));
    if !model.applicable_scenarios.is_empty() {
        prompt.push_str(&format!("Applicable scenarios: {}\n", model.applicable_scenarios.join("、")));
    }
    prompt.push_str(
        "\nProvide a detailed analysis covering:\n\
         1. How this thinking model applies to the question\n\
         2. Concrete insights and recommendations\n\
         3. Possible courses of action\n\n\
         Answer in the same language as the question and keep it practical and specific.",
    );
    prompt
}

/// Drop `<think>...</think>` blocks some reasoning models prepend.
fn strip_reasoning(reply: &str) -> String {
    let mut out = String::with_capacity(reply.len());
    let mut rest = reply;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            // Unterminated block: nothing after it is an answer
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Extract candidate ids from a free-text reply, in order, without
/// duplicates. Nothing here checks the ids against the catalog.
pub fn parse_model_ids(reply: &str) -> Vec<String> {
    let cleaned = strip_reasoning(reply);
    let mut ids: Vec<String> = Vec::new();
    for token in cleaned.split(|c: char| c == ',' || c == '，' || c == '、' || c.is_whitespace()) {
        let id = token
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.' | '[' | ']' | '*'))
            .to_lowercase();
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::catalog::fixtures::catalog as fixture;
    use common::ModelCategory;

    #[test]
    fn test_parse_plain_list() {
        assert_eq!(
            parse_model_ids("pareto-principle,red-team, scamper"),
            vec!["pareto-principle", "red-team", "scamper"]
        );
    }

    #[test]
    fn test_parse_strips_quotes_think_blocks_and_dupes() {
        let reply = "<think>maybe eisenhower-matrix?</think>\n`first-principles`，\"red-team\" red-team";
        assert_eq!(parse_model_ids(reply), vec!["first-principles", "red-team"]);
    }

    #[test]
    fn test_parse_unterminated_think_block() {
        assert!(parse_model_ids("<think>still reasoning about scamper").is_empty());
    }

    #[test]
    fn test_recommendation_prompt_groups_by_category() {
        let catalog = fixture(&[
            ("a", ModelCategory::RiskManagement, 5),
            ("b", ModelCategory::CognitiveBias, 5),
            ("c", ModelCategory::RiskManagement, 5),
        ]);
        let prompt = recommendation_prompt("what now?", &catalog, 6);
        assert!(prompt.contains("User question: what now?"));
        assert!(prompt.contains("Risk management: a, c"));
        assert!(prompt.contains("Cognitive bias: b"));
    }

    #[test]
    fn test_analysis_prompt_uses_template() {
        let catalog = fixture(&[("a", ModelCategory::RiskManagement, 5)]);
        let model = catalog.find_by_id("a").unwrap();
        let prompt = analysis_prompt(model, "should I?");
        assert!(prompt.starts_with("Analyze with a: should I?"));
        assert!(prompt.contains("Description of a"));
        assert!(prompt.contains("planning"));
    }
}
