//! Prompt rendering for analysis steps.
//!
//! Builds the full prompt sent to the model: project facts, the step's
//! analysis brief, the accumulated results of earlier steps, and explicit
//! output-format instructions matching the step's declared sections. The
//! section extractor later looks for exactly the headings requested here.

use charette_core::workflow::runner::{ProjectInputs, PromptRenderer};
use charette_types::step::AnalysisStep;

/// Default renderer used by the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct BriefPromptRenderer;

impl PromptRenderer for BriefPromptRenderer {
    fn render(&self, step: &AnalysisStep, inputs: &ProjectInputs, prior_results: &str) -> String {
        let mut prompt = String::new();

        prompt.push_str(
            "You are a senior architecture analyst preparing a project brief.\n\n",
        );

        prompt.push_str("Project overview:\n");
        push_fact(&mut prompt, "Project name", &inputs.project_name);
        push_fact(&mut prompt, "Building type", &inputs.building_type);
        push_fact(&mut prompt, "Site location", &inputs.site_location);
        push_fact(&mut prompt, "Owner", &inputs.owner);
        push_fact(&mut prompt, "Site area", &inputs.site_area);
        push_fact(&mut prompt, "Project goal", &inputs.project_goal);
        prompt.push('\n');

        prompt.push_str(&format!("Analysis task: {}\n", step.title));
        if !step.description.is_empty() {
            prompt.push_str(&step.description);
            prompt.push('\n');
        }
        prompt.push('\n');

        if !prior_results.is_empty() {
            prompt.push_str("Results of earlier analysis steps:\n\n");
            prompt.push_str(prior_results);
            prompt.push_str("\n\n");
        }

        prompt.push_str(
            "Structure your answer with exactly the following markdown headings, \
             in this order, and put substantive content under each:\n\n",
        );
        for (index, section) in step.output_sections.iter().enumerate() {
            prompt.push_str(&format!("## {}. {}\n", index + 1, section));
        }

        prompt
    }
}

fn push_fact(prompt: &mut String, label: &str, value: &str) {
    if !value.is_empty() {
        prompt.push_str(&format!("- {label}: {value}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charette_types::step::RequirementLevel;

    fn step() -> AnalysisStep {
        AnalysisStep {
            id: "site_environment_analysis".into(),
            title: "Site & Environment Analysis".into(),
            description: "Analyze the site's physical and environmental context.".into(),
            order: 10,
            requirement: RequirementLevel::Required,
            category: "site".into(),
            dependencies: vec![],
            output_sections: vec!["Site Conditions".into(), "Opportunities".into()],
        }
    }

    fn inputs() -> ProjectInputs {
        ProjectInputs {
            project_name: "Riverside Commons".into(),
            building_type: "mixed-use".into(),
            site_location: "Mapo-gu, Seoul".into(),
            owner: String::new(),
            site_area: "4,200 sqm".into(),
            project_goal: "landmark mixed-use block".into(),
        }
    }

    #[test]
    fn test_prompt_embeds_inputs_and_numbered_sections() {
        let prompt = BriefPromptRenderer.render(&step(), &inputs(), "");
        assert!(prompt.contains("Riverside Commons"));
        assert!(prompt.contains("Site & Environment Analysis"));
        assert!(prompt.contains("## 1. Site Conditions"));
        assert!(prompt.contains("## 2. Opportunities"));
    }

    #[test]
    fn test_empty_facts_omitted() {
        let prompt = BriefPromptRenderer.render(&step(), &inputs(), "");
        assert!(!prompt.contains("- Owner:"));
    }

    #[test]
    fn test_prior_results_included_only_when_present() {
        let without = BriefPromptRenderer.render(&step(), &inputs(), "");
        assert!(!without.contains("earlier analysis steps"));

        let with = BriefPromptRenderer.render(
            &step(),
            &inputs(),
            "**Document Analysis**: The brief asks for six storeys.",
        );
        assert!(with.contains("earlier analysis steps"));
        assert!(with.contains("six storeys"));
    }
}
