//! Global step catalog and recommended chain-of-thought ordering.
//!
//! The catalog is a fixed table of every analysis step the system knows how
//! to run. Its array order *is* the recommended chain-of-thought order: a
//! total order over the whole catalog, independent of which purpose or
//! objectives selected a step. Purpose and objective mappings below pick
//! subsets out of it.

use charette_types::step::{AnalysisStep, Objective, Purpose, RequirementLevel};

/// One catalog row. The catalog position defines the recommended rank.
struct StepSpec {
    id: &'static str,
    title: &'static str,
    category: &'static str,
    description: &'static str,
    dependencies: &'static [&'static str],
    sections: &'static [&'static str],
}

/// The full step catalog in recommended chain-of-thought order.
///
/// Earlier steps establish context (documents, requirements, site); later
/// steps consume it (design, program, cost, packaging).
const CATALOG: &[StepSpec] = &[
    StepSpec {
        id: "document_analyzer",
        title: "Document Analysis",
        category: "context",
        description: "Digest the provided project brief and supporting documents \
                      into a working summary of the commission.",
        dependencies: &[],
        sections: &["Document Overview", "Key Requirements", "Open Questions"],
    },
    StepSpec {
        id: "requirement_analyzer",
        title: "Requirement Analysis",
        category: "context",
        description: "Extract explicit and implicit client requirements and rank \
                      them by priority.",
        dependencies: &[],
        sections: &["Explicit Requirements", "Implicit Requirements", "Priority Ranking"],
    },
    StepSpec {
        id: "task_comprehension",
        title: "Task Comprehension",
        category: "context",
        description: "Restate the commission in the team's own words and define \
                      success criteria.",
        dependencies: &[],
        sections: &["Problem Statement", "Success Criteria", "Constraints"],
    },
    StepSpec {
        id: "site_environment_analysis",
        title: "Site & Environment Analysis",
        category: "site",
        description: "Analyze the site's physical context: topography, climate, \
                      access, views, and surroundings.",
        dependencies: &[],
        sections: &["Site Context", "Environmental Conditions", "Opportunities", "Risks"],
    },
    StepSpec {
        id: "site_regulation_analysis",
        title: "Site Regulation Analysis",
        category: "site",
        description: "Review zoning, land-use designations, and statutory limits \
                      applying to the site.",
        dependencies: &["site_environment_analysis"],
        sections: &["Zoning Summary", "Statutory Limits", "Approval Path"],
    },
    StepSpec {
        id: "compliance_analyzer",
        title: "Compliance Analysis",
        category: "site",
        description: "Check the emerging brief against building codes and \
                      accessibility standards.",
        dependencies: &["site_regulation_analysis"],
        sections: &["Code Findings", "Accessibility", "Remediation Items"],
    },
    StepSpec {
        id: "risk_strategist",
        title: "Risk Strategy",
        category: "site",
        description: "Identify project risks across regulatory, technical, and \
                      market dimensions and propose mitigations.",
        dependencies: &[],
        sections: &["Risk Register", "Mitigation Strategies", "Residual Risk"],
    },
    StepSpec {
        id: "precedent_benchmarking",
        title: "Precedent Benchmarking",
        category: "design",
        description: "Survey comparable built projects and distill applicable \
                      lessons.",
        dependencies: &[],
        sections: &["Selected Precedents", "Comparative Analysis", "Lessons Applied"],
    },
    StepSpec {
        id: "competitor_analyzer",
        title: "Competitor Analysis",
        category: "design",
        description: "Position the proposal against likely competing schemes or \
                      neighboring developments.",
        dependencies: &[],
        sections: &["Competitive Landscape", "Differentiators", "Positioning"],
    },
    StepSpec {
        id: "design_trend_application",
        title: "Design Trend Application",
        category: "design",
        description: "Select current design trends relevant to the building type \
                      and justify their application.",
        dependencies: &[],
        sections: &["Relevant Trends", "Application Strategy", "Rejected Trends"],
    },
    StepSpec {
        id: "mass_strategy",
        title: "Massing Strategy",
        category: "design",
        description: "Develop massing options responding to site constraints and \
                      program volume.",
        dependencies: &["site_environment_analysis"],
        sections: &["Massing Options", "Evaluation", "Preferred Option"],
    },
    StepSpec {
        id: "concept_development",
        title: "Concept Development",
        category: "design",
        description: "Articulate the central design concept and its narrative.",
        dependencies: &[],
        sections: &["Concept Statement", "Design Narrative", "Key Moves"],
    },
    StepSpec {
        id: "flexible_space_strategy",
        title: "Flexible Space Strategy",
        category: "program",
        description: "Plan for adaptability: multi-use spaces, future conversion, \
                      and phased fit-out.",
        dependencies: &[],
        sections: &["Flexibility Goals", "Spatial Tactics", "Trade-offs"],
    },
    StepSpec {
        id: "area_programming",
        title: "Area Programming",
        category: "program",
        description: "Translate requirements into a quantified area program by \
                      use and floor.",
        dependencies: &[],
        sections: &["Program Table", "Area Assumptions", "Efficiency Targets"],
    },
    StepSpec {
        id: "schematic_space_plan",
        title: "Schematic Space Plan",
        category: "program",
        description: "Lay out the area program schematically across the massing.",
        dependencies: &["area_programming"],
        sections: &["Stacking Diagram", "Floor Narratives", "Adjacency Notes"],
    },
    StepSpec {
        id: "ux_circulation_simulation",
        title: "UX & Circulation Simulation",
        category: "program",
        description: "Walk through primary user journeys and circulation flows to \
                      surface friction points.",
        dependencies: &["schematic_space_plan"],
        sections: &["User Journeys", "Circulation Findings", "Design Adjustments"],
    },
    StepSpec {
        id: "structure_technology_analysis",
        title: "Structure & Technology Analysis",
        category: "technical",
        description: "Propose structural systems and building technology suited \
                      to the massing and budget.",
        dependencies: &["mass_strategy"],
        sections: &["Structural Options", "Systems Strategy", "Cost Implications"],
    },
    StepSpec {
        id: "design_requirement_summary",
        title: "Design Requirement Summary",
        category: "synthesis",
        description: "Consolidate all prior findings into a single design \
                      requirement document.",
        dependencies: &[],
        sections: &["Consolidated Requirements", "Resolved Conflicts", "Outstanding Items"],
    },
    StepSpec {
        id: "cost_estimation",
        title: "Cost Estimation",
        category: "cost",
        description: "Produce an order-of-magnitude cost estimate from the area \
                      program and systems strategy.",
        dependencies: &["area_programming"],
        sections: &["Cost Summary", "Basis of Estimate", "Cost Risks"],
    },
    StepSpec {
        id: "architectural_branding_identity",
        title: "Architectural Branding & Identity",
        category: "branding",
        description: "Define the project's brand identity and how the \
                      architecture expresses it.",
        dependencies: &[],
        sections: &["Brand Positioning", "Identity Elements", "Expression in Form"],
    },
    StepSpec {
        id: "action_planner",
        title: "Action Planning",
        category: "synthesis",
        description: "Sequence the next design phases into a concrete action \
                      plan with owners and milestones.",
        dependencies: &[],
        sections: &["Phase Plan", "Milestones", "Immediate Actions"],
    },
    StepSpec {
        id: "proposal_framework",
        title: "Proposal Framework",
        category: "synthesis",
        description: "Assemble the analysis into the skeleton of the final \
                      proposal document.",
        dependencies: &[],
        sections: &["Proposal Outline", "Narrative Arc", "Supporting Evidence"],
    },
];

/// Rank of a step id in the recommended chain-of-thought order.
///
/// Unknown ids return `None`; sorting places them after all ranked steps.
pub fn recommended_rank(id: &str) -> Option<usize> {
    CATALOG.iter().position(|spec| spec.id == id)
}

/// Number of steps in the global catalog.
pub fn catalog_len() -> usize {
    CATALOG.len()
}

/// All catalog step ids in recommended order.
pub fn catalog_ids() -> Vec<&'static str> {
    CATALOG.iter().map(|spec| spec.id).collect()
}

/// Materialize a catalog step with the given requirement level.
///
/// `order` is derived from the recommended rank as `(rank + 1) * 10`.
pub fn catalog_step(id: &str, requirement: RequirementLevel) -> Option<AnalysisStep> {
    let rank = recommended_rank(id)?;
    let spec = &CATALOG[rank];
    Some(AnalysisStep {
        id: spec.id.to_string(),
        title: spec.title.to_string(),
        description: spec.description.to_string(),
        order: ((rank + 1) * 10) as u32,
        requirement,
        category: spec.category.to_string(),
        dependencies: spec.dependencies.iter().map(|d| d.to_string()).collect(),
        output_sections: spec.sections.iter().map(|s| s.to_string()).collect(),
    })
}

/// Step ids always required for a purpose.
pub fn required_for(purpose: Purpose) -> &'static [&'static str] {
    match purpose {
        Purpose::Competition => &[
            "document_analyzer",
            "task_comprehension",
            "site_environment_analysis",
            "concept_development",
            "design_requirement_summary",
        ],
        Purpose::Feasibility => &[
            "document_analyzer",
            "requirement_analyzer",
            "site_environment_analysis",
            "site_regulation_analysis",
            "cost_estimation",
        ],
        Purpose::Proposal => &[
            "document_analyzer",
            "requirement_analyzer",
            "task_comprehension",
            "site_environment_analysis",
            "proposal_framework",
        ],
    }
}

/// Recommended step ids contributed by one objective.
pub fn steps_for(objective: Objective) -> &'static [&'static str] {
    match objective {
        Objective::SiteUnderstanding => &[
            "site_regulation_analysis",
            "compliance_analyzer",
            "risk_strategist",
        ],
        Objective::DesignConcept => &[
            "precedent_benchmarking",
            "design_trend_application",
            "mass_strategy",
            "concept_development",
        ],
        Objective::SpaceProgram => &[
            "area_programming",
            "schematic_space_plan",
            "flexible_space_strategy",
            "ux_circulation_simulation",
        ],
        Objective::CostPlanning => &[
            "cost_estimation",
            "structure_technology_analysis",
            "action_planner",
        ],
        Objective::Branding => &[
            "architectural_branding_identity",
            "competitor_analyzer",
            "design_trend_application",
        ],
    }
}

/// Objectives that make sense for a purpose, in display order.
pub fn available_objectives(purpose: Purpose) -> Vec<Objective> {
    match purpose {
        Purpose::Competition => vec![
            Objective::SiteUnderstanding,
            Objective::DesignConcept,
            Objective::SpaceProgram,
            Objective::Branding,
        ],
        Purpose::Feasibility => vec![
            Objective::SiteUnderstanding,
            Objective::SpaceProgram,
            Objective::CostPlanning,
        ],
        Purpose::Proposal => vec![
            Objective::SiteUnderstanding,
            Objective::DesignConcept,
            Objective::SpaceProgram,
            Objective::CostPlanning,
            Objective::Branding,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ids_unique() {
        let ids = catalog_ids();
        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
    }

    #[test]
    fn test_catalog_dependencies_resolve() {
        for id in catalog_ids() {
            let step = catalog_step(id, RequirementLevel::Optional).unwrap();
            for dep in &step.dependencies {
                assert!(
                    recommended_rank(dep).is_some(),
                    "step '{id}' depends on unknown '{dep}'"
                );
            }
        }
    }

    #[test]
    fn test_dependencies_rank_before_dependents() {
        for id in catalog_ids() {
            let rank = recommended_rank(id).unwrap();
            let step = catalog_step(id, RequirementLevel::Optional).unwrap();
            for dep in &step.dependencies {
                assert!(
                    recommended_rank(dep).unwrap() < rank,
                    "dependency '{dep}' ranks after '{id}'"
                );
            }
        }
    }

    #[test]
    fn test_required_and_objective_ids_exist() {
        for purpose in Purpose::ALL {
            for id in required_for(purpose) {
                assert!(recommended_rank(id).is_some(), "unknown required id '{id}'");
            }
            for objective in available_objectives(purpose) {
                for id in steps_for(objective) {
                    assert!(recommended_rank(id).is_some(), "unknown objective id '{id}'");
                }
            }
        }
    }

    #[test]
    fn test_catalog_step_order_follows_rank() {
        let first = catalog_step("document_analyzer", RequirementLevel::Required).unwrap();
        assert_eq!(first.order, 10);
        let rank = recommended_rank("cost_estimation").unwrap();
        let step = catalog_step("cost_estimation", RequirementLevel::Recommended).unwrap();
        assert_eq!(step.order, ((rank + 1) * 10) as u32);
    }

    #[test]
    fn test_unknown_id_has_no_rank() {
        assert!(recommended_rank("hyderabad_campus_expansion").is_none());
        assert!(catalog_step("nonexistent", RequirementLevel::Optional).is_none());
    }

    #[test]
    fn test_every_step_declares_output_sections() {
        for id in catalog_ids() {
            let step = catalog_step(id, RequirementLevel::Optional).unwrap();
            assert!(
                !step.output_sections.is_empty(),
                "step '{id}' has no output sections"
            );
        }
    }
}
