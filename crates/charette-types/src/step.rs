//! Analysis step domain types for Charette.
//!
//! An [`AnalysisStep`] is one unit of analysis work: a prompt template plus
//! the ordered set of named sections the model is expected to produce.
//! Purpose and objective enums drive which catalog steps are suggested for
//! a session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// RequirementLevel
// ---------------------------------------------------------------------------

/// How strongly a step is tied to the workflow it was suggested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementLevel {
    /// Always present for the selected purpose; can never be removed.
    Required,
    /// Suggested by the selected objectives; removable.
    Recommended,
    /// Pulled in manually from the catalog; removable.
    Optional,
}

impl fmt::Display for RequirementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementLevel::Required => write!(f, "required"),
            RequirementLevel::Recommended => write!(f, "recommended"),
            RequirementLevel::Optional => write!(f, "optional"),
        }
    }
}

impl FromStr for RequirementLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "required" => Ok(RequirementLevel::Required),
            "recommended" => Ok(RequirementLevel::Recommended),
            "optional" => Ok(RequirementLevel::Optional),
            other => Err(format!("invalid requirement level: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// AnalysisStep
// ---------------------------------------------------------------------------

/// One analysis step: a stable id, display metadata, ordering, and the
/// named output sections the model is asked to produce.
///
/// Immutable by convention -- editing operations copy the step list before
/// mutating, so a failed edit never leaves a half-changed workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStep {
    /// Stable string key (e.g. "site_environment_analysis"). Unique within
    /// a workflow.
    pub id: String,
    /// Human-readable title shown in step listings.
    pub title: String,
    /// One-paragraph description of what the step analyzes.
    #[serde(default)]
    pub description: String,
    /// Position in the workflow. Renormalized to multiples of 10 on explicit
    /// reorder actions; not required to be contiguous otherwise.
    pub order: u32,
    /// Required / recommended / optional.
    pub requirement: RequirementLevel,
    /// Coarse grouping label for display (e.g. "site", "design", "cost").
    #[serde(default)]
    pub category: String,
    /// Step ids that must appear before this step in the same workflow.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Ordered section names expected in the model's answer. Drives both the
    /// prompt's output-format instructions and result extraction.
    #[serde(default)]
    pub output_sections: Vec<String>,
}

impl AnalysisStep {
    /// Whether this step may be removed by the user.
    pub fn removable(&self) -> bool {
        self.requirement != RequirementLevel::Required
    }
}

// ---------------------------------------------------------------------------
// Purpose / Objective
// ---------------------------------------------------------------------------

/// Why the analysis session exists. Selects the required step set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// Entry for a design competition.
    Competition,
    /// Development feasibility review for a site.
    Feasibility,
    /// Commercial proposal / bid package.
    Proposal,
}

impl Purpose {
    /// All purposes, in display order.
    pub const ALL: [Purpose; 3] = [
        Purpose::Competition,
        Purpose::Feasibility,
        Purpose::Proposal,
    ];

    /// Display name for selection UIs.
    pub fn display_name(&self) -> &'static str {
        match self {
            Purpose::Competition => "Design competition",
            Purpose::Feasibility => "Development feasibility",
            Purpose::Proposal => "Proposal / bid",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purpose::Competition => write!(f, "competition"),
            Purpose::Feasibility => write!(f, "feasibility"),
            Purpose::Proposal => write!(f, "proposal"),
        }
    }
}

impl FromStr for Purpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "competition" => Ok(Purpose::Competition),
            "feasibility" => Ok(Purpose::Feasibility),
            "proposal" => Ok(Purpose::Proposal),
            other => Err(format!("invalid purpose: '{other}'")),
        }
    }
}

/// What the session should emphasize. Each objective maps to extra
/// recommended steps on top of the purpose's required set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Site, regulation, and environment understanding.
    SiteUnderstanding,
    /// Concept, massing, and design direction.
    DesignConcept,
    /// Area program and space planning.
    SpaceProgram,
    /// Cost estimation and phasing.
    CostPlanning,
    /// Brand identity and positioning.
    Branding,
}

impl Objective {
    /// Display name for selection UIs.
    pub fn display_name(&self) -> &'static str {
        match self {
            Objective::SiteUnderstanding => "Site understanding",
            Objective::DesignConcept => "Design concept",
            Objective::SpaceProgram => "Space program",
            Objective::CostPlanning => "Cost planning",
            Objective::Branding => "Branding",
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::SiteUnderstanding => write!(f, "site_understanding"),
            Objective::DesignConcept => write!(f, "design_concept"),
            Objective::SpaceProgram => write!(f, "space_program"),
            Objective::CostPlanning => write!(f, "cost_planning"),
            Objective::Branding => write!(f, "branding"),
        }
    }
}

impl FromStr for Objective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "site_understanding" => Ok(Objective::SiteUnderstanding),
            "design_concept" => Ok(Objective::DesignConcept),
            "space_program" => Ok(Objective::SpaceProgram),
            "cost_planning" => Ok(Objective::CostPlanning),
            "branding" => Ok(Objective::Branding),
            other => Err(format!("invalid objective: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_level_roundtrip() {
        for level in [
            RequirementLevel::Required,
            RequirementLevel::Recommended,
            RequirementLevel::Optional,
        ] {
            let s = level.to_string();
            assert_eq!(s.parse::<RequirementLevel>().unwrap(), level);
        }
    }

    #[test]
    fn test_purpose_roundtrip() {
        for purpose in Purpose::ALL {
            let s = purpose.to_string();
            assert_eq!(s.parse::<Purpose>().unwrap(), purpose);
        }
    }

    #[test]
    fn test_objective_roundtrip() {
        for objective in [
            Objective::SiteUnderstanding,
            Objective::DesignConcept,
            Objective::SpaceProgram,
            Objective::CostPlanning,
            Objective::Branding,
        ] {
            let s = objective.to_string();
            assert_eq!(s.parse::<Objective>().unwrap(), objective);
        }
    }

    #[test]
    fn test_required_step_not_removable() {
        let step = AnalysisStep {
            id: "site_environment_analysis".into(),
            title: "Site & Environment Analysis".into(),
            description: String::new(),
            order: 10,
            requirement: RequirementLevel::Required,
            category: "site".into(),
            dependencies: vec![],
            output_sections: vec![],
        };
        assert!(!step.removable());
    }

    #[test]
    fn test_invalid_purpose_rejected() {
        assert!("renovation".parse::<Purpose>().is_err());
    }
}
