use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// An agent role associated with a business scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRole {
    pub name: String,
    #[serde(default)]
    pub responsibility: String,
}

/// Optional scenario description fed to the AI as extra prompt material.
/// Read-only for the workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub name: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub agents: Vec<AgentRole>,
}

impl BusinessContext {
    /// Render as a prompt section. Empty parts are skipped.
    pub fn to_prompt_section(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Business scenario: {}", self.name);
        if !self.goal.trim().is_empty() {
            let _ = writeln!(out, "Goal: {}", self.goal);
        }
        for (title, items) in [
            ("Constraints", &self.constraints),
            ("Inputs", &self.inputs),
            ("Outputs", &self.outputs),
            ("Capabilities", &self.capabilities),
        ] {
            if !items.is_empty() {
                let _ = writeln!(out, "{}: {}", title, items.join("; "));
            }
        }
        if !self.agents.is_empty() {
            let _ = writeln!(out, "Agents:");
            for agent in &self.agents {
                if agent.responsibility.is_empty() {
                    let _ = writeln!(out, "- {}", agent.name);
                } else {
                    let _ = writeln!(out, "- {}: {}", agent.name, agent.responsibility);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_section_skips_empty_parts() {
        let ctx = BusinessContext {
            name: "Factory inspection".into(),
            goal: "Find safety violations".into(),
            capabilities: vec!["vision".into(), "alerting".into()],
            agents: vec![AgentRole {
                name: "Inspector".into(),
                responsibility: "reviews captures".into(),
            }],
            ..Default::default()
        };
        let text = ctx.to_prompt_section();

        assert!(text.contains("Goal: Find safety violations"));
        assert!(text.contains("Capabilities: vision; alerting"));
        assert!(text.contains("- Inspector: reviews captures"));
        assert!(!text.contains("Constraints"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let ctx: BusinessContext = serde_json::from_str(r#"{"name":"GTM"}"#).unwrap();
        assert_eq!(ctx.name, "GTM");
        assert!(ctx.agents.is_empty());
    }
}
