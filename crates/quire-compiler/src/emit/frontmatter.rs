/// YAML frontmatter

use crate::error::Result;
use serde::Serialize;

/// `---` delimited YAML followed by the body; always ends with one newline
pub fn with_frontmatter<T: Serialize>(frontmatter: &T, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(frontmatter)?;
    let mut out = format!("---\n{}", yaml);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("---\n");
    let body = body.trim_end();
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AgentFrontmatter, CommandFrontmatter};

    #[test]
    fn test_command_fields_in_order_and_optional_skipped() {
        let fm = CommandFrontmatter {
            name: "deploy".into(),
            description: "Deploy the app".into(),
            argument_hint: Some("[env]".into()),
            allowed_tools: vec![],
            model: None,
        };
        let out = with_frontmatter(&fm, "## Setup\n").unwrap();
        assert!(out.starts_with("---\nname: deploy\ndescription: Deploy the app\nargument-hint: "));
        assert!(!out.contains("model"));
        assert!(!out.contains("allowed-tools"));
        assert!(out.ends_with("---\n\n## Setup\n"));
    }

    #[test]
    fn test_tools_are_one_string() {
        let fm = AgentFrontmatter {
            name: "researcher".into(),
            description: "Finds things".into(),
            tools: Some("Read Grep".into()),
            color: None,
            model: None,
        };
        let out = with_frontmatter(&fm, "").unwrap();
        assert!(out.contains("\ntools: Read Grep\n"));
        assert!(out.ends_with("---\n"));
    }
}
