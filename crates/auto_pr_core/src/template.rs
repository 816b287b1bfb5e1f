//! Pull request titles and bodies.
//!
//! Single mode reads the body from a Markdown template with `{timestamp}` and
//! `{branch}` placeholders. Collaborator mode builds its title and body from the
//! commits the simulator produced.

use std::path::Path;

use tracing::{debug, warn};

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;

/// Title used in single mode when none is configured.
pub const DEFAULT_PR_TITLE: &str = "🚀 Auto PR Update";

/// Body used when no template file is available.
pub const DEFAULT_PR_TEMPLATE: &str = "## 🤖 Automated Pull Request

This PR was automatically created by Auto PR Creator.

### Changes
- Automated file updates
- Co-authored commit included

### Details
- **Generated:** {timestamp}
- **Branch:** {branch}

---
*This is an automated notification*
";

/// Reads the template at `path`, falling back to [`DEFAULT_PR_TEMPLATE`].
pub fn load_pr_template(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "Loaded pull request template");
            content
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No pull request template found, using default");
            DEFAULT_PR_TEMPLATE.to_string()
        }
        Err(e) => {
            warn!(path = %path.display(), "Error loading PR template: {}", e);
            DEFAULT_PR_TEMPLATE.to_string()
        }
    }
}

/// Substitutes the `{timestamp}` and `{branch}` placeholders.
pub fn render_pr_template(template: &str, timestamp: &str, branch: &str) -> String {
    template
        .replace("{timestamp}", timestamp)
        .replace("{branch}", branch)
}

pub fn collaborative_pr_title(contributor_count: usize) -> String {
    format!("🤝 Collaborative PR with {contributor_count} contributors")
}

/// Body of a collaborator mode pull request.
///
/// `contributors` should already be deduplicated.
pub fn collaborative_pr_body(contributors: &[String], total_commits: usize, branch: &str) -> String {
    let contributor_lines = contributors
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "## 🤝 Multi-Collaborator Pull Request

This PR includes contributions from {count} team members:

### 👥 Contributors
{contributor_lines}

### 📊 Summary
- **Total commits:** {total_commits}
- **Branch:** {branch}
- **Merge method:** Squash and merge

### ✅ Changes
Each contributor added their own files and made independent commits on the same branch.

---
*This PR demonstrates collaborative development workflow*
",
        count = contributors.len(),
    )
}
