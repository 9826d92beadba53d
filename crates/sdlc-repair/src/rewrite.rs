use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::plan::FixPlan;

/// Shape requested from the language model in the rewriting phase
/// (spec.md §4.5): `{files: {path: new-content}}`.
#[derive(Debug, Deserialize)]
pub struct RewriteReply {
    pub files: BTreeMap<String, String>,
}

pub fn validate_rewrite_reply(value: serde_json::Value) -> Result<RewriteReply, String> {
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Reads the current content of every file the plan names; a file that
/// does not exist yet reads as an empty string (spec.md §4.5).
pub fn read_target_files(root: &Path, plan: &FixPlan) -> std::io::Result<BTreeMap<String, String>> {
    let mut contents = BTreeMap::new();
    for path in &plan.files_to_modify {
        let content = std::fs::read_to_string(root.join(path)).unwrap_or_default();
        contents.insert(path.clone(), content);
    }
    Ok(contents)
}

pub fn render_rewrite_prompt(plan: &FixPlan, current_contents: &BTreeMap<String, String>) -> String {
    let files_block = current_contents
        .iter()
        .map(|(path, content)| format!("--- {path} ---\n{content}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Plan summary: {}\nPlan steps: {:?}\n\nCurrent file contents:\n{files_block}\n\n\
Return a single JSON object with exactly this shape and nothing else:\n\
{{\"files\": {{\"<path>\": \"<new content>\", ...}}}}",
        plan.summary, plan.steps
    )
}

/// Writes every returned file over its corresponding path, creating parent
/// directories as needed. A path the reply did not return is left
/// untouched (spec.md §4.5).
pub fn write_files(root: &Path, reply: &RewriteReply) -> std::io::Result<()> {
    for (path, content) in &reply.files {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, content)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        let plan = FixPlan { summary: "x".to_string(), steps: vec![], files_to_modify: vec!["missing.js".to_string()] };
        let contents = read_target_files(dir.path(), &plan).unwrap();
        assert_eq!(contents.get("missing.js").unwrap(), "");
    }

    #[test]
    fn write_files_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = BTreeMap::new();
        files.insert("src/nested/file.js".to_string(), "console.log(1)".to_string());
        write_files(dir.path(), &RewriteReply { files }).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("src/nested/file.js")).unwrap(), "console.log(1)");
    }

    #[test]
    fn unreturned_path_is_left_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("untouched.js"), "original").unwrap();
        write_files(dir.path(), &RewriteReply { files: BTreeMap::new() }).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("untouched.js")).unwrap(), "original");
    }
}
