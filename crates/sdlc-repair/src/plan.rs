use std::path::Path;

use serde::Deserialize;

const IGNORED_DIRS: &[&str] = &[".git", "node_modules"];

/// Repo-relative file list only, no content (spec.md §4.5 planning phase).
pub fn list_files(root: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_entry(|e| !is_ignored(e.path(), root)) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path()).to_string_lossy().replace('\\', "/");
            files.push(relative);
        }
    }
    Ok(files)
}

fn is_ignored(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| IGNORED_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
}

/// Shape requested from the language model in the planning phase
/// (spec.md §4.5): `{summary, steps: [string], filesToModify: [path]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixPlan {
    pub summary: String,
    pub steps: Vec<String>,
    pub files_to_modify: Vec<String>,
}

pub fn validate_plan_reply(value: serde_json::Value) -> Result<FixPlan, String> {
    let plan: FixPlan = serde_json::from_value(value).map_err(|e| e.to_string())?;
    if plan.files_to_modify.is_empty() {
        return Err("filesToModify is empty".to_string());
    }
    Ok(plan)
}

pub fn render_plan_prompt(fix_instructions: &str, files: &[String], stack_info: Option<&serde_json::Value>) -> String {
    let stack_block = stack_info.map(|v| format!("Stack info: {v}\n\n")).unwrap_or_default();
    let file_list = files.iter().map(|f| format!("- {f}")).collect::<Vec<_>>().join("\n");
    format!(
        "Fix instructions:\n{fix_instructions}\n\n{stack_block}Repository files:\n{file_list}\n\n\
Return a single JSON object with exactly this shape and nothing else:\n\
{{\"summary\": string, \"steps\": [string], \"filesToModify\": [string]}}"
    )
}
