use std::path::Path;

const IGNORED_DIRS: &[&str] = &[".git", "node_modules"];
const MAX_FILES: usize = 200;
const HTTP_FRAMEWORK_MARKERS: &[&str] = &["express", "fastapi", "flask", "axum", "actix-web", "gin", "fiber"];
const OPENAPI_FILE_NAMES: &[&str] = &["openapi.yaml", "openapi.yml", "openapi.json", "swagger.yaml", "swagger.json"];

/// Bounded description of a cloned source tree, assembled for the AI
/// discovery/generation prompts (spec.md §4.4). Capped at `MAX_FILES`
/// paths for prompt-length safety.
#[derive(Debug, Clone, Default)]
pub struct SourceScan {
    pub file_paths: Vec<String>,
    pub truncated: bool,
    pub has_http_framework: bool,
    pub has_lambda_handler: bool,
    pub has_openapi_doc: bool,
}

pub fn scan(root: &Path) -> std::io::Result<SourceScan> {
    let mut scan = SourceScan::default();
    let mut manifest_text = String::new();

    for entry in walkdir::WalkDir::new(root).into_iter().filter_entry(|e| !is_ignored(e.path(), root)) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path()).to_string_lossy().replace('\\', "/");

        if OPENAPI_FILE_NAMES.iter().any(|name| relative.ends_with(name)) {
            scan.has_openapi_doc = true;
        }
        if is_manifest(&relative) {
            if let Ok(content) = std::fs::read_to_string(entry.path()) {
                manifest_text.push_str(&content);
            }
        }
        if looks_like_handler(&relative) {
            if let Ok(content) = std::fs::read_to_string(entry.path()) {
                if content.contains("exports.handler") || content.contains("def handler(") || content.contains("func Handler(") {
                    scan.has_lambda_handler = true;
                }
            }
        }

        if scan.file_paths.len() < MAX_FILES {
            scan.file_paths.push(relative);
        } else {
            scan.truncated = true;
        }
    }

    let lower = manifest_text.to_lowercase();
    scan.has_http_framework = HTTP_FRAMEWORK_MARKERS.iter().any(|marker| lower.contains(marker));
    Ok(scan)
}

fn is_ignored(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| IGNORED_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
}

fn is_manifest(relative: &str) -> bool {
    matches!(relative, "package.json" | "requirements.txt" | "Cargo.toml" | "go.mod")
}

fn looks_like_handler(relative: &str) -> bool {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    matches!(name, "index.js" | "index.ts" | "handler.js" | "handler.ts" | "handler.py" | "main.go")
}

/// Renders the scan as the textual section embedded in the discovery and
/// fix-plan prompts.
pub fn render_for_prompt(scan: &SourceScan) -> String {
    let mut out = String::new();
    out.push_str("Files:\n");
    for path in &scan.file_paths {
        out.push_str("- ");
        out.push_str(path);
        out.push('\n');
    }
    if scan.truncated {
        out.push_str(&format!("(file list truncated at {MAX_FILES} entries)\n"));
    }
    out.push_str(&format!(
        "HTTP framework detected: {}\nLambda handler signature detected: {}\nOpenAPI document present: {}\n",
        scan.has_http_framework, scan.has_lambda_handler, scan.has_openapi_doc
    ));
    out
}
