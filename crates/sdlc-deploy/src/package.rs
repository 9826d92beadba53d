use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use sdlc_classify::DirSnapshot;
use sdlc_storage::ArtifactStore;

use crate::error::DeployError;

const IGNORED_DIRS: &[&str] = &[".git", "node_modules"];
const TEMPLATE_CANDIDATES: &[&str] =
    &["template.yaml", "template.yml", "cloudformation.yaml", "cloudformation.yml", "stack.yaml"];

/// Builds the filesystem snapshot the IaC classifier needs: every
/// non-ignored relative path, plus the content of the small set of
/// template files classification actually inspects (spec.md §4.2).
pub fn build_snapshot(root: &Path) -> std::io::Result<DirSnapshot> {
    let mut snapshot = DirSnapshot::default();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_entry(|e| !is_ignored(e.path(), root)) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let relative = relative.to_string_lossy().replace('\\', "/");
        if TEMPLATE_CANDIDATES.contains(&relative.as_str()) || entry.file_name() == "cdk.json" {
            if let Ok(content) = std::fs::read_to_string(entry.path()) {
                snapshot.contents.insert(relative.clone(), content);
            }
        }
        snapshot.paths.push(relative);
    }
    Ok(snapshot)
}

fn is_ignored(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| IGNORED_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
}

/// Finds the template file the classifier matched on, returning its path
/// and text content.
pub fn locate_template(root: &Path) -> Option<(PathBuf, String)> {
    TEMPLATE_CANDIDATES.iter().find_map(|name| {
        let path = root.join(name);
        std::fs::read_to_string(&path).ok().map(|content| (path, content))
    })
}

/// Zips every non-ignored file under `dir`, relative paths preserved.
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>, DeployError> {
    let mut buffer = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options: zip::write::FileOptions<()> =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for entry in walkdir::WalkDir::new(dir).into_iter().filter_entry(|e| !is_ignored(e.path(), dir)) {
            let entry = entry.map_err(|e| DeployError::PackageIntegrity(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path()).to_string_lossy().replace('\\', "/");
            writer
                .start_file(relative, options)
                .map_err(|e| DeployError::PackageIntegrity(e.to_string()))?;
            let bytes = std::fs::read(entry.path())?;
            writer.write_all(&bytes)?;
        }
        writer.finish().map_err(|e| DeployError::PackageIntegrity(e.to_string()))?;
    }
    Ok(buffer)
}

/// One SAM-declared function: its logical id and local `CodeUri`.
pub struct SamFunction {
    pub logical_id: String,
    pub code_uri: String,
}

/// Parses a SAM/CloudFormation template and returns every
/// `AWS::Serverless::Function` resource's logical id and local code
/// reference (spec.md §4.3).
pub fn find_sam_functions(template: &serde_yaml::Value) -> Result<Vec<SamFunction>, DeployError> {
    let resources = template
        .get("Resources")
        .and_then(|r| r.as_mapping())
        .ok_or_else(|| DeployError::PackageIntegrity("template has no Resources section".to_string()))?;

    let mut functions = Vec::new();
    for (logical_id, resource) in resources {
        let Some(type_tag) = resource.get("Type").and_then(|t| t.as_str()) else { continue };
        if type_tag != "AWS::Serverless::Function" {
            continue;
        }
        let logical_id = logical_id
            .as_str()
            .ok_or_else(|| DeployError::PackageIntegrity("non-string logical id".to_string()))?
            .to_string();
        let code_uri = resource
            .get("Properties")
            .and_then(|p| p.get("CodeUri"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| DeployError::PackageIntegrity(format!("{logical_id} has no CodeUri")))?
            .to_string();
        functions.push(SamFunction { logical_id, code_uri });
    }
    if functions.is_empty() {
        return Err(DeployError::PackageIntegrity("template declares no AWS::Serverless::Function resources".to_string()));
    }
    Ok(functions)
}

/// Packages each SAM function's local code directory separately, stores
/// the archives, and rewrites `CodeUri` in-memory to the stored blob's
/// URI (spec.md §4.3). Returns the rewritten template text.
pub fn package_sam(
    root: &Path,
    template_text: &str,
    artifacts: &ArtifactStore,
    session_id: &str,
) -> Result<String, DeployError> {
    let mut template: serde_yaml::Value =
        serde_yaml::from_str(template_text).map_err(|e| DeployError::PackageIntegrity(format!("malformed template: {e}")))?;
    let functions = find_sam_functions(&template)?;

    let mut blob_uris: HashMap<String, String> = HashMap::new();
    for function in &functions {
        let code_dir = root.join(&function.code_uri);
        if !code_dir.is_dir() {
            return Err(DeployError::PackageIntegrity(format!(
                "missing function code directory: {}",
                function.code_uri
            )));
        }
        let archive = zip_directory(&code_dir)?;
        let key = format!("deployments/{session_id}/functions/{}.zip", function.logical_id);
        artifacts.put(&key, &archive)?;
        blob_uris.insert(function.logical_id.clone(), artifacts.blob_uri(&key));
    }

    if let Some(resources) = template.get_mut("Resources").and_then(|r| r.as_mapping_mut()) {
        for (logical_id, resource) in resources.iter_mut() {
            let Some(logical_id) = logical_id.as_str() else { continue };
            let Some(uri) = blob_uris.get(logical_id) else { continue };
            if let Some(properties) = resource.get_mut("Properties").and_then(|p| p.as_mapping_mut()) {
                properties.insert(serde_yaml::Value::from("CodeUri"), serde_yaml::Value::from(uri.as_str()));
            }
        }
    }

    serde_yaml::to_string(&template).map_err(|e| DeployError::PackageIntegrity(format!("failed to rewrite template: {e}")))
}
