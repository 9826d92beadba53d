//! IaC Classifier (spec.md §4.2): a pure function from a directory
//! snapshot to one of the seven IaC kind tags. First-match-wins rule
//! order; no I/O and no async in the classification logic itself so the
//! rule order is trivially property-testable.

use std::collections::HashMap;
use std::path::Path;

use sdlc_core::IacKind;

const SAM_MARKERS: &[&str] = &["Transform: AWS::Serverless", "AWS::Serverless::Function"];
const LAMBDA_ENTRYPOINTS: &[&str] = &["index.js", "index.ts", "handler.js", "handler.ts"];

/// A filesystem snapshot: every relative file path under the scan root,
/// plus the textual content of the small set of files the classifier
/// actually needs to inspect (the rest only need to be *present*).
#[derive(Debug, Clone, Default)]
pub struct DirSnapshot {
    pub paths: Vec<String>,
    pub contents: HashMap<String, String>,
}

impl DirSnapshot {
    pub fn has_file(&self, name: &str) -> bool {
        self.paths.iter().any(|p| p == name)
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        self.paths.iter().any(|p| p.ends_with(ext))
    }

    pub fn content_of(&self, name: &str) -> Option<&str> {
        self.contents.get(name).map(String::as_str)
    }
}

/// Classify a repository (or sub-path) snapshot into an IaC kind.
/// Rule order is significant and must not be reordered: the first rule
/// that matches wins, even if a later rule would also match (spec.md §8
/// property 3 — `template.yaml` with the SAM marker alongside `cdk.json`
/// must classify as `sam`, not `cdk`).
pub fn classify(snapshot: &DirSnapshot) -> IacKind {
    if let Some(template) = template_file(snapshot) {
        if let Some(content) = snapshot.content_of(&template) {
            if SAM_MARKERS.iter().any(|marker| content.contains(marker)) {
                return IacKind::Sam;
            }
        }
        return IacKind::Cloudformation;
    }

    if snapshot.has_file("cloudformation.yaml")
        || snapshot.has_file("cloudformation.yml")
        || snapshot.has_file("stack.yaml")
    {
        return IacKind::Cloudformation;
    }

    if snapshot.has_file("cdk.json") {
        return IacKind::Cdk;
    }

    if snapshot.has_extension(".tf") {
        return IacKind::Terraform;
    }

    if snapshot.has_file("serverless.yml") || snapshot.has_file("serverless.yaml") {
        return IacKind::Serverless;
    }

    if snapshot.has_file("package.json") && LAMBDA_ENTRYPOINTS.iter().any(|f| snapshot.has_file(f)) {
        return IacKind::SimpleLambda;
    }

    IacKind::Unknown
}

fn template_file(snapshot: &DirSnapshot) -> Option<String> {
    ["template.yaml", "template.yml"]
        .into_iter()
        .find(|f| snapshot.has_file(f))
        .map(str::to_string)
}

/// Build a [`DirSnapshot`] by walking a real directory. Production
/// entry point used by the Deployment Worker and Verification Worker
/// after clone; kept separate from [`classify`] so the classification
/// logic stays I/O-free.
pub fn snapshot_dir(root: &Path) -> std::io::Result<DirSnapshot> {
    let mut snapshot = DirSnapshot::default();
    walk(root, root, &mut snapshot)?;
    Ok(snapshot)
}

fn walk(root: &Path, dir: &Path, snapshot: &mut DirSnapshot) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name();
        if file_name == ".git" || file_name == "node_modules" {
            continue;
        }
        if path.is_dir() {
            walk(root, &path, snapshot)?;
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        let is_template = matches!(
            rel.as_str(),
            "template.yaml" | "template.yml"
        );
        if is_template {
            if let Ok(content) = std::fs::read_to_string(&path) {
                snapshot.contents.insert(rel.clone(), content);
            }
        }
        snapshot.paths.push(rel);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(paths: &[&str]) -> DirSnapshot {
        DirSnapshot {
            paths: paths.iter().map(|s| s.to_string()).collect(),
            contents: HashMap::new(),
        }
    }

    #[yare::parameterized(
        sam_marker_wins_over_cdk_json = {
            &["template.yaml", "cdk.json"],
            Some(("template.yaml", "Transform: AWS::Serverless-2016-10-31")),
            IacKind::Sam,
        },
        template_without_marker_is_cloudformation = {
            &["template.yaml", "cdk.json"],
            Some(("template.yaml", "Resources:\n  Bucket:\n    Type: AWS::S3::Bucket")),
            IacKind::Cloudformation,
        },
        bare_cloudformation_file = { &["cloudformation.yaml"], None, IacKind::Cloudformation },
        cdk_json_alone = { &["cdk.json", "bin/app.ts"], None, IacKind::Cdk },
        terraform_extension = { &["main.tf", "variables.tf"], None, IacKind::Terraform },
        serverless_yml = { &["serverless.yml", "handler.js"], None, IacKind::Serverless },
        simple_lambda_with_entrypoint = { &["package.json", "index.js"], None, IacKind::SimpleLambda },
        simple_lambda_without_entrypoint_is_unknown = { &["package.json"], None, IacKind::Unknown },
        nothing_matches_is_unknown = { &["README.md"], None, IacKind::Unknown },
        terraform_does_not_shadow_earlier_sam_rule = {
            &["template.yaml", "main.tf"],
            Some(("template.yaml", "AWS::Serverless::Function")),
            IacKind::Sam,
        },
    )]
    fn classifier_rule_order(paths: &[&str], content: Option<(&str, &str)>, expected: IacKind) {
        let mut s = snapshot(paths);
        if let Some((name, text)) = content {
            s.contents.insert(name.to_string(), text.to_string());
        }
        assert_eq!(classify(&s), expected);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn classification_is_a_pure_function_of_inputs(seed in 0u32..7) {
            let cases: [&[&str]; 7] = [
                &["template.yaml"],
                &["cloudformation.yaml"],
                &["cdk.json"],
                &["main.tf"],
                &["serverless.yml"],
                &["package.json", "index.js"],
                &["README.md"],
            ];
            let s = snapshot(cases[seed as usize]);
            let a = classify(&s);
            let b = classify(&s);
            prop_assert_eq!(a, b);
        }
    }
}
