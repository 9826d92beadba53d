use serde::{Deserialize, Serialize};

/// IaC framework detected in a cloned repository (spec.md §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IacKind {
    SimpleLambda,
    Cloudformation,
    Sam,
    Cdk,
    Terraform,
    Serverless,
    Unknown,
}

impl IacKind {
    /// Frameworks whose native CLI would need to be shelled out to; the
    /// Deployment Worker rejects these with a specific error instead of
    /// provisioning them (spec.md Non-goals, §9 open question).
    pub fn requires_external_cli(self) -> bool {
        matches!(self, IacKind::Cdk | IacKind::Terraform | IacKind::Serverless)
    }

    pub fn is_supported(self) -> bool {
        matches!(self, IacKind::SimpleLambda | IacKind::Cloudformation | IacKind::Sam)
    }
}

impl std::fmt::Display for IacKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IacKind::SimpleLambda => "simple-lambda",
            IacKind::Cloudformation => "cloudformation",
            IacKind::Sam => "sam",
            IacKind::Cdk => "cdk",
            IacKind::Terraform => "terraform",
            IacKind::Serverless => "serverless",
            IacKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        simple_lambda = { IacKind::SimpleLambda, "simple-lambda" },
        cloudformation = { IacKind::Cloudformation, "cloudformation" },
        sam = { IacKind::Sam, "sam" },
        cdk = { IacKind::Cdk, "cdk" },
        terraform = { IacKind::Terraform, "terraform" },
        serverless = { IacKind::Serverless, "serverless" },
        unknown = { IacKind::Unknown, "unknown" },
    )]
    fn displays_as_kebab_case(kind: IacKind, expected: &str) {
        assert_eq!(kind.to_string(), expected);
    }

    #[yare::parameterized(
        simple_lambda = { IacKind::SimpleLambda, false, true },
        cloudformation = { IacKind::Cloudformation, false, true },
        sam = { IacKind::Sam, false, true },
        cdk = { IacKind::Cdk, true, false },
        terraform = { IacKind::Terraform, true, false },
        serverless = { IacKind::Serverless, true, false },
        unknown = { IacKind::Unknown, false, false },
    )]
    fn external_cli_and_support_flags_are_mutually_consistent(kind: IacKind, requires_external_cli: bool, is_supported: bool) {
        assert_eq!(kind.requires_external_cli(), requires_external_cli);
        assert_eq!(kind.is_supported(), is_supported);
    }
}
