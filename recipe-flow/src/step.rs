use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wizard steps in the order the user walks through them.
///
/// The declaration order is the navigation order, so `Ord` can be used to tell
/// forward from backward transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    HealthConcern,
    Demographics,
    Causes,
    Symptoms,
    Properties,
    Oils,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::HealthConcern,
        Step::Demographics,
        Step::Causes,
        Step::Symptoms,
        Step::Properties,
        Step::Oils,
    ];

    /// Route segment used under `/create-recipe/`.
    pub fn slug(&self) -> &'static str {
        match self {
            Step::HealthConcern => "health-concern",
            Step::Demographics => "demographics",
            Step::Causes => "causes",
            Step::Symptoms => "symptoms",
            Step::Properties => "properties",
            Step::Oils => "oils",
        }
    }

    pub fn next(&self) -> Option<Step> {
        let idx = Self::ALL.iter().position(|s| s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn previous(&self) -> Option<Step> {
        let idx = Self::ALL.iter().position(|s| s == self)?;
        idx.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|step| step.slug() == s)
            .copied()
            .ok_or_else(|| format!("unknown wizard step: {s}"))
    }
}
