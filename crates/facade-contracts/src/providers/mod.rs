use std::fmt;
use std::str::FromStr;

/// Which backend the session talks to. Chosen once from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Dryrun,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::Gemini, Self::OpenAi, Self::Dryrun];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Dryrun => "dryrun",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" | "gpt" => Ok(Self::OpenAi),
            "dryrun" | "dry-run" | "offline" => Ok(Self::Dryrun),
            other => Err(format!(
                "unknown provider '{other}' (expected one of: {})",
                Self::ALL
                    .iter()
                    .map(ProviderKind::name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}
