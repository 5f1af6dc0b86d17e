//! BIP-32 textual path parsing: `[m/]level(h|H|')?[/level...]`

use solvault_core::{DerivationScheme, VaultError, VaultResult};

/// Bit 31: hardened child index.
pub const HARDENED: u32 = 0x8000_0000;

/// An ordered list of child indices. Indices carry the hardened bit as parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    indices: Vec<u32>,
}

impl DerivationPath {
    /// Parse a textual path. `m/` is optional unless `require_root` is set.
    pub fn parse(input: &str, require_root: bool) -> VaultResult<Self> {
        let trimmed = input.trim();
        let body = match trimmed.strip_prefix("m/").or_else(|| trimmed.strip_prefix("M/")) {
            Some(rest) => rest,
            None if trimmed == "m" || trimmed == "M" => "",
            None if require_root => {
                return Err(VaultError::InvalidPath(format!(
                    "path must start with m/: {trimmed:?}"
                )))
            }
            None => trimmed,
        };

        if body.is_empty() {
            return Ok(Self { indices: Vec::new() });
        }

        let indices = body
            .split('/')
            .map(parse_level)
            .collect::<VaultResult<Vec<_>>>()?;
        Ok(Self { indices })
    }

    /// Build from raw indices, forcing every level hardened.
    pub fn hardened(indices: &[u32]) -> Self {
        Self {
            indices: indices.iter().map(|i| i | HARDENED).collect(),
        }
    }

    pub fn for_scheme(scheme: DerivationScheme, account: u32) -> Self {
        Self::hardened(&scheme.indices(account))
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn depth(&self) -> usize {
        self.indices.len()
    }

    pub fn is_fully_hardened(&self) -> bool {
        self.indices.iter().all(|i| i & HARDENED != 0)
    }

    /// Copy of this path with bit 31 set on every level.
    pub fn to_hardened(&self) -> Self {
        Self::hardened(&self.indices)
    }
}

impl std::fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("m")?;
        for idx in &self.indices {
            if idx & HARDENED != 0 {
                write!(f, "/{}'", idx & !HARDENED)?;
            } else {
                write!(f, "/{idx}")?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for DerivationPath {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, false)
    }
}

fn parse_level(level: &str) -> VaultResult<u32> {
    let digits_end = level
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(level.len());
    let (digits, modifier) = level.split_at(digits_end);

    if digits.is_empty() {
        return Err(VaultError::InvalidPath(format!("non-numeric level {level:?}")));
    }

    let hardened = match modifier {
        "" => false,
        "'" | "h" | "H" => true,
        other => return Err(VaultError::InvalidModifier(other.to_string())),
    };

    let index: u64 = digits
        .parse()
        .map_err(|_| VaultError::InvalidChildIndex(digits.to_string()))?;
    if index >= HARDENED as u64 {
        return Err(VaultError::InvalidChildIndex(digits.to_string()));
    }
    let index = index as u32;

    Ok(if hardened { index | HARDENED } else { index })
}
