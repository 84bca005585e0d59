use std::path::PathBuf;

use anyhow::{Context, Result};

use warbler_api::Argon2Hasher;

/// Runtime configuration, read from the environment (after `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub argon2: Option<Argon2Cost>,
}

/// Overrides for the Argon2 cost parameters. Unset variables keep the
/// library defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Cost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("WARBLER_DB_PATH").unwrap_or_else(|| "warbler.db".into());

        let memory_kib = parse_var(&lookup, "WARBLER_ARGON2_MEMORY_KIB")?;
        let iterations = parse_var(&lookup, "WARBLER_ARGON2_ITERATIONS")?;
        let parallelism = parse_var(&lookup, "WARBLER_ARGON2_PARALLELISM")?;

        let argon2 = if memory_kib.is_some() || iterations.is_some() || parallelism.is_some() {
            Some(Argon2Cost {
                memory_kib: memory_kib.unwrap_or(argon2::Params::DEFAULT_M_COST),
                iterations: iterations.unwrap_or(argon2::Params::DEFAULT_T_COST),
                parallelism: parallelism.unwrap_or(argon2::Params::DEFAULT_P_COST),
            })
        } else {
            None
        };

        Ok(Self {
            db_path: PathBuf::from(db_path),
            argon2,
        })
    }

    pub fn hasher(&self) -> Result<Argon2Hasher> {
        match self.argon2 {
            Some(cost) => Argon2Hasher::with_params(cost.memory_kib, cost.iterations, cost.parallelism)
                .context("invalid Argon2 parameters"),
            None => Ok(Argon2Hasher::new()),
        }
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Result<Option<u32>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.parse::<u32>().with_context(|| format!("{} must be an integer, got '{}'", key, v)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("warbler.db"));
        assert_eq!(cfg.argon2, None);
    }

    #[test]
    fn partial_argon2_override_keeps_other_defaults() {
        let cfg = config(&[("WARBLER_ARGON2_MEMORY_KIB", "64"), ("WARBLER_DB_PATH", "/tmp/w.db")]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/w.db"));
        assert_eq!(
            cfg.argon2,
            Some(Argon2Cost {
                memory_kib: 64,
                iterations: argon2::Params::DEFAULT_T_COST,
                parallelism: argon2::Params::DEFAULT_P_COST,
            })
        );
        assert!(cfg.hasher().is_ok());
    }

    #[test]
    fn rejects_non_numeric_cost() {
        assert!(config(&[("WARBLER_ARGON2_ITERATIONS", "many")]).is_err());
    }
}
