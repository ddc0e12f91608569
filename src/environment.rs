//! Process environment as an injectable input.
//!
//! Everything that reads environment variables takes an [`EnvironmentSource`]
//! rather than calling `std::env` directly, so tests can supply a synthetic
//! environment without touching the real one.

/// Enumerable `NAME=VALUE` entries.
pub trait EnvironmentSource: Send + Sync {
    fn entries(&self) -> Vec<String>;

    /// Splits every entry on its first `=`. Entries without one are skipped.
    fn pairs(&self) -> Vec<(String, String)> {
        self.entries()
            .into_iter()
            .filter_map(|entry| {
                entry
                    .split_once('=')
                    .map(|(name, value)| (name.to_string(), value.to_string()))
            })
            .collect()
    }

    /// Last definition wins, matching how a shell resolves duplicates.
    fn var(&self, name: &str) -> Option<String> {
        self.pairs()
            .into_iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// The live environment of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    fn entries(&self) -> Vec<String> {
        std::env::vars_os()
            .map(|(name, value)| format!("{}={}", name.to_string_lossy(), value.to_string_lossy()))
            .collect()
    }
}

impl EnvironmentSource for Vec<String> {
    fn entries(&self) -> Vec<String> {
        self.clone()
    }
}

impl EnvironmentSource for [&str] {
    fn entries(&self) -> Vec<String> {
        self.iter().map(|entry| (*entry).to_string()).collect()
    }
}

impl<const N: usize> EnvironmentSource for [&str; N] {
    fn entries(&self) -> Vec<String> {
        self.as_slice().entries()
    }
}

impl<E: EnvironmentSource + ?Sized> EnvironmentSource for &E {
    fn entries(&self) -> Vec<String> {
        (**self).entries()
    }
}
