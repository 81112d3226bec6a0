use std::collections::HashMap;
use std::env::VarError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("secret {0} is not valid unicode")]
    NotUnicode(String),
}

/// Resolves the name of a secret to its value.
///
/// `Ok(None)` means the store answered and the secret does not exist.
pub trait SecretLookup {
    fn lookup(&self, key: &str) -> Result<Option<String>, Error>;
}

impl<F> SecretLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self(key))
    }
}

/// Secrets exposed to the step as environment variables, e.g.
/// `env: { AKS_CLUSTER_DEV: ${{ secrets.AKS_CLUSTER_DEV }} }`.
#[derive(Debug, Default, Clone)]
pub struct EnvSecrets {
    pub prefix: String,
}

impl EnvSecrets {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl SecretLookup for EnvSecrets {
    fn lookup(&self, key: &str) -> Result<Option<String>, Error> {
        let name = format!("{}{}", self.prefix, key);
        match std::env::var(&name) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => Err(Error::NotUnicode(name)),
        }
    }
}

/// Fixed set of secrets held in memory, e.g. values fetched from a remote store up front.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets(HashMap<String, String>);

impl StaticSecrets {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticSecrets {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl SecretLookup for StaticSecrets {
    fn lookup(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.0.get(key).cloned())
    }
}
