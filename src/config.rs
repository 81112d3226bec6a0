pub mod file {
    use serde::Deserialize;
    use serde_inline_default::serde_inline_default;
    use thiserror::Error;

    const DEFAULT_CONFIG: &str = include_str!("../default.toml");

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("read {path}: {err}")]
        Read {
            err: std::io::Error,
            path: String,
        },

        #[error("parse {path}: {err}")]
        Parse {
            err: toml::de::Error,
            path: String,
        },
    }

    /// An envgate.toml file.
    #[derive(Deserialize, Debug)]
    #[serde(deny_unknown_fields)]
    pub struct File {
        pub description: Option<String>,
        #[serde(default)]
        pub secrets: Secrets,
        #[serde(default)]
        pub audit: Audit,
        #[serde(default, rename = "environment")]
        pub environments: Vec<Environment>,
    }

    impl Default for File {
        fn default() -> Self {
            // The default config is compiled into the program, so
            // make sure to test default() to catch panics compile-time.
            toml::from_str(DEFAULT_CONFIG).unwrap()
        }
    }

    /// A user file. Every section it sets replaces the default section wholesale.
    #[derive(Deserialize, Debug)]
    #[serde(deny_unknown_fields)]
    struct Overlay {
        description: Option<String>,
        secrets: Option<Secrets>,
        audit: Option<Audit>,
        #[serde(rename = "environment")]
        environments: Option<Vec<Environment>>,
    }

    impl File {
        pub fn default_with_user_config_file(path: &str) -> Result<Self, Error> {
            let contents = std::fs::read_to_string(path).map_err(|err| Error::Read {
                err,
                path: path.to_string(),
            })?;
            Self::default_with_user_config(&contents).map_err(|err| Error::Parse {
                err,
                path: path.to_string(),
            })
        }

        pub fn default_with_user_config(contents: &str) -> Result<Self, toml::de::Error> {
            let overlay: Overlay = toml::from_str(contents)?;
            let mut file = Self::default();

            if overlay.description.is_some() {
                file.description = overlay.description;
            }
            if let Some(secrets) = overlay.secrets {
                file.secrets = secrets;
            }
            if let Some(audit) = overlay.audit {
                file.audit = audit;
            }
            if let Some(environments) = overlay.environments {
                file.environments = environments;
            }
            Ok(file)
        }
    }

    #[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Backend {
        #[default]
        Env,
        KeyVault,
    }

    #[serde_inline_default]
    #[derive(Deserialize, Debug, Default, Clone, PartialEq)]
    #[serde(deny_unknown_fields)]
    pub struct Secrets {
        #[serde(default)]
        pub backend: Backend,
        /// Prepended to secret keys to form environment variable names.
        #[serde_inline_default(String::new())]
        pub prefix: String,
        /// Key vault name, required by the `keyvault` backend.
        pub vault: Option<String>,
    }

    #[derive(Deserialize, Debug, Default, Clone, PartialEq)]
    #[serde(deny_unknown_fields)]
    pub struct Audit {
        /// Append-only JSON lines file.
        pub path: Option<String>,
    }

    /// Coordinates are only ever named by secret; a literal `cluster` field is an unknown field.
    #[serde_inline_default]
    #[derive(Deserialize, Debug, Clone, PartialEq)]
    #[serde(deny_unknown_fields)]
    pub struct Environment {
        pub name: String,
        #[serde(default)]
        pub aliases: Vec<String>,
        pub branches: Vec<String>,
        pub cluster_secret: String,
        pub resource_group_secret: String,
        #[serde_inline_default(false)]
        pub creates_release: bool,
        #[serde_inline_default(false)]
        pub production: bool,
    }
}

pub mod runtime {
    use std::path::PathBuf;
    use thiserror::Error;
    use crate::pattern::{self, Pattern};
    use crate::profile::{self, EnvironmentProfile, ProfileTable};
    use super::file;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("environment '{environment}': {err}")]
        Pattern {
            environment: String,
            err: pattern::Error,
        },

        #[error("{0}")]
        Profiles(#[from] profile::Error),

        #[error("secrets backend 'keyvault' requires secrets.vault")]
        MissingVault,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum SecretsBackend {
        Env { prefix: String },
        KeyVault { vault: String },
    }

    /// Validated configuration, read-only for the rest of the run.
    #[derive(Debug)]
    pub struct Config {
        pub profiles: ProfileTable,
        pub secrets: SecretsBackend,
        pub audit_path: Option<PathBuf>,
    }

    impl Config {
        pub fn new(cfg: &file::File) -> Result<Self, Error> {
            let profiles = cfg
                .environments
                .iter()
                .map(profile_from_file)
                .collect::<Result<Vec<_>, _>>()?;

            let secrets = match cfg.secrets.backend {
                file::Backend::Env => SecretsBackend::Env {
                    prefix: cfg.secrets.prefix.clone(),
                },
                file::Backend::KeyVault => SecretsBackend::KeyVault {
                    vault: cfg
                        .secrets
                        .vault
                        .clone()
                        .filter(|v| !v.trim().is_empty())
                        .ok_or(Error::MissingVault)?,
                },
            };

            Ok(Self {
                profiles: ProfileTable::new(profiles)?,
                secrets,
                audit_path: cfg.audit.path.as_ref().map(PathBuf::from),
            })
        }
    }

    fn profile_from_file(env: &file::Environment) -> Result<EnvironmentProfile, Error> {
        let branch_patterns = env
            .branches
            .iter()
            .map(|p| Pattern::parse(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| Error::Pattern {
                environment: env.name.clone(),
                err,
            })?;

        Ok(EnvironmentProfile {
            name: env.name.trim().to_string(),
            aliases: env.aliases.iter().map(|a| a.trim().to_string()).collect(),
            branch_patterns,
            cluster_secret_key: env.cluster_secret.trim().to_string(),
            resource_group_secret_key: env.resource_group_secret.trim().to_string(),
            creates_release: env.creates_release,
            production: env.production,
        })
    }
}
