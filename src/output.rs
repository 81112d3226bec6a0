use std::fs::OpenOptions;
use std::io::Write;
use log::{debug, error};
use thiserror::Error;
use crate::audit::{self, AuditLog};
use crate::resolver::ResolutionResult;

#[derive(Error, Debug)]
pub enum Error {
    #[error("write step outputs to {path}: {err}")]
    Write {
        err: std::io::Error,
        path: String,
    },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("audit: {0}")]
    Audit(#[from] audit::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// `key=value` step outputs, appended to `$GITHUB_OUTPUT` when it is set.
    #[default]
    Github,
    Json,
    Yaml,
}

/// The values downstream steps consume, in a stable order.
pub fn step_outputs(result: &ResolutionResult) -> Vec<(&'static str, String)> {
    vec![
        ("should_deploy", result.should_deploy().to_string()),
        ("target_environment", result.target_environment().to_string()),
        ("cluster_name", result.cluster_name().to_string()),
        ("resource_group", result.resource_group().to_string()),
        ("create_release", result.create_release().to_string()),
        (
            "failure",
            result.failure().map(|f| f.kind().to_string()).unwrap_or_default(),
        ),
    ]
}

/// One step output in `$GITHUB_OUTPUT` syntax. Values spanning lines use the
/// `key<<DELIMITER` form, with a delimiter that does not occur in the value.
pub fn github_output(key: &str, value: &str) -> String {
    if !value.contains(['\n', '\r']) {
        return format!("{key}={value}\n");
    }

    let mut delimiter = format!("ghadelimiter_{}", &sha256::digest(value)[..16]);
    while value.contains(&delimiter) {
        delimiter.push('_');
    }
    format!("{key}<<{delimiter}\n{value}\n{delimiter}\n")
}

pub fn render(result: &ResolutionResult, format: Format) -> Result<String, Error> {
    Ok(match format {
        Format::Github => step_outputs(result)
            .into_iter()
            .map(|(key, value)| github_output(key, &value))
            .collect(),
        Format::Json => serde_json::to_string_pretty(result)? + "\n",
        Format::Yaml => serde_yaml::to_string(result)?,
    })
}

/// Print the result, or for [Format::Github] inside a runner, append it to the step output file.
pub fn write_to(result: &ResolutionResult, format: Format, github_output: Option<&str>) -> Result<(), Error> {
    let rendered = render(result, format)?;

    match (format, github_output) {
        (Format::Github, Some(path)) => {
            debug!("Appending step outputs to {path}");
            let write_err = |err: std::io::Error| Error::Write {
                err,
                path: path.to_string(),
            };
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(write_err)?
                .write_all(rendered.as_bytes())
                .map_err(write_err)
        }
        _ => {
            print!("{rendered}");
            Ok(())
        }
    }
}

/// Write the step outputs, then append the audit record to `audit_log`.
///
/// Both are attempted even if the other fails; the first error is returned.
pub fn publish(
    result: &ResolutionResult,
    format: Format,
    github_output: Option<&str>,
    audit_log: Option<&AuditLog>,
) -> Result<(), Error> {
    let written = write_to(result, format, github_output);
    if let Err(err) = &written {
        error!("Step outputs were not written: {err}");
    }
    let appended = audit_log.map_or(Ok(()), |log| log.append(result.audit_record()));
    if let Err(err) = &appended {
        error!("Audit record was not appended: {err}");
    }

    written?;
    appended?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::test::standard_table;
    use crate::resolver::resolve;
    use crate::secrets::StaticSecrets;
    use crate::trigger::{EventKind, TriggerContext};

    fn dev_result() -> ResolutionResult {
        let secrets: StaticSecrets = [("AKS_CLUSTER_DEV", "dev-cluster"), ("AKS_RESOURCE_GROUP_DEV", "dev-rg")]
            .into_iter()
            .collect();
        resolve(
            &TriggerContext::new("refs/heads/develop", EventKind::Push),
            &standard_table(),
            &secrets,
        )
    }

    #[test]
    fn github_outputs() {
        assert_eq!(
            render(&dev_result(), Format::Github).unwrap(),
            "should_deploy=true\n\
             target_environment=dev\n\
             cluster_name=dev-cluster\n\
             resource_group=dev-rg\n\
             create_release=false\n\
             failure=\n"
        );
    }

    #[test]
    fn github_outputs_on_failure_are_blank() {
        let result = resolve(
            &TriggerContext::new("refs/heads/develop", EventKind::Push),
            &standard_table(),
            &StaticSecrets::default(),
        );
        let rendered = render(&result, Format::Github).unwrap();
        assert!(rendered.contains("should_deploy=false\n"));
        assert!(rendered.contains("cluster_name=\n"));
        assert!(rendered.contains("failure=coordinates_unresolved\n"));
    }

    #[test]
    fn json_includes_audit_record() {
        let value: serde_json::Value =
            serde_json::from_str(&render(&dev_result(), Format::Json).unwrap()).unwrap();
        assert_eq!(value["should_deploy"], true);
        assert_eq!(value["target_environment"], "dev");
        assert_eq!(value["audit_record"]["git_ref"], "refs/heads/develop");
        assert_eq!(value["audit_record"]["fingerprint"].as_str().map(str::len), Some(64));
    }

    #[test]
    fn multiline_values_use_delimiters() {
        assert_eq!(github_output("failure", ""), "failure=\n");

        let rendered = github_output("cluster_name", "aks-dev\ninjected=true");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        let delimiter = lines[0].strip_prefix("cluster_name<<").unwrap();
        assert!(delimiter.starts_with("ghadelimiter_"));
        assert_eq!(&lines[1..], ["aks-dev", "injected=true", delimiter]);
    }

    #[test]
    fn multiline_secret_cannot_forge_outputs() {
        let secrets: StaticSecrets =
            [("AKS_CLUSTER_DEV", "dev-cluster\nshould_deploy=false"), ("AKS_RESOURCE_GROUP_DEV", "dev-rg")]
                .into_iter()
                .collect();
        let result = resolve(
            &TriggerContext::new("refs/heads/develop", EventKind::Push),
            &standard_table(),
            &secrets,
        );
        let rendered = render(&result, Format::Github).unwrap();
        assert!(rendered.starts_with("should_deploy=true\ntarget_environment=dev\ncluster_name<<ghadelimiter_"));
        assert!(rendered.contains("\ndev-cluster\nshould_deploy=false\nghadelimiter_"));
    }

    #[test]
    fn outputs_are_written_when_audit_log_fails() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = dir.path().join("github_output");
        // A directory cannot be opened for appending.
        let audit_log = AuditLog::new(dir.path());

        let result = publish(&dev_result(), Format::Github, outputs.to_str(), Some(&audit_log));
        assert!(matches!(result, Err(Error::Audit(_))));
        let written = std::fs::read_to_string(&outputs).unwrap();
        assert!(written.starts_with("should_deploy=true\n"));
        assert!(written.contains("cluster_name=dev-cluster\n"));
    }

    #[test]
    fn audit_is_appended_when_outputs_fail() {
        let dir = tempfile::tempdir().unwrap();
        let audit_path = dir.path().join("audit.jsonl");
        let audit_log = AuditLog::new(&audit_path);

        let result = publish(&dev_result(), Format::Github, dir.path().to_str(), Some(&audit_log));
        assert!(matches!(result, Err(Error::Write { .. })));
        let audited = std::fs::read_to_string(&audit_path).unwrap();
        assert_eq!(audited.lines().count(), 1);
        assert!(audited.contains("\"target_environment\":\"dev\""));
    }

    #[test]
    fn publish_without_audit_log() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = dir.path().join("github_output");
        publish(&dev_result(), Format::Github, outputs.to_str(), None).unwrap();
        publish(&dev_result(), Format::Github, outputs.to_str(), None).unwrap();
        let written = std::fs::read_to_string(&outputs).unwrap();
        assert_eq!(written.matches("should_deploy=true\n").count(), 2);
    }

    #[test]
    fn yaml_renders() {
        let yaml = render(&dev_result(), Format::Yaml).unwrap();
        assert!(yaml.contains("cluster_name: dev-cluster"));
    }
}
