// Command-line surface: flags override config values, credentials resolve to project targets.

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::credentials::{discover_key_files, project_from_service_account};
use crate::report_writer::ReportFormat;
use crate::runner::{Credential, ProjectTarget};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "msstats")]
#[command(version)]
#[command(
    about = "Summarize Memorystore (Redis, Valkey, Redis Cluster) usage from Cloud Monitoring into per-project spreadsheets"
)]
pub struct Args {
    /// TOML config file
    #[arg(long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Project to report on (repeatable). Defaults to the project of each credential file
    #[arg(long = "project")]
    pub projects: Vec<String>,

    /// Service account key file (repeatable)
    #[arg(long = "credentials")]
    pub credentials: Vec<PathBuf>,

    /// Directory of service account key files (every *.json)
    #[arg(long)]
    pub credentials_dir: Option<PathBuf>,

    /// OAuth access token used for projects without a key file
    #[arg(long, env = "MSSTATS_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Lookback window in seconds
    #[arg(long)]
    pub duration: Option<u64>,

    /// Alignment step in seconds
    #[arg(long)]
    pub step: Option<u64>,

    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Prefix for output file names
    #[arg(long)]
    pub prefix: Option<String>,

    #[arg(long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Leave the run timestamp out of output file names
    #[arg(long)]
    pub no_timestamp: bool,

    /// Instances processed concurrently per project
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-project deadline in seconds
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,
}

impl Args {
    /// Loads the config file (if any), applies flag overrides and validates the result.
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from_path(path)?,
            None => AppConfig::load()?,
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(v) = self.duration {
            config.report.duration_secs = v;
        }
        if let Some(v) = self.step {
            config.report.step_secs = v;
        }
        if let Some(v) = &self.out_dir {
            config.report.output_dir = v.clone();
        }
        if let Some(v) = &self.prefix {
            config.report.prefix = Some(v.clone());
        }
        if let Some(v) = self.format {
            config.report.format = v;
        }
        if self.no_timestamp {
            config.report.timestamp_in_name = false;
        }
        if let Some(v) = self.concurrency {
            config.run.max_concurrent_instances = v;
        }
        if let Some(v) = self.deadline {
            config.run.deadline_secs = v;
        }
        if let Some(v) = self.request_timeout {
            config.monitoring.request_timeout_secs = v;
        }
    }

    /// Explicit key files first, then the sorted contents of the credentials directory.
    pub fn key_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = self.credentials.clone();
        if let Some(dir) = &self.credentials_dir {
            files.extend(discover_key_files(dir)?);
        }
        files.dedup();
        Ok(files)
    }

    /// Pairs every target project with the credential it will use.
    ///
    /// With `--project`, a project uses the key file issued for it, else the access token,
    /// else the first key file. Without `--project`, every key file names its own project.
    pub fn resolve_targets(&self) -> anyhow::Result<Vec<ProjectTarget>> {
        let key_files = self.key_files()?;
        let keyed: Vec<(Option<String>, PathBuf)> = key_files
            .iter()
            .map(|p| (project_from_service_account(p), p.clone()))
            .collect();

        let mut targets: Vec<ProjectTarget> = Vec::new();
        if self.projects.is_empty() {
            anyhow::ensure!(
                !keyed.is_empty(),
                "no projects to report on: pass --project or --credentials/--credentials-dir"
            );
            for (project, path) in keyed {
                // Unreadable keys still get a target so the run reports the credential error.
                let project_id = project.unwrap_or_else(|| file_stem(&path));
                push_unique(
                    &mut targets,
                    ProjectTarget {
                        project_id,
                        credential: Credential::KeyFile(path),
                    },
                );
            }
            return Ok(targets);
        }

        for project_id in &self.projects {
            let own_key = keyed
                .iter()
                .find(|(p, _)| p.as_deref() == Some(project_id.as_str()))
                .map(|(_, path)| Credential::KeyFile(path.clone()));
            let credential = own_key
                .or_else(|| self.access_token.clone().map(Credential::AccessToken))
                .or_else(|| key_files.first().cloned().map(Credential::KeyFile))
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "no credentials for project {}: pass --credentials, --credentials-dir or --access-token",
                        project_id
                    )
                })?;
            push_unique(
                &mut targets,
                ProjectTarget {
                    project_id: project_id.clone(),
                    credential,
                },
            );
        }
        Ok(targets)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn push_unique(targets: &mut Vec<ProjectTarget>, target: ProjectTarget) {
    if !targets.iter().any(|t| t.project_id == target.project_id) {
        targets.push(target);
    }
}
