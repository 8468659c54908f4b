//! `cosync sync` — mirror a commit's changes into the bucket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use cosync_core::{remote_key, BatchReport, ChangeRecord, OperationOutcome, SyncAction, SyncConfig};
use cosync_sync::{
    filter::IGNORE_FILE_NAME,
    pipeline::{self, PlannedRecord},
    Executor, S3Store, StoreSettings,
};

use crate::changes;
use crate::github::{GithubClient, DEFAULT_API_URL};

/// Storage provider, used to derive the endpoint when none is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// Tencent Cloud COS (`https://cos.<region>.myqcloud.com`).
    Cos,
    /// AWS S3 (SDK default endpoint).
    S3,
}

/// Bucket connection options.
#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Destination bucket.
    #[arg(long, env = "INPUT_BUCKET")]
    pub bucket: Option<String>,

    /// Bucket region, e.g. `ap-guangzhou`.
    #[arg(long, env = "INPUT_REGION")]
    pub region: Option<String>,

    /// Access key id. Falls back to the default credential chain when omitted.
    #[arg(long, env = "INPUT_SECRETID", hide_env_values = true)]
    pub secret_id: Option<String>,

    /// Secret access key.
    #[arg(long, env = "INPUT_SECRETKEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Storage provider.
    #[arg(long, env = "INPUT_PROVIDER", value_enum, default_value = "cos")]
    pub provider: Provider,

    /// Custom endpoint URL; overrides the provider default.
    #[arg(long, env = "INPUT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Address the bucket in the path instead of the host name.
    #[arg(long)]
    pub force_path_style: bool,
}

impl StoreArgs {
    pub fn settings(&self) -> Result<StoreSettings> {
        let bucket = non_empty(&self.bucket).context("missing --bucket (or INPUT_BUCKET)")?;
        let region = non_empty(&self.region).context("missing --region (or INPUT_REGION)")?;

        let credentials = match (non_empty(&self.secret_id), non_empty(&self.secret_key)) {
            (Some(id), Some(key)) => Some((id.to_owned(), key.to_owned())),
            (None, None) => None,
            _ => bail!("--secret-id and --secret-key must be given together"),
        };

        let endpoint = match (non_empty(&self.endpoint), self.provider) {
            (Some(endpoint), _) => Some(endpoint.to_owned()),
            (None, Provider::Cos) => Some(StoreSettings::cos_endpoint(region)),
            (None, Provider::S3) => None,
        };

        let mut settings = StoreSettings::new(bucket, region);
        settings.endpoint = endpoint;
        settings.credentials = credentials;
        settings.force_path_style = self.force_path_style;
        Ok(settings)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Arguments for `cosync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// GitHub token used to read the commit.
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Branch or ref whose latest commit is mirrored.
    #[arg(long, env = "INPUT_BRANCH")]
    pub branch: Option<String>,

    /// Repository as `owner/name`.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    /// GitHub API base URL.
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Read the change-set from a JSON file instead of the GitHub API.
    #[arg(long, value_name = "FILE")]
    pub changes: Option<PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Key prefix inside the bucket.
    #[arg(long, env = "INPUT_SUBPATH", default_value = "")]
    pub sub_path: String,

    /// Working-tree root that changed paths are relative to.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Ignore file (default: `<root>/.syncignore`).
    #[arg(long, value_name = "FILE")]
    pub ignore_file: Option<PathBuf>,

    /// Multipart chunk size in MiB (minimum 5).
    #[arg(long, default_value_t = 5)]
    pub part_size_mib: u64,

    /// Attempts per storage operation.
    #[arg(long, default_value_t = 1)]
    pub attempts: u32,

    /// Delay between attempts, in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub retry_delay_ms: u64,

    /// Maximum number of actions in flight at once.
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Show what would be done without touching the bucket.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Exit with an error if any file failed to sync.
    #[arg(long)]
    pub strict: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let records = self.load_records()?;
        let ignore_path = self
            .ignore_file
            .clone()
            .unwrap_or_else(|| self.root.join(IGNORE_FILE_NAME));
        let filter = changes::load_ignore_filter(&ignore_path);

        tracing::debug!(
            "files to process:\n{}",
            records
                .iter()
                .map(|r| format!("{}: {}", r.path, r.kind))
                .collect::<Vec<_>>()
                .join("\n")
        );

        if self.dry_run {
            let planned = pipeline::plan(&records, &filter);
            if self.json {
                print_plan_json(&planned)?;
            } else {
                print_plan(&planned, &self.sub_path);
            }
            return Ok(());
        }

        let settings = self.store.settings()?;
        let config = self.sync_config();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;

        let report = runtime.block_on(async {
            let store = S3Store::connect(&settings)
                .await
                .context("failed to set up object store client")?;
            let executor = Arc::new(Executor::new(Arc::new(store), config));
            anyhow::Ok(pipeline::run_with_filter(&records, &filter, executor).await)
        })?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }

        if self.strict && !report.is_success() {
            bail!(
                "{} of {} files failed to sync",
                report.failed().count(),
                report.len()
            );
        }
        Ok(())
    }

    fn load_records(&self) -> Result<Vec<ChangeRecord>> {
        if let Some(path) = &self.changes {
            return changes::load_changes_file(path);
        }

        let repository = self
            .repository
            .as_deref()
            .context("missing --repository (or GITHUB_REPOSITORY)")?;
        let branch = non_empty(&self.branch).context("missing --branch (or INPUT_BRANCH)")?;
        GithubClient::new(&self.api_url, self.token.clone())
            .commit_changes(repository, branch)
    }

    fn sync_config(&self) -> SyncConfig {
        SyncConfig::new(self.sub_path.clone())
            .with_root(self.root.clone())
            .with_part_size(self.part_size_mib.saturating_mul(1024 * 1024))
            .with_retries(self.attempts, Duration::from_millis(self.retry_delay_ms))
            .with_max_in_flight(self.max_in_flight)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "")]
    mark: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl From<&OperationOutcome> for OutcomeRow {
    fn from(outcome: &OperationOutcome) -> Self {
        let mark = if !outcome.success {
            "✗".red().to_string()
        } else if outcome.is_skip() {
            "·".dimmed().to_string()
        } else {
            "✓".green().to_string()
        };
        let action = outcome
            .action
            .as_ref()
            .map(|a| a.name().to_string())
            .unwrap_or_else(|| "-".into());
        let detail = match (&outcome.error, &outcome.action) {
            (Some(err), _) => format!("{}: {}", err.stage, err.message),
            (None, Some(SyncAction::Skip { reason, .. })) => reason.to_string(),
            (None, Some(SyncAction::Move { from, .. })) => format!("from {from}"),
            (None, _) => String::new(),
        };
        Self {
            mark,
            action,
            path: outcome.path.clone(),
            detail,
        }
    }
}

fn print_report(report: &BatchReport) {
    print!("{}", render_report(report));
}

fn render_report(report: &BatchReport) -> String {
    if report.is_empty() {
        return "✓ nothing to sync\n".to_string();
    }

    let rows: Vec<OutcomeRow> = report.outcomes.iter().map(OutcomeRow::from).collect();
    let mut out = format!("{}\n", Table::new(rows).with(Style::rounded()));

    let failed = report.failed().count();
    let elapsed = report.finished_at - report.started_at;
    let summary = format!(
        "{} synced, {} skipped, {} failed in {}ms",
        report.succeeded().count(),
        report.skipped().count(),
        failed,
        elapsed.num_milliseconds()
    );
    if failed == 0 {
        out.push_str(&format!("{} {summary}\n", "✓".green()));
    } else {
        out.push_str(&format!("{} {summary}\n", "✗".red()));
        if report.outcomes.iter().any(OperationOutcome::is_partial_move) {
            out.push_str(&format!(
                "{}\n",
                "  some moves copied the object but left the source in place".yellow()
            ));
        }
    }
    out
}

fn print_plan(planned: &[PlannedRecord], sub_path: &str) {
    if planned.is_empty() {
        println!("[dry-run] ✓ nothing to sync");
        return;
    }

    for entry in planned {
        match entry {
            PlannedRecord::Dispatch(action) => {
                let key = remote_key(sub_path, action.path());
                println!("[dry-run] ~  {action}  (key: {key})");
            }
            PlannedRecord::Settled(outcome) => match (&outcome.action, outcome.error_message()) {
                (Some(action), None) => println!("[dry-run] ·  {action}"),
                (_, message) => println!(
                    "[dry-run] ✗  {}: {}",
                    outcome.path,
                    message.unwrap_or("rejected")
                ),
            },
        }
    }
}

fn print_plan_json(planned: &[PlannedRecord]) -> Result<()> {
    let entries: Vec<serde_json::Value> = planned
        .iter()
        .map(|entry| match entry {
            PlannedRecord::Dispatch(action) => serde_json::json!({ "dispatch": action }),
            PlannedRecord::Settled(outcome) => serde_json::json!({ "settled": outcome }),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use cosync_core::Stage;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        store: StoreArgs,
    }

    fn store_args(args: &[&str]) -> StoreArgs {
        Harness::try_parse_from(std::iter::once("cosync").chain(args.iter().copied()))
            .expect("parse")
            .store
    }

    #[test]
    fn cos_provider_derives_endpoint() {
        let settings = store_args(&["--bucket", "site-125", "--region", "ap-guangzhou"])
            .settings()
            .expect("settings");
        assert_eq!(
            settings.endpoint.as_deref(),
            Some("https://cos.ap-guangzhou.myqcloud.com")
        );
        assert!(settings.credentials.is_none());
    }

    #[test]
    fn explicit_endpoint_wins() {
        let settings = store_args(&[
            "--bucket",
            "b",
            "--region",
            "us-east-1",
            "--provider",
            "s3",
            "--endpoint",
            "http://localhost:9000",
        ])
        .settings()
        .expect("settings");
        assert_eq!(settings.endpoint.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn s3_provider_uses_sdk_endpoint() {
        let settings = store_args(&["--bucket", "b", "--region", "us-east-1", "--provider", "s3"])
            .settings()
            .expect("settings");
        assert!(settings.endpoint.is_none());
    }

    #[test]
    fn half_a_credential_pair_is_rejected() {
        let err = store_args(&["--bucket", "b", "--region", "r", "--secret-id", "AKID"])
            .settings()
            .expect_err("must fail");
        assert!(err.to_string().contains("together"));
    }

    #[test]
    fn missing_bucket_is_reported() {
        let err = store_args(&["--region", "r"]).settings().expect_err("must fail");
        assert!(err.to_string().contains("--bucket"));
    }

    fn report(outcomes: Vec<OperationOutcome>) -> BatchReport {
        BatchReport::new(chrono::Utc::now(), outcomes)
    }

    #[test]
    fn report_summary_counts_each_bucket() {
        let rendered = render_report(&report(vec![
            OperationOutcome::succeeded(SyncAction::Upload {
                path: "a.txt".into(),
            }),
            OperationOutcome::succeeded(SyncAction::Skip {
                path: "x.bin".into(),
                reason: cosync_core::SkipReason::Unsupported,
            }),
            OperationOutcome::failed(
                SyncAction::Delete {
                    path: "gone.txt".into(),
                },
                Stage::Delete,
                "RequestTimeout: try again",
            ),
        ]));

        assert!(rendered.contains("1 synced, 1 skipped, 1 failed"), "{rendered}");
        assert!(rendered.contains("delete: RequestTimeout: try again"), "{rendered}");
        assert!(!rendered.contains("left the source in place"));
    }

    #[test]
    fn partial_move_gets_a_notice() {
        let rendered = render_report(&report(vec![OperationOutcome::failed(
            SyncAction::Move {
                from: "old.md".into(),
                to: "new.md".into(),
            },
            Stage::MoveCleanup,
            "copied to docs/new.md but docs/old.md was not removed",
        )]));

        assert!(rendered.contains("0 synced, 0 skipped, 1 failed"), "{rendered}");
        assert!(rendered.contains("move_cleanup"), "{rendered}");
        assert!(rendered.contains("left the source in place"), "{rendered}");
    }

    #[test]
    fn empty_report_says_nothing_to_sync() {
        assert_eq!(render_report(&report(Vec::new())), "✓ nothing to sync\n");
    }
}
