//! Release download command.

use anyhow::Context;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use super::DownloadArgs;
use crate::api::Client;
use crate::config::{self, Config};
use crate::db::{self, SqliteLedger};
use crate::download::{DownloadOptions, Downloader, ReleaseOutcome, ReleaseReport, RunSummary};
use crate::metadata::writer::LoftyWriter;
use crate::model::ReleaseRef;

/// Download every source. Returns `Ok(false)` if any release failed.
pub fn cmd_download(rt: &Runtime, args: &DownloadArgs) -> anyhow::Result<bool> {
    let mut config = config::load();
    args.apply(&mut config);
    let options = DownloadOptions::from_config(&config).context("Invalid configuration")?;

    let references = collect_references(&args.sources)?;
    if references.is_empty() {
        anyhow::bail!("No valid URLs to download");
    }
    info!("{} references to resolve", references.len());

    rt.block_on(async {
        let client = Client::connect(&config.credentials)
            .await
            .context("Failed to connect to the catalog")?;

        let ledger = if args.no_db {
            None
        } else {
            Some(open_ledger(&config).await?)
        };

        let writer = LoftyWriter;
        let downloader = Downloader::new(&client, &client, &writer, ledger.as_ref(), options);
        let reports = downloader.run(&references).await;

        print_reports(&reports);
        anyhow::Ok(!RunSummary::of(&reports).has_failures())
    })
}

/// Open the ledger at the configured location.
pub(super) async fn open_ledger(config: &Config) -> anyhow::Result<SqliteLedger> {
    let path = config.database_path();
    if let Some(parent) = path.as_deref().and_then(Path::parent) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let ledger = SqliteLedger::open(&db::db_url(path.as_deref())).await?;
    Ok(ledger)
}

/// Parse sources: URLs directly, or files listing one URL per line.
fn collect_references(sources: &[String]) -> anyhow::Result<Vec<ReleaseRef>> {
    let mut references = Vec::new();
    for source in sources {
        let path = Path::new(source);
        if path.is_file() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            references.extend(references_from_text(&text));
            continue;
        }
        match ReleaseRef::parse(source) {
            Ok(reference) => references.push(reference),
            Err(e) => warn!("{}", e),
        }
    }
    Ok(references)
}

/// References listed in a text file. Blank lines and `#` comments are
/// ignored; unparsable lines are logged and skipped.
fn references_from_text(text: &str) -> Vec<ReleaseRef> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match ReleaseRef::parse(line) {
            Ok(reference) => Some(reference),
            Err(e) => {
                warn!("{}", e);
                None
            }
        })
        .collect()
}

fn print_reports(reports: &[ReleaseReport]) {
    println!();
    for report in reports {
        let name = report.name();
        match &report.outcome {
            ReleaseOutcome::Done {
                tier,
                album_dir,
                written,
                existing,
                ..
            } => {
                println!("DONE  {} [{}] -> {}", name, tier, album_dir.display());
                if *existing > 0 {
                    println!("      {} written, {} already present", written, existing);
                }
            }
            ReleaseOutcome::SkippedDuplicate => println!("SKIP  {} (already downloaded)", name),
            ReleaseOutcome::SkippedQuality { requested, .. } => {
                println!("SKIP  {} ({} unavailable)", name, requested)
            }
            ReleaseOutcome::Filtered => println!("SKIP  {} (not an album)", name),
            ReleaseOutcome::Failed { failures, .. } => {
                println!("FAIL  {} ({} tracks failed)", name, failures.len());
                for failure in failures {
                    println!("      {}: {}", failure.path.display(), failure.error);
                }
            }
            ReleaseOutcome::CatalogFailed(e) => println!("FAIL  {} ({})", name, e),
            ReleaseOutcome::LedgerFailed(e) => println!("FAIL  {} (ledger: {})", name, e),
        }
    }

    let summary = RunSummary::of(reports);
    println!(
        "\nCompleted: {} downloaded, {} skipped, {} failed",
        summary.done, summary.skipped, summary.failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReleaseKind;
    use std::io::Write;

    #[test]
    fn test_references_from_text() {
        let text = "\
# favourites
https://open.qobuz.com/album/abc123

https://www.qobuz.com/us-en/artist/someone/36819
not a url
";
        let refs = references_from_text(text);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, ReleaseKind::Album);
        assert_eq!(refs[1].id, "36819");
    }

    #[test]
    fn test_collect_references_reads_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://open.qobuz.com/track/52151405").unwrap();
        writeln!(file, "https://open.qobuz.com/label/1153").unwrap();

        let sources = vec![
            file.path().to_string_lossy().into_owned(),
            "https://open.qobuz.com/playlist/99".to_string(),
            "garbage".to_string(),
        ];
        let refs = collect_references(&sources).unwrap();
        let kinds: Vec<_> = refs.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![ReleaseKind::Track, ReleaseKind::Label, ReleaseKind::Playlist]
        );
    }

    #[tokio::test]
    async fn test_open_ledger_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.download.database = Some(dir.path().join("nested").join("ledger.db"));

        let ledger = open_ledger(&config).await.unwrap();
        assert_eq!(ledger.count().await.unwrap(), 0);
        assert!(dir.path().join("nested").join("ledger.db").exists());
    }
}
