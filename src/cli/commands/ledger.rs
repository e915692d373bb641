//! Download ledger maintenance.

use tokio::runtime::Runtime;

use super::download::open_ledger;
use crate::config;
use crate::db::Ledger;

/// Clear the download ledger so every release is downloaded again.
pub fn cmd_purge(rt: &Runtime) -> anyhow::Result<()> {
    let config = config::load();
    rt.block_on(async {
        let ledger = open_ledger(&config).await?;
        let count = ledger.count().await?;
        ledger.purge().await?;
        println!("Removed {} entries from the download ledger", count);
        anyhow::Ok(())
    })
}
