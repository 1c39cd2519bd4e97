use std::{collections::HashSet, path::PathBuf};

use {
    clap::Subcommand,
    docscan_vault::{Identity, RecordId},
    tracing::warn,
};

use crate::{codec_commands::read_json, context::Context};

#[derive(Subcommand)]
pub enum DocAction {
    /// Encrypt a JSON record and store it.
    Add {
        #[arg(long)]
        identity: String,
        /// JSON file to read, or stdin when omitted.
        file: Option<PathBuf>,
    },
    /// Print every stored record, decrypted where possible.
    List {
        #[arg(long)]
        identity: String,
    },
    /// Delete records by id, including unreadable ones.
    Delete {
        #[arg(long)]
        identity: String,
        #[arg(required = true)]
        ids: Vec<RecordId>,
    },
    /// Encrypt legacy plaintext records in place.
    Migrate {
        #[arg(long)]
        identity: String,
    },
}

pub async fn handle_docs(ctx: &Context, action: DocAction) -> anyhow::Result<()> {
    let vault = ctx.vault().await?;
    match action {
        DocAction::Add { identity, file } => {
            let record = read_json(file.as_deref())?;
            let identity = ctx.sign_in(&identity).await?;
            let id = vault.save(&identity, &record).await?;
            println!("{id}");
        },
        DocAction::List { identity } => {
            let identity = ctx.sign_in(&identity).await?;
            let docs = vault.load_all(&identity).await?;
            let unreadable = docs.iter().filter(|d| d.outcome.is_unreadable()).count();
            println!("{}", serde_json::to_string_pretty(&docs)?);
            if unreadable > 0 {
                eprintln!(
                    "{unreadable} record(s) could not be decrypted. Delete them with `docscan docs delete`."
                );
            }
        },
        DocAction::Delete { identity, ids } => {
            // Listing needs no key, so unreadable records stay deletable.
            let identity = Identity::new(identity)?;
            let owned: HashSet<RecordId> = vault
                .load_all(&identity)
                .await?
                .into_iter()
                .map(|d| d.id)
                .collect();
            let (mine, foreign): (Vec<RecordId>, Vec<RecordId>) =
                ids.into_iter().partition(|id| owned.contains(id));
            if !foreign.is_empty() {
                warn!(identity = %identity, ?foreign, "skipping records owned by someone else");
            }
            let deleted = vault.delete_many(&mine).await?;
            eprintln!("Deleted {deleted} record(s).");
        },
        DocAction::Migrate { identity } => {
            let identity = ctx.sign_in(&identity).await?;
            let count = vault.migrate_legacy(&identity).await?;
            eprintln!("Encrypted {count} legacy record(s).");
        },
    }
    Ok(())
}
