use clap::Subcommand;

use {
    docscan_vault::{Identity, VaultError, VaultKey, key_manager::key_name},
    serde_json::json,
};

use crate::context::Context;

#[derive(Subcommand)]
pub enum KeyAction {
    /// Load the identity's key, creating it if missing.
    Sync {
        #[arg(long)]
        identity: String,
    },
    /// Discard the identity's key. Records sealed under it become unreadable.
    Reset {
        #[arg(long)]
        identity: String,
    },
    /// Report whether the device holds a usable key for the identity.
    Status {
        #[arg(long)]
        identity: String,
    },
}

pub async fn handle_keys(ctx: &Context, action: KeyAction) -> anyhow::Result<()> {
    match action {
        KeyAction::Sync { identity } => {
            ctx.sign_in(&identity).await?;
            println!("{}", serde_json::to_string(&ctx.keys.status().await)?);
        },
        KeyAction::Reset { identity } => {
            let identity = Identity::new(identity)?;
            if ctx.keys.forget(&identity).await? {
                eprintln!(
                    "Key for {identity} discarded. Existing encrypted records are now unreadable."
                );
            } else {
                eprintln!("No key stored for {identity}.");
            }
        },
        KeyAction::Status { identity } => {
            let identity = Identity::new(identity)?;
            println!("{}", stored_key_state(ctx, &identity).await?);
        },
    }
    Ok(())
}

/// Inspect the persisted entry without generating or activating anything.
async fn stored_key_state(
    ctx: &Context,
    identity: &Identity,
) -> anyhow::Result<serde_json::Value> {
    let state = match ctx.key_store.load(&key_name(identity)).await? {
        None => json!({ "identity": identity, "state": "missing" }),
        Some(encoded) => match VaultKey::from_base64(identity, &encoded) {
            Ok(_) => json!({ "identity": identity, "state": "present" }),
            Err(VaultError::KeyStoreCorrupted { reason, .. }) => {
                json!({ "identity": identity, "state": "corrupted", "reason": reason })
            },
            Err(e) => return Err(e.into()),
        },
    };
    Ok(state)
}
