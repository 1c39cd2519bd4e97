use std::{io::Read, path::Path};

use {
    anyhow::Context as _,
    docscan_vault::{StoredContent, VaultKey},
    serde_json::Value,
};

use crate::context::Context;

/// Read one JSON value from `file`, or from stdin when absent or `-`.
pub(crate) fn read_json(file: Option<&Path>) -> anyhow::Result<Value> {
    let raw = match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        },
    };
    serde_json::from_str(&raw).context("input is not valid JSON")
}

/// Encrypt a record under the identity's key and return the envelope.
pub async fn seal(ctx: &Context, identity: &str, record: &Value) -> anyhow::Result<Value> {
    let identity = ctx.sign_in(identity).await?;
    let key = ctx.keys.active_key_for(&identity).await?;
    Ok(ctx.codec.encrypt(record, &key)?.to_value())
}

/// Turn stored content back into a record. Legacy content needs no key.
pub async fn open(ctx: &Context, identity: &str, stored: Value) -> anyhow::Result<Value> {
    let content = StoredContent::from_value(stored)?;
    let key: Option<std::sync::Arc<VaultKey>> = if content.is_encrypted() {
        let identity = ctx.sign_in(identity).await?;
        Some(ctx.keys.active_key_for(&identity).await?)
    } else {
        None
    };
    Ok(ctx.codec.open(&content, key.as_deref())?)
}
