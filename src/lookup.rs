//! Page fetch followed by table resolution

use tracing::info;

use crate::config::ConfluenceSettings;
use crate::error::{Result, WikiSshError};
use crate::fetch::DocumentSource;
use crate::resolver::resolve;

/// Fetch the configured page and resolve `server_name` against its tables
///
/// A miss is reported as [`WikiSshError::NotFound`].
pub async fn lookup_address<S>(
    source: &S,
    settings: &ConfluenceSettings,
    server_name: &str,
) -> Result<String>
where
    S: DocumentSource + Sync + ?Sized,
{
    let document = source.fetch_page(&settings.page_id).await?;
    info!(
        "Fetched page {} ({} bytes)",
        settings.page_id,
        document.len()
    );

    resolve(
        &document,
        server_name,
        &settings.hostname_column,
        &settings.address_column,
    )
    .ok_or_else(|| WikiSshError::NotFound(server_name.trim().to_string()))
}
