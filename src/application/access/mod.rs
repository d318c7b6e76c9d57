use crate::application::ports::site_repository::SiteRepository;
use crate::domain::sites::site::Site;

#[derive(thiserror::Error, Debug)]
pub enum ConnectorAuthError {
    #[error("missing or unknown connector key")]
    Unauthenticated,
    #[error("connector key matches {0} sites")]
    Misconfigured(usize),
    #[error("failed to look up connector key")]
    Lookup(#[source] anyhow::Error),
}

// Agent requests carry only the site's shared secret; presentation extracts it and every
// inbound connector operation resolves it here before touching any other state.

pub async fn authenticate_site<S>(sites: &S, api_key: &str) -> Result<Site, ConnectorAuthError>
where
    S: SiteRepository + ?Sized,
{
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(ConnectorAuthError::Unauthenticated);
    }
    let mut matches = sites
        .find_by_api_key(api_key)
        .await
        .map_err(ConnectorAuthError::Lookup)?;
    match matches.len() {
        0 => Err(ConnectorAuthError::Unauthenticated),
        1 => Ok(matches.remove(0)),
        n => {
            tracing::error!(matches = n, "connector_api_key_not_unique");
            Err(ConnectorAuthError::Misconfigured(n))
        }
    }
}
