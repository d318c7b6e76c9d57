pub mod disable_for_site;
pub mod enable_for_site;
pub mod list_for_site;
pub mod request_change;

#[derive(thiserror::Error, Debug)]
pub enum AssociationChangeError {
    #[error("site not found")]
    SiteNotFound,
    #[error("artifact not found")]
    ArtifactNotFound,
    #[error("artifact is not enabled for this site")]
    AssociationNotFound,
    #[error("artifact is disabled for this site")]
    Disabled,
    #[error("no release {0} for this artifact")]
    UnknownVersion(String),
    #[error("association was modified concurrently")]
    Conflict,
    #[error("failed to load association state")]
    Load(#[source] anyhow::Error),
    #[error("failed to persist association")]
    Persist(#[source] anyhow::Error),
}
