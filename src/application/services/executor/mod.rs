use crate::application::ports::connector_client::{
    ConnectorClient, ConnectorError, ConnectorReply, ConnectorRequest,
};
use crate::domain::associations::association::Transition;
use crate::domain::commands::command::{Command, CommandAction};
use crate::domain::sites::site::Site;

/// Result of running one command against a site. The executor never writes state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub new_version: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub transition: Transition,
    /// False when the site could not be reached at all.
    pub reached: bool,
}

impl ExecutionOutcome {
    fn succeeded(transition: Transition, message: Option<String>) -> Self {
        let new_version = match &transition {
            Transition::Installed { version }
            | Transition::Activated { version }
            | Transition::ActivationFailed { version, .. } => version.clone(),
            _ => None,
        };
        Self {
            success: true,
            new_version,
            message,
            error: None,
            transition,
            reached: true,
        }
    }

    fn failed(err: &ConnectorError, step: &str) -> Self {
        let message = format!("{step} failed: {err}");
        Self {
            success: false,
            new_version: None,
            message: None,
            error: Some(message.clone()),
            transition: Transition::Failed { message },
            reached: !err.is_connectivity(),
        }
    }
}

pub struct CommandExecutor<'a, C>
where
    C: ConnectorClient + ?Sized,
{
    pub connector: &'a C,
}

impl<'a, C> CommandExecutor<'a, C>
where
    C: ConnectorClient + ?Sized,
{
    pub async fn execute(&self, site: &Site, command: &Command) -> ExecutionOutcome {
        let kind = command.kind;
        let slug = command.slug.clone();
        let outcome = match &command.action {
            CommandAction::Install {
                version,
                download_url,
            } => {
                let req = ConnectorRequest::Install {
                    kind,
                    slug,
                    file_url: download_url.clone(),
                };
                match self.connector.invoke(site, &req).await {
                    Ok(reply) => ExecutionOutcome::succeeded(
                        Transition::Installed {
                            version: reply.version.or_else(|| Some(version.clone())),
                        },
                        reply.message,
                    ),
                    Err(err) => ExecutionOutcome::failed(&err, "install"),
                }
            }
            CommandAction::Activate => {
                let req = ConnectorRequest::Activate { kind, slug };
                match self.connector.invoke(site, &req).await {
                    Ok(reply) => ExecutionOutcome::succeeded(
                        Transition::Activated {
                            version: reply.version,
                        },
                        reply.message,
                    ),
                    Err(err) => ExecutionOutcome::failed(&err, "activate"),
                }
            }
            CommandAction::Deactivate => {
                let req = ConnectorRequest::Deactivate { kind, slug };
                match self.connector.invoke(site, &req).await {
                    Ok(reply) => ExecutionOutcome::succeeded(Transition::Deactivated, reply.message),
                    Err(err) => ExecutionOutcome::failed(&err, "deactivate"),
                }
            }
            CommandAction::Uninstall => {
                let req = ConnectorRequest::Uninstall { kind, slug };
                match self.connector.invoke(site, &req).await {
                    Ok(reply) => ExecutionOutcome::succeeded(Transition::Uninstalled, reply.message),
                    Err(err) => ExecutionOutcome::failed(&err, "uninstall"),
                }
            }
            CommandAction::Update {
                version,
                download_url,
            } => self.update(site, command, version, download_url).await,
        };

        if outcome.success {
            tracing::debug!(
                site_id = %site.id,
                slug = %command.slug,
                action = command.action.kind().as_str(),
                transition = outcome.transition.label(),
                "command_executed"
            );
        } else {
            tracing::warn!(
                site_id = %site.id,
                slug = %command.slug,
                action = command.action.kind().as_str(),
                error = ?outcome.error,
                "command_failed"
            );
        }
        outcome
    }

    // deactivate -> uninstall -> install -> activate
    async fn update(
        &self,
        site: &Site,
        command: &Command,
        version: &str,
        download_url: &str,
    ) -> ExecutionOutcome {
        let kind = command.kind;
        let slug = command.slug.clone();

        let deactivate = ConnectorRequest::Deactivate {
            kind,
            slug: slug.clone(),
        };
        if let Err(err) = self.connector.invoke(site, &deactivate).await {
            // Themes cannot be deactivated; the uninstall below takes care of them.
            if !matches!(err, ConnectorError::Unsupported(_)) {
                return ExecutionOutcome::failed(&err, "update: deactivate");
            }
        }

        let uninstall = ConnectorRequest::Uninstall {
            kind,
            slug: slug.clone(),
        };
        if let Err(err) = self.connector.invoke(site, &uninstall).await {
            return ExecutionOutcome::failed(&err, "update: uninstall");
        }

        let install = ConnectorRequest::Install {
            kind,
            slug: slug.clone(),
            file_url: download_url.to_string(),
        };
        let installed: ConnectorReply = match self.connector.invoke(site, &install).await {
            Ok(reply) => reply,
            Err(err) => {
                let message = format!("update: install failed after removal: {err}");
                return ExecutionOutcome {
                    success: false,
                    new_version: None,
                    message: None,
                    error: Some(message.clone()),
                    transition: Transition::UpdateInstallFailed { message },
                    reached: !err.is_connectivity(),
                };
            }
        };
        let new_version = installed.version.or_else(|| Some(version.to_string()));

        let activate = ConnectorRequest::Activate { kind, slug };
        match self.connector.invoke(site, &activate).await {
            Ok(reply) => ExecutionOutcome::succeeded(
                Transition::Activated {
                    version: new_version,
                },
                reply.message.or_else(|| Some("updated".to_string())),
            ),
            Err(err) => {
                let message = format!("updated, but activation failed: {err}");
                ExecutionOutcome::succeeded(
                    Transition::ActivationFailed {
                        version: new_version,
                        message: message.clone(),
                    },
                    Some(message),
                )
            }
        }
    }
}
