// Module layout (Clean Architecture style)
// - bootstrap: configuration and wiring
// - infrastructure: Postgres, connector HTTP client, event fan-out
// - presentation: HTTP handlers and routing (agent + platform user APIs)
// - application: diffing, execution, reconciliation, fleet sync
// - domain: sites, artifacts, associations, commands

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

#[cfg(test)]
mod test_support;
