pub mod apply_reported_listing;
pub mod sync_site;
pub mod test_connection;
