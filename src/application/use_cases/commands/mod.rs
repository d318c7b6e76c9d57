pub mod execute_action;
pub mod get_commands;
pub mod helpers;
pub mod report_status;
