pub mod broadcast_activity_log;
