pub const BATCH_SIZE: &str = "courier_batch_size";
pub const RECORDS_PROCESSED: &str = "courier_records_processed";
pub const RECORDS_FAILED: &str = "courier_records_failed";
pub const FETCH_FAILURES: &str = "courier_fetch_failures";
pub const COMMIT_FAILURES: &str = "courier_commit_failures";
pub const HANDLER_FAILURES: &str = "courier_failure_handler_errors";
pub const DEAD_LETTERED: &str = "courier_records_dead_lettered";
pub const ALERTS_SENT: &str = "courier_alerts_sent";
pub const MAILS_SENT: &str = "courier_mails_sent";
pub const EVENTS_ENQUEUED: &str = "courier_events_enqueued";
