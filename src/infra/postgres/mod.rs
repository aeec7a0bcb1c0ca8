pub mod crm_queue_repo;
pub mod payment_repo;
pub mod runtime_log_repo;
