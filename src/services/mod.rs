pub mod crm_payload;
pub mod crm_sender;
pub mod poller;
