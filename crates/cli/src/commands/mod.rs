pub mod config_cmd;
pub mod decode;
pub mod invoke;
pub mod serve;
pub mod session_id;
