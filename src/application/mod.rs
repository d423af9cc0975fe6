pub mod config;
pub mod json_rpc;
pub mod rest_server;
