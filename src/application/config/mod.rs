pub mod cli_args;
pub mod genesis_file;
pub mod network;
