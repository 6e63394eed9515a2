pub mod check_config;
pub mod secret;
pub mod serve;
