pub mod acquire;
pub mod aws;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod idp;
pub mod ini_file;
pub mod mfa;
pub mod prompt;
pub mod saml;
pub mod secrets;
pub mod shell;

#[cfg(test)]
mod test_support;
