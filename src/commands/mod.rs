pub mod auth;
pub mod completions;
pub mod configure;
pub mod env;
pub mod list;

pub use auth::AuthCommand;
pub use completions::CompletionsCommand;
pub use configure::ConfigureCommand;
pub use env::EnvCommand;
pub use list::ListCommand;
