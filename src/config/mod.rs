#[cfg(feature = "cli")]
pub mod cli;
pub mod job;
pub mod login;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use job::JobConfig;
pub use login::LoginConfig;
