use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the OAuth client secret JSON downloaded from the console.
    #[clap(long, default_value = "client_secret.json")]
    pub client_secret: PathBuf,

    /// Where issued OAuth tokens are cached between runs.
    #[clap(long, default_value = "token_cache.json")]
    pub token_cache: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in interactively and store the credential.
    SignIn,
    /// Revoke the credential (best effort) and clear local state.
    SignOut,
    /// Show whether a credential is stored locally.
    Status,
    /// Search messages and print the enriched page as JSON.
    Search {
        /// Gmail query string, passed through verbatim.
        query: String,
    },
    /// Move the given message ids to the trash.
    Trash { ids: Vec<String> },
    /// List the mailbox labels.
    Labels,
}
