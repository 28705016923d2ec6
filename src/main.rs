mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use mailsweep::gmail_api::{
    GoogleIdentityProvider, KeyringStore, MailClient, RequestExecutor, TokenManager,
};
use mailsweep::service::{self, MailService, ServiceRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let store = KeyringStore::new()?;
    let provider = GoogleIdentityProvider::new(&cli.client_secret, &cli.token_cache);
    let manager = Arc::new(TokenManager::new(store, provider));
    let client = Arc::new(MailClient::new(RequestExecutor::new(Arc::clone(&manager))));

    if let Command::Labels = cli.command {
        let labels = client.list_labels().await?;
        for label in labels.labels.unwrap_or_default() {
            println!(
                "{}\t{}",
                label.id.unwrap_or_default(),
                label.name.unwrap_or_default()
            );
        }
        return Ok(());
    }

    let handle = service::spawn(MailService::new(manager, client));
    let request = match cli.command {
        Command::SignIn => ServiceRequest::SignIn,
        Command::SignOut => ServiceRequest::SignOut,
        Command::Status => ServiceRequest::GetSigninStatus,
        Command::Search { query } => ServiceRequest::Search { query },
        Command::Trash { ids } => ServiceRequest::BatchTrash { ids },
        Command::Labels => unreachable!("handled above"),
    };

    let response = handle.call(request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
