use clap::{Args, Subcommand};

use carelink::models::UserId;
use carelink::store::DocumentStore;

use super::OutputFormat;

#[derive(Args)]
pub struct UserCommand {
    #[command(subcommand)]
    pub command: UserSubcommand,
}

#[derive(Subcommand)]
pub enum UserSubcommand {
    /// List all registered users
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a user's record
    Show {
        /// User ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl UserCommand {
    pub async fn run(&self, store: &dyn DocumentStore) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            UserSubcommand::List { format } => {
                let users = store.list_documents().await?;

                if users.is_empty() {
                    println!("No users found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&users)?);
                    }
                    OutputFormat::Text => {
                        println!(
                            "{:<32}  {:<10}  {:<6}  {:<24}  NAME",
                            "ID", "TYPE", "CODE", "EMAIL"
                        );
                        println!("{}", "-".repeat(100));
                        for user in &users {
                            let email = if user.email.chars().count() > 24 {
                                format!("{}...", user.email.chars().take(21).collect::<String>())
                            } else {
                                user.email.clone()
                            };
                            println!(
                                "{:<32}  {:<10}  {:<6}  {:<24}  {}",
                                user.id,
                                user.user_type.to_string(),
                                user.link_code.as_str(),
                                email,
                                user.name
                            );
                        }
                        println!("\nTotal: {} user(s)", users.len());
                    }
                }
                Ok(())
            }
            UserSubcommand::Show { id, format } => {
                match store.get_document(&UserId::from(id.as_str())).await? {
                    Some(user) => match format {
                        OutputFormat::Json => {
                            println!("{}", serde_json::to_string_pretty(&user)?);
                        }
                        OutputFormat::Text => {
                            println!("{}", user);
                        }
                    },
                    None => {
                        return Err(format!("User not found: {}", id).into());
                    }
                }
                Ok(())
            }
        }
    }
}
