use clap::Args;

use carelink::credentials::SqliteCredentials;

use super::{prompt_password, OutputFormat};

#[derive(Args)]
pub struct LoginCommand {
    /// Email address of the account
    #[arg(long)]
    pub email: String,

    /// Password (read from stdin when omitted; typed input is echoed)
    #[arg(long)]
    pub password: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl LoginCommand {
    pub async fn run(
        &self,
        credentials: &SqliteCredentials,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let password = match &self.password {
            Some(password) => password.clone(),
            None => prompt_password()?.unwrap_or_default(),
        };

        match credentials.verify_password(&self.email, &password).await? {
            Some(uid) => {
                match self.format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::json!({ "uid": uid }));
                    }
                    OutputFormat::Text => println!("Signed in as {}", uid),
                }
                Ok(())
            }
            None => Err("Invalid email or password.".into()),
        }
    }
}
