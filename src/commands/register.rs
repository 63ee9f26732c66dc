use clap::Args;

use carelink::models::{RegistrationForm, UserType};
use carelink::notify::{Notice, NoticeKind, NotificationSink};
use carelink::registration::Registrar;

use super::{prompt_password, OutputFormat};

#[derive(Args)]
pub struct RegisterCommand {
    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Email address (login identity)
    #[arg(long)]
    pub email: Option<String>,

    /// Password (read from stdin when omitted; typed input is echoed)
    #[arg(long)]
    pub password: Option<String>,

    /// Account type: primary, caregiver or elder
    #[arg(long = "type", value_name = "TYPE")]
    pub user_type: Option<String>,

    /// Invite code of the primary user to link to
    #[arg(long)]
    pub code: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Prints notices to the terminal.
struct ConsoleSink {
    json: bool,
}

impl NotificationSink for ConsoleSink {
    fn notify(&self, notice: &Notice) {
        if self.json {
            match serde_json::to_string_pretty(notice) {
                Ok(text) => println!("{}", text),
                Err(e) => eprintln!("Error: {}", e),
            }
            return;
        }

        match notice.kind {
            NoticeKind::Success => println!("{}", notice.message),
            NoticeKind::Failure => match &notice.field {
                Some(field) => eprintln!("{} (check {})", notice.message, field.label()),
                None => eprintln!("{}", notice.message),
            },
        }
    }
}

impl RegisterCommand {
    pub async fn run(&self, registrar: &Registrar) -> Result<(), Box<dyn std::error::Error>> {
        let password = match &self.password {
            Some(password) => Some(password.clone()),
            None => prompt_password()?,
        };

        let form = RegistrationForm {
            name: self.name.clone(),
            email: self.email.clone(),
            password,
            user_type: self.user_type.clone(),
            link_code: self.code.clone(),
        };

        let sink = ConsoleSink {
            json: matches!(self.format, OutputFormat::Json),
        };

        match registrar.handle(&form, &sink).await {
            Ok(outcome) => {
                if let OutputFormat::Text = self.format {
                    println!("User ID: {}", outcome.uid());
                    if let carelink::Outcome::Created { link_code, .. } = &outcome {
                        println!("Invite code: {}", link_code);
                        println!(
                            "Share this code so a {} or {} can link to this account.",
                            UserType::Caregiver.label().to_lowercase(),
                            UserType::Elder.label().to_lowercase()
                        );
                    }
                }
                Ok(())
            }
            // The sink has already shown the failure
            Err(_) => std::process::exit(1),
        }
    }
}
