//! postbox - command-line entry point
//!
//! ```text
//! postbox provision <email> [full name]
//! postbox folders <email>
//! postbox inbox <email>
//! ```

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use postbox::app::MailboxState;
use postbox::config::Settings;
use postbox::App;

#[tokio::main]
async fn main() -> Result<()> {
    let settings_path = Settings::default_path()?;
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("loading {}", settings_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting postbox");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let app = App::open(settings).await?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["provision", email, name @ ..] => {
            let name = (!name.is_empty()).then(|| name.join(" "));
            let session = app.provision_user(email, name.as_deref()).await?;
            println!("{} {}", session.user_id, session.email);
        }
        ["folders", email] => {
            let session = app
                .session_for(email)
                .await?
                .with_context(|| format!("no account for {email}"))?;
            for folder in app.mail().list_folders(Some(&session)).await? {
                let marker = if folder.is_system { "*" } else { " " };
                println!("{marker} {}", folder.name);
            }
        }
        ["inbox", email] => {
            let session = app
                .session_for(email)
                .await?
                .with_context(|| format!("no account for {email}"))?;
            let mut state = MailboxState::new();
            app.load_mailbox(&session, &mut state).await?;
            println!("{}", state.count_label());
            for email in state.visible_emails() {
                let flag = if email.is_read { ' ' } else { 'N' };
                println!(
                    "{flag} {}  {:<24}  {}",
                    email.display_date().format("%Y-%m-%d %H:%M"),
                    email.sender_display(),
                    email.subject
                );
            }
        }
        _ => bail!("usage: postbox <provision <email> [name] | folders <email> | inbox <email>>"),
    }

    Ok(())
}
