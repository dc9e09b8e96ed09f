use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, DEFAULT_CONFIG_FILE},
    forms::LoginForm,
    ArticleField, FileCredentialStore, HttpArticleApi, RequestResult, SessionController,
};
use shared::domain::{ArticleId, Topic};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "articles", about = "Log in and manage articles")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Overrides `api_base_url` from config and environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Overrides where the session token is kept.
    #[arg(long)]
    credentials: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "ARTICLES_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    List,
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        topic: Topic,
    },
    /// Edit an article; fields left out keep their current value.
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        topic: Option<Topic>,
    },
    Delete {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(&cli.config);
    if let Some(url) = cli.api_url {
        settings.api_base_url = url;
    }
    if let Some(path) = cli.credentials {
        settings.credential_path = path;
    }
    tracing::debug!(?settings, "resolved client settings");

    let api = HttpArticleApi::new(&settings.api_base_url, settings.request_timeout())?;
    let store = FileCredentialStore::new(&settings.credential_path);
    let controller = SessionController::new(Arc::new(api), Arc::new(store));

    let outcome = run(&controller, cli.command).await;
    print!("{}", render::render(&controller.snapshot()));
    outcome
}

async fn run(controller: &SessionController, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let form = LoginForm::from_input(&username, &password)
                .map_err(|err| anyhow!(err.message))?;
            report(controller.login(&form.username, &form.password).await)
        }
        Command::Logout => report(controller.logout()),
        Command::List => {
            require_session(controller)?;
            report(controller.open_articles_view().await)
        }
        Command::Create { title, text, topic } => {
            require_session(controller)?;
            let title = bounded(ArticleField::Title, &title)?;
            let text = bounded(ArticleField::Text, &text)?;
            controller.set_form_field(ArticleField::Title, title);
            controller.set_form_field(ArticleField::Text, text);
            controller.set_form_field(ArticleField::Topic, topic.as_str());
            report(controller.submit_form().await)
        }
        Command::Edit {
            id,
            title,
            text,
            topic,
        } => {
            require_session(controller)?;
            report(controller.fetch_articles().await)?;
            report(controller.select_for_edit(ArticleId(id)))?;
            if let Some(title) = title {
                let title = bounded(ArticleField::Title, &title)?;
                controller.set_form_field(ArticleField::Title, title);
            }
            if let Some(text) = text {
                let text = bounded(ArticleField::Text, &text)?;
                controller.set_form_field(ArticleField::Text, text);
            }
            if let Some(topic) = topic {
                controller.set_form_field(ArticleField::Topic, topic.as_str());
            }
            report(controller.submit_form().await)
        }
        Command::Delete { id } => {
            require_session(controller)?;
            report(controller.fetch_articles().await)?;
            report(controller.delete_article(ArticleId(id)).await)
        }
    }
}

fn require_session(controller: &SessionController) -> Result<()> {
    if controller.is_logged_in() {
        Ok(())
    } else {
        bail!("not logged in; run `articles login` first")
    }
}

/// Arguments are not clamped like interactive input; too long is an error.
fn bounded(field: ArticleField, value: &str) -> Result<&str> {
    match field.max_len() {
        Some(max) if value.chars().count() > max => {
            bail!("{field:?} is limited to {max} characters")
        }
        _ => Ok(value),
    }
}

/// The controller already put the user-facing text in the snapshot message.
fn report<T>(result: RequestResult<T>) -> Result<()> {
    result
        .map(|_| ())
        .map_err(|err| anyhow!("operation failed ({:?})", err.kind))
}
