use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::announcements::{
    AnnouncementError, AnnouncementResult, AnnouncementStore, AuthoringPanel, ErrorKind,
    FeedPresenter, HttpAnnouncementApi, PresenterOptions, Scope,
};
use crate::config::ClientConfig;
use crate::ui::{Notice, NoticeCenter, NoticeLevel};

/// Comunicados - school announcements from the terminal
#[derive(Parser)]
#[command(name = "comunicados")]
#[command(about = "Student feed, attendance and professor announcements")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides config and environment)
    #[arg(long, global = true)]
    pub base_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the student announcement feed
    Feed,

    /// Show the student's absences against the limit
    Attendance {
        /// Name shown on the card (defaults to config)
        #[arg(long)]
        student_name: Option<String>,
    },

    /// List a professor's announcements
    List {
        /// Professor email (defaults to config)
        #[arg(long)]
        email: Option<String>,
    },

    /// Publish a new announcement
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        body: String,

        /// Author display name (defaults to config)
        #[arg(long)]
        author_name: Option<String>,

        /// Professor email (defaults to config)
        #[arg(long)]
        email: Option<String>,
    },

    /// Edit an existing announcement
    Edit {
        id: String,

        /// New title; keeps the current one when omitted
        #[arg(long)]
        title: Option<String>,

        /// New body; keeps the current one when omitted
        #[arg(long)]
        body: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },

    /// Delete an announcement
    Delete {
        id: String,

        #[arg(long)]
        email: Option<String>,
    },

    /// Show configuration, optionally writing a default file
    Config {
        /// Write the current settings to the config file
        #[arg(long)]
        init: bool,
    },
}

/// Command-line interface handler
pub struct CliHandler {
    config: ClientConfig,
    config_path: Option<PathBuf>,
    cancel: CancellationToken,
}

impl CliHandler {
    /// Load configuration and apply environment and flag overrides
    pub async fn new(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone().or_else(ClientConfig::default_path);
        let mut config = match config_path {
            Some(ref path) => ClientConfig::load_from_file(path).await?,
            None => ClientConfig::default(),
        };
        config.apply_env();
        config.apply_overrides(cli.base_url.clone(), None);
        config.validate()?;

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted; dropping in-flight requests");
                on_interrupt.cancel();
            }
        });

        Ok(Self {
            config,
            config_path,
            cancel,
        })
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Feed => self.handle_feed().await,
            Commands::Attendance { student_name } => self.handle_attendance(student_name).await,
            Commands::List { email } => self.handle_list(email).await,
            Commands::Create {
                title,
                body,
                author_name,
                email,
            } => self.handle_create(title, body, author_name, email).await,
            Commands::Edit {
                id,
                title,
                body,
                email,
            } => self.handle_edit(id, title, body, email).await,
            Commands::Delete { id, email } => self.handle_delete(id, email).await,
            Commands::Config { init } => self.handle_config(init).await,
        }
    }

    fn store(&self) -> Result<AnnouncementStore> {
        let api = HttpAnnouncementApi::from_config(&self.config)?;
        Ok(AnnouncementStore::new(Arc::new(api)))
    }

    fn presenter(&self, store: AnnouncementStore, scope: Scope) -> Result<FeedPresenter> {
        let options = PresenterOptions::from_config(&self.config)?;
        Ok(FeedPresenter::new(store, scope, options))
    }

    fn professor_email(&self, email: Option<String>) -> Result<String> {
        email
            .filter(|e| !e.trim().is_empty())
            .or_else(|| Some(self.config.professor_email.clone()).filter(|e| !e.trim().is_empty()))
            .ok_or_else(|| anyhow!("No professor email; pass --email or set professor_email in the config"))
    }

    fn panel(&self, email: Option<String>) -> Result<AuthoringPanel> {
        let email = self.professor_email(email)?;
        Ok(AuthoringPanel::new(self.store()?, self.config.professor_name.clone(), email))
    }

    async fn handle_feed(&self) -> Result<()> {
        let store = self.store()?;
        if let Err(e) = store.refresh(&Scope::Student, &self.cancel).await {
            print_failure("load announcements", &e);
            return Err(e.into());
        }

        let view = self.presenter(store, Scope::Student)?.view().await;
        println!("📣 ANNOUNCEMENTS ({})", view.badge());
        if let Some(course) = view.course() {
            println!("   {} · {}", course.subject, course.term);
        }
        println!();

        if view.is_empty() {
            println!("No announcements yet.");
        }
        for row in view.summaries() {
            println!("▌ {} - {}", row.author, row.title);
            println!("▌ {}", row.published);
            println!("▌ {}\n", row.preview);
        }
        Ok(())
    }

    async fn handle_attendance(&self, student_name: Option<String>) -> Result<()> {
        let name = student_name.unwrap_or_else(|| self.config.student_name.clone());
        let store = self.store()?;

        let record = match store.attendance(&name, &self.cancel).await {
            Ok(record) => record,
            Err(e) => {
                print_failure("load attendance", &e);
                return Err(e.into());
            }
        };

        if !record.student_name.is_empty() {
            println!("👋 Welcome, {}", record.student_name);
        }
        let marker = if record.is_at_risk() {
            "🔴 over the limit"
        } else if record.is_near_limit() {
            "🟠 close to the limit"
        } else {
            "🟢"
        };
        println!("{} {}", record, marker);
        Ok(())
    }

    async fn handle_list(&self, email: Option<String>) -> Result<()> {
        let mut panel = self.panel(email)?;
        let result = panel.refresh(&self.cancel).await;
        print_notices(panel.notices());
        result?;

        let view = self
            .presenter(panel.store().clone(), panel.scope().clone())?
            .view()
            .await;
        println!("📝 {} announcements for {}\n", view.badge(), panel.scope());
        for row in view.summaries() {
            println!("[{}] {} ({})", row.id, row.title, row.published);
            println!("    {}", row.preview);
        }
        Ok(())
    }

    async fn handle_create(
        &self,
        title: String,
        body: String,
        author_name: Option<String>,
        email: Option<String>,
    ) -> Result<()> {
        let email = self.professor_email(email)?;
        let author = author_name.unwrap_or_else(|| self.config.professor_name.clone());
        let mut panel = AuthoringPanel::new(self.store()?, author, email);

        panel.set_title(title);
        panel.set_body(body);
        let result = panel.save(&self.cancel).await;
        print_notices(panel.notices());
        settle(result)
    }

    async fn handle_edit(
        &self,
        id: String,
        title: Option<String>,
        body: Option<String>,
        email: Option<String>,
    ) -> Result<()> {
        let mut panel = self.panel(email)?;
        if let Err(e) = panel.refresh(&self.cancel).await {
            print_notices(panel.notices());
            return Err(e.into());
        }

        let existing = panel
            .announcements()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("Announcement '{}' not found for {}", id, panel.scope()))?;

        panel.edit(&existing);
        if let Some(title) = title {
            panel.set_title(title);
        }
        if let Some(body) = body {
            panel.set_body(body);
        }

        let result = panel.save(&self.cancel).await;
        print_notices(panel.notices());
        settle(result)
    }

    async fn handle_delete(&self, id: String, email: Option<String>) -> Result<()> {
        let mut panel = self.panel(email)?;
        let result = panel.delete(&id, &self.cancel).await;
        print_notices(panel.notices());
        settle(result)
    }

    async fn handle_config(&self, init: bool) -> Result<()> {
        let path = self
            .config_path
            .clone()
            .ok_or_else(|| anyhow!("Cannot find config directory; pass --config"))?;

        if init {
            self.config.save_to_file(&path).await?;
            println!("✅ Wrote {}", path.display());
        }

        println!("Config file: {}", path.display());
        println!("{}", toml::to_string_pretty(&self.config)?);
        Ok(())
    }
}

fn print_notice(notice: &Notice) {
    let line = match &notice.detail {
        Some(detail) => format!("{} {}: {}", notice.icon(), notice.message, detail),
        None => format!("{} {}", notice.icon(), notice.message),
    };
    match notice.level {
        NoticeLevel::Error | NoticeLevel::Warning => eprintln!("{}", line),
        NoticeLevel::Info | NoticeLevel::Success => println!("{}", line),
    }
}

fn print_notices(center: &NoticeCenter) {
    center.notices().for_each(print_notice);
}

/// Print a failure unless the user interrupted the request
fn print_failure(action: &str, error: &AnnouncementError) {
    if error.kind() != ErrorKind::Cancelled {
        print_notice(&Notice::failure(action, error));
    }
}

/// A change the server confirmed counts as done even if the reload failed
fn settle(result: AnnouncementResult<()>) -> Result<()> {
    match result {
        Err(e) if !e.change_confirmed() => Err(e.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "comunicados",
            "--base-url",
            "http://10.0.0.5:5000",
            "create",
            "--title",
            "Aula",
            "--body",
            "Sem aula amanhã",
        ])
        .unwrap();

        assert_eq!(cli.base_url.as_deref(), Some("http://10.0.0.5:5000"));
        match cli.command {
            Commands::Create { title, body, email, .. } => {
                assert_eq!(title, "Aula");
                assert_eq!(body, "Sem aula amanhã");
                assert!(email.is_none());
            }
            _ => panic!("Expected create command"),
        }
    }

    #[test]
    fn test_parse_edit_keeps_optional_fields() {
        let cli = Cli::try_parse_from(["comunicados", "edit", "42", "--title", "Novo"]).unwrap();
        match cli.command {
            Commands::Edit { id, title, body, .. } => {
                assert_eq!(id, "42");
                assert_eq!(title.as_deref(), Some("Novo"));
                assert!(body.is_none());
            }
            _ => panic!("Expected edit command"),
        }
    }

    #[test]
    fn test_settle_accepts_confirmed_changes() {
        assert!(settle(Ok(())).is_ok());

        let stale = AnnouncementError::reload_failed(Scope::Student, AnnouncementError::network("down"));
        assert!(settle(Err(stale)).is_ok());

        assert!(settle(Err(AnnouncementError::not_found("3"))).is_err());
        assert!(settle(Err(AnnouncementError::Cancelled)).is_err());
    }

    #[test]
    fn test_create_requires_title() {
        assert!(Cli::try_parse_from(["comunicados", "create", "--body", "x"]).is_err());
    }
}
