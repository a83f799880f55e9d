use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use quiz_catalog_admin::catalog::forms::{
    ArticleForm, ArticleUpdate, Lang, QuestionForm, QuestionUpdate, TopicForm, TopicUpdate,
};
use quiz_catalog_admin::catalog::{article_path, OptionKey, ARTICLES};
use quiz_catalog_admin::config::{AdminConfig, LogFormat, LoggingConfig};
use quiz_catalog_admin::import::{sample_dataset, BulkImporter, ImportDataset};
use quiz_catalog_admin::notify::trigger::{Dispatch, DocumentCreated};
use quiz_catalog_admin::store::memory::MemoryStore;
use quiz_catalog_admin::CatalogApp;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quiz-admin")]
#[command(about = "Admin tool for the bilingual quiz and articles catalog")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "quiz-admin.toml")]
    config: PathBuf,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import topics and their questions in one atomic batch
    Import {
        /// Import the built-in sample catalog
        #[arg(long, conflicts_with = "file")]
        sample: bool,

        /// JSON file shaped like `{"topics": [{"name": ..., "questions": [...]}]}`
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Run against an in-memory store and report what would be written
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage topics
    Topics {
        #[command(subcommand)]
        action: TopicAction,
    },
    /// Manage the questions of a topic
    Questions {
        #[command(subcommand)]
        action: QuestionAction,
    },
    /// Manage articles
    Articles {
        #[command(subcommand)]
        action: ArticleAction,
    },
    /// Send the new-article push for an existing article
    Notify {
        article_id: String,

        /// Let FCM validate the messages without delivering them
        #[arg(long)]
        validate_only: bool,
    },
}

#[derive(Subcommand)]
enum TopicAction {
    List,
    Add {
        #[arg(long)]
        en: String,
        #[arg(long)]
        hi: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        en: Option<String>,
        #[arg(long)]
        hi: Option<String>,
    },
    /// Delete a topic (its questions are kept)
    Delete { id: String },
}

#[derive(Subcommand)]
enum QuestionAction {
    List {
        topic_id: String,
    },
    Add {
        topic_id: String,
        #[command(flatten)]
        fields: QuestionFields,
    },
    Edit {
        topic_id: String,
        question_id: String,
        #[command(flatten)]
        fields: QuestionFields,
    },
    Delete {
        topic_id: String,
        question_id: String,
    },
}

#[derive(Args)]
struct QuestionFields {
    #[arg(long)]
    text_en: Option<String>,
    #[arg(long)]
    text_hi: Option<String>,
    #[arg(long)]
    a_en: Option<String>,
    #[arg(long)]
    a_hi: Option<String>,
    #[arg(long)]
    b_en: Option<String>,
    #[arg(long)]
    b_hi: Option<String>,
    #[arg(long)]
    c_en: Option<String>,
    #[arg(long)]
    c_hi: Option<String>,
    #[arg(long)]
    d_en: Option<String>,
    #[arg(long)]
    d_hi: Option<String>,
    /// Correct option: A, B, C or D
    #[arg(long)]
    correct: Option<OptionKey>,
}

impl QuestionFields {
    fn apply(self, form: QuestionForm) -> QuestionForm {
        let mut updates = Vec::new();
        let text = [(Lang::En, self.text_en), (Lang::Hi, self.text_hi)];
        for (lang, value) in text {
            updates.extend(value.map(|v| QuestionUpdate::Text(lang, v)));
        }
        let options = [
            (OptionKey::A, self.a_en, self.a_hi),
            (OptionKey::B, self.b_en, self.b_hi),
            (OptionKey::C, self.c_en, self.c_hi),
            (OptionKey::D, self.d_en, self.d_hi),
        ];
        for (key, en, hi) in options {
            updates.extend(en.map(|v| QuestionUpdate::Option(key, Lang::En, v)));
            updates.extend(hi.map(|v| QuestionUpdate::Option(key, Lang::Hi, v)));
        }
        updates.extend(self.correct.map(QuestionUpdate::Correct));
        updates.into_iter().fold(form, QuestionForm::apply)
    }
}

#[derive(Subcommand)]
enum ArticleAction {
    List,
    Add {
        #[command(flatten)]
        fields: ArticleFields,
    },
    Edit {
        id: String,
        #[command(flatten)]
        fields: ArticleFields,
    },
    /// Delete an article and its stored image
    Delete { id: String },
}

#[derive(Args)]
struct ArticleFields {
    #[arg(long)]
    title_en: Option<String>,
    #[arg(long)]
    title_hi: Option<String>,
    #[arg(long)]
    description_en: Option<String>,
    #[arg(long)]
    description_hi: Option<String>,
    /// Reference link; pass an empty string to clear it
    #[arg(long)]
    link: Option<String>,
    /// Image file to upload
    #[arg(long)]
    image: Option<PathBuf>,
}

impl ArticleFields {
    async fn apply(self, form: ArticleForm) -> Result<ArticleForm> {
        let mut updates = Vec::new();
        updates.extend(self.title_en.map(|v| ArticleUpdate::Title(Lang::En, v)));
        updates.extend(self.title_hi.map(|v| ArticleUpdate::Title(Lang::Hi, v)));
        updates.extend(self.description_en.map(|v| ArticleUpdate::Description(Lang::En, v)));
        updates.extend(self.description_hi.map(|v| ArticleUpdate::Description(Lang::Hi, v)));
        updates.extend(self.link.map(ArticleUpdate::ReferenceLink));
        if let Some(path) = self.image {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| anyhow!("Failed to read image '{}': {}", path.display(), e))?;
            updates.push(ArticleUpdate::SelectImage(bytes));
        }
        Ok(updates.into_iter().fold(form, ArticleForm::apply))
    }
}

fn init_logging(config: &LoggingConfig, verbose: u8) -> Result<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?,
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow!("Failed to install logger: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AdminConfig::load_or_default(&cli.config)?;
    init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Import {
            sample,
            file,
            dry_run,
        } => {
            let dataset = match (sample, file) {
                (true, _) => sample_dataset(),
                (false, Some(path)) => ImportDataset::from_json_file(&path).await?,
                (false, None) => anyhow::bail!("Pass --sample or --file <PATH>"),
            };
            let importer = if dry_run {
                info!("Dry run: importing into an in-memory store");
                BulkImporter::new(Arc::new(MemoryStore::new()))
            } else {
                CatalogApp::connect(config).await?.importer()
            };
            let outcome = importer.import(&dataset).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                anyhow::bail!(outcome.message);
            }
            Ok(())
        }
        Commands::Topics { action } => {
            let topics = CatalogApp::connect(config).await?.topics();
            match action {
                TopicAction::List => {
                    for topic in topics.list().await? {
                        println!("{}\t{}\t{}", topic.id, topic.data.name.en, topic.data.name.hi);
                    }
                }
                TopicAction::Add { en, hi } => {
                    let mut form = TopicForm::default().apply(TopicUpdate::Name(Lang::En, en));
                    if let Some(hi) = hi {
                        form = form.apply(TopicUpdate::Name(Lang::Hi, hi));
                    }
                    println!("{}", topics.create(&form).await?);
                }
                TopicAction::Edit { id, en, hi } => {
                    let mut form = TopicForm::edit(&topics.get(&id).await?.data);
                    if let Some(en) = en {
                        form = form.apply(TopicUpdate::Name(Lang::En, en));
                    }
                    if let Some(hi) = hi {
                        form = form.apply(TopicUpdate::Name(Lang::Hi, hi));
                    }
                    topics.update(&id, &form).await?;
                }
                TopicAction::Delete { id } => topics.delete(&id).await?,
            }
            Ok(())
        }
        Commands::Questions { action } => {
            let questions = CatalogApp::connect(config).await?.questions();
            match action {
                QuestionAction::List { topic_id } => {
                    for question in questions.list(&topic_id).await? {
                        println!(
                            "{}\t{}\t{}",
                            question.id, question.data.correct_option, question.data.text.en
                        );
                    }
                }
                QuestionAction::Add { topic_id, fields } => {
                    let form = fields.apply(QuestionForm::default());
                    println!("{}", questions.create(&topic_id, &form).await?);
                }
                QuestionAction::Edit {
                    topic_id,
                    question_id,
                    fields,
                } => {
                    let existing = questions.get(&topic_id, &question_id).await?;
                    let form = fields.apply(QuestionForm::edit(&existing.data));
                    questions.update(&topic_id, &question_id, &form).await?;
                }
                QuestionAction::Delete {
                    topic_id,
                    question_id,
                } => questions.delete(&topic_id, &question_id).await?,
            }
            Ok(())
        }
        Commands::Articles { action } => {
            let articles = CatalogApp::connect(config).await?.articles();
            match action {
                ArticleAction::List => {
                    for article in articles.list().await? {
                        println!(
                            "{}\t{}\t{}",
                            article.id,
                            article.data.title.en,
                            article.data.image_url.unwrap_or_default()
                        );
                    }
                }
                ArticleAction::Add { fields } => {
                    let form = fields.apply(ArticleForm::default()).await?;
                    println!("{}", articles.create(&form).await?);
                }
                ArticleAction::Edit { id, fields } => {
                    let existing = articles.get(&id).await?;
                    let form = fields.apply(ArticleForm::edit(&existing.data)).await?;
                    articles.update(&id, &form).await?;
                }
                ArticleAction::Delete { id } => articles.delete(&id).await?,
            }
            Ok(())
        }
        Commands::Notify {
            article_id,
            validate_only,
        } => {
            config.firebase.fcm_validate_only |= validate_only;
            let app = CatalogApp::connect(config).await?;
            let doc = app
                .store()
                .get(&article_path(&article_id))
                .await?
                .ok_or_else(|| anyhow!("Article '{}' not found", article_id))?;

            let event = DocumentCreated {
                event_id: format!("cli-{}-{}", article_id, chrono::Utc::now().timestamp_millis()),
                collection: ARTICLES.to_string(),
                document_id: article_id,
                fields: Some(doc.fields),
            };
            match app.triggers().dispatch(&event).await {
                Dispatch::Handled { failed: 0, .. } => Ok(()),
                Dispatch::Handled { failed, .. } => anyhow::bail!("{} trigger handler(s) failed", failed),
                Dispatch::Duplicate => Ok(()),
            }
        }
    }
}
