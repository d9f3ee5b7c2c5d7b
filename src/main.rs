//! variant-sync - edit product color/size variants and reconcile them with the inventory store

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

use variant_sync::api;
use variant_sync::color::{self, ColorMatch};
use variant_sync::config::{self, Config};
use variant_sync::db::Database;
use variant_sync::draft::{DraftAction, VariantDraft};
use variant_sync::models::{Asset, ColorHex, Lifecycle, Product, ProductStatus, SizeCode};
use variant_sync::reconcile::{self, OperationStatus, ReconciliationReport, SyncError};
use variant_sync::service::{CategoryDirectory, InventoryService};
use variant_sync::validate::ValidationResult;

#[derive(Parser)]
#[command(name = "variant-sync")]
#[command(about = "Edit product color/size variants and reconcile them with the inventory store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Generate a new API token
    Token {
        /// Name/label for the token
        #[arg(short, long)]
        name: Option<String>,

        /// List all configured tokens
        #[arg(long)]
        list: bool,

        /// Revoke a token by name
        #[arg(long)]
        revoke: Option<String>,

        /// Config file that holds the tokens
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Initialize a new config file
    Init {
        /// Output path for config file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage product categories
    Category {
        #[command(subcommand)]
        command: CategoryCommand,

        /// Config file path
        #[arg(short, long, global = true)]
        config: Option<PathBuf>,
    },

    /// Name a color against the palette
    Classify {
        /// Hex color, e.g. FF8800 or #ff8800
        hex: ColorHex,

        /// Match threshold (overrides config)
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Edit a draft file
    Draft {
        /// Draft file (JSON)
        #[arg(short, long, global = true, default_value = "draft.json")]
        file: PathBuf,

        #[command(subcommand)]
        command: DraftCommand,
    },

    /// Check a draft without touching the store
    Validate {
        /// Draft file (JSON)
        #[arg(short, long, default_value = "draft.json")]
        file: PathBuf,
    },

    /// Push a draft to the store and write back the settled draft
    Sync {
        /// Draft file (JSON)
        #[arg(short, long, default_value = "draft.json")]
        file: PathBuf,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Do not re-send variants and sizes that match the baseline
        #[arg(long)]
        skip_unchanged: bool,
    },
}

#[derive(Subcommand)]
enum CategoryCommand {
    /// Add a category
    Add { name: String },
    /// List categories
    List,
}

#[derive(Subcommand)]
enum DraftCommand {
    /// Start a draft for a new product
    New {
        #[arg(long)]
        name: String,
        #[arg(long)]
        sku: String,
        #[arg(long)]
        price: Decimal,
        #[arg(long, default_value_t = Decimal::ZERO)]
        discount_price: Decimal,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<String>,
        /// Image URL (repeatable)
        #[arg(long = "asset")]
        assets: Vec<String>,
        #[arg(long)]
        tag: Vec<String>,
        #[arg(long)]
        publish: bool,
    },
    /// Start a draft from a stored product
    Load {
        /// Product id
        #[arg(long)]
        product: String,
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the draft
    Show,
    /// Add a color with every size at zero stock
    AddVariant,
    RemoveVariant { variant: String },
    /// Add the first free size to a color
    AddSize { variant: String },
    RemoveSize { variant: String, size: String },
    /// Set a color's name and hex verbatim
    SetColor {
        variant: String,
        hex: ColorHex,
        #[arg(long)]
        name: String,
    },
    /// Pick a palette swatch by name
    Swatch { variant: String, name: String },
    /// Pick any color; the name comes from the palette classifier
    PickColor {
        variant: String,
        hex: ColorHex,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    SetStock { size: String, stock: u32 },
    /// Reassign a size slot to another free code
    SetSize {
        variant: String,
        size: String,
        code: SizeCode,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("variant_sync=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port, bind } => {
            let mut cfg = Config::resolve(config.as_deref())?;

            // Override with CLI args
            if let Some(p) = port {
                cfg.server.port = p;
            }
            if let Some(b) = bind {
                cfg.server.bind = b;
            }

            run_server(cfg).await
        }

        Commands::Token {
            name,
            list,
            revoke,
            config,
        } => token_command(name, list, revoke, config),

        Commands::Init { output } => {
            let path = output.unwrap_or_else(|| PathBuf::from("config.toml"));
            let cfg = Config::default();
            cfg.save_to(&path)?;

            println!("Created config file: {}", path.display());
            println!();
            println!("Next steps:");
            println!("  1. Generate a token: variant-sync token --name my-client");
            println!("  2. Add a category: variant-sync category add Shirts");
            println!(
                "  3. Start the server: variant-sync serve --config {}",
                path.display()
            );

            Ok(())
        }

        Commands::Category { command, config } => {
            let cfg = Config::resolve(config.as_deref())?;
            let db = open_database(&cfg)?;
            match command {
                CategoryCommand::Add { name } => {
                    let category = db.add_category(&name)?;
                    println!("Added category '{}' ({})", category.name, category.id);
                }
                CategoryCommand::List => {
                    let categories = db.list_categories().await?;
                    if categories.is_empty() {
                        println!(
                            "No categories yet. Add one with: variant-sync category add <name>"
                        );
                    }
                    for category in categories {
                        println!("  {}  {}", category.id, category.name);
                    }
                }
            }
            Ok(())
        }

        Commands::Classify { hex, threshold } => {
            let classifier = match threshold {
                Some(t) => color::Classifier::new(t),
                None => Config::load()?.sync.classifier(),
            };
            let (nearest, distance) = classifier.nearest(&hex);
            let result = classifier.classify(&hex);
            println!("{} -> {}", hex, result.name);
            println!("  nearest swatch: {} (distance {:.1})", nearest.name, distance);
            Ok(())
        }

        Commands::Draft { file, command } => draft_command(&file, command).await,

        Commands::Validate { file } => {
            let draft = read_draft(&file)?;
            match draft.validate() {
                ValidationResult::Valid => {
                    println!("✅ Draft is valid");
                    Ok(())
                }
                ValidationResult::Invalid(errors) => {
                    println!("Draft has problems:");
                    for (field, message) in &errors {
                        println!("  {}: {}", field, message);
                    }
                    bail!("{} field(s) need attention", errors.len())
                }
            }
        }

        Commands::Sync {
            file,
            config,
            skip_unchanged,
        } => {
            let cfg = Config::resolve(config.as_deref())?;
            let db = open_database(&cfg)?;
            let draft = read_draft(&file)?;

            let mut options = cfg.sync.options();
            options.skip_unchanged |= skip_unchanged;

            let (report, settled) = match reconcile::save(&db, &draft, options).await {
                Ok(result) => result,
                Err(SyncError::Invalid(errors)) => {
                    println!("Draft has problems, nothing was sent:");
                    for (field, message) in &errors {
                        println!("  {}: {}", field, message);
                    }
                    bail!("{} field(s) need attention", errors.len());
                }
            };

            print_report(&report);
            write_draft(&file, &settled)?;

            match &report {
                ReconciliationReport::Success { .. } => Ok(()),
                ReconciliationReport::PartialFailure { .. } => {
                    println!();
                    println!(
                        "Run 'variant-sync sync --file {}' again to retry.",
                        file.display()
                    );
                    bail!("{} operation(s) failed", report.failed().count())
                }
                ReconciliationReport::Fatal { error, .. } => {
                    bail!("Product could not be saved: {}", error)
                }
            }
        }
    }
}

async fn run_server(config: Config) -> Result<()> {
    let db = open_database(&config)?;

    let state = api::AppState::new(db, config.clone());
    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 variant-sync server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn open_database(config: &Config) -> Result<Database> {
    Database::open(&config.database.path).context("Failed to open database")
}

fn read_draft(path: &Path) -> Result<VariantDraft> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read draft {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse draft")
}

/// Starting a draft never clobbers one in progress
fn refuse_overwrite(path: &Path) -> Result<()> {
    if path.exists() {
        bail!(
            "{} already exists; remove it or pass --file to start elsewhere",
            path.display()
        );
    }
    Ok(())
}

fn write_draft(path: &Path, draft: &VariantDraft) -> Result<()> {
    let content = serde_json::to_string_pretty(draft).context("Failed to serialize draft")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write draft {}", path.display()))
}

async fn draft_command(file: &Path, command: DraftCommand) -> Result<()> {
    let next = match command {
        DraftCommand::New {
            name,
            sku,
            price,
            discount_price,
            description,
            category,
            assets,
            tag,
            publish,
        } => {
            refuse_overwrite(file)?;
            VariantDraft::new(Product {
                id: None,
                slug: None,
                name,
                description,
                price,
                discount_price,
                category_id: category,
                sku,
                status: if publish {
                    ProductStatus::Published
                } else {
                    ProductStatus::Draft
                },
                tags: tag,
                assets: assets.into_iter().map(Asset::image).collect(),
            })
        }

        DraftCommand::Load { product, config } => {
            refuse_overwrite(file)?;
            let cfg = Config::resolve(config.as_deref())?;
            let db = open_database(&cfg)?;
            VariantDraft::load(db.load_product(&product).await?)
        }

        DraftCommand::Show => {
            print_draft(&read_draft(file)?);
            return Ok(());
        }

        DraftCommand::AddVariant => {
            let (draft, id) = read_draft(file)?.add_variant();
            println!("Added color {}", id);
            draft
        }

        DraftCommand::RemoveVariant { variant } => {
            read_draft(file)?.apply(DraftAction::RemoveVariant { variant_id: variant })?
        }

        DraftCommand::AddSize { variant } => {
            let (draft, id) = read_draft(file)?.add_size(&variant)?;
            println!("Added size {}", id);
            draft
        }

        DraftCommand::RemoveSize { variant, size } => {
            read_draft(file)?.apply(DraftAction::RemoveSize {
                variant_id: variant,
                size_id: size,
            })?
        }

        DraftCommand::SetColor { variant, hex, name } => {
            read_draft(file)?.apply(DraftAction::EditVariantColor {
                variant_id: variant,
                name,
                hex,
            })?
        }

        DraftCommand::Swatch { variant, name } => {
            let entry = color::swatch(&name)
                .with_context(|| format!("No palette color named '{}'", name))?;
            let chosen = ColorMatch::from_swatch(entry);
            read_draft(file)?.apply(DraftAction::EditVariantColor {
                variant_id: variant,
                name: chosen.name,
                hex: chosen.hex,
            })?
        }

        DraftCommand::PickColor {
            variant,
            hex,
            config,
        } => {
            let classifier = Config::resolve(config.as_deref())?.sync.classifier();
            let draft = read_draft(file)?.pick_color(&variant, hex, &classifier)?;
            if let Some(v) = draft.variant(&variant) {
                println!("Color set to {} ({})", v.color_name, v.color_hex);
            }
            draft
        }

        DraftCommand::SetStock { size, stock } => {
            read_draft(file)?.apply(DraftAction::EditSizeStock {
                size_id: size,
                stock,
            })?
        }

        DraftCommand::SetSize {
            variant,
            size,
            code,
        } => read_draft(file)?.apply(DraftAction::EditSizeCode {
            variant_id: variant,
            size_id: size,
            code,
        })?,
    };

    write_draft(file, &next)
}

fn lifecycle_marker(lifecycle: Lifecycle) -> &'static str {
    match lifecycle {
        Lifecycle::New => "+",
        Lifecycle::Persisted => " ",
        Lifecycle::Deleted => "-",
    }
}

fn print_draft(draft: &VariantDraft) {
    let product = draft.product();
    println!(
        "{} [{}] {} (MRP {}, selling {})",
        product.name,
        product.sku,
        product.id.as_deref().unwrap_or("unsaved"),
        product.price,
        product.discount_price
    );
    for variant in draft.variants() {
        println!(
            "{} {} {} {}",
            lifecycle_marker(variant.lifecycle),
            variant.id,
            variant.color_name,
            variant.color_hex
        );
        for slot in &variant.sizes {
            println!(
                "    {} {} {} stock {}",
                lifecycle_marker(slot.lifecycle),
                slot.id,
                slot.code,
                slot.stock
            );
        }
        if variant.is_active()
            && let Ok(free) = draft.available_codes(&variant.id, None)
            && !free.is_empty()
        {
            let free: Vec<_> = free.iter().map(SizeCode::as_str).collect();
            println!("    free: {}", free.join(", "));
        }
    }
}

fn print_report(report: &ReconciliationReport) {
    match report {
        ReconciliationReport::Fatal { anchor, error } => {
            println!("❌ {} failed: {}", anchor.name(), error);
        }
        ReconciliationReport::Success { product, outcomes }
        | ReconciliationReport::PartialFailure { product, outcomes } => {
            println!("Product {} ({})", product.id, product.slug);
            for outcome in outcomes {
                let status = match &outcome.status {
                    OperationStatus::Failed(error) => format!("❌ {}", error),
                    _ => "✅".to_string(),
                };
                println!(
                    "  {} {} {}",
                    outcome.operation.name(),
                    outcome.operation.variant_id(),
                    status
                );
            }
        }
    }
}

fn token_command(
    name: Option<String>,
    list: bool,
    revoke: Option<String>,
    config: Option<PathBuf>,
) -> Result<()> {
    let path = match config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut cfg = if path.exists() {
        Config::load_from(&path)?
    } else {
        Config::default()
    };

    if list {
        if cfg.tokens.is_empty() {
            println!("No API tokens in {}", path.display());
        }
        for entry in &cfg.tokens {
            let kind = if entry.token_hash.starts_with("$argon2") {
                "hashed"
            } else {
                "plain"
            };
            println!("  {} ({})", entry.name, kind);
        }
        return Ok(());
    }

    if let Some(label) = revoke {
        let before = cfg.tokens.len();
        cfg.tokens.retain(|t| t.name != label);
        if cfg.tokens.len() == before {
            bail!("No token named '{}' in {}", label, path.display());
        }
        cfg.save_to(&path)?;
        println!("Revoked '{}'", label);
        return Ok(());
    }

    let label = name.unwrap_or_else(|| "default".to_string());
    if cfg.tokens.iter().any(|t| t.name == label) {
        bail!("A token named '{}' exists; revoke it first", label);
    }

    let token = generate_token();
    cfg.tokens.push(config::TokenConfig {
        name: label.clone(),
        token_hash: config::hash_token(&token)?,
    });
    cfg.save_to(&path)?;

    println!("Issued token '{}' (stored hashed in {})", label, path.display());
    println!();
    println!("  Authorization: Bearer {}", token);
    println!();
    println!("It is shown only once.");
    Ok(())
}

fn generate_token() -> String {
    use rand::Rng;
    use rand::distr::Alphanumeric;

    let body: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(40)
        .map(char::from)
        .collect();
    format!("vst_{}", body)
}
