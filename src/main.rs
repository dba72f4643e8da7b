use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use imobiliaria_lib::client::{ApiClient, CatalogoFiltro, ListState};
use imobiliaria_lib::config::Config;
use imobiliaria_lib::db::{self, Database, CONNECT_ATTEMPTS};
use imobiliaria_lib::id::gerar_proximo_id;
use imobiliaria_lib::image_migration::{migrate_images, MigrationOptions};
use imobiliaria_lib::images::{CloudinaryStore, LocalImageStore};
use imobiliaria_lib::repo::imoveis;
use imobiliaria_lib::state::AppState;
use imobiliaria_lib::{http, logging, migrate};

#[derive(Debug, Parser)]
#[command(name = "imobiliaria", about = "Real-estate listing API", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API (default).
    Serve,
    /// Apply pending schema migrations and exit.
    Migrate,
    /// Print the next listing ID for a property type.
    NextId {
        #[arg(long)]
        tipo: String,
    },
    /// Upload every listing photo that is not yet on Cloudinary.
    MigrateImages {
        /// Pause between uploads.
        #[arg(long, default_value_t = 500)]
        delay_ms: u64,
        /// Report what would be migrated without uploading.
        #[arg(long)]
        dry_run: bool,
    },
    /// Browse the public catalog of a running API.
    Catalogo {
        #[arg(long, default_value = "http://localhost:3001")]
        url: String,
        #[arg(long)]
        tipo: Option<String>,
        #[arg(long)]
        cidade: Option<String>,
        #[arg(long)]
        busca: Option<String>,
        /// data_desc, data_asc, preco_asc or preco_desc.
        #[arg(long)]
        ordenacao: Option<String>,
        /// Pages to fetch.
        #[arg(long, default_value_t = 1)]
        paginas: u32,
    },
}

#[tokio::main]
async fn main() {
    let config = Config::load();
    let _log_guard = logging::init(&config);
    config.log_warnings();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => run_migrate(&config).await,
        Commands::NextId { tipo } => next_id(&config, &tipo).await,
        Commands::MigrateImages { delay_ms, dry_run } => {
            let options = MigrationOptions {
                delay: Duration::from_millis(delay_ms),
                dry_run,
            };
            run_migrate_images(&config, &options).await
        }
        Commands::Catalogo {
            url,
            tipo,
            cidade,
            busca,
            ordenacao,
            paginas,
        } => {
            let filtro = CatalogoFiltro {
                tipo,
                cidade,
                busca,
                ordenacao,
                ..CatalogoFiltro::default()
            };
            catalogo(&url, filtro, paginas).await
        }
    };
    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn open(config: &Config) -> Result<Database> {
    let target = &config.database;
    let db = db::connect_with_retry(target, CONNECT_ATTEMPTS)
        .await
        .with_context(|| format!("connecting to {}", target.redacted()))?;
    migrate::apply_migrations(&db)
        .await
        .context("applying migrations")?;
    imoveis::reindexar_chaves(&db)
        .await
        .context("backfilling listing keys")?;
    Ok(db)
}

async fn serve(config: Config) -> Result<()> {
    if !config.jwt_secret_configured {
        tracing::warn!(
            target: "imobiliaria",
            event = "jwt_secret_default",
            "JWT_SECRET not set; tokens are signed with a generated secret and die with the process"
        );
    }
    // The API starts degraded rather than refusing to boot without a database.
    let db = match open(&config).await {
        Ok(db) => Some(db),
        Err(err) => {
            tracing::error!(target: "imobiliaria", event = "db_unavailable", error = %format!("{err:#}"));
            None
        }
    };
    let addr = config.bind_addr().context("invalid HOST/PORT")?;
    let state = AppState::from_config(config, db);
    http::serve(state, addr).await
}

async fn run_migrate(config: &Config) -> Result<()> {
    let db = db::connect_with_retry(&config.database, CONNECT_ATTEMPTS).await?;
    let report = migrate::apply_migrations(&db).await?;
    println!(
        "{} applied, {} already present",
        report.applied.len(),
        report.skipped.len()
    );
    for file in &report.applied {
        println!("  + {file}");
    }
    db.close().await;
    Ok(())
}

async fn next_id(config: &Config, tipo: &str) -> Result<()> {
    let db = open(config).await?;
    println!("{}", gerar_proximo_id(&db, tipo).await?);
    db.close().await;
    Ok(())
}

async fn run_migrate_images(config: &Config, options: &MigrationOptions) -> Result<()> {
    let cloudinary = config
        .cloudinary
        .clone()
        .context("CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET are required")?;
    let target = CloudinaryStore::new(cloudinary)?;
    let local = LocalImageStore::new(&config.upload_dir, &config.public_base());
    let db = open(config).await?;

    let summary = migrate_images(&db, &target, &local, options).await?;
    db.close().await;

    println!(
        "{} listings, {} photos: {} migrated, {} already on Cloudinary, {} failed{}",
        summary.imoveis,
        summary.fotos,
        summary.migradas,
        summary.ja_migradas,
        summary.falhas.len(),
        if options.dry_run { " (dry run)" } else { "" },
    );
    println!("{} listings updated", summary.imoveis_atualizados);
    for falha in &summary.falhas {
        println!("  ! {} {}: {}", falha.imovel_id, falha.url, falha.error);
    }
    Ok(())
}

async fn catalogo(url: &str, filtro: CatalogoFiltro, paginas: u32) -> Result<()> {
    let client = ApiClient::new(url)?;
    let mut state = ListState::new(filtro.clone());
    let mut ticket = Some(state.replace(filtro));

    while let Some(current) = ticket {
        let result = client
            .listar_imoveis(state.filters(), Some(current.page_request()))
            .await
            .map_err(|err| err.to_string());
        state.resolve(current, result);
        if let Some(message) = state.error() {
            anyhow::bail!("{message}");
        }
        let fetched = state.pagination().map(|p| p.page).unwrap_or(1);
        ticket = if fetched < paginas { state.append() } else { None };
    }

    for imovel in state.items() {
        println!(
            "{:<8} {:<14} {:>14.2}  {} ({})",
            imovel.id, imovel.tipo, imovel.preco, imovel.titulo, imovel.endereco.cidade
        );
    }
    if let Some(p) = state.pagination() {
        println!(
            "{} of {} listings (page {}/{})",
            state.items().len(),
            p.total,
            p.page,
            p.total_pages
        );
    }
    Ok(())
}
