#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use imobiliaria_lib::config::Config;
use imobiliaria_lib::db::Database;
use imobiliaria_lib::images::LocalImageStore;
use imobiliaria_lib::mail::{Mailer, RecordingMailer};
use imobiliaria_lib::migrate;
use imobiliaria_lib::model::{Endereco, Foto, Imovel, NovoLead};
use imobiliaria_lib::state::AppState;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub const ADMIN: &str = "dono@imob.com";

/// Single-connection in-memory pool with the schema applied.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    migrate::apply_migrations(&Database::sqlite(pool.clone()))
        .await
        .expect("migrations");
    pool
}

pub async fn memory_db() -> Database {
    Database::sqlite(memory_pool().await)
}

pub fn config(upload_dir: &Path) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("JWT_SECRET", "segredo-de-teste".to_string()),
        ("ADMIN_EMAILS", ADMIN.to_string()),
        ("LEADS_NOTIFY_EMAIL", "leads@imob.com".to_string()),
        ("UPLOAD_DIR", upload_dir.display().to_string()),
        ("PUBLIC_BASE_URL", "http://localhost:3001".to_string()),
    ]);
    Config::from_env(&move |key: &str| -> Option<String> { vars.get(key).cloned() })
}

/// App state over `db` with a recording mailer and local image storage.
pub fn state(db: Option<Database>, upload_dir: &Path) -> (AppState, Arc<RecordingMailer>) {
    let mailer = Arc::new(RecordingMailer::new());
    let state = state_with_mailer(db, upload_dir, mailer.clone());
    (state, mailer)
}

pub fn state_with_mailer(db: Option<Database>, upload_dir: &Path, mailer: Arc<dyn Mailer>) -> AppState {
    let config = config(upload_dir);
    let images = Arc::new(LocalImageStore::new(upload_dir, &config.public_base()));
    AppState::new(config, db, mailer, images)
}

pub fn imovel(tipo: &str, titulo: &str, preco: f64) -> Imovel {
    Imovel {
        categoria: "venda".into(),
        tipo: tipo.into(),
        titulo: titulo.into(),
        descricao: format!("{titulo} com quintal"),
        preco,
        endereco: Endereco {
            bairro: "Centro".into(),
            cidade: "Campinas".into(),
            estado: "SP".into(),
            ..Endereco::default()
        },
        quartos: Some(3),
        fotos: vec![Foto::new("https://exemplo.com/a.jpg")],
        ..Imovel::default()
    }
}

pub fn lead(imovel_id: &str) -> NovoLead {
    NovoLead {
        imovel_id: imovel_id.into(),
        cliente_nome: "Ana Souza".into(),
        cliente_telefone: "(11) 98765-4321".into(),
        cliente_email: Some("Ana@Example.com".into()),
        mensagem: Some("Tenho interesse".into()),
        origem: None,
    }
}
