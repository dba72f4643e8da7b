//! Move listing photos onto the configured remote image store.
//!
//! Every photo whose URL is not already on Cloudinary is uploaded, either from
//! the local upload directory or by fetching its remote URL. A failed photo keeps
//! its original URL and is reported; a listing's `fotos` column is only rewritten
//! when at least one photo changed.

use std::time::Duration;

use serde::Serialize;

use crate::db::Database;
use crate::images::{is_cloudinary_url, ImageStore, ImageUpload, LocalImageStore};
use crate::model::Foto;
use crate::repo::imoveis::{self, ImovelFiltro};
use crate::AppResult;

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Pause between uploads, to stay under provider rate limits.
    pub delay: Duration,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoFailure {
    pub imovel_id: String,
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub imoveis: usize,
    pub imoveis_atualizados: usize,
    pub fotos: usize,
    pub migradas: usize,
    pub ja_migradas: usize,
    pub falhas: Vec<PhotoFailure>,
}

impl MigrationSummary {
    pub fn pendentes(&self) -> usize {
        self.fotos
            .saturating_sub(self.ja_migradas + self.migradas + self.falhas.len())
    }
}

/// Upload one photo through `target`. Local uploads are read from disk, anything else is fetched.
async fn migrate_photo(
    foto: &Foto,
    target: &dyn ImageStore,
    local: &LocalImageStore,
) -> AppResult<Foto> {
    let stored = match local.public_id_for(&foto.url) {
        Some(name) => {
            let bytes = local.read(&name).await?;
            target
                .upload(ImageUpload {
                    bytes,
                    filename: Some(name),
                })
                .await?
        }
        None => target.upload_remote(&foto.url).await?,
    };
    Ok(Foto {
        url: stored.url,
        public_id: Some(stored.public_id),
        ..foto.clone()
    })
}

pub async fn migrate_images(
    db: &Database,
    target: &dyn ImageStore,
    local: &LocalImageStore,
    options: &MigrationOptions,
) -> AppResult<MigrationSummary> {
    let filtro = ImovelFiltro {
        incluir_inativos: true,
        ..ImovelFiltro::default()
    };
    let todos = imoveis::listar(db, &filtro, None).await?.data;
    let mut summary = MigrationSummary {
        imoveis: todos.len(),
        ..MigrationSummary::default()
    };
    let mut first_upload = true;

    for imovel in todos {
        let mut fotos = imovel.fotos.clone();
        let mut changed = false;
        for foto in fotos.iter_mut() {
            summary.fotos += 1;
            if is_cloudinary_url(&foto.url) {
                summary.ja_migradas += 1;
                continue;
            }
            if options.dry_run {
                tracing::info!(target: "imobiliaria", event = "image_migration_pending", imovel_id = %imovel.id, url = %foto.url);
                continue;
            }
            if !first_upload && !options.delay.is_zero() {
                tokio::time::sleep(options.delay).await;
            }
            first_upload = false;
            match migrate_photo(foto, target, local).await {
                Ok(migrada) => {
                    tracing::info!(
                        target: "imobiliaria",
                        event = "image_migrated",
                        imovel_id = %imovel.id,
                        from = %foto.url,
                        to = %migrada.url,
                    );
                    *foto = migrada;
                    summary.migradas += 1;
                    changed = true;
                }
                Err(err) => {
                    tracing::warn!(
                        target: "imobiliaria",
                        event = "image_migration_failed",
                        imovel_id = %imovel.id,
                        url = %foto.url,
                        code = %err.code,
                        error = %err.message,
                    );
                    summary.falhas.push(PhotoFailure {
                        imovel_id: imovel.id.clone(),
                        url: foto.url.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        if changed {
            imoveis::atualizar_fotos(db, &imovel.id, &fotos).await?;
            summary.imoveis_atualizados += 1;
        }
    }

    tracing::info!(
        target: "imobiliaria",
        event = "image_migration_finished",
        imoveis = summary.imoveis,
        atualizados = summary.imoveis_atualizados,
        migradas = summary.migradas,
        falhas = summary.falhas.len(),
        dry_run = options.dry_run,
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_counts_what_was_not_touched() {
        let summary = MigrationSummary {
            fotos: 5,
            ja_migradas: 1,
            migradas: 2,
            falhas: vec![PhotoFailure {
                imovel_id: "CA001".into(),
                url: "http://x/a.jpg".into(),
                error: "boom".into(),
            }],
            ..MigrationSummary::default()
        };
        assert_eq!(summary.pendentes(), 1);
    }
}
