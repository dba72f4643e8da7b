use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use imobiliaria_lib::image_migration::{migrate_images, MigrationOptions};
use imobiliaria_lib::images::{ImageStore, ImageUpload, LocalImageStore, StoredImage};
use imobiliaria_lib::model::Foto;
use imobiliaria_lib::repo::imoveis;
use imobiliaria_lib::{AppError, AppResult};
#[path = "util.rs"]
mod util;

const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00";
const CLOUD: &str = "https://res.cloudinary.com/demo/image/upload/v1/imoveis";

/// Stands in for Cloudinary: remote URLs containing "quebrada" fail.
#[derive(Default)]
struct FakeCloud {
    uploads: Mutex<Vec<String>>,
}

impl FakeCloud {
    fn stored(&self, origem: &str) -> StoredImage {
        let mut uploads = self.uploads.lock().expect("lock");
        uploads.push(origem.to_string());
        let public_id = format!("imoveis/foto{}", uploads.len());
        StoredImage {
            url: format!("{CLOUD}/foto{}.jpg", uploads.len()),
            public_id,
            format: "jpg".into(),
            bytes: 1,
        }
    }
}

#[async_trait]
impl ImageStore for FakeCloud {
    fn kind(&self) -> &'static str {
        "fake"
    }

    async fn upload(&self, upload: ImageUpload) -> AppResult<StoredImage> {
        Ok(self.stored(&upload.filename.unwrap_or_default()))
    }

    async fn upload_remote(&self, url: &str) -> AppResult<StoredImage> {
        if url.contains("quebrada") {
            return Err(AppError::new("IMAGES/PROVIDER", "404 ao buscar imagem"));
        }
        Ok(self.stored(url))
    }

    async fn delete(&self, _public_id: &str) -> AppResult<bool> {
        Ok(true)
    }

    fn public_id_for(&self, _url: &str) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn migrates_pending_photos_and_keeps_failures() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let local = LocalImageStore::new(tmp.path(), "http://localhost:3001");
    std::fs::write(tmp.path().join("local.gif"), GIF)?;
    let db = util::memory_db().await;

    let mut casa = util::imovel("Casa", "Casa A", 1.0);
    casa.fotos = vec![
        Foto {
            destaque: true,
            ..Foto::new("http://localhost:3001/uploads/local.gif")
        },
        Foto::new("https://antigo.exemplo.com/quebrada.jpg"),
        Foto::new(format!("{CLOUD}/ja.jpg")),
    ];
    let casa = imoveis::criar(&db, casa).await?;
    let mut apto = util::imovel("Apartamento", "Apto", 1.0);
    apto.fotos = vec![Foto::new(format!("{CLOUD}/outra.jpg"))];
    let apto = imoveis::criar(&db, apto).await?;

    let cloud = FakeCloud::default();
    let summary = migrate_images(&db, &cloud, &local, &MigrationOptions::default()).await?;

    assert_eq!(summary.imoveis, 2);
    assert_eq!(summary.fotos, 4);
    assert_eq!(summary.migradas, 1);
    assert_eq!(summary.ja_migradas, 2);
    assert_eq!(summary.falhas.len(), 1);
    assert_eq!(summary.falhas[0].imovel_id, casa.id);
    assert_eq!(summary.imoveis_atualizados, 1);
    assert_eq!(cloud.uploads.lock().expect("lock").as_slice(), ["local.gif"]);

    let depois = imoveis::obter(&db, &casa.id).await?;
    assert!(depois.fotos[0].url.starts_with(CLOUD));
    assert_eq!(depois.fotos[0].public_id.as_deref(), Some("imoveis/foto1"));
    assert!(depois.fotos[0].destaque);
    assert_eq!(depois.fotos[1].url, "https://antigo.exemplo.com/quebrada.jpg");
    assert_eq!(depois.fotos[2].url, format!("{CLOUD}/ja.jpg"));

    let intacto = imoveis::obter(&db, &apto.id).await?;
    assert_eq!(intacto.updated_at, apto.updated_at);
    Ok(())
}

#[tokio::test]
async fn dry_run_changes_nothing() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let local = LocalImageStore::new(tmp.path(), "http://localhost:3001");
    let db = util::memory_db().await;
    let casa = imoveis::criar(&db, util::imovel("Casa", "Casa A", 1.0)).await?;

    let cloud = FakeCloud::default();
    let options = MigrationOptions {
        dry_run: true,
        ..MigrationOptions::default()
    };
    let summary = migrate_images(&db, &cloud, &local, &options).await?;
    assert_eq!(summary.fotos, 1);
    assert_eq!(summary.pendentes(), 1);
    assert_eq!(summary.imoveis_atualizados, 0);
    assert!(cloud.uploads.lock().expect("lock").is_empty());
    assert_eq!(imoveis::obter(&db, &casa.id).await?.fotos, casa.fotos);
    Ok(())
}
