//! The visitor's own contact details, remembered between lead submissions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::NovoLead;
use crate::AppResult;

const APP_DIR: &str = "imobiliaria";
const FILE_NAME: &str = "contato.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContatoLocal {
    pub nome: String,
    pub telefone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ContatoLocal {
    pub fn from_lead(lead: &NovoLead) -> Self {
        Self {
            nome: lead.cliente_nome.clone(),
            telefone: lead.cliente_telefone.clone(),
            email: lead.cliente_email.clone(),
        }
    }

    /// Pre-fill a submission for `imovel_id`.
    pub fn novo_lead(&self, imovel_id: &str, mensagem: Option<String>) -> NovoLead {
        NovoLead {
            imovel_id: imovel_id.to_string(),
            cliente_nome: self.nome.clone(),
            cliente_telefone: self.telefone.clone(),
            cliente_email: self.email.clone(),
            mensagem,
            origem: Some("cli".to_string()),
        }
    }
}

/// `<data dir>/imobiliaria/contato.json`.
pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR).join(FILE_NAME))
}

/// A missing or unreadable file yields `None`.
pub fn carregar(path: &Path) -> Option<ContatoLocal> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(contato) => Some(contato),
        Err(err) => {
            tracing::warn!(target: "imobiliaria", event = "contato_local_invalid", path = %path.display(), error = %err);
            None
        }
    }
}

pub fn salvar(path: &Path, contato: &ContatoLocal) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(contato)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
