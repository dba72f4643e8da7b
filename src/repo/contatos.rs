use crate::db::{Database, DbRow};
use crate::model::ContatoCliente;
use crate::time::now_iso;
use crate::validation::apenas_digitos;
use crate::AppResult;

/// Identity key: lowercased email, else the phone digits.
pub fn chave_contato(email: Option<&str>, telefone: &str) -> Option<String> {
    if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
        return Some(email.to_lowercase());
    }
    let digitos = apenas_digitos(telefone);
    (!digitos.is_empty()).then_some(digitos)
}

fn contato_from_row(row: &DbRow) -> ContatoCliente {
    ContatoCliente {
        nome: row.text("nome").unwrap_or_default(),
        telefone: row.text("telefone").filter(|t| !t.is_empty()),
        email: row.text("email").filter(|e| !e.is_empty()),
        total_leads: row.integer("totalLeads").unwrap_or(0),
        updated_at: row.text("updatedAt").unwrap_or_default(),
    }
}

/// Upsert the submitting client and bump their lead counter.
pub async fn registrar(
    db: &Database,
    nome: &str,
    telefone: &str,
    email: Option<&str>,
) -> AppResult<Option<String>> {
    let Some(chave) = chave_contato(email, telefone) else {
        return Ok(None);
    };
    let agora = now_iso();
    let telefone = Some(telefone.trim()).filter(|t| !t.is_empty());
    db.prepare(
        "INSERT INTO contatos_cliente (chave, nome, telefone, email, totalLeads, createdAt, updatedAt) \
         VALUES (?, ?, ?, ?, 1, ?, ?) \
         ON CONFLICT (chave) DO UPDATE SET \
           nome = excluded.nome, \
           telefone = COALESCE(excluded.telefone, contatos_cliente.telefone), \
           email = COALESCE(excluded.email, contatos_cliente.email), \
           totalLeads = contatos_cliente.totalLeads + 1, \
           updatedAt = excluded.updatedAt",
    )
    .run(&[
        chave.as_str().into(),
        nome.trim().into(),
        telefone.into(),
        email.map(|e| e.trim().to_lowercase()).into(),
        agora.as_str().into(),
        agora.as_str().into(),
    ])
    .await?;
    Ok(Some(chave))
}

pub async fn buscar(db: &Database, chave: &str) -> AppResult<Option<ContatoCliente>> {
    Ok(db
        .prepare("SELECT * FROM contatos_cliente WHERE chave = ?")
        .get(&[chave.into()])
        .await?
        .as_ref()
        .map(contato_from_row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_wins_over_phone() {
        assert_eq!(
            chave_contato(Some(" Ana@Exemplo.com "), "(11) 98765-4321").as_deref(),
            Some("ana@exemplo.com")
        );
        assert_eq!(
            chave_contato(None, "(11) 98765-4321").as_deref(),
            Some("11987654321")
        );
        assert_eq!(chave_contato(Some(""), "sem telefone"), None);
    }
}
