//! Human-readable listing IDs: a two-letter type prefix plus a sequence number.

use crate::db::Database;
use crate::text::chave;
use crate::AppResult;

pub const PREFIXO_PADRAO: &str = "IM";
const DIGITOS: usize = 3;

const PREFIXOS: &[(&str, &str)] = &[
    ("casa", "CA"),
    ("apartamento", "AP"),
    ("terreno", "TE"),
    ("chacara", "CH"),
    ("sitio", "SI"),
    ("fazenda", "FA"),
    ("sala comercial", "SC"),
    ("galpao", "GA"),
    ("kitnet", "KI"),
    ("sobrado", "SO"),
    ("cobertura", "CO"),
    ("loja", "LO"),
    ("predio comercial", "PC"),
];

pub fn obter_prefixo_tipo(tipo: &str) -> &'static str {
    let alvo = chave(tipo);
    PREFIXOS
        .iter()
        .find(|(nome, _)| *nome == alvo)
        .map(|(_, prefixo)| *prefixo)
        .unwrap_or(PREFIXO_PADRAO)
}

/// Numeric suffix of `id` when it carries `prefixo`.
pub fn sufixo_numerico(id: &str, prefixo: &str) -> Option<u64> {
    let resto = id.strip_prefix(prefixo)?;
    if resto.is_empty() || !resto.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    resto.parse().ok()
}

pub fn formatar_id(prefixo: &str, numero: u64) -> String {
    format!("{prefixo}{numero:0width$}", width = DIGITOS)
}

/// Next free ID for `tipo`: numerically largest existing suffix plus one.
///
/// Longer IDs sort first so `CA1000` outranks `CA999`.
pub async fn gerar_proximo_id(db: &Database, tipo: &str) -> AppResult<String> {
    let prefixo = obter_prefixo_tipo(tipo);
    let row = db
        .prepare(
            "SELECT id FROM imoveis WHERE id LIKE ? \
             ORDER BY LENGTH(id) DESC, id DESC LIMIT 1",
        )
        .get(&[format!("{prefixo}%").into()])
        .await?;
    let atual = row
        .and_then(|r| r.text("id"))
        .and_then(|id| sufixo_numerico(&id, prefixo))
        .unwrap_or(0);
    let id = formatar_id(prefixo, atual + 1);
    tracing::debug!(target: "imobiliaria", event = "id_allocated", tipo = %tipo, id = %id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_types_map_to_prefixes() {
        assert_eq!(obter_prefixo_tipo("Casa"), "CA");
        assert_eq!(obter_prefixo_tipo("Apartamento"), "AP");
        assert_eq!(obter_prefixo_tipo("Chácara"), "CH");
        assert_eq!(obter_prefixo_tipo("SÍTIO"), "SI");
        assert_eq!(obter_prefixo_tipo("  sala   comercial "), "SC");
        assert_eq!(obter_prefixo_tipo("Galpão"), "GA");
        assert_eq!(obter_prefixo_tipo("Prédio Comercial"), "PC");
    }

    #[test]
    fn unknown_types_fall_back() {
        assert_eq!(obter_prefixo_tipo("Castelo"), PREFIXO_PADRAO);
        assert_eq!(obter_prefixo_tipo(""), PREFIXO_PADRAO);
    }

    #[test]
    fn suffix_requires_digits() {
        assert_eq!(sufixo_numerico("CA007", "CA"), Some(7));
        assert_eq!(sufixo_numerico("CA1000", "CA"), Some(1000));
        assert_eq!(sufixo_numerico("CAX01", "CA"), None);
        assert_eq!(sufixo_numerico("CA", "CA"), None);
        assert_eq!(sufixo_numerico("AP001", "CA"), None);
    }

    #[test]
    fn padding_is_three_digits() {
        assert_eq!(formatar_id("CA", 1), "CA001");
        assert_eq!(formatar_id("CA", 42), "CA042");
        assert_eq!(formatar_id("CA", 1000), "CA1000");
    }

    proptest! {
        #[test]
        fn format_then_parse_is_identity(n in 0u64..1_000_000) {
            let id = formatar_id("AP", n);
            prop_assert_eq!(sufixo_numerico(&id, "AP"), Some(n));
        }
    }
}
