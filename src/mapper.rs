//! Flat database rows ↔ nested domain records.
//!
//! `ImovelRow` mirrors the `imoveis` table one field per column; converting it
//! into `Imovel` is where nesting happens. The conversion is pure and total:
//! malformed `fotos` text becomes an empty list, absent columns become `None`,
//! `false` or an empty string.

use serde_json::Value;

use crate::area::{para_metros_quadrados, AlqueireTipo};
use crate::db::{DbRow, SqlValue};
use crate::text::chave_opcional;
use crate::model::{
    Condominio, DadosApartamento, DadosRurais, Endereco, FichaTecnica, Foto, Imovel, ImovelResumo,
    Lead, Proprietario,
};

macro_rules! flat_row {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $field:ident : $ty:ty => $read:ident($col:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $( pub $field: $ty, )+
        }

        impl $name {
            /// Column names in parameter order.
            pub const COLUMNS: &'static [&'static str] = &[ $( $col ),+ ];

            pub fn from_db_row(row: &DbRow) -> Self {
                Self {
                    $( $field: row.$read($col), )+
                }
            }

            /// Values in `COLUMNS` order, ready to bind.
            pub fn to_params(&self) -> Vec<SqlValue> {
                vec![ $( SqlValue::from(self.$field.clone()), )+ ]
            }
        }
    };
}

flat_row! {
    /// One `imoveis` row.
    pub struct ImovelRow {
        id: Option<String> => text("id"),
        categoria: Option<String> => text("categoria"),
        tipo: Option<String> => text("tipo"),
        titulo: Option<String> => text("titulo"),
        descricao: Option<String> => text("descricao"),
        preco: Option<f64> => number("preco"),
        ativo: bool => flag("ativo"),
        endereco_rua: Option<String> => text("enderecoRua"),
        endereco_numero: Option<String> => text("enderecoNumero"),
        endereco_complemento: Option<String> => text("enderecoComplemento"),
        endereco_bairro: Option<String> => text("enderecoBairro"),
        endereco_cidade: Option<String> => text("enderecoCidade"),
        endereco_estado: Option<String> => text("enderecoEstado"),
        endereco_cep: Option<String> => text("enderecoCep"),
        latitude: Option<f64> => number("latitude"),
        longitude: Option<f64> => number("longitude"),
        area_total: Option<f64> => number("areaTotal"),
        area_construida: Option<f64> => number("areaConstruida"),
        quartos: Option<i64> => integer("quartos"),
        suites: Option<i64> => integer("suites"),
        banheiros: Option<i64> => integer("banheiros"),
        vagas: Option<i64> => integer("vagas"),
        apto_andar: Option<i64> => integer("aptoAndar"),
        apto_numero: Option<String> => text("aptoNumero"),
        apto_bloco: Option<String> => text("aptoBloco"),
        apto_valor_condominio: Option<f64> => number("aptoValorCondominio"),
        apto_elevador: bool => flag("aptoElevador"),
        apto_portaria24h: bool => flag("aptoPortaria24h"),
        apto_sacada: bool => flag("aptoSacada"),
        cond_nome: Option<String> => text("condNome"),
        cond_piscina: bool => flag("condPiscina"),
        cond_academia: bool => flag("condAcademia"),
        cond_churrasqueira: bool => flag("condChurrasqueira"),
        cond_salao_festas: bool => flag("condSalaoFestas"),
        cond_playground: bool => flag("condPlayground"),
        cond_quadra: bool => flag("condQuadra"),
        cond_seguranca24h: bool => flag("condSeguranca24h"),
        cond_portao_eletronico: bool => flag("condPortaoEletronico"),
        rural_area_alqueires: Option<f64> => number("ruralAreaAlqueires"),
        rural_tipo_alqueire: Option<String> => text("ruralTipoAlqueire"),
        rural_distancia_cidade_km: Option<f64> => number("ruralDistanciaCidadeKm"),
        rural_casa_sede: bool => flag("ruralCasaSede"),
        rural_curral: bool => flag("ruralCurral"),
        rural_represa: bool => flag("ruralRepresa"),
        rural_rio: bool => flag("ruralRio"),
        rural_pasto: bool => flag("ruralPasto"),
        rural_plantacao: bool => flag("ruralPlantacao"),
        rural_energia_eletrica: bool => flag("ruralEnergiaEletrica"),
        rural_poco_artesiano: bool => flag("ruralPocoArtesiano"),
        ficha_ano_construcao: Option<i64> => integer("fichaAnoConstrucao"),
        ficha_documentacao: Option<String> => text("fichaDocumentacao"),
        ficha_iptu_anual: Option<f64> => number("fichaIptuAnual"),
        ficha_posicao_solar: Option<String> => text("fichaPosicaoSolar"),
        ficha_mobiliado: bool => flag("fichaMobiliado"),
        ficha_aceita_financiamento: bool => flag("fichaAceitaFinanciamento"),
        ficha_aceita_permuta: bool => flag("fichaAceitaPermuta"),
        ficha_escriturado: bool => flag("fichaEscriturado"),
        fotos: Option<String> => text("fotos"),
        video_url: Option<String> => text("videoUrl"),
        proprietario_nome: Option<String> => text("proprietarioNome"),
        proprietario_telefone: Option<String> => text("proprietarioTelefone"),
        proprietario_email: Option<String> => text("proprietarioEmail"),
        proprietario_cpf: Option<String> => text("proprietarioCpf"),
        proprietario_observacoes: Option<String> => text("proprietarioObservacoes"),
        created_at: Option<String> => text("createdAt"),
        updated_at: Option<String> => text("updatedAt"),
        busca_chave: Option<String> => text("buscaChave"),
        categoria_chave: Option<String> => text("categoriaChave"),
        tipo_chave: Option<String> => text("tipoChave"),
        cidade_chave: Option<String> => text("cidadeChave"),
        bairro_chave: Option<String> => text("bairroChave"),
    }
}

flat_row! {
    /// One `leads` row, optionally joined with its listing's summary columns.
    pub struct LeadRow {
        id: Option<i64> => integer("id"),
        imovel_id: Option<String> => text("imovelId"),
        cliente_nome: Option<String> => text("clienteNome"),
        cliente_telefone: Option<String> => text("clienteTelefone"),
        cliente_email: Option<String> => text("clienteEmail"),
        mensagem: Option<String> => text("mensagem"),
        origem: Option<String> => text("origem"),
        visualizado: bool => flag("visualizado"),
        created_at: Option<String> => text("createdAt"),
        imovel_titulo: Option<String> => text("imovelTitulo"),
        imovel_tipo: Option<String> => text("imovelTipo"),
        imovel_preco: Option<f64> => number("imovelPreco"),
    }
}

/// Parse the `fotos` text column. Accepts objects or bare URL strings; anything
/// unparseable yields an empty list.
pub fn parse_fotos(raw: Option<&str>) -> Vec<Foto> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(url) => Some(Foto::new(url)),
            other @ Value::Object(_) => serde_json::from_value::<Foto>(other).ok(),
            _ => None,
        })
        .collect()
}

pub fn serialize_fotos(fotos: &[Foto]) -> String {
    serde_json::to_string(fotos).unwrap_or_else(|_| "[]".to_string())
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn blank_if_none(value: &Option<String>) -> Option<String> {
    none_if_blank(value.clone())
}

fn text_or_none(value: &str) -> Option<String> {
    none_if_blank(Some(value.to_string()))
}

impl From<ImovelRow> for Imovel {
    fn from(row: ImovelRow) -> Self {
        let dados_apartamento = DadosApartamento {
            andar: row.apto_andar,
            numero: none_if_blank(row.apto_numero),
            bloco: none_if_blank(row.apto_bloco),
            valor_condominio: row.apto_valor_condominio,
            elevador: row.apto_elevador,
            portaria24h: row.apto_portaria24h,
            sacada: row.apto_sacada,
        };
        let condominio = Condominio {
            nome: none_if_blank(row.cond_nome),
            piscina: row.cond_piscina,
            academia: row.cond_academia,
            churrasqueira: row.cond_churrasqueira,
            salao_festas: row.cond_salao_festas,
            playground: row.cond_playground,
            quadra: row.cond_quadra,
            seguranca24h: row.cond_seguranca24h,
            portao_eletronico: row.cond_portao_eletronico,
        };
        let tipo_alqueire = none_if_blank(row.rural_tipo_alqueire).map(|t| AlqueireTipo::parse(&t));
        let rural = DadosRurais {
            area_alqueires: row.rural_area_alqueires,
            tipo_alqueire,
            area_metros_quadrados: row
                .rural_area_alqueires
                .map(|a| para_metros_quadrados(a, tipo_alqueire.unwrap_or_default())),
            distancia_cidade_km: row.rural_distancia_cidade_km,
            casa_sede: row.rural_casa_sede,
            curral: row.rural_curral,
            represa: row.rural_represa,
            rio: row.rural_rio,
            pasto: row.rural_pasto,
            plantacao: row.rural_plantacao,
            energia_eletrica: row.rural_energia_eletrica,
            poco_artesiano: row.rural_poco_artesiano,
        };
        let ficha_tecnica = FichaTecnica {
            ano_construcao: row.ficha_ano_construcao,
            documentacao: none_if_blank(row.ficha_documentacao),
            iptu_anual: row.ficha_iptu_anual,
            posicao_solar: none_if_blank(row.ficha_posicao_solar),
            mobiliado: row.ficha_mobiliado,
            aceita_financiamento: row.ficha_aceita_financiamento,
            aceita_permuta: row.ficha_aceita_permuta,
            escriturado: row.ficha_escriturado,
        };

        Imovel {
            id: row.id.unwrap_or_default(),
            categoria: row.categoria.unwrap_or_default(),
            tipo: row.tipo.unwrap_or_default(),
            titulo: row.titulo.unwrap_or_default(),
            descricao: row.descricao.unwrap_or_default(),
            preco: row.preco.unwrap_or_default(),
            endereco: Endereco {
                rua: row.endereco_rua.unwrap_or_default(),
                numero: row.endereco_numero.unwrap_or_default(),
                complemento: row.endereco_complemento.unwrap_or_default(),
                bairro: row.endereco_bairro.unwrap_or_default(),
                cidade: row.endereco_cidade.unwrap_or_default(),
                estado: row.endereco_estado.unwrap_or_default(),
                cep: row.endereco_cep.unwrap_or_default(),
            },
            latitude: row.latitude,
            longitude: row.longitude,
            area_total: row.area_total,
            area_construida: row.area_construida,
            quartos: row.quartos,
            suites: row.suites,
            banheiros: row.banheiros,
            vagas: row.vagas,
            dados_apartamento: (dados_apartamento != DadosApartamento::default())
                .then_some(dados_apartamento),
            condominio: (condominio != Condominio::default()).then_some(condominio),
            rural: (rural != DadosRurais::default()).then_some(rural),
            ficha_tecnica: (ficha_tecnica != FichaTecnica::default()).then_some(ficha_tecnica),
            fotos: parse_fotos(row.fotos.as_deref()),
            video_url: none_if_blank(row.video_url),
            proprietario: Proprietario {
                nome: row.proprietario_nome.unwrap_or_default(),
                telefone: row.proprietario_telefone.unwrap_or_default(),
                email: row.proprietario_email.unwrap_or_default(),
                cpf: row.proprietario_cpf.unwrap_or_default(),
                observacoes: row.proprietario_observacoes.unwrap_or_default(),
            },
            ativo: row.ativo,
            created_at: row.created_at.unwrap_or_default(),
            updated_at: row.updated_at.unwrap_or_default(),
        }
    }
}

/// Text matched by catalog search: title, description and neighbourhood.
fn texto_de_busca(imovel: &Imovel) -> String {
    [
        imovel.titulo.as_str(),
        imovel.descricao.as_str(),
        imovel.endereco.bairro.as_str(),
    ]
    .join(" | ")
}

impl From<&Imovel> for ImovelRow {
    fn from(imovel: &Imovel) -> Self {
        let apto = imovel.dados_apartamento.clone().unwrap_or_default();
        let cond = imovel.condominio.clone().unwrap_or_default();
        let rural = imovel.rural.clone().unwrap_or_default();
        let ficha = imovel.ficha_tecnica.clone().unwrap_or_default();
        let end = &imovel.endereco;
        let dono = &imovel.proprietario;
        ImovelRow {
            id: text_or_none(&imovel.id),
            categoria: Some(imovel.categoria.clone()),
            tipo: Some(imovel.tipo.clone()),
            titulo: Some(imovel.titulo.clone()),
            descricao: text_or_none(&imovel.descricao),
            preco: Some(imovel.preco),
            ativo: imovel.ativo,
            endereco_rua: text_or_none(&end.rua),
            endereco_numero: text_or_none(&end.numero),
            endereco_complemento: text_or_none(&end.complemento),
            endereco_bairro: text_or_none(&end.bairro),
            endereco_cidade: text_or_none(&end.cidade),
            endereco_estado: text_or_none(&end.estado),
            endereco_cep: text_or_none(&end.cep),
            latitude: imovel.latitude,
            longitude: imovel.longitude,
            area_total: imovel.area_total,
            area_construida: imovel.area_construida,
            quartos: imovel.quartos,
            suites: imovel.suites,
            banheiros: imovel.banheiros,
            vagas: imovel.vagas,
            apto_andar: apto.andar,
            apto_numero: blank_if_none(&apto.numero),
            apto_bloco: blank_if_none(&apto.bloco),
            apto_valor_condominio: apto.valor_condominio,
            apto_elevador: apto.elevador,
            apto_portaria24h: apto.portaria24h,
            apto_sacada: apto.sacada,
            cond_nome: blank_if_none(&cond.nome),
            cond_piscina: cond.piscina,
            cond_academia: cond.academia,
            cond_churrasqueira: cond.churrasqueira,
            cond_salao_festas: cond.salao_festas,
            cond_playground: cond.playground,
            cond_quadra: cond.quadra,
            cond_seguranca24h: cond.seguranca24h,
            cond_portao_eletronico: cond.portao_eletronico,
            rural_area_alqueires: rural.area_alqueires,
            rural_tipo_alqueire: rural.tipo_alqueire.map(|t| t.as_str().to_string()),
            rural_distancia_cidade_km: rural.distancia_cidade_km,
            rural_casa_sede: rural.casa_sede,
            rural_curral: rural.curral,
            rural_represa: rural.represa,
            rural_rio: rural.rio,
            rural_pasto: rural.pasto,
            rural_plantacao: rural.plantacao,
            rural_energia_eletrica: rural.energia_eletrica,
            rural_poco_artesiano: rural.poco_artesiano,
            ficha_ano_construcao: ficha.ano_construcao,
            ficha_documentacao: blank_if_none(&ficha.documentacao),
            ficha_iptu_anual: ficha.iptu_anual,
            ficha_posicao_solar: blank_if_none(&ficha.posicao_solar),
            ficha_mobiliado: ficha.mobiliado,
            ficha_aceita_financiamento: ficha.aceita_financiamento,
            ficha_aceita_permuta: ficha.aceita_permuta,
            ficha_escriturado: ficha.escriturado,
            fotos: Some(serialize_fotos(&imovel.fotos)),
            video_url: blank_if_none(&imovel.video_url),
            proprietario_nome: text_or_none(&dono.nome),
            proprietario_telefone: text_or_none(&dono.telefone),
            proprietario_email: text_or_none(&dono.email),
            proprietario_cpf: text_or_none(&dono.cpf),
            proprietario_observacoes: text_or_none(&dono.observacoes),
            created_at: text_or_none(&imovel.created_at),
            updated_at: text_or_none(&imovel.updated_at),
            busca_chave: chave_opcional(&texto_de_busca(imovel)),
            categoria_chave: chave_opcional(&imovel.categoria),
            tipo_chave: chave_opcional(&imovel.tipo),
            cidade_chave: chave_opcional(&end.cidade),
            bairro_chave: chave_opcional(&end.bairro),
        }
    }
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        let imovel_id = row.imovel_id.unwrap_or_default();
        let imovel = row.imovel_titulo.map(|titulo| ImovelResumo {
            id: imovel_id.clone(),
            titulo,
            tipo: row.imovel_tipo.unwrap_or_default(),
            preco: row.imovel_preco,
        });
        Lead {
            id: row.id.unwrap_or_default(),
            imovel_id,
            cliente_nome: row.cliente_nome.unwrap_or_default(),
            cliente_telefone: row.cliente_telefone.unwrap_or_default(),
            cliente_email: none_if_blank(row.cliente_email),
            mensagem: row.mensagem.unwrap_or_default(),
            origem: none_if_blank(row.origem),
            visualizado: row.visualizado,
            created_at: row.created_at.unwrap_or_default(),
            imovel,
        }
    }
}

pub fn map_row_to_imovel(row: &DbRow) -> Imovel {
    Imovel::from(ImovelRow::from_db_row(row))
}

pub fn map_row_to_lead(row: &DbRow) -> Lead {
    Lead::from(LeadRow::from_db_row(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn casa_row() -> DbRow {
        DbRow::new()
            .with("id", "CA001")
            .with("categoria", "Venda")
            .with("tipo", "Casa")
            .with("titulo", "Casa térrea")
            .with("preco", 450_000_i64)
            .with("ativo", 1_i64)
            .with("enderecoCidade", "Campinas")
            .with("quartos", 3.0_f64)
            .with("condPiscina", 1_i64)
            .with("fotos", r#"[{"url":"a.jpg"},{"url":"b.jpg","destaque":true}]"#)
            .with("createdAt", "2026-01-01T00:00:00.000Z")
    }

    #[test]
    fn nests_flat_columns() {
        let imovel = map_row_to_imovel(&casa_row());
        assert_eq!(imovel.id, "CA001");
        assert_eq!(imovel.preco, 450_000.0);
        assert_eq!(imovel.quartos, Some(3));
        assert_eq!(imovel.endereco.cidade, "Campinas");
        assert!(imovel.condominio.as_ref().is_some_and(|c| c.piscina));
        assert!(imovel.dados_apartamento.is_none());
        assert!(imovel.rural.is_none());
        assert_eq!(imovel.fotos.len(), 2);
        assert!(imovel.ativo);
    }

    #[test]
    fn mapping_is_idempotent() {
        let row = casa_row();
        assert_eq!(map_row_to_imovel(&row), map_row_to_imovel(&row));
    }

    #[test]
    fn missing_columns_never_serialize_as_null() {
        let imovel = map_row_to_imovel(&DbRow::new().with("id", "TE001"));
        let json = serde_json::to_string(&imovel).expect("serialize");
        assert!(!json.contains("null"), "unexpected null in {json}");
        assert_eq!(imovel.titulo, "");
        assert!(!imovel.ativo);
        assert!(imovel.fotos.is_empty());
    }

    #[test]
    fn fotos_round_trip_preserves_order() {
        let fotos = vec![Foto::new("3.jpg"), Foto::new("1.jpg"), Foto::new("2.jpg")];
        let text = serialize_fotos(&fotos);
        assert_eq!(parse_fotos(Some(&text)), fotos);
    }

    #[test]
    fn malformed_fotos_become_empty() {
        assert!(parse_fotos(Some("[{broken")).is_empty());
        assert!(parse_fotos(Some("{\"url\":\"x\"}")).is_empty());
        assert!(parse_fotos(None).is_empty());
        assert_eq!(
            parse_fotos(Some(r#"["a.jpg", 42, {"url":"b.jpg"}]"#)).len(),
            2
        );
    }

    #[test]
    fn lead_columns_resolve_in_either_casing() {
        let sqlite = DbRow::new()
            .with("id", 7_i64)
            .with("imovelId", "CA001")
            .with("clienteNome", "Ana")
            .with("visualizado", 0_i64);
        let pg = DbRow::new()
            .with("id", 7_i64)
            .with("imovelid", "CA001")
            .with("clientenome", "Ana")
            .with("visualizado", false);
        assert_eq!(map_row_to_lead(&sqlite), map_row_to_lead(&pg));
        assert_eq!(map_row_to_lead(&pg).cliente_nome, "Ana");
    }

    #[test]
    fn rural_area_is_derived_from_alqueires() {
        let row = DbRow::new()
            .with("ruralAreaAlqueires", 2.0_f64)
            .with("ruralTipoAlqueire", "mineiro");
        let rural = map_row_to_imovel(&row).rural.expect("rural sheet");
        assert_eq!(rural.area_metros_quadrados, Some(96_800.0));
    }

    #[test]
    fn flatten_then_nest_keeps_the_listing() {
        let original = map_row_to_imovel(&casa_row());
        let flat = ImovelRow::from(&original);
        assert_eq!(flat.to_params().len(), ImovelRow::COLUMNS.len());
        assert_eq!(Imovel::from(flat), original);
    }
}
