use serde::{Deserialize, Serialize};

use crate::area::AlqueireTipo;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endereco {
    #[serde(default)]
    pub rua: String,
    #[serde(default)]
    pub numero: String,
    #[serde(default)]
    pub complemento: String,
    #[serde(default)]
    pub bairro: String,
    #[serde(default)]
    pub cidade: String,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub cep: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DadosApartamento {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub andar: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numero: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloco: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valor_condominio: Option<f64>,
    #[serde(default)]
    pub elevador: bool,
    #[serde(default)]
    pub portaria24h: bool,
    #[serde(default)]
    pub sacada: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condominio {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default)]
    pub piscina: bool,
    #[serde(default)]
    pub academia: bool,
    #[serde(default)]
    pub churrasqueira: bool,
    #[serde(default)]
    pub salao_festas: bool,
    #[serde(default)]
    pub playground: bool,
    #[serde(default)]
    pub quadra: bool,
    #[serde(default)]
    pub seguranca24h: bool,
    #[serde(default)]
    pub portao_eletronico: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DadosRurais {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_alqueires: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo_alqueire: Option<AlqueireTipo>,
    /// Derived from `area_alqueires`; ignored on input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_metros_quadrados: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distancia_cidade_km: Option<f64>,
    #[serde(default)]
    pub casa_sede: bool,
    #[serde(default)]
    pub curral: bool,
    #[serde(default)]
    pub represa: bool,
    #[serde(default)]
    pub rio: bool,
    #[serde(default)]
    pub pasto: bool,
    #[serde(default)]
    pub plantacao: bool,
    #[serde(default)]
    pub energia_eletrica: bool,
    #[serde(default)]
    pub poco_artesiano: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FichaTecnica {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ano_construcao: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentacao: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iptu_anual: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posicao_solar: Option<String>,
    #[serde(default)]
    pub mobiliado: bool,
    #[serde(default)]
    pub aceita_financiamento: bool,
    #[serde(default)]
    pub aceita_permuta: bool,
    #[serde(default)]
    pub escriturado: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Foto {
    pub url: String,
    #[serde(default)]
    pub destaque: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legenda: Option<String>,
}

impl Foto {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Keep at most one featured photo: the first flagged one wins.
pub fn normalizar_fotos(fotos: &mut [Foto]) {
    let mut visto = false;
    for foto in fotos.iter_mut() {
        if foto.destaque {
            if visto {
                foto.destaque = false;
            }
            visto = true;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proprietario {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub telefone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub cpf: String,
    #[serde(default)]
    pub observacoes: String,
}

impl Proprietario {
    pub fn is_empty(&self) -> bool {
        self == &Proprietario::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Imovel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub categoria: String,
    #[serde(default)]
    pub tipo: String,
    #[serde(default)]
    pub titulo: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub preco: f64,
    #[serde(default)]
    pub endereco: Endereco,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_construida: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quartos: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suites: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banheiros: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vagas: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dados_apartamento: Option<DadosApartamento>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condominio: Option<Condominio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rural: Option<DadosRurais>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ficha_tecnica: Option<FichaTecnica>,
    #[serde(default)]
    pub fotos: Vec<Foto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Proprietario::is_empty")]
    pub proprietario: Proprietario,
    #[serde(default = "default_true")]
    pub ativo: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Default for Imovel {
    fn default() -> Self {
        Self {
            id: String::new(),
            categoria: String::new(),
            tipo: String::new(),
            titulo: String::new(),
            descricao: String::new(),
            preco: 0.0,
            endereco: Endereco::default(),
            latitude: None,
            longitude: None,
            area_total: None,
            area_construida: None,
            quartos: None,
            suites: None,
            banheiros: None,
            vagas: None,
            dados_apartamento: None,
            condominio: None,
            rural: None,
            ficha_tecnica: None,
            fotos: Vec::new(),
            video_url: None,
            proprietario: Proprietario::default(),
            ativo: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

impl Imovel {
    /// Thumbnail: the featured photo, or the first one.
    pub fn foto_capa(&self) -> Option<&Foto> {
        self.fotos
            .iter()
            .find(|f| f.destaque)
            .or_else(|| self.fotos.first())
    }

    /// Copy suitable for the public catalog: owner contact data removed.
    pub fn publico(mut self) -> Self {
        self.proprietario = Proprietario::default();
        self
    }

    pub fn resumo(&self) -> ImovelResumo {
        ImovelResumo {
            id: self.id.clone(),
            titulo: self.titulo.clone(),
            tipo: self.tipo.clone(),
            preco: Some(self.preco),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImovelResumo {
    pub id: String,
    #[serde(default)]
    pub titulo: String,
    #[serde(default)]
    pub tipo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preco: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: i64,
    pub imovel_id: String,
    #[serde(default)]
    pub cliente_nome: String,
    #[serde(default)]
    pub cliente_telefone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cliente_email: Option<String>,
    #[serde(default)]
    pub mensagem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origem: Option<String>,
    #[serde(default)]
    pub visualizado: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imovel: Option<ImovelResumo>,
}

/// Public lead submission. Accepts the short field names older forms send.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovoLead {
    #[serde(default)]
    pub imovel_id: String,
    #[serde(default, alias = "nome")]
    pub cliente_nome: String,
    #[serde(default, alias = "telefone")]
    pub cliente_telefone: String,
    #[serde(default, alias = "email", skip_serializing_if = "Option::is_none")]
    pub cliente_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mensagem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origem: Option<String>,
}

impl NovoLead {
    /// Trim text and drop empty optionals.
    pub fn normalizado(mut self) -> Self {
        fn opt(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        self.imovel_id = self.imovel_id.trim().to_uppercase();
        self.cliente_nome = self.cliente_nome.trim().to_string();
        self.cliente_telefone = self.cliente_telefone.trim().to_string();
        self.cliente_email = opt(self.cliente_email).map(|e| e.to_lowercase());
        self.mensagem = opt(self.mensagem);
        self.origem = opt(self.origem);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContatoCliente {
    #[serde(default)]
    pub nome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub total_leads: i64,
    #[serde(default)]
    pub updated_at: String,
}
