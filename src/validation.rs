//! Payload checks for listings and leads. Each validator returns the list of
//! problems found; an empty list means the payload is acceptable.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Imovel, NovoLead};
use crate::{AppError, AppResult};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email validation pattern to compile")
});

const DDDS_VALIDOS: &[u8] = &[
    11, 12, 13, 14, 15, 16, 17, 18, 19, 21, 22, 24, 27, 28, 31, 32, 33, 34, 35, 37, 38, 41, 42,
    43, 44, 45, 46, 47, 48, 49, 51, 53, 54, 55, 61, 62, 63, 64, 65, 66, 67, 68, 69, 71, 73, 74,
    75, 77, 79, 81, 82, 83, 84, 85, 86, 87, 88, 89, 91, 92, 93, 94, 95, 96, 97, 98, 99,
];

pub fn apenas_digitos(valor: &str) -> String {
    valor.chars().filter(char::is_ascii_digit).collect()
}

pub fn validar_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

/// Brazilian landline (10 digits) or mobile (11 digits, leading 9) with a known area code.
pub fn validar_telefone(telefone: &str) -> bool {
    let digitos = apenas_digitos(telefone);
    if !(10..=11).contains(&digitos.len()) {
        return false;
    }
    let Ok(ddd) = digitos[..2].parse::<u8>() else {
        return false;
    };
    if !DDDS_VALIDOS.contains(&ddd) {
        return false;
    }
    digitos.len() == 10 || digitos.as_bytes()[2] == b'9'
}

pub fn validar_cep(cep: &str) -> bool {
    apenas_digitos(cep).len() == 8
}

fn digito_verificador(digitos: &[u32], peso_inicial: u32) -> u32 {
    let soma: u32 = digitos
        .iter()
        .zip((2..=peso_inicial).rev())
        .map(|(d, peso)| d * peso)
        .sum();
    let resto = soma % 11;
    if resto < 2 {
        0
    } else {
        11 - resto
    }
}

/// CPF check: 11 digits, not all equal, both check digits correct. Punctuation is ignored.
pub fn validar_cpf(cpf: &str) -> bool {
    let digitos: Vec<u32> = cpf.chars().filter_map(|c| c.to_digit(10)).collect();
    if digitos.len() != 11 || digitos.iter().all(|d| *d == digitos[0]) {
        return false;
    }
    digito_verificador(&digitos[..9], 10) == digitos[9]
        && digito_verificador(&digitos[..10], 11) == digitos[10]
}

pub fn validar_lead(lead: &NovoLead) -> Vec<String> {
    let mut erros = Vec::new();
    if lead.imovel_id.trim().is_empty() {
        erros.push("imovelId é obrigatório".to_string());
    }
    if lead.cliente_nome.trim().is_empty() {
        erros.push("clienteNome é obrigatório".to_string());
    }
    if lead.cliente_telefone.trim().is_empty() {
        erros.push("clienteTelefone é obrigatório".to_string());
    } else if !validar_telefone(&lead.cliente_telefone) {
        erros.push("clienteTelefone inválido".to_string());
    }
    if let Some(email) = &lead.cliente_email {
        if !validar_email(email) {
            erros.push("clienteEmail inválido".to_string());
        }
    }
    erros
}

pub fn validar_imovel(imovel: &Imovel) -> Vec<String> {
    let mut erros = Vec::new();
    for (campo, valor) in [
        ("titulo", &imovel.titulo),
        ("tipo", &imovel.tipo),
        ("categoria", &imovel.categoria),
    ] {
        if valor.trim().is_empty() {
            erros.push(format!("{campo} é obrigatório"));
        }
    }
    if !imovel.preco.is_finite() || imovel.preco < 0.0 {
        erros.push("preco deve ser maior ou igual a zero".to_string());
    }
    let cep = imovel.endereco.cep.trim();
    if !cep.is_empty() && !validar_cep(cep) {
        erros.push("endereco.cep deve ter 8 dígitos".to_string());
    }
    let dono = &imovel.proprietario;
    if !dono.email.trim().is_empty() && !validar_email(&dono.email) {
        erros.push("proprietario.email inválido".to_string());
    }
    if !dono.cpf.trim().is_empty() && !validar_cpf(&dono.cpf) {
        erros.push("proprietario.cpf inválido".to_string());
    }
    erros
}

/// Turn a non-empty problem list into a `VALIDATION/INVALID` error.
pub fn exigir(erros: Vec<String>) -> AppResult<()> {
    if erros.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(erros))
    }
}
