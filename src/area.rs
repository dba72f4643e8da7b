//! Alqueire ↔ square metre conversion.
//!
//! The alqueire is a regional unit; each region fixes its own factor.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlqueireTipo {
    /// 24 200 m² (São Paulo, Paraná).
    #[default]
    Paulista,
    /// 48 400 m² (Minas Gerais, Goiás, Rio de Janeiro).
    Mineiro,
    /// 96 800 m².
    Baiano,
    /// 27 225 m².
    Norte,
}

impl AlqueireTipo {
    pub const ALL: [AlqueireTipo; 4] = [
        AlqueireTipo::Paulista,
        AlqueireTipo::Mineiro,
        AlqueireTipo::Baiano,
        AlqueireTipo::Norte,
    ];

    pub fn metros_quadrados(self) -> f64 {
        match self {
            AlqueireTipo::Paulista => 24_200.0,
            AlqueireTipo::Mineiro => 48_400.0,
            AlqueireTipo::Baiano => 96_800.0,
            AlqueireTipo::Norte => 27_225.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlqueireTipo::Paulista => "paulista",
            AlqueireTipo::Mineiro => "mineiro",
            AlqueireTipo::Baiano => "baiano",
            AlqueireTipo::Norte => "norte",
        }
    }

    /// Lenient parse used for stored text; unknown values fall back to `Paulista`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "mineiro" | "goiano" => AlqueireTipo::Mineiro,
            "baiano" => AlqueireTipo::Baiano,
            "norte" | "do norte" => AlqueireTipo::Norte,
            _ => AlqueireTipo::Paulista,
        }
    }
}

pub fn para_metros_quadrados(alqueires: f64, tipo: AlqueireTipo) -> f64 {
    alqueires * tipo.metros_quadrados()
}

pub fn de_metros_quadrados(metros: f64, tipo: AlqueireTipo) -> f64 {
    metros / tipo.metros_quadrados()
}

pub fn hectares(metros: f64) -> f64 {
    metros / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_with_regional_factor() {
        assert_eq!(para_metros_quadrados(1.0, AlqueireTipo::Paulista), 24_200.0);
        assert_eq!(para_metros_quadrados(2.0, AlqueireTipo::Mineiro), 96_800.0);
        assert_eq!(de_metros_quadrados(96_800.0, AlqueireTipo::Baiano), 1.0);
        assert_eq!(hectares(24_200.0), 2.42);
    }

    #[test]
    fn round_trip_is_stable() {
        for tipo in AlqueireTipo::ALL {
            let m2 = para_metros_quadrados(3.5, tipo);
            assert!((de_metros_quadrados(m2, tipo) - 3.5).abs() < 1e-9);
        }
    }

    #[test]
    fn parse_is_lenient() {
        assert_eq!(AlqueireTipo::parse(" Goiano "), AlqueireTipo::Mineiro);
        assert_eq!(AlqueireTipo::parse("desconhecido"), AlqueireTipo::Paulista);
        assert_eq!(AlqueireTipo::parse(AlqueireTipo::Norte.as_str()), AlqueireTipo::Norte);
    }
}
