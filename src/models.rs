//! Core data models for the statement assistant

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::AssistantError;
use crate::Result;

//
// ================= Documents =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Txt,
}

impl DocumentKind {
    /// Infer the kind from a file name's extension (case-insensitive)
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "txt" => Ok(DocumentKind::Txt),
            other => Err(AssistantError::UnsupportedDocument(if other.is_empty() {
                file_name.to_string()
            } else {
                other.to_string()
            })),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Txt => "txt",
        }
    }
}

/// An uploaded statement, held only for the duration of one pipeline run
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn kind(&self) -> Result<DocumentKind> {
        DocumentKind::from_file_name(&self.file_name)
    }
}

//
// ================= Financial Summary =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Ingreso,
    Egreso,
}

/// Closed category set the model must choose from.
/// Unknown labels are repaired to `Otro`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Category {
    #[serde(rename = "Nómina")]
    Nomina,
    Comida,
    Transporte,
    Suscripciones,
    #[serde(rename = "Préstamo")]
    Prestamo,
    Comisiones,
    Vivienda,
    Ocio,
    #[default]
    #[serde(other)]
    Otro,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Nomina,
        Category::Comida,
        Category::Transporte,
        Category::Suscripciones,
        Category::Prestamo,
        Category::Comisiones,
        Category::Vivienda,
        Category::Ocio,
        Category::Otro,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Nomina => "Nómina",
            Category::Comida => "Comida",
            Category::Transporte => "Transporte",
            Category::Suscripciones => "Suscripciones",
            Category::Prestamo => "Préstamo",
            Category::Comisiones => "Comisiones",
            Category::Vivienda => "Vivienda",
            Category::Ocio => "Ocio",
            Category::Otro => "Otro",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| AssistantError::InvalidInput(format!("categoría desconocida '{}'", s)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Resumen {
    #[serde(rename = "saldo_inicial", deserialize_with = "deserialize_amount")]
    pub opening_balance: f64,
    #[serde(rename = "saldo_final", deserialize_with = "deserialize_amount")]
    pub closing_balance: f64,
    #[serde(rename = "total_ingresos", deserialize_with = "deserialize_amount")]
    pub total_income: f64,
    #[serde(rename = "total_egresos", deserialize_with = "deserialize_amount")]
    pub total_expenses: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    #[serde(rename = "fecha", default)]
    pub date: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    #[serde(rename = "monto", default, deserialize_with = "deserialize_amount")]
    pub amount: f64,
    #[serde(rename = "tipo")]
    pub kind: TransactionKind,
    #[serde(rename = "categoria_sugerida", default, deserialize_with = "deserialize_category")]
    pub category: Category,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Insights {
    #[serde(rename = "pagos_recurrentes")]
    pub recurring_payments: Vec<String>,
    #[serde(rename = "fuentes_ingreso")]
    pub income_sources: Vec<String>,
    #[serde(rename = "comisiones_bancarias", deserialize_with = "deserialize_amount")]
    pub bank_fees: f64,
}

/// Structured statement data returned by the model.
///
/// A summary with `error` set is a placeholder: every number is zero and the
/// collections are empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinancialSummary {
    #[serde(default)]
    pub resumen: Resumen,
    #[serde(rename = "transacciones", default)]
    pub transactions: Vec<Transaction>,
    #[serde(rename = "insights_detectados", default)]
    pub insights: Insights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl FinancialSummary {
    /// Zeroed summary flagged with `message`
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn has_loans(&self) -> bool {
        self.transactions
            .iter()
            .any(|tx| tx.category == Category::Prestamo)
    }

    /// Sum of loan payments found in the statement
    pub fn loan_total(&self) -> f64 {
        self.transactions_in(Category::Prestamo)
            .map(|tx| tx.amount.abs())
            .sum()
    }

    pub fn transactions_in(&self, category: Category) -> impl Iterator<Item = &Transaction> {
        self.transactions
            .iter()
            .filter(move |tx| tx.category == category)
    }

    /// Recurring payments that actually show up in the transaction list
    pub fn corroborated_recurring_payments(&self) -> Vec<&str> {
        self.insights
            .recurring_payments
            .iter()
            .filter(|payment| {
                let needle = payment.trim().to_lowercase();
                !needle.is_empty()
                    && self
                        .transactions
                        .iter()
                        .any(|tx| tx.description.to_lowercase().contains(&needle))
            })
            .map(|p| p.as_str())
            .collect()
    }

    /// Reassign a transaction's category in place
    pub fn recategorize(&mut self, index: usize, category: Category) -> Result<()> {
        let count = self.transactions.len();
        let tx = self.transactions.get_mut(index).ok_or_else(|| {
            AssistantError::InvalidInput(format!(
                "la transacción {} no existe (hay {})",
                index + 1,
                count
            ))
        })?;
        tx.category = category;
        Ok(())
    }
}

/// Unknown labels, `null` and non-string values all become `Otro`.
fn deserialize_category<'de, D>(deserializer: D) -> std::result::Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(label) => label.trim().parse().unwrap_or_default(),
        _ => Category::Otro,
    })
}

/// Accepts numbers, numeric strings ("$1,234.50") and null.
fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("amount out of range")),
        Value::Null => Ok(0.0),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | '€' | ',' | ' '))
                .collect();
            cleaned
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid amount '{}'", s)))
        }
        other => Err(serde::de::Error::custom(format!(
            "expected a number, found {}",
            other
        ))),
    }
}

//
// ================= Actions =================
//

/// Follow-up actions offered after a statement is analyzed.
/// Ordering follows declaration order and drives menu layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKey {
    RevisarTransacciones,
    PlanDeudas,
    FondoEmergencia,
    PlanInversion,
    IngresoPasivo,
    GenerarOportunidad,
}

impl ActionKey {
    pub const ALL: [ActionKey; 6] = [
        ActionKey::RevisarTransacciones,
        ActionKey::PlanDeudas,
        ActionKey::FondoEmergencia,
        ActionKey::PlanInversion,
        ActionKey::IngresoPasivo,
        ActionKey::GenerarOportunidad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKey::RevisarTransacciones => "revisar_transacciones",
            ActionKey::PlanDeudas => "plan_deudas",
            ActionKey::FondoEmergencia => "fondo_emergencia",
            ActionKey::PlanInversion => "plan_inversion",
            ActionKey::IngresoPasivo => "ingreso_pasivo",
            ActionKey::GenerarOportunidad => "generar_oportunidad",
        }
    }

    /// Short label for menu buttons
    pub fn button_label(&self) -> &'static str {
        match self {
            ActionKey::RevisarTransacciones => "🧾 Revisar transacciones",
            ActionKey::PlanDeudas => "💳 Plan de deudas",
            ActionKey::FondoEmergencia => "🛟 Fondo de emergencia",
            ActionKey::PlanInversion => "📈 Plan de inversión",
            ActionKey::IngresoPasivo => "💡 Ingreso pasivo",
            ActionKey::GenerarOportunidad => "🚀 Generar oportunidad",
        }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKey {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().trim_start_matches('/');
        ActionKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| AssistantError::InvalidInput(format!("acción desconocida '{}'", s)))
    }
}

/// Ordered mapping from action to its suggestion text
pub type ActionSet = BTreeMap<ActionKey, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_kind_from_extension() {
        assert_eq!(DocumentKind::from_file_name("Estado.PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_file_name("movs.txt").unwrap(), DocumentKind::Txt);
        assert!(matches!(
            DocumentKind::from_file_name("foto.png"),
            Err(AssistantError::UnsupportedDocument(ext)) if ext == "png"
        ));
        assert!(DocumentKind::from_file_name("sin_extension").is_err());
    }

    #[test]
    fn test_amounts_accept_strings_and_null() {
        let json = r#"{
            "resumen": {"saldo_inicial": "$1,000.50", "saldo_final": null, "total_ingresos": 200, "total_egresos": "80"},
            "transacciones": [],
            "insights_detectados": {}
        }"#;
        let summary: FinancialSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.resumen.opening_balance, 1000.5);
        assert_eq!(summary.resumen.closing_balance, 0.0);
        assert_eq!(summary.resumen.total_expenses, 80.0);
    }

    #[test]
    fn test_amount_rejects_garbage() {
        let json = r#"{"resumen": {"saldo_final": "mucho"}}"#;
        assert!(serde_json::from_str::<FinancialSummary>(json).is_err());
    }

    #[test]
    fn test_unknown_category_repaired_to_otro() {
        let json = r#"{"fecha": "2024-01-02", "descripcion": "X", "monto": 5, "tipo": "egreso", "categoria_sugerida": "Mascotas"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.category, Category::Otro);
    }

    #[test]
    fn test_null_or_non_string_category_repaired_to_otro() {
        for category in ["null", "3", "[\"Comida\"]"] {
            let json = format!(
                r#"{{"fecha": "2024-01-02", "descripcion": "X", "monto": 5, "tipo": "egreso", "categoria_sugerida": {}}}"#,
                category
            );
            let tx: Transaction = serde_json::from_str(&json).unwrap();
            assert_eq!(tx.category, Category::Otro, "category {}", category);
        }

        let json = r#"{"fecha": "", "descripcion": "X", "monto": 5, "tipo": "egreso", "categoria_sugerida": " comida "}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.category, Category::Comida);
    }

    #[test]
    fn test_invalid_kind_rejected() {
        let json = r#"{"fecha": "2024-01-02", "descripcion": "X", "monto": 5, "tipo": "traspaso"}"#;
        assert!(serde_json::from_str::<Transaction>(json).is_err());
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(serde_json::to_string(&Category::Prestamo).unwrap(), "\"Préstamo\"");
        assert_eq!("nómina".parse::<Category>().unwrap(), Category::Nomina);
        assert_eq!("Préstamo".parse::<Category>().unwrap(), Category::Prestamo);
    }

    #[test]
    fn test_recategorize_in_place() {
        let mut summary = FinancialSummary {
            transactions: vec![Transaction {
                date: "2024-01-05".into(),
                description: "PAGO CREDITO".into(),
                amount: 300.0,
                kind: TransactionKind::Egreso,
                category: Category::Otro,
            }],
            ..Default::default()
        };

        summary.recategorize(0, Category::Prestamo).unwrap();
        assert!(summary.has_loans());
        assert_eq!(summary.loan_total(), 300.0);
        assert!(summary.recategorize(3, Category::Ocio).is_err());
    }

    #[test]
    fn test_corroborated_recurring_payments() {
        let summary = FinancialSummary {
            transactions: vec![Transaction {
                date: String::new(),
                description: "NETFLIX MX".into(),
                amount: 199.0,
                kind: TransactionKind::Egreso,
                category: Category::Suscripciones,
            }],
            insights: Insights {
                recurring_payments: vec!["Netflix".into(), "Gimnasio".into()],
                ..Default::default()
            },
            ..Default::default()
        };

        assert_eq!(summary.corroborated_recurring_payments(), vec!["Netflix"]);
    }

    #[test]
    fn test_action_key_round_trip_strings() {
        for key in ActionKey::ALL {
            assert_eq!(key.as_str().parse::<ActionKey>().unwrap(), key);
            assert_eq!(
                serde_json::to_string(&key).unwrap(),
                format!("\"{}\"", key.as_str())
            );
        }
        assert_eq!("/plan_deudas".parse::<ActionKey>().unwrap(), ActionKey::PlanDeudas);
    }
}
