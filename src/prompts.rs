//! Prompt templates sent to the model
//!
//! The extraction prompt pins the output schema; advice prompts are free text.

use crate::models::FinancialSummary;

const SUMMARY_SCHEMA: &str = r#"{
  "resumen": { "saldo_inicial": float, "saldo_final": float, "total_ingresos": float, "total_egresos": float },
  "transacciones": [ { "fecha": "YYYY-MM-DD", "descripcion": "string", "monto": float, "tipo": "ingreso|egreso", "categoria_sugerida": "Nómina|Comida|Transporte|Suscripciones|Préstamo|Comisiones|Vivienda|Ocio|Otro" } ],
  "insights_detectados": { "pagos_recurrentes": ["string"], "fuentes_ingreso": ["string"], "comisiones_bancarias": float }
}"#;

const ADVISOR_ROLE: &str = "Eres un asesor financiero personal. Responde en español, \
con pasos concretos y numerados, sin tecnicismos innecesarios y en menos de 250 palabras.";

/// Instruction asking for the statement as schema-conforming JSON
pub fn summary_extraction(statement_text: &str) -> String {
    format!(
        r#"Eres un experto analista financiero. Analiza el siguiente texto de un estado de cuenta y extráelo a un formato JSON.
Tu respuesta DEBE ser únicamente el objeto JSON, sin explicaciones ni markdown.
Los datos personales ya fueron reemplazados por marcadores como [NOMBRE] o [CUENTA]; no intentes reconstruirlos.

<input_text>
{}
</input_text>

<output_schema>
{}
</output_schema>
"#,
        statement_text, SUMMARY_SCHEMA
    )
}

pub fn debt_plan(summary: &FinancialSummary) -> String {
    let payments = summary
        .transactions_in(crate::models::Category::Prestamo)
        .map(|tx| format!("- {} {}: {:.2}", tx.date, tx.description, tx.amount.abs()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nCrea un plan de pago de deudas para un total de {:.2} MXN en pagos de préstamos \
durante el periodo. Ingresos del periodo: {:.2} MXN. Egresos del periodo: {:.2} MXN.\n\
Pagos detectados:\n{}\n\nCompara las estrategias bola de nieve y avalancha y recomienda una.",
        ADVISOR_ROLE,
        summary.loan_total(),
        summary.resumen.total_income,
        summary.resumen.total_expenses,
        payments
    )
}

pub fn emergency_fund(monthly_expenses: f64) -> String {
    format!(
        "{}\n\nCalcula un fondo de emergencia para gastos mensuales de {:.2} MXN. \
Indica la meta para 3 y 6 meses, cuánto ahorrar por mes para alcanzarla en un año \
y dónde guardar ese dinero.",
        ADVISOR_ROLE, monthly_expenses
    )
}

pub fn investment_plan(summary: &FinancialSummary) -> String {
    format!(
        "{}\n\nEl usuario tiene un saldo final de {:.2} MXN, con ingresos de {:.2} MXN y egresos de \
{:.2} MXN en el periodo. Sugiere un plan de inversión conservador y otro moderado, \
separando primero un fondo de emergencia.",
        ADVISOR_ROLE,
        summary.resumen.closing_balance,
        summary.resumen.total_income,
        summary.resumen.total_expenses
    )
}

pub fn passive_income(recurring_payments: &[&str], income_sources: &[String]) -> String {
    format!(
        "{}\n\nEl usuario tiene estos pagos recurrentes: {}. Sus fuentes de ingreso actuales son: {}.\n\
Propón tres ideas de ingreso pasivo que puedan cubrir esos pagos recurrentes, \
con la inversión inicial estimada de cada una.",
        ADVISOR_ROLE,
        recurring_payments.join(", "),
        if income_sources.is_empty() {
            "no identificadas".to_string()
        } else {
            income_sources.join(", ")
        }
    )
}

pub fn extra_income_opportunity(summary: &FinancialSummary) -> String {
    format!(
        "{}\n\nLas finanzas del usuario parecen estables: ingresos de {:.2} MXN, egresos de {:.2} MXN \
y saldo final de {:.2} MXN. Crea un plan de acción de 30 días para generar ingresos extra.",
        ADVISOR_ROLE,
        summary.resumen.total_income,
        summary.resumen.total_expenses,
        summary.resumen.closing_balance
    )
}
