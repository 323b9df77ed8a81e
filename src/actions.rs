//! Action rule engine
//!
//! Deterministic rules over a `FinancialSummary` decide which follow-up
//! actions the menu offers. Rules are independent, except the opportunity
//! fallback which only fires when no finding rule did.

use tracing::debug;

use crate::models::{ActionKey, ActionSet, FinancialSummary};

/// Bumped whenever thresholds or rule semantics change
pub const RULESET_VERSION: u32 = 1;

pub const EXPENSE_RATIO_THRESHOLD: f64 = 0.9;
pub const SURPLUS_THRESHOLD: f64 = 5000.0;
pub const MIN_RECURRING_FOR_PASSIVE_INCOME: usize = 2;

/// A single action rule
pub trait ActionRule: Send + Sync {
    fn key(&self) -> ActionKey;

    /// Findings suppress the generic opportunity fallback; informational rules do not
    fn is_finding(&self) -> bool {
        true
    }

    fn applies(&self, summary: &FinancialSummary) -> bool;

    fn message(&self, summary: &FinancialSummary) -> String;
}

/// Statement has transactions the user can review and recategorize
pub struct TransactionReviewRule;

impl ActionRule for TransactionReviewRule {
    fn key(&self) -> ActionKey {
        ActionKey::RevisarTransacciones
    }

    fn is_finding(&self) -> bool {
        false
    }

    fn applies(&self, summary: &FinancialSummary) -> bool {
        !summary.transactions.is_empty()
    }

    fn message(&self, summary: &FinancialSummary) -> String {
        format!(
            "Detecté {} movimientos. Usa `/revisar_transacciones` para revisar o corregir sus categorías.",
            summary.transactions.len()
        )
    }
}

/// Any loan payment
pub struct LoanPaymentRule;

impl ActionRule for LoanPaymentRule {
    fn key(&self) -> ActionKey {
        ActionKey::PlanDeudas
    }

    fn applies(&self, summary: &FinancialSummary) -> bool {
        summary.has_loans()
    }

    fn message(&self, _summary: &FinancialSummary) -> String {
        "He detectado pagos de préstamos. Usa `/plan_deudas` para crear una estrategia de pago."
            .to_string()
    }
}

/// Expenses above 90% of a positive income
pub struct HighExpenseRatioRule;

impl ActionRule for HighExpenseRatioRule {
    fn key(&self) -> ActionKey {
        ActionKey::FondoEmergencia
    }

    fn applies(&self, summary: &FinancialSummary) -> bool {
        let income = summary.resumen.total_income;
        income > 0.0 && summary.resumen.total_expenses > income * EXPENSE_RATIO_THRESHOLD
    }

    fn message(&self, _summary: &FinancialSummary) -> String {
        "Tus gastos son altos. Usa `/fondo_emergencia` para calcular tu red de seguridad."
            .to_string()
    }
}

/// Closing balance above the surplus threshold
pub struct SurplusRule;

impl ActionRule for SurplusRule {
    fn key(&self) -> ActionKey {
        ActionKey::PlanInversion
    }

    fn applies(&self, summary: &FinancialSummary) -> bool {
        summary.resumen.closing_balance > SURPLUS_THRESHOLD
    }

    fn message(&self, _summary: &FinancialSummary) -> String {
        "Tienes un excedente. Usa `/plan_inversion` para explorar opciones.".to_string()
    }
}

/// Several recurring payments that the transaction list confirms
pub struct RecurringPaymentsRule;

impl ActionRule for RecurringPaymentsRule {
    fn key(&self) -> ActionKey {
        ActionKey::IngresoPasivo
    }

    fn applies(&self, summary: &FinancialSummary) -> bool {
        summary.corroborated_recurring_payments().len() >= MIN_RECURRING_FOR_PASSIVE_INCOME
    }

    fn message(&self, summary: &FinancialSummary) -> String {
        format!(
            "Tienes {} pagos recurrentes. Usa `/ingreso_pasivo` para buscar ingresos que los cubran.",
            summary.corroborated_recurring_payments().len()
        )
    }
}

const OPPORTUNITY_MESSAGE: &str = "Tus finanzas parecen estables. ¿Quieres un plan de acción para generar ingresos extra? Usa `/generar_oportunidad`.";

/// Ordered collection of rules
pub struct ActionRuleSet {
    rules: Vec<Box<dyn ActionRule>>,
}

impl ActionRuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn ActionRule>) {
        self.rules.push(rule);
    }

    /// The canonical rule set (`RULESET_VERSION`)
    pub fn standard() -> Self {
        let mut set = Self::new();
        set.add_rule(Box::new(TransactionReviewRule));
        set.add_rule(Box::new(LoanPaymentRule));
        set.add_rule(Box::new(HighExpenseRatioRule));
        set.add_rule(Box::new(SurplusRule));
        set.add_rule(Box::new(RecurringPaymentsRule));
        set
    }

    pub fn evaluate(&self, summary: &FinancialSummary) -> ActionSet {
        let mut actions = ActionSet::new();
        if summary.is_error() {
            return actions;
        }

        let mut findings = 0;
        for rule in &self.rules {
            if rule.applies(summary) {
                if rule.is_finding() {
                    findings += 1;
                }
                actions.insert(rule.key(), rule.message(summary));
            }
        }

        if findings == 0 {
            actions.insert(
                ActionKey::GenerarOportunidad,
                OPPORTUNITY_MESSAGE.to_string(),
            );
        }

        debug!(
            ruleset = RULESET_VERSION,
            actions = ?actions.keys().collect::<Vec<_>>(),
            "Actions derived"
        );

        actions
    }
}

impl Default for ActionRuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Actions currently relevant for `summary`
pub fn derive_actions(summary: &FinancialSummary) -> ActionSet {
    ActionRuleSet::standard().evaluate(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Insights, Resumen, Transaction, TransactionKind};

    fn tx(description: &str, category: Category, amount: f64) -> Transaction {
        Transaction {
            date: "2024-06-01".into(),
            description: description.into(),
            amount,
            kind: TransactionKind::Egreso,
            category,
        }
    }

    fn summary(income: f64, expenses: f64, closing: f64, transactions: Vec<Transaction>) -> FinancialSummary {
        FinancialSummary {
            resumen: Resumen {
                opening_balance: 0.0,
                closing_balance: closing,
                total_income: income,
                total_expenses: expenses,
            },
            transactions,
            ..Default::default()
        }
    }

    fn keys(actions: &ActionSet) -> Vec<ActionKey> {
        actions.keys().copied().collect()
    }

    #[test]
    fn test_stable_finances_yield_only_opportunity() {
        for (income, expenses, closing) in [(1000.0, 50.0, 950.0), (10.0, 0.0, 0.0), (4999.0, 1.0, 5000.0)] {
            let actions = derive_actions(&summary(income, expenses, closing, vec![]));
            assert_eq!(keys(&actions), vec![ActionKey::GenerarOportunidad]);
            assert_eq!(
                actions[&ActionKey::GenerarOportunidad],
                OPPORTUNITY_MESSAGE
            );
        }
    }

    #[test]
    fn test_loan_always_yields_debt_plan() {
        let cases = [
            summary(0.0, 0.0, 0.0, vec![tx("CREDITO", Category::Prestamo, 100.0)]),
            summary(10000.0, 9500.0, 6000.0, vec![tx("CREDITO", Category::Prestamo, 100.0)]),
            summary(1.0, 1.0, -50.0, vec![
                tx("SUPER", Category::Comida, 10.0),
                tx("HIPOTECA", Category::Prestamo, 1.0),
            ]),
        ];
        for case in cases {
            let actions = derive_actions(&case);
            assert!(actions.contains_key(&ActionKey::PlanDeudas));
            assert!(!actions.contains_key(&ActionKey::GenerarOportunidad));
        }
    }

    #[test]
    fn test_statement_scenario_review_and_debt() {
        let s = summary(
            500.0,
            687.47,
            812.53,
            vec![
                tx("PAGO CREDITO", Category::Prestamo, 400.0),
                tx("SUPER", Category::Comida, 287.47),
            ],
        );
        let actions = derive_actions(&s);
        assert!(actions.contains_key(&ActionKey::RevisarTransacciones));
        assert!(actions.contains_key(&ActionKey::PlanDeudas));
        assert!(actions.contains_key(&ActionKey::FondoEmergencia));
        assert!(!actions.contains_key(&ActionKey::GenerarOportunidad));
    }

    #[test]
    fn test_emergency_fund_threshold() {
        assert!(derive_actions(&summary(1000.0, 901.0, 99.0, vec![]))
            .contains_key(&ActionKey::FondoEmergencia));
        assert!(!derive_actions(&summary(1000.0, 900.0, 100.0, vec![]))
            .contains_key(&ActionKey::FondoEmergencia));
        // no income: ratio undefined
        assert!(!derive_actions(&summary(0.0, 500.0, 0.0, vec![]))
            .contains_key(&ActionKey::FondoEmergencia));
    }

    #[test]
    fn test_investment_on_surplus() {
        let actions = derive_actions(&summary(10000.0, 1000.0, 9000.0, vec![]));
        assert_eq!(keys(&actions), vec![ActionKey::PlanInversion]);
    }

    #[test]
    fn test_multiple_findings_in_menu_order() {
        let actions = derive_actions(&summary(
            10000.0,
            9500.0,
            6000.0,
            vec![tx("CREDITO", Category::Prestamo, 100.0)],
        ));
        assert_eq!(
            keys(&actions),
            vec![
                ActionKey::RevisarTransacciones,
                ActionKey::PlanDeudas,
                ActionKey::FondoEmergencia,
                ActionKey::PlanInversion,
            ]
        );
    }

    #[test]
    fn test_review_alone_keeps_opportunity() {
        let actions = derive_actions(&summary(
            1000.0,
            50.0,
            950.0,
            vec![tx("SUPER", Category::Comida, 50.0)],
        ));
        assert_eq!(
            keys(&actions),
            vec![ActionKey::RevisarTransacciones, ActionKey::GenerarOportunidad]
        );
    }

    #[test]
    fn test_passive_income_needs_corroborated_payments() {
        let mut s = summary(
            1000.0,
            100.0,
            900.0,
            vec![
                tx("NETFLIX", Category::Suscripciones, 199.0),
                tx("SPOTIFY PREMIUM", Category::Suscripciones, 115.0),
            ],
        );
        s.insights = Insights {
            recurring_payments: vec!["Netflix".into(), "Spotify".into()],
            ..Default::default()
        };
        let actions = derive_actions(&s);
        assert!(actions.contains_key(&ActionKey::IngresoPasivo));
        assert!(!actions.contains_key(&ActionKey::GenerarOportunidad));

        // Listed by the model but absent from the statement
        let mut uncorroborated = summary(1000.0, 100.0, 900.0, vec![]);
        uncorroborated.insights.recurring_payments = vec!["Netflix".into(), "Spotify".into()];
        assert_eq!(
            keys(&derive_actions(&uncorroborated)),
            vec![ActionKey::GenerarOportunidad]
        );
    }

    #[test]
    fn test_error_summary_has_no_actions() {
        assert!(derive_actions(&FinancialSummary::failed("x")).is_empty());
    }
}
