//! Free-text advice for each follow-up action
//!
//! Every method builds a prompt from the current summary and asks the gateway
//! in text mode. Transaction review is handled by the conversation driver and
//! never reaches the model.

use std::sync::Arc;
use tracing::info;

use crate::gateway::ModelGateway;
use crate::models::{ActionKey, FinancialSummary};
use crate::parser::strip_code_fence;
use crate::prompts;

pub struct AdviceService {
    gateway: Arc<ModelGateway>,
}

impl AdviceService {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    pub async fn debt_plan(&self, summary: &FinancialSummary) -> String {
        self.ask(ActionKey::PlanDeudas, prompts::debt_plan(summary))
            .await
    }

    /// `monthly_expenses` comes from the statement or from the user
    pub async fn emergency_fund(&self, monthly_expenses: f64) -> String {
        self.ask(
            ActionKey::FondoEmergencia,
            prompts::emergency_fund(monthly_expenses),
        )
        .await
    }

    pub async fn investment_plan(&self, summary: &FinancialSummary) -> String {
        self.ask(ActionKey::PlanInversion, prompts::investment_plan(summary))
            .await
    }

    pub async fn passive_income(&self, summary: &FinancialSummary) -> String {
        let payments = summary.corroborated_recurring_payments();
        self.ask(
            ActionKey::IngresoPasivo,
            prompts::passive_income(&payments, &summary.insights.income_sources),
        )
        .await
    }

    pub async fn opportunity(&self, summary: &FinancialSummary) -> String {
        self.ask(
            ActionKey::GenerarOportunidad,
            prompts::extra_income_opportunity(summary),
        )
        .await
    }

    async fn ask(&self, action: ActionKey, prompt: String) -> String {
        info!(%action, "Requesting advice");
        let raw = self.gateway.generate_text(&prompt).await;
        // Models sometimes wrap prose in a Markdown fence
        strip_code_fence(&raw).to_string()
    }
}
