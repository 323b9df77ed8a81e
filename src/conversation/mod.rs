//! Conversation driver
//!
//! Transport-neutral state machine: inbound chat events in, replies out.
//! Each conversation has exactly one `ConversationState`; events for the same
//! conversation are handled one at a time.
//!
//! AWAITING DOCUMENT → (upload) → REVIEWING SUMMARY ⇄ actions
//!                                  ├─ SELECTING TRANSACTION → CHOOSING CATEGORY
//!                                  └─ AWAITING MONTHLY EXPENSES

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::actions::derive_actions;
use crate::advice::AdviceService;
use crate::error::AssistantError;
use crate::models::{ActionKey, Category, FinancialSummary, RawDocument};
use crate::pipeline::DocumentPipeline;
use crate::Result;

pub mod menu;
pub mod store;

pub use menu::{Button, Reply};
pub use store::{ConversationStore, InMemoryConversationStore};

use menu::{CATEGORY_CALLBACK_PREFIX, MENU_CALLBACK, TRANSACTION_CALLBACK_PREFIX};

const WELCOME_MESSAGE: &str =
    "¡Bienvenido! Usa /presupuesto y sube tu estado de cuenta en PDF o TXT para empezar.";
const UPLOAD_PROMPT: &str = "Sube tu estado de cuenta en PDF o TXT y lo analizo.";
const UPLOAD_FIRST_MESSAGE: &str = "Primero necesito que subas un documento con /presupuesto.";
const MONTHLY_EXPENSES_QUESTION: &str = "No encontré egresos en tu estado de cuenta. \
¿Cuánto gastas al mes aproximadamente? Escribe solo el monto, por ejemplo 12500.";
const INVALID_AMOUNT_MESSAGE: &str = "Escribe un monto válido mayor a cero, por ejemplo 12500.";

// ===== State =====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    AwaitingDocument,
    ReviewingSummary {
        summary: FinancialSummary,
    },
    SelectingTransaction {
        summary: FinancialSummary,
    },
    ChoosingCategory {
        summary: FinancialSummary,
        transaction_index: usize,
    },
    AwaitingMonthlyExpenses {
        summary: FinancialSummary,
    },
}

impl ConversationState {
    pub fn name(&self) -> &'static str {
        match self {
            ConversationState::AwaitingDocument => "awaiting_document",
            ConversationState::ReviewingSummary { .. } => "reviewing_summary",
            ConversationState::SelectingTransaction { .. } => "selecting_transaction",
            ConversationState::ChoosingCategory { .. } => "choosing_category",
            ConversationState::AwaitingMonthlyExpenses { .. } => "awaiting_monthly_expenses",
        }
    }

    pub fn summary(&self) -> Option<&FinancialSummary> {
        match self {
            ConversationState::AwaitingDocument => None,
            ConversationState::ReviewingSummary { summary }
            | ConversationState::SelectingTransaction { summary }
            | ConversationState::ChoosingCategory { summary, .. }
            | ConversationState::AwaitingMonthlyExpenses { summary } => Some(summary),
        }
    }

    pub fn into_summary(self) -> Option<FinancialSummary> {
        match self {
            ConversationState::AwaitingDocument => None,
            ConversationState::ReviewingSummary { summary }
            | ConversationState::SelectingTransaction { summary }
            | ConversationState::ChoosingCategory { summary, .. }
            | ConversationState::AwaitingMonthlyExpenses { summary } => Some(summary),
        }
    }
}

// ===== Events =====

#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// Slash command, with or without the leading '/'
    Command { name: String },
    Text { text: String },
    /// Inline button press
    Callback { data: String },
    Document { file_name: String, bytes: Vec<u8> },
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Command { .. } => "command",
            InboundEvent::Text { .. } => "text",
            InboundEvent::Callback { .. } => "callback",
            InboundEvent::Document { .. } => "document",
        }
    }
}

struct Transition {
    state: ConversationState,
    replies: Vec<Reply>,
}

impl Transition {
    fn new(state: ConversationState, replies: Vec<Reply>) -> Self {
        Self { state, replies }
    }

    fn reply(state: ConversationState, reply: Reply) -> Self {
        Self::new(state, vec![reply])
    }
}

// ===== Driver =====

pub struct ConversationDriver {
    pipeline: Arc<DocumentPipeline>,
    advice: Arc<AdviceService>,
    store: Arc<dyn ConversationStore>,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ConversationDriver {
    pub fn new(
        pipeline: Arc<DocumentPipeline>,
        advice: Arc<AdviceService>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            pipeline,
            advice,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one event. Never fails: errors become user-facing replies and
    /// the conversation is left in a state the user can retry from.
    pub async fn handle(&self, conversation_id: Uuid, event: InboundEvent) -> Vec<Reply> {
        let lock = self.lock_for(conversation_id).await;
        let replies = {
            let _guard = lock.lock().await;
            self.handle_locked(conversation_id, event).await
        };
        self.release(conversation_id, lock).await;
        replies
    }

    async fn handle_locked(&self, conversation_id: Uuid, event: InboundEvent) -> Vec<Reply> {
        let state = match self.store.load(conversation_id).await {
            Ok(state) => state,
            Err(e) => {
                error!(%conversation_id, error = %e, "Failed to load conversation state");
                return vec![Reply::text(e.user_message())];
            }
        };

        info!(
            %conversation_id,
            event = event.kind(),
            state = state.name(),
            "Handling event"
        );

        let fallback = match event {
            InboundEvent::Document { .. } => ConversationState::AwaitingDocument,
            _ => state.clone(),
        };

        let (next, replies) = match self.dispatch(state, event).await {
            Ok(transition) => (transition.state, transition.replies),
            Err(e) => {
                if e.is_recoverable() {
                    warn!(%conversation_id, error = %e, "Recoverable error");
                } else {
                    error!(%conversation_id, error = %e, "Event handling failed");
                }
                (fallback, vec![Reply::text(e.user_message())])
            }
        };

        if let Err(e) = self.store.save(conversation_id, next).await {
            error!(%conversation_id, error = %e, "Failed to save conversation state");
            return vec![Reply::text(e.user_message())];
        }

        replies
    }

    /// Drop all state for a conversation. Waits for an event in flight.
    pub async fn forget(&self, conversation_id: Uuid) -> Result<()> {
        let lock = self.lock_for(conversation_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.store.reset(conversation_id).await
        };
        self.release(conversation_id, lock).await;
        result
    }

    /// Conversations with an event running or queued
    pub async fn active_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    async fn lock_for(&self, conversation_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no other task holds or waits on the lock.
    /// Clones only happen under the map mutex, so the count is stable here.
    async fn release(&self, conversation_id: Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        let is_current = locks
            .get(&conversation_id)
            .is_some_and(|current| Arc::ptr_eq(current, &lock));
        if is_current && Arc::strong_count(&lock) == 2 {
            locks.remove(&conversation_id);
        }
    }

    async fn dispatch(&self, state: ConversationState, event: InboundEvent) -> Result<Transition> {
        match event {
            InboundEvent::Document { file_name, bytes } => {
                self.on_document(RawDocument::new(file_name, bytes)).await
            }
            InboundEvent::Command { name } => self.on_command(state, &name).await,
            InboundEvent::Callback { data } => self.on_callback(state, &data).await,
            InboundEvent::Text { text } => self.on_text(state, &text).await,
        }
    }

    async fn on_document(&self, document: RawDocument) -> Result<Transition> {
        let output = self.pipeline.process(document).await?;
        let summary = output.summary;

        if let Some(message) = summary.error() {
            return Ok(Transition::reply(
                ConversationState::AwaitingDocument,
                Reply::text(format!("Error: {}", message)),
            ));
        }

        let replies = vec![
            Reply::text(menu::summary_text(&summary)),
            menu::action_menu(&derive_actions(&summary)),
        ];
        Ok(Transition::new(
            ConversationState::ReviewingSummary { summary },
            replies,
        ))
    }

    async fn on_command(&self, state: ConversationState, name: &str) -> Result<Transition> {
        let command = normalize_command(name);
        match command.as_str() {
            "start" => Ok(Transition::reply(state, Reply::text(WELCOME_MESSAGE))),
            "presupuesto" => Ok(Transition::reply(
                ConversationState::AwaitingDocument,
                Reply::text(UPLOAD_PROMPT),
            )),
            "cancelar" => match state.into_summary() {
                Some(summary) => {
                    let replies = vec![
                        Reply::text("Operación cancelada."),
                        menu::action_menu(&derive_actions(&summary)),
                    ];
                    Ok(Transition::new(
                        ConversationState::ReviewingSummary { summary },
                        replies,
                    ))
                }
                None => Ok(Transition::reply(
                    ConversationState::AwaitingDocument,
                    Reply::text("No hay nada que cancelar."),
                )),
            },
            "resumen" => match state.into_summary() {
                Some(summary) => {
                    let replies = vec![
                        Reply::text(menu::summary_text(&summary)),
                        menu::action_menu(&derive_actions(&summary)),
                    ];
                    Ok(Transition::new(
                        ConversationState::ReviewingSummary { summary },
                        replies,
                    ))
                }
                None => Ok(upload_first()),
            },
            other => match other.parse::<ActionKey>() {
                Ok(action) => self.on_action(state, action).await,
                Err(_) => Ok(Transition::reply(
                    state,
                    Reply::text(format!(
                        "No conozco el comando /{}. Usa /presupuesto o /resumen.",
                        other
                    )),
                )),
            },
        }
    }

    async fn on_callback(&self, state: ConversationState, data: &str) -> Result<Transition> {
        if data == MENU_CALLBACK {
            return Ok(match state.into_summary() {
                Some(summary) => {
                    let reply = menu::action_menu(&derive_actions(&summary));
                    Transition::reply(ConversationState::ReviewingSummary { summary }, reply)
                }
                None => upload_first(),
            });
        }

        if let Some(index) = data.strip_prefix(TRANSACTION_CALLBACK_PREFIX) {
            return self.on_transaction_selected(state, index);
        }

        if let Some(label) = data.strip_prefix(CATEGORY_CALLBACK_PREFIX) {
            return self.on_category_selected(state, label);
        }

        match data.parse::<ActionKey>() {
            Ok(action) => self.on_action(state, action).await,
            Err(_) => {
                warn!(data, "Unknown callback data");
                Ok(Transition::reply(
                    state,
                    Reply::text("Esa opción ya no está disponible."),
                ))
            }
        }
    }

    fn on_transaction_selected(&self, state: ConversationState, index: &str) -> Result<Transition> {
        let summary = match state {
            ConversationState::SelectingTransaction { summary } => summary,
            other => return Ok(stale_selection(other)),
        };

        let index: usize = index
            .parse()
            .map_err(|_| AssistantError::InvalidInput(format!("índice '{}' no válido", index)))?;
        if index >= summary.transactions.len() {
            return Err(AssistantError::InvalidInput(format!(
                "la transacción {} no existe (hay {})",
                index + 1,
                summary.transactions.len()
            )));
        }

        let reply = menu::category_picker(&summary, index);
        Ok(Transition::reply(
            ConversationState::ChoosingCategory {
                summary,
                transaction_index: index,
            },
            reply,
        ))
    }

    fn on_category_selected(&self, state: ConversationState, label: &str) -> Result<Transition> {
        let (mut summary, transaction_index) = match state {
            ConversationState::ChoosingCategory {
                summary,
                transaction_index,
            } => (summary, transaction_index),
            other => return Ok(stale_selection(other)),
        };

        let category: Category = label.parse()?;
        summary.recategorize(transaction_index, category)?;

        let description = summary.transactions[transaction_index].description.clone();
        info!(transaction_index, %category, "Transaction recategorized");

        let replies = vec![
            Reply::text(format!("Listo: «{}» ahora es {}.", description, category)),
            menu::action_menu(&derive_actions(&summary)),
        ];
        Ok(Transition::new(
            ConversationState::ReviewingSummary { summary },
            replies,
        ))
    }

    async fn on_text(&self, state: ConversationState, text: &str) -> Result<Transition> {
        match state {
            ConversationState::AwaitingMonthlyExpenses { summary } => match parse_amount(text) {
                Some(monthly_expenses) => {
                    let advice = self.advice.emergency_fund(monthly_expenses).await;
                    Ok(advice_transition(summary, advice))
                }
                None => Ok(Transition::reply(
                    ConversationState::AwaitingMonthlyExpenses { summary },
                    Reply::text(INVALID_AMOUNT_MESSAGE),
                )),
            },
            ConversationState::AwaitingDocument => Ok(Transition::reply(
                ConversationState::AwaitingDocument,
                Reply::text(WELCOME_MESSAGE),
            )),
            other => Ok(Transition::reply(
                other,
                Reply::text("Usa los botones del menú o /resumen para ver tu análisis."),
            )),
        }
    }

    async fn on_action(&self, state: ConversationState, action: ActionKey) -> Result<Transition> {
        let Some(summary) = state.into_summary() else {
            return Ok(upload_first());
        };

        info!(%action, "Running action");

        match action {
            ActionKey::RevisarTransacciones => {
                if summary.transactions.is_empty() {
                    return Ok(Transition::reply(
                        ConversationState::ReviewingSummary { summary },
                        Reply::text("No hay movimientos para revisar."),
                    ));
                }
                let reply = menu::transaction_picker(&summary);
                Ok(Transition::reply(
                    ConversationState::SelectingTransaction { summary },
                    reply,
                ))
            }
            ActionKey::PlanDeudas => {
                if !summary.has_loans() {
                    return Ok(Transition::reply(
                        ConversationState::ReviewingSummary { summary },
                        Reply::text("No detecté pagos de préstamos en este estado de cuenta."),
                    ));
                }
                let advice = self.advice.debt_plan(&summary).await;
                Ok(advice_transition(summary, advice))
            }
            ActionKey::FondoEmergencia => {
                let monthly_expenses = summary.resumen.total_expenses;
                if monthly_expenses <= 0.0 {
                    return Ok(Transition::reply(
                        ConversationState::AwaitingMonthlyExpenses { summary },
                        Reply::text(MONTHLY_EXPENSES_QUESTION),
                    ));
                }
                let advice = self.advice.emergency_fund(monthly_expenses).await;
                Ok(advice_transition(summary, advice))
            }
            ActionKey::PlanInversion => {
                let advice = self.advice.investment_plan(&summary).await;
                Ok(advice_transition(summary, advice))
            }
            ActionKey::IngresoPasivo => {
                if summary.corroborated_recurring_payments().is_empty() {
                    return Ok(Transition::reply(
                        ConversationState::ReviewingSummary { summary },
                        Reply::text("No detecté pagos recurrentes en tus movimientos."),
                    ));
                }
                let advice = self.advice.passive_income(&summary).await;
                Ok(advice_transition(summary, advice))
            }
            ActionKey::GenerarOportunidad => {
                let advice = self.advice.opportunity(&summary).await;
                Ok(advice_transition(summary, advice))
            }
        }
    }
}

// ===== Helpers =====

fn upload_first() -> Transition {
    Transition::reply(
        ConversationState::AwaitingDocument,
        Reply::text(UPLOAD_FIRST_MESSAGE),
    )
}

fn stale_selection(state: ConversationState) -> Transition {
    Transition::reply(
        state,
        Reply::text("Esa selección ya no está vigente. Usa /resumen para volver al menú."),
    )
}

fn advice_transition(summary: FinancialSummary, advice: String) -> Transition {
    let back = vec![vec![Button::new("⬅️ Volver al menú", MENU_CALLBACK)]];
    Transition::reply(
        ConversationState::ReviewingSummary { summary },
        Reply::text(advice).with_keyboard(back),
    )
}

/// "/Plan_Deudas@mi_bot" → "plan_deudas"
fn normalize_command(name: &str) -> String {
    let name = name.trim().trim_start_matches('/');
    let name = name.split('@').next().unwrap_or(name);
    name.to_lowercase()
}

/// User-typed money amount: "$12,500.50", "12500", " 9 800 "
fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '\t'))
        .collect();
    let cleaned = cleaned.trim_end_matches("MXN").trim_end_matches("mxn");
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount > 0.0)
}
