//! Reply rendering: summary text, action menu and selection keyboards

use serde::{Deserialize, Serialize};

use crate::models::{ActionSet, Category, FinancialSummary};

pub const BUTTONS_PER_ROW: usize = 2;

pub const MENU_CALLBACK: &str = "menu";
pub const TRANSACTION_CALLBACK_PREFIX: &str = "tx:";
pub const CATEGORY_CALLBACK_PREFIX: &str = "cat:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub callback_data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// One outbound chat message with an optional inline keyboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyboard: Vec<Vec<Button>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
        }
    }

    pub fn with_keyboard(mut self, keyboard: Vec<Vec<Button>>) -> Self {
        self.keyboard = keyboard;
        self
    }
}

fn into_rows(buttons: Vec<Button>) -> Vec<Vec<Button>> {
    buttons
        .chunks(BUTTONS_PER_ROW)
        .map(|row| row.to_vec())
        .collect()
}

pub fn summary_text(summary: &FinancialSummary) -> String {
    let r = &summary.resumen;
    format!(
        "Análisis Completado.\n\n\
         Saldo Inicial: {:.2}\n\
         Saldo Final: {:.2}\n\
         Total Ingresos: {:.2}\n\
         Total Egresos: {:.2}\n\
         Movimientos: {}",
        r.opening_balance,
        r.closing_balance,
        r.total_income,
        r.total_expenses,
        summary.transactions.len()
    )
}

/// Action list with its button grid; callback data is the action key
pub fn action_menu(actions: &ActionSet) -> Reply {
    if actions.is_empty() {
        return Reply::text("No he detectado acciones específicas para este documento.");
    }

    let mut text = String::from("Acciones Disponibles:");
    for message in actions.values() {
        text.push_str("\n• ");
        text.push_str(message);
    }

    let buttons = actions
        .keys()
        .map(|key| Button::new(key.button_label(), key.as_str()))
        .collect();

    Reply::text(text).with_keyboard(into_rows(buttons))
}

/// One transaction per row so long descriptions stay readable
pub fn transaction_picker(summary: &FinancialSummary) -> Reply {
    let mut keyboard: Vec<Vec<Button>> = summary
        .transactions
        .iter()
        .enumerate()
        .map(|(i, tx)| {
            vec![Button::new(
                format!(
                    "{}. {} {} {:.2} ({})",
                    i + 1,
                    tx.date,
                    tx.description,
                    tx.amount,
                    tx.category
                ),
                format!("{}{}", TRANSACTION_CALLBACK_PREFIX, i),
            )]
        })
        .collect();
    keyboard.push(vec![Button::new("⬅️ Volver al menú", MENU_CALLBACK)]);

    Reply::text("Elige la transacción que quieres corregir:").with_keyboard(keyboard)
}

pub fn category_picker(summary: &FinancialSummary, transaction_index: usize) -> Reply {
    let heading = match summary.transactions.get(transaction_index) {
        Some(tx) => format!(
            "«{}» está en {}. Elige la nueva categoría:",
            tx.description, tx.category
        ),
        None => "Elige la nueva categoría:".to_string(),
    };

    let buttons = Category::ALL
        .iter()
        .map(|c| Button::new(c.label(), format!("{}{}", CATEGORY_CALLBACK_PREFIX, c.label())))
        .collect();

    Reply::text(heading).with_keyboard(into_rows(buttons))
}
