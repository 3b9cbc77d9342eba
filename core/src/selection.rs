use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::models::{Ingredient, SelectionSet};

/// What happens to the selection when the user leaves the search page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionRetention {
    /// Keep the picks for when the user comes back.
    #[default]
    Remember,
    /// Start over on every visit.
    Clear,
}

/// Which rule produced the displayed ingredient list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayBranch {
    All,
    Filtered,
    Selected,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayView<'a> {
    pub branch: DisplayBranch,
    pub items: Vec<&'a Ingredient>,
    pub heading: String,
    /// Set when `items` is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    selection: SelectionSet,
    search_term: String,
    show_all: bool,
    retention: SelectionRetention,
}

impl SelectionState {
    #[must_use]
    pub fn new(retention: SelectionRetention) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    #[must_use]
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    #[must_use]
    pub fn show_all(&self) -> bool {
        self.show_all
    }

    pub fn toggle(&mut self, name_key: &str) -> bool {
        self.selection.toggle(name_key)
    }

    /// A non-empty term turns "show all" off.
    pub fn set_search_term(&mut self, term: &str) {
        self.search_term = term.to_string();
        if !term.is_empty() {
            self.show_all = false;
        }
    }

    /// Flip "show all". Either way the search term is cleared.
    pub fn toggle_show_all(&mut self) -> bool {
        self.show_all = !self.show_all;
        self.search_term.clear();
        self.show_all
    }

    pub fn reset(&mut self) {
        self.selection.clear();
        self.search_term.clear();
        self.show_all = false;
    }

    /// Apply the retention policy when navigating away from the search page.
    pub fn leave_page(&mut self) {
        if self.retention == SelectionRetention::Clear {
            self.reset();
        }
    }

    #[must_use]
    pub fn is_searching(&self) -> bool {
        !self.search_term.is_empty()
    }

    #[must_use]
    pub fn is_panel_visible(&self) -> bool {
        self.show_all || self.is_searching() || !self.selection.is_empty()
    }

    #[must_use]
    pub fn can_search(&self, catalog_loading: bool) -> bool {
        !catalog_loading && !self.selection.is_empty()
    }

    #[must_use]
    pub fn search_label(&self) -> String {
        format!("Buscar Receitas ({})", self.selection.len())
    }

    /// Rows to show, first matching rule wins: show all, search term,
    /// selection, nothing.
    #[must_use]
    pub fn displayed<'a>(&self, catalog: &'a Catalog) -> DisplayView<'a> {
        let (branch, items): (DisplayBranch, Vec<&Ingredient>) = if self.show_all {
            (DisplayBranch::All, catalog.iter().collect())
        } else if self.is_searching() {
            let needle = self.search_term.to_lowercase();
            let items = catalog
                .iter()
                .filter(|i| i.display_name.to_lowercase().contains(&needle))
                .collect();
            (DisplayBranch::Filtered, items)
        } else if !self.selection.is_empty() {
            let items = catalog
                .iter()
                .filter(|i| self.selection.contains(&i.name_key))
                .collect();
            (DisplayBranch::Selected, items)
        } else {
            (DisplayBranch::Empty, Vec::new())
        };

        let heading = match branch {
            DisplayBranch::Filtered => format!("Resultados para \"{}\"", self.search_term),
            DisplayBranch::Selected => format!("Itens Selecionados ({})", self.selection.len()),
            DisplayBranch::All | DisplayBranch::Empty => "Todos os Ingredientes".to_string(),
        };

        let empty_message = items.is_empty().then(|| {
            if branch == DisplayBranch::Filtered {
                format!("Nenhum ingrediente encontrado para \"{}\".", self.search_term)
            } else {
                "Sua lista de seleção está vazia.".to_string()
            }
        });

        DisplayView {
            branch,
            items,
            heading,
            empty_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngredientRow;

    fn catalog() -> Catalog {
        let rows = [(1, "tomate", "tomato"), (2, "ovo", "egg"), (3, "cebola", "onion")]
            .into_iter()
            .map(|(id, pt, en)| IngredientRow {
                id,
                nome_pt: pt.to_string(),
                nome_en: en.to_string(),
            })
            .collect();
        Catalog::from_rows(rows)
    }

    fn names(view: &DisplayView<'_>) -> Vec<String> {
        view.items.iter().map(|i| i.display_name.clone()).collect()
    }

    #[test]
    fn test_initial_state_shows_nothing() {
        let state = SelectionState::default();
        let cat = catalog();
        let view = state.displayed(&cat);
        assert_eq!(view.branch, DisplayBranch::Empty);
        assert!(view.items.is_empty());
        assert!(!state.is_panel_visible());
        assert!(!state.can_search(false));
    }

    #[test]
    fn test_show_all_wins_over_search_term() {
        let mut state = SelectionState::default();
        state.set_search_term("tom");
        // Flags are normally exclusive; force both to check precedence.
        state.show_all = true;
        let cat = catalog();
        let view = state.displayed(&cat);
        assert_eq!(view.branch, DisplayBranch::All);
        assert_eq!(view.items.len(), cat.len());
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let mut state = SelectionState::default();
        let cat = catalog();

        state.set_search_term("tom");
        assert_eq!(names(&state.displayed(&cat)), vec!["Tomate"]);

        state.set_search_term("OV");
        assert_eq!(names(&state.displayed(&cat)), vec!["Ovo"]);
    }

    #[test]
    fn test_search_without_match_reports_not_found() {
        let mut state = SelectionState::default();
        state.set_search_term("xyz");
        let cat = catalog();
        let view = state.displayed(&cat);
        assert_eq!(view.branch, DisplayBranch::Filtered);
        assert!(view.items.is_empty());
        assert_eq!(
            view.empty_message.as_deref(),
            Some("Nenhum ingrediente encontrado para \"xyz\".")
        );
    }

    #[test]
    fn test_selection_branch_shows_only_selected() {
        let mut state = SelectionState::default();
        state.toggle("egg");
        state.toggle("onion");
        let cat = catalog();
        let view = state.displayed(&cat);
        assert_eq!(view.branch, DisplayBranch::Selected);
        assert_eq!(names(&view), vec!["Ovo", "Cebola"]);
        assert_eq!(view.heading, "Itens Selecionados (2)");
        assert!(state.can_search(false));
        assert!(!state.can_search(true));
        assert_eq!(state.search_label(), "Buscar Receitas (2)");
    }

    #[test]
    fn test_search_term_clears_show_all() {
        let mut state = SelectionState::default();
        assert!(state.toggle_show_all());
        state.set_search_term("o");
        assert!(!state.show_all());

        // Clearing the term does not bring "show all" back
        state.set_search_term("");
        assert!(!state.show_all());
    }

    #[test]
    fn test_show_all_clears_search_term() {
        let mut state = SelectionState::default();
        state.set_search_term("tom");
        state.toggle_show_all();
        assert!(state.show_all());
        assert_eq!(state.search_term(), "");

        // Turning it off also clears the term
        state.set_search_term("ovo");
        state.show_all = true;
        state.toggle_show_all();
        assert_eq!(state.search_term(), "");
    }

    #[test]
    fn test_both_flags_off_falls_through_to_selection() {
        let mut state = SelectionState::default();
        state.toggle("tomato");
        state.toggle_show_all();
        state.toggle_show_all();
        let cat = catalog();
        assert_eq!(state.displayed(&cat).branch, DisplayBranch::Selected);
    }

    #[test]
    fn test_retention_policy() {
        let mut remember = SelectionState::new(SelectionRetention::Remember);
        remember.toggle("egg");
        remember.leave_page();
        assert!(remember.selection().contains("egg"));

        let mut clear = SelectionState::new(SelectionRetention::Clear);
        clear.toggle("egg");
        clear.set_search_term("ov");
        clear.leave_page();
        assert!(clear.selection().is_empty());
        assert_eq!(clear.search_term(), "");
    }
}
