//! Interactive session: pick ingredients, search, open recipes and manage
//! favorites without leaving the prompt.

use anyhow::Result;
use std::io::{self, BufRead, Write};
use tokio::sync::broadcast::Receiver;
use tracing::warn;

use pantry_core::catalog::Catalog;
use pantry_core::error::{FAVORITE_TOGGLE_FAILED, NOT_SIGNED_IN, RATING_SAVE_FAILED};
use pantry_core::identity::{IdentityContext, IdentityProvider, SessionEvent};
use pantry_core::models::{LoadState, RecipeId, UserId};
use pantry_core::reconcile::REMOVED_FAVORITE_TITLE;
use pantry_core::search::SearchOrchestrator;
use pantry_core::selection::SelectionState;

use super::App;
use super::helpers::{
    parse_stars, print_favorites_table, print_ingredient_table, print_recipe_page,
    print_recipe_table,
};

const HELP: &str = "\
Commands:
  all                 show every ingredient (again to hide)
  find <text>         filter ingredients by name (no text clears the filter)
  pick <key>...       select or unselect ingredients
  clear               drop the whole selection
  search              find recipes for the selection
  open <id>           show a recipe
  fav <id>            favorite or unfavorite a recipe
  rate <id> <0-5>     rate a recipe
  comment <id> <text> comment on a rated recipe
  favorites           list your favorites
  unfav <id>          remove a recipe from your favorites
  logout              sign out
  help                show this help
  quit                leave";

#[derive(Debug, Clone, PartialEq)]
enum BrowseCommand {
    ShowAll,
    Find(String),
    Pick(Vec<String>),
    Clear,
    Search,
    Open(RecipeId),
    Favorite(RecipeId),
    Unfavorite(RecipeId),
    Rate(RecipeId, f64),
    Comment(RecipeId, String),
    Favorites,
    Logout,
    Help,
    Quit,
}

fn parse_id(arg: Option<&str>) -> Result<RecipeId, String> {
    let arg = arg.ok_or("missing recipe id")?;
    arg.parse()
        .map_err(|_| format!("'{arg}' is not a recipe id"))
}

/// `Ok(None)` for a blank line.
fn parse_command(line: &str) -> Result<Option<BrowseCommand>, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match word.to_lowercase().as_str() {
        "" => return Ok(None),
        "all" => BrowseCommand::ShowAll,
        "find" => BrowseCommand::Find(rest.to_string()),
        "pick" => {
            if rest.is_empty() {
                return Err("pick needs at least one ingredient key".to_string());
            }
            BrowseCommand::Pick(rest.split_whitespace().map(str::to_lowercase).collect())
        }
        "clear" => BrowseCommand::Clear,
        "search" => BrowseCommand::Search,
        "open" => BrowseCommand::Open(parse_id(Some(rest))?),
        "fav" => BrowseCommand::Favorite(parse_id(Some(rest))?),
        "unfav" => BrowseCommand::Unfavorite(parse_id(Some(rest))?),
        "rate" => {
            let mut args = rest.split_whitespace();
            let id = parse_id(args.next())?;
            let value = args.next().ok_or("missing rating value")?;
            BrowseCommand::Rate(id, parse_stars(value).map_err(|e| e.to_string())?)
        }
        "comment" => {
            let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let text = text.trim();
            if text.is_empty() {
                return Err("missing comment text".to_string());
            }
            BrowseCommand::Comment(parse_id(Some(id))?, text.to_string())
        }
        "favorites" => BrowseCommand::Favorites,
        "logout" => BrowseCommand::Logout,
        "help" | "?" => BrowseCommand::Help,
        "quit" | "exit" | "q" => BrowseCommand::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(command))
}

struct Browser<'a> {
    app: &'a App,
    identity: IdentityContext,
    events: Receiver<SessionEvent>,
    catalog: LoadState<Catalog>,
    selection: SelectionState,
    search: SearchOrchestrator,
}

impl<'a> Browser<'a> {
    fn new(app: &'a App) -> Self {
        Self {
            app,
            identity: app.identity(),
            events: app.auth.subscribe(),
            catalog: LoadState::Loading,
            selection: SelectionState::new(app.retention),
            search: SearchOrchestrator::new(),
        }
    }

    async fn load_catalog(&mut self) {
        self.catalog = match self.app.service.load_catalog().await {
            Ok(catalog) => LoadState::Ready(catalog),
            Err(e) => LoadState::Failed {
                message: e.user_message().to_string(),
            },
        };
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.identity.observe(&event);
        }
    }

    fn user_id(&self) -> Option<UserId> {
        let user_id = self.identity.user_id();
        if user_id.is_none() {
            println!("{NOT_SIGNED_IN}");
        }
        user_id
    }

    fn show_selection_panel(&self) {
        let catalog = match &self.catalog {
            LoadState::Ready(catalog) => catalog,
            LoadState::Failed { message } => {
                println!("{message}");
                return;
            }
            LoadState::Loading => return,
        };
        if !self.selection.is_panel_visible() {
            println!("Pick ingredients with 'pick <key>' or list them with 'all'.");
            return;
        }
        let view = self.selection.displayed(catalog);
        println!("{}", view.heading);
        match &view.empty_message {
            Some(message) => println!("{message}"),
            None => print_ingredient_table(&view.items, self.selection.selection()),
        }
        if self.selection.can_search(self.catalog.is_loading()) {
            println!("'search' → {}", self.selection.search_label());
        }
    }

    /// Returns `false` when the session should end.
    async fn execute(&mut self, command: BrowseCommand) -> bool {
        match command {
            BrowseCommand::ShowAll => {
                self.selection.toggle_show_all();
                self.show_selection_panel();
            }
            BrowseCommand::Find(term) => {
                self.selection.set_search_term(&term);
                self.show_selection_panel();
            }
            BrowseCommand::Pick(keys) => {
                for key in &keys {
                    self.selection.toggle(key);
                }
                self.show_selection_panel();
            }
            BrowseCommand::Clear => {
                self.selection.reset();
                self.show_selection_panel();
            }
            BrowseCommand::Search => self.run_search().await,
            BrowseCommand::Open(id) => self.open(id).await,
            BrowseCommand::Favorite(id) => self.toggle_favorite(id).await,
            BrowseCommand::Unfavorite(id) => self.unfavorite(id).await,
            BrowseCommand::Rate(id, value) => self.rate(id, value).await,
            BrowseCommand::Comment(id, text) => self.comment(id, &text).await,
            BrowseCommand::Favorites => self.favorites().await,
            BrowseCommand::Logout => self.logout().await,
            BrowseCommand::Help => println!("{HELP}"),
            BrowseCommand::Quit => return false,
        }
        true
    }

    async fn run_search(&mut self) {
        if !self.selection.can_search(self.catalog.is_loading()) {
            println!("Pick at least one ingredient first.");
            return;
        }
        self.search
            .search(self.app.service.api(), self.selection.selection())
            .await;
        if let Some(message) = self.search.error() {
            println!("{message}");
        } else if self.search.results().is_empty() {
            println!("Nenhuma receita encontrada.");
        } else {
            print_recipe_table(self.search.results());
        }
    }

    async fn open(&mut self, id: RecipeId) {
        self.selection.leave_page();
        match self
            .app
            .service
            .reconciler()
            .open_recipe(self.identity.user_id(), id)
            .await
        {
            Ok(page) => print_recipe_page(&page),
            Err(e) => println!("{}", e.user_message()),
        }
    }

    fn known_title(&self, id: RecipeId) -> Option<String> {
        self.search
            .results()
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.title.clone())
    }

    async fn toggle_favorite(&mut self, id: RecipeId) {
        let Some(user_id) = self.user_id() else {
            return;
        };
        let reconciler = self.app.service.reconciler();
        let current = match reconciler.favorite_state(user_id, id) {
            Some(current) => current,
            None => match reconciler.load_favorite_state(user_id, id).await {
                Ok(current) => current,
                Err(e) => {
                    warn!("Could not read favorite state for recipe {id}: {e}");
                    println!("{FAVORITE_TOGGLE_FAILED}");
                    return;
                }
            },
        };
        let title = match self.known_title(id) {
            Some(title) => title,
            None if current => REMOVED_FAVORITE_TITLE.to_string(),
            None => self
                .app
                .service
                .recipe_details(id)
                .await
                .map_or_else(|_| REMOVED_FAVORITE_TITLE.to_string(), |d| d.title),
        };
        match reconciler.toggle_favorite(user_id, id, &title, current).await {
            Ok(true) => println!("★ {title}"),
            Ok(false) => println!("☆ {title}"),
            Err(e) => println!("{}", e.user_message()),
        }
    }

    async fn unfavorite(&mut self, id: RecipeId) {
        let Some(user_id) = self.user_id() else {
            return;
        };
        if let Err(e) = self
            .app
            .service
            .reconciler()
            .remove_favorite(user_id, id)
            .await
        {
            println!("{}", e.user_message());
            return;
        }
        self.favorites().await;
    }

    /// False when the stored rating could not be read; nothing is saved then.
    async fn ensure_rating_loaded(&self, user_id: UserId, id: RecipeId) -> bool {
        let reconciler = self.app.service.reconciler();
        if reconciler.rating(user_id, id).is_some() {
            return true;
        }
        match reconciler.load_rating(user_id, id).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Could not read the stored rating for recipe {id}: {e}");
                println!("{RATING_SAVE_FAILED}");
                false
            }
        }
    }

    async fn rate(&mut self, id: RecipeId, value: f64) {
        let Some(user_id) = self.user_id() else {
            return;
        };
        if !self.ensure_rating_loaded(user_id, id).await {
            return;
        }
        match self
            .app
            .service
            .reconciler()
            .rate(user_id, id, value, None)
            .await
        {
            Ok(saved) => println!("Avaliação salva: {saved} ★"),
            Err(e) => println!("{}", e.user_message()),
        }
    }

    async fn comment(&mut self, id: RecipeId, text: &str) {
        let Some(user_id) = self.user_id() else {
            return;
        };
        if !self.ensure_rating_loaded(user_id, id).await {
            return;
        }
        match self
            .app
            .service
            .reconciler()
            .save_comment(user_id, id, text)
            .await
        {
            Ok(_) => println!("Comentário salvo."),
            Err(e) => println!("{}", e.user_message()),
        }
    }

    async fn favorites(&mut self) {
        self.selection.leave_page();
        let Some(user_id) = self.user_id() else {
            return;
        };
        match self.app.service.reconciler().load_favorites(user_id).await {
            Ok(view) => {
                if let Some(warning) = view.warning {
                    println!("{warning}");
                }
                if view.entries.is_empty() {
                    println!("Você ainda não salvou nenhuma receita.");
                } else {
                    print_favorites_table(&view.entries);
                }
            }
            Err(e) => println!("{}", e.user_message()),
        }
    }

    async fn logout(&mut self) {
        let result = self.app.accounts.logout().await;
        if result.is_err() {
            self.app.supabase.set_session(None);
            self.identity = IdentityContext::anonymous();
        }
        if let Err(e) = self.app.persist_session() {
            warn!("{e:#}");
        }
        match result {
            Ok(()) => println!("Você saiu da sua conta."),
            Err(e) => println!("{}", e.user_message()),
        }
    }
}

pub(crate) async fn cmd_browse(app: &App) -> Result<()> {
    let mut browser = Browser::new(app);
    browser.load_catalog().await;
    match browser.identity.user() {
        Some(user) => println!("Olá, {}! Type 'help' for commands.", user.display_name()),
        None => println!("Type 'help' for commands. Sign in with 'pantry auth login' to save favorites."),
    }
    browser.show_selection_panel();

    let stdin = io::stdin();
    loop {
        print!("pantry> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        let keep_going = browser.execute(command).await;
        browser.drain_events();
        if !keep_going {
            break;
        }
    }
    Ok(())
}
