use anyhow::Result;
use serde_json::json;
use tracing::warn;

use pantry_core::account::{
    NAME_UPDATED, PASSWORD_UPDATED, REGISTERED, RESET_EMAIL_SENT, Registration, SIGNED_IN,
};
use pantry_core::error::NOT_SIGNED_IN;
use pantry_core::identity::{IdentityContext, Route, User, redirect_for};

use super::helpers::{exit_with, print_json, prompt, value_or_prompt};
use super::{App, exit_auth};

fn print_user(user: &User, message: &str, json: bool) -> Result<()> {
    if json {
        print_json(&json!({
            "id": user.id,
            "email": user.email,
            "name": user.display_name(),
        }))?;
    } else {
        println!("{message}");
        println!("{} <{}>", user.display_name(), user.email);
    }
    Ok(())
}

pub(crate) async fn cmd_register(
    app: &App,
    name: Option<String>,
    email: Option<String>,
    json: bool,
) -> Result<()> {
    let form = Registration {
        name: value_or_prompt(name, "Nome")?,
        email: value_or_prompt(email, "E-mail")?,
        password: prompt("Senha")?,
        confirmation: prompt("Confirme a senha")?,
    };

    match app.accounts.register(&form).await {
        Ok(Some(session)) => {
            app.persist_session()?;
            print_user(&session.user, SIGNED_IN, json)
        }
        Ok(None) => {
            if json {
                print_json(&json!({ "email": form.email, "confirmation_required": true }))?;
            } else {
                println!("{REGISTERED}");
            }
            Ok(())
        }
        Err(e) => exit_auth(json, &e),
    }
}

pub(crate) async fn cmd_login(app: &App, email: Option<String>, json: bool) -> Result<()> {
    let email = value_or_prompt(email, "E-mail")?;
    let password = prompt("Senha")?;

    match app.accounts.login(&email, &password).await {
        Ok(session) => {
            app.persist_session()?;
            print_user(&session.user, SIGNED_IN, json)
        }
        Err(e) => exit_auth(json, &e),
    }
}

pub(crate) async fn cmd_logout(app: &App, json: bool) -> Result<()> {
    let result = app.accounts.logout().await;
    if result.is_err() {
        // The local session goes regardless of what the server said.
        app.supabase.set_session(None);
    }
    app.persist_session()?;

    if let Err(e) = result {
        exit_auth(json, &e);
    }
    if json {
        print_json(&json!({ "signed_out": true }))?;
    } else {
        println!("Você saiu da sua conta.");
    }
    Ok(())
}

pub(crate) async fn cmd_reset_password(app: &App, email: Option<String>, json: bool) -> Result<()> {
    let email = value_or_prompt(email, "E-mail")?;
    if let Err(e) = app.accounts.reset_password(&email).await {
        exit_auth(json, &e);
    }
    if json {
        print_json(&json!({ "email": email.trim(), "sent": true }))?;
    } else {
        println!("{RESET_EMAIL_SENT}");
    }
    Ok(())
}

pub(crate) async fn cmd_update_password(app: &App, json: bool) -> Result<()> {
    app.require_user(json);
    let password = prompt("Nova senha")?;
    let confirmation = prompt("Confirme a nova senha")?;

    match app.accounts.update_password(&password, &confirmation).await {
        Ok(user) => {
            app.persist_session()?;
            print_user(&user, PASSWORD_UPDATED, json)
        }
        Err(e) => exit_auth(json, &e),
    }
}

pub(crate) async fn cmd_rename(app: &App, name: &str, json: bool) -> Result<()> {
    app.require_user(json);
    match app.accounts.update_display_name(name).await {
        Ok(user) => {
            app.persist_session()?;
            print_user(&user, NAME_UPDATED, json)
        }
        Err(e) => exit_auth(json, &e),
    }
}

/// Ask the identity provider who the stored session belongs to.
pub(crate) async fn cmd_whoami(app: &App, json: bool) -> Result<()> {
    let identity = match IdentityContext::resolve(app.accounts.provider()).await {
        Ok(identity) => identity,
        Err(e) => exit_auth(json, &e),
    };
    // A rejected session was dropped by the client.
    app.persist_session()?;

    match identity.user() {
        Some(user) => print_user(user, "Conectado como:", json),
        None => exit_with(json, NOT_SIGNED_IN, 1),
    }
}

/// Handle the link an auth email sends the user to. A password recovery link
/// signs the user in for the password change.
pub(crate) async fn cmd_redirect(app: &App, url: &str, json: bool) -> Result<()> {
    let fragment = url.split_once('#').map(|(_, f)| f);
    let mut has_session = app.supabase.session().is_some();

    let route = redirect_for(fragment, has_session);
    if let (Route::UpdatePassword, Some(fragment)) = (route, fragment) {
        match app.auth.recover_from_fragment(fragment).await {
            Ok(_) => {
                app.persist_session()?;
                has_session = true;
            }
            Err(e) => {
                warn!("Recovery link rejected: {e}");
                exit_auth(json, &e);
            }
        }
    }

    if json {
        print_json(&json!({ "route": route, "path": route.path(), "signed_in": has_session }))?;
        return Ok(());
    }
    match route {
        Route::UpdatePassword => {
            println!("Defina sua nova senha com: pantry auth update-password");
        }
        Route::Home => println!("Conectado. Busque receitas com: pantry browse"),
        Route::Login => println!("Entre com: pantry auth login"),
    }
    Ok(())
}
