//! rollcall - terminal front end for the rollcall class-attendance API.
//!
//! Signs students and instructors in, keeps their tokens in the platform
//! keychain, and issues authenticated requests against the API.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rollcall_core::forms::{InstructorRegistrationForm, LoginForm, StudentRegistrationForm};
use rollcall_core::{
    route_decision, ApiClient, ApiError, AuthService, Config, RequestOptions, RouteDecision,
    SessionStore, Vault,
};

// ============================================================================
// Constants
// ============================================================================

const LOG_FILE: &str = "rollcall.log";

const USAGE: &str = "\
Usage: rollcall <command>

Commands:
  status                  Show the current session
  login [email]           Sign in with email and password
  register-student        Create a student account
  register-instructor     Create an instructor account
  logout                  Sign out and forget stored tokens
  refresh                 Exchange the stored refresh token now
  get <path>              Authenticated GET, prints the JSON response
  post <path> [json]      Authenticated POST with an optional JSON body

Environment:
  ROLLCALL_API_URL        API base URL
  ROLLCALL_VAULT          Token storage: auto, keyring, file, memory
  ROLLCALL_TIMEOUT_SECS   Per-request timeout in seconds
  RUST_LOG                Log filter (default: warn)";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and, when the cache directory is writable, to a
/// daily-rolled file there. The returned guard must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    let _log_guard = init_tracing(config.cache_dir().ok().as_deref());
    info!(command, "rollcall starting");
    config.warn_if_incomplete();

    let vault = Vault::open(config.vault_backend, config.token_file().ok())?;
    let session = Arc::new(SessionStore::new(vault));
    session.hydrate().await;

    let api = ApiClient::with_timeout(
        config.api_base_url.clone(),
        Arc::clone(&session),
        config.request_timeout(),
    )?;
    let auth = AuthService::new(api);

    let result = match command {
        "status" => status(&auth).await,
        "login" => login(&auth, args.get(1).cloned()).await,
        "register-student" => register_student(&auth).await,
        "register-instructor" => register_instructor(&auth).await,
        "logout" => logout(&auth).await,
        "refresh" => refresh(&auth).await,
        "get" => get(&auth, &args[1..]).await,
        "post" => post(&auth, &args[1..]).await,
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    };

    info!("rollcall finished");
    result
}

// ============================================================================
// Commands
// ============================================================================

async fn status(auth: &AuthService) -> Result<()> {
    let session = auth.session().wait_hydrated().await;
    println!("Storage:  {}", auth.session().vault().backend_name());
    println!(
        "API:      {}",
        auth.api().base_url().unwrap_or("(not configured)")
    );
    match route_decision(&session, false) {
        RouteDecision::Allow => println!("Session:  signed in"),
        RouteDecision::RedirectToLogin => println!("Session:  signed out (run `rollcall login`)"),
        RouteDecision::Pending | RouteDecision::RedirectHome => println!("Session:  unknown"),
    }
    if let Some(user) = &session.user {
        println!("User:     {} <{}> ({})", user.full_name(), user.email, user.role);
    }
    Ok(())
}

async fn login(auth: &AuthService, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email")?,
    };
    let form = LoginForm {
        email,
        password: prompt_password("Password")?,
    };
    let request = form.validate()?;

    let response = auth
        .login(&request.email, &request.password)
        .await
        .map_err(|e| report(e, "Login failed. Please try again."))?;
    println!(
        "Signed in as {} ({})",
        response.user.full_name(),
        response.user.role
    );
    Ok(())
}

async fn register_student(auth: &AuthService) -> Result<()> {
    let (email, password, confirm_password) = prompt_credentials()?;
    let form = StudentRegistrationForm {
        email,
        password,
        confirm_password,
        first_name: prompt("First name")?,
        last_name: prompt("Last name")?,
        bio: prompt("Bio (optional)")?,
        student_number: prompt("Student number (optional, 9 digits)")?,
        major: prompt("Major (optional)")?,
    };
    let request = form.validate()?;

    let response = auth
        .register_student(&request)
        .await
        .map_err(|e| report(e, "Registration failed. Please try again."))?;
    println!("Welcome, {}! Student account created.", response.user.first_name);
    Ok(())
}

async fn register_instructor(auth: &AuthService) -> Result<()> {
    let (email, password, confirm_password) = prompt_credentials()?;
    let form = InstructorRegistrationForm {
        email,
        password,
        confirm_password,
        first_name: prompt("First name")?,
        last_name: prompt("Last name")?,
        bio: prompt("Bio (optional)")?,
        department: prompt("Department (optional)")?,
        office_location: prompt("Office location (optional)")?,
    };
    let request = form.validate()?;

    let response = auth
        .register_instructor(&request)
        .await
        .map_err(|e| report(e, "Registration failed. Please try again."))?;
    println!(
        "Welcome, {}! Instructor account created.",
        response.user.first_name
    );
    Ok(())
}

async fn logout(auth: &AuthService) -> Result<()> {
    auth.logout()
        .await
        .context("Signed out, but stored tokens could not be removed")?;
    println!("Signed out.");
    Ok(())
}

async fn refresh(auth: &AuthService) -> Result<()> {
    auth.refresh_tokens()
        .await
        .map_err(|e| report(e, "Token refresh failed."))?;
    println!("Tokens refreshed.");
    Ok(())
}

async fn get(auth: &AuthService, args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("Usage: rollcall get <path>");
    };
    let value: Value = auth
        .api()
        .get(path, RequestOptions::new())
        .await
        .map_err(|e| report(e, "Request failed."))?;
    print_json(&value)
}

async fn post(auth: &AuthService, args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("Usage: rollcall post <path> [json]");
    };
    let options = match parse_body(args.get(1).map(String::as_str))? {
        Some(body) => RequestOptions::new().body(body),
        None => RequestOptions::new(),
    };
    let value = auth
        .api()
        .request(rollcall_core::Method::POST, path, options)
        .await
        .map_err(|e| report(e, "Request failed."))?;
    print_json(&value.unwrap_or(Value::Null))
}

// ============================================================================
// Helpers
// ============================================================================

/// Turn an API error into the message a user should see
fn report(error: ApiError, fallback: &str) -> anyhow::Error {
    anyhow::anyhow!(describe(&error, fallback))
}

fn describe(error: &ApiError, fallback: &str) -> String {
    let message = error.user_message(fallback);
    if error.is_auth_failure() {
        format!("{}\nRun `rollcall login` to sign in again.", message)
    } else {
        message
    }
}

/// A missing argument sends no body; a literal `null` is sent as JSON null
fn parse_body(raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(serde_json::from_str)
        .transpose()
        .context("Request body is not valid JSON")
}

fn print_json(value: &Value) -> Result<()> {
    if !value.is_null() {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(format!("{}: ", label)).context("Failed to read password")
}

fn prompt_credentials() -> Result<(String, String, String)> {
    let email = prompt("Email")?;
    let password = prompt_password("Password")?;
    let confirm = prompt_password("Confirm password")?;
    Ok((email, password, confirm))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_auth_failures_suggest_login() {
        let message = describe(&ApiError::SessionExpired, "Request failed.");
        assert_eq!(
            message,
            "Session expired. Please log in again.\nRun `rollcall login` to sign in again."
        );

        let rejected = ApiError::Http {
            status: 401,
            data: json!({"detail": "Invalid email or password"}),
        };
        assert!(describe(&rejected, "Login failed.").ends_with("Run `rollcall login` to sign in again."));
    }

    #[test]
    fn test_post_body_distinguishes_null_from_absent() {
        assert_eq!(parse_body(None).unwrap(), None);
        assert_eq!(parse_body(Some("null")).unwrap(), Some(Value::Null));
        assert_eq!(
            parse_body(Some(r#"{"code":"AB12"}"#)).unwrap(),
            Some(json!({"code": "AB12"}))
        );
        assert!(parse_body(Some("{oops")).is_err());
    }

    #[test]
    fn test_other_failures_keep_the_server_message() {
        let missing = ApiError::Http {
            status: 404,
            data: json!({"detail": "Course not found"}),
        };
        assert_eq!(describe(&missing, "Request failed."), "Course not found");
    }
}
