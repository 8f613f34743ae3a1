//! Admin user management commands.
//!
//! These talk to storage directly, through the same backend selection the
//! server uses. PostgreSQL can be shared with a running server; the sled
//! document store is locked by whichever process opened it first, so stop
//! the server before using these against it.

use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::Utc;
use rand::Rng;
use reservo_core::validation::{sanitize_text, validate_email};
use reservo_core::{Config, Storage, User, UserRepository, UserRole};
use reservo_gateway::auth::password::{self, SPECIAL_CHARACTERS};

use crate::ui;

/// Arguments for admin commands.
pub struct AdminArgs {
    /// The admin action to perform.
    pub action: AdminAction,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// Admin actions.
pub enum AdminAction {
    /// Create a new user.
    CreateUser {
        name: Option<String>,
        email: Option<String>,
        role: String,
        password: Option<String>,
        generate_password: bool,
    },
    /// List all users.
    ListUsers,
    /// Change a user's role.
    SetRole { email: String, role: String },
    /// Enable or disable a user account.
    SetActive { email: String, active: bool },
    /// Delete a user.
    Delete { email: String, yes: bool },
}

/// Run the admin command.
///
/// # Errors
///
/// Returns error if storage cannot be opened or the operation fails.
pub async fn run_admin(args: AdminArgs) -> anyhow::Result<()> {
    let mut config = super::load_config()?;
    if let Some(dir) = args.data_dir {
        config.storage.data_dir = Some(dir);
    }

    let storage = Storage::connect(&config)
        .await
        .with_context(|| open_failure_message(&config))?;
    tracing::debug!(backend = %storage.kind(), "Storage opened");
    let users = storage.users();

    match args.action {
        AdminAction::CreateUser {
            name,
            email,
            role,
            password,
            generate_password,
        } => create_user(users, name, email, &role, password, generate_password).await,
        AdminAction::ListUsers => list_users(users).await,
        AdminAction::SetRole { email, role } => set_role(users, &email, &role).await,
        AdminAction::SetActive { email, active } => set_active(users, &email, active).await,
        AdminAction::Delete { email, yes } => delete_user(users, &email, yes).await,
    }
}

fn open_failure_message(config: &Config) -> String {
    format!(
        "Failed to open storage (document store at {}). \
         If the server is running on the document store it holds the lock; stop it and retry",
        config.data_dir().display()
    )
}

/// Random password that satisfies the strength policy.
fn generate_password(length: usize) -> String {
    const ALPHANUMERIC: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let charset: Vec<char> = ALPHANUMERIC.chars().chain(SPECIAL_CHARACTERS.chars()).collect();
    let mut rng = rand::thread_rng();

    loop {
        let candidate: String = (0..length)
            .map(|_| charset[rng.gen_range(0..charset.len())])
            .collect();
        if password::meets_policy(&candidate) {
            return candidate;
        }
    }
}

/// Whether removing `user`'s admin standing would leave no active admin.
fn is_last_active_admin(all: &[User], user: &User) -> bool {
    user.role.is_admin()
        && user.active
        && !all
            .iter()
            .any(|u| u.id != user.id && u.role.is_admin() && u.active)
}

async fn find_user(users: &dyn UserRepository, email: &str) -> anyhow::Result<User> {
    users
        .find_by_email(&email.trim().to_lowercase())
        .await?
        .with_context(|| format!("User not found: {email}"))
}

async fn create_user(
    users: &dyn UserRepository,
    name: Option<String>,
    email: Option<String>,
    role: &str,
    password: Option<String>,
    generate: bool,
) -> anyhow::Result<()> {
    let role: UserRole = role.parse()?;

    let name = match name {
        Some(name) => name,
        None => ui::prompts::input("Name")?,
    };
    let name = sanitize_text(&name);
    if name.is_empty() {
        bail!("Name must not be blank");
    }

    let email = match email {
        Some(email) => email,
        None => ui::prompts::input("Email")?,
    };
    let email = validate_email(&email)?;

    if users.find_by_email(&email).await?.is_some() {
        bail!("A user with email {email} already exists");
    }

    let plain = if generate {
        generate_password(16)
    } else {
        match password {
            Some(given) => given,
            None => ui::prompts::new_password("Password")?,
        }
    };

    let violations = password::policy_violations(&plain);
    if !violations.is_empty() {
        let missing: Vec<String> = violations.iter().map(ToString::to_string).collect();
        bail!("Password must contain {}", missing.join(", "));
    }

    let hash = password::hash_password(plain.clone()).await?;
    let user = User::new(name, &email, hash, role);
    users.create(&user).await?;

    ui::success(&format!("Created user '{}' with role '{}'", user.email, user.role));
    if generate {
        ui::success(&format!("Generated password: {plain}"));
    }

    Ok(())
}

async fn list_users(users: &dyn UserRepository) -> anyhow::Result<()> {
    let all = users.list().await?;

    if all.is_empty() {
        ui::info("No users yet.");
        ui::info("Run 'reservo admin create-user --role admin' to create an admin.");
        return Ok(());
    }

    ui::info(&format!("Users ({}):", all.len()));
    println!();
    println!(
        "{:<32} {:<20} {:<8} {:<7} {:<20}",
        "EMAIL", "NAME", "ROLE", "ACTIVE", "CREATED"
    );
    println!("{}", "-".repeat(90));

    let now = Utc::now();
    for user in all {
        let created = user.created_at.format("%Y-%m-%d %H:%M:%S");
        let active = match (user.active, user.is_locked(now)) {
            (false, _) => "no",
            (true, true) => "locked",
            (true, false) => "yes",
        };
        println!(
            "{:<32} {:<20} {:<8} {:<7} {:<20}",
            user.email, user.name, user.role, active, created
        );
    }

    Ok(())
}

async fn set_role(users: &dyn UserRepository, email: &str, role: &str) -> anyhow::Result<()> {
    let role: UserRole = role.parse()?;
    let mut user = find_user(users, email).await?;

    if user.role == role {
        ui::info(&format!("User '{}' already has role '{role}'", user.email));
        return Ok(());
    }
    if !role.is_admin() && is_last_active_admin(&users.list().await?, &user) {
        bail!("Cannot demote the last active admin");
    }

    user.role = role;
    user.updated_at = Utc::now();
    users.update(&user).await?;

    ui::success(&format!("User '{}' is now '{role}'", user.email));
    Ok(())
}

async fn set_active(users: &dyn UserRepository, email: &str, active: bool) -> anyhow::Result<()> {
    let mut user = find_user(users, email).await?;

    if !active && is_last_active_admin(&users.list().await?, &user) {
        bail!("Cannot disable the last active admin");
    }

    user.active = active;
    if active {
        // Re-enabling also clears any lockout
        user.login_attempts = 0;
        user.lock_until = None;
    }
    user.updated_at = Utc::now();
    users.update(&user).await?;

    let status = if active { "enabled" } else { "disabled" };
    ui::success(&format!("User '{}' {status}", user.email));
    Ok(())
}

async fn delete_user(users: &dyn UserRepository, email: &str, yes: bool) -> anyhow::Result<()> {
    let user = find_user(users, email).await?;

    if is_last_active_admin(&users.list().await?, &user) {
        bail!("Cannot delete the last active admin");
    }

    if !yes && !ui::prompts::confirm(&format!("Delete user '{}'?", user.email))? {
        ui::info("Delete cancelled");
        return Ok(());
    }

    users.delete(&user.id).await?;
    ui::success(&format!("Deleted user '{}'", user.email));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_password_meets_policy() {
        for _ in 0..20 {
            let generated = generate_password(16);
            assert_eq!(generated.chars().count(), 16);
            assert!(password::meets_policy(&generated));
        }
    }

    #[test]
    fn test_open_failure_mentions_lock() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());

        let message = open_failure_message(&config);
        assert!(message.contains(&dir.path().display().to_string()));
        assert!(message.contains("stop it and retry"));
    }

    #[test]
    fn test_last_active_admin() {
        let admin = User::new("A", "a@example.com", "h", UserRole::Admin);
        let mut other = User::new("B", "b@example.com", "h", UserRole::Admin);
        let user = User::new("C", "c@example.com", "h", UserRole::User);

        let all = vec![admin.clone(), other.clone(), user.clone()];
        assert!(!is_last_active_admin(&all, &admin));
        assert!(!is_last_active_admin(&all, &user));

        other.active = false;
        let all = vec![admin.clone(), other, user];
        assert!(is_last_active_admin(&all, &admin));
    }

    #[tokio::test]
    async fn test_admin_commands_against_document_store() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open_document(dir.path()).unwrap();
        let users = storage.users();

        create_user(
            users,
            Some("Root".to_string()),
            Some("Root@Example.com".to_string()),
            "admin",
            Some("Sup3r$ecret".to_string()),
            false,
        )
        .await
        .unwrap();

        let root = find_user(users, "root@example.com").await.unwrap();
        assert_eq!(root.role, UserRole::Admin);
        assert!(password::verify_password_sync("Sup3r$ecret", &root.password_hash));

        assert!(set_role(users, "root@example.com", "user").await.is_err());
        assert!(set_active(users, "root@example.com", false).await.is_err());
        assert!(delete_user(users, "root@example.com", true).await.is_err());

        let weak = create_user(
            users,
            Some("Weak".to_string()),
            Some("weak@example.com".to_string()),
            "user",
            Some("password".to_string()),
            false,
        )
        .await;
        assert!(weak.is_err());
        assert!(find_user(users, "weak@example.com").await.is_err());
    }
}
