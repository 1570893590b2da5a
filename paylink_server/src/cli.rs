use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secret keys and tokens are deliberately left off this list
    const DISPLAY_ENVS: [&str; 21] = [
        "RUST_LOG",
        "PLG_HOST",
        "PLG_PORT",
        "PLG_DATABASE_URL",
        "PLG_PAYSTACK_BASE_URL",
        "PLG_PAYSTACK_RATE_LIMIT",
        "PLG_PAYSTACK_TIMEOUT_SECS",
        "PLG_PAYSTACK_IP_WHITELIST",
        "PLG_USE_X_FORWARDED_FOR",
        "PLG_USE_FORWARDED",
        "PLG_LINK_TTL_HOURS",
        "PLG_REFERENCE_PREFIX",
        "PLG_CALLBACK_URL",
        "PLG_ALLOWED_CHANNELS",
        "PLG_REMINDERS_ENABLED",
        "PLG_REMINDER_DELAYS",
        "PLG_REMINDER_MAX",
        "PLG_REMINDER_RETRY_DELAY_SECS",
        "PLG_REMINDER_POLL_SECS",
        "PLG_SWEEP_INTERVAL_SECS",
        "PLG_MESSAGING_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
