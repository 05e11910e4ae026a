use crate::cli::actions::{account, server, Action};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
        Action::SignIn(args, request) => account::sign_in(args, request).await,
        Action::SignUp(args, email, password) => account::sign_up(args, &email, password).await,
        Action::Confirm(args, email, code) => account::confirm(args, &email, &code).await,
    }
}
